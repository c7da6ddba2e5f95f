#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` abstraction over a free-running hardware cycle counter."]
#![doc = ""]
#![doc = "This crate provides the tick type, the single-wrap elapsed-time correction"]
#![doc = "and the linear tick-to-distance scale used by the ultrasonic ranging driver."]

use core::fmt;
use core::num::NonZeroU32;

#[cfg(feature = "std")]
mod monotonic;
#[cfg(feature = "std")]
pub use monotonic::MonotonicCounter;

/// A raw counter sample. The counter is 32 bits wide and wraps silently.
pub type Tick = u32;

/// Number of distinct tick values before the counter wraps back to zero.
pub const MODULUS: u64 = 1 << 32;

/// A free-running, wrapping cycle counter at a fixed frequency.
///
/// Implementations must make [`CycleCounter::now`] callable from interrupt
/// context: it may not block, allocate or take a lock that the interrupted
/// thread could be holding.
pub trait CycleCounter {
    /// Activate the counter and reset it to zero.
    ///
    /// Called exactly once during driver startup, before the counter is shared.
    fn enable(&mut self);

    /// Returns the current counter value.
    fn now(&self) -> Tick;

    /// Counter frequency in Hz.
    fn frequency_hz(&self) -> u32;
}

/// Ticks elapsed between two counter samples.
///
/// The counter is treated as a ring: when `end < start` exactly one wrap is
/// assumed to have happened and `MODULUS` is added back. More than one full
/// wrap between the two samples cannot be detected.
///
/// # Arguments
///
/// * `start`: Sample taken first.
/// * `end`: Sample taken second.
///
/// # Returns
///
/// The elapsed tick count, always in `0..MODULUS`.
pub const fn elapsed_ticks(start: Tick, end: Tick) -> u32 {
    if end >= start {
        end - start
    } else {
        (end as u64 + MODULUS - start as u64) as u32
    }
}

/// Convert an elapsed tick count into microseconds for a counter at `frequency_hz`.
pub const fn ticks_to_micros(elapsed: u32, frequency_hz: u32) -> u64 {
    if frequency_hz == 0 {
        return 0;
    }
    elapsed as u64 * 1_000_000 / frequency_hz as u64
}

/// Linear conversion from elapsed ticks to the driver's distance unit.
///
/// The divisor is a calibration constant, not a derived physical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickScale {
    ticks_per_unit: NonZeroU32,
}

impl TickScale {
    /// Construct a scale that maps `ticks_per_unit` ticks to one distance unit.
    pub const fn new(ticks_per_unit: NonZeroU32) -> Self {
        TickScale { ticks_per_unit }
    }

    /// Returns the configured divisor.
    pub const fn ticks_per_unit(&self) -> u32 {
        self.ticks_per_unit.get()
    }

    /// Scale an elapsed tick count down to a distance. Truncates.
    pub const fn to_distance(&self, elapsed: u32) -> u32 {
        elapsed / self.ticks_per_unit.get()
    }
}

impl fmt::Display for TickScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ticks/unit", self.ticks_per_unit)
    }
}
