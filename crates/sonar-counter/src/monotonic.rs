//! Host-side counter derived from the monotonic clock.

use std::time::Instant;

use crate::{CycleCounter, Tick};

/// A cycle counter emulated from [`Instant`] at a fixed nominal frequency.
///
/// The tick value is `offset + elapsed_seconds * frequency_hz`, truncated to
/// 32 bits, so it wraps exactly like a hardware counter would.
///
/// [`MonotonicCounter::new`] honours the zero reset of [`CycleCounter::enable`].
/// A non-zero `offset` is a simulation aid that restarts the counter close to
/// the wrap point instead; no hardware counter behaves that way.
#[derive(Debug, Clone)]
pub struct MonotonicCounter {
    frequency_hz: u32,
    offset: Tick,
    origin: Instant,
}

impl MonotonicCounter {
    /// Construct a counter ticking at `frequency_hz`, starting at zero once enabled.
    pub fn new(frequency_hz: u32) -> Self {
        Self::with_offset(frequency_hz, 0)
    }

    /// Construct a counter that reads `offset`, not zero, right after
    /// [`CycleCounter::enable`]. Simulation only.
    pub fn with_offset(frequency_hz: u32, offset: Tick) -> Self {
        MonotonicCounter {
            frequency_hz,
            offset,
            origin: Instant::now(),
        }
    }
}

impl CycleCounter for MonotonicCounter {
    /// Restart from `offset`, zero unless built with [`MonotonicCounter::with_offset`].
    fn enable(&mut self) {
        self.origin = Instant::now();
    }

    fn now(&self) -> Tick {
        let nanos = self.origin.elapsed().as_nanos();
        let ticks = nanos * u128::from(self.frequency_hz) / 1_000_000_000;
        self.offset.wrapping_add(ticks as Tick)
    }

    fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }
}
