//! Narrow interfaces to the platform collaborators.
//!
//! The trigger pin is any [`embedded_hal::digital::OutputPin`] and the pulse
//! width delay any [`embedded_hal::delay::DelayNs`]. The echo pin and the
//! character-device framework have no embedded-hal equivalent, so they are
//! described here.

use core::fmt::Debug;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use spin_sleep::SpinSleeper;

/// Signal transition an interrupt is bound to.
///
/// The echo pulse ends on a falling edge, which is when the reader is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// High to low transition.
    Falling,
}

/// Callback invoked from interrupt context when the bound edge fires.
pub type EchoHandler = Box<dyn Fn() + Send + Sync + 'static>;

/// The echo input pin together with its external interrupt line.
pub trait EchoLine {
    /// Pin or interrupt controller error.
    type Error: Debug;

    /// Put the pin into floating input mode with edge detection enabled.
    fn configure(&mut self) -> Result<(), Self::Error>;

    /// Bind `handler` to `edge` transitions of the pin.
    ///
    /// The handler must stay bound for the lifetime of the driver.
    fn bind(&mut self, edge: Edge, handler: EchoHandler) -> Result<(), Self::Error>;
}

/// Character-device framework the driver registers with.
pub trait DeviceBase {
    /// Framework error.
    type Error: Debug;

    /// Register the device node `path` under `name`.
    fn register(&mut self, name: &'static str, path: &'static str) -> Result<(), Self::Error>;

    /// Default control-code dispatch.
    fn ioctl(&self, cmd: u32, arg: usize) -> Result<i32, Self::Error>;
}

/// Blocking delay for hosted targets, backed by a spin sleeper.
///
/// Plain `thread::sleep` overshoots by tens of microseconds, which is the
/// whole trigger pulse budget.
#[derive(Debug, Clone, Copy)]
pub struct SpinDelay {
    sleeper: SpinSleeper,
}

impl SpinDelay {
    /// `native_accuracy_ns` is how much of each delay is left to the OS sleep.
    pub fn new(native_accuracy_ns: u32) -> Self {
        SpinDelay {
            sleeper: SpinSleeper::new(native_accuracy_ns),
        }
    }
}

impl Default for SpinDelay {
    fn default() -> Self {
        SpinDelay::new(100_000)
    }
}

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.sleeper.sleep(Duration::from_nanos(u64::from(ns)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_spin_delay_waits_at_least_requested() {
        let mut delay = SpinDelay::default();
        let begin = Instant::now();
        delay.delay_us(50);
        assert!(begin.elapsed() >= Duration::from_micros(50));

        let begin = Instant::now();
        delay.delay_ms(2);
        assert!(begin.elapsed() >= Duration::from_millis(2));
    }
}
