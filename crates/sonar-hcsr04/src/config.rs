//! Timing and calibration parameters of the ranging state machine.

use core::num::NonZeroU32;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use sonar_counter::TickScale;

use crate::SonarError;

/// Minimum trigger pulse width accepted by the HC-SR04, in microseconds.
pub const DEFAULT_TRIGGER_PULSE_US: u32 = 10;
/// How long a reader waits for the echo interrupt, in milliseconds.
pub const DEFAULT_ECHO_TIMEOUT_MS: u32 = 10;
/// Calibration divisor from elapsed ticks to distance units.
pub const DEFAULT_TICKS_PER_UNIT: u32 = 1000;
/// Readings above this are treated as noise.
pub const DEFAULT_MAX_DISTANCE: u32 = 12_000;
/// Pause before re-triggering after a rejected reading, in milliseconds.
pub const DEFAULT_NOISE_BACKOFF_MS: u32 = 100;

/// Ranging parameters.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangingConfig {
    /// Width of the trigger pulse (µs).
    pub trigger_pulse_us: u32,
    /// Echo wait budget (ms).
    pub echo_timeout_ms: u32,
    /// Ticks per distance unit.
    pub ticks_per_unit: u32,
    /// Plausibility ceiling in distance units.
    pub max_distance: u32,
    /// Back-off after a rejected reading (ms).
    pub noise_backoff_ms: u32,
}

impl Default for RangingConfig {
    fn default() -> Self {
        RangingConfig {
            trigger_pulse_us: DEFAULT_TRIGGER_PULSE_US,
            echo_timeout_ms: DEFAULT_ECHO_TIMEOUT_MS,
            ticks_per_unit: DEFAULT_TICKS_PER_UNIT,
            max_distance: DEFAULT_MAX_DISTANCE,
            noise_backoff_ms: DEFAULT_NOISE_BACKOFF_MS,
        }
    }
}

impl RangingConfig {
    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns `Err(SonarError::InvalidConfig)` if the pulse width, the echo
    /// timeout or the tick divisor is zero.
    pub fn validate(&self) -> Result<(), SonarError> {
        if self.trigger_pulse_us == 0 {
            return Err(SonarError::InvalidConfig("trigger_pulse_us must be positive"));
        }
        if self.echo_timeout_ms == 0 {
            return Err(SonarError::InvalidConfig("echo_timeout_ms must be positive"));
        }
        if self.ticks_per_unit == 0 {
            return Err(SonarError::InvalidConfig("ticks_per_unit must be positive"));
        }
        Ok(())
    }

    /// The tick-to-distance scale.
    ///
    /// # Errors
    ///
    /// Returns `Err(SonarError::InvalidConfig)` if `ticks_per_unit` is zero.
    pub fn scale(&self) -> Result<TickScale, SonarError> {
        NonZeroU32::new(self.ticks_per_unit)
            .map(TickScale::new)
            .ok_or(SonarError::InvalidConfig("ticks_per_unit must be positive"))
    }

    /// Echo wait budget as a [`Duration`].
    pub fn echo_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.echo_timeout_ms))
    }
}
