//! Error types for the ranging driver.
//!
//! Timeouts and implausible readings are not errors: the first is a
//! [`Measurement`](crate::Measurement) variant and the second is retried
//! internally. What remains are configuration and hardware setup failures.

use embedded_hal::digital::ErrorKind;
use thiserror::Error;

/// Errors raised while starting or driving the sensor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SonarError {
    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Writing the trigger pin failed.
    #[error("Trigger pin write failed: {0:?}")]
    Trigger(ErrorKind),
    /// Configuring the echo pin or binding its interrupt failed.
    #[error("Echo line setup failed: {0}")]
    EchoSetup(String),
    /// The character-device framework refused the registration.
    #[error("Device registration failed: {0}")]
    Register(String),
}

impl SonarError {
    pub(crate) fn trigger<E: embedded_hal::digital::Error>(err: E) -> Self {
        SonarError::Trigger(err.kind())
    }
}
