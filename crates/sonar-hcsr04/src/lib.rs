//! Interrupt-driven driver for HC-SR04 style ultrasonic ranging modules.
//!
//! A read drives a short trigger pulse, samples the cycle counter, and blocks
//! until the echo edge interrupt samples the counter again or the echo
//! timeout expires. The tick difference is scaled to a distance and returned
//! as a text line (`"ALT <value>\n"` or `"TimeOut\n"`) through a
//! character-device style [`RangeDevice::read`].
//!
//! The platform plugs in through [`embedded_hal`] for the trigger pin and the
//! pulse delay, [`sonar_counter::CycleCounter`] for the timebase, and the
//! [`EchoLine`] / [`DeviceBase`] traits for the interrupt and the device
//! framework.

#![warn(missing_docs)]

pub mod capture;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod hal;
pub mod ranging;

#[cfg(test)]
mod mock;

pub use capture::{EchoCapture, EchoContext};
pub use config::RangingConfig;
pub use device::{DEVICE_NAME, DEVICE_PATH, DeviceInfo, Hardware, RangeDevice};
pub use driver::{DriverSlot, start};
pub use error::SonarError;
pub use hal::{DeviceBase, EchoHandler, EchoLine, Edge, SpinDelay};
pub use ranging::{Measurement, RangingState, RangingStats, Sensor};
