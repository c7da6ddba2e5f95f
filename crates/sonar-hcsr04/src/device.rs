//! Character-device front end of the sensor.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use sonar_counter::CycleCounter;
use tracing::info;

use crate::hal::{DeviceBase, EchoLine, Edge};
use crate::ranging::{RangingState, RangingStats, Sensor};
use crate::{RangingConfig, SonarError};

/// Name the device registers under.
pub const DEVICE_NAME: &str = "hc_sr04";
/// Device node path.
pub const DEVICE_PATH: &str = "/dev/hc_sr04";

/// The hardware handed to [`RangeDevice::init`].
pub struct Hardware<C, P, D, E, B> {
    /// Free-running cycle counter, not yet enabled.
    pub counter: C,
    /// Trigger output pin.
    pub trigger: P,
    /// Delay used for the trigger pulse and the noise back-off.
    pub delay: D,
    /// Echo input and its interrupt line.
    pub echo: E,
    /// Character-device framework.
    pub base: B,
}

/// Snapshot returned by [`RangeDevice::info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Registered device name.
    pub name: &'static str,
    /// Device node path.
    pub path: &'static str,
    /// Active ranging parameters.
    pub config: RangingConfig,
    /// Current state of the measurement cycle.
    pub state: RangingState,
    /// Running totals since startup.
    pub stats: RangingStats,
    /// Echo edges that arrived with no reader waiting.
    pub spurious_edges: u32,
}

/// The registered HC-SR04 device.
pub struct RangeDevice<C, P, D, E, B> {
    sensor: Arc<Sensor<C, P, D>>,
    // Keeps the interrupt binding alive for the life of the device.
    _echo: E,
    base: B,
}

impl<C, P, D, E, B> RangeDevice<C, P, D, E, B>
where
    C: CycleCounter + Send + Sync + 'static,
    P: OutputPin,
    D: DelayNs,
    E: EchoLine,
    B: DeviceBase,
{
    /// Set up the pins, enable the cycle counter, bind the echo interrupt and
    /// register the device node.
    ///
    /// # Errors
    ///
    /// * `SonarError::InvalidConfig` if `config` does not validate.
    /// * `SonarError::Register` if the device framework refuses the node.
    /// * `SonarError::Trigger` if the trigger pin cannot be parked low.
    /// * `SonarError::EchoSetup` if the echo pin or its interrupt cannot be set up.
    pub fn init(hardware: Hardware<C, P, D, E, B>, config: RangingConfig) -> Result<Self, SonarError> {
        config.validate()?;
        let Hardware {
            counter,
            trigger,
            delay,
            mut echo,
            mut base,
        } = hardware;

        let sensor = Arc::new(Sensor::new(counter, trigger, delay, config)?);

        echo.configure()
            .map_err(|e| SonarError::EchoSetup(format!("{e:?}")))?;
        echo.bind(Edge::Falling, sensor.echo_handler())
            .map_err(|e| SonarError::EchoSetup(format!("{e:?}")))?;

        // Last, so a failed start leaves no node behind.
        base.register(DEVICE_NAME, DEVICE_PATH)
            .map_err(|e| SonarError::Register(format!("{e:?}")))?;

        info!(
            path = DEVICE_PATH,
            pulse_us = config.trigger_pulse_us,
            timeout_ms = config.echo_timeout_ms,
            counter_hz = sensor.echo().counter().frequency_hz(),
            "HC-SR04 ranging device started"
        );

        Ok(RangeDevice {
            sensor,
            _echo: echo,
            base,
        })
    }

    /// Take one measurement and write its line into `buf`.
    ///
    /// The line is truncated to `buf.len()`. Returns the number of bytes
    /// written.
    ///
    /// # Errors
    ///
    /// Returns `Err(SonarError::Trigger)` if the trigger pin cannot be driven.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, SonarError> {
        let line = self.sensor.measure()?.to_string();
        let len = line.len().min(buf.len());
        buf[..len].copy_from_slice(&line.as_bytes()[..len]);
        Ok(len)
    }

    /// Forward a control code to the device framework. The driver defines
    /// none of its own.
    pub fn ioctl(&self, cmd: u32, arg: usize) -> Result<i32, B::Error> {
        self.base.ioctl(cmd, arg)
    }

    /// The underlying sensor.
    pub fn sensor(&self) -> &Arc<Sensor<C, P, D>> {
        &self.sensor
    }

    /// Snapshot of configuration, state and counters.
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: DEVICE_NAME,
            path: DEVICE_PATH,
            config: *self.sensor.config(),
            state: self.sensor.state(),
            stats: self.sensor.stats(),
            spurious_edges: self.sensor.echo().capture().spurious_edges(),
        }
    }

    /// Log [`RangeDevice::info`].
    pub fn print_info(&self) {
        let info = self.info();
        info!(
            path = info.path,
            state = ?info.state,
            completed = info.stats.completed,
            timeouts = info.stats.timeouts,
            rejected = info.stats.rejected,
            spurious_edges = info.spurious_edges,
            "HC-SR04 status"
        );
    }
}
