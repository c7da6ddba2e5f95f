//! Simulated HC-SR04 wiring for running the driver on a host.
//!
//! A falling trigger edge schedules an echo on a worker thread after the
//! time an obstacle at `target_distance` would take, then calls the bound
//! echo handler just like the EXTI line would.

use std::convert::Infallible;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::digital::{ErrorType, OutputPin};
use parking_lot::Mutex;
use rand::Rng;
use sonar_counter::MonotonicCounter;
use sonar_hcsr04::{DeviceBase, EchoHandler, EchoLine, Edge, Hardware, RangeDevice, SpinDelay};
use spin_sleep::SpinSleeper;
use tracing::{info, trace};

use crate::config::SimulationConfig;

pub type SimDevice = RangeDevice<MonotonicCounter, SimTrigger, SpinDelay, SimEchoLine, SimDeviceBase>;

type SharedHandler = Arc<Mutex<Option<EchoHandler>>>;

/// What the simulated sensor does with one trigger pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Echo {
    Target,
    Noise,
    Dropped,
}

/// Trigger output of the simulated sensor.
pub struct SimTrigger {
    high: bool,
    handler: SharedHandler,
    sim: SimulationConfig,
    ticks_per_unit: u32,
}

impl SimTrigger {
    fn echo_delay(&self, distance: u32) -> Duration {
        let ticks = u64::from(distance) * u64::from(self.ticks_per_unit);
        Duration::from_nanos(ticks * 1_000_000_000 / u64::from(self.sim.counter_hz.max(1)))
    }

    fn roll(&self) -> Echo {
        let mut rng = rand::rng();
        if rng.random_bool(self.sim.drop_probability.clamp(0.0, 1.0)) {
            Echo::Dropped
        } else if rng.random_bool(self.sim.noise_probability.clamp(0.0, 1.0)) {
            Echo::Noise
        } else {
            Echo::Target
        }
    }

    fn schedule_echo(&self) {
        let distance = match self.roll() {
            Echo::Target => self.sim.target_distance,
            Echo::Noise => self.sim.noise_distance,
            Echo::Dropped => {
                trace!("simulated echo dropped");
                return;
            }
        };
        let deadline = Instant::now() + self.echo_delay(distance);
        let handler = Arc::clone(&self.handler);
        thread::spawn(move || {
            SpinSleeper::new(100_000).sleep(deadline.saturating_duration_since(Instant::now()));
            if let Some(handler) = handler.lock().as_ref() {
                handler();
            }
        });
    }
}

impl ErrorType for SimTrigger {
    type Error = Infallible;
}

impl OutputPin for SimTrigger {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.high {
            self.schedule_echo();
        }
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

/// Echo input of the simulated sensor.
pub struct SimEchoLine {
    handler: SharedHandler,
}

impl EchoLine for SimEchoLine {
    type Error = Infallible;

    fn configure(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn bind(&mut self, edge: Edge, handler: EchoHandler) -> Result<(), Self::Error> {
        info!(?edge, "echo interrupt bound");
        *self.handler.lock() = Some(handler);
        Ok(())
    }
}

/// Control code the simulated framework does not understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedIoctl(pub u32);

/// Device framework stand-in: logs registration, knows no control codes.
#[derive(Debug, Default)]
pub struct SimDeviceBase;

impl DeviceBase for SimDeviceBase {
    type Error = UnsupportedIoctl;

    fn register(&mut self, name: &'static str, path: &'static str) -> Result<(), Self::Error> {
        info!(name, path, "device registered");
        Ok(())
    }

    fn ioctl(&self, cmd: u32, _arg: usize) -> Result<i32, Self::Error> {
        Err(UnsupportedIoctl(cmd))
    }
}

/// Wire up a simulated sensor.
pub fn hardware(
    sim: &SimulationConfig,
    ticks_per_unit: u32,
) -> Hardware<MonotonicCounter, SimTrigger, SpinDelay, SimEchoLine, SimDeviceBase> {
    let handler: SharedHandler = Arc::default();
    Hardware {
        counter: MonotonicCounter::with_offset(sim.counter_hz, sim.counter_offset),
        trigger: SimTrigger {
            high: false,
            handler: Arc::clone(&handler),
            sim: sim.clone(),
            ticks_per_unit,
        },
        delay: SpinDelay::default(),
        echo: SimEchoLine { handler },
        base: SimDeviceBase,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonar_hcsr04::RangingConfig;

    fn quiet() -> SimulationConfig {
        SimulationConfig {
            drop_probability: 0.0,
            noise_probability: 0.0,
            ..Default::default()
        }
    }

    fn read_line(device: &SimDevice) -> String {
        let mut buf = [0u8; 32];
        let n = device.read(&mut buf).unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    fn distance(line: &str) -> u32 {
        line.strip_prefix("ALT ")
            .and_then(|rest| rest.trim_end().parse().ok())
            .unwrap_or_else(|| panic!("not a distance line: {line:?}"))
    }

    fn config() -> RangingConfig {
        RangingConfig {
            echo_timeout_ms: 500,
            ..Default::default()
        }
    }

    #[test]
    fn test_echo_delay_matches_scale() {
        let hw = hardware(&quiet(), 1000);
        // 300 units * 1000 ticks at 168 MHz.
        assert_eq!(hw.trigger.echo_delay(300), Duration::from_nanos(1_785_714));
    }

    #[test]
    fn test_simulated_target_is_measured() {
        let sim = quiet();
        let device = SimDevice::init(hardware(&sim, 1000), config()).unwrap();
        let value = distance(&read_line(&device));
        // Flight time is 300 units; thread scheduling shifts it either way.
        assert!((250..=12_000).contains(&value), "measured {value}");
    }

    #[test]
    fn test_simulated_target_across_counter_wrap() {
        let sim = SimulationConfig {
            counter_offset: u32::MAX - 100_000,
            ..quiet()
        };
        let device = SimDevice::init(hardware(&sim, 1000), config()).unwrap();
        let value = distance(&read_line(&device));
        assert!((250..=12_000).contains(&value), "measured {value}");
    }

    #[test]
    fn test_dropped_echo_times_out() {
        let sim = SimulationConfig {
            drop_probability: 1.0,
            ..quiet()
        };
        let config = RangingConfig { echo_timeout_ms: 20, ..Default::default() };
        let device = SimDevice::init(hardware(&sim, 1000), config).unwrap();
        assert_eq!(read_line(&device), "TimeOut\n");
    }

    #[test]
    fn test_ioctl_is_refused_by_framework() {
        let device = SimDevice::init(hardware(&quiet(), 1000), config()).unwrap();
        assert_eq!(device.ioctl(0x1234, 0), Err(UnsupportedIoctl(0x1234)));
    }
}
