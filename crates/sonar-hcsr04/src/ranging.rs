//! The measurement state machine.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::time::Instant;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use parking_lot::Mutex;
use sonar_counter::{CycleCounter, TickScale, elapsed_ticks, ticks_to_micros};
use tracing::{debug, warn};

use crate::capture::EchoContext;
use crate::hal::EchoHandler;
use crate::{RangingConfig, SonarError};

/// Outcome of one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// Distance in the driver's native unit.
    Distance(u32),
    /// No echo before the deadline.
    Timeout,
}

impl fmt::Display for Measurement {
    /// The line a device read returns.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Distance(value) => writeln!(f, "ALT {}", value),
            Measurement::Timeout => writeln!(f, "TimeOut"),
        }
    }
}

/// Where the state machine currently is.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangingState {
    /// No measurement in progress.
    Idle = 0,
    /// Trigger pulse sent, start tick sampled.
    PulseSent = 1,
    /// Blocked on the echo interrupt.
    Waiting = 2,
    /// Echo captured, reading being checked.
    Completed = 3,
    /// Deadline passed without an echo.
    TimedOut = 4,
}

impl RangingState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RangingState::PulseSent,
            2 => RangingState::Waiting,
            3 => RangingState::Completed,
            4 => RangingState::TimedOut,
            _ => RangingState::Idle,
        }
    }
}

/// Running totals since startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangingStats {
    /// Plausible distances returned.
    pub completed: u32,
    /// Reads that ended in [`Measurement::Timeout`].
    pub timeouts: u32,
    /// Readings above the ceiling that were discarded.
    pub rejected: u32,
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicU32,
    timeouts: AtomicU32,
    rejected: AtomicU32,
}

/// Trigger output and the delay used to shape the pulse.
struct Trigger<P, D> {
    pin: P,
    delay: D,
}

impl<P: OutputPin, D: DelayNs> Trigger<P, D> {
    fn pulse(&mut self, width_us: u32) -> Result<(), SonarError> {
        self.pin.set_high().map_err(SonarError::trigger)?;
        self.delay.delay_us(width_us);
        self.pin.set_low().map_err(SonarError::trigger)
    }
}

/// The bound sensor: trigger, echo context and ranging parameters.
///
/// Readers are serialized on the trigger; the echo context is shared with the
/// interrupt handler through an [`Arc`].
pub struct Sensor<C, P, D> {
    echo: Arc<EchoContext<C>>,
    trigger: Mutex<Trigger<P, D>>,
    config: RangingConfig,
    scale: TickScale,
    state: AtomicU8,
    counters: Counters,
}

impl<C, P, D> Sensor<C, P, D>
where
    C: CycleCounter + Send + Sync + 'static,
    P: OutputPin,
    D: DelayNs,
{
    /// Validate `config`, park the trigger low and enable the counter.
    ///
    /// # Errors
    ///
    /// Returns `Err(SonarError::InvalidConfig)` for an invalid configuration and
    /// `Err(SonarError::Trigger)` if the trigger pin cannot be driven low.
    pub fn new(mut counter: C, mut pin: P, delay: D, config: RangingConfig) -> Result<Self, SonarError> {
        config.validate()?;
        let scale = config.scale()?;
        pin.set_low().map_err(SonarError::trigger)?;
        counter.enable();

        Ok(Sensor {
            echo: Arc::new(EchoContext::new(counter)),
            trigger: Mutex::new(Trigger { pin, delay }),
            config,
            scale,
            state: AtomicU8::new(RangingState::Idle as u8),
            counters: Counters::default(),
        })
    }

    /// A handler for the echo interrupt, holding its own reference to the
    /// echo context.
    pub fn echo_handler(&self) -> EchoHandler {
        let echo = Arc::clone(&self.echo);
        Box::new(move || echo.on_echo_edge())
    }

    /// State shared with the echo interrupt.
    pub fn echo(&self) -> &Arc<EchoContext<C>> {
        &self.echo
    }

    /// The validated configuration.
    pub fn config(&self) -> &RangingConfig {
        &self.config
    }

    /// Current state of the measurement cycle.
    pub fn state(&self) -> RangingState {
        RangingState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Running totals since startup.
    pub fn stats(&self) -> RangingStats {
        RangingStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    fn enter(&self, state: RangingState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Run one measurement cycle.
    ///
    /// Readings above the plausibility ceiling are discarded and the cycle is
    /// repeated after the noise back-off, so this only returns a plausible
    /// distance or [`Measurement::Timeout`].
    ///
    /// # Errors
    ///
    /// Returns `Err(SonarError::Trigger)` if the trigger pin cannot be driven.
    pub fn measure(&self) -> Result<Measurement, SonarError> {
        let mut trigger = self.trigger.lock();
        loop {
            if let Err(err) = trigger.pulse(self.config.trigger_pulse_us) {
                self.enter(RangingState::Idle);
                return Err(err);
            }
            let start = self.echo.counter().now();
            self.enter(RangingState::PulseSent);

            let deadline = Instant::now() + self.config.echo_timeout();
            self.enter(RangingState::Waiting);

            let Some(end) = self.echo.capture().wait_until(deadline) else {
                self.enter(RangingState::TimedOut);
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                debug!(start, timeout_ms = self.config.echo_timeout_ms, "no echo before deadline");
                self.enter(RangingState::Idle);
                return Ok(Measurement::Timeout);
            };
            self.enter(RangingState::Completed);

            let elapsed = elapsed_ticks(start, end);
            let distance = self.scale.to_distance(elapsed);
            if distance > self.config.max_distance {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    distance,
                    elapsed,
                    max_distance = self.config.max_distance,
                    "implausible reading discarded, re-triggering"
                );
                trigger.delay.delay_ms(self.config.noise_backoff_ms);
                continue;
            }

            self.counters.completed.fetch_add(1, Ordering::Relaxed);
            debug!(
                start,
                end,
                elapsed,
                micros = ticks_to_micros(elapsed, self.echo.counter().frequency_hz()),
                distance,
                "echo captured"
            );
            self.enter(RangingState::Idle);
            return Ok(Measurement::Distance(distance));
        }
    }
}

impl<C, P, D> fmt::Debug for Sensor<C, P, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sensor")
            .field("config", &self.config)
            .field("scale", &self.scale)
            .field("state", &RangingState::from_u8(self.state.load(Ordering::Relaxed)))
            .finish_non_exhaustive()
    }
}
