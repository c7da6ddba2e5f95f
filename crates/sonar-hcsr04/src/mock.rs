//! Test doubles for the hardware collaborators.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use parking_lot::Mutex;
use sonar_counter::{CycleCounter, Tick};

use crate::hal::{DeviceBase, EchoHandler, EchoLine, Edge};

/// Counter that replays a fixed sequence of ticks, then repeats the last one.
#[derive(Debug, Default)]
pub struct ScriptedCounter {
    ticks: Mutex<VecDeque<Tick>>,
    last: AtomicU32,
    enabled: AtomicBool,
}

impl ScriptedCounter {
    pub fn new(ticks: &[Tick]) -> Self {
        ScriptedCounter {
            ticks: Mutex::new(ticks.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl CycleCounter for ScriptedCounter {
    fn enable(&mut self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    fn now(&self) -> Tick {
        match self.ticks.lock().pop_front() {
            Some(tick) => {
                self.last.store(tick, Ordering::SeqCst);
                tick
            }
            None => self.last.load(Ordering::SeqCst),
        }
    }

    fn frequency_hz(&self) -> u32 {
        1_000_000
    }
}

/// Output pin that records every level written to it.
#[derive(Debug, Clone, Default)]
pub struct RecordingPin {
    levels: Arc<Mutex<Vec<bool>>>,
}

impl RecordingPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<bool> {
        self.levels.lock().clone()
    }
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.lock().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.lock().push(true);
        Ok(())
    }
}

/// Output pin whose rising edge fails.
#[derive(Debug)]
pub struct FailingPin {
    pub fail_high: bool,
}

impl ErrorType for FailingPin {
    type Error = ErrorKind;
}

impl OutputPin for FailingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.fail_high { Err(ErrorKind::Other) } else { Ok(()) }
    }
}

/// Delay that returns immediately and sums up what was asked of it.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    total_ns: Arc<AtomicU64>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_ns(&self) -> u64 {
        self.total_ns.load(Ordering::SeqCst)
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.fetch_add(u64::from(ns), Ordering::SeqCst);
    }
}

/// Echo line fired by hand from the test.
#[derive(Clone, Default)]
pub struct ManualEchoLine {
    handler: Arc<Mutex<Option<EchoHandler>>>,
    edge: Arc<Mutex<Option<Edge>>>,
    configured: Arc<AtomicBool>,
    pub refuse_bind: bool,
}

impl ManualEchoLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edge(&self) -> Option<Edge> {
        *self.edge.lock()
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    /// Invoke the bound handler as the interrupt would. Returns `false` if unbound.
    pub fn fire(&self) -> bool {
        match self.handler.lock().as_ref() {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}

impl EchoLine for ManualEchoLine {
    type Error = &'static str;

    fn configure(&mut self) -> Result<(), Self::Error> {
        self.configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn bind(&mut self, edge: Edge, handler: EchoHandler) -> Result<(), Self::Error> {
        if self.refuse_bind {
            return Err("interrupt line busy");
        }
        *self.edge.lock() = Some(edge);
        *self.handler.lock() = Some(handler);
        Ok(())
    }
}

/// Device framework that records registrations and control codes.
#[derive(Debug, Clone, Default)]
pub struct RecordingBase {
    registered: Arc<Mutex<Vec<(&'static str, &'static str)>>>,
    ioctls: Arc<Mutex<Vec<(u32, usize)>>>,
    pub refuse_register: bool,
}

impl RecordingBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered(&self) -> Vec<(&'static str, &'static str)> {
        self.registered.lock().clone()
    }

    pub fn ioctls(&self) -> Vec<(u32, usize)> {
        self.ioctls.lock().clone()
    }
}

impl DeviceBase for RecordingBase {
    type Error = &'static str;

    fn register(&mut self, name: &'static str, path: &'static str) -> Result<(), Self::Error> {
        if self.refuse_register {
            return Err("path already in use");
        }
        self.registered.lock().push((name, path));
        Ok(())
    }

    fn ioctl(&self, cmd: u32, arg: usize) -> Result<i32, Self::Error> {
        self.ioctls.lock().push((cmd, arg));
        if cmd == 0 { Err("unknown control code") } else { Ok(arg as i32) }
    }
}
