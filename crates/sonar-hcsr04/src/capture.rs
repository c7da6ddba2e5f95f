//! Echo capture state shared between the interrupt handler and the reader.
//!
//! The release signal behaves like a counting semaphore initialised to zero:
//! a blocked reader drives the count to `-1`, the interrupt handler posts only
//! while the count is negative. A post with nobody waiting would otherwise
//! release the next reader before its echo arrives.
//!
//! The count is a lock-free atomic. The interrupt side never takes a lock;
//! the condvar only wakes the reader early.

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use sonar_counter::{CycleCounter, Tick};
use tracing::trace;

/// Longest the reader sleeps before re-checking the count. Bounds the extra
/// latency of a wakeup that lands between the check and the park.
const WAIT_SLICE: Duration = Duration::from_millis(1);

/// End tick plus release signal.
#[derive(Debug, Default)]
pub struct EchoCapture {
    end: AtomicU32,
    count: AtomicI32,
    gate: Mutex<()>,
    released: Condvar,
    spurious: AtomicU32,
}

impl EchoCapture {
    /// An idle capture: no waiter, no end tick.
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer side. Store `end` and release the waiter, if there is one.
    ///
    /// Returns `true` if a waiter was released. With no waiter the signal is
    /// left untouched. Safe to call from interrupt context.
    pub fn record(&self, end: Tick) -> bool {
        if self.count.load(Ordering::Acquire) < 0 {
            self.end.store(end, Ordering::Release);
            if self.post() {
                self.released.notify_one();
                return true;
            }
        }
        self.spurious.fetch_add(1, Ordering::Relaxed);
        false
    }

    /// Consumer side. Block until released or until `deadline` passes.
    ///
    /// Returns the captured end tick, or `None` on timeout. A timed-out
    /// waiter withdraws itself so a late edge finds no one to release.
    pub fn wait_until(&self, deadline: Instant) -> Option<Tick> {
        self.count.fetch_sub(1, Ordering::AcqRel);
        let mut gate = self.gate.lock();
        loop {
            if self.count.load(Ordering::Acquire) >= 0 {
                return Some(self.end.load(Ordering::Acquire));
            }
            let now = Instant::now();
            if now >= deadline {
                // Withdrawing and posting race for the same slot.
                if self.post() {
                    return None;
                }
                return Some(self.end.load(Ordering::Acquire));
            }
            self.released.wait_until(&mut gate, deadline.min(now + WAIT_SLICE));
        }
    }

    /// Move the count one step towards zero if a waiter holds it negative.
    fn post(&self) -> bool {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < 0).then_some(count + 1)
            })
            .is_ok()
    }

    /// `true` while a reader is blocked on the signal.
    pub fn waiter_pending(&self) -> bool {
        self.count.load(Ordering::Acquire) < 0
    }

    /// Current signal value: negative while blocked, zero when idle.
    pub fn signal_value(&self) -> i32 {
        self.count.load(Ordering::Acquire)
    }

    /// Edges observed while no reader was waiting.
    pub fn spurious_edges(&self) -> u32 {
        self.spurious.load(Ordering::Relaxed)
    }
}

/// Everything the interrupt handler touches: the counter and the capture.
#[derive(Debug)]
pub struct EchoContext<C> {
    counter: C,
    capture: EchoCapture,
}

impl<C: CycleCounter> EchoContext<C> {
    /// `counter` must already be enabled.
    pub fn new(counter: C) -> Self {
        EchoContext {
            counter,
            capture: EchoCapture::new(),
        }
    }

    /// The enabled cycle counter.
    pub fn counter(&self) -> &C {
        &self.counter
    }

    /// The capture the handler records into.
    pub fn capture(&self) -> &EchoCapture {
        &self.capture
    }

    /// Echo edge interrupt entry point.
    pub fn on_echo_edge(&self) {
        // Sample first; everything after this adds skew.
        let end = self.counter.now();
        if self.capture.record(end) {
            trace!(end, "echo edge released reader");
        }
    }
}
