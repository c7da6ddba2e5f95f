//! Process-wide driver instance and its idempotent startup.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use parking_lot::{Mutex, const_mutex};
use sonar_counter::CycleCounter;
use tracing::debug;

use crate::device::{Hardware, RangeDevice};
use crate::hal::{DeviceBase, EchoLine};
use crate::{RangingConfig, SonarError};

/// Holds at most one started instance of `T`.
///
/// Meant to live in a `static`; the first successful start wins and later
/// calls hand back the same instance.
pub struct DriverSlot<T> {
    instance: Mutex<Option<Arc<T>>>,
}

impl<T> DriverSlot<T> {
    /// An empty slot, usable in a `static`.
    pub const fn new() -> Self {
        DriverSlot {
            instance: const_mutex(None),
        }
    }

    /// Run `init` unless an instance already exists.
    ///
    /// A failed `init` leaves the slot empty so startup can be retried.
    pub fn start_with<F>(&self, init: F) -> Result<Arc<T>, SonarError>
    where
        F: FnOnce() -> Result<T, SonarError>,
    {
        let mut slot = self.instance.lock();
        if let Some(existing) = slot.as_ref() {
            debug!("driver already started");
            return Ok(Arc::clone(existing));
        }
        let instance = Arc::new(init()?);
        *slot = Some(Arc::clone(&instance));
        Ok(instance)
    }

    /// The started instance, if any.
    pub fn get(&self) -> Option<Arc<T>> {
        self.instance.lock().clone()
    }

    /// `true` once a start has succeeded.
    pub fn is_started(&self) -> bool {
        self.instance.lock().is_some()
    }
}

impl<T> Default for DriverSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the ranging device in `slot`.
///
/// `hardware` is only called on the first start, so peripherals are claimed
/// once. Calling this again is a no-op returning the running device.
pub fn start<C, P, D, E, B, H>(
    slot: &DriverSlot<RangeDevice<C, P, D, E, B>>,
    hardware: H,
    config: RangingConfig,
) -> Result<Arc<RangeDevice<C, P, D, E, B>>, SonarError>
where
    C: CycleCounter + Send + Sync + 'static,
    P: OutputPin,
    D: DelayNs,
    E: EchoLine,
    B: DeviceBase,
    H: FnOnce() -> Hardware<C, P, D, E, B>,
{
    slot.start_with(|| RangeDevice::init(hardware(), config))
}
