//! Poll Engine: waits for the next raw key transition on any probed device.
//!
//! Two strategies share one signature. [`BlockingPoll`] sleeps in a multiplexed
//! wait on the device handles; [`SpinPoll`] round-robins devices that cannot be
//! waited on. The context picks one after every probe, depending on whether an
//! async-only device is present.

pub mod blocking;
pub mod spin;

use crate::error::Result;
use crate::registry::{DeviceId, Registry};
use std::time::{Duration, Instant};

pub use blocking::{BlockingPoll, HandleWaiter, PollWaiter};
pub use spin::SpinPoll;

/// A raw key transition and the device it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEvent {
    pub device: DeviceId,
    pub code: u32,
    pub down: bool,
}

/// One way of waiting for device events.
pub trait PollStrategy {
    /// Wait up to `timeout` (`None`: forever) for one event.
    ///
    /// `Ok(None)` means the wait timed out. A device that fails while being read
    /// is evicted and its error returned; `InputError::NoDevices` when nothing
    /// is left to read from.
    fn next_event(
        &mut self,
        registry: &mut Registry,
        timeout: Option<Duration>,
    ) -> Result<Option<DeviceEvent>>;
}

/// Wall-clock end of a wait, re-measured on every loop round.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline(Option<Instant>);

impl Deadline {
    pub(crate) fn after(timeout: Option<Duration>) -> Self {
        Self(timeout.map(|t| Instant::now() + t))
    }

    /// Time left, `None` for an unbounded wait.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|end| end.saturating_duration_since(Instant::now()))
    }

    pub(crate) fn expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}

/// Read one device, evicting it on error.
pub(crate) fn read_device(registry: &mut Registry, id: DeviceId) -> Result<Option<DeviceEvent>> {
    match registry.read_keycode(id) {
        Ok(event) => Ok(event.map(|ev| DeviceEvent {
            device: id,
            code: ev.code,
            down: ev.down,
        })),
        Err(err) => {
            registry.evict(id);
            Err(err)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_deadline_never_expires() {
        let deadline = Deadline::after(None);
        assert_eq!(deadline.remaining(), None);
        assert!(!deadline.expired());
    }

    #[test]
    fn zero_deadline_is_expired_immediately() {
        let deadline = Deadline::after(Some(Duration::ZERO));
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));
    }
}
