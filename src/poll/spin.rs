//! Round-robin polling for async-only devices.

use super::{read_device, Deadline, DeviceEvent, PollStrategy};
use crate::error::{InputError, Result};
use crate::registry::Registry;
use std::thread;
use std::time::Duration;

/// Asks every probed device for an event, sleeping `interval` between rounds.
#[derive(Debug, Clone, Copy)]
pub struct SpinPoll {
    interval: Duration,
}

impl SpinPoll {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl PollStrategy for SpinPoll {
    fn next_event(
        &mut self,
        registry: &mut Registry,
        timeout: Option<Duration>,
    ) -> Result<Option<DeviceEvent>> {
        let deadline = Deadline::after(timeout);

        loop {
            let ids = registry.probed_ids();
            if ids.is_empty() {
                return Err(InputError::NoDevices);
            }

            for id in ids {
                if let Some(event) = read_device(registry, id)? {
                    return Ok(Some(event));
                }
            }

            let nap = match deadline.remaining() {
                Some(left) if left.is_zero() => return Ok(None),
                Some(left) => left.min(self.interval),
                None => self.interval,
            };
            thread::sleep(nap);
        }
    }
}
