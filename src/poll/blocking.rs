//! Multiplexed blocking wait over device handles.

use super::{read_device, Deadline, DeviceEvent, PollStrategy};
use crate::driver::WaitHandle;
use crate::error::{InputError, Result};
use crate::registry::Registry;
use log::trace;
use std::time::Duration;

/// Sleeps until one of `handles` is readable.
///
/// Returns the ready handles; an empty list means nothing became ready (timeout
/// or an interrupted wait), and the caller re-checks its own deadline.
pub trait HandleWaiter {
    fn wait(&mut self, handles: &[WaitHandle], timeout: Option<Duration>) -> Result<Vec<WaitHandle>>;
}

/// `poll(2)` on the raw file descriptors.
#[derive(Debug, Default, Clone, Copy)]
pub struct PollWaiter;

#[cfg(unix)]
impl HandleWaiter for PollWaiter {
    fn wait(&mut self, handles: &[WaitHandle], timeout: Option<Duration>) -> Result<Vec<WaitHandle>> {
        let mut fds: Vec<libc::pollfd> = handles
            .iter()
            .map(|handle| libc::pollfd {
                fd: handle.0,
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        // round up so sub-millisecond remainders don't turn into busy loops
        let timeout_ms = match timeout {
            None => -1,
            Some(t) => t.as_nanos().div_ceil(1_000_000).min(libc::c_int::MAX as u128) as libc::c_int,
        };

        // SAFETY: `fds` is a live, correctly sized array of pollfd for the whole call.
        let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(Vec::new());
            }
            return Err(InputError::Wait { source: err });
        }

        Ok(fds
            .iter()
            .filter(|fd| fd.revents != 0)
            .map(|fd| WaitHandle(fd.fd))
            .collect())
    }
}

#[cfg(not(unix))]
impl HandleWaiter for PollWaiter {
    fn wait(&mut self, _handles: &[WaitHandle], _timeout: Option<Duration>) -> Result<Vec<WaitHandle>> {
        Err(InputError::Wait {
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "handle waits need a unix host",
            ),
        })
    }
}

/// Strategy for registries whose every probed device has a wait handle.
pub struct BlockingPoll {
    waiter: Box<dyn HandleWaiter>,
}

impl BlockingPoll {
    pub fn new(waiter: Box<dyn HandleWaiter>) -> Self {
        Self { waiter }
    }

    pub fn set_waiter(&mut self, waiter: Box<dyn HandleWaiter>) {
        self.waiter = waiter;
    }
}

impl Default for BlockingPoll {
    fn default() -> Self {
        Self::new(Box::new(PollWaiter))
    }
}

impl PollStrategy for BlockingPoll {
    fn next_event(
        &mut self,
        registry: &mut Registry,
        timeout: Option<Duration>,
    ) -> Result<Option<DeviceEvent>> {
        let deadline = Deadline::after(timeout);

        loop {
            let handles = registry.wait_handles();
            if handles.is_empty() {
                return Err(InputError::NoDevices);
            }

            let ready = self.waiter.wait(&handles, deadline.remaining())?;
            for handle in ready {
                let Some(id) = registry.id_by_handle(handle) else {
                    continue;
                };
                if let Some(event) = read_device(registry, id)? {
                    trace!("input: #{id} code {} down {}", event.code, event.down);
                    return Ok(Some(event));
                }
            }

            if deadline.expired() {
                return Ok(None);
            }
        }
    }
}
