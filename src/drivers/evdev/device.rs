//! Hardware side of the evdev backend, built on the `evdev` crate.

use super::axis::{AbsAxes, AbsRange, ABS_X, ABS_Y};
use super::keys::{self, BTN_TOUCH, DIRECTION_KEYS, KEY_CNT, KEY_NAMES, KEY_POWER, KEY_SLEEP};
use super::PREFIX;
use crate::binds::{ActionMasks, BindTable, BIND_TYPE_COUNT};
use crate::driver::{ConfigOption, DeviceBackend, KeyEvent, KeyNames, ProbedDevice, WaitHandle};
use crate::error::{InputError, Result};
use crate::menu::MenuButtons;
use evdev::{AbsoluteAxisType, Device, EventType, InputEvent, Key};
use log::{debug, info};
use std::collections::VecDeque;
use std::io;
use std::os::unix::io::AsRawFd;

pub(super) struct EvdevDevice {
    dev: Device,
    name: String,
    axes: AbsAxes,
    kc_first: u16,
    kc_last: u16,
    /// Key state kept from events when the kernel can't be asked for it
    tracked: Option<Vec<bool>>,
    pending: VecDeque<InputEvent>,
}

/// Events of one read; a non-blocking device with nothing queued reads as empty.
fn read_outcome(name: &str, fetched: io::Result<Vec<InputEvent>>) -> Result<Vec<InputEvent>> {
    match fetched {
        Ok(events) => Ok(events),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(Vec::new()),
        Err(err) => Err(InputError::device_io_source(name, err)),
    }
}

pub(super) fn probe(allow_abs_only: bool) -> Vec<ProbedDevice> {
    let mut found = Vec::new();
    for (path, dev) in evdev::enumerate() {
        match EvdevDevice::inspect(dev, allow_abs_only) {
            Ok(Some(device)) => found.push(device),
            Ok(None) => debug!("in_evdev: skipping {}", path.display()),
            Err(err) => debug!("in_evdev: {}: {err}", path.display()),
        }
    }
    found
}

fn set_nonblocking(dev: &Device, nonblocking: bool) -> io::Result<()> {
    let fd = dev.as_raw_fd();

    // SAFETY: fcntl on a descriptor owned by `dev` for the duration of the call.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn is_nonblocking(dev: &Device) -> io::Result<bool> {
    // SAFETY: fcntl on a descriptor owned by `dev` for the duration of the call.
    let flags = unsafe { libc::fcntl(dev.as_raw_fd(), libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags & libc::O_NONBLOCK != 0)
}

impl EvdevDevice {
    /// Decide whether an event node is usable and wrap it.
    fn inspect(dev: Device, allow_abs_only: bool) -> io::Result<Option<ProbedDevice>> {
        let mut count = 0;
        let mut kc_first = KEY_CNT as u16 - 1;
        let mut kc_last = 0;

        if let Some(supported) = dev.supported_keys() {
            for key in supported.iter() {
                let code = key.code();
                // touchscreens need a different kind of driver
                if code == BTN_TOUCH {
                    return Ok(None);
                }
                kc_first = kc_first.min(code);
                kc_last = kc_last.max(code);
                if code != KEY_POWER && code != KEY_SLEEP {
                    count += 1;
                }
            }
        }

        if count == 0 && !allow_abs_only {
            return Ok(None);
        }

        let axes = match dev.supported_absolute_axes() {
            Some(abs)
                if abs.contains(AbsoluteAxisType::ABS_X) || abs.contains(AbsoluteAxisType::ABS_Y) =>
            {
                let state = dev.get_abs_state()?;
                let range = |axis: AbsoluteAxisType| {
                    abs.contains(axis).then(|| {
                        let info = &state[axis.0 as usize];
                        AbsRange {
                            min: info.minimum,
                            max: info.maximum,
                        }
                    })
                };
                AbsAxes::new(range(AbsoluteAxisType::ABS_X), range(AbsoluteAxisType::ABS_Y))
            }
            _ => AbsAxes::default(),
        };

        if count == 0 && !axes.is_active() {
            return Ok(None);
        }

        set_nonblocking(&dev, true)?;

        let tracked = match dev.get_key_state() {
            Ok(_) => None,
            Err(_) => {
                info!("in_evdev: key state not readable, will have to track it");
                Some(vec![false; KEY_CNT])
            }
        };

        let name = format!("{PREFIX}{}", dev.name().unwrap_or("Unnamed"));
        info!("in_evdev: found \"{}\" with {count} keys", &name[PREFIX.len()..]);

        let handle = WaitHandle(dev.as_raw_fd());
        let device = EvdevDevice {
            dev,
            name: name.clone(),
            axes,
            kc_first,
            kc_last,
            tracked,
            pending: VecDeque::new(),
        };

        Ok(Some(
            ProbedDevice::new(name, KEY_CNT, Box::new(device))
                .with_handle(handle)
                .with_key_names(KeyNames::Static(&KEY_NAMES)),
        ))
    }

    fn io_error(&self, err: io::Error) -> InputError {
        InputError::device_io_source(&self.name, err)
    }

    /// Next buffered event, reading the device when the buffer is empty.
    fn next_raw(&mut self) -> Result<Option<InputEvent>> {
        if let Some(ev) = self.pending.pop_front() {
            return Ok(Some(ev));
        }
        let fetched = self.dev.fetch_events().map(|events| events.collect());
        let events = read_outcome(&self.name, fetched)?;
        self.pending.extend(events);
        Ok(self.pending.pop_front())
    }

    fn drain_raw(&mut self) -> Result<Vec<InputEvent>> {
        let mut events = Vec::new();
        while let Some(ev) = self.next_raw()? {
            events.push(ev);
        }
        Ok(events)
    }

    fn set_blocking(&mut self, blocking: bool) -> Result<()> {
        if is_nonblocking(&self.dev).map_err(|e| self.io_error(e))? {
            // drop whatever queued up while nobody was reading
            self.pending.clear();
            while let Ok(events) = self.dev.fetch_events() {
                if events.count() == 0 {
                    break;
                }
            }
        }
        set_nonblocking(&self.dev, !blocking).map_err(|e| self.io_error(e))
    }
}

impl DeviceBackend for EvdevDevice {
    /// Zero binds of keys the device doesn't have; a stick counts as arrow keys.
    fn clean_binds(&mut self, binds: &mut BindTable) -> usize {
        let key_count = binds.key_count();
        let supported = self.dev.supported_keys();
        let stick = self.axes.is_active();
        let has_key = |code: usize| {
            let Ok(code) = u16::try_from(code) else {
                return false;
            };
            (stick && DIRECTION_KEYS.contains(&code))
                || supported.is_some_and(|keys| keys.contains(Key::new(code)))
        };

        let (live, defaults) = binds.halves_mut();
        let mut count = 0;
        for key in 0..key_count {
            let present = has_key(key);
            for offs in key * BIND_TYPE_COUNT..(key + 1) * BIND_TYPE_COUNT {
                if !present {
                    live[offs] = 0;
                    defaults[offs] = 0;
                }
                if live[offs] != 0 {
                    count += 1;
                }
            }
        }
        count
    }

    fn set_config(&mut self, option: ConfigOption, value: i32) -> Result<()> {
        match option {
            ConfigOption::Blocking => self.set_blocking(value != 0),
            ConfigOption::AbsDeadZone => self.axes.set_dead_zone_percent(value),
            _ => Err(option.unknown()),
        }
    }

    fn update_keycode(&mut self) -> Result<Option<KeyEvent>> {
        let Some(ev) = self.next_raw()? else {
            return Ok(None);
        };

        match ev.event_type() {
            // value 2 is autorepeat
            EventType::KEY => Ok(match ev.value() {
                0 => Some(KeyEvent::up(u32::from(ev.code()))),
                1 => Some(KeyEvent::down(u32::from(ev.code()))),
                _ => None,
            }),
            EventType::ABSOLUTE => Ok(self.axes.translate(ev.code(), ev.value())),
            _ => Ok(None),
        }
    }

    fn update(&mut self, binds: &BindTable, result: &mut ActionMasks) -> Result<()> {
        let range = usize::from(self.kc_first)..=usize::from(self.kc_last);

        if self.tracked.is_some() {
            let events = self.drain_raw()?;
            if let Some(held) = self.tracked.as_mut() {
                for ev in events.iter().filter(|ev| ev.event_type() == EventType::KEY) {
                    if let Some(slot) = held.get_mut(usize::from(ev.code())) {
                        match ev.value() {
                            0 => *slot = false,
                            1 => *slot = true,
                            _ => {}
                        }
                    }
                }
                for (code, _) in held.iter().enumerate().filter(|(_, down)| **down) {
                    if range.contains(&code) {
                        binds.or_key_into(code, result);
                    }
                }
            }
        } else {
            let state = self.dev.get_key_state().map_err(|e| self.io_error(e))?;
            for key in state.iter() {
                let code = usize::from(key.code());
                if range.contains(&code) {
                    binds.or_key_into(code, result);
                }
            }
        }

        if self.axes.is_active() {
            if let Ok(abs) = self.dev.get_abs_state() {
                let x = abs[usize::from(ABS_X)].value;
                let y = abs[usize::from(ABS_Y)].value;
                for key in self.axes.held_directions(x, y) {
                    binds.or_key_into(usize::from(key), result);
                }
            }
        }
        Ok(())
    }

    fn menu_button(&self, code: u32) -> MenuButtons {
        keys::menu_button(code)
    }

    fn menu_keycode(&self, button: MenuButtons) -> Option<u32> {
        keys::menu_keycode(button, self.kc_first, self.kc_last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_nonblocking_read_is_not_an_error() {
        let fetched = Err(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(read_outcome("evdev:Pad", fetched).unwrap().is_empty());
    }

    #[test]
    fn failed_read_names_the_device() {
        let key = InputEvent::new(EventType::KEY, 28, 1);
        assert_eq!(read_outcome("evdev:Pad", Ok(vec![key])).unwrap().len(), 1);

        let err = read_outcome("evdev:Pad", Err(io::Error::from_raw_os_error(libc::ENODEV)))
            .unwrap_err();
        assert!(err.is_device_io());
        assert!(err.to_string().contains("evdev:Pad"));
    }
}
