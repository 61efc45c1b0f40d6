//! Scripted in-memory pads for the integration tests.
//!
//! A [`Pad`] is the test's handle on one device: queue key transitions, set the
//! held keys, or unplug it. [`PadDriver`] registers every connected pad on probe.
#![allow(dead_code)]

use padbind::binds::{set_default_bind, ActionMasks, BindTable, BindType};
use padbind::combo::ComboMarks;
use padbind::driver::{
    DeviceBackend, Driver, DriverId, KeyEvent, KeyLayout, KeyNames, ProbedDevice, WaitHandle,
};
use padbind::menu::MenuButtons;
use padbind::poll::HandleWaiter;
use padbind::{InputConfig, InputContext, InputError, NoDevicePolicy, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub const PREFIX: &str = "evdev:";

pub const KEY_UP: u32 = 0;
pub const KEY_DOWN: u32 = 1;
pub const KEY_LEFT: u32 = 2;
pub const KEY_RIGHT: u32 = 3;
pub const KEY_OK: u32 = 4;
pub const KEY_BACK: u32 = 5;

const MENU_MAP: [(u32, MenuButtons); 6] = [
    (KEY_UP, MenuButtons::UP),
    (KEY_DOWN, MenuButtons::DOWN),
    (KEY_LEFT, MenuButtons::LEFT),
    (KEY_RIGHT, MenuButtons::RIGHT),
    (KEY_OK, MenuButtons::MOK),
    (KEY_BACK, MenuButtons::MBACK),
];

#[derive(Debug, Default)]
struct PadState {
    connected: bool,
    unplugged: bool,
    events: VecDeque<KeyEvent>,
    held: u32,
}

#[derive(Debug, Clone)]
pub struct Pad {
    pub name: String,
    pub key_count: usize,
    pub does_combos: bool,
    handle: Option<i32>,
    state: Arc<Mutex<PadState>>,
}

impl Pad {
    pub fn new(name: &str, key_count: usize, does_combos: bool) -> Self {
        Self {
            name: format!("{PREFIX}{name}"),
            key_count,
            does_combos,
            handle: None,
            state: Arc::new(Mutex::new(PadState {
                connected: true,
                ..PadState::default()
            })),
        }
    }

    /// Give the pad a wait handle so it is polled through the blocking path.
    pub fn with_handle(mut self, fd: i32) -> Self {
        self.handle = Some(fd);
        self
    }

    /// Queue a transition and track it in the held mask.
    pub fn push(&self, code: u32, down: bool) {
        let mut state = self.state.lock();
        if down {
            state.held |= 1 << code;
        } else {
            state.held &= !(1 << code);
        }
        state.events.push_back(KeyEvent { code, down });
    }

    pub fn tap(&self, code: u32) {
        self.push(code, true);
        self.push(code, false);
    }

    pub fn hold(&self, held: u32) {
        self.state.lock().held = held;
    }

    /// Reads fail from now on, like a pad pulled out mid-session.
    pub fn unplug(&self) {
        self.state.lock().unplugged = true;
    }

    /// Present or absent on the next probe.
    pub fn set_connected(&self, connected: bool) {
        let mut state = self.state.lock();
        state.connected = connected;
        state.unplugged = !connected;
    }

    pub fn probed(&self) -> ProbedDevice {
        let backend = PadBackend {
            pad: self.clone(),
            marks: ComboMarks::default(),
        };
        let probed = ProbedDevice::new(self.name.clone(), self.key_count, Box::new(backend))
            .with_combos(self.does_combos);
        match self.handle {
            Some(fd) => probed.with_handle(WaitHandle(fd)),
            None => probed,
        }
    }
}

struct PadBackend {
    pad: Pad,
    marks: ComboMarks,
}

impl PadBackend {
    fn check(&self) -> Result<()> {
        if self.pad.state.lock().unplugged {
            return Err(InputError::device_io(&self.pad.name, "unplugged"));
        }
        Ok(())
    }
}

impl DeviceBackend for PadBackend {
    fn clean_binds(&mut self, binds: &mut BindTable) -> usize {
        if self.pad.does_combos {
            self.marks = ComboMarks::find(binds, self.pad.key_count - 1);
        }
        binds.count_bound()
    }

    fn update_keycode(&mut self) -> Result<Option<KeyEvent>> {
        self.check()?;
        Ok(self.pad.state.lock().events.pop_front())
    }

    fn update(&mut self, binds: &BindTable, result: &mut ActionMasks) -> Result<()> {
        self.check()?;
        let held = self.pad.state.lock().held;
        self.marks.sample(held, binds, self.pad.key_count - 1, result);
        Ok(())
    }

    fn menu_button(&self, code: u32) -> MenuButtons {
        MENU_MAP
            .iter()
            .find(|(key, _)| *key == code)
            .map(|(_, button)| *button)
            .unwrap_or_default()
    }

    fn menu_keycode(&self, button: MenuButtons) -> Option<u32> {
        MENU_MAP
            .iter()
            .find(|(_, mapped)| *mapped == button)
            .map(|(key, _)| *key)
    }
}

/// Driver registering every connected pad, with optional factory binds.
#[derive(Default)]
pub struct PadDriver {
    pads: Vec<Pad>,
    defaults: Vec<(usize, BindType, u32)>,
    names: Option<Vec<Option<String>>>,
}

impl PadDriver {
    pub fn new(pads: impl IntoIterator<Item = Pad>) -> Self {
        Self {
            pads: pads.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_default(mut self, key: usize, bind_type: BindType, mask: u32) -> Self {
        self.defaults.push((key, bind_type, mask));
        self
    }

    pub fn with_names(mut self, names: &[Option<&str>]) -> Self {
        self.names = Some(names.iter().map(|n| n.map(str::to_string)).collect());
        self
    }
}

impl Driver for PadDriver {
    fn prefix(&self) -> &'static str {
        PREFIX
    }

    fn probe(&mut self) -> Vec<ProbedDevice> {
        self.pads
            .iter()
            .filter(|pad| pad.state.lock().connected)
            .map(Pad::probed)
            .collect()
    }

    fn key_layout(&self) -> KeyLayout {
        KeyLayout {
            key_count: 8,
            names: self.names.clone().map(KeyNames::from_names),
        }
    }

    fn default_binds(&self, defaults: &mut [u32]) {
        for &(key, bind_type, mask) in &self.defaults {
            set_default_bind(defaults, key, bind_type, mask);
        }
    }

    fn key_name(&self, code: u32) -> Option<&'static str> {
        match code {
            KEY_OK => Some("Confirm"),
            _ => None,
        }
    }

    fn key_code(&self, name: &str) -> Option<u32> {
        name.eq_ignore_ascii_case("Confirm").then_some(KEY_OK)
    }
}

/// Stands in for `poll(2)`: never ready, sleeps out the whole timeout.
pub struct IdleWaiter;

impl HandleWaiter for IdleWaiter {
    fn wait(&mut self, _handles: &[WaitHandle], timeout: Option<Duration>) -> Result<Vec<WaitHandle>> {
        std::thread::sleep(timeout.unwrap_or(Duration::from_millis(50)));
        Ok(Vec::new())
    }
}

pub fn config() -> InputConfig {
    InputConfig {
        no_device_policy: NoDevicePolicy::Error,
        async_poll_interval_ms: 5,
        menu_initial_delay_ms: 30,
        ..InputConfig::default()
    }
}

/// Context with `driver` installed as the evdev backend, already probed.
pub fn context(driver: PadDriver) -> InputContext {
    let mut ctx = InputContext::new(config());
    ctx.install_driver(DriverId::Evdev, Box::new(driver));
    ctx.probe();
    ctx
}
