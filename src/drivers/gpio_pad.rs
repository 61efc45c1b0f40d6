//! Built-in handheld buttons behind a GPIO latch.
//!
//! The latch is read as a 32-bit pressed mask, one bit per key. It can't be
//! waited on, so the pad is async-only and gets spin polled. It is the one
//! backend with combo support: binding an emulator action to two buttons makes
//! it a chord.

use super::{fill_default_binds, DefaultBind};
use crate::binds::{ActionMasks, BindTable};
use crate::combo::ComboMarks;
use crate::driver::{DeviceBackend, Driver, KeyEvent, KeyLayout, KeyNames, ProbedDevice};
use crate::error::{InputError, Result};
use crate::menu::MenuButtons;
use log::{debug, info};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

pub const PREFIX: &str = "gpio:";

pub const KEY_COUNT: usize = 16;

pub const KEY_UP: u32 = 0;
pub const KEY_DOWN: u32 = 1;
pub const KEY_LEFT: u32 = 2;
pub const KEY_RIGHT: u32 = 3;
pub const KEY_A: u32 = 4;
pub const KEY_B: u32 = 5;
pub const KEY_X: u32 = 6;
pub const KEY_Y: u32 = 7;
pub const KEY_L: u32 = 8;
pub const KEY_R: u32 = 9;
pub const KEY_START: u32 = 10;
pub const KEY_SELECT: u32 = 11;
pub const KEY_MENU: u32 = 15;

static KEY_NAMES: [Option<&str>; KEY_COUNT] = [
    Some("Up"),
    Some("Down"),
    Some("Left"),
    Some("Right"),
    Some("A"),
    Some("B"),
    Some("X"),
    Some("Y"),
    Some("L"),
    Some("R"),
    Some("Start"),
    Some("Select"),
    Some("Vol+"),
    Some("Vol-"),
    Some("Push"),
    Some("Menu"),
];

const MENU_MAP: [(u32, MenuButtons); 11] = [
    (KEY_UP, MenuButtons::UP),
    (KEY_DOWN, MenuButtons::DOWN),
    (KEY_LEFT, MenuButtons::LEFT),
    (KEY_RIGHT, MenuButtons::RIGHT),
    (KEY_B, MenuButtons::MOK),
    (KEY_X, MenuButtons::MBACK),
    (KEY_A, MenuButtons::MA2),
    (KEY_Y, MenuButtons::MA3),
    (KEY_L, MenuButtons::L),
    (KEY_R, MenuButtons::R),
    (KEY_MENU, MenuButtons::MENU),
];

const KEY_MASK: u32 = (1 << KEY_COUNT) - 1;

/// Source of the pressed-buttons mask.
pub trait ButtonLatch: Send + Sync {
    fn read(&self) -> io::Result<u32>;
}

/// Latch held in memory, for hosts that read the hardware themselves and for tests.
#[derive(Debug, Default)]
pub struct MemoryLatch {
    pressed: AtomicU32,
    failed: AtomicBool,
}

impl MemoryLatch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, pressed: u32) {
        self.pressed.store(pressed, Ordering::Relaxed);
    }

    pub fn press(&self, key: u32) {
        self.pressed.fetch_or(1 << key, Ordering::Relaxed);
    }

    pub fn release(&self, key: u32) {
        self.pressed.fetch_and(!(1 << key), Ordering::Relaxed);
    }

    /// Make every following read fail, as an unplugged pad would.
    pub fn fail(&self, failed: bool) {
        self.failed.store(failed, Ordering::Relaxed);
    }
}

impl ButtonLatch for MemoryLatch {
    fn read(&self) -> io::Result<u32> {
        if self.failed.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "latch gone"));
        }
        Ok(self.pressed.load(Ordering::Relaxed))
    }
}

pub struct GpioPadDriver {
    latch: Arc<dyn ButtonLatch>,
    name: String,
    default_binds: Vec<DefaultBind>,
}

impl GpioPadDriver {
    pub fn new(name: impl Into<String>, latch: Arc<dyn ButtonLatch>) -> Self {
        Self {
            latch,
            name: name.into(),
            default_binds: Vec::new(),
        }
    }

    pub fn with_default_binds(mut self, binds: impl IntoIterator<Item = DefaultBind>) -> Self {
        self.default_binds = binds.into_iter().collect();
        self
    }
}

impl Driver for GpioPadDriver {
    fn prefix(&self) -> &'static str {
        PREFIX
    }

    fn probe(&mut self) -> Vec<ProbedDevice> {
        let prev = match self.latch.read() {
            Ok(pressed) => pressed & KEY_MASK,
            Err(err) => {
                debug!("in_gpio: latch not readable: {err}");
                return Vec::new();
            }
        };

        let name = format!("{PREFIX}{}", self.name);
        info!("in_gpio: found \"{}\"", self.name);
        let device = GpioPad {
            latch: Arc::clone(&self.latch),
            name: name.clone(),
            prev,
            marks: ComboMarks::default(),
        };
        vec![ProbedDevice::new(name, KEY_COUNT, Box::new(device))
            .with_key_names(KeyNames::Static(&KEY_NAMES))
            .with_combos(true)]
    }

    fn key_layout(&self) -> KeyLayout {
        KeyLayout {
            key_count: KEY_COUNT,
            names: Some(KeyNames::Static(&KEY_NAMES)),
        }
    }

    fn default_binds(&self, defaults: &mut [u32]) {
        fill_default_binds(defaults, &self.default_binds);
    }
}

struct GpioPad {
    latch: Arc<dyn ButtonLatch>,
    name: String,
    /// Pressed mask as last reported through `update_keycode`
    prev: u32,
    marks: ComboMarks,
}

impl GpioPad {
    fn read(&self) -> Result<u32> {
        self.latch
            .read()
            .map(|pressed| pressed & KEY_MASK)
            .map_err(|err| InputError::device_io_source(&self.name, err))
    }
}

impl DeviceBackend for GpioPad {
    /// Recomputes combo markings; every key exists, so nothing is pruned.
    fn clean_binds(&mut self, binds: &mut BindTable) -> usize {
        self.marks = ComboMarks::find(binds, KEY_COUNT - 1);
        binds.count_bound()
    }

    /// Reports the lowest changed key; other changes follow on later calls.
    fn update_keycode(&mut self) -> Result<Option<KeyEvent>> {
        let pressed = self.read()?;
        let changed = pressed ^ self.prev;
        if changed == 0 {
            return Ok(None);
        }

        let bit = changed & changed.wrapping_neg();
        self.prev ^= bit;
        Ok(Some(KeyEvent {
            code: bit.trailing_zeros(),
            down: pressed & bit != 0,
        }))
    }

    fn update(&mut self, binds: &BindTable, result: &mut ActionMasks) -> Result<()> {
        let pressed = self.read()?;
        self.marks.sample(pressed, binds, KEY_COUNT - 1, result);
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
