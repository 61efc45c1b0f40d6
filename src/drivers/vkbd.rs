//! Virtual keyboard layer.
//!
//! An on-screen keyboard draws itself and pushes key transitions through a
//! [`VirtualKeyboard`] handle; the device side hands them to the poll engine one
//! at a time. Nothing can be waited on, so the device is async-only.

use crate::binds::{ActionMasks, BindTable};
use crate::driver::{DeviceBackend, Driver, KeyEvent, KeyLayout, KeyNames, ProbedDevice};
use crate::error::{InputError, Result};
use crate::menu::MenuButtons;
use log::info;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub const PREFIX: &str = "vkbd:";

const DEVICE_NAME: &str = "vkbd:Virtual Keyboard";

/// ASCII plus four arrow keys.
pub const KEY_COUNT: usize = 0x84;

pub const KEY_BACKSPACE: u32 = 0x08;
pub const KEY_TAB: u32 = 0x09;
pub const KEY_ENTER: u32 = 0x0d;
pub const KEY_ESC: u32 = 0x1b;
pub const KEY_SPACE: u32 = 0x20;
pub const KEY_UP: u32 = 0x80;
pub const KEY_DOWN: u32 = 0x81;
pub const KEY_LEFT: u32 = 0x82;
pub const KEY_RIGHT: u32 = 0x83;

const NAMED_KEYS: [(u32, &str); 9] = [
    (KEY_BACKSPACE, "Backspace"),
    (KEY_TAB, "Tab"),
    (KEY_ENTER, "Enter"),
    (KEY_ESC, "Esc"),
    (KEY_SPACE, "Space"),
    (KEY_UP, "Up"),
    (KEY_DOWN, "Down"),
    (KEY_LEFT, "Left"),
    (KEY_RIGHT, "Right"),
];

const fn build_names() -> [Option<&'static str>; KEY_COUNT] {
    let mut names = [None; KEY_COUNT];
    let mut i = 0;
    while i < NAMED_KEYS.len() {
        names[NAMED_KEYS[i].0 as usize] = Some(NAMED_KEYS[i].1);
        i += 1;
    }
    names
}

static KEY_NAMES: [Option<&str>; KEY_COUNT] = build_names();

const MENU_MAP: [(u32, MenuButtons); 11] = [
    (KEY_UP, MenuButtons::UP),
    (KEY_DOWN, MenuButtons::DOWN),
    (KEY_LEFT, MenuButtons::LEFT),
    (KEY_RIGHT, MenuButtons::RIGHT),
    (KEY_ENTER, MenuButtons::MOK),
    (KEY_ESC, MenuButtons::MBACK),
    (KEY_BACKSPACE, MenuButtons::MA2),
    (KEY_SPACE, MenuButtons::MA3),
    (KEY_TAB, MenuButtons::MENU),
    (b'[' as u32, MenuButtons::L),
    (b']' as u32, MenuButtons::R),
];

#[derive(Debug)]
struct KeyboardState {
    connected: bool,
    queue: VecDeque<KeyEvent>,
    held: Vec<bool>,
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self {
            connected: true,
            queue: VecDeque::new(),
            held: vec![false; KEY_COUNT],
        }
    }
}

/// Host-side handle of the virtual keyboard. Clones share one keyboard.
#[derive(Debug, Clone, Default)]
pub struct VirtualKeyboard {
    state: Arc<Mutex<KeyboardState>>,
}

impl VirtualKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, code: u32, down: bool) {
        let mut state = self.state.lock();
        let Some(slot) = state.held.get_mut(code as usize) else {
            return;
        };
        *slot = down;
        state.queue.push_back(KeyEvent { code, down });
    }

    pub fn press(&self, code: u32) {
        self.push(code, true);
    }

    pub fn release(&self, code: u32) {
        self.push(code, false);
    }

    /// Press and release.
    pub fn tap(&self, code: u32) {
        self.press(code);
        self.release(code);
    }

    /// Show or hide the keyboard. A hidden keyboard isn't probed, and a live
    /// device errors out on its next read.
    pub fn set_connected(&self, connected: bool) {
        let mut state = self.state.lock();
        state.connected = connected;
        if !connected {
            state.queue.clear();
            state.held.fill(false);
        }
    }

    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct VirtualKeyboardDriver {
    keyboard: VirtualKeyboard,
}

impl VirtualKeyboardDriver {
    pub fn new(keyboard: VirtualKeyboard) -> Self {
        Self { keyboard }
    }

    pub fn keyboard(&self) -> &VirtualKeyboard {
        &self.keyboard
    }
}

impl Driver for VirtualKeyboardDriver {
    fn prefix(&self) -> &'static str {
        PREFIX
    }

    fn probe(&mut self) -> Vec<ProbedDevice> {
        if !self.keyboard.state.lock().connected {
            return Vec::new();
        }
        info!("in_vkbd: virtual keyboard active");
        let device = VirtualKeyboardDevice {
            keyboard: self.keyboard.clone(),
        };
        vec![ProbedDevice::new(DEVICE_NAME, KEY_COUNT, Box::new(device))
            .with_key_names(KeyNames::Static(&KEY_NAMES))]
    }

    fn key_layout(&self) -> KeyLayout {
        KeyLayout {
            key_count: KEY_COUNT,
            names: Some(KeyNames::Static(&KEY_NAMES)),
        }
    }
}

struct VirtualKeyboardDevice {
    keyboard: VirtualKeyboard,
}

impl DeviceBackend for VirtualKeyboardDevice {
    fn update_keycode(&mut self) -> Result<Option<KeyEvent>> {
        let mut state = self.keyboard.state.lock();
        if !state.connected {
            return Err(InputError::device_io(DEVICE_NAME, "keyboard hidden"));
        }
        Ok(state.queue.pop_front())
    }

    fn update(&mut self, binds: &BindTable, result: &mut ActionMasks) -> Result<()> {
        let state = self.keyboard.state.lock();
        if !state.connected {
            return Err(InputError::device_io(DEVICE_NAME, "keyboard hidden"));
        }
        for (code, _) in state.held.iter().enumerate().filter(|(_, down)| **down) {
            binds.or_key_into(code, result);
        }
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
