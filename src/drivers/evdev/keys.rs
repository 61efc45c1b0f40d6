//! Linux input keycodes the evdev backend names and maps to menu buttons.

use crate::menu::MenuButtons;

/// Size of the Linux key code space (`KEY_MAX + 1`).
pub const KEY_CNT: usize = 0x300;

pub const KEY_ESC: u16 = 1;
pub const KEY_ENTER: u16 = 28;
pub const KEY_LEFTCTRL: u16 = 29;
pub const KEY_A: u16 = 30;
pub const KEY_S: u16 = 31;
pub const KEY_D: u16 = 32;
pub const KEY_LEFTBRACE: u16 = 26;
pub const KEY_RIGHTBRACE: u16 = 27;
pub const KEY_BACKSLASH: u16 = 43;
pub const KEY_RIGHTSHIFT: u16 = 54;
pub const KEY_LEFTALT: u16 = 56;
pub const KEY_RIGHTCTRL: u16 = 97;
pub const KEY_HOME: u16 = 102;
pub const KEY_UP: u16 = 103;
pub const KEY_PAGEUP: u16 = 104;
pub const KEY_LEFT: u16 = 105;
pub const KEY_RIGHT: u16 = 106;
pub const KEY_END: u16 = 107;
pub const KEY_DOWN: u16 = 108;
pub const KEY_PAGEDOWN: u16 = 109;
pub const KEY_POWER: u16 = 116;
pub const KEY_SLEEP: u16 = 142;
pub const BTN_TRIGGER: u16 = 0x120;
pub const BTN_THUMB: u16 = 0x121;
pub const BTN_THUMB2: u16 = 0x122;
pub const BTN_TOP: u16 = 0x123;
pub const BTN_TOP2: u16 = 0x124;
pub const BTN_PINKIE: u16 = 0x125;
pub const BTN_BASE: u16 = 0x126;
pub const BTN_TOUCH: u16 = 0x14a;

/// Keys an analog stick is translated into.
pub const DIRECTION_KEYS: [u16; 4] = [KEY_UP, KEY_DOWN, KEY_LEFT, KEY_RIGHT];

const NAMED_KEYS: &[(u16, &str)] = &[
    (0, "Reserved"),
    (KEY_ESC, "Esc"),
    (2, "1"),
    (3, "2"),
    (4, "3"),
    (5, "4"),
    (6, "5"),
    (7, "6"),
    (8, "7"),
    (9, "8"),
    (10, "9"),
    (11, "0"),
    (12, "Minus"),
    (13, "Equal"),
    (14, "Backspace"),
    (15, "Tab"),
    (16, "Q"),
    (17, "W"),
    (18, "E"),
    (19, "R"),
    (20, "T"),
    (21, "Y"),
    (22, "U"),
    (23, "I"),
    (24, "O"),
    (25, "P"),
    (KEY_LEFTBRACE, "LeftBrace"),
    (KEY_RIGHTBRACE, "RightBrace"),
    (KEY_ENTER, "Enter"),
    (KEY_LEFTCTRL, "LeftControl"),
    (KEY_A, "A"),
    (KEY_S, "S"),
    (KEY_D, "D"),
    (33, "F"),
    (34, "G"),
    (35, "H"),
    (36, "J"),
    (37, "K"),
    (38, "L"),
    (39, "Semicolon"),
    (40, "Apostrophe"),
    (41, "Grave"),
    (42, "LeftShift"),
    (KEY_BACKSLASH, "BackSlash"),
    (44, "Z"),
    (45, "X"),
    (46, "C"),
    (47, "V"),
    (48, "B"),
    (49, "N"),
    (50, "M"),
    (51, "Comma"),
    (52, "Dot"),
    (53, "Slash"),
    (KEY_RIGHTSHIFT, "RightShift"),
    (55, "KPAsterisk"),
    (KEY_LEFTALT, "LeftAlt"),
    (57, "Space"),
    (58, "CapsLock"),
    (59, "F1"),
    (60, "F2"),
    (61, "F3"),
    (62, "F4"),
    (63, "F5"),
    (64, "F6"),
    (65, "F7"),
    (66, "F8"),
    (67, "F9"),
    (68, "F10"),
    (69, "NumLock"),
    (70, "ScrollLock"),
    (71, "KP7"),
    (72, "KP8"),
    (73, "KP9"),
    (74, "KPMinus"),
    (75, "KP4"),
    (76, "KP5"),
    (77, "KP6"),
    (78, "KPPlus"),
    (79, "KP1"),
    (80, "KP2"),
    (81, "KP3"),
    (82, "KP0"),
    (83, "KPDot"),
    (85, "Zenkaku/Hankaku"),
    (86, "102nd"),
    (87, "F11"),
    (88, "F12"),
    (95, "KPJpComma"),
    (96, "KPEnter"),
    (KEY_RIGHTCTRL, "RightCtrl"),
    (98, "KPSlash"),
    (99, "SysRq"),
    (100, "RightAlt"),
    (101, "LineFeed"),
    (KEY_HOME, "Home"),
    (KEY_UP, "Up"),
    (KEY_PAGEUP, "PageUp"),
    (KEY_LEFT, "Left"),
    (KEY_RIGHT, "Right"),
    (KEY_END, "End"),
    (KEY_DOWN, "Down"),
    (KEY_PAGEDOWN, "PageDown"),
    (110, "Insert"),
    (111, "Delete"),
    (112, "Macro"),
    (KEY_POWER, "Power"),
    (138, "Help"),
    (139, "Menu"),
    (KEY_SLEEP, "Sleep"),
    (152, "Coffee"),
    (153, "Direction"),
    (0x100, "Btn0"),
    (0x101, "Btn1"),
    (0x102, "Btn2"),
    (0x103, "Btn3"),
    (0x104, "Btn4"),
    (0x105, "Btn5"),
    (0x106, "Btn6"),
    (0x107, "Btn7"),
    (0x108, "Btn8"),
    (0x109, "Btn9"),
    (0x110, "LeftBtn"),
    (0x111, "RightBtn"),
    (0x112, "MiddleBtn"),
    (0x113, "SideBtn"),
    (0x114, "ExtraBtn"),
    (0x115, "ForwardBtn"),
    (0x116, "BackBtn"),
    (0x117, "TaskBtn"),
    (BTN_TRIGGER, "Trigger"),
    (BTN_THUMB, "ThumbBtn"),
    (BTN_THUMB2, "ThumbBtn2"),
    (BTN_TOP, "TopBtn"),
    (BTN_TOP2, "TopBtn2"),
    (BTN_PINKIE, "PinkieBtn"),
    (BTN_BASE, "BaseBtn"),
    (0x127, "BaseBtn2"),
    (0x128, "BaseBtn3"),
    (0x129, "BaseBtn4"),
    (0x12a, "BaseBtn5"),
    (0x12b, "BaseBtn6"),
    (0x12f, "BtnDead"),
    (0x130, "BtnA"),
    (0x131, "BtnB"),
    (0x132, "BtnC"),
    (0x133, "BtnX"),
    (0x134, "BtnY"),
    (0x135, "BtnZ"),
    (0x136, "BtnTL"),
    (0x137, "BtnTR"),
    (0x138, "BtnTL2"),
    (0x139, "BtnTR2"),
    (0x13a, "BtnSelect"),
    (0x13b, "BtnStart"),
    (0x13c, "BtnMode"),
    (0x13d, "BtnThumbL"),
    (0x13e, "BtnThumbR"),
    (BTN_TOUCH, "Touch"),
    (0x14b, "Stylus"),
    (0x14c, "Stylus2"),
    (0x14d, "Tool Doubletap"),
    (0x14e, "Tool Tripletap"),
    (0x150, "WheelBtn"),
    (0x151, "Gear up"),
    (0x160, "Ok"),
];

const fn build_names() -> [Option<&'static str>; KEY_CNT] {
    let mut names = [None; KEY_CNT];
    let mut i = 0;
    while i < NAMED_KEYS.len() {
        names[NAMED_KEYS[i].0 as usize] = Some(NAMED_KEYS[i].1);
        i += 1;
    }
    names
}

/// Names indexed by keycode, `None` for codes without one.
pub static KEY_NAMES: [Option<&str>; KEY_CNT] = build_names();

pub fn key_name(code: u32) -> Option<&'static str> {
    KEY_NAMES.get(code as usize).copied().flatten()
}

pub fn key_code(name: &str) -> Option<u32> {
    KEY_NAMES
        .iter()
        .position(|n| n.is_some_and(|n| n.eq_ignore_ascii_case(name)))
        .map(|code| code as u32)
}

/// Menu roles of keyboard, Pandora and Caanoo keys. First match wins both ways.
const MENU_MAP: [(u16, MenuButtons); 25] = [
    (KEY_UP, MenuButtons::UP),
    (KEY_DOWN, MenuButtons::DOWN),
    (KEY_LEFT, MenuButtons::LEFT),
    (KEY_RIGHT, MenuButtons::RIGHT),
    // Pandora
    (KEY_END, MenuButtons::MOK),
    (KEY_PAGEDOWN, MenuButtons::MBACK),
    (KEY_HOME, MenuButtons::MA2),
    (KEY_PAGEUP, MenuButtons::MA3),
    (KEY_LEFTCTRL, MenuButtons::MENU),
    (KEY_RIGHTSHIFT, MenuButtons::L),
    (KEY_RIGHTCTRL, MenuButtons::R),
    // Caanoo
    (BTN_THUMB2, MenuButtons::MOK),
    (BTN_THUMB, MenuButtons::MBACK),
    (BTN_TRIGGER, MenuButtons::MA2),
    (BTN_TOP, MenuButtons::MA3),
    (BTN_BASE, MenuButtons::MENU),
    (BTN_TOP2, MenuButtons::L),
    (BTN_PINKIE, MenuButtons::R),
    // keyboards
    (KEY_ENTER, MenuButtons::MOK),
    (KEY_ESC, MenuButtons::MBACK),
    (KEY_A, MenuButtons::MA2),
    (KEY_S, MenuButtons::MA3),
    (KEY_BACKSLASH, MenuButtons::MENU),
    (KEY_LEFTBRACE, MenuButtons::L),
    (KEY_RIGHTBRACE, MenuButtons::R),
];

pub fn menu_button(code: u32) -> MenuButtons {
    MENU_MAP
        .iter()
        .find(|(key, _)| u32::from(*key) == code)
        .map(|(_, button)| *button)
        .unwrap_or_default()
}

/// First key mapped to `button` inside the device's `first..=last` code range.
pub fn menu_keycode(button: MenuButtons, first: u16, last: u16) -> Option<u32> {
    MENU_MAP
        .iter()
        .find(|(key, mapped)| *mapped == button && (first..=last).contains(key))
        .map(|(key, _)| u32::from(*key))
}
