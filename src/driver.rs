//! Driver contract implemented by every input backend.
//!
//! A backend is split in two: a process-lifetime [`Driver`] that probes for devices
//! and knows the key naming of its device family, and one [`DeviceBackend`] per
//! discovered device that owns the driver-private handle and state. The registry
//! only ever talks to these two traits.

pub mod null;

use crate::binds::{ActionMasks, BindTable};
use crate::error::{InputError, Result};
use crate::menu::MenuButtons;
use std::fmt;
use std::sync::Arc;

pub use null::NullDriver;

/// Small enumerated id of an installed driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DriverId {
    Unknown,
    Evdev,
    GpioPad,
    VirtualKbd,
}

impl DriverId {
    pub const COUNT: usize = 4;
    pub const ALL: [DriverId; Self::COUNT] = [
        DriverId::Unknown,
        DriverId::Evdev,
        DriverId::GpioPad,
        DriverId::VirtualKbd,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Handle a blocking multiplexed wait can sleep on (a file descriptor on unix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitHandle(pub i32);

/// Single raw key transition reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u32,
    pub down: bool,
}

impl KeyEvent {
    pub fn down(code: u32) -> Self {
        Self { code, down: true }
    }

    pub fn up(code: u32) -> Self {
        Self { code, down: false }
    }
}

/// Options readable or writable through `get_config`/`set_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOption {
    /// Number of keys (bind rows) of the device
    BindCount,
    /// Whether combo resolution applies to the device
    DoesCombos,
    /// Blocking reads on/off
    Blocking,
    /// Per-device key name table
    KeyNames,
    /// Analog dead zone in percent, 1..=99
    AbsDeadZone,
}

impl ConfigOption {
    pub(crate) fn unknown(self) -> InputError {
        InputError::UnknownOption {
            option: format!("{self:?}"),
        }
    }

    pub(crate) fn not_implemented(self) -> InputError {
        InputError::NotImplemented {
            option: format!("{self:?}"),
        }
    }
}

/// Key name table, either a driver's static table or one supplied at runtime.
#[derive(Debug, Clone)]
pub enum KeyNames {
    Static(&'static [Option<&'static str>]),
    Owned(Arc<[Option<String>]>),
}

impl KeyNames {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let owned: Vec<Option<String>> = names.into_iter().map(|n| n.map(Into::into)).collect();
        Self::Owned(owned.into())
    }

    pub fn len(&self) -> usize {
        match self {
            KeyNames::Static(names) => names.len(),
            KeyNames::Owned(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, code: usize) -> Option<&str> {
        match self {
            KeyNames::Static(names) => names.get(code).copied().flatten(),
            KeyNames::Owned(names) => names.get(code).and_then(|n| n.as_deref()),
        }
    }

    /// Case-insensitive reverse lookup among the first `key_count` names.
    pub fn position(&self, name: &str, key_count: usize) -> Option<usize> {
        (0..key_count.min(self.len()))
            .find(|&code| self.get(code).is_some_and(|k| k.eq_ignore_ascii_case(name)))
    }
}

/// Key space a driver reports for devices known only from configuration.
#[derive(Debug, Clone, Default)]
pub struct KeyLayout {
    pub key_count: usize,
    pub names: Option<KeyNames>,
}

/// Everything a driver hands over when it discovers a device.
pub struct ProbedDevice {
    pub name: String,
    /// `None` marks an async-only device that must be spin-polled.
    pub handle: Option<WaitHandle>,
    pub backend: Box<dyn DeviceBackend>,
    pub key_count: usize,
    pub key_names: Option<KeyNames>,
    pub does_combos: bool,
}

impl ProbedDevice {
    pub fn new(name: impl Into<String>, key_count: usize, backend: Box<dyn DeviceBackend>) -> Self {
        Self {
            name: name.into(),
            handle: None,
            backend,
            key_count,
            key_names: None,
            does_combos: false,
        }
    }

    pub fn with_handle(mut self, handle: WaitHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn with_key_names(mut self, names: KeyNames) -> Self {
        self.key_names = Some(names);
        self
    }

    pub fn with_combos(mut self, does_combos: bool) -> Self {
        self.does_combos = does_combos;
        self
    }
}

impl fmt::Debug for ProbedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbedDevice")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("key_count", &self.key_count)
            .field("does_combos", &self.does_combos)
            .finish_non_exhaustive()
    }
}

/// Process-lifetime side of a backend.
pub trait Driver {
    /// Name prefix of every device this driver registers, e.g. `"evdev:"`.
    fn prefix(&self) -> &'static str;

    /// Scan for devices. Called on every registry probe.
    fn probe(&mut self) -> Vec<ProbedDevice> {
        Vec::new()
    }

    /// Release a device's driver-owned resources.
    fn free(&mut self, device: Box<dyn DeviceBackend>) {
        drop(device);
    }

    /// Key count and names for devices created from configuration.
    fn key_layout(&self) -> KeyLayout {
        KeyLayout::default()
    }

    /// Fill a zeroed `key_count * BIND_TYPE_COUNT` buffer with factory binds.
    fn default_binds(&self, _defaults: &mut [u32]) {}

    fn key_code(&self, _name: &str) -> Option<u32> {
        None
    }

    fn key_name(&self, _code: u32) -> Option<&'static str> {
        None
    }
}

/// Per-device side of a backend: the opaque handle and state of one device.
pub trait DeviceBackend {
    /// Prune binds of keys the device lacks and return the number of nonzero
    /// live entries left. Zero makes the registry drop the table.
    fn clean_binds(&mut self, binds: &mut BindTable) -> usize {
        binds.count_bound()
    }

    fn get_config(&self, option: ConfigOption) -> Result<i32> {
        Err(option.unknown())
    }

    fn set_config(&mut self, option: ConfigOption, _value: i32) -> Result<()> {
        Err(option.unknown())
    }

    /// Read at most one key transition. `Ok(None)` means no event yet; an error
    /// makes the registry evict the device.
    fn update_keycode(&mut self) -> Result<Option<KeyEvent>>;

    /// OR the binds of every held key into `result`.
    fn update(&mut self, _binds: &BindTable, _result: &mut ActionMasks) -> Result<()> {
        Ok(())
    }

    /// Raw keycode to logical menu button, empty when the key has no menu role.
    fn menu_button(&self, _code: u32) -> MenuButtons {
        MenuButtons::empty()
    }

    /// Representative raw keycode for a menu button, if the device has one.
    fn menu_keycode(&self, _button: MenuButtons) -> Option<u32> {
        None
    }
}

/// One driver per [`DriverId`]; ids without an installed backend get a [`NullDriver`].
pub struct DriverTable {
    drivers: Vec<Box<dyn Driver>>,
}

impl DriverTable {
    pub fn new() -> Self {
        Self {
            drivers: DriverId::ALL
                .iter()
                .map(|_| Box::new(NullDriver) as Box<dyn Driver>)
                .collect(),
        }
    }

    pub fn install(&mut self, id: DriverId, driver: Box<dyn Driver>) {
        self.drivers[id.index()] = driver;
    }

    pub fn get(&self, id: DriverId) -> &dyn Driver {
        self.drivers[id.index()].as_ref()
    }

    pub fn get_mut(&mut self, id: DriverId) -> &mut dyn Driver {
        self.drivers[id.index()].as_mut()
    }

    /// Driver whose prefix starts `name`. The null driver's `none:` prefix never
    /// matches a real device.
    pub fn by_prefix(&self, name: &str) -> Option<DriverId> {
        DriverId::ALL
            .into_iter()
            .find(|id| name.starts_with(self.get(*id).prefix()))
    }
}

impl Default for DriverTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Prefixed(&'static str);

    impl Driver for Prefixed {
        fn prefix(&self) -> &'static str {
            self.0
        }
    }

    #[test]
    fn empty_table_degrades_to_null_drivers() {
        let mut table = DriverTable::new();
        for id in DriverId::ALL {
            assert_eq!(table.get(id).prefix(), "none:");
            assert!(table.get_mut(id).probe().is_empty());
        }
        assert_eq!(table.by_prefix("evdev:Pad"), None);
    }

    #[test]
    fn prefix_lookup_finds_installed_driver() {
        let mut table = DriverTable::new();
        table.install(DriverId::Evdev, Box::new(Prefixed("evdev:")));
        table.install(DriverId::VirtualKbd, Box::new(Prefixed("vkbd:")));
        assert_eq!(table.by_prefix("evdev:Pad"), Some(DriverId::Evdev));
        assert_eq!(table.by_prefix("vkbd:Keyboard"), Some(DriverId::VirtualKbd));
        assert_eq!(table.by_prefix("gpio:Pad"), None);
    }

    #[test]
    fn key_names_lookup_is_case_insensitive() {
        static NAMES: [Option<&str>; 3] = [Some("Up"), None, Some("Start")];
        let names = KeyNames::Static(&NAMES);
        assert_eq!(names.position("start", 3), Some(2));
        assert_eq!(names.position("start", 2), None);
        assert_eq!(names.get(1), None);

        let owned = KeyNames::from_names([Some("A"), Some("B")]);
        assert_eq!(owned.len(), 2);
        assert_eq!(owned.get(1), Some("B"));
        assert_eq!(owned.position("a", 2), Some(0));
    }
}
