//! Linux evdev backend.
//!
//! Every `/dev/input/event*` node with keys (or an analog stick) becomes a device
//! named `evdev:<kernel name>`. Touchscreens are skipped. The key naming and menu
//! tables work on every platform; probing needs Linux and the `evdev` feature.

pub mod axis;
pub mod keys;

#[cfg(all(target_os = "linux", feature = "evdev"))]
mod device;

use super::{fill_default_binds, DefaultBind};
use crate::driver::{Driver, KeyLayout, KeyNames, ProbedDevice};
use keys::{KEY_CNT, KEY_NAMES};

pub const PREFIX: &str = "evdev:";

#[derive(Debug, Clone, Default)]
pub struct EvdevDriver {
    default_binds: Vec<DefaultBind>,
    allow_abs_only: bool,
}

impl EvdevDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory binds of the host platform, applied to every evdev device.
    pub fn with_default_binds(mut self, binds: impl IntoIterator<Item = DefaultBind>) -> Self {
        self.default_binds = binds.into_iter().collect();
        self
    }

    /// Also register devices that only have an analog stick.
    pub fn allow_abs_only(mut self, allow: bool) -> Self {
        self.allow_abs_only = allow;
        self
    }
}

impl Driver for EvdevDriver {
    fn prefix(&self) -> &'static str {
        PREFIX
    }

    fn probe(&mut self) -> Vec<ProbedDevice> {
        #[cfg(all(target_os = "linux", feature = "evdev"))]
        {
            device::probe(self.allow_abs_only)
        }
        #[cfg(not(all(target_os = "linux", feature = "evdev")))]
        {
            log::debug!("in_evdev: not available on this build");
            Vec::new()
        }
    }

    fn key_layout(&self) -> KeyLayout {
        KeyLayout {
            key_count: KEY_CNT,
            names: Some(KeyNames::Static(&KEY_NAMES)),
        }
    }

    fn default_binds(&self, defaults: &mut [u32]) {
        fill_default_binds(defaults, &self.default_binds);
    }

    fn key_code(&self, name: &str) -> Option<u32> {
        keys::key_code(name)
    }

    fn key_name(&self, code: u32) -> Option<&'static str> {
        keys::key_name(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binds::{bind_offset, BindType, BIND_TYPE_COUNT};
    use crate::driver::{DriverId, DriverTable};
    use crate::registry::Registry;

    #[test]
    fn configured_devices_get_the_full_key_space() {
        let mut drivers = DriverTable::new();
        drivers.install(
            DriverId::Evdev,
            Box::new(EvdevDriver::new().with_default_binds([DefaultBind::new(
                keys::KEY_UP,
                BindType::Player12,
                0,
            )])),
        );
        let mut reg = Registry::new(drivers, &Default::default());

        let id = reg.config_parse_dev("evdev:Some Pad").unwrap();
        assert_eq!(reg.device(id).unwrap().key_count(), KEY_CNT);
        assert_eq!(reg.key_name(id, u32::from(keys::KEY_LEFT)), "Left");

        reg.config_bind_key(id, "enter", 0b10, Some(BindType::Emu)).unwrap();
        let live = reg.dev_binds(id).unwrap();
        assert_eq!(live.len(), KEY_CNT * BIND_TYPE_COUNT);
        assert_eq!(live[bind_offset(usize::from(keys::KEY_ENTER), BindType::Emu)], 0b10);
        assert_eq!(live[bind_offset(usize::from(keys::KEY_UP), BindType::Player12)], 1);
    }
}
