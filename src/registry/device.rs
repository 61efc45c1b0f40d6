//! One slot of the device table.

use crate::binds::BindTable;
use crate::driver::{DeviceBackend, DriverId, KeyNames, WaitHandle};
use std::fmt;

/// A physical or virtual input source, present or remembered from configuration.
///
/// A device stays in the table while it is probed or has binds, so user bindings
/// survive a disconnect and reattach when a device with the same name shows up.
pub struct Device {
    pub(crate) driver: DriverId,
    pub(crate) handle: Option<WaitHandle>,
    pub(crate) backend: Option<Box<dyn DeviceBackend>>,
    pub(crate) name: String,
    pub(crate) key_count: usize,
    pub(crate) binds: Option<BindTable>,
    pub(crate) key_names: Option<KeyNames>,
    pub(crate) probed: bool,
    pub(crate) does_combos: bool,
}

impl Device {
    /// Unprobed entry created from configuration.
    pub(crate) fn configured(
        name: String,
        driver: DriverId,
        key_count: usize,
        key_names: Option<KeyNames>,
    ) -> Self {
        Self {
            driver,
            handle: None,
            backend: None,
            name,
            key_count,
            binds: None,
            key_names,
            probed: false,
            does_combos: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn driver(&self) -> DriverId {
        self.driver
    }

    pub fn key_count(&self) -> usize {
        self.key_count
    }

    pub fn is_probed(&self) -> bool {
        self.probed
    }

    pub fn does_combos(&self) -> bool {
        self.does_combos
    }

    pub fn handle(&self) -> Option<WaitHandle> {
        self.handle
    }

    /// Present but only pollable by spinning.
    pub fn is_async_only(&self) -> bool {
        self.probed && self.handle.is_none()
    }

    pub fn binds(&self) -> Option<&BindTable> {
        self.binds.as_ref()
    }

    pub fn key_names(&self) -> Option<&KeyNames> {
        self.key_names.as_ref()
    }

    /// Name without the driver prefix (everything up to the first `:`).
    pub fn short_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, rest)) => rest,
            None => &self.name,
        }
    }

    /// Prune binds through the backend (or by counting when the device is absent)
    /// and drop the table when nothing usable is left.
    pub(crate) fn prune_binds(&mut self) {
        let Some(binds) = self.binds.as_mut() else {
            return;
        };
        let remaining = match self.backend.as_mut() {
            Some(backend) => backend.clean_binds(binds),
            None => binds.count_bound(),
        };
        if remaining == 0 {
            log::debug!("input: \"{}\" has no usable binds, dropping table", self.name);
            self.binds = None;
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("driver", &self.driver)
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("key_count", &self.key_count)
            .field("has_binds", &self.binds.is_some())
            .field("probed", &self.probed)
            .field("does_combos", &self.does_combos)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binds::BindType;

    #[test]
    fn short_name_strips_driver_prefix() {
        let dev = Device::configured("evdev:Pad: left".into(), DriverId::Evdev, 4, None);
        assert_eq!(dev.short_name(), "Pad: left");

        let plain = Device::configured("Keyboard".into(), DriverId::Unknown, 4, None);
        assert_eq!(plain.short_name(), "Keyboard");
    }

    #[test]
    fn absent_device_prunes_by_counting() {
        let mut dev = Device::configured("evdev:Pad".into(), DriverId::Evdev, 4, None);
        let mut table = BindTable::allocate(4, |_| {}).unwrap();
        table.add(1, BindType::Emu, 1);
        dev.binds = Some(table);
        dev.prune_binds();
        assert!(dev.binds.is_some());

        dev.binds.as_mut().unwrap().clear(1, BindType::Emu, 1);
        dev.prune_binds();
        assert!(dev.binds.is_none());
        assert!(!dev.is_async_only());
    }
}
