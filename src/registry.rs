//! Device registry: a bounded table of device slots with stable ids.
//!
//! Drivers register what they find during a probe. Devices with bindings outlive
//! their hardware: a probe unprobes everything first, lets drivers re-register,
//! and only then drops entries that are neither present nor bound.

pub mod device;

use crate::binds::{bind_offset, ActionMasks, BindTable, BindType, BIND_TYPE_COUNT};
use crate::config::InputConfig;
use crate::driver::{
    ConfigOption, DriverId, DriverTable, KeyEvent, KeyNames, ProbedDevice, WaitHandle,
};
use crate::error::{InputError, Result};
use crate::menu::MenuButtons;
use log::{debug, info, warn};
use std::borrow::Cow;
use std::fmt::Write as _;

pub use device::Device;

/// Index of a device slot. Stable for as long as the device stays registered.
pub type DeviceId = usize;

/// Name returned for key lookups on a device id that does not exist.
const UNKNOWN_DEVICE_KEY: &str = "Unknown";

pub struct Registry {
    drivers: DriverTable,
    slots: Vec<Option<Device>>,
    have_async: bool,
    name_base_len: usize,
}

fn alloc_binds(drivers: &DriverTable, driver: DriverId, key_count: usize) -> Result<BindTable> {
    BindTable::allocate(key_count, |defaults| {
        drivers.get(driver).default_binds(defaults)
    })
}

/// Raw scancode rendering used when no name table knows a key.
pub fn scancode_name(code: u32) -> String {
    match char::from_u32(code) {
        Some(c) if c.is_ascii_alphanumeric() => c.to_string(),
        _ => format!("\\x{code:02X}"),
    }
}

impl Registry {
    pub fn new(drivers: DriverTable, config: &InputConfig) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(config.max_devices, || None);
        Self {
            drivers,
            slots,
            have_async: false,
            name_base_len: config.name_base_len(),
        }
    }

    pub fn drivers(&self) -> &DriverTable {
        &self.drivers
    }

    pub fn drivers_mut(&mut self) -> &mut DriverTable {
        &mut self.drivers
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub(crate) fn device_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    fn require(&self, id: DeviceId) -> Result<&Device> {
        self.device(id).ok_or_else(|| InputError::no_such_device(id))
    }

    /// Registered devices in id order, probed or not.
    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, &Device)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|dev| (id, dev)))
    }

    pub fn probed_ids(&self) -> Vec<DeviceId> {
        self.devices()
            .filter(|(_, dev)| dev.probed)
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether a device that cannot be waited on was registered since the last
    /// probe started.
    pub fn have_async_devices(&self) -> bool {
        self.have_async
    }

    fn sanitize_name(&self, raw: &str) -> String {
        raw.chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .take(self.name_base_len)
            .collect()
    }

    /// Register a device found by `driver`.
    ///
    /// Failures (full table, allocation) are logged and the device is dropped;
    /// the caller carries on with whatever did register.
    pub fn register(&mut self, driver: DriverId, device: ProbedDevice) -> Option<DeviceId> {
        match self.try_register(driver, device) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("input: {err}");
                None
            }
        }
    }

    /// Like [`Registry::register`], reporting the failure instead of logging it.
    pub fn try_register(&mut self, driver: DriverId, device: ProbedDevice) -> Result<DeviceId> {
        let ProbedDevice {
            name: raw_name,
            handle,
            backend,
            key_count,
            key_names,
            does_combos,
        } = device;

        let base = self.sanitize_name(&raw_name);
        let mut name = base.clone();
        let mut dupes = 0;
        let mut existing = None;

        for (id, slot) in self.slots.iter().enumerate() {
            let Some(dev) = slot else { continue };
            if dev.name != name {
                continue;
            }
            if dev.probed {
                dupes += 1;
                name = format!("{base} [{dupes}]");
                continue;
            }
            existing = Some(id);
            break;
        }

        let id = match existing {
            Some(id) => id,
            None => match self.new_slot(driver, &name, key_count) {
                Ok(id) => id,
                Err(err) => {
                    self.drivers.get_mut(driver).free(backend);
                    return Err(err);
                }
            },
        };

        let Registry {
            drivers,
            slots,
            have_async,
            ..
        } = self;
        let Some(dev) = slots[id].as_mut() else {
            drivers.get_mut(driver).free(backend);
            return Err(InputError::no_such_device(id));
        };

        if dev.key_count != key_count {
            if let Some(old) = dev.binds.take() {
                match alloc_binds(drivers, driver, key_count) {
                    Ok(mut table) => {
                        let rows = old.key_count().min(key_count) * BIND_TYPE_COUNT;
                        table.live_mut()[..rows].copy_from_slice(&old.live()[..rows]);
                        dev.binds = Some(table);
                    }
                    Err(err) => {
                        dev.binds = Some(old);
                        drivers.get_mut(driver).free(backend);
                        return Err(err);
                    }
                }
            }
            dev.key_count = key_count;
        }

        if existing.is_some() {
            info!("input: device #{id} \"{name}\" reattached");
        }

        dev.probed = true;
        dev.does_combos = does_combos;
        dev.driver = driver;
        dev.handle = handle;
        dev.key_names = key_names;
        dev.backend = Some(backend);
        dev.prune_binds();
        *have_async |= dev.is_async_only();

        Ok(id)
    }

    /// Pick a slot for a new device: an empty one, else one holding an unprobed
    /// device without binds, else any unprobed device.
    fn pick_slot(&self) -> Option<DeviceId> {
        let slots = &self.slots;
        slots
            .iter()
            .position(Option::is_none)
            .or_else(|| {
                slots.iter().position(|slot| {
                    slot.as_ref()
                        .is_some_and(|dev| !dev.probed && dev.binds.is_none())
                })
            })
            .or_else(|| {
                slots
                    .iter()
                    .position(|slot| slot.as_ref().is_some_and(|dev| !dev.probed))
            })
    }

    fn new_slot(&mut self, driver: DriverId, name: &str, key_count: usize) -> Result<DeviceId> {
        let id = self.pick_slot().ok_or_else(|| InputError::Capacity {
            name: name.to_string(),
        })?;

        if let Some(old) = self.device(id) {
            warn!(
                "input: dropping remembered device #{id} \"{}\" to make room for \"{name}\"",
                old.name
            );
            self.remove(id);
        }

        let binds = alloc_binds(&self.drivers, driver, key_count)?;
        let mut dev = Device::configured(name.to_string(), driver, key_count, None);
        dev.binds = Some(binds);
        self.slots[id] = Some(dev);

        info!("input: new device #{id} \"{name}\"");
        Ok(id)
    }

    /// Mark a device absent and release its driver state; name and binds stay.
    pub fn unprobe(&mut self, id: DeviceId) {
        let Registry { drivers, slots, .. } = self;
        let Some(dev) = slots.get_mut(id).and_then(Option::as_mut) else {
            return;
        };
        dev.probed = false;
        dev.handle = None;
        if let Some(backend) = dev.backend.take() {
            drivers.get_mut(dev.driver).free(backend);
        }
    }

    /// Unprobe a device that failed while being read.
    pub fn evict(&mut self, id: DeviceId) {
        if let Some(dev) = self.device(id) {
            warn!("input: \"{}\" errored out, removing.", dev.name);
        }
        self.unprobe(id);
    }

    /// Drop a device and its binds from the table altogether.
    pub fn remove(&mut self, id: DeviceId) {
        self.unprobe(id);
        if let Some(slot) = self.slots.get_mut(id) {
            *slot = None;
        }
    }

    /// Full re-scan through every driver.
    pub fn probe(&mut self) {
        self.have_async = false;

        for id in 0..self.slots.len() {
            self.unprobe(id);
        }

        for driver in DriverId::ALL {
            let found = self.drivers.get_mut(driver).probe();
            for device in found {
                self.register(driver, device);
            }
        }

        for (id, slot) in self.slots.iter_mut().enumerate() {
            if slot
                .as_ref()
                .is_some_and(|dev| !dev.probed && dev.binds.is_none())
            {
                debug!("input: forgetting unbound device #{id}");
                *slot = None;
            }
        }

        let any_async = self.devices().any(|(_, dev)| dev.is_async_only());
        self.have_async = any_async;
        if self.have_async {
            info!("input: async-only devices detected..");
        }

        for line in self.debug_dump().lines() {
            info!("{line}");
        }
    }

    /// Diagnostic listing of every used slot: id, driver, probed, has binds, name.
    pub fn debug_dump(&self) -> String {
        let mut out = String::from("# drv probed binds name\n");
        for (id, dev) in self.devices() {
            let _ = writeln!(
                out,
                "{} {:3} {:>6} {:>5} {}",
                id,
                dev.driver.index(),
                if dev.probed { 'y' } else { 'n' },
                if dev.binds.is_some() { 'y' } else { 'n' },
                dev.name
            );
        }
        out
    }

    pub fn wait_handles(&self) -> Vec<WaitHandle> {
        self.devices()
            .filter(|(_, dev)| dev.probed)
            .filter_map(|(_, dev)| dev.handle)
            .collect()
    }

    pub fn id_by_handle(&self, handle: WaitHandle) -> Option<DeviceId> {
        self.devices()
            .find(|(_, dev)| dev.probed && dev.handle == Some(handle))
            .map(|(id, _)| id)
    }

    /// Ask a probed device for one key transition.
    pub fn read_keycode(&mut self, id: DeviceId) -> Result<Option<KeyEvent>> {
        match self.device_mut(id).and_then(|dev| dev.backend.as_mut()) {
            Some(backend) => backend.update_keycode(),
            None => Ok(None),
        }
    }

    pub fn menu_button(&self, id: DeviceId, code: u32) -> MenuButtons {
        self.device(id)
            .and_then(|dev| dev.backend.as_ref())
            .map(|backend| backend.menu_button(code))
            .unwrap_or_default()
    }

    pub fn menu_keycode(&self, id: DeviceId, button: MenuButtons) -> Option<u32> {
        self.device(id)
            .and_then(|dev| dev.backend.as_ref())
            .and_then(|backend| backend.menu_keycode(button))
    }

    /// Gameplay sampling: OR the binds of held keys of every present, bound device.
    pub fn update(&mut self) -> ActionMasks {
        let mut result = [0; BIND_TYPE_COUNT];
        let mut failed = Vec::new();

        for (id, slot) in self.slots.iter_mut().enumerate() {
            let Some(dev) = slot.as_mut() else { continue };
            if !dev.probed {
                continue;
            }
            let (Some(backend), Some(binds)) = (dev.backend.as_mut(), dev.binds.as_ref()) else {
                continue;
            };
            if let Err(err) = backend.update(binds, &mut result) {
                debug!("input: update of #{id} failed: {err}");
                failed.push(id);
            }
        }

        for id in failed {
            self.evict(id);
        }
        result
    }

    /// Broadcast the blocking mode to every present device.
    pub fn set_blocking(&mut self, blocking: bool) {
        for (id, slot) in self.slots.iter_mut().enumerate() {
            let Some(backend) = slot
                .as_mut()
                .filter(|dev| dev.probed)
                .and_then(|dev| dev.backend.as_mut())
            else {
                continue;
            };
            if let Err(err) = backend.set_config(ConfigOption::Blocking, i32::from(blocking)) {
                debug!("input: #{id} can't change blocking mode: {err}");
            }
        }
    }

    pub fn get_config(&self, id: DeviceId, option: ConfigOption) -> Result<i32> {
        let dev = self.require(id)?;
        match option {
            ConfigOption::BindCount => Ok(dev.key_count as i32),
            ConfigOption::DoesCombos => Ok(i32::from(dev.does_combos)),
            ConfigOption::Blocking | ConfigOption::KeyNames => Err(option.not_implemented()),
            _ => match dev.backend.as_ref() {
                Some(backend) => backend.get_config(option),
                None => Err(InputError::no_such_device(format!("{} (not present)", dev.name))),
            },
        }
    }

    pub fn set_config(&mut self, id: DeviceId, option: ConfigOption, value: i32) -> Result<()> {
        let dev = self
            .device_mut(id)
            .ok_or_else(|| InputError::no_such_device(id))?;
        match option {
            // blocking mode is global, see `InputContext::set_blocking`
            ConfigOption::Blocking
            | ConfigOption::KeyNames
            | ConfigOption::BindCount
            | ConfigOption::DoesCombos => Err(option.not_implemented()),
            _ => match dev.backend.as_mut() {
                Some(backend) => backend.set_config(option, value),
                None => Err(InputError::no_such_device(format!("{} (not present)", dev.name))),
            },
        }
    }

    /// Override the key names of a device; the table must cover every key.
    pub fn set_key_names(&mut self, id: DeviceId, names: KeyNames) -> Result<()> {
        let dev = self
            .device_mut(id)
            .ok_or_else(|| InputError::no_such_device(id))?;
        if names.len() < dev.key_count {
            warn!("input: set_key_names: not enough keys");
            return Err(InputError::config(format!(
                "{} key names given, {} needed",
                names.len(),
                dev.key_count
            )));
        }
        dev.key_names = Some(names);
        Ok(())
    }

    /// Key name lookup: device table, then driver, then raw scancode. Never empty.
    pub fn key_name(&self, id: DeviceId, code: u32) -> Cow<'_, str> {
        let Some(dev) = self.device(id) else {
            return Cow::Borrowed(UNKNOWN_DEVICE_KEY);
        };

        let index = code as usize;
        let from_device = dev
            .key_names
            .as_ref()
            .filter(|_| index < dev.key_count)
            .and_then(|names| names.get(index))
            .filter(|name| !name.is_empty());
        if let Some(name) = from_device {
            return Cow::Borrowed(name);
        }

        if let Some(name) = self
            .drivers
            .get(dev.driver)
            .key_name(code)
            .filter(|name| !name.is_empty())
        {
            return Cow::Borrowed(name);
        }

        Cow::Owned(scancode_name(code))
    }

    /// Reverse of [`Registry::key_name`]: device name, driver name, then the
    /// scancode forms.
    pub fn key_code(&self, id: DeviceId, name: &str) -> Option<u32> {
        let dev = self.device(id)?;
        self.resolve_config_key(dev, name)
    }

    /// Toggle (or clear, with `unbind`) `mask` on one key.
    pub fn bind_key(
        &mut self,
        id: DeviceId,
        key: usize,
        mask: u32,
        bind_type: BindType,
        unbind: bool,
    ) -> Result<()> {
        let Registry { drivers, slots, .. } = self;
        let dev = slots
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or_else(|| InputError::no_such_device(id))?;

        if key >= dev.key_count {
            return Err(InputError::BadBindIndex {
                key,
                key_count: dev.key_count,
            });
        }

        if dev.binds.is_none() {
            if unbind {
                return Ok(());
            }
            dev.binds = Some(alloc_binds(drivers, dev.driver, dev.key_count)?);
        }

        if let Some(binds) = dev.binds.as_mut() {
            if unbind {
                binds.clear(key, bind_type, mask);
            } else {
                binds.toggle(key, bind_type, mask);
            }
        }

        dev.prune_binds();
        Ok(())
    }

    /// Clear `mask` of `bind_type` on one device or, with `None`, on all of them.
    /// [`crate::binds::ALL_ACTIONS`] wipes every live bind of the selected devices;
    /// a device left with nothing bound loses its table.
    pub fn unbind_all(&mut self, device: Option<DeviceId>, mask: u32, bind_type: BindType) {
        for (id, slot) in self.slots.iter_mut().enumerate() {
            if device.is_some_and(|wanted| wanted != id) {
                continue;
            }
            let Some(dev) = slot.as_mut() else { continue };
            if let Some(binds) = dev.binds.as_mut() {
                binds.clear_actions(bind_type, mask);
                dev.prune_binds();
            }
        }
    }

    /// Zero every live bind of a device and keep the table, so a run of
    /// [`Registry::stage_config_key`] calls starts from empty rather than from
    /// freshly allocated defaults.
    #[cfg(feature = "config")]
    pub(crate) fn wipe_binds(&mut self, id: DeviceId) {
        if let Some(binds) = self.device_mut(id).and_then(|dev| dev.binds.as_mut()) {
            binds.live_mut().fill(0);
        }
    }

    /// Live binds of a device, `None` when it has no bindings.
    pub fn dev_binds(&self, id: DeviceId) -> Option<&[u32]> {
        self.device(id)?.binds.as_ref().map(BindTable::live)
    }

    pub fn dev_default_binds(&self, id: DeviceId) -> Option<&[u32]> {
        self.device(id)?.binds.as_ref().map(BindTable::defaults)
    }

    pub fn bind_table(&self, id: DeviceId) -> Option<&BindTable> {
        self.device(id)?.binds.as_ref()
    }

    /// Replace the live binds of a device, e.g. from stored configuration.
    pub fn set_dev_binds(&mut self, id: DeviceId, live: &[u32]) -> Result<()> {
        let Registry { drivers, slots, .. } = self;
        let dev = slots
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or_else(|| InputError::no_such_device(id))?;

        let expected = dev.key_count * BIND_TYPE_COUNT;
        if live.len() != expected {
            return Err(InputError::config(format!(
                "{} bind entries given, {expected} needed",
                live.len()
            )));
        }

        if dev.binds.is_none() {
            dev.binds = Some(alloc_binds(drivers, dev.driver, dev.key_count)?);
        }
        if let Some(binds) = dev.binds.as_mut() {
            binds.live_mut().copy_from_slice(live);
        }
        dev.prune_binds();
        Ok(())
    }

    /// Run every present device's bind pruning again.
    pub fn clean_binds(&mut self) {
        for dev in self.slots.iter_mut().flatten() {
            if dev.backend.is_some() {
                dev.prune_binds();
            }
        }
    }

    pub fn dev_name(&self, id: DeviceId, must_be_active: bool, skip_prefix: bool) -> Option<&str> {
        let dev = self.device(id)?;
        if must_be_active && !dev.probed {
            return None;
        }
        Some(if skip_prefix {
            dev.short_name()
        } else {
            dev.name()
        })
    }

    pub fn name_to_id(&self, name: &str) -> Option<DeviceId> {
        let found = self
            .devices()
            .find(|(_, dev)| dev.name == name)
            .map(|(id, _)| id);
        if found.is_none() {
            warn!("input: name_to_id: no such device: {name}");
        }
        found
    }

    /// Find or create the device a configuration section refers to.
    ///
    /// New entries are unprobed and take their key space from the driver.
    pub fn config_parse_dev(&mut self, name: &str) -> Result<DeviceId> {
        let Some(driver) = self.drivers.by_prefix(name) else {
            warn!("input: missing driver for {name}");
            return Err(InputError::MissingDriver {
                name: name.to_string(),
            });
        };

        if let Some((id, _)) = self.devices().find(|(_, dev)| dev.name == name) {
            return Ok(id);
        }

        let Some(id) = self.slots.iter().position(Option::is_none) else {
            warn!("input: too many devices, can't add {name}");
            return Err(InputError::Capacity {
                name: name.to_string(),
            });
        };

        let layout = self.drivers.get(driver).key_layout();
        self.slots[id] = Some(Device::configured(
            name.to_string(),
            driver,
            layout.key_count,
            layout.names,
        ));
        debug!("input: configured device #{id} \"{name}\"");
        Ok(id)
    }

    /// Resolve a configuration key string: `\xNN`, device name, driver name or a
    /// single-character scancode.
    fn resolve_config_key(&self, dev: &Device, key: &str) -> Option<u32> {
        if let Some(hex) = key.strip_prefix("\\x") {
            return u32::from_str_radix(hex, 16).ok();
        }

        dev.key_names
            .as_ref()
            .and_then(|names| names.position(key, dev.key_count))
            .map(|code| code as u32)
            .or_else(|| self.drivers.get(dev.driver).key_code(key))
            .or_else(|| match key.as_bytes() {
                [single] => Some(u32::from(*single)),
                _ => None,
            })
    }

    /// Add `actions` to a key named in configuration. `None` as bind type clears
    /// every bind type of that key instead.
    pub fn config_bind_key(
        &mut self,
        id: DeviceId,
        key: &str,
        actions: u32,
        bind_type: Option<BindType>,
    ) -> Result<()> {
        self.stage_config_key(id, key, actions, bind_type)?;
        if let Some(dev) = self.device_mut(id) {
            dev.prune_binds();
        }
        Ok(())
    }

    /// [`Registry::config_bind_key`] without the pruning pass. Loaders applying
    /// many binds finish with [`Registry::clean_binds`].
    pub(crate) fn stage_config_key(
        &mut self,
        id: DeviceId,
        key: &str,
        actions: u32,
        bind_type: Option<BindType>,
    ) -> Result<()> {
        let dev = self.require(id)?;
        let key_count = dev.key_count;
        let code = self
            .resolve_config_key(dev, key)
            .map(|code| code as usize)
            .filter(|&code| code < key_count);
        let Some(code) = code else {
            warn!("input: bad key: {key}");
            return Err(InputError::bad_key(key));
        };

        let Registry { drivers, slots, .. } = self;
        let Some(dev) = slots[id].as_mut() else {
            return Err(InputError::no_such_device(id));
        };
        if dev.binds.is_none() {
            dev.binds = Some(alloc_binds(drivers, dev.driver, dev.key_count)?);
        }
        if let Some(binds) = dev.binds.as_mut() {
            match bind_type {
                None => binds.clear_key(code),
                Some(bind_type) => binds.add(code, bind_type, actions),
            }
        }
        Ok(())
    }

    /// Number of keys of one device bound to any of `mask` under `bind_type`.
    pub fn count_bound_keys(&self, id: DeviceId, mask: u32, bind_type: BindType) -> usize {
        self.bind_table(id)
            .map(|binds| binds.keys_bound_to(bind_type, mask).count())
            .unwrap_or(0)
    }

    /// Live mask of one `(key, bind_type)` entry, zero when unbound.
    pub fn bind_mask(&self, id: DeviceId, key: usize, bind_type: BindType) -> u32 {
        self.dev_binds(id)
            .and_then(|live| live.get(bind_offset(key, bind_type)).copied())
            .unwrap_or(0)
    }
}
