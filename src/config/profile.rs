//! Stored bindings: a TOML list of devices and the keys bound on each.
//!
//! ```toml
//! [[device]]
//! name = "evdev:Keyboard"
//!
//! [[device.bind]]
//! key = "Enter"
//! actions = 128
//! bind_type = "player12"
//! ```

use crate::binds::BindType;
use crate::context::InputContext;
use crate::error::{InputError, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindProfile {
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceBinds>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBinds {
    pub name: String,
    #[serde(default, rename = "bind")]
    pub binds: Vec<KeyBind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBind {
    /// Key name, `\xNN` code or single character
    pub key: String,
    #[serde(default)]
    pub actions: u32,
    /// Omitted: clear every bind type of the key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_type: Option<BindType>,
}

impl BindProfile {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| InputError::config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| InputError::config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| InputError::config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = self.to_toml_string()?;
        std::fs::write(path, text)
            .map_err(|e| InputError::config(format!("{}: {e}", path.display())))
    }

    /// Apply to a context. Each listed device starts from empty live binds.
    ///
    /// Devices without a driver and bad keys are logged and skipped; the
    /// number of binds applied is returned.
    pub fn apply(&self, ctx: &mut InputContext) -> usize {
        let mut applied = 0;
        for device in &self.devices {
            let id = match ctx.config_parse_dev(&device.name) {
                Ok(id) => id,
                Err(err) => {
                    warn!("input: skipping profile section: {err}");
                    continue;
                }
            };

            let registry = ctx.registry_mut();
            registry.wipe_binds(id);
            for bind in &device.binds {
                match registry.stage_config_key(id, &bind.key, bind.actions, bind.bind_type) {
                    Ok(()) => applied += 1,
                    Err(err) => warn!("input: {}: {err}", device.name),
                }
            }
        }
        ctx.clean_binds();
        applied
    }

    /// Snapshot the live binds of every bound device, keys named the way
    /// `apply` reads them back.
    pub fn capture(ctx: &InputContext) -> Self {
        let devices = ctx
            .registry()
            .devices()
            .filter_map(|(id, dev)| {
                let table = dev.binds()?;
                let mut binds = Vec::new();
                for key in 0..table.key_count() {
                    for bind_type in BindType::ALL {
                        let actions = table.get(key, bind_type);
                        if actions == 0 {
                            continue;
                        }
                        binds.push(KeyBind {
                            key: capture_key_name(ctx, id, key as u32),
                            actions,
                            bind_type: Some(bind_type),
                        });
                    }
                }
                Some(DeviceBinds {
                    name: dev.name().to_string(),
                    binds,
                })
            })
            .collect();
        Self { devices }
    }
}

/// Key name that resolves back to `code` on this device, else the `\xNN` form.
fn capture_key_name(ctx: &InputContext, id: usize, code: u32) -> String {
    let name = ctx.key_name(Some(id), code);
    if ctx.key_code(Some(id), &name) == Some(code) {
        name.into_owned()
    } else {
        format!("\\x{code:02X}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputConfig;
    use crate::driver::{Driver, DriverId, KeyLayout, KeyNames};

    struct Pads;

    impl Driver for Pads {
        fn prefix(&self) -> &'static str {
            "evdev:"
        }

        fn key_layout(&self) -> KeyLayout {
            KeyLayout {
                key_count: 4,
                names: Some(KeyNames::from_names([Some("Up"), Some("Down"), None, Some("Up")])),
            }
        }
    }

    fn context() -> InputContext {
        let mut ctx = InputContext::new(InputConfig::default());
        ctx.install_driver(DriverId::Evdev, Box::new(Pads));
        ctx
    }

    const PROFILE: &str = r#"
[[device]]
name = "evdev:Pad"

[[device.bind]]
key = "down"
actions = 3
bind_type = "emu"

[[device.bind]]
key = "\\x02"
actions = 16
bind_type = "player12"

[[device.bind]]
key = "Nope"
actions = 1
bind_type = "emu"

[[device]]
name = "joy:Unknown"
"#;

    #[test]
    fn apply_binds_known_keys_and_skips_the_rest() {
        let profile = BindProfile::from_toml_str(PROFILE).unwrap();
        assert_eq!(profile.devices.len(), 2);

        let mut ctx = context();
        assert_eq!(profile.apply(&mut ctx), 2);

        let id = ctx.name_to_id("evdev:Pad").unwrap();
        let table = ctx.bind_table(id).unwrap();
        assert_eq!(table.get(1, BindType::Emu), 3);
        assert_eq!(table.get(2, BindType::Player12), 16);
        assert!(ctx.name_to_id("joy:Unknown").is_none());
    }

    #[test]
    fn capture_round_trips_through_toml() {
        let mut ctx = context();
        BindProfile::from_toml_str(PROFILE).unwrap().apply(&mut ctx);
        let id = ctx.name_to_id("evdev:Pad").unwrap();
        // "Up" names two keys; key 3 can only be captured by code
        ctx.config_bind_key(id, "\\x03", 8, Some(BindType::Emu)).unwrap();

        let captured = BindProfile::capture(&ctx);
        let keys: Vec<&str> = captured.devices[0].binds.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, ["Down", "\\x02", "\\x03"]);

        let text = captured.to_toml_string().unwrap();
        let mut fresh = context();
        BindProfile::from_toml_str(&text).unwrap().apply(&mut fresh);
        let fresh_id = fresh.name_to_id("evdev:Pad").unwrap();
        assert_eq!(fresh.dev_binds(fresh_id), ctx.dev_binds(id));
    }

    #[test]
    fn missing_bind_type_clears_the_key() {
        let mut ctx = context();
        let profile = BindProfile::from_toml_str(
            r#"
[[device]]
name = "evdev:Pad"

[[device.bind]]
key = "Up"
actions = 4
bind_type = "emu"

[[device.bind]]
key = "Up"
"#,
        )
        .unwrap();
        profile.apply(&mut ctx);
        let id = ctx.name_to_id("evdev:Pad").unwrap();
        assert_eq!(ctx.bind_table(id).unwrap().count_bound(), 0);
    }

    #[test]
    fn save_and_load_use_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binds.toml");
        let profile = BindProfile::from_toml_str(PROFILE).unwrap();
        profile.save(&path).unwrap();
        assert_eq!(BindProfile::load(&path).unwrap(), profile);
        assert!(BindProfile::load(&dir.path().join("missing.toml")).is_err());
    }
}
