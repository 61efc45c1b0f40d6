//! # padbind - input devices and key bindings for emulator frontends
//!
//! Keeps track of the input devices of a handheld emulator frontend, lets the user
//! bind their keys to emulator and player actions, and polls them the same way
//! whether a backend can be waited on or has to be spin polled.
//!
//! ## Architecture
//!
//! - [`error`] - Error taxonomy and `Result` alias
//! - [`driver`] - Contract every backend implements, driver ids and table
//! - [`registry`] - Device slots: register, probe, evict, names and binds
//! - [`binds`] - Per-device bind tables with factory defaults
//! - [`combo`] - Two-key chord detection on emulator binds
//! - [`poll`] - Blocking and spinning event waits behind one trait
//! - [`menu`] - Menu buttons, autorepeat and held-button state
//! - [`context`] - [`InputContext`], the owned entry point tying it together
//! - [`drivers`] - evdev, GPIO pad and virtual keyboard backends
//! - [`config`] - Tunables, plus TOML files and bind profiles with the `config` feature

pub mod error;

pub mod binds;
pub mod combo;
pub mod config;
pub mod driver;
pub mod menu;
pub mod poll;
pub mod registry;

pub mod context;
pub mod drivers;

pub use binds::{ActionMasks, BindTable, BindType, ALL_ACTIONS};
pub use config::{InputConfig, NoDevicePolicy};
pub use context::InputContext;
pub use driver::{ConfigOption, DeviceBackend, Driver, DriverId, KeyEvent, ProbedDevice};
pub use error::{InputError, Result};
pub use menu::MenuButtons;
pub use poll::DeviceEvent;
pub use registry::DeviceId;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
