//! Error types and handling infrastructure for padbind.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! library error types. The binary layers `anyhow` on top for context.
//!
//! ## Design Principles
//!
//! - **Skip, don't crash**: every variant except `NoDevices` is recoverable, callers
//!   treat it as "skip this turn"
//! - **Timeouts are not errors**: polling APIs report them as `Ok(None)`
//! - **Context preservation**: device names and key names travel with the error

use thiserror::Error;

/// The main error type for padbind operations.
///
/// Variants follow the failure classes of the input core: capacity, allocation,
/// device I/O, configuration and the fatal "nothing to read from" condition.
#[derive(Error, Debug)]
pub enum InputError {
    /// Device table is full, registration dropped
    #[error("Too many devices, can't add {name}")]
    Capacity { name: String },

    /// Bind table or name storage could not be allocated
    #[error("Allocation failed: {message}")]
    Allocation { message: String },

    /// A driver failed reading a device; the device has been evicted
    #[error("Device \"{name}\" errored out: {message}")]
    DeviceIo {
        name: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Option is not handled by the driver at all
    #[error("Unknown config option: {option}")]
    UnknownOption { option: String },

    /// Option is known but this layer does not implement it
    #[error("Config option not implemented: {option}")]
    NotImplemented { option: String },

    /// Key name or code does not resolve to a key of the device
    #[error("Bad key: {key}")]
    BadKey { key: String },

    /// Key index or bind type out of range for the device
    #[error("Bad bind index: key {key} of {key_count}")]
    BadBindIndex { key: usize, key_count: usize },

    /// Device id does not refer to a device slot in use
    #[error("No such device: {device}")]
    NoSuchDevice { device: String },

    /// Device name prefix does not match any driver
    #[error("Missing driver for {name}")]
    MissingDriver { name: String },

    /// Polling was requested with zero readable devices
    #[error("Failed to find devices to read")]
    NoDevices,

    /// Multiplexed wait on device handles failed
    #[error("Waiting for device events failed")]
    Wait {
        #[source]
        source: std::io::Error,
    },

    /// Configuration file or bind profile problems
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Standard Result type for padbind operations.
pub type Result<T> = std::result::Result<T, InputError>;

impl InputError {
    /// Create a DeviceIo error from a driver failure without an OS error
    pub fn device_io(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceIo {
            name: name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a DeviceIo error carrying the underlying io::Error
    pub fn device_io_source(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::DeviceIo {
            name: name.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create an Allocation error with a descriptive message
    pub fn allocation(message: impl Into<String>) -> Self {
        Self::Allocation {
            message: message.into(),
        }
    }

    /// Create a BadKey error for a key name or code
    pub fn bad_key(key: impl Into<String>) -> Self {
        Self::BadKey { key: key.into() }
    }

    /// Create a Config error with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a NoSuchDevice error from an id or a name
    pub fn no_such_device(device: impl ToString) -> Self {
        Self::NoSuchDevice {
            device: device.to_string(),
        }
    }

    /// Whether the failure came from a device read and led to an eviction
    pub fn is_device_io(&self) -> bool {
        matches!(self, Self::DeviceIo { .. })
    }
}

impl From<std::collections::TryReserveError> for InputError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::Allocation {
            message: err.to_string(),
        }
    }
}
