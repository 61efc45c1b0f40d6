//! Concrete input backends.
//!
//! - [`evdev`]: Linux input event devices (keyboards, joysticks, analog sticks)
//! - [`gpio_pad`]: built-in buttons read from a memory-mapped latch
//! - [`vkbd`]: on-screen keyboard layer fed by the host

pub mod evdev;
pub mod gpio_pad;
pub mod vkbd;

use crate::binds::{set_default_bind, BindType};

/// One factory bind a host platform hands to a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultBind {
    pub code: u16,
    pub bind_type: BindType,
    /// Action bit, bound as `1 << bit`
    pub bit: u8,
}

impl DefaultBind {
    pub const fn new(code: u16, bind_type: BindType, bit: u8) -> Self {
        Self {
            code,
            bind_type,
            bit,
        }
    }
}

pub(crate) fn fill_default_binds(defaults: &mut [u32], binds: &[DefaultBind]) {
    for bind in binds {
        if u32::from(bind.bit) < u32::BITS {
            set_default_bind(defaults, usize::from(bind.code), bind.bind_type, 1 << bind.bit);
        }
    }
}

/// Key indices set in `mask`, lowest first.
pub(crate) fn mask_keys(mut mask: u32) -> impl Iterator<Item = usize> {
    std::iter::from_fn(move || {
        if mask == 0 {
            return None;
        }
        let key = mask.trailing_zeros() as usize;
        mask &= mask - 1;
        Some(key)
    })
}
