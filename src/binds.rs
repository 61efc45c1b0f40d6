//! Per-device bind tables.
//!
//! A bind table maps `(key, bind type)` to a bitmask of caller-defined actions.
//! The live table and the driver's factory defaults share one allocation: the
//! defaults occupy the upper half, so resetting or comparing against them is an
//! offset away.

use crate::error::Result;

/// Number of bind types; every key carries one action mask per type.
pub const BIND_TYPE_COUNT: usize = 2;

/// Action mask value meaning "every action" for mass unbinding.
pub const ALL_ACTIONS: u32 = u32::MAX;

/// One action mask per bind type, as produced by gameplay sampling.
pub type ActionMasks = [u32; BIND_TYPE_COUNT];

/// Binding context sharing the key space of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum BindType {
    /// Emulator functions (menu, save state, turbo...). The only type combos apply to.
    Emu,
    /// Player 1 controls in the low 16 bits, player 2 in the high 16 bits.
    Player12,
}

impl BindType {
    pub const ALL: [BindType; BIND_TYPE_COUNT] = [BindType::Emu, BindType::Player12];

    pub fn index(self) -> usize {
        match self {
            BindType::Emu => 0,
            BindType::Player12 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BindType::Emu => "emu",
            BindType::Player12 => "player12",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|bt| bt.name().eq_ignore_ascii_case(name))
    }
}

/// Index of `(key, bind_type)` inside either half of a table.
#[inline]
pub fn bind_offset(key: usize, bind_type: BindType) -> usize {
    key * BIND_TYPE_COUNT + bind_type.index()
}

/// Write a default bind into a defaults buffer, ignoring keys outside it.
///
/// Drivers describe defaults by keycode; a device may expose fewer keys than the
/// driver knows about, so out-of-range entries are dropped instead of panicking.
pub fn set_default_bind(defaults: &mut [u32], key: usize, bind_type: BindType, mask: u32) {
    if let Some(slot) = defaults.get_mut(bind_offset(key, bind_type)) {
        *slot = mask;
    }
}

/// Live binds plus driver defaults for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindTable {
    key_count: usize,
    entries: Vec<u32>,
}

impl BindTable {
    /// Allocate a table for `key_count` keys.
    ///
    /// `fill_defaults` receives the zeroed defaults half; whatever it writes is then
    /// copied into the live half as the initial state.
    pub fn allocate(key_count: usize, fill_defaults: impl FnOnce(&mut [u32])) -> Result<Self> {
        let half = key_count
            .checked_mul(BIND_TYPE_COUNT)
            .ok_or_else(|| crate::error::InputError::allocation("bind table size overflow"))?;
        let total = half
            .checked_mul(2)
            .ok_or_else(|| crate::error::InputError::allocation("bind table size overflow"))?;

        let mut entries = Vec::new();
        entries.try_reserve_exact(total)?;
        entries.resize(total, 0);

        let (live, defaults) = entries.split_at_mut(half);
        fill_defaults(defaults);
        live.copy_from_slice(defaults);

        Ok(Self { key_count, entries })
    }

    pub fn key_count(&self) -> usize {
        self.key_count
    }

    fn half(&self) -> usize {
        self.key_count * BIND_TYPE_COUNT
    }

    /// Live bind masks, `key_count * BIND_TYPE_COUNT` entries.
    pub fn live(&self) -> &[u32] {
        &self.entries[..self.half()]
    }

    /// Driver defaults, same layout as [`BindTable::live`].
    pub fn defaults(&self) -> &[u32] {
        &self.entries[self.half()..]
    }

    pub fn live_mut(&mut self) -> &mut [u32] {
        let half = self.half();
        &mut self.entries[..half]
    }

    /// Both halves at once, for drivers that prune live and default binds together.
    pub fn halves_mut(&mut self) -> (&mut [u32], &mut [u32]) {
        let half = self.half();
        self.entries.split_at_mut(half)
    }

    pub fn get(&self, key: usize, bind_type: BindType) -> u32 {
        self.live()
            .get(bind_offset(key, bind_type))
            .copied()
            .unwrap_or(0)
    }

    pub fn default_for(&self, key: usize, bind_type: BindType) -> u32 {
        self.defaults()
            .get(bind_offset(key, bind_type))
            .copied()
            .unwrap_or(0)
    }

    fn slot_mut(&mut self, key: usize, bind_type: BindType) -> Option<&mut u32> {
        if key >= self.key_count {
            return None;
        }
        let offs = bind_offset(key, bind_type);
        self.entries.get_mut(offs)
    }

    /// XOR `mask` into the bind; binding the same mask twice restores the old state.
    pub fn toggle(&mut self, key: usize, bind_type: BindType, mask: u32) {
        if let Some(slot) = self.slot_mut(key, bind_type) {
            *slot ^= mask;
        }
    }

    pub fn clear(&mut self, key: usize, bind_type: BindType, mask: u32) {
        if let Some(slot) = self.slot_mut(key, bind_type) {
            *slot &= !mask;
        }
    }

    pub fn add(&mut self, key: usize, bind_type: BindType, mask: u32) {
        if let Some(slot) = self.slot_mut(key, bind_type) {
            *slot |= mask;
        }
    }

    /// Clear every bind type of a single key.
    pub fn clear_key(&mut self, key: usize) {
        for bind_type in BindType::ALL {
            if let Some(slot) = self.slot_mut(key, bind_type) {
                *slot = 0;
            }
        }
    }

    /// Clear `mask` on every key of one bind type, or wipe all live binds for
    /// [`ALL_ACTIONS`].
    pub fn clear_actions(&mut self, bind_type: BindType, mask: u32) {
        if mask == ALL_ACTIONS {
            self.live_mut().fill(0);
            return;
        }
        for key in 0..self.key_count {
            self.clear(key, bind_type, mask);
        }
    }

    /// Number of nonzero live entries.
    pub fn count_bound(&self) -> usize {
        self.live().iter().filter(|mask| **mask != 0).count()
    }

    /// Whether the user changed anything relative to the driver defaults.
    pub fn is_customized(&self) -> bool {
        self.live() != self.defaults()
    }

    pub fn reset_to_defaults(&mut self) {
        let (live, defaults) = self.halves_mut();
        live.copy_from_slice(defaults);
    }

    /// Keys carrying any of `mask` under `bind_type`, in index order.
    pub fn keys_bound_to(&self, bind_type: BindType, mask: u32) -> impl Iterator<Item = usize> + '_ {
        (0..self.key_count).filter(move |&key| self.get(key, bind_type) & mask != 0)
    }

    /// OR the masks of a held key into `result`, one mask per bind type.
    pub fn or_key_into(&self, key: usize, result: &mut ActionMasks) {
        for bind_type in BindType::ALL {
            result[bind_type.index()] |= self.get(key, bind_type);
        }
    }
}
