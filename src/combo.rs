//! Key combo detection and resolution on the emulation bind type.
//!
//! An action bound to more than one key is a combo action: it fires only while two
//! of its keys are held together. Keys carrying such an action are combo keys.
//! Both sets are plain 32-bit masks, so only the first 32 keys of a device take
//! part in combos.

use crate::binds::{ActionMasks, BindTable, BindType};
use crate::drivers::mask_keys;

/// Highest key index a combo mask can represent.
pub const COMBO_KEY_LIMIT: usize = u32::BITS as usize;

/// Keys and actions taking part in at least one two-key combination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComboMarks {
    pub keys: u32,
    pub acts: u32,
}

/// Clamp `last_key` to the table and to the combo mask width.
fn key_limit(binds: &BindTable, last_key: usize) -> Option<usize> {
    if binds.key_count() == 0 {
        return None;
    }
    Some(
        last_key
            .min(binds.key_count() - 1)
            .min(COMBO_KEY_LIMIT - 1),
    )
}

impl ComboMarks {
    /// Marking pass over keys `0..=last_key`.
    ///
    /// For every action bit, when more than one key carries it, all of those keys
    /// and the action are marked.
    pub fn find(binds: &BindTable, last_key: usize) -> Self {
        let mut marks = Self::default();
        let Some(last) = key_limit(binds, last_key) else {
            return marks;
        };

        for act in 0..u32::BITS {
            let act_bit = 1u32 << act;
            let holders = (0..=last)
                .filter(|&key| binds.get(key, BindType::Emu) & act_bit != 0)
                .fold(0u32, |keys, key| keys | (1 << key));

            if holders.count_ones() > 1 {
                marks.keys |= holders;
                marks.acts |= act_bit;
            }
        }

        marks
    }

    pub fn is_empty(&self) -> bool {
        self.keys == 0 && self.acts == 0
    }

    /// Resolution pass: turn a held-key mask into an emulation action mask.
    ///
    /// Keys are visited in ascending order. A combo key pairs with the first later
    /// held key sharing one of its combo actions; the pair contributes only the
    /// shared actions and neither key is considered again. An unpaired combo key
    /// contributes its non-combo actions. With three or more keys sharing an action
    /// the outcome depends on key order.
    pub fn resolve(&self, held: u32, binds: &BindTable, last_key: usize) -> u32 {
        let Some(last) = key_limit(binds, last_key) else {
            return 0;
        };

        let mut keys = held;
        let mut result = 0;

        for key in 0..=last {
            let bit = 1u32 << key;
            if keys & bit == 0 {
                continue;
            }

            let acts = binds.get(key, BindType::Emu);
            if acts == 0 {
                continue;
            }

            if self.keys & bit == 0 {
                result |= acts;
                continue;
            }

            let shared = acts & self.acts;
            let mut paired = false;
            if shared != 0 {
                for partner in key + 1..=last {
                    let partner_bit = 1u32 << partner;
                    let partner_acts = binds.get(partner, BindType::Emu);
                    if keys & partner_bit != 0 && partner_acts & shared != 0 {
                        result |= shared & partner_acts;
                        keys &= !(bit | partner_bit);
                        paired = true;
                        break;
                    }
                }
            }

            if !paired {
                result |= acts & !self.acts;
            }
        }

        result
    }

    /// Gameplay sampling of one device: OR the binds of the `held` keys into
    /// `result`, resolving the emulation binds through the combo marks.
    pub fn sample(
        &self,
        held: u32,
        binds: &BindTable,
        last_key: usize,
        result: &mut ActionMasks,
    ) {
        let Some(last) = key_limit(binds, last_key) else {
            return;
        };
        let held_keys = mask_keys(held).take_while(|&key| key <= last);

        if self.is_empty() {
            for key in held_keys {
                binds.or_key_into(key, result);
            }
            return;
        }

        result[BindType::Emu.index()] |= self.resolve(held, binds, last);
        for key in held_keys {
            for bind_type in BindType::ALL.into_iter().filter(|&t| t != BindType::Emu) {
                result[bind_type.index()] |= binds.get(key, bind_type);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const A: usize = 0;
    const B: usize = 1;
    const C: usize = 2;
    const X: u32 = 1 << 4;
    const UP: u32 = 1 << 0;
    const DOWN: u32 = 1 << 1;

    fn table(binds: &[(usize, u32)]) -> BindTable {
        let mut table = BindTable::allocate(8, |_| {}).unwrap();
        for &(key, mask) in binds {
            table.add(key, BindType::Emu, mask);
        }
        table
    }

    #[test]
    fn marks_keys_sharing_an_action() {
        let binds = table(&[(A, X | UP), (B, X | DOWN), (C, 1 << 7)]);
        let marks = ComboMarks::find(&binds, 7);
        assert_eq!(marks.keys, 0b011);
        assert_eq!(marks.acts, X);
    }

    #[test]
    fn no_marks_without_shared_actions() {
        let binds = table(&[(A, UP), (B, DOWN)]);
        assert!(ComboMarks::find(&binds, 7).is_empty());
    }

    #[test]
    fn pair_fires_shared_action_once() {
        let binds = table(&[(A, X), (B, X)]);
        let marks = ComboMarks::find(&binds, 7);
        assert_eq!(marks.resolve(0b011, &binds, 7), X);
    }

    #[test]
    fn lone_combo_key_falls_back_to_solo_actions() {
        let binds = table(&[(A, X | UP), (B, X | DOWN)]);
        let marks = ComboMarks::find(&binds, 7);
        assert_eq!(marks.resolve(0b001, &binds, 7), UP);
        assert_eq!(marks.resolve(0b010, &binds, 7), DOWN);
        // chord suppresses the lone-key directions
        assert_eq!(marks.resolve(0b011, &binds, 7), X);
    }

    #[test]
    fn non_combo_keys_pass_through() {
        let binds = table(&[(A, X), (B, X), (C, 1 << 7)]);
        let marks = ComboMarks::find(&binds, 7);
        assert_eq!(marks.resolve(0b101, &binds, 7), 1 << 7);
        assert_eq!(marks.resolve(0b111, &binds, 7), X | (1 << 7));
    }

    #[test]
    fn pair_at_last_key_does_not_add_solo_actions() {
        let binds = table(&[(A, X | UP), (B, X)]);
        let marks = ComboMarks::find(&binds, B);
        assert_eq!(marks.resolve(0b011, &binds, B), X);
    }

    #[test]
    fn three_way_share_pairs_in_ascending_order() {
        let binds = table(&[(A, X), (B, X), (C, X)]);
        let marks = ComboMarks::find(&binds, 7);
        assert_eq!(marks.keys, 0b111);
        // A pairs with B; C is left alone and has no solo actions
        assert_eq!(marks.resolve(0b111, &binds, 7), X);
        assert_eq!(marks.resolve(0b101, &binds, 7), X);
    }

    #[test]
    fn last_key_limits_the_scan() {
        let binds = table(&[(A, X), (C, X)]);
        assert!(ComboMarks::find(&binds, B).is_empty());
        let marks = ComboMarks::find(&binds, 7);
        assert_eq!(marks.resolve(0b101, &binds, B), 0);
    }

    #[test]
    fn sample_resolves_emu_and_merges_player_binds() {
        let mut binds = table(&[(A, X | UP), (B, X)]);
        binds.add(A, BindType::Player12, 0b1);
        binds.add(C, BindType::Player12, 0b100);
        let marks = ComboMarks::find(&binds, 7);

        let mut result = [0; crate::binds::BIND_TYPE_COUNT];
        marks.sample(0b101, &binds, 7, &mut result);
        assert_eq!(result[BindType::Emu.index()], UP);
        assert_eq!(result[BindType::Player12.index()], 0b101);

        let mut result = [0; crate::binds::BIND_TYPE_COUNT];
        marks.sample(0b011, &binds, 7, &mut result);
        assert_eq!(result[BindType::Emu.index()], X);
    }

    #[test]
    fn sample_without_marks_is_a_plain_union() {
        let binds = table(&[(A, X), (B, X)]);
        let mut result = [0; crate::binds::BIND_TYPE_COUNT];
        // unmarked: a backend that doesn't do combos
        ComboMarks::default().sample(0b001, &binds, 7, &mut result);
        assert_eq!(result[BindType::Emu.index()], X);
    }

    proptest! {
        #[test]
        fn result_only_contains_bound_actions(
            masks in proptest::collection::vec(any::<u32>(), 8),
            held in 0u32..256,
        ) {
            let binds = table(&masks.iter().copied().enumerate().collect::<Vec<_>>());
            let marks = ComboMarks::find(&binds, 7);
            let all_bound = masks.iter().fold(0, |acc, m| acc | m);
            prop_assert_eq!(marks.resolve(held, &binds, 7) & !all_bound, 0);
            prop_assert_eq!(marks.resolve(0, &binds, 7), 0);
        }

        #[test]
        fn without_combos_result_is_plain_union(
            masks in proptest::collection::vec(0u32..16, 4),
            held in 0u32..16,
        ) {
            // give every key a disjoint nibble so no action is shared
            let shifted: Vec<(usize, u32)> = masks
                .iter()
                .enumerate()
                .map(|(key, m)| (key, m << (key * 4)))
                .collect();
            let binds = table(&shifted);
            let marks = ComboMarks::find(&binds, 7);
            prop_assert!(marks.is_empty());
            let expected = shifted
                .iter()
                .filter(|(key, _)| held & (1 << key) != 0)
                .fold(0, |acc, (_, m)| acc | m);
            prop_assert_eq!(marks.resolve(held, &binds, 7), expected);
        }
    }
}
