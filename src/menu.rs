//! Menu-level input state: logical buttons, held-button tracking and autorepeat.

use bitflags::bitflags;
use std::time::Duration;

use crate::registry::DeviceId;

bitflags! {
    /// Device-independent buttons the menu layer navigates with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MenuButtons: u32 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        /// Confirm
        const MOK = 1 << 4;
        /// Back
        const MBACK = 1 << 5;
        /// Menu action 2 (clear, toggle...)
        const MA2 = 1 << 6;
        /// Menu action 3
        const MA3 = 1 << 7;
        const L = 1 << 8;
        const R = 1 << 9;
        const MENU = 1 << 10;
    }
}

impl MenuButtons {
    pub const DIRECTIONS: MenuButtons = MenuButtons::UP
        .union(MenuButtons::DOWN)
        .union(MenuButtons::LEFT)
        .union(MenuButtons::RIGHT);
}

/// Drop the horizontal half of a diagonal; menus move in four directions.
pub fn suppress_diagonals(mut buttons: MenuButtons) -> MenuButtons {
    if buttons.intersects(MenuButtons::UP | MenuButtons::DOWN) {
        buttons.remove(MenuButtons::LEFT | MenuButtons::RIGHT);
    }
    buttons
}

/// Held menu buttons and the device that last changed them.
///
/// Reset on every probe.
#[derive(Debug, Clone, Default)]
pub struct MenuState {
    held: MenuButtons,
    last_used_dev: DeviceId,
    autorepeat: Autorepeat,
}

impl MenuState {
    pub fn held(&self) -> MenuButtons {
        self.held
    }

    pub fn last_used_dev(&self) -> DeviceId {
        self.last_used_dev
    }

    pub fn set_last_used_dev(&mut self, device: DeviceId) {
        self.last_used_dev = device;
    }

    /// Fold a raw transition that translated to `button` into the held mask.
    pub fn apply(&mut self, button: MenuButtons, down: bool) {
        if button.is_empty() {
            return;
        }
        self.held.set(button, down);
    }

    pub fn clear_held(&mut self) {
        self.held = MenuButtons::empty();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn autorepeat_mut(&mut self) -> &mut Autorepeat {
        &mut self.autorepeat
    }
}

/// Autorepeat bookkeeping for `menu_wait`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Autorepeat {
    prev: MenuButtons,
    repeats: u32,
}

impl Autorepeat {
    /// How long the next wait may take: the long initial delay until a result
    /// repeats, then the caller's fast repeat delay.
    pub fn wait_time(&self, initial: Duration, fast: Duration) -> Duration {
        if self.repeats > 0 {
            fast
        } else {
            initial
        }
    }

    /// Count the first result of a wait.
    pub fn observe(&mut self, result: MenuButtons) {
        if result == self.prev {
            self.repeats += 1;
        }
    }

    /// Record the returned result. A release in between or a different result
    /// restarts the repeat count.
    pub fn settle(&mut self, result: MenuButtons, released: bool) {
        if released || result != self.prev {
            self.repeats = 0;
        }
        self.prev = result;
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonals_keep_vertical_axis() {
        let up_left = MenuButtons::UP | MenuButtons::LEFT;
        assert_eq!(suppress_diagonals(up_left), MenuButtons::UP);

        let down_right = MenuButtons::DOWN | MenuButtons::RIGHT | MenuButtons::MOK;
        assert_eq!(
            suppress_diagonals(down_right),
            MenuButtons::DOWN | MenuButtons::MOK
        );

        let left_right = MenuButtons::LEFT | MenuButtons::RIGHT;
        assert_eq!(suppress_diagonals(left_right), left_right);
    }

    #[test]
    fn apply_sets_and_clears_bits() {
        let mut state = MenuState::default();
        state.apply(MenuButtons::UP, true);
        state.apply(MenuButtons::MOK, true);
        state.apply(MenuButtons::UP, false);
        state.apply(MenuButtons::empty(), true);
        assert_eq!(state.held(), MenuButtons::MOK);

        state.reset();
        assert_eq!(state.held(), MenuButtons::empty());
        assert_eq!(state.last_used_dev(), 0);
    }

    #[test]
    fn autorepeat_speeds_up_on_identical_results() {
        let initial = Duration::from_millis(450);
        let fast = Duration::from_millis(50);
        let mut rep = Autorepeat::default();

        assert_eq!(rep.wait_time(initial, fast), initial);
        rep.observe(MenuButtons::DOWN);
        rep.settle(MenuButtons::DOWN, false);
        assert_eq!(rep.wait_time(initial, fast), initial);

        rep.observe(MenuButtons::DOWN);
        rep.settle(MenuButtons::DOWN, false);
        assert_eq!(rep.repeats(), 1);
        assert_eq!(rep.wait_time(initial, fast), fast);

        rep.observe(MenuButtons::UP);
        rep.settle(MenuButtons::UP, false);
        assert_eq!(rep.repeats(), 0);
    }

    #[test]
    fn release_in_between_resets_repeats() {
        let mut rep = Autorepeat::default();
        rep.observe(MenuButtons::DOWN);
        rep.settle(MenuButtons::DOWN, false);
        rep.observe(MenuButtons::DOWN);
        rep.settle(MenuButtons::DOWN, true);
        assert_eq!(rep.repeats(), 0);
    }
}
