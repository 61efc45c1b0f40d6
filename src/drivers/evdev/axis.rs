//! Analog stick to direction key translation.

use super::keys::{KEY_DOWN, KEY_LEFT, KEY_RIGHT, KEY_UP};
use crate::driver::KeyEvent;
use crate::error::{InputError, Result};

pub const ABS_X: u16 = 0;
pub const ABS_Y: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsRange {
    pub min: i32,
    pub max: i32,
}

impl AbsRange {
    /// Direction key for `value` given a dead zone measured from either end.
    fn classify(&self, value: i32, lzone: i32, low: u16, high: u16) -> u16 {
        if value < self.min + lzone {
            low
        } else if value > self.max - lzone {
            high
        } else {
            0
        }
    }
}

/// X/Y axes of a stick with the last direction reported for each.
///
/// The dead zone comes from the X axis; a device without one has no usable
/// stick and every translation is a no-op.
#[derive(Debug, Clone, Default)]
pub struct AbsAxes {
    x: Option<AbsRange>,
    y: Option<AbsRange>,
    lzone: i32,
    last_x: u16,
    last_y: u16,
}

impl AbsAxes {
    pub fn new(x: Option<AbsRange>, y: Option<AbsRange>) -> Self {
        let lzone = x.map_or(0, |range| (range.max - range.min) / 4);
        Self {
            x,
            y,
            lzone,
            last_x: 0,
            last_y: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lzone != 0
    }

    pub fn dead_zone(&self) -> i32 {
        self.lzone
    }

    /// Set the dead zone as the percentage of the half-range a stick must travel.
    pub fn set_dead_zone_percent(&mut self, percent: i32) -> Result<()> {
        if !(1..=99).contains(&percent) {
            return Err(InputError::config(format!(
                "dead zone {percent}% outside 1..=99"
            )));
        }
        let Some(x) = self.x.filter(|_| self.lzone != 0) else {
            return Err(InputError::config("device has no analog stick"));
        };

        let half = (x.max - x.min) / 2;
        let lzone = half - half * percent / 100;
        self.lzone = if lzone < 1 {
            1
        } else if lzone >= half {
            half - 1
        } else {
            lzone
        };
        Ok(())
    }

    /// Turn an absolute axis event into a direction key transition.
    ///
    /// Moving straight from one side to the other first releases the old
    /// direction; the new one is pressed on the next event past the dead zone.
    pub fn translate(&mut self, axis: u16, value: i32) -> Option<KeyEvent> {
        if self.lzone == 0 {
            return None;
        }
        let lzone = self.lzone;
        let (down, last) = match axis {
            ABS_X => (self.x?.classify(value, lzone, KEY_LEFT, KEY_RIGHT), &mut self.last_x),
            ABS_Y => (self.y?.classify(value, lzone, KEY_UP, KEY_DOWN), &mut self.last_y),
            _ => return None,
        };

        if down == *last {
            return None;
        }
        if down == 0 || *last != 0 {
            let released = *last;
            *last = 0;
            return Some(KeyEvent::up(u32::from(released)));
        }
        *last = down;
        Some(KeyEvent::down(u32::from(down)))
    }

    /// Direction keys held by the current stick position.
    pub fn held_directions(&self, x_value: i32, y_value: i32) -> Vec<u16> {
        if self.lzone == 0 {
            return Vec::new();
        }
        let mut held = Vec::with_capacity(2);
        if let Some(x) = self.x {
            match x.classify(x_value, self.lzone, KEY_LEFT, KEY_RIGHT) {
                0 => {}
                key => held.push(key),
            }
        }
        if let Some(y) = self.y {
            match y.classify(y_value, self.lzone, KEY_UP, KEY_DOWN) {
                0 => {}
                key => held.push(key),
            }
        }
        held
    }
}
