//! Controller input handling
//!
//! Standard joypad: an 8-bit button snapshot latched by the strobe and
//! shifted out one bit per read of $4016/$4017.

use std::fmt;

/// Number of controller ports on the console
pub const MAX_PORTS: usize = 2;

/// Value returned once all eight buttons have been shifted out
pub const EXHAUSTED_READ: u8 = 1;

/// Button snapshot. Bit order is the order the buttons are shifted out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Buttons(u8);

impl Buttons {
    pub const A: u8 = 0b00000001;
    pub const B: u8 = 0b00000010;
    pub const SELECT: u8 = 0b00000100;
    pub const START: u8 = 0b00001000;
    pub const UP: u8 = 0b00010000;
    pub const DOWN: u8 = 0b00100000;
    pub const LEFT: u8 = 0b01000000;
    pub const RIGHT: u8 = 0b10000000;

    pub const NAMES: [&'static str; 8] = ["A", "B", "Select", "Start", "Up", "Down", "Left", "Right"];

    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn pressed(&self, mask: u8) -> bool {
        (self.0 & mask) != 0
    }

    pub fn set(&mut self, mask: u8, pressed: bool) {
        self.0 = if pressed { self.0 | mask } else { self.0 & !mask };
    }
}

impl From<u8> for Buttons {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl fmt::Display for Buttons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let held: Vec<&str> = Self::NAMES
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.0 & (1 << bit) != 0)
            .map(|(_, name)| *name)
            .collect();
        if held.is_empty() {
            f.write_str("-")
        } else {
            f.write_str(&held.join("+"))
        }
    }
}

/// Standard NES controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Controller {
    /// Live snapshot supplied by the host
    buttons: Buttons,
    /// Shift register captured by the strobe
    latch: u8,
    /// Bits already shifted out since the last strobe
    index: u8,
    strobe: bool,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buttons(&self) -> Buttons {
        self.buttons
    }

    /// Replace the whole snapshot. Takes effect at the next strobe.
    pub fn set_buttons(&mut self, buttons: Buttons) {
        self.buttons = buttons;
        if self.strobe {
            self.latch = buttons.bits();
        }
    }

    pub fn button_down(&mut self, mask: u8) {
        let mut buttons = self.buttons;
        buttons.set(mask, true);
        self.set_buttons(buttons);
    }

    pub fn button_up(&mut self, mask: u8) {
        let mut buttons = self.buttons;
        buttons.set(mask, false);
        self.set_buttons(buttons);
    }

    /// Bit 0 of `value` drives the strobe line. While it is high the latch
    /// keeps reloading; the falling edge freezes it for shifting.
    pub fn strobe_write(&mut self, value: u8) {
        let high = (value & 0x01) != 0;
        if high || self.strobe {
            self.latch = self.buttons.bits();
            self.index = 0;
        }
        self.strobe = high;
    }

    pub fn read(&mut self) -> u8 {
        let value = self.peek();
        if !self.strobe && self.index < 8 {
            self.index += 1;
        }
        value
    }

    /// The bit the next `read` would return, without shifting.
    pub fn peek(&self) -> u8 {
        if self.strobe {
            self.buttons.bits() & 0x01
        } else if self.index >= 8 {
            EXHAUSTED_READ
        } else {
            (self.latch >> self.index) & 0x01
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strobe(controller: &mut Controller) {
        controller.strobe_write(1);
        controller.strobe_write(0);
    }

    #[test]
    fn test_read_order_then_exhausted() {
        let mut controller = Controller::new();
        controller.set_buttons(Buttons::new(Buttons::A | Buttons::START | Buttons::RIGHT));
        strobe(&mut controller);

        let bits: Vec<u8> = (0..8).map(|_| controller.read()).collect();
        assert_eq!(bits, vec![1, 0, 0, 1, 0, 0, 0, 1]);
        assert_eq!(controller.read(), EXHAUSTED_READ);
        assert_eq!(controller.read(), EXHAUSTED_READ);
    }

    #[test]
    fn test_strobe_high_returns_a() {
        let mut controller = Controller::new();
        controller.button_down(Buttons::A);
        controller.strobe_write(1);
        assert_eq!(controller.read(), 1);
        assert_eq!(controller.read(), 1);
        controller.button_up(Buttons::A);
        assert_eq!(controller.read(), 0);
    }

    #[test]
    fn test_snapshot_frozen_after_strobe() {
        let mut controller = Controller::new();
        controller.button_down(Buttons::B);
        strobe(&mut controller);
        controller.button_up(Buttons::B);
        assert_eq!(controller.read(), 0);
        assert_eq!(controller.read(), 1);
    }

    #[test]
    fn test_buttons_display() {
        assert_eq!(Buttons::new(0).to_string(), "-");
        assert_eq!(Buttons::new(Buttons::A | Buttons::UP).to_string(), "A+Up");
    }
}
