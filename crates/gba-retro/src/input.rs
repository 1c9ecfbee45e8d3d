//! Input mapping
//!
//! The pad has ten buttons and their bit positions in the packed key word
//! are fixed by the key register layout. The session declares this table to
//! the host once per initialize and queries each button individually when
//! packing a frame's input.

use crate::callbacks::Callbacks;

/// Port the single supported pad lives on.
pub const JOYPAD_PORT: u32 = 0;

/// Input device classes the session can query. Only the standard pad
/// exists on this hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Joypad,
}

/// The ten pad buttons. Discriminants are the key-register bit positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoypadButton {
    A = 0,
    B = 1,
    Select = 2,
    Start = 3,
    Right = 4,
    Left = 5,
    Up = 6,
    Down = 7,
    R = 8,
    L = 9,
}

impl JoypadButton {
    /// Every button, in bit order.
    pub const ALL: [JoypadButton; 10] = [
        JoypadButton::A,
        JoypadButton::B,
        JoypadButton::Select,
        JoypadButton::Start,
        JoypadButton::Right,
        JoypadButton::Left,
        JoypadButton::Up,
        JoypadButton::Down,
        JoypadButton::R,
        JoypadButton::L,
    ];

    /// Bit position in the packed key word.
    pub const fn bit(self) -> u16 {
        self as u16
    }

    /// Mask with only this button's bit set.
    pub const fn mask(self) -> u16 {
        1 << self.bit()
    }

    /// Label hosts show the user.
    pub const fn label(self) -> &'static str {
        match self {
            JoypadButton::A => "A",
            JoypadButton::B => "B",
            JoypadButton::Select => "Select",
            JoypadButton::Start => "Start",
            JoypadButton::Right => "Right",
            JoypadButton::Left => "Left",
            JoypadButton::Up => "Up",
            JoypadButton::Down => "Down",
            JoypadButton::R => "R",
            JoypadButton::L => "L",
        }
    }
}

/// One row of the controller declaration published at initialize.
#[derive(Debug, Clone, Copy)]
pub struct InputDescriptor {
    pub port: u32,
    pub device: DeviceClass,
    pub index: u32,
    pub button: JoypadButton,
    pub label: &'static str,
}

const fn descriptor(button: JoypadButton) -> InputDescriptor {
    InputDescriptor {
        port: JOYPAD_PORT,
        device: DeviceClass::Joypad,
        index: 0,
        button,
        label: button.label(),
    }
}

/// The full controller table, one entry per button.
pub const INPUT_DESCRIPTORS: [InputDescriptor; 10] = [
    descriptor(JoypadButton::A),
    descriptor(JoypadButton::B),
    descriptor(JoypadButton::Select),
    descriptor(JoypadButton::Start),
    descriptor(JoypadButton::Right),
    descriptor(JoypadButton::Left),
    descriptor(JoypadButton::Up),
    descriptor(JoypadButton::Down),
    descriptor(JoypadButton::R),
    descriptor(JoypadButton::L),
];

/// Packs the host's input snapshot into the key-state word. A button whose
/// query has no capability behind it reads as released.
pub(crate) fn read_joypad(callbacks: &mut Callbacks) -> u16 {
    let mut keys = 0u16;
    for button in JoypadButton::ALL {
        if callbacks.input_state(JOYPAD_PORT, DeviceClass::Joypad, 0, button) {
            keys |= button.mask();
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_positions_match_key_register() {
        assert_eq!(JoypadButton::A.bit(), 0);
        assert_eq!(JoypadButton::B.bit(), 1);
        assert_eq!(JoypadButton::Select.bit(), 2);
        assert_eq!(JoypadButton::Start.bit(), 3);
        assert_eq!(JoypadButton::Right.bit(), 4);
        assert_eq!(JoypadButton::Left.bit(), 5);
        assert_eq!(JoypadButton::Up.bit(), 6);
        assert_eq!(JoypadButton::Down.bit(), 7);
        assert_eq!(JoypadButton::R.bit(), 8);
        assert_eq!(JoypadButton::L.bit(), 9);
    }

    #[test]
    fn test_all_buttons_cover_ten_bits() {
        let mut mask = 0u16;
        for button in JoypadButton::ALL {
            assert_eq!(mask & button.mask(), 0, "duplicate bit for {:?}", button);
            mask |= button.mask();
        }
        assert_eq!(mask, 0x03FF);
    }

    #[test]
    fn test_descriptor_table_declares_every_button() {
        assert_eq!(INPUT_DESCRIPTORS.len(), 10);
        for (i, descriptor) in INPUT_DESCRIPTORS.iter().enumerate() {
            assert_eq!(descriptor.button.bit() as usize, i);
            assert_eq!(descriptor.port, JOYPAD_PORT);
            assert_eq!(descriptor.label, descriptor.button.label());
        }
    }

    #[test]
    fn test_unbound_input_reads_all_released() {
        let mut callbacks = Callbacks::new();
        assert_eq!(read_joypad(&mut callbacks), 0);
    }

    #[test]
    fn test_packing_sets_queried_bits() {
        let mut callbacks = Callbacks::new();
        callbacks.set_input_state(|_port, _device, _index, button| {
            matches!(button, JoypadButton::A | JoypadButton::Start)
        });
        assert_eq!(read_joypad(&mut callbacks), 0b1001);
    }
}
