//! Keypad state and the KEYINPUT register
//!
//! The GBA exposes its ten buttons through KEYINPUT (0x0400_0130), one bit
//! per button, active low: a pressed button reads as 0. KEYCNT (0x0400_0132)
//! is a plain latch in the bus's register file; the keypad interrupt it
//! configures is not raised by this core.

use bitflags::bitflags;

bitflags! {
    /// Button mask in KEYINPUT bit order, active high on this side.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Keys: u16 {
        const A      = 1 << 0;
        const B      = 1 << 1;
        const SELECT = 1 << 2;
        const START  = 1 << 3;
        const RIGHT  = 1 << 4;
        const LEFT   = 1 << 5;
        const UP     = 1 << 6;
        const DOWN   = 1 << 7;
        const R      = 1 << 8;
        const L      = 1 << 9;
    }
}

/// All ten button bits.
pub const KEY_MASK: u16 = 0x03FF;

/// Keypad register state.
#[derive(Debug, Clone)]
pub struct Keypad {
    /// KEYINPUT value as the CPU reads it (active low).
    keyinput: u16,
}

impl Keypad {
    /// Creates a keypad with every button released.
    pub fn new() -> Self {
        Self { keyinput: KEY_MASK }
    }

    /// Resets to the released state.
    pub fn reset(&mut self) {
        self.keyinput = KEY_MASK;
    }

    /// Replaces the pressed-button set. `keys` is active high; the register
    /// inverts it.
    pub fn set_pressed(&mut self, keys: Keys) {
        self.keyinput = !keys.bits() & KEY_MASK;
    }

    /// KEYINPUT as the CPU reads it. Unused high bits read back as 1.
    pub fn keyinput(&self) -> u16 {
        self.keyinput | !KEY_MASK
    }

    /// Currently pressed buttons, active high.
    pub fn pressed(&self) -> Keys {
        Keys::from_bits_truncate(!self.keyinput & KEY_MASK)
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}
