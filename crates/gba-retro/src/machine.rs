//! Machine seam
//!
//! The session drives anything that can load a program, run one frame and
//! round trip its state through a fixed-size blob. The real machine is
//! [`gba_core::system::Gba`]; tests substitute a scripted one so session
//! behavior is checkable without emulating anything.

use gba_core::cartridge::CartridgeError;
use gba_core::host::Host;
use gba_core::keypad::Keys;
use gba_core::state::StateError;
use gba_core::system::Gba;
use gba_core::video::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// Framebuffer word size. The machine renders XRGB8888.
const BYTES_PER_PIXEL: usize = 4;

/// One finished frame, borrowed from the machine.
#[derive(Debug, Clone, Copy)]
pub struct FrameRef<'a> {
    /// Pixel rows, stride padded.
    pub pixels: &'a [u32],
    /// Visible width in pixels.
    pub width: u32,
    /// Visible height in pixels.
    pub height: u32,
    /// Distance from one row start to the next, in bytes.
    pub pitch: usize,
}

/// What the session requires of a machine.
///
/// `Default` stands in for power-on construction so the session can build
/// the machine itself at initialize time.
pub trait Machine: Default {
    /// Exact byte length of the machine's state blob.
    const STATE_SIZE: usize;

    /// Power-on reset. A loaded program and BIOS stay in place.
    fn reset(&mut self);

    /// Validates and installs a program image, then resets. A rejected image
    /// must leave the machine untouched.
    fn load_rom(&mut self, data: Vec<u8>) -> Result<(), CartridgeError>;

    /// Removes the program image and resets.
    fn unload_rom(&mut self);

    /// Replaces the pressed-key word, active high, one bit per
    /// [`crate::input::JoypadButton`].
    fn set_keys(&mut self, keys: u16);

    /// Completed frames since reset or state restore.
    fn frame_count(&self) -> u32;

    /// Runs until exactly one more frame completes, pushing audio pairs and
    /// diagnostics into `host` as they occur.
    fn run_frame(&mut self, host: &mut dyn Host);

    /// The most recently completed frame.
    fn frame(&self) -> FrameRef<'_>;

    /// Serializes into `buf`, which must be exactly `STATE_SIZE` bytes.
    fn save_state(&self, buf: &mut [u8]) -> Result<(), StateError>;

    /// Restores from `buf`. A rejected blob must leave the machine
    /// untouched. Advisory findings are reported through `host`.
    fn load_state(&mut self, buf: &[u8], host: &mut dyn Host) -> Result<(), StateError>;
}

impl Machine for Gba {
    const STATE_SIZE: usize = gba_core::state::STATE_SIZE;

    fn reset(&mut self) {
        Gba::reset(self);
    }

    fn load_rom(&mut self, data: Vec<u8>) -> Result<(), CartridgeError> {
        Gba::load_rom(self, data)
    }

    fn unload_rom(&mut self) {
        Gba::unload_rom(self);
    }

    fn set_keys(&mut self, keys: u16) {
        Gba::set_keys(self, Keys::from_bits_truncate(keys));
    }

    fn frame_count(&self) -> u32 {
        Gba::frame_count(self)
    }

    fn run_frame(&mut self, host: &mut dyn Host) {
        Gba::run_frame(self, host);
    }

    fn frame(&self) -> FrameRef<'_> {
        let (pixels, stride) = self.frame_pixels();
        FrameRef {
            pixels,
            width: DISPLAY_WIDTH,
            height: DISPLAY_HEIGHT,
            pitch: stride * BYTES_PER_PIXEL,
        }
    }

    fn save_state(&self, buf: &mut [u8]) -> Result<(), StateError> {
        Gba::save_state(self, buf)
    }

    fn load_state(&mut self, buf: &[u8], host: &mut dyn Host) -> Result<(), StateError> {
        Gba::load_state(self, buf, host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gba_reports_fixed_geometry() {
        let gba = Gba::default();
        let frame = gba.frame();
        assert_eq!(frame.width, 240);
        assert_eq!(frame.height, 160);
        assert_eq!(frame.pitch, 1024);
        assert!(frame.pixels.len() * BYTES_PER_PIXEL >= frame.pitch * frame.height as usize);
    }

    #[test]
    fn test_state_size_matches_codec() {
        assert_eq!(<Gba as Machine>::STATE_SIZE, gba_core::state::STATE_SIZE);
    }

    #[test]
    fn test_key_word_clips_to_real_buttons() {
        let mut gba = Gba::default();
        Machine::set_keys(&mut gba, 0xFFFF);
        assert_eq!(gba.bus().keypad().pressed().bits(), 0x03FF);
    }
}
