//! GBA Core - Pure Rust Game Boy Advance emulator library
//!
//! This crate provides the core emulation logic for a Game Boy Advance
//! (AGB-001). It has no frontend or host-ABI dependencies; hosts observe the
//! machine through the [`host::Host`] sink and the framebuffer accessor.

#![forbid(unsafe_code)]

/// CPU module containing the ARM7TDMI register file and ARM-state interpreter
pub mod cpu;
/// Memory bus and address-space mapping
pub mod bus;
/// LCD timing (scanline/frame state machine) and the renderer seam
pub mod video;
/// Software renderer for the bitmap display modes
pub mod render;
/// Audio unit: Direct Sound FIFOs and the output sample clock
pub mod apu;
/// Keypad state and the KEYINPUT register
pub mod keypad;
/// Cartridge and BIOS image validation and loading
pub mod cartridge;
/// Host event sink: audio samples and diagnostic messages
pub mod host;
/// Fixed-layout save-state codec
pub mod state;
/// Integration module for the complete GBA system
pub mod system;
