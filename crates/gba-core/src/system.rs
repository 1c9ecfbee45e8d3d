//! GBA System Integration
//!
//! Integrates the CPU, bus, video timing and software renderer into a
//! runnable machine. The frame loop steps whole instructions, so a frame
//! boundary lands on the first instruction that carries the video unit
//! into V-blank.

use std::path::Path;

use crate::bus::SystemBus;
use crate::cartridge::{self, Cartridge, CartridgeError};
use crate::cpu::Arm7;
use crate::host::Host;
use crate::keypad::Keys;
use crate::render::SoftwareRenderer;
use crate::state::{self, StateError};
use crate::video::{Video, VideoRenderer};

/// GBA machine - integrates all components
pub struct Gba {
    cpu: Arm7,
    bus: SystemBus,
    video: Video,
    renderer: SoftwareRenderer,
}

impl Gba {
    /// Creates a powered-on machine with no cartridge.
    pub fn new() -> Self {
        let mut cpu = Arm7::new();
        cpu.reset();
        Self {
            cpu,
            bus: SystemBus::new(),
            video: Video::new(),
            renderer: SoftwareRenderer::new(),
        }
    }

    /// Loads a ROM image, replacing any cartridge already present, and
    /// resets the machine. A rejected image leaves the machine untouched.
    pub fn load_rom(&mut self, rom: Vec<u8>) -> Result<(), CartridgeError> {
        let cartridge = Cartridge::from_bytes(rom)?;
        self.bus.set_cartridge(Some(cartridge));
        self.reset();
        Ok(())
    }

    /// Loads a ROM image from disk. See [`Gba::load_rom`].
    pub fn load_rom_file(&mut self, path: &Path) -> Result<(), CartridgeError> {
        let cartridge = Cartridge::from_file(path)?;
        self.bus.set_cartridge(Some(cartridge));
        self.reset();
        Ok(())
    }

    /// Removes the cartridge and resets the machine.
    pub fn unload_rom(&mut self) {
        self.bus.set_cartridge(None);
        self.reset();
    }

    /// Installs a BIOS image. Without one the machine boots straight into
    /// the cartridge.
    pub fn load_bios(&mut self, data: &[u8]) -> Result<(), CartridgeError> {
        cartridge::check_bios(data)?;
        self.bus.load_bios(data);
        Ok(())
    }

    /// Resets every component to the power-on state. The cartridge and
    /// BIOS stay in place.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
        self.video.reset();
        self.renderer.reset();
    }

    /// Executes one instruction and advances video and audio by its cycle
    /// cost. Returns the cycles consumed.
    pub fn step(&mut self, host: &mut dyn Host) -> u32 {
        let cycles = self.cpu.step(&mut self.bus, host);
        self.video.tick(cycles, &mut self.bus, &mut self.renderer);
        self.bus.step_audio(cycles, host);
        cycles
    }

    /// Runs until exactly one more frame has completed. Audio pairs and
    /// diagnostics produced along the way go through `host` as they occur.
    pub fn run_frame(&mut self, host: &mut dyn Host) {
        let current = self.video.frame_counter();
        while self.video.frame_counter() == current {
            self.step(host);
        }
    }

    /// Completed frames since reset or state restore.
    pub fn frame_count(&self) -> u32 {
        self.video.frame_counter()
    }

    /// Replaces the pressed-key set.
    pub fn set_keys(&mut self, keys: Keys) {
        self.bus.keypad_mut().set_pressed(keys);
    }

    /// The most recently completed frame and its row stride in pixels.
    pub fn frame_pixels(&self) -> (&[u32], usize) {
        self.renderer.pixels()
    }

    /// Serializes the machine into `buf`, which must be exactly
    /// [`state::STATE_SIZE`] bytes.
    pub fn save_state(&self, buf: &mut [u8]) -> Result<(), StateError> {
        state::serialize(&self.cpu, &self.bus, &self.video, buf)
    }

    /// Restores the machine from `buf`. A rejected blob leaves the machine
    /// untouched; a BIOS mismatch is reported through `host` as a warning.
    pub fn load_state(&mut self, buf: &[u8], host: &mut dyn Host) -> Result<(), StateError> {
        state::deserialize(&mut self.cpu, &mut self.bus, &mut self.video, buf, host)
    }

    /// Get CPU reference
    pub fn cpu(&self) -> &Arm7 {
        &self.cpu
    }

    /// Get mutable CPU reference
    pub fn cpu_mut(&mut self) -> &mut Arm7 {
        &mut self.cpu
    }

    /// Get bus reference
    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    /// Get mutable bus reference
    pub fn bus_mut(&mut self) -> &mut SystemBus {
        &mut self.bus
    }
}

impl Default for Gba {
    fn default() -> Self {
        Self::new()
    }
}
