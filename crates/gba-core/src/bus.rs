//! Memory bus and address-space mapping
//!
//! The GBA memory map:
//! 0x0000_0000-0x0000_3FFF - 16KB BIOS ROM
//! 0x0200_0000-0x0203_FFFF - 256KB external work RAM (mirrored)
//! 0x0300_0000-0x0300_7FFF - 32KB internal work RAM (mirrored)
//! 0x0400_0000-0x0400_03FF - memory-mapped I/O registers
//! 0x0500_0000-0x0500_03FF - 1KB palette RAM (mirrored)
//! 0x0600_0000-0x0601_7FFF - 96KB VRAM (mirrored in 128KB windows)
//! 0x0700_0000-0x0700_03FF - 1KB OAM (mirrored)
//! 0x0800_0000-0x0DFF_FFFF - Game Pak ROM (up to 32MB, three wait-state images)
//! 0x0E00_0000-...         - Game Pak SRAM (not implemented)
//!
//! I/O registers are 16 bits wide; byte accesses are folded onto the
//! containing half-word. Registers this core does not implement keep their
//! last written value and report through the diagnostic sink when touched.

use crate::apu::Apu;
use crate::cartridge::{Cartridge, BIOS_SIZE};
use crate::host::{Host, LogLevel};
use crate::keypad::Keypad;

/// External work RAM size in bytes
pub const EWRAM_SIZE: usize = 0x4_0000;
/// Internal work RAM size in bytes
pub const IWRAM_SIZE: usize = 0x8000;
/// I/O register file size in bytes
pub const IO_SIZE: usize = 0x400;
/// Palette RAM size in bytes
pub const PALETTE_SIZE: usize = 0x400;
/// VRAM size in bytes
pub const VRAM_SIZE: usize = 0x1_8000;
/// OAM size in bytes
pub const OAM_SIZE: usize = 0x400;

pub const REG_DISPCNT: u32 = 0x000;
pub const REG_DISPSTAT: u32 = 0x004;
pub const REG_VCOUNT: u32 = 0x006;
pub const REG_SOUNDCNT_L: u32 = 0x080;
pub const REG_SOUNDCNT_H: u32 = 0x082;
pub const REG_SOUNDCNT_X: u32 = 0x084;
pub const REG_SOUNDBIAS: u32 = 0x088;
pub const REG_FIFO_A: u32 = 0x0A0;
pub const REG_FIFO_B: u32 = 0x0A4;
pub const REG_KEYINPUT: u32 = 0x130;
pub const REG_KEYCNT: u32 = 0x132;
pub const REG_IE: u32 = 0x200;
pub const REG_IF: u32 = 0x202;
pub const REG_WAITCNT: u32 = 0x204;
pub const REG_IME: u32 = 0x208;
pub const REG_POSTFLG: u32 = 0x300;

/// DISPSTAT bits the CPU may write; bits 0-2 are hardware status.
const DISPSTAT_WRITABLE: u16 = 0xFF38;

/// First I/O offset owned by the audio unit.
const SOUND_IO_START: u32 = 0x060;
/// Last even I/O offset owned by the audio unit (FIFO_B high half).
const SOUND_IO_LAST: u32 = 0x0A6;

/// System bus: all memory regions plus the peripherals that live behind
/// memory-mapped registers.
#[derive(Debug, Clone)]
pub struct SystemBus {
    /// 16KB BIOS image (zeroed when none is loaded)
    bios: Vec<u8>,
    /// 256KB external work RAM
    ewram: Vec<u8>,
    /// 32KB internal work RAM
    iwram: Vec<u8>,
    /// Raw I/O register file
    io: Vec<u8>,
    /// 1KB palette RAM
    palette: Vec<u8>,
    /// 96KB VRAM
    vram: Vec<u8>,
    /// 1KB OAM
    oam: Vec<u8>,
    /// Game Pak, once loaded
    cartridge: Option<Cartridge>,
    /// Keypad registers
    keypad: Keypad,
    /// Audio unit (owns the sound register block)
    apu: Apu,
}

impl SystemBus {
    /// Creates a bus with no cartridge and a zeroed BIOS.
    pub fn new() -> Self {
        let mut bus = Self {
            bios: vec![0; BIOS_SIZE],
            ewram: vec![0; EWRAM_SIZE],
            iwram: vec![0; IWRAM_SIZE],
            io: vec![0; IO_SIZE],
            palette: vec![0; PALETTE_SIZE],
            vram: vec![0; VRAM_SIZE],
            oam: vec![0; OAM_SIZE],
            cartridge: None,
            keypad: Keypad::new(),
            apu: Apu::new(),
        };
        bus.reset();
        bus
    }

    /// Clears all volatile memory and peripheral state. The BIOS image and
    /// the cartridge survive a reset.
    pub fn reset(&mut self) {
        self.ewram.fill(0);
        self.iwram.fill(0);
        self.io.fill(0);
        self.palette.fill(0);
        self.vram.fill(0);
        self.oam.fill(0);
        self.keypad.reset();
        self.apu.reset();
        self.set_io_value(REG_SOUNDBIAS, 0x0200);
    }

    /// Installs a cartridge, replacing any previous one.
    pub fn set_cartridge(&mut self, cartridge: Option<Cartridge>) {
        self.cartridge = cartridge;
    }

    /// The loaded cartridge, if any.
    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    /// Copies a validated BIOS image into place.
    pub fn load_bios(&mut self, data: &[u8]) {
        self.bios.copy_from_slice(data);
    }

    /// Additive word checksum of the BIOS image, stored into save states so
    /// a restore under a different BIOS can be flagged.
    pub fn bios_checksum(&self) -> u32 {
        self.bios
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .fold(0u32, |acc, w| acc.wrapping_add(w))
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    pub fn keypad_mut(&mut self) -> &mut Keypad {
        &mut self.keypad
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    pub fn palette_ram(&self) -> &[u8] {
        &self.palette
    }

    pub fn oam(&self) -> &[u8] {
        &self.oam
    }

    pub(crate) fn apu(&self) -> &Apu {
        &self.apu
    }

    pub(crate) fn apu_mut(&mut self) -> &mut Apu {
        &mut self.apu
    }

    pub(crate) fn ewram_mut(&mut self) -> &mut [u8] {
        &mut self.ewram
    }

    pub(crate) fn iwram_mut(&mut self) -> &mut [u8] {
        &mut self.iwram
    }

    pub(crate) fn io_raw(&self) -> &[u8] {
        &self.io
    }

    pub(crate) fn io_raw_mut(&mut self) -> &mut [u8] {
        &mut self.io
    }

    pub(crate) fn ewram(&self) -> &[u8] {
        &self.ewram
    }

    pub(crate) fn iwram(&self) -> &[u8] {
        &self.iwram
    }

    pub(crate) fn vram_mut(&mut self) -> &mut [u8] {
        &mut self.vram
    }

    pub(crate) fn palette_mut(&mut self) -> &mut [u8] {
        &mut self.palette
    }

    pub(crate) fn oam_mut(&mut self) -> &mut [u8] {
        &mut self.oam
    }

    /// Advances the audio unit.
    pub fn step_audio(&mut self, cycles: u32, host: &mut dyn Host) {
        self.apu.tick(cycles, host);
    }

    /// Reads a raw I/O half-word with no side effects or logging. Used by
    /// the video and render units for registers they do not own.
    pub fn io_value(&self, offset: u32) -> u16 {
        let index = (offset & !1) as usize;
        u16::from_le_bytes([self.io[index], self.io[index + 1]])
    }

    /// Stores a raw I/O half-word, bypassing CPU write semantics. Used by
    /// the video unit to publish DISPSTAT and VCOUNT.
    pub(crate) fn set_io_value(&mut self, offset: u32, value: u16) {
        let index = (offset & !1) as usize;
        self.io[index..index + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// ORs bits into the IF register, bypassing acknowledge semantics.
    pub(crate) fn raise_interrupt(&mut self, bits: u16) {
        let pending = self.io_value(REG_IF) | bits;
        self.set_io_value(REG_IF, pending);
    }

    /// Reads one byte.
    pub fn read8(&mut self, address: u32, host: &mut dyn Host) -> u8 {
        match address >> 24 {
            0x00 if (address & 0x00FF_FFFF) < BIOS_SIZE as u32 => {
                self.bios[(address & 0x3FFF) as usize]
            }
            0x02 => self.ewram[(address & 0x3_FFFF) as usize],
            0x03 => self.iwram[(address & 0x7FFF) as usize],
            0x04 => {
                let half = self.read_io(address, host);
                half.to_le_bytes()[(address & 1) as usize]
            }
            0x05 => self.palette[(address & 0x3FF) as usize],
            0x06 => self.vram[Self::vram_offset(address)],
            0x07 => self.oam[(address & 0x3FF) as usize],
            0x08..=0x0D => self.read_rom8(address & 0x01FF_FFFF),
            0x0E | 0x0F => {
                host.log(
                    LogLevel::Stub,
                    format_args!("Unimplemented memory access: SRAM (0x{:08X})", address),
                );
                0xFF
            }
            _ => {
                host.log(
                    LogLevel::GameError,
                    format_args!("Bad memory read at 0x{:08X}", address),
                );
                0
            }
        }
    }

    /// Reads a half-word. The address is aligned down.
    pub fn read16(&mut self, address: u32, host: &mut dyn Host) -> u16 {
        let address = address & !1;
        match address >> 24 {
            0x04 => self.read_io(address, host),
            0x08..=0x0D => {
                let offset = address & 0x01FF_FFFF;
                u16::from_le_bytes([self.read_rom8(offset), self.read_rom8(offset + 1)])
            }
            _ => u16::from_le_bytes([
                self.read8(address, host),
                self.read8(address + 1, host),
            ]),
        }
    }

    /// Reads a word. The address is aligned down.
    pub fn read32(&mut self, address: u32, host: &mut dyn Host) -> u32 {
        let address = address & !3;
        let lo = self.read16(address, host);
        let hi = self.read16(address + 2, host);
        u32::from(lo) | (u32::from(hi) << 16)
    }

    /// Writes one byte. Palette and VRAM byte writes land on both bytes of
    /// the containing half-word, as on hardware; OAM byte writes are dropped.
    pub fn write8(&mut self, address: u32, value: u8, host: &mut dyn Host) {
        match address >> 24 {
            0x02 => self.ewram[(address & 0x3_FFFF) as usize] = value,
            0x03 => self.iwram[(address & 0x7FFF) as usize] = value,
            0x04 => {
                let current = self.io_value(address & 0x3FF);
                let mut bytes = current.to_le_bytes();
                bytes[(address & 1) as usize] = value;
                self.write_io(address & !1, u16::from_le_bytes(bytes), host);
            }
            0x05 => {
                let index = (address & 0x3FE) as usize;
                self.palette[index] = value;
                self.palette[index + 1] = value;
            }
            0x06 => {
                let index = Self::vram_offset(address) & !1;
                self.vram[index] = value;
                self.vram[index + 1] = value;
            }
            0x07 => {}
            0x08..=0x0D => {
                host.log(
                    LogLevel::GameError,
                    format_args!("Write to read-only memory: 0x{:08X}", address),
                );
            }
            0x0E | 0x0F => {
                host.log(
                    LogLevel::Stub,
                    format_args!("Unimplemented memory access: SRAM (0x{:08X})", address),
                );
            }
            _ => {
                host.log(
                    LogLevel::GameError,
                    format_args!("Bad memory write at 0x{:08X}", address),
                );
            }
        }
    }

    /// Writes a half-word. The address is aligned down.
    pub fn write16(&mut self, address: u32, value: u16, host: &mut dyn Host) {
        let address = address & !1;
        match address >> 24 {
            0x04 => self.write_io(address, value, host),
            0x05 => {
                let index = (address & 0x3FF) as usize;
                self.palette[index..index + 2].copy_from_slice(&value.to_le_bytes());
            }
            0x06 => {
                let index = Self::vram_offset(address);
                self.vram[index..index + 2].copy_from_slice(&value.to_le_bytes());
            }
            0x07 => {
                let index = (address & 0x3FF) as usize;
                self.oam[index..index + 2].copy_from_slice(&value.to_le_bytes());
            }
            _ => {
                let bytes = value.to_le_bytes();
                self.write8(address, bytes[0], host);
                self.write8(address + 1, bytes[1], host);
            }
        }
    }

    /// Writes a word. The address is aligned down.
    pub fn write32(&mut self, address: u32, value: u32, host: &mut dyn Host) {
        let address = address & !3;
        self.write16(address, value as u16, host);
        self.write16(address + 2, (value >> 16) as u16, host);
    }

    /// VRAM addresses mirror in 128KB windows; the upper 32KB of each window
    /// folds back onto the object region at 0x10000.
    fn vram_offset(address: u32) -> usize {
        let mut offset = (address & 0x1_FFFF) as usize;
        if offset >= VRAM_SIZE {
            offset &= !0x8000;
        }
        offset
    }

    fn read_rom8(&self, offset: u32) -> u8 {
        match &self.cartridge {
            Some(cart) => cart.read8(offset),
            // With no Game Pak the bus floats; the prefetch half-word echo
            // shows through, same as reads past the end of a ROM.
            None => {
                let echo = ((offset >> 1) & 0xFFFF) as u16;
                echo.to_le_bytes()[(offset & 1) as usize]
            }
        }
    }

    fn read_io(&mut self, address: u32, host: &mut dyn Host) -> u16 {
        if address & 0x00FF_FFFF >= IO_SIZE as u32 {
            host.log(
                LogLevel::GameError,
                format_args!("Bad I/O read at 0x{:08X}", address),
            );
            return 0;
        }
        let offset = address & 0x3FE;
        match offset {
            REG_KEYINPUT => self.keypad.keyinput(),
            SOUND_IO_START..=SOUND_IO_LAST => self.apu.read_register(offset),
            REG_DISPCNT | REG_DISPSTAT | REG_VCOUNT | REG_KEYCNT | REG_IE | REG_IF
            | REG_WAITCNT | REG_IME | REG_POSTFLG => self.io_value(offset),
            _ => {
                host.log(
                    LogLevel::Stub,
                    format_args!("Unimplemented I/O register read: 0x{:03X}", offset),
                );
                self.io_value(offset)
            }
        }
    }

    fn write_io(&mut self, address: u32, value: u16, host: &mut dyn Host) {
        if address & 0x00FF_FFFF >= IO_SIZE as u32 {
            host.log(
                LogLevel::GameError,
                format_args!("Bad I/O write at 0x{:08X}", address),
            );
            return;
        }
        let offset = address & 0x3FE;
        match offset {
            REG_DISPCNT => {
                if value & 0x7 < 3 {
                    host.log(
                        LogLevel::Stub,
                        format_args!("Tile-based video mode {} unimplemented", value & 0x7),
                    );
                }
                self.set_io_value(offset, value);
            }
            REG_DISPSTAT => {
                let status = self.io_value(REG_DISPSTAT) & !DISPSTAT_WRITABLE;
                self.set_io_value(offset, status | (value & DISPSTAT_WRITABLE));
            }
            // VCOUNT and KEYINPUT are read-only.
            REG_VCOUNT | REG_KEYINPUT => {}
            SOUND_IO_START..=SOUND_IO_LAST => self.apu.write_register(offset, value, host),
            REG_IF => {
                // Writing 1 acknowledges (clears) a pending interrupt.
                let pending = self.io_value(REG_IF) & !value;
                self.set_io_value(offset, pending);
            }
            // KEYCNT is serialized with the register file.
            REG_KEYCNT | REG_IE | REG_WAITCNT | REG_IME | REG_POSTFLG => {
                self.set_io_value(offset, value);
            }
            _ => {
                host.log(
                    LogLevel::Stub,
                    format_args!("Unimplemented I/O register write: 0x{:03X}", offset),
                );
                self.set_io_value(offset, value);
            }
        }
    }
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}
