//! Cartridge and BIOS image validation and loading
//!
//! This module handles Game Pak ROM images: header parsing, the "is this a
//! GBA program" predicate, and ownership of the ROM bytes for the lifetime of
//! a session. The cartridge header is 192 bytes; the fixed value 0x96 at
//! offset 0xB2 marks a well-formed image. The header complement at 0xBD is
//! verified by the real BIOS at boot; a BIOS-less boot tolerates a bad one,
//! so it is exposed here but not enforced at load.

use std::io;
use std::path::Path;

use thiserror::Error;

/// Cartridge header size in bytes.
pub const HEADER_SIZE: usize = 0xC0;

/// Offset of the fixed 0x96 byte every licensed image carries.
pub const MAGIC_OFFSET: usize = 0xB2;

/// The fixed value itself.
pub const MAGIC: u8 = 0x96;

/// Offset of the header complement byte.
pub const COMPLEMENT_OFFSET: usize = 0xBD;

/// Largest addressable Game Pak ROM (32 MiB).
pub const MAX_ROM_SIZE: usize = 0x0200_0000;

/// Expected size of a BIOS image (16 KiB).
pub const BIOS_SIZE: usize = 0x4000;

/// Cartridge header structure (offsets 0x00-0xBF of the ROM).
#[derive(Debug, Clone)]
pub struct GbaHeader {
    /// Entry-point instruction (an ARM branch) at offset 0x00
    pub entry_point: u32,
    /// Game title, space-padded ASCII, offset 0xA0
    pub title: [u8; 12],
    /// Game code ("AXXE" style), offset 0xAC
    pub game_code: [u8; 4],
    /// Maker code, offset 0xB0
    pub maker_code: [u8; 2],
    /// Fixed value, must be 0x96, offset 0xB2
    pub fixed_value: u8,
    /// Main unit code, offset 0xB3
    pub main_unit_code: u8,
    /// Device type, offset 0xB4
    pub device_type: u8,
    /// Software version, offset 0xBC
    pub software_version: u8,
    /// Header complement check, offset 0xBD
    pub complement: u8,
}

impl GbaHeader {
    /// Parses a cartridge header from the start of a ROM image.
    pub fn parse(bytes: &[u8]) -> Result<Self, CartridgeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CartridgeError::TooSmall { size: bytes.len() });
        }

        if bytes[MAGIC_OFFSET] != MAGIC {
            return Err(CartridgeError::BadMagic {
                found: bytes[MAGIC_OFFSET],
            });
        }

        let mut title = [0u8; 12];
        title.copy_from_slice(&bytes[0xA0..0xAC]);
        let mut game_code = [0u8; 4];
        game_code.copy_from_slice(&bytes[0xAC..0xB0]);
        let mut maker_code = [0u8; 2];
        maker_code.copy_from_slice(&bytes[0xB0..0xB2]);

        Ok(Self {
            entry_point: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            title,
            game_code,
            maker_code,
            fixed_value: bytes[MAGIC_OFFSET],
            main_unit_code: bytes[0xB3],
            device_type: bytes[0xB4],
            software_version: bytes[0xBC],
            complement: bytes[COMPLEMENT_OFFSET],
        })
    }

    /// Game title with trailing padding stripped, lossy outside ASCII.
    pub fn title_string(&self) -> String {
        let end = self
            .title
            .iter()
            .rposition(|&b| b != 0 && b != b' ')
            .map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.title[..end]).into_owned()
    }

    /// Game code as a string, lossy outside ASCII.
    pub fn game_code_string(&self) -> String {
        String::from_utf8_lossy(&self.game_code).into_owned()
    }

    /// Computes the complement over header bytes 0xA0-0xBC.
    pub fn compute_complement(bytes: &[u8]) -> u8 {
        let mut check: u8 = 0;
        for &b in &bytes[0xA0..COMPLEMENT_OFFSET] {
            check = check.wrapping_sub(b);
        }
        check.wrapping_sub(0x19)
    }

    /// Whether the stored complement matches the header contents.
    pub fn complement_ok(bytes: &[u8]) -> bool {
        bytes.len() >= HEADER_SIZE
            && Self::compute_complement(bytes) == bytes[COMPLEMENT_OFFSET]
    }
}

/// A loaded Game Pak: validated header plus the ROM bytes.
///
/// The cartridge owns its backing bytes; loading from a path reads the file
/// once and the machine keeps the buffer until unload.
#[derive(Debug, Clone)]
pub struct Cartridge {
    /// Parsed header
    header: GbaHeader,
    /// Full ROM image, header included
    rom: Vec<u8>,
}

impl Cartridge {
    /// Creates a cartridge from an in-memory ROM image, taking ownership of
    /// the buffer.
    pub fn from_bytes(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(CartridgeError::TooLarge { size: rom.len() });
        }
        let header = GbaHeader::parse(&rom)?;
        Ok(Self { header, rom })
    }

    /// Reads and validates a ROM image from a file.
    pub fn from_file(path: &Path) -> Result<Self, CartridgeError> {
        let rom = std::fs::read(path)?;
        Self::from_bytes(rom)
    }

    /// The black-box image predicate: is this a plausible GBA program?
    pub fn is_rom(bytes: &[u8]) -> bool {
        GbaHeader::parse(bytes).is_ok()
    }

    /// Parsed header.
    pub fn header(&self) -> &GbaHeader {
        &self.header
    }

    /// Raw ROM bytes.
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    /// ROM size in bytes.
    pub fn size(&self) -> usize {
        self.rom.len()
    }

    /// Reads one byte at a ROM offset. Out-of-range reads see the Game Pak
    /// open bus: the address bus half-word echoes back.
    pub fn read8(&self, offset: u32) -> u8 {
        match self.rom.get(offset as usize) {
            Some(&b) => b,
            None => {
                let echo = ((offset >> 1) & 0xFFFF) as u16;
                echo.to_le_bytes()[(offset & 1) as usize]
            }
        }
    }

    /// Reads a little-endian half-word at an even ROM offset.
    pub fn read16(&self, offset: u32) -> u16 {
        u16::from_le_bytes([self.read8(offset), self.read8(offset + 1)])
    }

    /// Reads a little-endian word at a word-aligned ROM offset.
    pub fn read32(&self, offset: u32) -> u32 {
        u32::from_le_bytes([
            self.read8(offset),
            self.read8(offset + 1),
            self.read8(offset + 2),
            self.read8(offset + 3),
        ])
    }
}

/// Validates a BIOS image without loading it anywhere.
pub fn check_bios(data: &[u8]) -> Result<(), CartridgeError> {
    if data.len() != BIOS_SIZE {
        return Err(CartridgeError::BadBiosSize { size: data.len() });
    }
    Ok(())
}

/// Cartridge and BIOS image error types.
#[derive(Debug, Error)]
pub enum CartridgeError {
    /// Image shorter than one cartridge header
    #[error("ROM image too small for a cartridge header ({size} bytes)")]
    TooSmall { size: usize },
    /// Fixed header byte missing
    #[error("bad cartridge header magic (found 0x{found:02X}, expected 0x96)")]
    BadMagic { found: u8 },
    /// Image exceeds the Game Pak address space
    #[error("ROM image exceeds 32 MiB ({size} bytes)")]
    TooLarge { size: usize },
    /// BIOS image is not exactly 16 KiB
    #[error("BIOS image must be 16 KiB ({size} bytes given)")]
    BadBiosSize { size: usize },
    /// Underlying file read failed
    #[error("failed to read image: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal header-only image that passes validation.
    fn make_rom(len: usize) -> Vec<u8> {
        let mut rom = vec![0u8; len.max(HEADER_SIZE)];
        rom[0xA0..0xAC].copy_from_slice(b"TESTCART    ");
        rom[0xAC..0xB0].copy_from_slice(b"ATSE");
        rom[0xB0..0xB2].copy_from_slice(b"01");
        rom[MAGIC_OFFSET] = MAGIC;
        rom[COMPLEMENT_OFFSET] = GbaHeader::compute_complement(&rom);
        rom
    }

    #[test]
    fn test_header_parsing() {
        let rom = make_rom(HEADER_SIZE);
        let header = GbaHeader::parse(&rom).unwrap();
        assert_eq!(header.fixed_value, MAGIC);
        assert_eq!(header.title_string(), "TESTCART");
        assert_eq!(header.game_code_string(), "ATSE");
    }

    #[test]
    fn test_rejects_short_image() {
        let rom = vec![0u8; 0x80];
        assert!(matches!(
            GbaHeader::parse(&rom),
            Err(CartridgeError::TooSmall { .. })
        ));
        assert!(!Cartridge::is_rom(&rom));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut rom = make_rom(HEADER_SIZE);
        rom[MAGIC_OFFSET] = 0x00;
        assert!(matches!(
            GbaHeader::parse(&rom),
            Err(CartridgeError::BadMagic { found: 0x00 })
        ));
        assert!(!Cartridge::is_rom(&rom));
    }

    #[test]
    fn test_complement_check() {
        let rom = make_rom(HEADER_SIZE);
        assert!(GbaHeader::complement_ok(&rom));

        let mut bad = rom.clone();
        bad[0xA5] ^= 0xFF;
        assert!(!GbaHeader::complement_ok(&bad));
    }

    #[test]
    fn test_cartridge_from_bytes() {
        let rom = make_rom(0x200);
        let cart = Cartridge::from_bytes(rom).unwrap();
        assert_eq!(cart.size(), 0x200);
        assert!(Cartridge::is_rom(cart.rom()));
    }

    #[test]
    fn test_open_bus_reads_echo_address() {
        let cart = Cartridge::from_bytes(make_rom(HEADER_SIZE)).unwrap();
        // Past the end of the ROM the bus sees (offset / 2) & 0xFFFF.
        assert_eq!(cart.read16(0x2468), 0x1234);
        assert_eq!(cart.read16(0x246A), 0x1235);
    }

    #[test]
    fn test_bios_size_check() {
        assert!(check_bios(&vec![0u8; BIOS_SIZE]).is_ok());
        assert!(matches!(
            check_bios(&[0u8; 16]),
            Err(CartridgeError::BadBiosSize { size: 16 })
        ));
    }
}
