//! Save-state codec - fixed-layout machine snapshots
//!
//! A state blob is a verbatim dump of everything the machine needs for
//! bit-exact resumption: the CPU register file, timing counters, the audio
//! block and every writable memory region. The layout is fixed at compile
//! time, so every blob this build produces is exactly [`STATE_SIZE`] bytes
//! and a buffer of any other length is rejected before a single byte of
//! machine state is touched.
//!
//! The rendered framebuffer is not captured; it is redrawn from VRAM on the
//! next frame after a restore.

use thiserror::Error;

use crate::apu::{AudioState, FIFO_CAPACITY, SOUND_REGISTER_COUNT};
use crate::bus::{SystemBus, EWRAM_SIZE, IO_SIZE, IWRAM_SIZE, OAM_SIZE, PALETTE_SIZE, VRAM_SIZE};
use crate::cpu::{Arm7, CpuState, CPU_STATE_WORDS};
use crate::host::{Host, LogLevel};
use crate::video::Video;

/// First four bytes of every state blob.
pub const STATE_MAGIC: u32 = u32::from_le_bytes(*b"GBAS");
/// Layout revision. Bumped whenever the blob layout changes.
pub const STATE_VERSION: u32 = 1;

/// Header bytes: magic, version, BIOS checksum.
const HEADER_BYTES: usize = 12;
/// CPU section: the register words plus the 64-bit cycle counter.
const CPU_BYTES: usize = CPU_STATE_WORDS * 4 + 8;
/// Video section: intra-line cycle counter and frame counter.
const VIDEO_BYTES: usize = 8;
/// Audio section: register latches, both FIFOs with their fill levels,
/// the sample clock phase, the two output latches and two pad bytes.
const AUDIO_BYTES: usize =
    SOUND_REGISTER_COUNT * 2 + (FIFO_CAPACITY + 4) * 2 + 4 + 4;

/// Exact length of a serialized state blob.
pub const STATE_SIZE: usize = HEADER_BYTES
    + CPU_BYTES
    + VIDEO_BYTES
    + AUDIO_BYTES
    + IO_SIZE
    + IWRAM_SIZE
    + EWRAM_SIZE
    + PALETTE_SIZE
    + VRAM_SIZE
    + OAM_SIZE;

/// Why a state buffer was rejected. Rejection never leaves the machine
/// partially restored; all checks run before any state is applied.
#[derive(Debug, Error)]
pub enum StateError {
    /// The buffer length differs from [`STATE_SIZE`].
    #[error("state buffer must be exactly {expected} bytes, got {found}")]
    SizeMismatch { expected: usize, found: usize },
    /// The blob does not start with the state magic.
    #[error("not a save state (magic {found:#010X})")]
    BadMagic { found: u32 },
    /// The blob was written with an incompatible layout revision.
    #[error("unsupported save state version {found}")]
    UnsupportedVersion { found: u32 },
}

/// Position-tracked writer over the caller's buffer. The layout is fixed,
/// so once the length gate has passed no write can overrun.
struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn put_u8(&mut self, value: u8) {
        self.put_bytes(&[value]);
    }

    fn put_u16(&mut self, value: u16) {
        self.put_bytes(&value.to_le_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.put_bytes(&value.to_le_bytes());
    }

    fn put_u64(&mut self, value: u64) {
        self.put_bytes(&value.to_le_bytes());
    }

    fn put_words(&mut self, words: &[u32]) {
        for word in words {
            self.put_u32(*word);
        }
    }

    fn put_half_words(&mut self, halves: &[u16]) {
        for half in halves {
            self.put_u16(*half);
        }
    }
}

/// Position-tracked reader over a gated blob.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take_u8(&mut self) -> u8 {
        let value = self.buf[self.pos];
        self.pos += 1;
        value
    }

    fn take_u16(&mut self) -> u16 {
        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + 2]);
        self.pos += 2;
        u16::from_le_bytes(bytes)
    }

    fn take_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        u32::from_le_bytes(bytes)
    }

    fn take_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        u64::from_le_bytes(bytes)
    }

    fn take_words<const N: usize>(&mut self) -> [u32; N] {
        let mut out = [0u32; N];
        for slot in &mut out {
            *slot = self.take_u32();
        }
        out
    }

    fn take_half_words<const N: usize>(&mut self) -> [u16; N] {
        let mut out = [0u16; N];
        for slot in &mut out {
            *slot = self.take_u16();
        }
        out
    }

    fn take_array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn take_into(&mut self, out: &mut [u8]) {
        out.copy_from_slice(&self.buf[self.pos..self.pos + out.len()]);
        self.pos += out.len();
    }

    fn skip(&mut self, count: usize) {
        self.pos += count;
    }
}

/// Serializes the whole machine into `buf`. The buffer must be exactly
/// [`STATE_SIZE`] bytes; nothing is written otherwise.
pub(crate) fn serialize(
    cpu: &Arm7,
    bus: &SystemBus,
    video: &Video,
    buf: &mut [u8],
) -> Result<(), StateError> {
    if buf.len() != STATE_SIZE {
        return Err(StateError::SizeMismatch {
            expected: STATE_SIZE,
            found: buf.len(),
        });
    }

    let mut w = Writer::new(buf);
    w.put_u32(STATE_MAGIC);
    w.put_u32(STATE_VERSION);
    w.put_u32(bus.bios_checksum());

    let cpu_state = cpu.snapshot();
    w.put_words(&cpu_state.gprs);
    w.put_u32(cpu_state.cpsr);
    w.put_u32(cpu_state.spsr);
    w.put_words(&cpu_state.bank_usr);
    w.put_words(&cpu_state.bank_fiq);
    w.put_words(&cpu_state.bank_irq);
    w.put_words(&cpu_state.bank_svc);
    w.put_words(&cpu_state.bank_abt);
    w.put_words(&cpu_state.bank_und);
    w.put_words(&cpu_state.banked_spsrs);
    w.put_u64(cpu_state.total_cycles);

    w.put_u32(video.line_cycles());
    w.put_u32(video.frame_counter());

    let audio = bus.apu().snapshot();
    w.put_half_words(&audio.registers);
    w.put_bytes(&audio.fifo_a);
    w.put_u32(audio.fifo_a_len);
    w.put_bytes(&audio.fifo_b);
    w.put_u32(audio.fifo_b_len);
    w.put_u32(audio.sample_cycles);
    w.put_u8(audio.latch_a as u8);
    w.put_u8(audio.latch_b as u8);
    w.put_u16(0);

    w.put_bytes(bus.io_raw());
    w.put_bytes(bus.iwram());
    w.put_bytes(bus.ewram());
    w.put_bytes(bus.palette_ram());
    w.put_bytes(bus.vram());
    w.put_bytes(bus.oam());

    Ok(())
}

/// Replaces the whole machine state with the contents of `buf`.
///
/// The length, magic and version gates all run before anything is applied,
/// so a rejected blob leaves the machine untouched. A BIOS checksum that
/// differs from the running one is reported as a warning through `host` but
/// does not block the restore.
pub(crate) fn deserialize(
    cpu: &mut Arm7,
    bus: &mut SystemBus,
    video: &mut Video,
    buf: &[u8],
    host: &mut dyn Host,
) -> Result<(), StateError> {
    if buf.len() != STATE_SIZE {
        return Err(StateError::SizeMismatch {
            expected: STATE_SIZE,
            found: buf.len(),
        });
    }

    let mut r = Reader::new(buf);
    let magic = r.take_u32();
    if magic != STATE_MAGIC {
        return Err(StateError::BadMagic { found: magic });
    }
    let version = r.take_u32();
    if version != STATE_VERSION {
        return Err(StateError::UnsupportedVersion { found: version });
    }
    let checksum = r.take_u32();
    if checksum != bus.bios_checksum() {
        host.log(
            LogLevel::Warn,
            format_args!("Save state was taken with a different BIOS"),
        );
    }

    // All gates have passed; everything below is infallible, so the state
    // applies as a whole.
    let cpu_state = CpuState {
        gprs: r.take_words(),
        cpsr: r.take_u32(),
        spsr: r.take_u32(),
        bank_usr: r.take_words(),
        bank_fiq: r.take_words(),
        bank_irq: r.take_words(),
        bank_svc: r.take_words(),
        bank_abt: r.take_words(),
        bank_und: r.take_words(),
        banked_spsrs: r.take_words(),
        total_cycles: r.take_u64(),
    };
    cpu.restore(&cpu_state);

    let line_cycles = r.take_u32();
    let frame_counter = r.take_u32();
    video.restore_timing(line_cycles, frame_counter);

    let audio = AudioState {
        registers: r.take_half_words(),
        fifo_a: r.take_array(),
        fifo_a_len: r.take_u32(),
        fifo_b: r.take_array(),
        fifo_b_len: r.take_u32(),
        sample_cycles: r.take_u32(),
        latch_a: r.take_u8() as i8,
        latch_b: r.take_u8() as i8,
    };
    r.skip(2);
    bus.apu_mut().restore(&audio);

    r.take_into(bus.io_raw_mut());
    r.take_into(bus.iwram_mut());
    r.take_into(bus.ewram_mut());
    r.take_into(bus.palette_mut());
    r.take_into(bus.vram_mut());
    r.take_into(bus.oam_mut());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;

    fn machine() -> (Arm7, SystemBus, Video) {
        let mut cpu = Arm7::new();
        cpu.reset();
        (cpu, SystemBus::new(), Video::new())
    }

    #[test]
    fn test_serialize_fills_exact_buffer() {
        let (cpu, bus, video) = machine();
        let mut blob = vec![0u8; STATE_SIZE];
        serialize(&cpu, &bus, &video, &mut blob).unwrap();
        assert_eq!(&blob[0..4], b"GBAS");
    }

    #[test]
    fn test_serialize_rejects_wrong_size() {
        let (cpu, bus, video) = machine();
        let mut blob = vec![0u8; STATE_SIZE - 1];
        let err = serialize(&cpu, &bus, &video, &mut blob).unwrap_err();
        assert!(matches!(
            err,
            StateError::SizeMismatch { expected, found }
                if expected == STATE_SIZE && found == STATE_SIZE - 1
        ));
    }

    #[test]
    fn test_deserialize_rejects_bad_magic() {
        let (mut cpu, mut bus, mut video) = machine();
        let mut blob = vec![0u8; STATE_SIZE];
        serialize(&cpu, &bus, &video, &mut blob).unwrap();
        blob[0] ^= 0xFF;
        let err = deserialize(&mut cpu, &mut bus, &mut video, &blob, &mut NullHost).unwrap_err();
        assert!(matches!(err, StateError::BadMagic { .. }));
    }

    #[test]
    fn test_deserialize_rejects_unknown_version() {
        let (mut cpu, mut bus, mut video) = machine();
        let mut blob = vec![0u8; STATE_SIZE];
        serialize(&cpu, &bus, &video, &mut blob).unwrap();
        blob[4..8].copy_from_slice(&(STATE_VERSION + 1).to_le_bytes());
        let err = deserialize(&mut cpu, &mut bus, &mut video, &blob, &mut NullHost).unwrap_err();
        assert!(matches!(
            err,
            StateError::UnsupportedVersion { found } if found == STATE_VERSION + 1
        ));
    }

    #[test]
    fn test_rejected_blob_leaves_state_untouched() {
        let (mut cpu, mut bus, mut video) = machine();
        let mut host = NullHost;
        bus.write8(0x0300_0000, 0xAB, &mut host);
        cpu.set_gpr(0, 0x1234_5678);

        let mut before = vec![0u8; STATE_SIZE];
        serialize(&cpu, &bus, &video, &mut before).unwrap();

        let short = vec![0u8; 16];
        assert!(deserialize(&mut cpu, &mut bus, &mut video, &short, &mut host).is_err());

        let mut after = vec![0u8; STATE_SIZE];
        serialize(&cpu, &bus, &video, &mut after).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_keycnt_survives_round_trip() {
        let (mut cpu, mut bus, mut video) = machine();
        let mut host = NullHost;
        bus.write16(0x0400_0132, 0xC003, &mut host);

        let mut blob = vec![0u8; STATE_SIZE];
        serialize(&cpu, &bus, &video, &mut blob).unwrap();

        bus.write16(0x0400_0132, 0x0000, &mut host);
        deserialize(&mut cpu, &mut bus, &mut video, &blob, &mut host).unwrap();
        assert_eq!(bus.read16(0x0400_0132, &mut host), 0xC003);
    }

    #[test]
    fn test_round_trip_is_bit_identical() {
        let (mut cpu, mut bus, mut video) = machine();
        let mut host = NullHost;
        cpu.set_gpr(3, 0xDEAD_BEEF);
        bus.write32(0x0200_0010, 0xCAFE_F00D, &mut host);
        bus.write16(0x0400_0000, 0x0403, &mut host);
        bus.write16(0x0500_0000, 0x7FFF, &mut host);

        let mut blob = vec![0u8; STATE_SIZE];
        serialize(&cpu, &bus, &video, &mut blob).unwrap();

        let mut other_cpu = Arm7::new();
        other_cpu.reset();
        let mut other_bus = SystemBus::new();
        let mut other_video = Video::new();
        deserialize(&mut other_cpu, &mut other_bus, &mut other_video, &blob, &mut host).unwrap();

        let mut second = vec![0u8; STATE_SIZE];
        serialize(&other_cpu, &other_bus, &other_video, &mut second).unwrap();
        assert_eq!(blob, second);
    }
}
