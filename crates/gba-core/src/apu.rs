//! Audio unit: Direct Sound FIFOs and the output sample clock
//!
//! The GBA mixes four legacy PSG channels with two 8-bit Direct Sound
//! channels fed through a pair of 32-byte FIFOs. This core implements the
//! Direct Sound path and the output clock; the PSG channels are
//! register-visible latches that stay silent. Output runs at 32768 Hz, one
//! stereo pair every 512 CPU cycles, pushed through the host sink.
//!
//! Hardware drains the FIFOs by timer-triggered DMA; with timers and DMA out
//! of scope this core drains one byte per output sample and holds the last
//! byte when a FIFO runs dry.

use crate::host::{Host, LogLevel};

/// Output sample rate in Hz
pub const SAMPLE_RATE: u32 = 32768;
/// CPU cycles between output sample pairs (16.78 MHz / 32768 Hz)
pub const CYCLES_PER_SAMPLE: u32 = 512;
/// Direct Sound FIFO depth in bytes
pub const FIFO_CAPACITY: usize = 32;

/// Number of 16-bit sound registers (I/O offsets 0x060-0x0A6).
pub const SOUND_REGISTER_COUNT: usize = 0x24;

/// I/O offset of the first sound register.
const SOUND_BASE: u32 = 0x060;
const OFF_SOUNDCNT_L: u32 = 0x080;
const OFF_SOUNDCNT_H: u32 = 0x082;
const OFF_SOUNDCNT_X: u32 = 0x084;
const OFF_FIFO_A_LO: u32 = 0x0A0;
const OFF_FIFO_A_HI: u32 = 0x0A2;
const OFF_FIFO_B_LO: u32 = 0x0A4;
const OFF_FIFO_B_HI: u32 = 0x0A6;

/// SOUNDCNT_H bits that reset a FIFO when written as 1; they read back 0.
const FIFO_RESET_A: u16 = 1 << 11;
const FIFO_RESET_B: u16 = 1 << 15;

/// SOUNDCNT_X master enable bit.
const MASTER_ENABLE: u16 = 1 << 7;

/// One Direct Sound FIFO: a 32-byte ring of signed 8-bit samples.
#[derive(Debug, Clone)]
pub struct Fifo {
    data: [u8; FIFO_CAPACITY],
    read: usize,
    len: usize,
}

impl Fifo {
    fn new() -> Self {
        Self {
            data: [0; FIFO_CAPACITY],
            read: 0,
            len: 0,
        }
    }

    fn clear(&mut self) {
        self.read = 0;
        self.len = 0;
    }

    /// Appends one byte. An overflowing write resets the FIFO first, the
    /// same recovery the hardware applies.
    fn push(&mut self, byte: u8) {
        if self.len == FIFO_CAPACITY {
            self.clear();
        }
        self.data[(self.read + self.len) % FIFO_CAPACITY] = byte;
        self.len += 1;
    }

    fn push16(&mut self, value: u16) {
        let bytes = value.to_le_bytes();
        self.push(bytes[0]);
        self.push(bytes[1]);
    }

    fn pop(&mut self) -> Option<i8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.data[self.read];
        self.read = (self.read + 1) % FIFO_CAPACITY;
        self.len -= 1;
        Some(byte as i8)
    }

    /// Number of queued bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copies the queued bytes out in playback order.
    fn drain_order(&self) -> [u8; FIFO_CAPACITY] {
        let mut out = [0u8; FIFO_CAPACITY];
        for i in 0..self.len {
            out[i] = self.data[(self.read + i) % FIFO_CAPACITY];
        }
        out
    }

    fn restore(&mut self, data: &[u8; FIFO_CAPACITY], len: usize) {
        self.data = *data;
        self.read = 0;
        self.len = len.min(FIFO_CAPACITY);
    }
}

/// Flattened audio state for the save-state codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioState {
    pub registers: [u16; SOUND_REGISTER_COUNT],
    pub fifo_a: [u8; FIFO_CAPACITY],
    pub fifo_a_len: u32,
    pub fifo_b: [u8; FIFO_CAPACITY],
    pub fifo_b_len: u32,
    pub sample_cycles: u32,
    pub latch_a: i8,
    pub latch_b: i8,
}

/// Audio unit state.
#[derive(Debug, Clone)]
pub struct Apu {
    /// Raw 16-bit register latches for the whole sound block
    registers: [u16; SOUND_REGISTER_COUNT],
    /// Direct Sound channel A FIFO
    fifo_a: Fifo,
    /// Direct Sound channel B FIFO
    fifo_b: Fifo,
    /// Cycles accumulated toward the next output sample
    sample_cycles: u32,
    /// Last byte taken from FIFO A; held while the FIFO is dry
    latch_a: i8,
    /// Last byte taken from FIFO B
    latch_b: i8,
}

impl Apu {
    /// Creates a silent audio unit.
    pub fn new() -> Self {
        Self {
            registers: [0; SOUND_REGISTER_COUNT],
            fifo_a: Fifo::new(),
            fifo_b: Fifo::new(),
            sample_cycles: 0,
            latch_a: 0,
            latch_b: 0,
        }
    }

    /// Resets all registers, FIFOs and the sample clock.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Advances the sample clock, emitting one stereo pair through the sink
    /// for every 512 cycles that have elapsed. The cadence holds even while
    /// sound is disabled so hosts see a constant sample stream.
    pub fn tick(&mut self, cycles: u32, host: &mut dyn Host) {
        self.sample_cycles += cycles;
        while self.sample_cycles >= CYCLES_PER_SAMPLE {
            self.sample_cycles -= CYCLES_PER_SAMPLE;
            let (left, right) = self.mix();
            host.audio_sample(left, right);
        }
    }

    /// Whether the master enable bit is set.
    pub fn enabled(&self) -> bool {
        self.register_value(OFF_SOUNDCNT_X) & MASTER_ENABLE != 0
    }

    /// Queued byte counts of the two FIFOs.
    pub fn fifo_levels(&self) -> (usize, usize) {
        (self.fifo_a.len(), self.fifo_b.len())
    }

    fn mix(&mut self) -> (i16, i16) {
        if !self.enabled() {
            return (0, 0);
        }
        let control = self.register_value(OFF_SOUNDCNT_H);
        if let Some(byte) = self.fifo_a.pop() {
            self.latch_a = byte;
        }
        if let Some(byte) = self.fifo_b.pop() {
            self.latch_b = byte;
        }

        // Full volume scales an 8-bit sample into the 16-bit output range;
        // the half-volume bit drops one shift.
        let shift_a = if control & (1 << 2) != 0 { 7 } else { 6 };
        let shift_b = if control & (1 << 3) != 0 { 7 } else { 6 };
        let a = i16::from(self.latch_a) << shift_a;
        let b = i16::from(self.latch_b) << shift_b;

        let mut left = 0i16;
        let mut right = 0i16;
        if control & (1 << 9) != 0 {
            left = left.saturating_add(a);
        }
        if control & (1 << 8) != 0 {
            right = right.saturating_add(a);
        }
        if control & (1 << 13) != 0 {
            left = left.saturating_add(b);
        }
        if control & (1 << 12) != 0 {
            right = right.saturating_add(b);
        }
        (left, right)
    }

    /// Reads one sound register. FIFO ports are write-only and read as 0.
    pub fn read_register(&self, offset: u32) -> u16 {
        match offset {
            OFF_FIFO_A_LO | OFF_FIFO_A_HI | OFF_FIFO_B_LO | OFF_FIFO_B_HI => 0,
            OFF_SOUNDCNT_H => self.register_value(offset) & !(FIFO_RESET_A | FIFO_RESET_B),
            // PSG channel status bits read 0 while those channels are silent.
            OFF_SOUNDCNT_X => self.register_value(offset) & MASTER_ENABLE,
            _ => self.register_value(offset),
        }
    }

    /// Writes one sound register.
    pub fn write_register(&mut self, offset: u32, value: u16, host: &mut dyn Host) {
        match offset {
            OFF_FIFO_A_LO | OFF_FIFO_A_HI => self.fifo_a.push16(value),
            OFF_FIFO_B_LO | OFF_FIFO_B_HI => self.fifo_b.push16(value),
            OFF_SOUNDCNT_H => {
                if value & FIFO_RESET_A != 0 {
                    self.fifo_a.clear();
                }
                if value & FIFO_RESET_B != 0 {
                    self.fifo_b.clear();
                }
                self.set_register_value(offset, value & !(FIFO_RESET_A | FIFO_RESET_B));
            }
            OFF_SOUNDCNT_X => {
                let was_enabled = self.enabled();
                self.set_register_value(offset, value & MASTER_ENABLE);
                if was_enabled && !self.enabled() {
                    // Disabling the master bit silences and clears everything
                    // below it, PSG latches included.
                    self.fifo_a.clear();
                    self.fifo_b.clear();
                    self.latch_a = 0;
                    self.latch_b = 0;
                    for off in (SOUND_BASE..OFF_SOUNDCNT_X).step_by(2) {
                        self.set_register_value(off, 0);
                    }
                } else if !was_enabled && self.enabled() {
                    host.log(
                        LogLevel::Debug,
                        format_args!("Master sound enable"),
                    );
                }
            }
            _ => self.set_register_value(offset, value),
        }
    }

    /// Flattens the audio block for serialization.
    pub(crate) fn snapshot(&self) -> AudioState {
        AudioState {
            registers: self.registers,
            fifo_a: self.fifo_a.drain_order(),
            fifo_a_len: self.fifo_a.len() as u32,
            fifo_b: self.fifo_b.drain_order(),
            fifo_b_len: self.fifo_b.len() as u32,
            sample_cycles: self.sample_cycles,
            latch_a: self.latch_a,
            latch_b: self.latch_b,
        }
    }

    /// Restores a previously flattened audio block.
    pub(crate) fn restore(&mut self, state: &AudioState) {
        self.registers = state.registers;
        self.fifo_a.restore(&state.fifo_a, state.fifo_a_len as usize);
        self.fifo_b.restore(&state.fifo_b, state.fifo_b_len as usize);
        self.sample_cycles = state.sample_cycles;
        self.latch_a = state.latch_a;
        self.latch_b = state.latch_b;
    }

    fn register_index(offset: u32) -> usize {
        ((offset - SOUND_BASE) / 2) as usize
    }

    fn register_value(&self, offset: u32) -> u16 {
        self.registers[Self::register_index(offset)]
    }

    fn set_register_value(&mut self, offset: u32, value: u16) {
        self.registers[Self::register_index(offset)] = value;
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}
