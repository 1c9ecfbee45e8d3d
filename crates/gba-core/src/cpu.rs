//! CPU module - ARM7TDMI implementation
//!
//! The GBA's main processor is an ARM7TDMI clocked at 16.78 MHz. This core
//! interprets the 32-bit ARM instruction set; the 16-bit Thumb set, long
//! multiplies, SWP and the coprocessor interface are reported through the
//! diagnostic sink and skipped. Interrupts are never vectored: the bus
//! latches pending sources in IF, but the core does not enter the IRQ
//! exception. Cycle costs are approximate: memory waitstates and the
//! prefetch buffer are not modeled.

use std::fmt;

use crate::bus::SystemBus;
use crate::host::{Host, LogLevel};

/// Core clock in Hz (2^24)
pub const CLOCK_HZ: u32 = 16_777_216;

/// Stack pointer register index
pub const SP: usize = 13;
/// Link register index
pub const LR: usize = 14;
/// Program counter register index
pub const PC: usize = 15;

/// Entry point used when booting without a BIOS image
pub const ROM_ENTRY: u32 = 0x0800_0000;
/// Initial System/User stack pointer
pub const SP_BASE_SYSTEM: u32 = 0x0300_7F00;
/// Initial IRQ-mode stack pointer
pub const SP_BASE_IRQ: u32 = 0x0300_7FA0;
/// Initial Supervisor-mode stack pointer
pub const SP_BASE_SVC: u32 = 0x0300_7FE0;

/// Processor mode encoded in the low five PSR bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    User = 0x10,
    Fiq = 0x11,
    Irq = 0x12,
    Supervisor = 0x13,
    Abort = 0x17,
    Undefined = 0x1B,
    System = 0x1F,
}

impl Mode {
    /// Decodes the PSR mode field. Returns `None` for reserved encodings.
    pub fn from_bits(bits: u32) -> Option<Mode> {
        match bits & Psr::MODE_MASK {
            0x10 => Some(Mode::User),
            0x11 => Some(Mode::Fiq),
            0x12 => Some(Mode::Irq),
            0x13 => Some(Mode::Supervisor),
            0x17 => Some(Mode::Abort),
            0x1B => Some(Mode::Undefined),
            0x1F => Some(Mode::System),
            _ => None,
        }
    }

    /// Whether this mode has a saved program status register.
    pub fn has_spsr(self) -> bool {
        !matches!(self, Mode::User | Mode::System)
    }
}

/// Program status register (CPSR/SPSR).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Psr(u32);

impl Psr {
    pub const NEGATIVE: u32 = 1 << 31;
    pub const ZERO: u32 = 1 << 30;
    pub const CARRY: u32 = 1 << 29;
    pub const OVERFLOW: u32 = 1 << 28;
    pub const IRQ_DISABLE: u32 = 1 << 7;
    pub const FIQ_DISABLE: u32 = 1 << 6;
    pub const THUMB: u32 = 1 << 5;
    pub const MODE_MASK: u32 = 0x1F;

    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn negative(&self) -> bool {
        (self.0 & Self::NEGATIVE) != 0
    }

    pub fn zero(&self) -> bool {
        (self.0 & Self::ZERO) != 0
    }

    pub fn carry(&self) -> bool {
        (self.0 & Self::CARRY) != 0
    }

    pub fn overflow(&self) -> bool {
        (self.0 & Self::OVERFLOW) != 0
    }

    pub fn irq_disabled(&self) -> bool {
        (self.0 & Self::IRQ_DISABLE) != 0
    }

    pub fn thumb(&self) -> bool {
        (self.0 & Self::THUMB) != 0
    }

    pub fn mode_bits(&self) -> u32 {
        self.0 & Self::MODE_MASK
    }

    pub fn set_negative(&mut self, val: bool) {
        self.set(Self::NEGATIVE, val);
    }

    pub fn set_zero(&mut self, val: bool) {
        self.set(Self::ZERO, val);
    }

    pub fn set_carry(&mut self, val: bool) {
        self.set(Self::CARRY, val);
    }

    pub fn set_overflow(&mut self, val: bool) {
        self.set(Self::OVERFLOW, val);
    }

    fn set(&mut self, mask: u32, val: bool) {
        self.0 = if val { self.0 | mask } else { self.0 & !mask };
    }

    fn set_mode_bits(&mut self, bits: u32) {
        self.0 = (self.0 & !Self::MODE_MASK) | (bits & Self::MODE_MASK);
    }
}

impl fmt::Display for Psr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N:{} Z:{} C:{} V:{} I:{} T:{} mode:0x{:02X}",
            self.negative() as u8,
            self.zero() as u8,
            self.carry() as u8,
            self.overflow() as u8,
            self.irq_disabled() as u8,
            self.thumb() as u8,
            self.mode_bits()
        )
    }
}

/// Inactive register banks. The active mode's window lives in `gprs`;
/// everything else waits here until a mode switch swaps it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankedRegisters {
    /// User/System r8-r14
    pub usr: [u32; 7],
    /// FIQ r8-r14
    pub fiq: [u32; 7],
    /// IRQ r13-r14
    pub irq: [u32; 2],
    /// Supervisor r13-r14
    pub svc: [u32; 2],
    /// Abort r13-r14
    pub abt: [u32; 2],
    /// Undefined r13-r14
    pub und: [u32; 2],
    /// SPSR for FIQ, IRQ, Supervisor, Abort, Undefined, in that order
    pub spsrs: [u32; 5],
}

impl BankedRegisters {
    fn new() -> Self {
        Self {
            usr: [0; 7],
            fiq: [0; 7],
            irq: [0; 2],
            svc: [0; 2],
            abt: [0; 2],
            und: [0; 2],
            spsrs: [0; 5],
        }
    }
}

/// Flattened register file used by the save-state codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuState {
    pub gprs: [u32; 16],
    pub cpsr: u32,
    pub spsr: u32,
    pub bank_usr: [u32; 7],
    pub bank_fiq: [u32; 7],
    pub bank_irq: [u32; 2],
    pub bank_svc: [u32; 2],
    pub bank_abt: [u32; 2],
    pub bank_und: [u32; 2],
    pub banked_spsrs: [u32; 5],
    pub total_cycles: u64,
}

/// Number of 32-bit register words in [`CpuState`], excluding the cycle counter.
pub const CPU_STATE_WORDS: usize = 16 + 2 + 7 + 7 + 2 + 2 + 2 + 2 + 5;

/// Data-processing ALU operation, bits 24-21 of the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AluOp {
    And,
    Eor,
    Sub,
    Rsb,
    Add,
    Adc,
    Sbc,
    Rsc,
    Tst,
    Teq,
    Cmp,
    Cmn,
    Orr,
    Mov,
    Bic,
    Mvn,
}

impl AluOp {
    fn from_bits(bits: u32) -> AluOp {
        match bits & 0xF {
            0x0 => AluOp::And,
            0x1 => AluOp::Eor,
            0x2 => AluOp::Sub,
            0x3 => AluOp::Rsb,
            0x4 => AluOp::Add,
            0x5 => AluOp::Adc,
            0x6 => AluOp::Sbc,
            0x7 => AluOp::Rsc,
            0x8 => AluOp::Tst,
            0x9 => AluOp::Teq,
            0xA => AluOp::Cmp,
            0xB => AluOp::Cmn,
            0xC => AluOp::Orr,
            0xD => AluOp::Mov,
            0xE => AluOp::Bic,
            _ => AluOp::Mvn,
        }
    }

    /// Test operations write flags only, never a destination register.
    fn is_test(self) -> bool {
        matches!(self, AluOp::Tst | AluOp::Teq | AluOp::Cmp | AluOp::Cmn)
    }
}

/// ARM7TDMI CPU state.
#[derive(Debug, Clone)]
pub struct Arm7 {
    /// Active register window; index 15 is the program counter
    gprs: [u32; 16],
    /// Current program status register
    cpsr: Psr,
    /// Saved program status register of the active mode
    spsr: Psr,
    /// Inactive banks
    banked: BankedRegisters,
    /// Total cycles executed since reset
    total_cycles: u64,
}

impl Arm7 {
    /// Creates a CPU in the powered-down state. Call [`Arm7::reset`] before
    /// stepping.
    pub fn new() -> Self {
        Self {
            gprs: [0; 16],
            cpsr: Psr::new(Mode::System as u32),
            spsr: Psr::new(0),
            banked: BankedRegisters::new(),
            total_cycles: 0,
        }
    }

    /// Resets to the BIOS-less boot state: System mode, stacks placed where
    /// the BIOS would put them, PC at the cartridge entry point.
    pub fn reset(&mut self) {
        self.gprs = [0; 16];
        self.cpsr = Psr::new(Mode::System as u32 | Psr::IRQ_DISABLE | Psr::FIQ_DISABLE);
        self.spsr = Psr::new(0);
        self.banked = BankedRegisters::new();
        self.total_cycles = 0;

        self.gprs[SP] = SP_BASE_SYSTEM;
        self.banked.irq[0] = SP_BASE_IRQ;
        self.banked.svc[0] = SP_BASE_SVC;
        self.gprs[PC] = ROM_ENTRY;
    }

    /// Active register window.
    pub fn gprs(&self) -> &[u32; 16] {
        &self.gprs
    }

    /// One register from the active window.
    pub fn gpr(&self, index: usize) -> u32 {
        self.gprs[index]
    }

    /// Overwrites one register in the active window.
    pub fn set_gpr(&mut self, index: usize, value: u32) {
        self.gprs[index] = value;
    }

    /// Program counter (address of the next fetch).
    pub fn pc(&self) -> u32 {
        self.gprs[PC]
    }

    /// Current program status register.
    pub fn cpsr(&self) -> Psr {
        self.cpsr
    }

    /// Total cycles executed since reset.
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Flattens the full register file for serialization.
    pub fn snapshot(&self) -> CpuState {
        CpuState {
            gprs: self.gprs,
            cpsr: self.cpsr.bits(),
            spsr: self.spsr.bits(),
            bank_usr: self.banked.usr,
            bank_fiq: self.banked.fiq,
            bank_irq: self.banked.irq,
            bank_svc: self.banked.svc,
            bank_abt: self.banked.abt,
            bank_und: self.banked.und,
            banked_spsrs: self.banked.spsrs,
            total_cycles: self.total_cycles,
        }
    }

    /// Restores a previously flattened register file.
    pub fn restore(&mut self, state: &CpuState) {
        self.gprs = state.gprs;
        self.cpsr = Psr::new(state.cpsr);
        self.spsr = Psr::new(state.spsr);
        self.banked.usr = state.bank_usr;
        self.banked.fiq = state.bank_fiq;
        self.banked.irq = state.bank_irq;
        self.banked.svc = state.bank_svc;
        self.banked.abt = state.bank_abt;
        self.banked.und = state.bank_und;
        self.banked.spsrs = state.banked_spsrs;
        self.total_cycles = state.total_cycles;
    }

    /// Executes one instruction and returns its approximate cycle cost.
    pub fn step(&mut self, bus: &mut SystemBus, host: &mut dyn Host) -> u32 {
        let fetch_pc = self.gprs[PC] & !3;
        let instruction = bus.read32(fetch_pc, host);
        self.gprs[PC] = fetch_pc.wrapping_add(4);

        let cycles = if self.condition_passed(instruction >> 28) {
            self.execute(instruction, bus, host)
        } else {
            1
        };
        self.total_cycles += u64::from(cycles);
        cycles
    }

    /// Evaluates a condition field against the current flags.
    fn condition_passed(&self, cond: u32) -> bool {
        let p = &self.cpsr;
        match cond & 0xF {
            0x0 => p.zero(),
            0x1 => !p.zero(),
            0x2 => p.carry(),
            0x3 => !p.carry(),
            0x4 => p.negative(),
            0x5 => !p.negative(),
            0x6 => p.overflow(),
            0x7 => !p.overflow(),
            0x8 => p.carry() && !p.zero(),
            0x9 => !p.carry() || p.zero(),
            0xA => p.negative() == p.overflow(),
            0xB => p.negative() != p.overflow(),
            0xC => !p.zero() && (p.negative() == p.overflow()),
            0xD => p.zero() || (p.negative() != p.overflow()),
            0xE => true,
            // 0xF is reserved on ARMv4.
            _ => false,
        }
    }

    fn execute(&mut self, i: u32, bus: &mut SystemBus, host: &mut dyn Host) -> u32 {
        match (i >> 25) & 0x7 {
            0b000 => self.execute_misc_or_alu(i, bus, host),
            0b001 => self.execute_alu_immediate(i, host),
            0b010 | 0b011 => self.execute_single_transfer(i, bus, host),
            0b100 => self.execute_block_transfer(i, bus, host),
            0b101 => self.execute_branch(i),
            0b110 => {
                host.log(
                    LogLevel::Stub,
                    format_args!("Unimplemented instruction: coprocessor transfer (0x{:08X})", i),
                );
                1
            }
            _ => {
                if i & 0x0100_0000 != 0 {
                    self.execute_swi(i, host)
                } else {
                    host.log(
                        LogLevel::Stub,
                        format_args!("Unimplemented instruction: coprocessor op (0x{:08X})", i),
                    );
                    1
                }
            }
        }
    }

    /// Decodes the crowded 000 space: BX, multiplies, SWP, halfword
    /// transfers, PSR transfers, and register-operand ALU operations.
    fn execute_misc_or_alu(&mut self, i: u32, bus: &mut SystemBus, host: &mut dyn Host) -> u32 {
        if i & 0x0FFF_FFF0 == 0x012F_FF10 {
            return self.execute_bx(i, host);
        }
        if i & 0x0FC0_00F0 == 0x0000_0090 {
            return self.execute_multiply(i);
        }
        if i & 0x0F80_00F0 == 0x0080_0090 {
            host.log(
                LogLevel::Stub,
                format_args!("Unimplemented instruction: long multiply (0x{:08X})", i),
            );
            return 1;
        }
        if i & 0x0FB0_0FF0 == 0x0100_0090 {
            host.log(
                LogLevel::Stub,
                format_args!("Unimplemented instruction: SWP (0x{:08X})", i),
            );
            return 1;
        }
        if i & 0x0000_0090 == 0x0000_0090 && (i >> 5) & 0x3 != 0 {
            return self.execute_halfword_transfer(i, bus, host);
        }
        // TST/TEQ/CMP/CMN encodings with S clear are the PSR transfers.
        if i & 0x0190_0000 == 0x0100_0000 {
            return self.execute_psr_transfer(i, None, host);
        }

        let (operand2, shifter_carry, reg_shift) = self.shifted_register_operand(i);
        let pc_offset = if reg_shift { 8 } else { 4 };
        let cost = if reg_shift { 2 } else { 1 };
        cost + self.execute_alu(i, operand2, shifter_carry, pc_offset, host)
    }

    fn execute_alu_immediate(&mut self, i: u32, host: &mut dyn Host) -> u32 {
        // MSR with an immediate operand shares this space.
        if i & 0x0190_0000 == 0x0100_0000 {
            let rotate = (i >> 8) & 0xF;
            let imm = (i & 0xFF).rotate_right(rotate * 2);
            return self.execute_psr_transfer(i, Some(imm), host);
        }

        let rotate = (i >> 8) & 0xF;
        let operand2 = (i & 0xFF).rotate_right(rotate * 2);
        let shifter_carry = if rotate != 0 {
            operand2 & 0x8000_0000 != 0
        } else {
            self.cpsr.carry()
        };
        1 + self.execute_alu(i, operand2, shifter_carry, 4, host)
    }

    /// Shared ALU body. `pc_offset` is added to r15 operand reads on top of
    /// the already-advanced program counter.
    fn execute_alu(
        &mut self,
        i: u32,
        operand2: u32,
        shifter_carry: bool,
        pc_offset: u32,
        host: &mut dyn Host,
    ) -> u32 {
        let op = AluOp::from_bits(i >> 21);
        let set_flags = i & 0x0010_0000 != 0;
        let rn_index = ((i >> 16) & 0xF) as usize;
        let rd_index = ((i >> 12) & 0xF) as usize;
        let rn = self.read_operand(rn_index, pc_offset);
        let carry_in = u32::from(self.cpsr.carry());

        let mut wrote_pc = false;
        let result = match op {
            AluOp::And => self.logical_result(rn & operand2, shifter_carry, set_flags),
            AluOp::Eor => self.logical_result(rn ^ operand2, shifter_carry, set_flags),
            AluOp::Sub => self.add_result(rn, !operand2, 1, set_flags),
            AluOp::Rsb => self.add_result(operand2, !rn, 1, set_flags),
            AluOp::Add => self.add_result(rn, operand2, 0, set_flags),
            AluOp::Adc => self.add_result(rn, operand2, carry_in, set_flags),
            AluOp::Sbc => self.add_result(rn, !operand2, carry_in, set_flags),
            AluOp::Rsc => self.add_result(operand2, !rn, carry_in, set_flags),
            AluOp::Tst => self.logical_result(rn & operand2, shifter_carry, true),
            AluOp::Teq => self.logical_result(rn ^ operand2, shifter_carry, true),
            AluOp::Cmp => self.add_result(rn, !operand2, 1, true),
            AluOp::Cmn => self.add_result(rn, operand2, 0, true),
            AluOp::Orr => self.logical_result(rn | operand2, shifter_carry, set_flags),
            AluOp::Mov => self.logical_result(operand2, shifter_carry, set_flags),
            AluOp::Bic => self.logical_result(rn & !operand2, shifter_carry, set_flags),
            AluOp::Mvn => self.logical_result(!operand2, shifter_carry, set_flags),
        };

        if !op.is_test() {
            if rd_index == PC {
                self.gprs[PC] = result & !3;
                wrote_pc = true;
                if set_flags {
                    // Exception return: CPSR comes back from the SPSR.
                    self.write_cpsr(self.spsr.bits(), true, host);
                }
            } else {
                self.gprs[rd_index] = result;
            }
        }

        if wrote_pc {
            2
        } else {
            0
        }
    }

    fn logical_result(&mut self, result: u32, shifter_carry: bool, set_flags: bool) -> u32 {
        if set_flags {
            self.cpsr.set_negative(result & 0x8000_0000 != 0);
            self.cpsr.set_zero(result == 0);
            self.cpsr.set_carry(shifter_carry);
        }
        result
    }

    fn add_result(&mut self, a: u32, b: u32, carry_in: u32, set_flags: bool) -> u32 {
        let wide = u64::from(a) + u64::from(b) + u64::from(carry_in);
        let result = wide as u32;
        if set_flags {
            self.cpsr.set_negative(result & 0x8000_0000 != 0);
            self.cpsr.set_zero(result == 0);
            self.cpsr.set_carry(wide > u64::from(u32::MAX));
            self.cpsr.set_overflow((!(a ^ b) & (a ^ result)) & 0x8000_0000 != 0);
        }
        result
    }

    /// Resolves a register-form operand 2 and its shifter carry-out.
    /// Returns `(value, carry, shift_amount_from_register)`.
    fn shifted_register_operand(&self, i: u32) -> (u32, bool, bool) {
        let reg_shift = i & 0x10 != 0;
        let pc_offset = if reg_shift { 8 } else { 4 };
        let rm = self.read_operand((i & 0xF) as usize, pc_offset);
        let shift_type = (i >> 5) & 0x3;
        let old_carry = self.cpsr.carry();

        let amount = if reg_shift {
            self.read_operand(((i >> 8) & 0xF) as usize, pc_offset) & 0xFF
        } else {
            (i >> 7) & 0x1F
        };

        // Immediate shift amount 0 encodes LSL #0, LSR #32, ASR #32 and RRX.
        if !reg_shift && amount == 0 {
            return match shift_type {
                0b00 => (rm, old_carry, false),
                0b01 => (0, rm & 0x8000_0000 != 0, false),
                0b10 => {
                    let fill = if rm & 0x8000_0000 != 0 { u32::MAX } else { 0 };
                    (fill, rm & 0x8000_0000 != 0, false)
                }
                _ => {
                    let value = (u32::from(old_carry) << 31) | (rm >> 1);
                    (value, rm & 1 != 0, false)
                }
            };
        }
        if reg_shift && amount == 0 {
            return (rm, old_carry, true);
        }

        let (value, carry) = match shift_type {
            0b00 => match amount {
                1..=31 => (rm << amount, rm & (1 << (32 - amount)) != 0),
                32 => (0, rm & 1 != 0),
                _ => (0, false),
            },
            0b01 => match amount {
                1..=31 => (rm >> amount, rm & (1 << (amount - 1)) != 0),
                32 => (0, rm & 0x8000_0000 != 0),
                _ => (0, false),
            },
            0b10 => {
                if amount < 32 {
                    (
                        ((rm as i32) >> amount) as u32,
                        rm & (1 << (amount - 1)) != 0,
                    )
                } else {
                    let fill = if rm & 0x8000_0000 != 0 { u32::MAX } else { 0 };
                    (fill, rm & 0x8000_0000 != 0)
                }
            }
            _ => {
                let rot = amount & 0x1F;
                if rot == 0 {
                    (rm, rm & 0x8000_0000 != 0)
                } else {
                    (rm.rotate_right(rot), rm & (1 << (rot - 1)) != 0)
                }
            }
        };
        (value, carry, reg_shift)
    }

    fn execute_bx(&mut self, i: u32, host: &mut dyn Host) -> u32 {
        let target = self.read_operand((i & 0xF) as usize, 4);
        if target & 1 != 0 {
            host.log(
                LogLevel::Stub,
                format_args!("Thumb execution state is not implemented (BX to 0x{:08X})", target),
            );
            return 3;
        }
        self.gprs[PC] = target & !3;
        3
    }

    fn execute_multiply(&mut self, i: u32) -> u32 {
        let accumulate = i & 0x0020_0000 != 0;
        let set_flags = i & 0x0010_0000 != 0;
        let rd_index = ((i >> 16) & 0xF) as usize;
        let rn = self.read_operand(((i >> 12) & 0xF) as usize, 4);
        let rs = self.read_operand(((i >> 8) & 0xF) as usize, 4);
        let rm = self.read_operand((i & 0xF) as usize, 4);

        let mut result = rm.wrapping_mul(rs);
        if accumulate {
            result = result.wrapping_add(rn);
        }
        if rd_index != PC {
            self.gprs[rd_index] = result;
        }
        if set_flags {
            self.cpsr.set_negative(result & 0x8000_0000 != 0);
            self.cpsr.set_zero(result == 0);
        }

        // Early-out multiplier: cost depends on significant bytes of Rs.
        let significant = match rs {
            0x0000_0000..=0x0000_00FF => 1,
            0x0000_0100..=0x0000_FFFF => 2,
            0x0001_0000..=0x00FF_FFFF => 3,
            _ => 4,
        };
        1 + significant + u32::from(accumulate)
    }

    fn execute_psr_transfer(&mut self, i: u32, imm: Option<u32>, host: &mut dyn Host) -> u32 {
        let use_spsr = i & 0x0040_0000 != 0;
        if i & 0x0020_0000 == 0 {
            // MRS
            let rd_index = ((i >> 12) & 0xF) as usize;
            let value = if use_spsr { self.spsr.bits() } else { self.cpsr.bits() };
            if rd_index != PC {
                self.gprs[rd_index] = value;
            }
            return 1;
        }

        // MSR with a field mask.
        let operand = match imm {
            Some(value) => value,
            None => self.read_operand((i & 0xF) as usize, 4),
        };
        let mut mask = 0u32;
        if i & 0x0001_0000 != 0 {
            mask |= 0x0000_00FF;
        }
        if i & 0x0002_0000 != 0 {
            mask |= 0x0000_FF00;
        }
        if i & 0x0004_0000 != 0 {
            mask |= 0x00FF_0000;
        }
        if i & 0x0008_0000 != 0 {
            mask |= 0xFF00_0000;
        }

        if use_spsr {
            if self.current_mode().has_spsr() {
                self.spsr = Psr::new((self.spsr.bits() & !mask) | (operand & mask));
            }
            return 1;
        }

        if self.current_mode() == Mode::User {
            // User mode may only touch the flags byte.
            mask &= 0xFF00_0000;
        }
        let value = (self.cpsr.bits() & !mask) | (operand & mask);
        self.write_cpsr(value, mask & Psr::MODE_MASK != 0, host);
        1
    }

    /// Applies a full CPSR value, switching register banks if the mode field
    /// changed. Reserved mode encodings leave the mode untouched.
    fn write_cpsr(&mut self, value: u32, allow_mode_change: bool, host: &mut dyn Host) {
        let mut value = value;
        if value & Psr::THUMB != 0 {
            host.log(
                LogLevel::Stub,
                format_args!("Thumb execution state is not implemented (CPSR write)"),
            );
            value &= !Psr::THUMB;
        }

        if allow_mode_change {
            match Mode::from_bits(value) {
                Some(new_mode) => self.switch_mode(new_mode),
                None => {
                    host.log(
                        LogLevel::GameError,
                        format_args!("Invalid mode bits in CPSR write: 0x{:02X}", value & Psr::MODE_MASK),
                    );
                    value = (value & !Psr::MODE_MASK) | self.cpsr.mode_bits();
                }
            }
        } else {
            value = (value & !Psr::MODE_MASK) | self.cpsr.mode_bits();
        }
        self.cpsr = Psr::new(value);
    }

    fn current_mode(&self) -> Mode {
        // The mode field is kept valid by every write path.
        Mode::from_bits(self.cpsr.bits()).unwrap_or(Mode::System)
    }

    /// Swaps the active register window when the processor changes mode.
    fn switch_mode(&mut self, new_mode: Mode) {
        let old_mode = self.current_mode();
        if old_mode == new_mode {
            return;
        }

        // Spill the active window into the old mode's bank.
        if old_mode == Mode::Fiq {
            self.banked.fiq.copy_from_slice(&self.gprs[8..15]);
        } else {
            self.banked.usr[0..5].copy_from_slice(&self.gprs[8..13]);
            let pair = [self.gprs[SP], self.gprs[LR]];
            match old_mode {
                Mode::User | Mode::System => {
                    self.banked.usr[5] = pair[0];
                    self.banked.usr[6] = pair[1];
                }
                Mode::Irq => self.banked.irq = pair,
                Mode::Supervisor => self.banked.svc = pair,
                Mode::Abort => self.banked.abt = pair,
                Mode::Undefined => self.banked.und = pair,
                Mode::Fiq => unreachable!(),
            }
        }
        if let Some(slot) = Self::spsr_slot(old_mode) {
            self.banked.spsrs[slot] = self.spsr.bits();
        }

        // Fill the window from the new mode's bank.
        if new_mode == Mode::Fiq {
            self.gprs[8..15].copy_from_slice(&self.banked.fiq);
        } else {
            self.gprs[8..13].copy_from_slice(&self.banked.usr[0..5]);
            let pair = match new_mode {
                Mode::User | Mode::System => [self.banked.usr[5], self.banked.usr[6]],
                Mode::Irq => self.banked.irq,
                Mode::Supervisor => self.banked.svc,
                Mode::Abort => self.banked.abt,
                Mode::Undefined => self.banked.und,
                Mode::Fiq => unreachable!(),
            };
            self.gprs[SP] = pair[0];
            self.gprs[LR] = pair[1];
        }
        if let Some(slot) = Self::spsr_slot(new_mode) {
            self.spsr = Psr::new(self.banked.spsrs[slot]);
        }
        self.cpsr.set_mode_bits(new_mode as u32);
    }

    fn spsr_slot(mode: Mode) -> Option<usize> {
        match mode {
            Mode::Fiq => Some(0),
            Mode::Irq => Some(1),
            Mode::Supervisor => Some(2),
            Mode::Abort => Some(3),
            Mode::Undefined => Some(4),
            Mode::User | Mode::System => None,
        }
    }

    fn execute_single_transfer(&mut self, i: u32, bus: &mut SystemBus, host: &mut dyn Host) -> u32 {
        if i & 0x0200_0010 == 0x0200_0010 {
            host.log(
                LogLevel::GameError,
                format_args!("Undefined instruction: 0x{:08X}", i),
            );
            return 1;
        }

        let offset = if i & 0x0200_0000 != 0 {
            let (value, _, _) = self.shifted_register_operand(i & !0x10);
            value
        } else {
            i & 0xFFF
        };

        let pre_index = i & 0x0100_0000 != 0;
        let add = i & 0x0080_0000 != 0;
        let byte = i & 0x0040_0000 != 0;
        let writeback = i & 0x0020_0000 != 0;
        let load = i & 0x0010_0000 != 0;
        let rn_index = ((i >> 16) & 0xF) as usize;
        let rd_index = ((i >> 12) & 0xF) as usize;

        let base = self.read_operand(rn_index, 4);
        let offset_base = if add {
            base.wrapping_add(offset)
        } else {
            base.wrapping_sub(offset)
        };
        let address = if pre_index { offset_base } else { base };

        // Post-indexed transfers always write the base back.
        if (!pre_index || writeback) && rn_index != PC {
            self.gprs[rn_index] = offset_base;
        }

        if load {
            let value = if byte {
                u32::from(bus.read8(address, host))
            } else {
                // Unaligned word loads rotate the word around the bus.
                bus.read32(address & !3, host).rotate_right(8 * (address & 3))
            };
            if rd_index == PC {
                self.gprs[PC] = value & !3;
                return 5;
            }
            self.gprs[rd_index] = value;
            3
        } else {
            // A stored PC reads one word further ahead than an operand PC.
            let value = if rd_index == PC {
                self.gprs[PC].wrapping_add(8)
            } else {
                self.gprs[rd_index]
            };
            if byte {
                bus.write8(address, value as u8, host);
            } else {
                bus.write32(address & !3, value, host);
            }
            2
        }
    }

    fn execute_halfword_transfer(&mut self, i: u32, bus: &mut SystemBus, host: &mut dyn Host) -> u32 {
        let pre_index = i & 0x0100_0000 != 0;
        let add = i & 0x0080_0000 != 0;
        let immediate = i & 0x0040_0000 != 0;
        let writeback = i & 0x0020_0000 != 0;
        let load = i & 0x0010_0000 != 0;
        let rn_index = ((i >> 16) & 0xF) as usize;
        let rd_index = ((i >> 12) & 0xF) as usize;
        let sh = (i >> 5) & 0x3;

        let offset = if immediate {
            ((i >> 4) & 0xF0) | (i & 0xF)
        } else {
            self.read_operand((i & 0xF) as usize, 4)
        };

        let base = self.read_operand(rn_index, 4);
        let offset_base = if add {
            base.wrapping_add(offset)
        } else {
            base.wrapping_sub(offset)
        };
        let address = if pre_index { offset_base } else { base };

        if (!pre_index || writeback) && rn_index != PC {
            self.gprs[rn_index] = offset_base;
        }

        if load {
            let value = match sh {
                0b01 => u32::from(bus.read16(address & !1, host)),
                0b10 => i32::from(bus.read8(address, host) as i8) as u32,
                _ => i32::from(bus.read16(address & !1, host) as i16) as u32,
            };
            if rd_index == PC {
                self.gprs[PC] = value & !3;
                return 5;
            }
            self.gprs[rd_index] = value;
            3
        } else {
            let value = self.read_operand(rd_index, 4);
            bus.write16(address & !1, value as u16, host);
            2
        }
    }

    fn execute_block_transfer(&mut self, i: u32, bus: &mut SystemBus, host: &mut dyn Host) -> u32 {
        let pre_index = i & 0x0100_0000 != 0;
        let add = i & 0x0080_0000 != 0;
        let psr_bit = i & 0x0040_0000 != 0;
        let writeback = i & 0x0020_0000 != 0;
        let load = i & 0x0010_0000 != 0;
        let rn_index = ((i >> 16) & 0xF) as usize;
        let mut list = i & 0xFFFF;

        let base = self.gprs[rn_index];
        let mut quirk_pc_only = false;
        if list == 0 {
            // Empty list transfers only the PC and moves the base by 0x40.
            list = 1 << PC;
            quirk_pc_only = true;
        }
        let count = list.count_ones();
        let span = if quirk_pc_only { 0x40 } else { count * 4 };

        let loads_pc = load && (list & (1 << PC)) != 0;
        if psr_bit && !loads_pc {
            host.log(
                LogLevel::Stub,
                format_args!("Unimplemented: user-bank block transfer (0x{:08X})", i),
            );
        }

        let start = if add {
            if pre_index { base.wrapping_add(4) } else { base }
        } else {
            let bottom = base.wrapping_sub(span);
            if pre_index { bottom } else { bottom.wrapping_add(4) }
        };
        let new_base = if add {
            base.wrapping_add(span)
        } else {
            base.wrapping_sub(span)
        };

        let mut address = start;
        if load {
            if writeback && rn_index != PC {
                // A loaded base register overwrites the writeback below.
                self.gprs[rn_index] = new_base;
            }
            for r in 0..16 {
                if list & (1 << r) == 0 {
                    continue;
                }
                let value = bus.read32(address & !3, host);
                if r == PC {
                    self.gprs[PC] = value & !3;
                    if psr_bit {
                        // LDM with PC and the S bit is an exception return.
                        self.write_cpsr(self.spsr.bits(), true, host);
                    }
                } else {
                    self.gprs[r] = value;
                }
                address = address.wrapping_add(4);
            }
            2 + count + if loads_pc { 2 } else { 0 }
        } else {
            let mut first = true;
            for r in 0..16 {
                if list & (1 << r) == 0 {
                    continue;
                }
                let value = if r == PC {
                    self.gprs[PC].wrapping_add(8)
                } else if r == rn_index && !first {
                    new_base
                } else {
                    self.gprs[r]
                };
                bus.write32(address & !3, value, host);
                address = address.wrapping_add(4);
                first = false;
            }
            if writeback && rn_index != PC {
                self.gprs[rn_index] = new_base;
            }
            1 + count
        }
    }

    fn execute_branch(&mut self, i: u32) -> u32 {
        let link = i & 0x0100_0000 != 0;
        let offset = ((i & 0x00FF_FFFF) << 8) as i32 >> 6;
        if link {
            self.gprs[LR] = self.gprs[PC];
        }
        self.gprs[PC] = self
            .read_operand(PC, 4)
            .wrapping_add(offset as u32);
        3
    }

    fn execute_swi(&mut self, i: u32, host: &mut dyn Host) -> u32 {
        // Without a BIOS there is nothing to vector into; trace and continue.
        host.log(
            LogLevel::Swi,
            format_args!("SWI 0x{:06X}", i & 0x00FF_FFFF),
        );
        3
    }

    /// Reads a register as an instruction operand. The program counter reads
    /// ahead of the executing instruction by `pc_offset` more than the
    /// already-advanced fetch position.
    fn read_operand(&self, index: usize, pc_offset: u32) -> u32 {
        if index == PC {
            self.gprs[PC].wrapping_add(pc_offset)
        } else {
            self.gprs[index]
        }
    }
}

impl Default for Arm7 {
    fn default() -> Self {
        Self::new()
    }
}
