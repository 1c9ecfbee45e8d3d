//! CPU tests: hand-assembled ARM programs run against the real bus

use gba_core::bus::SystemBus;
use gba_core::cpu::{Arm7, LR, PC};
use gba_core::host::NullHost;

/// Program base inside EWRAM, away from the reset vector.
const BASE: u32 = 0x0200_0000;

/// Writes a program into EWRAM and points the CPU at it.
fn setup(program: &[u32]) -> (Arm7, SystemBus) {
    let mut cpu = Arm7::new();
    cpu.reset();
    let mut bus = SystemBus::new();
    let mut host = NullHost;
    for (i, word) in program.iter().enumerate() {
        bus.write32(BASE + (i as u32) * 4, *word, &mut host);
    }
    cpu.set_gpr(PC, BASE);
    (cpu, bus)
}

fn run(cpu: &mut Arm7, bus: &mut SystemBus, steps: usize) {
    let mut host = NullHost;
    for _ in 0..steps {
        cpu.step(bus, &mut host);
    }
}

#[test]
fn test_mov_immediate() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_002A, // MOV r0, #42
    ]);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.gpr(0), 42);
    assert_eq!(cpu.gpr(PC), BASE + 4);
}

#[test]
fn test_add_sub_immediate() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_0005, // MOV r0, #5
        0xE280_1007, // ADD r1, r0, #7
        0xE241_2003, // SUB r2, r1, #3
    ]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.gpr(0), 5);
    assert_eq!(cpu.gpr(1), 12);
    assert_eq!(cpu.gpr(2), 9);
}

#[test]
fn test_rotated_immediate_operand() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_1403, // MOV r1, #0x03000000
    ]);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.gpr(1), 0x0300_0000);
}

#[test]
fn test_cmp_drives_conditional_execution() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_0005, // MOV r0, #5
        0xE350_0005, // CMP r0, #5
        0x03A0_1001, // MOVEQ r1, #1
        0x13A0_2001, // MOVNE r2, #1
    ]);
    run(&mut cpu, &mut bus, 4);
    assert!(cpu.cpsr().zero());
    assert!(cpu.cpsr().carry()); // no borrow
    assert_eq!(cpu.gpr(1), 1);
    assert_eq!(cpu.gpr(2), 0);
}

#[test]
fn test_branch_skips_instruction() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_0001, // MOV r0, #1
        0xEA00_0000, // B +4 (over the next instruction)
        0xE3A0_00FF, // MOV r0, #0xFF (skipped)
        0xE3A0_1002, // MOV r1, #2
    ]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.gpr(0), 1);
    assert_eq!(cpu.gpr(1), 2);
}

#[test]
fn test_branch_with_link_records_return_address() {
    let (mut cpu, mut bus) = setup(&[
        0xEB00_0002, // BL +16
        0x0000_0000,
        0x0000_0000,
        0x0000_0000,
        0xE3A0_0007, // MOV r0, #7
    ]);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.gpr(LR), BASE + 4);
    assert_eq!(cpu.gpr(0), 7);
}

#[test]
fn test_bx_branches_to_register() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_0402, // MOV r0, #0x02000000
        0xE380_0010, // ORR r0, r0, #0x10
        0xE12F_FF10, // BX r0
        0x0000_0000,
        0xE3A0_1009, // MOV r1, #9 (at 0x02000010)
    ]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.gpr(1), 9);
}

#[test]
fn test_str_ldr_word() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_002A, // MOV r0, #42
        0xE3A0_1403, // MOV r1, #0x03000000
        0xE581_0000, // STR r0, [r1]
        0xE591_2000, // LDR r2, [r1]
    ]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.gpr(2), 42);
    let mut host = NullHost;
    assert_eq!(bus.read32(0x0300_0000, &mut host), 42);
}

#[test]
fn test_strb_ldrb() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_0080, // MOV r0, #0x80
        0xE3A0_1403, // MOV r1, #0x03000000
        0xE5C1_0001, // STRB r0, [r1, #1]
        0xE5D1_2001, // LDRB r2, [r1, #1]
    ]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.gpr(2), 0x80);
}

#[test]
fn test_strh_ldrh() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_00AB, // MOV r0, #0xAB
        0xE3A0_1403, // MOV r1, #0x03000000
        0xE1C1_00B0, // STRH r0, [r1]
        0xE1D1_20B0, // LDRH r2, [r1]
    ]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.gpr(2), 0xAB);
}

#[test]
fn test_lsl_shifted_operand() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_0001, // MOV r0, #1
        0xE1A0_1200, // MOV r1, r0, LSL #4
    ]);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.gpr(1), 16);
}

#[test]
fn test_multiply() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_0006, // MOV r0, #6
        0xE3A0_1007, // MOV r1, #7
        0xE002_0190, // MUL r2, r0, r1
    ]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.gpr(2), 42);
}

#[test]
fn test_block_transfer_round_trip() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_0403, // MOV r0, #0x03000000
        0xE380_0C01, // ORR r0, r0, #0x100
        0xE3A0_1011, // MOV r1, #0x11
        0xE3A0_2022, // MOV r2, #0x22
        0xE8A0_0006, // STMIA r0!, {r1, r2}
        0xE240_0008, // SUB r0, r0, #8
        0xE3A0_3000, // MOV r3, #0
        0xE3A0_4000, // MOV r4, #0
        0xE890_0018, // LDMIA r0, {r3, r4}
    ]);
    run(&mut cpu, &mut bus, 9);
    assert_eq!(cpu.gpr(0), 0x0300_0100);
    assert_eq!(cpu.gpr(3), 0x11);
    assert_eq!(cpu.gpr(4), 0x22);
}

#[test]
fn test_msr_mrs_flags() {
    let (mut cpu, mut bus) = setup(&[
        0xE328_F20F, // MSR CPSR_f, #0xF0000000
        0xE10F_0000, // MRS r0, CPSR
    ]);
    run(&mut cpu, &mut bus, 2);
    assert!(cpu.cpsr().negative());
    assert!(cpu.cpsr().zero());
    assert!(cpu.cpsr().carry());
    assert!(cpu.cpsr().overflow());
    assert_eq!(cpu.gpr(0) & 0xF000_0000, 0xF000_0000);
}

#[test]
fn test_failed_condition_costs_one_cycle() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_0001, // MOV r0, #1 (leaves Z clear)
        0x03A0_1001, // MOVEQ r1, #1 (not taken)
    ]);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.gpr(1), 0);
    assert_eq!(cpu.total_cycles(), 2);
}

#[test]
fn test_total_cycles_accumulate() {
    let (mut cpu, mut bus) = setup(&[
        0xE3A0_0001, // MOV r0, #1
        0xEAFF_FFFE, // B . (spin)
    ]);
    run(&mut cpu, &mut bus, 2);
    // One ALU cycle plus a three-cycle branch.
    assert_eq!(cpu.total_cycles(), 4);
    // The spin branch targets itself, so the next fetch is the branch again.
    assert_eq!(cpu.gpr(PC), BASE + 4);
}
