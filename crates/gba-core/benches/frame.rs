//! Whole-frame and save-state throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gba_core::cartridge::{GbaHeader, HEADER_SIZE};
use gba_core::host::NullHost;
use gba_core::state::STATE_SIZE;
use gba_core::system::Gba;

/// Mode-3 program that spins while the display scans out.
fn bench_rom() -> Vec<u8> {
    let program: &[u32] = &[
        0xE3A0_1404, // MOV r1, #0x04000000
        0xE3A0_0C04, // MOV r0, #0x400
        0xE280_0003, // ADD r0, r0, #3 (mode 3, BG2 on)
        0xE1C1_00B0, // STRH r0, [r1]
        0xEAFF_FFFE, // B . (spin)
    ];
    let mut rom = vec![0u8; HEADER_SIZE + program.len() * 4];
    rom[0..4].copy_from_slice(&0xEA00_002Eu32.to_le_bytes()); // B 0xC0
    rom[0xA0..0xAC].copy_from_slice(b"BENCH       ");
    rom[0xAC..0xB0].copy_from_slice(b"ABEE");
    rom[0xB0..0xB2].copy_from_slice(b"01");
    rom[0xB2] = 0x96;
    rom[0xBD] = GbaHeader::compute_complement(&rom);
    for (i, word) in program.iter().enumerate() {
        let at = HEADER_SIZE + i * 4;
        rom[at..at + 4].copy_from_slice(&word.to_le_bytes());
    }
    rom
}

fn bench_run_frame(c: &mut Criterion) {
    let mut gba = Gba::new();
    gba.load_rom(bench_rom()).expect("bench ROM is valid");
    let mut host = NullHost;

    c.bench_function("run_frame", |b| {
        b.iter(|| {
            gba.run_frame(&mut host);
            black_box(gba.frame_count())
        })
    });
}

fn bench_save_state(c: &mut Criterion) {
    let mut gba = Gba::new();
    gba.load_rom(bench_rom()).expect("bench ROM is valid");
    let mut host = NullHost;
    gba.run_frame(&mut host);
    let mut blob = vec![0u8; STATE_SIZE];

    c.bench_function("save_state", |b| {
        b.iter(|| {
            gba.save_state(black_box(&mut blob)).expect("exact buffer");
        })
    });

    gba.save_state(&mut blob).expect("exact buffer");
    c.bench_function("load_state", |b| {
        b.iter(|| {
            gba.load_state(black_box(&blob), &mut host).expect("valid blob");
        })
    });
}

criterion_group!(benches, bench_run_frame, bench_save_state);
criterion_main!(benches);
