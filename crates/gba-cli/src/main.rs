//! GBA CLI - Headless session runner
//!
//! Runs a program for a fixed number of frames with no window. Video frames
//! and audio pairs are counted rather than presented; machine diagnostics
//! come out through env_logger. State blobs can be written and read back, so
//! a run is resumable.

use std::cell::Cell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use gba_core::cartridge::GbaHeader;
use gba_core::cpu::{LR, PC, SP};
use gba_core::system::Gba;
use gba_retro::{HostLogLevel, LoadSource, Session};

/// GBA Emulator CLI
#[derive(Parser, Debug)]
#[command(name = "gba-cli")]
#[command(about = "A headless GBA emulator runner", long_about = None)]
struct Args {
    /// Path to the GBA ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Optional BIOS image (16 KiB); the machine boots without one
    #[arg(short, long)]
    bios: Option<PathBuf>,

    /// Number of frames to run
    #[arg(short, long, default_value = "60")]
    frames: u64,

    /// Restore a state blob before running
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Write a state blob after running
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Dump CPU state after execution
    #[arg(short = 'c', long)]
    dump_cpu: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    // Load ROM file
    let rom_data = match fs::read(&args.rom) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to read ROM file: {}", e);
            std::process::exit(1);
        }
    };

    // Parse the cartridge header for display
    let header = match GbaHeader::parse(&rom_data) {
        Ok(header) => header,
        Err(e) => {
            eprintln!("Failed to parse cartridge header: {}", e);
            std::process::exit(1);
        }
    };

    println!("Loaded program:");
    println!("  Title:   {}", header.title_string());
    println!("  Code:    {}", header.game_code_string());
    println!("  Version: {}", header.software_version);
    println!("  Size:    {} bytes", rom_data.len());

    let mut session: Session<Gba> = Session::new();

    // Route machine diagnostics into the logger
    session.callbacks_mut().set_log(|level, message| {
        let level = match level {
            HostLogLevel::Error => log::Level::Error,
            HostLogLevel::Warn => log::Level::Warn,
            HostLogLevel::Info => log::Level::Info,
            HostLogLevel::Debug => log::Level::Debug,
        };
        log::log!(level, "{}", message);
    });

    // Count deliveries instead of presenting them
    let video_frames = Rc::new(Cell::new(0u64));
    let delivered = video_frames.clone();
    session
        .callbacks_mut()
        .set_video_refresh(move |_| delivered.set(delivered.get() + 1));

    let audio_pairs = Rc::new(Cell::new(0u64));
    let pairs = audio_pairs.clone();
    session
        .callbacks_mut()
        .set_audio_sample(move |_, _| pairs.set(pairs.get() + 1));

    // Headless host: no environment capability, so the session keeps its
    // default output format; no input capability, so no button is pressed.
    if let Err(e) = session.init() {
        eprintln!("Failed to initialize session: {}", e);
        std::process::exit(1);
    }

    if let Some(bios_path) = &args.bios {
        let bios = match fs::read(bios_path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Failed to read BIOS file: {}", e);
                std::process::exit(1);
            }
        };
        let machine = session.machine_mut().expect("session is initialized");
        if let Err(e) = machine.load_bios(&bios) {
            eprintln!("Failed to load BIOS: {}", e);
            std::process::exit(1);
        }
        println!("BIOS image installed ({} bytes)", bios.len());
    }

    if let Err(e) = session.load(LoadSource::Buffer(rom_data)) {
        eprintln!("Failed to load ROM: {}", e);
        std::process::exit(1);
    }

    if let Some(path) = &args.load_state {
        let blob = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Failed to read state file: {}", e);
                std::process::exit(1);
            }
        };
        if let Err(e) = session.deserialize(&blob) {
            eprintln!("Failed to restore state: {}", e);
            std::process::exit(1);
        }
        println!("Restored state from {}", path.display());
    }

    println!("\nRunning {} frames...", args.frames);

    for _ in 0..args.frames {
        if let Err(e) = session.run_frame() {
            eprintln!("Error running frame: {}", e);
            std::process::exit(1);
        }
    }

    let frame_count = session
        .machine()
        .map(|machine| machine.frame_count())
        .unwrap_or(0);
    println!("Completed {} frames.", frame_count);
    println!("  Video frames delivered: {}", video_frames.get());
    println!("  Audio sample pairs: {}", audio_pairs.get());

    if let Some(path) = &args.save_state {
        let mut blob = vec![0u8; session.serialize_size()];
        if let Err(e) = session.serialize(&mut blob) {
            eprintln!("Failed to serialize state: {}", e);
            std::process::exit(1);
        }
        if let Err(e) = fs::write(path, &blob) {
            eprintln!("Failed to write state file: {}", e);
            std::process::exit(1);
        }
        println!("Saved state to {} ({} bytes)", path.display(), blob.len());
    }

    if args.dump_cpu {
        if let Some(machine) = session.machine() {
            dump_cpu_state(machine);
        }
    }
}

fn dump_cpu_state(gba: &Gba) {
    let cpu = gba.cpu();

    println!("\nCPU State:");
    for row in 0..4 {
        let base = row * 4;
        println!(
            "  r{:<2} {:08X}  r{:<2} {:08X}  r{:<2} {:08X}  r{:<2} {:08X}",
            base,
            cpu.gpr(base),
            base + 1,
            cpu.gpr(base + 1),
            base + 2,
            cpu.gpr(base + 2),
            base + 3,
            cpu.gpr(base + 3),
        );
    }
    println!("  SP:   {:08X}", cpu.gpr(SP));
    println!("  LR:   {:08X}", cpu.gpr(LR));
    println!("  PC:   {:08X}", cpu.gpr(PC));
    println!("  CPSR: {:08X} ({})", cpu.cpsr().bits(), cpu.cpsr());
    println!("  Cycles: {}", cpu.total_cycles());
}
