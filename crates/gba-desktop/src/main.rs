//! GBA Desktop - Windowed GBA emulator with minifb rendering
//!
//! Drives a session at display pace: poll the keyboard, run one frame,
//! blit. F5 saves an in-memory state, F7 restores it, ESC quits.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use gba_core::system::Gba;
use gba_retro::{av_info, HostLogLevel, JoypadButton, LoadSource, Session};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

/// GBA Emulator Desktop App
#[derive(Parser, Debug)]
#[command(name = "gba-desktop")]
#[command(about = "A GBA emulator desktop app", long_about = None)]
struct Args {
    /// Path to the GBA ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Optional BIOS image (16 KiB)
    #[arg(short, long)]
    bios: Option<PathBuf>,

    /// Screen scale factor (1-4)
    #[arg(short, long, default_value = "2")]
    scale: usize,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let info = av_info();
    let width = info.geometry.base_width as usize;
    let height = info.geometry.base_height as usize;

    let mut session: Session<Gba> = Session::new();

    // minifb buffers are 32-bit XRGB words, the format the session offers.
    session.callbacks_mut().set_environment(|_| true);

    session.callbacks_mut().set_log(|level, message| {
        let level = match level {
            HostLogLevel::Error => log::Level::Error,
            HostLogLevel::Warn => log::Level::Warn,
            HostLogLevel::Info => log::Level::Info,
            HostLogLevel::Debug => log::Level::Debug,
        };
        log::log!(level, "{}", message);
    });

    // The machine hands over stride-padded rows; pack them tight for minifb.
    let framebuffer: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(vec![0u32; width * height]));
    let blit = framebuffer.clone();
    session.callbacks_mut().set_video_refresh(move |frame| {
        let mut fb = blit.borrow_mut();
        let stride_words = frame.pitch / 4;
        let visible = frame.width as usize;
        for y in 0..frame.height as usize {
            let src = y * stride_words;
            let dst = y * visible;
            fb[dst..dst + visible].copy_from_slice(&frame.pixels[src..src + visible]);
        }
    });

    // Keyboard state packed once per frame, answered per button.
    let keys: Rc<Cell<u16>> = Rc::new(Cell::new(0));
    let key_source = keys.clone();
    session
        .callbacks_mut()
        .set_input_state(move |_port, _device, _index, button| {
            key_source.get() & button.mask() != 0
        });

    if let Err(e) = session.init() {
        eprintln!("Failed to initialize session: {}", e);
        std::process::exit(1);
    }

    if let Some(bios_path) = &args.bios {
        let bios = match std::fs::read(bios_path) {
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
    }

    if let Err(e) = session.load(LoadSource::Path(&args.rom)) {
        eprintln!("Failed to load ROM: {}", e);
        std::process::exit(1);
    }

    if let Some(cartridge) = session.machine().and_then(|machine| machine.bus().cartridge()) {
        println!("Loaded program:");
        println!("  Title: {}", cartridge.header().title_string());
        println!("  Code:  {}", cartridge.header().game_code_string());
        println!("  Size:  {} bytes", cartridge.size());
    }

    // Create window with specified scale
    let scale = args.scale.min(4).max(1);
    let mut window = Window::new(
        "GBA Emulator",
        width * scale,
        height * scale,
        WindowOptions {
            resize: false,
            ..WindowOptions::default()
        },
    )
    .expect("Failed to create window");
    window.set_target_fps(info.timing.fps.round() as usize);

    println!("\nStarting GBA emulation...");
    println!("Z/X = B/A, A/S = L/R, arrows = pad, Enter = Start, Backspace = Select");
    println!("F5 saves a state, F7 restores it. Press ESC to exit.");

    let mut save_slot: Option<Vec<u8>> = None;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        keys.set(pack_keys(&window));

        if window.is_key_pressed(Key::F5, KeyRepeat::No) {
            let mut blob = vec![0u8; session.serialize_size()];
            match session.serialize(&mut blob) {
                Ok(()) => {
                    save_slot = Some(blob);
                    println!("State saved");
                }
                Err(e) => eprintln!("State save failed: {}", e),
            }
        }
        if window.is_key_pressed(Key::F7, KeyRepeat::No) {
            match &save_slot {
                Some(blob) => match session.deserialize(blob) {
                    Ok(()) => println!("State restored"),
                    Err(e) => eprintln!("State restore failed: {}", e),
                },
                None => println!("No saved state yet"),
            }
        }

        if let Err(e) = session.run_frame() {
            eprintln!("Error running frame: {}", e);
            std::process::exit(1);
        }

        window
            .update_with_buffer(&framebuffer.borrow(), width, height)
            .expect("Failed to update window");
    }

    println!("Emulator closed.");
}

/// Keyboard map: X/Z for A/B, A/S for the shoulders, Enter and Backspace
/// for Start and Select, arrows for the pad.
fn pack_keys(window: &Window) -> u16 {
    let mut keys = 0u16;
    let mut press = |button: JoypadButton, down: bool| {
        if down {
            keys |= button.mask();
        }
    };
    press(JoypadButton::A, window.is_key_down(Key::X));
    press(JoypadButton::B, window.is_key_down(Key::Z));
    press(JoypadButton::Select, window.is_key_down(Key::Backspace));
    press(JoypadButton::Start, window.is_key_down(Key::Enter));
    press(JoypadButton::Right, window.is_key_down(Key::Right));
    press(JoypadButton::Left, window.is_key_down(Key::Left));
    press(JoypadButton::Up, window.is_key_down(Key::Up));
    press(JoypadButton::Down, window.is_key_down(Key::Down));
    press(JoypadButton::R, window.is_key_down(Key::S));
    press(JoypadButton::L, window.is_key_down(Key::A));
    keys
}
