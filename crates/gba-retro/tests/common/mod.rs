//! Shared test doubles: a scripted machine that records every call the
//! session makes, and a host capability set that records everything it
//! receives.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gba_core::cartridge::CartridgeError;
use gba_core::host::{Host, LogLevel};
use gba_core::state::StateError;
use gba_retro::{Callbacks, EnvironmentQuery, FrameRef, HostLogLevel, Machine, PixelFormat};

/// Calls the session made into the machine, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineEvent {
    Reset,
    LoadRom(usize),
    UnloadRom,
    SetKeys(u16),
    RunFrame,
    SaveState,
    LoadState,
}

/// A machine whose whole behavior is observable.
///
/// Images shorter than four bytes are rejected the way the real machine
/// rejects a headerless one. Each frame emits one audio pair and one
/// low-level log line so bridging is checkable.
#[derive(Default)]
pub struct ScriptedMachine {
    pub events: RefCell<Vec<MachineEvent>>,
    pub frames: u32,
    pub last_keys: u16,
    pub rom_len: Option<usize>,
    pub pixels: [u32; 8],
}

impl ScriptedMachine {
    pub const BLOB_LEN: usize = 8;

    fn record(&self, event: MachineEvent) {
        self.events.borrow_mut().push(event);
    }

    pub fn take_events(&self) -> Vec<MachineEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl Machine for ScriptedMachine {
    const STATE_SIZE: usize = ScriptedMachine::BLOB_LEN;

    fn reset(&mut self) {
        self.record(MachineEvent::Reset);
        self.frames = 0;
        self.last_keys = 0;
    }

    fn load_rom(&mut self, data: Vec<u8>) -> Result<(), CartridgeError> {
        if data.len() < 4 {
            return Err(CartridgeError::TooSmall { size: data.len() });
        }
        self.record(MachineEvent::LoadRom(data.len()));
        self.rom_len = Some(data.len());
        self.frames = 0;
        Ok(())
    }

    fn unload_rom(&mut self) {
        self.record(MachineEvent::UnloadRom);
        self.rom_len = None;
        self.frames = 0;
    }

    fn set_keys(&mut self, keys: u16) {
        self.record(MachineEvent::SetKeys(keys));
        self.last_keys = keys;
    }

    fn frame_count(&self) -> u32 {
        self.frames
    }

    fn run_frame(&mut self, host: &mut dyn Host) {
        self.frames += 1;
        self.record(MachineEvent::RunFrame);
        self.pixels[0] = self.frames;
        host.audio_sample(self.frames as i16, -(self.frames as i16));
        host.log(LogLevel::Stub, format_args!("scripted frame {}", self.frames));
    }

    fn frame(&self) -> FrameRef<'_> {
        FrameRef {
            pixels: &self.pixels,
            width: 4,
            height: 2,
            pitch: 16,
        }
    }

    fn save_state(&self, buf: &mut [u8]) -> Result<(), StateError> {
        if buf.len() != Self::BLOB_LEN {
            return Err(StateError::SizeMismatch {
                expected: Self::BLOB_LEN,
                found: buf.len(),
            });
        }
        self.record(MachineEvent::SaveState);
        buf[0..4].copy_from_slice(&self.frames.to_le_bytes());
        buf[4..6].copy_from_slice(&self.last_keys.to_le_bytes());
        buf[6..8].copy_from_slice(&[0xA5, 0x5A]);
        Ok(())
    }

    fn load_state(&mut self, buf: &[u8], _host: &mut dyn Host) -> Result<(), StateError> {
        if buf.len() != Self::BLOB_LEN {
            return Err(StateError::SizeMismatch {
                expected: Self::BLOB_LEN,
                found: buf.len(),
            });
        }
        if buf[6..8] != [0xA5, 0x5A] {
            return Err(StateError::BadMagic {
                found: u16::from_le_bytes([buf[6], buf[7]]) as u32,
            });
        }
        self.record(MachineEvent::LoadState);
        self.frames = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        self.last_keys = u16::from_le_bytes([buf[4], buf[5]]);
        Ok(())
    }
}

/// Environment queries a recording host saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvEvent {
    PixelFormat(PixelFormat),
    Descriptors(usize),
}

/// One delivered frame, flattened to owned data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveredFrame {
    pub width: u32,
    pub height: u32,
    pub pitch: usize,
    pub first_pixel: u32,
    pub pixel_count: usize,
}

/// Capability set that accepts everything and records everything.
///
/// `keys` is the button word the input-state capability answers from, one
/// bit per `JoypadButton` position.
#[derive(Default)]
pub struct HostRecorder {
    pub env: Rc<RefCell<Vec<EnvEvent>>>,
    pub frames: Rc<RefCell<Vec<DeliveredFrame>>>,
    pub audio: Rc<RefCell<Vec<(i16, i16)>>>,
    pub polls: Rc<Cell<u32>>,
    pub logs: Rc<RefCell<Vec<(HostLogLevel, String)>>>,
    pub keys: Rc<Cell<u16>>,
}

impl HostRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs all six capabilities into `callbacks`.
    pub fn install(&self, callbacks: &mut Callbacks) {
        let env = self.env.clone();
        callbacks.set_environment(move |query| {
            match query {
                EnvironmentQuery::SetPixelFormat(format) => {
                    env.borrow_mut().push(EnvEvent::PixelFormat(format));
                }
                EnvironmentQuery::SetInputDescriptors(descriptors) => {
                    env.borrow_mut().push(EnvEvent::Descriptors(descriptors.len()));
                }
            }
            true
        });

        let frames = self.frames.clone();
        callbacks.set_video_refresh(move |frame| {
            frames.borrow_mut().push(DeliveredFrame {
                width: frame.width,
                height: frame.height,
                pitch: frame.pitch,
                first_pixel: frame.pixels.first().copied().unwrap_or(0),
                pixel_count: frame.pixels.len(),
            });
        });

        let audio = self.audio.clone();
        callbacks.set_audio_sample(move |left, right| {
            audio.borrow_mut().push((left, right));
        });

        let polls = self.polls.clone();
        callbacks.set_input_poll(move || polls.set(polls.get() + 1));

        let keys = self.keys.clone();
        callbacks.set_input_state(move |_port, _device, _index, button| {
            keys.get() & button.mask() != 0
        });

        let logs = self.logs.clone();
        callbacks.set_log(move |level, message| {
            logs.borrow_mut().push((level, message.to_string()));
        });
    }
}
