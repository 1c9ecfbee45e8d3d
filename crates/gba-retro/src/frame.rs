//! Frame driving
//!
//! One call, one frame: poll input, latch it, step the machine to the next
//! frame boundary, deliver the finished picture exactly once. Audio and
//! diagnostics escape mid-frame through a sink that bridges machine events
//! onto the host capabilities.

use std::fmt::{self, Write};

use gba_core::host::{Host, LogLevel};

use crate::callbacks::Callbacks;
use crate::input;
use crate::log::{host_level, MessageBuffer};
use crate::machine::Machine;

/// Bridges events the machine pushes mid-frame onto host capabilities.
pub(crate) struct CallbackSink<'a> {
    callbacks: &'a mut Callbacks,
}

impl<'a> CallbackSink<'a> {
    pub(crate) fn new(callbacks: &'a mut Callbacks) -> Self {
        Self { callbacks }
    }
}

impl Host for CallbackSink<'_> {
    fn audio_sample(&mut self, left: i16, right: i16) {
        self.callbacks.audio_sample(left, right);
    }

    fn log(&mut self, level: LogLevel, args: fmt::Arguments<'_>) {
        // Skip rendering entirely when nothing listens.
        if !self.callbacks.wants_log() {
            return;
        }
        let mut line = MessageBuffer::new();
        let _ = line.write_fmt(args);
        self.callbacks.log_line(host_level(level), line.as_str());
    }
}

/// Drives exactly one frame of the machine against the host capabilities.
///
/// Input is polled and latched before any machine time passes, so the whole
/// frame sees one consistent key word. Video goes out exactly once, after
/// the frame boundary.
pub(crate) fn drive_frame<M: Machine>(machine: &mut M, callbacks: &mut Callbacks) {
    callbacks.input_poll();
    let keys = input::read_joypad(callbacks);
    machine.set_keys(keys);

    let mut sink = CallbackSink::new(callbacks);
    machine.run_frame(&mut sink);

    callbacks.video_refresh(machine.frame());
}
