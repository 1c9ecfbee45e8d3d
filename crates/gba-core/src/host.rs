//! Host event sink
//!
//! The machine pushes two kinds of events while it runs: stereo audio sample
//! pairs and diagnostic messages. Both go through the [`Host`] trait, passed
//! by the caller into [`crate::system::Gba::step`]. All methods default to
//! no-ops so an embedder only implements what it observes.

use std::fmt;

/// Diagnostic severity as the hardware core reports it.
///
/// These are the machine-side levels; an embedder with a smaller taxonomy is
/// expected to fold them down itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Unrecoverable core error
    Fatal,
    /// Core error
    Error,
    /// Suspicious but recoverable condition
    Warn,
    /// General information
    Info,
    /// Core debugging detail
    Debug,
    /// Unimplemented hardware feature was exercised
    Stub,
    /// The running program did something hardware tolerates but never rewards
    GameError,
    /// BIOS call trace
    Swi,
    /// Catch-all used when no finer level applies
    All,
}

/// Receiver for events pushed by the machine during execution.
pub trait Host {
    /// One stereo sample pair, signed 16-bit, at the output sample rate.
    fn audio_sample(&mut self, left: i16, right: i16) {
        let _ = (left, right);
    }

    /// One diagnostic message. `args` is only rendered if the sink uses it.
    fn log(&mut self, level: LogLevel, args: fmt::Arguments<'_>) {
        let _ = (level, args);
    }
}

/// Sink that discards everything; useful for headless stepping and tests.
pub struct NullHost;

impl Host for NullHost {}
