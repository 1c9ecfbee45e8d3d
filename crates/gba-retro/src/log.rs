//! Diagnostic level folding and message bounding
//!
//! The machine reports nine diagnostic levels; hosts get four. The fold is
//! total, so no machine message is ever dropped for lack of a mapping.
//! Messages are rendered into a fixed-capacity line that clips instead of
//! growing, so a chatty or malformed program cannot make logging allocate.

use std::fmt;

use gba_core::host::LogLevel;

/// Longest message body handed to a host log sink, in bytes.
pub const MAX_MESSAGE_LEN: usize = 128;

/// The four-level taxonomy hosts consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HostLogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Folds a machine level into the host taxonomy.
///
/// Stub and BIOS-call traces are development chatter, so they land on the
/// quiet end. Game errors are interesting to a player but not actionable,
/// so they surface as plain information rather than warnings.
pub fn host_level(level: LogLevel) -> HostLogLevel {
    match level {
        LogLevel::Fatal | LogLevel::Error | LogLevel::All => HostLogLevel::Error,
        LogLevel::Warn => HostLogLevel::Warn,
        LogLevel::Info | LogLevel::GameError | LogLevel::Swi => HostLogLevel::Info,
        LogLevel::Debug | LogLevel::Stub => HostLogLevel::Debug,
    }
}

/// Clips `message` to at most `limit` bytes without splitting a character.
fn clip_to_boundary(message: &str, limit: usize) -> &str {
    if message.len() <= limit {
        return message;
    }
    let mut end = limit;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}

/// One diagnostic line with a hard length cap.
///
/// Implements [`fmt::Write`] and always reports success: overflow clips at a
/// character boundary instead of erroring, so formatting into the buffer
/// never fails the caller.
pub(crate) struct MessageBuffer {
    buf: [u8; MAX_MESSAGE_LEN],
    len: usize,
}

impl MessageBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buf: [0; MAX_MESSAGE_LEN],
            len: 0,
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        // Every append is a char-boundary prefix of valid UTF-8, so the
        // accumulated bytes are valid UTF-8.
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl fmt::Write for MessageBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let piece = clip_to_boundary(s, MAX_MESSAGE_LEN - self.len);
        self.buf[self.len..self.len + piece.len()].copy_from_slice(piece.as_bytes());
        self.len += piece.len();
        Ok(())
    }
}
