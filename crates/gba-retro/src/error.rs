//! Session error taxonomy
//!
//! Every failure is reported to the immediate caller and leaves the session
//! in a recoverable state; there are no panicking paths and no failures
//! that poison the session.

use thiserror::Error;

use gba_core::cartridge::CartridgeError;
use gba_core::state::StateError;

use crate::callbacks::PixelFormat;

/// Everything a session operation can fail with.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The image failed program validation. A previously loaded program, if
    /// any, keeps running.
    #[error("invalid program image: {0}")]
    InvalidImage(#[from] CartridgeError),

    /// A state buffer was rejected. No machine state was touched.
    #[error("save state rejected: {0}")]
    State(#[from] StateError),

    /// The host's environment capability refused the offered pixel format.
    /// The session stays usable and frames render in the offered format
    /// regardless; the host decides whether that is fatal.
    #[error("host rejected pixel format {0:?}")]
    PixelFormatRejected(PixelFormat),

    /// The operation needs an initialized session.
    #[error("session is not initialized")]
    Uninitialized,

    /// The operation needs a loaded program.
    #[error("no program is loaded")]
    NoProgram,
}
