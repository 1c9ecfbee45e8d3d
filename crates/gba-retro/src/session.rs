//! Session lifecycle
//!
//! A session owns one machine and the capabilities a host granted. It moves
//! through three phases: no machine yet, machine without a program, machine
//! running a program. Every operation names the phase it needs; calling
//! early gets an error, never a crash or a half-done transition.

use std::fs;
use std::path::Path;

use gba_core::cartridge::CartridgeError;

use crate::callbacks::{Callbacks, EnvironmentQuery, PixelFormat};
use crate::error::SessionError;
use crate::frame::{self, CallbackSink};
use crate::input::INPUT_DESCRIPTORS;
use crate::machine::Machine;

/// Lifecycle phase of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No machine exists yet. Capabilities can be installed.
    Uninitialized,
    /// A machine exists, waiting for a program.
    Ready,
    /// A program is loaded and frames can run.
    Running,
}

/// Where a program image comes from.
#[derive(Debug)]
pub enum LoadSource<'a> {
    /// Bytes already in memory. The machine takes ownership.
    Buffer(Vec<u8>),
    /// A file on disk, read once at load time.
    Path(&'a Path),
}

/// A host-driven emulation session around one machine.
///
/// The host installs capabilities first, initializes, loads a program, then
/// calls [`Session::run_frame`] at its own cadence. Teardown at any point is
/// [`Session::shutdown`]; the installed capabilities survive it, so another
/// initialize starts a fresh machine against the same host.
pub struct Session<M: Machine> {
    callbacks: Callbacks,
    machine: Option<M>,
    state: SessionState,
}

impl<M: Machine> Session<M> {
    /// A session with no capabilities installed and no machine.
    pub fn new() -> Self {
        Self {
            callbacks: Callbacks::new(),
            machine: None,
            state: SessionState::Uninitialized,
        }
    }

    /// Capability slots, for the host to fill before initializing.
    pub fn callbacks_mut(&mut self) -> &mut Callbacks {
        &mut self.callbacks
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Direct machine access for host-side setup such as BIOS preloading.
    /// `None` before initialize and after shutdown.
    pub fn machine(&self) -> Option<&M> {
        self.machine.as_ref()
    }

    /// See [`Session::machine`].
    pub fn machine_mut(&mut self) -> Option<&mut M> {
        self.machine.as_mut()
    }

    /// Builds the machine and negotiates output with the host.
    ///
    /// Initializing an already-initialized session tears the old machine
    /// down first. The session offers [`PixelFormat::Xrgb8888`] and declares
    /// the controller table. A host without an environment capability takes
    /// the defaults silently; only an explicit refusal of the pixel format
    /// is reported, and even then the session stays usable because frames
    /// render in that format regardless.
    pub fn init(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Uninitialized {
            self.shutdown();
        }
        self.machine = Some(M::default());
        self.state = SessionState::Ready;

        let accepted = self
            .callbacks
            .environment(EnvironmentQuery::SetPixelFormat(PixelFormat::Xrgb8888));
        self.callbacks
            .environment(EnvironmentQuery::SetInputDescriptors(&INPUT_DESCRIPTORS));

        if accepted == Some(false) {
            return Err(SessionError::PixelFormatRejected(PixelFormat::Xrgb8888));
        }
        Ok(())
    }

    /// Loads a program image and starts running it.
    ///
    /// Loading while a program is already running replaces it wholesale; no
    /// state of the old program survives. A rejected image changes nothing:
    /// the previous program, if any, keeps running.
    pub fn load(&mut self, source: LoadSource<'_>) -> Result<(), SessionError> {
        let machine = self.machine.as_mut().ok_or(SessionError::Uninitialized)?;
        let bytes = match source {
            LoadSource::Buffer(bytes) => bytes,
            LoadSource::Path(path) => fs::read(path).map_err(CartridgeError::from)?,
        };
        machine.load_rom(bytes)?;
        self.state = SessionState::Running;
        Ok(())
    }

    /// Removes the loaded program, if any. The machine survives, reset and
    /// empty, so another load can follow.
    pub fn unload(&mut self) {
        if let Some(machine) = self.machine.as_mut() {
            machine.unload_rom();
            self.state = SessionState::Ready;
        }
    }

    /// Power-on reset of the running program. Program and BIOS stay loaded.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        let (machine, _) = self.running_machine()?;
        machine.reset();
        Ok(())
    }

    /// Drives exactly one frame: input poll, one frame of machine time with
    /// audio and diagnostics flowing out as they occur, then one video
    /// delivery.
    pub fn run_frame(&mut self) -> Result<(), SessionError> {
        let (machine, callbacks) = self.running_machine()?;
        frame::drive_frame(machine, callbacks);
        Ok(())
    }

    /// Byte length of the state blob. Constant for a given machine type.
    pub fn serialize_size(&self) -> usize {
        M::STATE_SIZE
    }

    /// Writes the machine state into `buf`, which must be exactly
    /// [`Session::serialize_size`] bytes.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<(), SessionError> {
        match self.state {
            SessionState::Uninitialized => Err(SessionError::Uninitialized),
            SessionState::Ready => Err(SessionError::NoProgram),
            SessionState::Running => match self.machine.as_ref() {
                Some(machine) => {
                    machine.save_state(buf)?;
                    Ok(())
                }
                None => Err(SessionError::Uninitialized),
            },
        }
    }

    /// Restores the machine from `buf`. A rejected blob leaves the running
    /// program exactly where it was; advisory restore findings reach the
    /// host through the log capability.
    pub fn deserialize(&mut self, buf: &[u8]) -> Result<(), SessionError> {
        let (machine, callbacks) = self.running_machine()?;
        let mut sink = CallbackSink::new(callbacks);
        machine.load_state(buf, &mut sink)?;
        Ok(())
    }

    /// Tears the machine down from any state. Installed capabilities
    /// survive.
    pub fn shutdown(&mut self) {
        self.machine = None;
        self.state = SessionState::Uninitialized;
    }

    /// The machine and capabilities, provided a program is loaded. The two
    /// misses map onto the two ways a caller can be early.
    fn running_machine(&mut self) -> Result<(&mut M, &mut Callbacks), SessionError> {
        match self.state {
            SessionState::Uninitialized => Err(SessionError::Uninitialized),
            SessionState::Ready => Err(SessionError::NoProgram),
            SessionState::Running => match self.machine.as_mut() {
                Some(machine) => Ok((machine, &mut self.callbacks)),
                // Unreachable: every path that drops the machine leaves
                // Running first.
                None => Err(SessionError::Uninitialized),
            },
        }
    }
}

impl<M: Machine> Default for Session<M> {
    fn default() -> Self {
        Self::new()
    }
}
