//! GBA Retro - frame-driven host adapter for the GBA core
//!
//! This crate sits between an emulation core and a frontend. The frontend
//! ("host") hands the session a set of capability callbacks once, up front:
//! where frames go, where audio goes, how input is read, where diagnostics
//! land. The session then drives the machine one video frame per
//! [`Session::run_frame`] call, pushing output through whatever capabilities
//! the host bound. Capabilities the host never bound degrade to safe
//! defaults instead of failing; the session itself stays single-threaded and
//! callback-driven.
//!
//! Lifecycle: [`Session::init`] builds the machine and declares the pad
//! layout and pixel format, [`Session::load`] installs a program and starts
//! it, [`Session::run_frame`] ticks, and [`Session::shutdown`] tears
//! everything down. Save states move through [`Session::serialize`] and
//! [`Session::deserialize`] as fixed-size opaque blobs.

#![forbid(unsafe_code)]

/// Capability registry: the six host callback slots
pub mod callbacks;
/// Session error taxonomy
pub mod error;
/// The per-tick frame driver
pub mod frame;
/// Declared metadata: naming, geometry, timing, region
pub mod info;
/// Button set, controller declaration and key-word packing
pub mod input;
/// Diagnostic level bridge between machine and host
pub mod log;
/// The machine seam the session drives
pub mod machine;
/// Session lifecycle and state gating
pub mod session;

pub use callbacks::{Callbacks, EnvironmentQuery, PixelFormat};
pub use error::SessionError;
pub use info::{api_version, av_info, region, system_info};
pub use info::{AvInfo, Geometry, Region, SystemInfo, Timing, API_VERSION};
pub use input::{DeviceClass, InputDescriptor, JoypadButton, INPUT_DESCRIPTORS, JOYPAD_PORT};
pub use log::{host_level, HostLogLevel, MAX_MESSAGE_LEN};
pub use machine::{FrameRef, Machine};
pub use session::{LoadSource, Session, SessionState};
