//! Session metadata
//!
//! Static facts a host reads around loading: adapter version, library
//! identification, video geometry and timing. Geometry and timing never
//! change at runtime because the hardware has one display mode and one
//! master clock.

use gba_core::apu::SAMPLE_RATE;
use gba_core::cpu::CLOCK_HZ;
use gba_core::video::{DISPLAY_HEIGHT, DISPLAY_WIDTH, FRAME_CYCLES};

/// Version of the session interface itself. Bumped when the host-facing
/// surface changes incompatibly.
pub const API_VERSION: u32 = 1;

/// Library identification a host can show and route content by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemInfo {
    pub library_name: &'static str,
    pub library_version: &'static str,
    /// Accepted file extensions, lowercase, pipe separated.
    pub valid_extensions: &'static str,
    /// Whether load requires a filesystem path instead of a byte buffer.
    pub need_fullpath: bool,
    /// Whether archived content must be handed over unextracted.
    pub block_extract: bool,
}

/// Frame dimensions and display aspect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub base_width: u32,
    pub base_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub aspect_ratio: f32,
}

/// Output cadence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Visible frames per second.
    pub fps: f64,
    /// Audio sample pairs per second.
    pub sample_rate: f64,
}

/// Everything a host needs to set up video and audio output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvInfo {
    pub geometry: Geometry,
    pub timing: Timing,
}

/// Television region classes hosts sort output timing into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Ntsc,
    Pal,
}

/// The session interface version.
pub fn api_version() -> u32 {
    API_VERSION
}

pub fn system_info() -> SystemInfo {
    SystemInfo {
        library_name: "gba-retro",
        library_version: env!("CARGO_PKG_VERSION"),
        valid_extensions: "gba",
        need_fullpath: false,
        block_extract: false,
    }
}

/// Geometry and timing, both derived from hardware constants. The frame
/// rate is the master clock over the cycles in one full display refresh.
pub fn av_info() -> AvInfo {
    AvInfo {
        geometry: Geometry {
            base_width: DISPLAY_WIDTH,
            base_height: DISPLAY_HEIGHT,
            max_width: DISPLAY_WIDTH,
            max_height: DISPLAY_HEIGHT,
            aspect_ratio: DISPLAY_WIDTH as f32 / DISPLAY_HEIGHT as f32,
        },
        timing: Timing {
            fps: f64::from(CLOCK_HZ) / f64::from(FRAME_CYCLES),
            sample_rate: f64::from(SAMPLE_RATE),
        },
    }
}

/// The handheld is region free. Hosts that must pick a class get the 60 Hz
/// one, matching the display's near-60 refresh.
pub fn region() -> Region {
    Region::Ntsc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_is_the_lcd_panel() {
        let info = av_info();
        assert_eq!(info.geometry.base_width, 240);
        assert_eq!(info.geometry.base_height, 160);
        assert_eq!(info.geometry.max_width, 240);
        assert_eq!(info.geometry.max_height, 160);
        assert!((info.geometry.aspect_ratio - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_timing_derives_from_the_clock() {
        let info = av_info();
        assert!((info.timing.fps - 59.727_5).abs() < 0.001);
        assert_eq!(info.timing.sample_rate, 32768.0);
    }

    #[test]
    fn test_system_info_accepts_buffers() {
        let info = system_info();
        assert_eq!(info.library_name, "gba-retro");
        assert_eq!(info.valid_extensions, "gba");
        assert!(!info.need_fullpath);
        assert!(!info.block_extract);
    }

    #[test]
    fn test_region_is_fixed() {
        assert_eq!(region(), Region::Ntsc);
    }
}
