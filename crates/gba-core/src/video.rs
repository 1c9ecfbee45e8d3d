//! LCD timing (scanline/frame state machine) and the renderer seam
//!
//! GBA video timing, in 16.78 MHz CPU cycles:
//! - one scanline is 1006 cycles of draw plus 226 of H-blank, 1232 total
//! - a frame is 160 visible scanlines followed by 68 V-blank lines, 228 total
//! - one frame is therefore 280896 cycles (~59.727 Hz)
//!
//! The unit advances VCOUNT and the DISPSTAT status bits in the bus I/O
//! file, calls the renderer once per visible scanline at H-blank entry, and
//! finishes the frame at V-blank entry. The frame counter increments exactly
//! once per completed frame, at V-blank entry.

use crate::bus::{SystemBus, REG_DISPSTAT, REG_VCOUNT};

/// Visible display width in pixels
pub const DISPLAY_WIDTH: u32 = 240;
/// Visible display height in pixels
pub const DISPLAY_HEIGHT: u32 = 160;
/// Cycles of visible draw time per scanline
pub const HDRAW_CYCLES: u32 = 1006;
/// Cycles of H-blank per scanline
pub const HBLANK_CYCLES: u32 = 226;
/// Total cycles per scanline
pub const LINE_CYCLES: u32 = HDRAW_CYCLES + HBLANK_CYCLES;
/// Visible scanlines per frame
pub const VISIBLE_LINES: u16 = 160;
/// Total scanlines per frame, V-blank included
pub const TOTAL_LINES: u16 = 228;
/// Total cycles per frame
pub const FRAME_CYCLES: u32 = LINE_CYCLES * TOTAL_LINES as u32;
/// The V-blank status flag drops on the final line of the frame.
const VBLANK_CLEAR_LINE: u16 = 227;

/// DISPSTAT status and enable bits.
pub const DISPSTAT_IN_VBLANK: u16 = 1 << 0;
pub const DISPSTAT_IN_HBLANK: u16 = 1 << 1;
pub const DISPSTAT_VCOUNT_MATCH: u16 = 1 << 2;
pub const DISPSTAT_VBLANK_IRQ: u16 = 1 << 3;
pub const DISPSTAT_HBLANK_IRQ: u16 = 1 << 4;
pub const DISPSTAT_VCOUNT_IRQ: u16 = 1 << 5;

/// Interrupt-pending bits in the IF register.
pub const IRQ_VBLANK: u16 = 1 << 0;
pub const IRQ_HBLANK: u16 = 1 << 1;
pub const IRQ_VCOUNT: u16 = 1 << 2;

/// Scanline renderer driven by the video timing unit.
///
/// The timing unit owns when to draw; implementations own how. A renderer
/// keeps its own output buffer and exposes it through [`VideoRenderer::pixels`].
pub trait VideoRenderer {
    /// Clears renderer state for a fresh machine.
    fn reset(&mut self);

    /// Renders one visible scanline. Called at H-blank entry with the bus
    /// frozen for the line.
    fn draw_scanline(&mut self, line: u16, bus: &SystemBus);

    /// Marks the end of a frame. Called at V-blank entry.
    fn finish_frame(&mut self);

    /// Completed frame pixels and the buffer stride in pixels.
    fn pixels(&self) -> (&[u32], usize);
}

/// Video timing state.
#[derive(Debug, Clone)]
pub struct Video {
    /// Cycles accumulated within the current scanline
    line_cycles: u32,
    /// Completed frames since reset
    frame_counter: u32,
}

impl Video {
    pub fn new() -> Self {
        Self {
            line_cycles: 0,
            frame_counter: 0,
        }
    }

    /// Restarts timing at the top of frame 0.
    pub fn reset(&mut self) {
        self.line_cycles = 0;
        self.frame_counter = 0;
    }

    /// Completed frames since reset or state restore.
    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub(crate) fn line_cycles(&self) -> u32 {
        self.line_cycles
    }

    pub(crate) fn restore_timing(&mut self, line_cycles: u32, frame_counter: u32) {
        self.line_cycles = line_cycles;
        self.frame_counter = frame_counter;
    }

    /// Advances the LCD by `cycles`, publishing VCOUNT/DISPSTAT through the
    /// bus and driving the renderer at the line and frame boundaries.
    pub fn tick(&mut self, cycles: u32, bus: &mut SystemBus, renderer: &mut dyn VideoRenderer) {
        self.line_cycles += cycles;
        loop {
            let dispstat = bus.io_value(REG_DISPSTAT);
            if dispstat & DISPSTAT_IN_HBLANK == 0 {
                if self.line_cycles < HDRAW_CYCLES {
                    break;
                }
                self.enter_hblank(bus, renderer, dispstat);
            } else {
                if self.line_cycles < LINE_CYCLES {
                    break;
                }
                self.line_cycles -= LINE_CYCLES;
                self.advance_line(bus, renderer, dispstat);
            }
        }
    }

    fn enter_hblank(
        &mut self,
        bus: &mut SystemBus,
        renderer: &mut dyn VideoRenderer,
        dispstat: u16,
    ) {
        let line = bus.io_value(REG_VCOUNT);
        bus.set_io_value(REG_DISPSTAT, dispstat | DISPSTAT_IN_HBLANK);
        if line < VISIBLE_LINES {
            renderer.draw_scanline(line, bus);
        }
        if dispstat & DISPSTAT_HBLANK_IRQ != 0 {
            bus.raise_interrupt(IRQ_HBLANK);
        }
    }

    fn advance_line(
        &mut self,
        bus: &mut SystemBus,
        renderer: &mut dyn VideoRenderer,
        dispstat: u16,
    ) {
        let mut line = bus.io_value(REG_VCOUNT) + 1;
        if line == TOTAL_LINES {
            line = 0;
        }
        let mut dispstat = dispstat & !DISPSTAT_IN_HBLANK;

        if line == VISIBLE_LINES {
            dispstat |= DISPSTAT_IN_VBLANK;
            renderer.finish_frame();
            self.frame_counter = self.frame_counter.wrapping_add(1);
            if dispstat & DISPSTAT_VBLANK_IRQ != 0 {
                bus.raise_interrupt(IRQ_VBLANK);
            }
        } else if line == VBLANK_CLEAR_LINE {
            dispstat &= !DISPSTAT_IN_VBLANK;
        }

        let target = dispstat >> 8;
        if line == target {
            dispstat |= DISPSTAT_VCOUNT_MATCH;
            if dispstat & DISPSTAT_VCOUNT_IRQ != 0 {
                bus.raise_interrupt(IRQ_VCOUNT);
            }
        } else {
            dispstat &= !DISPSTAT_VCOUNT_MATCH;
        }

        bus.set_io_value(REG_VCOUNT, line);
        bus.set_io_value(REG_DISPSTAT, dispstat);
    }
}

impl Default for Video {
    fn default() -> Self {
        Self::new()
    }
}
