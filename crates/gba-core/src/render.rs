//! Software renderer for the bitmap display modes
//!
//! Renders modes 3 (15-bit direct color), 4 (8-bit paletted, double
//! buffered) and 5 (15-bit direct color, 160x128, double buffered) into an
//! XRGB8888 buffer with a fixed 256-pixel row stride. The tile-based modes
//! 0-2 fall back to the backdrop color; selecting one is reported at the
//! register write. Sprites and windowing are not rendered.

use crate::bus::{SystemBus, REG_DISPCNT};
use crate::video::{VideoRenderer, DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// Output rows are padded to this many pixels, 1024 bytes per row.
pub const OUTPUT_BUFFER_STRIDE: usize = 256;

/// Width of the mode 5 bitmap in pixels
const MODE5_WIDTH: u32 = 160;
/// Height of the mode 5 bitmap in pixels
const MODE5_HEIGHT: u32 = 128;
/// Byte offset of the second bitmap page in VRAM
const PAGE_OFFSET: usize = 0xA000;

const DISPCNT_PAGE_SELECT: u16 = 1 << 4;
const DISPCNT_FORCED_BLANK: u16 = 1 << 7;
const DISPCNT_BG2_ENABLE: u16 = 1 << 10;

/// Expands a 15-bit BGR555 color to XRGB8888.
pub fn rgb555_to_xrgb8888(color: u16) -> u32 {
    let r = u32::from(color) & 0x1F;
    let g = (u32::from(color) >> 5) & 0x1F;
    let b = (u32::from(color) >> 10) & 0x1F;
    let expand = |c: u32| (c << 3) | (c >> 2);
    (expand(r) << 16) | (expand(g) << 8) | expand(b)
}

/// CPU renderer writing XRGB8888 rows at a fixed stride.
pub struct SoftwareRenderer {
    /// One frame of pixels, `OUTPUT_BUFFER_STRIDE * DISPLAY_HEIGHT` long
    buffer: Vec<u32>,
}

impl SoftwareRenderer {
    pub fn new() -> Self {
        Self {
            buffer: vec![0; OUTPUT_BUFFER_STRIDE * DISPLAY_HEIGHT as usize],
        }
    }

    /// Backdrop color: palette entry 0.
    fn backdrop(palette: &[u8]) -> u32 {
        rgb555_to_xrgb8888(u16::from_le_bytes([palette[0], palette[1]]))
    }

    fn row_mut(&mut self, line: u16) -> &mut [u32] {
        let start = line as usize * OUTPUT_BUFFER_STRIDE;
        &mut self.buffer[start..start + DISPLAY_WIDTH as usize]
    }
}

impl VideoRenderer for SoftwareRenderer {
    fn reset(&mut self) {
        self.buffer.fill(0);
    }

    fn draw_scanline(&mut self, line: u16, bus: &SystemBus) {
        let dispcnt = bus.io_value(REG_DISPCNT);
        let vram = bus.vram();
        let palette = bus.palette_ram();
        let row = self.row_mut(line);

        if dispcnt & DISPCNT_FORCED_BLANK != 0 {
            row.fill(0x00FF_FFFF);
            return;
        }

        let backdrop = Self::backdrop(palette);
        if dispcnt & DISPCNT_BG2_ENABLE == 0 {
            row.fill(backdrop);
            return;
        }

        match dispcnt & 0x7 {
            3 => {
                let base = line as usize * DISPLAY_WIDTH as usize * 2;
                for (x, pixel) in row.iter_mut().enumerate() {
                    let offset = base + x * 2;
                    let color = u16::from_le_bytes([vram[offset], vram[offset + 1]]);
                    *pixel = rgb555_to_xrgb8888(color);
                }
            }
            4 => {
                let page = if dispcnt & DISPCNT_PAGE_SELECT != 0 {
                    PAGE_OFFSET
                } else {
                    0
                };
                let base = page + line as usize * DISPLAY_WIDTH as usize;
                for (x, pixel) in row.iter_mut().enumerate() {
                    let index = vram[base + x] as usize * 2;
                    let color = u16::from_le_bytes([palette[index], palette[index + 1]]);
                    *pixel = rgb555_to_xrgb8888(color);
                }
            }
            5 => {
                let page = if dispcnt & DISPCNT_PAGE_SELECT != 0 {
                    PAGE_OFFSET
                } else {
                    0
                };
                if u32::from(line) >= MODE5_HEIGHT {
                    row.fill(backdrop);
                    return;
                }
                let base = page + line as usize * MODE5_WIDTH as usize * 2;
                for (x, pixel) in row.iter_mut().enumerate() {
                    if (x as u32) < MODE5_WIDTH {
                        let offset = base + x * 2;
                        let color = u16::from_le_bytes([vram[offset], vram[offset + 1]]);
                        *pixel = rgb555_to_xrgb8888(color);
                    } else {
                        *pixel = backdrop;
                    }
                }
            }
            // Tile modes are not rendered; the backdrop shows through.
            _ => row.fill(backdrop),
        }
    }

    fn finish_frame(&mut self) {}

    fn pixels(&self) -> (&[u32], usize) {
        (&self.buffer, OUTPUT_BUFFER_STRIDE)
    }
}

impl Default for SoftwareRenderer {
    fn default() -> Self {
        Self::new()
    }
}
