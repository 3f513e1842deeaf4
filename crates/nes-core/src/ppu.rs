//! PPU (Picture Processing Unit) implementation
//!
//! Frame-at-a-time renderer for the 2C02. Registers and video memory live in
//! [`PpuBus`]; [`Ppu::render_frame`] walks the 240 visible scanlines and
//! composes the background layer with up to 8 sprites per line.
//! Hardware parameters:
//! - 256x240 visible pixels, 32x30 tiles of 8x8
//! - 2 bits per pixel from two bit-planes, 4 palettes of 3 colours + backdrop
//!   for the background, 4 more for sprites
//! - Sprites: 64 OAM entries, 8x8 or 8x16, at most 8 per scanline
//!
//! Scanline timing (dots, mid-frame register writes) is not modelled: the
//! whole frame is drawn from the register state at render time.

mod palette;
mod ppubus;
mod registers;

pub use palette::{system_color, SYSTEM_PALETTE};
pub use ppubus::{mirror_nametable, PpuBus, OAM_SIZE, PALETTE_TABLE_START, VRAM_SIZE};
pub use registers::{PpuCtrl, PpuMask, PpuStatus};

use crate::cartridge::Cartridge;
use crate::framebuffer::{Framebuffer, Rgb};
use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Sprites the PPU can show on one scanline
pub const MAX_SPRITES_PER_LINE: usize = 8;

/// Sprite attribute byte (OAM byte 2)
const SPR_ATTR_PALETTE: u8 = 0b0000_0011;
const SPR_ATTR_BEHIND_BG: u8 = 0b0010_0000;
const SPR_ATTR_FLIP_H: u8 = 0b0100_0000;
const SPR_ATTR_FLIP_V: u8 = 0b1000_0000;

/// One OAM entry selected for the current scanline
#[derive(Debug, Clone, Copy)]
struct LineSprite {
    /// Index in OAM (0-63); sprite 0 drives the hit flag
    index: usize,
    x: u8,
    /// Low/high pattern bytes for this line, already flipped vertically
    pattern_lo: u8,
    pattern_hi: u8,
    attributes: u8,
}

impl LineSprite {
    /// 2-bit colour at `offset` pixels from the sprite's left edge
    fn pixel(&self, offset: usize) -> u8 {
        let bit = if self.attributes & SPR_ATTR_FLIP_H != 0 {
            offset
        } else {
            7 - offset
        };
        (((self.pattern_hi >> bit) & 1) << 1) | ((self.pattern_lo >> bit) & 1)
    }
}

/// Frame renderer. Holds the output image and the sprite flags found while
/// drawing it; no other state carries over between frames.
#[derive(Debug, Clone, Default)]
pub struct Ppu {
    framebuffer: Framebuffer,
    sprite_zero_hit: bool,
    sprite_overflow: bool,
}

impl Ppu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Last rendered frame
    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Sprite 0 overlapped an opaque background pixel in the last frame
    pub fn sprite_zero_hit(&self) -> bool {
        self.sprite_zero_hit
    }

    /// More than 8 sprites fell on one scanline in the last frame
    pub fn sprite_overflow(&self) -> bool {
        self.sprite_overflow
    }

    /// Render a complete frame from the current PPU memory and registers.
    ///
    /// Every pixel is overwritten, so rendering unchanged memory twice gives
    /// identical frames.
    pub fn render_frame(&mut self, bus: &PpuBus, cartridge: &Cartridge) -> &Framebuffer {
        self.sprite_zero_hit = false;
        self.sprite_overflow = false;

        if !bus.mask.rendering_enabled() {
            let backdrop = self.resolve_color(bus, cartridge, PALETTE_TABLE_START);
            self.framebuffer.fill(backdrop);
            return &self.framebuffer;
        }

        let mut line_sprites = Vec::with_capacity(MAX_SPRITES_PER_LINE);
        for y in 0..SCREEN_HEIGHT {
            self.evaluate_sprites(bus, cartridge, y, &mut line_sprites);
            self.render_scanline(bus, cartridge, y, &line_sprites);
        }

        &self.framebuffer
    }

    /// Pick the first 8 sprites in OAM order that cover scanline `y` and
    /// prefetch their pattern bytes for that line.
    fn evaluate_sprites(
        &mut self,
        bus: &PpuBus,
        cartridge: &Cartridge,
        y: usize,
        out: &mut Vec<LineSprite>,
    ) {
        out.clear();
        let height = bus.ctrl.spr_height();
        let oam = bus.oam();

        for (index, entry) in oam.chunks_exact(4).enumerate() {
            // Sprites are drawn one line below their OAM Y
            let top = entry[0] as usize + 1;
            if y < top || y >= top + height {
                continue;
            }
            if out.len() == MAX_SPRITES_PER_LINE {
                self.sprite_overflow = true;
                break;
            }

            let tile = entry[1];
            let attributes = entry[2];
            let mut row = y - top;
            if attributes & SPR_ATTR_FLIP_V != 0 {
                row = height - 1 - row;
            }

            let address = if height == 16 {
                // 8x16: bit 0 of the tile index picks the pattern table
                let table = u16::from(tile & 1) * 0x1000;
                let tile = u16::from(tile & 0xFE) + (row / 8) as u16;
                table + tile * 16 + (row % 8) as u16
            } else {
                bus.ctrl.spr_pattern_addr() + u16::from(tile) * 16 + row as u16
            };

            out.push(LineSprite {
                index,
                x: entry[3],
                pattern_lo: bus.read(address, cartridge),
                pattern_hi: bus.read(address + 8, cartridge),
                attributes,
            });
        }
    }

    fn render_scanline(
        &mut self,
        bus: &PpuBus,
        cartridge: &Cartridge,
        y: usize,
        sprites: &[LineSprite],
    ) {
        let mask = bus.mask;

        for x in 0..SCREEN_WIDTH {
            let (bg_pixel, bg_palette) = if mask.show_bg() && (x >= 8 || mask.show_bg_left()) {
                background_pixel(bus, cartridge, x, y)
            } else {
                (0, 0)
            };

            let sprite = if mask.show_spr() && (x >= 8 || mask.show_spr_left()) {
                sprites.iter().find_map(|sprite| {
                    let offset = x.checked_sub(sprite.x as usize)?;
                    if offset >= 8 {
                        return None;
                    }
                    let pixel = sprite.pixel(offset);
                    (pixel != 0).then_some((sprite, pixel))
                })
            } else {
                None
            };

            let address = match sprite {
                Some((sprite, spr_pixel)) => {
                    if bg_pixel != 0 && sprite.index == 0 && x != 255 {
                        self.sprite_zero_hit = true;
                    }
                    if bg_pixel != 0 && sprite.attributes & SPR_ATTR_BEHIND_BG != 0 {
                        PALETTE_TABLE_START + u16::from(bg_palette) * 4 + u16::from(bg_pixel)
                    } else {
                        let palette = sprite.attributes & SPR_ATTR_PALETTE;
                        PALETTE_TABLE_START + 0x10 + u16::from(palette) * 4 + u16::from(spr_pixel)
                    }
                }
                None if bg_pixel != 0 => {
                    PALETTE_TABLE_START + u16::from(bg_palette) * 4 + u16::from(bg_pixel)
                }
                // Transparent everywhere: universal background colour
                None => PALETTE_TABLE_START,
            };

            let color = self.resolve_color(bus, cartridge, address);
            self.framebuffer.set_pixel(x, y, color);
        }
    }

    fn resolve_color(&self, bus: &PpuBus, cartridge: &Cartridge, address: u16) -> Rgb {
        let mut index = bus.read(address, cartridge);
        if bus.mask.greyscale() {
            index &= 0x30;
        }
        system_color(index)
    }
}

/// Background pixel at screen (x, y): 2-bit colour and attribute palette.
///
/// The four nametables form a 512x480 plane; PPUCTRL picks the starting
/// quadrant and PPUSCROLL offsets into it, wrapping at the edges.
fn background_pixel(bus: &PpuBus, cartridge: &Cartridge, x: usize, y: usize) -> (u8, u8) {
    let (scroll_x, scroll_y) = bus.scroll();
    let base = bus.ctrl.base_nametable() as usize;

    let world_x = (x + scroll_x as usize + (base & 1) * SCREEN_WIDTH) % (SCREEN_WIDTH * 2);
    let world_y = (y + scroll_y as usize + (base >> 1) * SCREEN_HEIGHT) % (SCREEN_HEIGHT * 2);

    let table = world_x / SCREEN_WIDTH + (world_y / SCREEN_HEIGHT) * 2;
    let tile_x = (world_x % SCREEN_WIDTH) / 8;
    let tile_y = (world_y % SCREEN_HEIGHT) / 8;
    let fine_x = world_x % 8;
    let fine_y = world_y % 8;

    let table_base = 0x2000 + (table as u16) * 0x400;
    let tile = bus.read(table_base + (tile_y * 32 + tile_x) as u16, cartridge);

    let pattern = bus.ctrl.bg_pattern_addr() + u16::from(tile) * 16 + fine_y as u16;
    let lo = bus.read(pattern, cartridge);
    let hi = bus.read(pattern + 8, cartridge);
    let bit = 7 - fine_x;
    let pixel = (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1);

    // Each attribute byte covers 4x4 tiles, two bits per 2x2 quadrant
    let attr = bus.read(
        table_base + 0x3C0 + ((tile_y / 4) * 8 + tile_x / 4) as u16,
        cartridge,
    );
    let shift = ((tile_y & 2) << 1) | (tile_x & 2);
    let palette = (attr >> shift) & 0x03;

    (pixel, palette)
}
