//! 2C02 system palette: 64 colour indices to RGB.
//!
//! Entries $0D-$0F, $1D-$1F, $2E-$2F and $3E-$3F are black on hardware.

use crate::framebuffer::Rgb;

#[rustfmt::skip]
pub const SYSTEM_PALETTE: [Rgb; 64] = [
    // $00
    Rgb(0x7C, 0x7C, 0x7C), Rgb(0x00, 0x00, 0xFC), Rgb(0x00, 0x00, 0xBC), Rgb(0x44, 0x28, 0xBC),
    Rgb(0x94, 0x00, 0x84), Rgb(0xA8, 0x00, 0x20), Rgb(0xA8, 0x10, 0x00), Rgb(0x88, 0x14, 0x00),
    Rgb(0x50, 0x30, 0x00), Rgb(0x00, 0x78, 0x00), Rgb(0x00, 0x68, 0x00), Rgb(0x00, 0x58, 0x00),
    Rgb(0x00, 0x40, 0x58), Rgb(0x00, 0x00, 0x00), Rgb(0x00, 0x00, 0x00), Rgb(0x00, 0x00, 0x00),
    // $10
    Rgb(0xBC, 0xBC, 0xBC), Rgb(0x00, 0x78, 0xF8), Rgb(0x00, 0x58, 0xF8), Rgb(0x68, 0x44, 0xFC),
    Rgb(0xD8, 0x00, 0xCC), Rgb(0xE4, 0x00, 0x58), Rgb(0xF8, 0x38, 0x00), Rgb(0xE4, 0x5C, 0x10),
    Rgb(0xAC, 0x7C, 0x00), Rgb(0x00, 0xB8, 0x00), Rgb(0x00, 0xA8, 0x00), Rgb(0x00, 0xA8, 0x44),
    Rgb(0x00, 0x88, 0x88), Rgb(0x00, 0x00, 0x00), Rgb(0x00, 0x00, 0x00), Rgb(0x00, 0x00, 0x00),
    // $20
    Rgb(0xF8, 0xF8, 0xF8), Rgb(0x3C, 0xBC, 0xFC), Rgb(0x68, 0x88, 0xFC), Rgb(0x98, 0x78, 0xF8),
    Rgb(0xF8, 0x78, 0xF8), Rgb(0xF8, 0x58, 0x98), Rgb(0xF8, 0x78, 0x58), Rgb(0xFC, 0xA0, 0x44),
    Rgb(0xF8, 0xB8, 0x00), Rgb(0xB8, 0xF8, 0x18), Rgb(0x58, 0xD8, 0x54), Rgb(0x58, 0xF8, 0x98),
    Rgb(0x00, 0xE8, 0xD8), Rgb(0x78, 0x78, 0x78), Rgb(0x00, 0x00, 0x00), Rgb(0x00, 0x00, 0x00),
    // $30
    Rgb(0xFC, 0xFC, 0xFC), Rgb(0xA4, 0xE4, 0xFC), Rgb(0xB8, 0xB8, 0xF8), Rgb(0xD8, 0xB8, 0xF8),
    Rgb(0xF8, 0xB8, 0xF8), Rgb(0xF8, 0xA4, 0xC0), Rgb(0xF0, 0xD0, 0xB0), Rgb(0xFC, 0xE0, 0xA8),
    Rgb(0xF8, 0xD8, 0x78), Rgb(0xD8, 0xF8, 0x78), Rgb(0xB8, 0xF8, 0xB8), Rgb(0xB8, 0xF8, 0xD8),
    Rgb(0x00, 0xFC, 0xFC), Rgb(0xF8, 0xD8, 0xF8), Rgb(0x00, 0x00, 0x00), Rgb(0x00, 0x00, 0x00),
];

/// RGB for a palette RAM value (upper two bits ignored)
#[inline]
pub fn system_color(index: u8) -> Rgb {
    SYSTEM_PALETTE[(index & 0x3F) as usize]
}
