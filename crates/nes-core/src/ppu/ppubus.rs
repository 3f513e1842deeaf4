//! PPU-side memory and the CPU-facing register file.
//!
//! PPU address space (14 bits):
//! $0000-$1FFF - Pattern tables (cartridge CHR via the mapper)
//! $2000-$2FFF - Nametables (2KB console VRAM, or 4KB on four-screen boards)
//! $3000-$3EFF - Mirror of $2000-$2EFF
//! $3F00-$3F1F - Palette RAM ($3F10/$14/$18/$1C mirror $3F00/$04/$08/$0C)
//! $3F20-$3FFF - Mirrors of $3F00-$3F1F

use crate::cartridge::{Cartridge, Mirroring};

use super::registers::{PpuCtrl, PpuMask, PpuStatus};

pub const PALETTE_TABLE_START: u16 = 0x3F00;

/// Nametable storage: four 1KB pages so four-screen boards fit
pub const VRAM_SIZE: usize = 0x1000;
const NAME_TABLE_SIZE: usize = 0x400;
pub const PALETTE_TABLE_SIZE: usize = 0x20;
pub const OAM_SIZE: usize = 0x100;

/// Map a nametable address ($2000-$3EFF) to an offset into VRAM
pub fn mirror_nametable(address: u16, mirroring: Mirroring) -> usize {
    let offset = address as usize & 0x0FFF;
    let table = offset / NAME_TABLE_SIZE;
    let page = match mirroring {
        Mirroring::Horizontal => table / 2,
        Mirroring::Vertical => table & 1,
        Mirroring::SingleScreenLower => 0,
        Mirroring::SingleScreenUpper => 1,
        Mirroring::FourScreen => table,
    };
    page * NAME_TABLE_SIZE + (offset & (NAME_TABLE_SIZE - 1))
}

#[inline]
fn palette_index(address: u16) -> usize {
    let index = address as usize & 0x1F;
    if index >= 0x10 && index & 0x03 == 0 {
        index - 0x10
    } else {
        index
    }
}

/// PPU memory plus registers $2000-$2007
#[derive(Debug, Clone)]
pub struct PpuBus {
    vram: [u8; VRAM_SIZE],
    palette_table: [u8; PALETTE_TABLE_SIZE],
    oam: [u8; OAM_SIZE],

    pub ctrl: PpuCtrl,
    pub mask: PpuMask,
    pub status: PpuStatus,
    oam_addr: u8,

    scroll_x: u8,
    scroll_y: u8,
    vram_addr: u16,
    /// Shared first/second write toggle for $2005 and $2006
    write_latch: bool,
    /// PPUDATA read buffer
    data_buffer: u8,
}

impl Default for PpuBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PpuBus {
    pub fn new() -> Self {
        let mut palette_table = [0; PALETTE_TABLE_SIZE];
        // Power-on palette: entry i holds colour i within the first row of
        // the system palette
        for (i, entry) in palette_table.iter_mut().enumerate() {
            *entry = (i & 0x0F) as u8;
        }

        Self {
            vram: [0; VRAM_SIZE],
            palette_table,
            oam: [0; OAM_SIZE],
            ctrl: PpuCtrl::empty(),
            mask: PpuMask::empty(),
            status: PpuStatus::empty(),
            oam_addr: 0,
            scroll_x: 0,
            scroll_y: 0,
            vram_addr: 0,
            write_latch: false,
            data_buffer: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// CPU read of register `$2000 + (address & 7)`. PPUSTATUS, OAMDATA and
    /// PPUDATA reads have side effects.
    pub fn cpu_read_reg(&mut self, address: u16, cartridge: &Cartridge) -> u8 {
        match address & 0x0007 {
            // $2002 - PPUSTATUS
            2 => {
                let status = self.status.bits();
                self.status.remove(PpuStatus::IN_VBLANK);
                self.write_latch = false;
                status
            }
            // $2004 - OAMDATA
            4 => self.oam[self.oam_addr as usize],
            // $2007 - PPUDATA
            7 => {
                let address = self.vram_addr & 0x3FFF;
                let value = if address >= PALETTE_TABLE_START {
                    // Palette reads are immediate; the buffer picks up the
                    // nametable byte underneath
                    self.data_buffer = self.read(address - 0x1000, cartridge);
                    self.read(address, cartridge)
                } else {
                    let buffered = self.data_buffer;
                    self.data_buffer = self.read(address, cartridge);
                    buffered
                };
                self.vram_addr = self.vram_addr.wrapping_add(self.ctrl.vram_addr_inc()) & 0x3FFF;
                value
            }
            // Write-only registers read as open bus
            _ => 0,
        }
    }

    /// Register read without side effects (debuggers)
    pub fn cpu_peek_reg(&self, address: u16, cartridge: &Cartridge) -> u8 {
        match address & 0x0007 {
            2 => self.status.bits(),
            4 => self.oam[self.oam_addr as usize],
            7 => {
                let address = self.vram_addr & 0x3FFF;
                if address >= PALETTE_TABLE_START {
                    self.read(address, cartridge)
                } else {
                    self.data_buffer
                }
            }
            _ => 0,
        }
    }

    /// CPU write of register `$2000 + (address & 7)`
    pub fn cpu_write_reg(&mut self, address: u16, value: u8, cartridge: &mut Cartridge) {
        match address & 0x0007 {
            // $2000 - PPUCTRL
            0 => self.ctrl = PpuCtrl::from_bits_truncate(value),
            // $2001 - PPUMASK
            1 => self.mask = PpuMask::from_bits_truncate(value),
            // $2002 - PPUSTATUS (read only)
            2 => {}
            // $2003 - OAMADDR
            3 => self.oam_addr = value,
            // $2004 - OAMDATA
            4 => {
                self.oam[self.oam_addr as usize] = value;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            // $2005 - PPUSCROLL
            5 => {
                if self.write_latch {
                    self.scroll_y = value;
                } else {
                    self.scroll_x = value;
                }
                self.write_latch = !self.write_latch;
            }
            // $2006 - PPUADDR, high byte first
            6 => {
                if self.write_latch {
                    self.vram_addr = (self.vram_addr & 0xFF00) | u16::from(value);
                } else {
                    self.vram_addr = (u16::from(value & 0x3F) << 8) | (self.vram_addr & 0x00FF);
                }
                self.write_latch = !self.write_latch;
            }
            // $2007 - PPUDATA
            _ => {
                self.write(self.vram_addr & 0x3FFF, value, cartridge);
                self.vram_addr = self.vram_addr.wrapping_add(self.ctrl.vram_addr_inc()) & 0x3FFF;
            }
        }
    }

    /// Read the PPU address space without side effects
    pub fn read(&self, address: u16, cartridge: &Cartridge) -> u8 {
        let address = address & 0x3FFF;
        match address {
            0x0000..=0x1FFF => cartridge.chr_read(address),
            0x2000..=0x3EFF => self.vram[mirror_nametable(address, cartridge.mirroring())],
            _ => self.palette_table[palette_index(address)] & 0x3F,
        }
    }

    pub fn write(&mut self, address: u16, value: u8, cartridge: &mut Cartridge) {
        let address = address & 0x3FFF;
        match address {
            0x0000..=0x1FFF => cartridge.chr_write(address, value),
            0x2000..=0x3EFF => {
                self.vram[mirror_nametable(address, cartridge.mirroring())] = value;
            }
            _ => self.palette_table[palette_index(address)] = value & 0x3F,
        }
    }

    /// OAM DMA: store one byte at the current OAM address and advance it
    pub fn dma_write(&mut self, value: u8) {
        self.oam[self.oam_addr as usize] = value;
        self.oam_addr = self.oam_addr.wrapping_add(1);
    }

    pub fn oam(&self) -> &[u8; OAM_SIZE] {
        &self.oam
    }

    pub fn oam_addr(&self) -> u8 {
        self.oam_addr
    }

    /// Current VRAM address (PPUADDR)
    pub fn vram_addr(&self) -> u16 {
        self.vram_addr
    }

    /// (x, y) written through PPUSCROLL
    pub fn scroll(&self) -> (u8, u8) {
        (self.scroll_x, self.scroll_y)
    }

    /// Pre-render line: vblank and sprite flags drop
    pub fn begin_frame(&mut self) {
        self.status
            .remove(PpuStatus::IN_VBLANK | PpuStatus::SPR_0_HIT | PpuStatus::SPR_OVERFLOW);
    }

    /// Line 241: raise vblank. Returns true when the CPU should take an NMI.
    pub fn enter_vblank(&mut self) -> bool {
        self.status.insert(PpuStatus::IN_VBLANK);
        self.ctrl.nmi_enabled()
    }

    /// Publish what the renderer found on this frame
    pub fn set_sprite_flags(&mut self, sprite_zero_hit: bool, sprite_overflow: bool) {
        self.status.set(PpuStatus::SPR_0_HIT, sprite_zero_hit);
        self.status.set(PpuStatus::SPR_OVERFLOW, sprite_overflow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_mirroring() {
        let m = Mirroring::Horizontal;
        assert_eq!(mirror_nametable(0x2000, m), mirror_nametable(0x2400, m));
        assert_eq!(mirror_nametable(0x2800, m), mirror_nametable(0x2C00, m));
        assert_ne!(mirror_nametable(0x2000, m), mirror_nametable(0x2800, m));
    }

    #[test]
    fn test_vertical_mirroring() {
        let m = Mirroring::Vertical;
        assert_eq!(mirror_nametable(0x2000, m), mirror_nametable(0x2800, m));
        assert_eq!(mirror_nametable(0x2412, m), mirror_nametable(0x2C12, m));
        assert_ne!(mirror_nametable(0x2000, m), mirror_nametable(0x2400, m));
    }

    #[test]
    fn test_single_screen_and_four_screen() {
        for address in [0x2000, 0x2400, 0x2800, 0x2C00] {
            assert_eq!(mirror_nametable(address, Mirroring::SingleScreenLower), 0);
            assert_eq!(mirror_nametable(address, Mirroring::SingleScreenUpper), 0x400);
        }
        assert_eq!(mirror_nametable(0x2C05, Mirroring::FourScreen), 0xC05);
    }

    #[test]
    fn test_upper_nametable_region_mirrors_lower() {
        let m = Mirroring::Vertical;
        assert_eq!(mirror_nametable(0x3123, m), mirror_nametable(0x2123, m));
    }

    #[test]
    fn test_palette_mirrors() {
        assert_eq!(palette_index(0x3F10), 0x00);
        assert_eq!(palette_index(0x3F14), 0x04);
        assert_eq!(palette_index(0x3F11), 0x11);
        assert_eq!(palette_index(0x3F20), 0x00);
    }
}
