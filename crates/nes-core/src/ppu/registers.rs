//! PPU register bit layouts ($2000, $2001, $2002)

use bitflags::bitflags;

const PATTERN_TABLE_0_ADDR: u16 = 0x0000;
const PATTERN_TABLE_1_ADDR: u16 = 0x1000;

bitflags! {
    /// $2000 - PPUCTRL
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuCtrl: u8 {
        const NAME_TABLE_X     = 0b0000_0001;
        const NAME_TABLE_Y     = 0b0000_0010;
        const VRAM_ADDR_INC    = 0b0000_0100;
        const SPR_PATTERN_ADDR = 0b0000_1000;
        const BG_PATTERN_ADDR  = 0b0001_0000;
        const SPR_SIZE         = 0b0010_0000;
        const MASTER_SELECT    = 0b0100_0000;
        const NMI_ENABLED      = 0b1000_0000;
    }

    /// $2001 - PPUMASK
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuMask: u8 {
        const GREYSCALE     = 0b0000_0001;
        const SHOW_BG_LEFT  = 0b0000_0010;
        const SHOW_SPR_LEFT = 0b0000_0100;
        const SHOW_BG       = 0b0000_1000;
        const SHOW_SPR      = 0b0001_0000;
        const EMP_RED       = 0b0010_0000;
        const EMP_GREEN     = 0b0100_0000;
        const EMP_BLUE      = 0b1000_0000;
    }

    /// $2002 - PPUSTATUS
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PpuStatus: u8 {
        const SPR_OVERFLOW = 0b0010_0000;
        const SPR_0_HIT    = 0b0100_0000;
        const IN_VBLANK    = 0b1000_0000;
    }
}

impl PpuCtrl {
    #[inline]
    pub fn vram_addr_inc(&self) -> u16 {
        if self.contains(PpuCtrl::VRAM_ADDR_INC) {
            32
        } else {
            1
        }
    }

    /// Base nametable index (0-3)
    #[inline]
    pub fn base_nametable(&self) -> u8 {
        self.bits() & 0b11
    }

    #[inline]
    pub fn spr_pattern_addr(&self) -> u16 {
        if self.contains(PpuCtrl::SPR_PATTERN_ADDR) {
            PATTERN_TABLE_1_ADDR
        } else {
            PATTERN_TABLE_0_ADDR
        }
    }

    #[inline]
    pub fn bg_pattern_addr(&self) -> u16 {
        if self.contains(PpuCtrl::BG_PATTERN_ADDR) {
            PATTERN_TABLE_1_ADDR
        } else {
            PATTERN_TABLE_0_ADDR
        }
    }

    #[inline]
    pub fn spr_height(&self) -> usize {
        if self.contains(PpuCtrl::SPR_SIZE) {
            16
        } else {
            8
        }
    }

    #[inline]
    pub fn nmi_enabled(&self) -> bool {
        self.contains(PpuCtrl::NMI_ENABLED)
    }
}

impl PpuMask {
    #[inline]
    pub fn greyscale(&self) -> bool {
        self.contains(PpuMask::GREYSCALE)
    }

    #[inline]
    pub fn show_bg_left(&self) -> bool {
        self.contains(PpuMask::SHOW_BG_LEFT)
    }

    #[inline]
    pub fn show_spr_left(&self) -> bool {
        self.contains(PpuMask::SHOW_SPR_LEFT)
    }

    #[inline]
    pub fn show_bg(&self) -> bool {
        self.contains(PpuMask::SHOW_BG)
    }

    #[inline]
    pub fn show_spr(&self) -> bool {
        self.contains(PpuMask::SHOW_SPR)
    }

    #[inline]
    pub fn rendering_enabled(&self) -> bool {
        self.show_bg() || self.show_spr()
    }
}
