//! Mapper 1 (MMC1): bank switching via a 5-bit serial shift register.
//!
//! Writes to $8000-$FFFF are the mapper's only control channel. Any write with
//! bit 7 set resets the shift register and forces PRG mode 3. Otherwise bit 0
//! is shifted in, LSB first; the fifth write latches the 5-bit value into the
//! register picked by address bits 13-14:
//!
//! | range       | register |
//! |-------------|----------|
//! | $8000-$9FFF | control: mirroring (0-1), PRG mode (2-3), CHR mode (4) |
//! | $A000-$BFFF | CHR bank 0 |
//! | $C000-$DFFF | CHR bank 1 |
//! | $E000-$FFFF | PRG bank (0-3), PRG RAM disable (4) |

use super::{wrap_bank, PRG_BANK_SIZE};
use crate::cartridge::Mirroring;

/// Control value at power-on and after a reset write: PRG mode 3
const CONTROL_POWER_ON: u8 = 0x0C;

const CHR_HALF_BANK_SIZE: usize = 0x1000;

/// MMC1 state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mmc1 {
    shift_register: u8,
    shift_count: u8,
    control: u8,
    chr_bank0: u8,
    chr_bank1: u8,
    prg_bank: u8,
}

impl Default for Mmc1 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mmc1 {
    pub fn new() -> Self {
        Self {
            shift_register: 0,
            shift_count: 0,
            control: CONTROL_POWER_ON,
            chr_bank0: 0,
            chr_bank1: 0,
            prg_bank: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Bits shifted in since the last latch (0..5)
    pub fn shift_count(&self) -> u8 {
        self.shift_count
    }

    pub fn shift_register(&self) -> u8 {
        self.shift_register
    }

    pub fn control(&self) -> u8 {
        self.control
    }

    pub fn chr_bank0(&self) -> u8 {
        self.chr_bank0
    }

    pub fn chr_bank1(&self) -> u8 {
        self.chr_bank1
    }

    pub fn prg_bank(&self) -> u8 {
        self.prg_bank
    }

    /// PRG bank mode from control bits 2-3: 0/1 = 32KB; 2 = $8000 fixed first;
    /// 3 = $C000 fixed last
    pub fn prg_mode(&self) -> u8 {
        (self.control >> 2) & 0b11
    }

    /// CHR bank mode from control bit 4: 0 = one 8KB bank, 1 = two 4KB banks
    pub fn chr_mode(&self) -> u8 {
        (self.control >> 4) & 0b1
    }

    pub fn prg_ram_enabled(&self) -> bool {
        self.prg_bank & 0x10 == 0
    }

    pub fn mirroring(&self, board: Mirroring) -> Mirroring {
        // Four-screen boards wire their own VRAM and ignore the mapper
        if board == Mirroring::FourScreen {
            return board;
        }
        match self.control & 0b11 {
            0 => Mirroring::SingleScreenLower,
            1 => Mirroring::SingleScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    pub fn prg_write(&mut self, address: u16, value: u8) {
        if value & 0x80 != 0 {
            self.shift_register = 0;
            self.shift_count = 0;
            self.control |= CONTROL_POWER_ON;
            return;
        }

        self.shift_register |= (value & 0x01) << self.shift_count;
        self.shift_count += 1;

        if self.shift_count < 5 {
            return;
        }

        let latched = self.shift_register & 0x1F;
        match (address >> 13) & 0b11 {
            0 => self.control = latched,
            1 => self.chr_bank0 = latched,
            2 => self.chr_bank1 = latched,
            _ => self.prg_bank = latched,
        }
        log::debug!(
            "MMC1: ${:04X} <- {:05b} (control={:05b} chr0={} chr1={} prg={})",
            address,
            latched,
            self.control,
            self.chr_bank0,
            self.chr_bank1,
            self.prg_bank
        );

        self.shift_register = 0;
        self.shift_count = 0;
    }

    fn prg_offset(&self, prg_len: usize, address: u16) -> usize {
        let bank_count = prg_len / PRG_BANK_SIZE;
        let upper_half = address >= 0xC000;
        let select = (self.prg_bank & 0x0F) as usize;

        let bank = match self.prg_mode() {
            0 | 1 => (select & !1) | usize::from(upper_half),
            2 => {
                if upper_half {
                    select
                } else {
                    0
                }
            }
            _ => {
                if upper_half {
                    bank_count.saturating_sub(1)
                } else {
                    select
                }
            }
        };

        wrap_bank(bank, bank_count) * PRG_BANK_SIZE + (address as usize & 0x3FFF)
    }

    pub fn prg_read(&self, prg_rom: &[u8], address: u16) -> u8 {
        if prg_rom.is_empty() {
            return 0;
        }
        let offset = self.prg_offset(prg_rom.len(), address);
        prg_rom.get(offset).copied().unwrap_or(0)
    }

    fn chr_offset(&self, chr_len: usize, address: u16) -> usize {
        let address = address as usize & 0x1FFF;
        let bank_count = (chr_len / CHR_HALF_BANK_SIZE).max(1);
        let upper_half = address >= CHR_HALF_BANK_SIZE;

        let bank = if self.chr_mode() == 0 {
            (self.chr_bank0 as usize & !1) | usize::from(upper_half)
        } else if upper_half {
            self.chr_bank1 as usize
        } else {
            self.chr_bank0 as usize
        };

        wrap_bank(bank, bank_count) * CHR_HALF_BANK_SIZE + (address & 0x0FFF)
    }

    pub fn chr_read(&self, chr: &[u8], address: u16) -> u8 {
        let offset = self.chr_offset(chr.len(), address);
        chr.get(offset).copied().unwrap_or(0)
    }

    pub fn chr_write(&mut self, chr: &mut [u8], address: u16, value: u8) {
        let offset = self.chr_offset(chr.len(), address);
        if let Some(byte) = chr.get_mut(offset) {
            *byte = value;
        }
    }
}
