//! Cartridge mappers
//!
//! A mapper translates CPU addresses ($8000-$FFFF) and PPU pattern addresses
//! ($0000-$1FFF) into offsets inside the cartridge's PRG and CHR memory.
//! The ROM bytes stay owned by [`crate::Cartridge`]; mappers only hold
//! bank-select state and receive the memory as slices.
//!
//! Bank numbers that point past the end of the ROM are wrapped, never
//! reported as errors.

mod mmc1;
mod nrom;

pub use mmc1::Mmc1;
pub use nrom::Nrom;

use crate::cartridge::Mirroring;

/// Size of a switchable PRG ROM bank
pub const PRG_BANK_SIZE: usize = 0x4000;
/// Size of a CHR ROM bank as counted by the iNES header
pub const CHR_BANK_SIZE: usize = 0x2000;

/// Supported mappers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapper {
    /// Mapper 0 - fixed banks
    Nrom(Nrom),
    /// Mapper 1 - serial shift-register bank switching
    Mmc1(Mmc1),
}

impl Mapper {
    /// Build the mapper for an iNES mapper number, if supported
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            0 => Some(Mapper::Nrom(Nrom::new())),
            1 => Some(Mapper::Mmc1(Mmc1::new())),
            _ => None,
        }
    }

    /// iNES mapper number
    pub fn number(&self) -> u8 {
        match self {
            Mapper::Nrom(_) => 0,
            Mapper::Mmc1(_) => 1,
        }
    }

    /// Board name
    pub fn name(&self) -> &'static str {
        match self {
            Mapper::Nrom(_) => "NROM",
            Mapper::Mmc1(_) => "MMC1",
        }
    }

    /// Read PRG ROM through the CPU window ($8000-$FFFF)
    pub fn prg_read(&self, prg_rom: &[u8], address: u16) -> u8 {
        match self {
            Mapper::Nrom(m) => m.prg_read(prg_rom, address),
            Mapper::Mmc1(m) => m.prg_read(prg_rom, address),
        }
    }

    /// CPU write into the PRG window; mapper registers live here
    pub fn prg_write(&mut self, address: u16, value: u8) {
        match self {
            Mapper::Nrom(m) => m.prg_write(address, value),
            Mapper::Mmc1(m) => m.prg_write(address, value),
        }
    }

    /// Read pattern memory ($0000-$1FFF)
    pub fn chr_read(&self, chr: &[u8], address: u16) -> u8 {
        match self {
            Mapper::Nrom(m) => m.chr_read(chr, address),
            Mapper::Mmc1(m) => m.chr_read(chr, address),
        }
    }

    /// Write pattern memory; only lands when the cartridge has CHR RAM
    pub fn chr_write(&mut self, chr: &mut [u8], address: u16, value: u8) {
        match self {
            Mapper::Nrom(m) => m.chr_write(chr, address, value),
            Mapper::Mmc1(m) => m.chr_write(chr, address, value),
        }
    }

    /// Nametable arrangement, given the one soldered on the board
    pub fn mirroring(&self, board: Mirroring) -> Mirroring {
        match self {
            Mapper::Nrom(_) => board,
            Mapper::Mmc1(m) => m.mirroring(board),
        }
    }

    /// Whether PRG RAM at $6000-$7FFF currently responds
    pub fn prg_ram_enabled(&self) -> bool {
        match self {
            Mapper::Nrom(_) => true,
            Mapper::Mmc1(m) => m.prg_ram_enabled(),
        }
    }

    /// Return to power-on state
    pub fn reset(&mut self) {
        match self {
            Mapper::Nrom(_) => {}
            Mapper::Mmc1(m) => m.reset(),
        }
    }
}

/// Wrap a bank index into `0..count` the way the address lines do:
/// high bits that the board does not decode are dropped.
pub(crate) fn wrap_bank(bank: usize, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    (bank & (count.next_power_of_two() - 1)) % count
}
