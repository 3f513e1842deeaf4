//! Cartridge and mapper support
//!
//! This module parses iNES images, slices out PRG/CHR memory and owns the
//! mapper chosen by the header. The CPU and PPU never touch ROM bytes
//! directly; every access goes through the mapper.

use thiserror::Error;

use crate::mapper::{Mapper, CHR_BANK_SIZE, PRG_BANK_SIZE};

/// iNES header size
pub const HEADER_SIZE: usize = 16;

/// Trainer block size (loaded at $7000 on real hardware)
pub const TRAINER_SIZE: usize = 512;

/// PRG RAM size for boards that carry it
pub const PRG_RAM_SIZE: usize = 0x2000;

const MAGIC: [u8; 4] = [b'N', b'E', b'S', 0x1A];

/// Cartridge error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartridgeError {
    #[error("invalid iNES image: {0}")]
    InvalidImage(&'static str),
    #[error("iNES image truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("unsupported iNES mapper {0}")]
    UnsupportedMapper(u8),
}

/// Nametable mirroring mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    /// $2000 = $2400, $2800 = $2C00 (vertical scrolling games)
    Horizontal,
    /// $2000 = $2800, $2400 = $2C00 (horizontal scrolling games)
    Vertical,
    /// Four independent nametables backed by cartridge VRAM
    FourScreen,
    /// Every nametable maps to the first 1KB page
    SingleScreenLower,
    /// Every nametable maps to the second 1KB page
    SingleScreenUpper,
}

/// iNES header structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InesHeader {
    /// PRG ROM size in 16KB units
    pub prg_rom_banks: u8,
    /// CHR ROM size in 8KB units (0 means the board has CHR RAM)
    pub chr_rom_banks: u8,
    /// Flags 6
    pub flags_6: u8,
    /// Flags 7
    pub flags_7: u8,
}

impl InesHeader {
    /// Parse an iNES header from bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, CartridgeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CartridgeError::InvalidImage("shorter than header"));
        }
        if bytes[0..4] != MAGIC {
            return Err(CartridgeError::InvalidImage("missing NES<EOF> signature"));
        }

        Ok(Self {
            prg_rom_banks: bytes[4],
            chr_rom_banks: bytes[5],
            flags_6: bytes[6],
            flags_7: bytes[7],
        })
    }

    /// Get the mapper number from flags
    pub fn mapper_number(&self) -> u8 {
        (self.flags_7 & 0xF0) | (self.flags_6 >> 4)
    }

    /// Check if trainer is present
    pub fn has_trainer(&self) -> bool {
        (self.flags_6 & 0x04) != 0
    }

    /// Check if the board keeps PRG RAM alive with a battery
    pub fn has_battery(&self) -> bool {
        (self.flags_6 & 0x02) != 0
    }

    /// Board mirroring; the four-screen bit wins over bit 0
    pub fn mirroring(&self) -> Mirroring {
        if self.flags_6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if self.flags_6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        }
    }

    pub fn prg_rom_size(&self) -> usize {
        self.prg_rom_banks as usize * PRG_BANK_SIZE
    }

    pub fn chr_rom_size(&self) -> usize {
        self.chr_rom_banks as usize * CHR_BANK_SIZE
    }
}

/// Cartridge structure
#[derive(Debug, Clone)]
pub struct Cartridge {
    header: InesHeader,
    prg_rom: Vec<u8>,
    /// CHR ROM, or zero-filled CHR RAM when the header has no CHR banks
    chr: Vec<u8>,
    chr_is_ram: bool,
    /// Empty when the board has no PRG RAM
    prg_ram: Vec<u8>,
    trainer: Option<Vec<u8>>,
    mirroring: Mirroring,
    mapper: Mapper,
}

impl Cartridge {
    /// Create a new cartridge from iNES ROM data
    pub fn from_rom(rom_data: &[u8]) -> Result<Self, CartridgeError> {
        let header = InesHeader::parse(rom_data)?;
        if header.prg_rom_banks == 0 {
            return Err(CartridgeError::InvalidImage("no PRG ROM banks"));
        }

        let mapper = Mapper::from_number(header.mapper_number())
            .ok_or(CartridgeError::UnsupportedMapper(header.mapper_number()))?;

        let trainer_size = if header.has_trainer() { TRAINER_SIZE } else { 0 };
        let expected = HEADER_SIZE + trainer_size + header.prg_rom_size() + header.chr_rom_size();
        if rom_data.len() < expected {
            return Err(CartridgeError::Truncated {
                expected,
                found: rom_data.len(),
            });
        }

        let mut offset = HEADER_SIZE;

        // Skip trainer if present
        let trainer = if header.has_trainer() {
            let trainer_data = rom_data[offset..offset + TRAINER_SIZE].to_vec();
            offset += TRAINER_SIZE;
            Some(trainer_data)
        } else {
            None
        };

        let prg_rom = rom_data[offset..offset + header.prg_rom_size()].to_vec();
        offset += header.prg_rom_size();

        let chr_is_ram = header.chr_rom_banks == 0;
        let chr = if chr_is_ram {
            vec![0; CHR_BANK_SIZE]
        } else {
            rom_data[offset..offset + header.chr_rom_size()].to_vec()
        };

        let prg_ram = if header.has_battery() || matches!(mapper, Mapper::Mmc1(_)) {
            vec![0; PRG_RAM_SIZE]
        } else {
            Vec::new()
        };

        let mirroring = header.mirroring();

        log::info!(
            "Loaded cartridge: mapper {} ({}), PRG {}x16KB, CHR {}, {:?} mirroring, \
             trainer: {}, PRG RAM: {}",
            mapper.number(),
            mapper.name(),
            header.prg_rom_banks,
            if chr_is_ram {
                "8KB RAM".to_string()
            } else {
                format!("{}x8KB", header.chr_rom_banks)
            },
            mirroring,
            trainer.is_some(),
            !prg_ram.is_empty()
        );

        Ok(Self {
            header,
            prg_rom,
            chr,
            chr_is_ram,
            prg_ram,
            trainer,
            mirroring,
            mapper,
        })
    }

    /// Restore the mapper to its power-on state; ROM and RAM contents are kept
    pub fn reset(&mut self) {
        self.mapper.reset();
    }

    /// Get the iNES header
    pub fn header(&self) -> &InesHeader {
        &self.header
    }

    /// Get PRG ROM data
    pub fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }

    /// Get CHR ROM (or CHR RAM) data
    pub fn chr_rom(&self) -> &[u8] {
        &self.chr
    }

    pub fn chr_is_ram(&self) -> bool {
        self.chr_is_ram
    }

    pub fn trainer(&self) -> Option<&[u8]> {
        self.trainer.as_deref()
    }

    pub fn has_prg_ram(&self) -> bool {
        !self.prg_ram.is_empty()
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Current nametable mirroring (MMC1 can change it at run time)
    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring(self.mirroring)
    }

    /// CPU read from $8000-$FFFF
    pub fn prg_read(&self, address: u16) -> u8 {
        self.mapper.prg_read(&self.prg_rom, address)
    }

    /// CPU write to $8000-$FFFF
    pub fn prg_write(&mut self, address: u16, value: u8) {
        self.mapper.prg_write(address, value);
    }

    /// CPU read from $6000-$7FFF; open bus (0) without PRG RAM
    pub fn prg_ram_read(&self, address: u16) -> u8 {
        if self.prg_ram.is_empty() || !self.mapper.prg_ram_enabled() {
            return 0;
        }
        self.prg_ram[address as usize & (PRG_RAM_SIZE - 1)]
    }

    pub fn prg_ram_write(&mut self, address: u16, value: u8) {
        if self.prg_ram.is_empty() || !self.mapper.prg_ram_enabled() {
            return;
        }
        self.prg_ram[address as usize & (PRG_RAM_SIZE - 1)] = value;
    }

    /// PPU read from the pattern tables ($0000-$1FFF)
    pub fn chr_read(&self, address: u16) -> u8 {
        self.mapper.chr_read(&self.chr, address)
    }

    /// PPU write to the pattern tables; ignored for CHR ROM
    pub fn chr_write(&mut self, address: u16, value: u8) {
        if self.chr_is_ram {
            self.mapper.chr_write(&mut self.chr, address, value);
        }
    }
}
