//! Memory bus and mapping
//!
//! The NES memory map:
//! $0000-$07FF - 2KB Internal RAM
//! $0800-$1FFF - RAM mirroring (repeats every $0800 bytes)
//! $2000-$2007 - PPU registers
//! $2008-$3FFF - PPU register mirroring (repeats every $08 bytes)
//! $4014       - OAM DMA
//! $4000-$5FFF - APU, I/O and expansion (not emulated: read 0, writes dropped)
//! $6000-$7FFF - Cartridge PRG RAM (if present)
//! $8000-$FFFF - Cartridge PRG ROM through the mapper
//!
//! Decoding is total: every address either hits a backing store or reads
//! as open bus (0).

use crate::cartridge::Cartridge;
use crate::cpu::Bus as CpuBus;
use crate::ppu::PpuBus;

/// RAM size in bytes
pub const RAM_SIZE: usize = 2048; // 2KB

/// OAM DMA register
pub const OAM_DMA: u16 = 0x4014;

/// CPU cycles the 2A03 is suspended for during OAM DMA
pub const OAM_DMA_CYCLES: u32 = 513;

/// CPU-visible address space: work RAM, PPU registers and the cartridge
#[derive(Debug, Clone)]
pub struct Bus {
    /// 2KB internal RAM (with mirroring)
    ram: [u8; RAM_SIZE],
    /// PPU registers, nametables, palette and OAM
    ppu: PpuBus,
    cartridge: Cartridge,
    /// DMA cycles not yet charged to the CPU
    stall_cycles: u32,
}

impl Bus {
    /// Create a bus around a loaded cartridge
    pub fn new(cartridge: Cartridge) -> Self {
        Self {
            ram: [0; RAM_SIZE],
            ppu: PpuBus::new(),
            cartridge,
            stall_cycles: 0,
        }
    }

    /// Power-on state for RAM, PPU and mapper
    pub fn reset(&mut self) {
        self.ram = [0; RAM_SIZE];
        self.ppu.reset();
        self.cartridge.reset();
        self.stall_cycles = 0;
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn ppu(&self) -> &PpuBus {
        &self.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut PpuBus {
        &mut self.ppu
    }

    /// Read a CPU address without side effects (no PPU latch or buffer
    /// changes)
    pub fn peek(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x1FFF => self.ram[(address & 0x07FF) as usize],
            0x2000..=0x3FFF => self.ppu.cpu_peek_reg(address, &self.cartridge),
            0x6000..=0x7FFF => self.cartridge.prg_ram_read(address),
            0x8000..=0xFFFF => self.cartridge.prg_read(address),
            _ => 0,
        }
    }

    /// Read the PPU address space ($0000-$3FFF) without side effects
    pub fn ppu_peek(&self, address: u16) -> u8 {
        self.ppu.read(address, &self.cartridge)
    }

    /// Little-endian word read without side effects
    pub fn peek_u16(&self, address: u16) -> u16 {
        u16::from_le_bytes([self.peek(address), self.peek(address.wrapping_add(1))])
    }

    fn oam_dma(&mut self, page: u8) {
        let base = u16::from(page) << 8;
        for offset in 0..=0xFF {
            let value = self.read(base | offset);
            self.ppu.dma_write(value);
        }
        self.stall_cycles += OAM_DMA_CYCLES;
    }
}

impl CpuBus for Bus {
    /// Read a byte from the given address
    fn read(&mut self, address: u16) -> u8 {
        match address {
            // $0000-$1FFF - Internal RAM and mirrors
            0x0000..=0x1FFF => self.ram[(address & 0x07FF) as usize],
            // $2000-$3FFF - PPU registers, mirrored every 8 bytes
            0x2000..=0x3FFF => self.ppu.cpu_read_reg(address, &self.cartridge),
            // $6000-$7FFF - Cartridge PRG RAM (if present)
            0x6000..=0x7FFF => self.cartridge.prg_ram_read(address),
            // $8000-$FFFF - Cartridge PRG ROM
            0x8000..=0xFFFF => self.cartridge.prg_read(address),
            _ => 0,
        }
    }

    /// Write a byte to the given address
    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => self.ram[(address & 0x07FF) as usize] = value,
            0x2000..=0x3FFF => self.ppu.cpu_write_reg(address, value, &mut self.cartridge),
            OAM_DMA => self.oam_dma(value),
            0x6000..=0x7FFF => self.cartridge.prg_ram_write(address, value),
            // Mapper registers live in the ROM window
            0x8000..=0xFFFF => self.cartridge.prg_write(address, value),
            _ => {}
        }
    }

    fn take_stall_cycles(&mut self) -> u32 {
        std::mem::take(&mut self.stall_cycles)
    }
}
