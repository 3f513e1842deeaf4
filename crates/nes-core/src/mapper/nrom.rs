//! Mapper 0 (NROM): no bank switching, 16/32KB PRG, 8KB CHR.

/// NROM mapper: fixed PRG and CHR. A 16KB PRG ROM appears twice in the
/// 32KB CPU window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nrom;

impl Nrom {
    pub fn new() -> Self {
        Self
    }

    pub fn prg_read(&self, prg_rom: &[u8], address: u16) -> u8 {
        if prg_rom.is_empty() {
            return 0;
        }
        prg_rom[(address as usize & 0x7FFF) % prg_rom.len()]
    }

    /// PRG ROM: no writes
    pub fn prg_write(&mut self, _address: u16, _value: u8) {}

    pub fn chr_read(&self, chr: &[u8], address: u16) -> u8 {
        if chr.is_empty() {
            return 0;
        }
        chr[(address as usize & 0x1FFF) % chr.len()]
    }

    pub fn chr_write(&mut self, chr: &mut [u8], address: u16, value: u8) {
        if chr.is_empty() {
            return;
        }
        let len = chr.len();
        chr[(address as usize & 0x1FFF) % len] = value;
    }
}
