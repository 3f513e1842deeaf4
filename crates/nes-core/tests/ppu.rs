//! PPU tests for the NES emulator
//!
//! Video memory is set up the way a game does it: through the CPU-visible
//! registers at $2000-$2007.

use nes_core::bus::Bus;
use nes_core::cartridge::{Cartridge, Mirroring};
use nes_core::cpu::Bus as CpuBus;
use nes_core::ppu::{system_color, Ppu, PpuStatus};
use nes_core::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// NROM board with one CHR ROM bank. Tile 1 is solid colour 1, tile 2 solid
/// colour 3.
fn bus_with_tiles(flags_6: u8) -> Bus {
    let mut rom = b"NES\x1A".to_vec();
    rom.extend_from_slice(&[1, 1, flags_6, 0]);
    rom.resize(16, 0);
    rom.extend(std::iter::repeat(0xEA).take(0x4000));

    let mut chr = vec![0u8; 0x2000];
    chr[16..24].fill(0xFF);
    chr[32..48].fill(0xFF);
    rom.extend_from_slice(&chr);

    Bus::new(Cartridge::from_rom(&rom).unwrap())
}

fn set_vram_address(bus: &mut Bus, address: u16) {
    bus.read(0x2002);
    bus.write(0x2006, (address >> 8) as u8);
    bus.write(0x2006, address as u8);
}

fn fill_vram(bus: &mut Bus, address: u16, bytes: &[u8]) {
    set_vram_address(bus, address);
    for &byte in bytes {
        bus.write(0x2007, byte);
    }
}

#[test]
fn test_render_is_deterministic() {
    let mut bus = bus_with_tiles(0);
    fill_vram(&mut bus, 0x2000, &[1, 2, 1, 2, 0, 0, 2]);
    fill_vram(&mut bus, 0x3F00, &[0x0F, 0x16, 0x27, 0x30]);
    bus.write(0x2001, 0x1E);

    let mut ppu = Ppu::new();
    let first = ppu.render_frame(bus.ppu(), bus.cartridge()).clone();
    let second = ppu.render_frame(bus.ppu(), bus.cartridge()).clone();
    assert_eq!(first, second);
    assert_eq!(first.as_bytes().len(), SCREEN_WIDTH * SCREEN_HEIGHT * 3);

    // A fresh renderer over the same memory agrees too
    let mut other = Ppu::new();
    assert_eq!(other.render_frame(bus.ppu(), bus.cartridge()), &first);
}

#[test]
fn test_tiles_render_with_palette() {
    let mut bus = bus_with_tiles(0);
    fill_vram(&mut bus, 0x2000, &[1, 2]);
    fill_vram(&mut bus, 0x3F00, &[0x0F, 0x16, 0x27, 0x30]);
    // Show background, including the left 8 pixels
    bus.write(0x2001, 0x0A);

    let mut ppu = Ppu::new();
    let frame = ppu.render_frame(bus.ppu(), bus.cartridge());
    assert_eq!(frame.pixel(0, 0), system_color(0x16));
    assert_eq!(frame.pixel(7, 7), system_color(0x16));
    assert_eq!(frame.pixel(8, 0), system_color(0x30));
    assert_eq!(frame.pixel(16, 0), system_color(0x0F));
    assert_eq!(frame.pixel(0, 8), system_color(0x0F));
}

#[test]
fn test_nametable_mirroring_follows_header() {
    // Vertical: $2800 shows what was written at $2000
    let mut bus = bus_with_tiles(0x01);
    assert_eq!(bus.cartridge().mirroring(), Mirroring::Vertical);
    fill_vram(&mut bus, 0x2000, &[0xAB]);
    assert_eq!(bus.ppu_peek(0x2800), 0xAB);
    assert_eq!(bus.ppu_peek(0x2400), 0x00);

    // Horizontal: $2400 mirrors $2000
    let mut bus = bus_with_tiles(0x00);
    fill_vram(&mut bus, 0x2000, &[0xCD]);
    assert_eq!(bus.ppu_peek(0x2400), 0xCD);
    assert_eq!(bus.ppu_peek(0x2800), 0x00);
}

#[test]
fn test_base_nametable_select() {
    let mut bus = bus_with_tiles(0x01);
    // Second nametable, top-left tile
    fill_vram(&mut bus, 0x2400, &[2]);
    fill_vram(&mut bus, 0x3F00, &[0x0F, 0x16, 0x27, 0x30]);
    bus.write(0x2001, 0x0A);

    let mut ppu = Ppu::new();
    assert_eq!(ppu.render_frame(bus.ppu(), bus.cartridge()).pixel(0, 0), system_color(0x0F));

    bus.write(0x2000, 0x01);
    assert_eq!(ppu.render_frame(bus.ppu(), bus.cartridge()).pixel(0, 0), system_color(0x30));
}

#[test]
fn test_palette_mirrors_through_registers() {
    let mut bus = bus_with_tiles(0);
    fill_vram(&mut bus, 0x3F10, &[0x2C]);
    assert_eq!(bus.ppu_peek(0x3F00), 0x2C);

    // Palette reads are not delayed by the read buffer
    set_vram_address(&mut bus, 0x3F00);
    assert_eq!(bus.read(0x2007), 0x2C);
}

#[test]
fn test_chr_rom_is_read_only() {
    let mut bus = bus_with_tiles(0);
    fill_vram(&mut bus, 0x0010, &[0x00]);
    assert_eq!(bus.ppu_peek(0x0010), 0xFF);
}

#[test]
fn test_greyscale_mask() {
    let mut bus = bus_with_tiles(0);
    fill_vram(&mut bus, 0x3F00, &[0x16]);
    bus.write(0x2001, 0x01);

    let mut ppu = Ppu::new();
    assert_eq!(ppu.render_frame(bus.ppu(), bus.cartridge()).pixel(100, 100), system_color(0x10));
}

#[test]
fn test_status_read_resets_address_latch() {
    let mut bus = bus_with_tiles(0);
    // Half-written address, then a status read
    bus.write(0x2006, 0x21);
    bus.ppu_mut().status.insert(PpuStatus::IN_VBLANK);
    assert_eq!(bus.read(0x2002) & 0x80, 0x80);
    assert_eq!(bus.read(0x2002) & 0x80, 0);

    bus.write(0x2006, 0x23);
    bus.write(0x2006, 0x00);
    assert_eq!(bus.ppu().vram_addr(), 0x2300);
}
