//! Integration tests for the NES system

use nes_core::cartridge::CartridgeError;
use nes_core::cpu::Bus as CpuBus;
use nes_core::ppu::system_color;
use nes_core::{Emulator, EmulatorConfig, EmulatorError, OpcodePolicy, SharedFrame};

/// NROM-128 image: `program` at $8000, all vectors pointing at $8000
fn nrom(program: &[u8]) -> Vec<u8> {
    let mut prg = vec![0xEA; 0x4000];
    prg[..program.len()].copy_from_slice(program);
    prg[0x3FFA..].copy_from_slice(&[0x00, 0x80, 0x00, 0x80, 0x00, 0x80]);

    let mut rom = b"NES\x1A".to_vec();
    rom.extend_from_slice(&[1, 1, 0, 0]);
    rom.resize(16, 0);
    rom.extend_from_slice(&prg);
    rom.extend(std::iter::repeat(0).take(0x2000));
    rom
}

#[test]
fn test_first_instruction_runs() {
    // LDA #$05; JMP $8002
    let mut emu = Emulator::load(&nrom(&[0xA9, 0x05, 0x4C, 0x02, 0x80])).unwrap();
    assert_eq!(emu.cpu().registers().pc, 0x8000);

    emu.run_frame().unwrap();
    assert_eq!(emu.cpu().registers().a, 0x05);
    assert_eq!(emu.frame_count(), 1);
}

#[test]
fn test_load_errors() {
    let good = nrom(&[]);

    let mut bad_magic = good.clone();
    bad_magic[3] = 0x00;
    assert!(matches!(
        Emulator::load(&bad_magic),
        Err(EmulatorError::Load(CartridgeError::InvalidImage(_)))
    ));

    assert!(matches!(
        Emulator::load(&good[..8]),
        Err(EmulatorError::Load(CartridgeError::InvalidImage(_)))
    ));

    let truncated = &good[..good.len() - 1];
    assert_eq!(
        Emulator::load(truncated).unwrap_err().to_string(),
        format!(
            "failed to load cartridge: iNES image truncated: expected {} bytes, found {}",
            good.len(),
            good.len() - 1
        )
    );

    let mut mmc3 = good.clone();
    mmc3[6] = 0x40;
    assert!(matches!(
        Emulator::load(&mmc3),
        Err(EmulatorError::Load(CartridgeError::UnsupportedMapper(4)))
    ));
}

#[test]
fn test_many_frames_budget() {
    let config = EmulatorConfig::default().with_cycles_per_frame(3_000);
    let mut emu = Emulator::load_with_config(&nrom(&[0x4C, 0x00, 0x80]), config).unwrap();
    for _ in 0..10 {
        emu.run_frame().unwrap();
    }
    assert_eq!(emu.frame_count(), 10);
    assert_eq!(emu.cpu().instructions(), 10 * 1_000);
    // JMP abs is 3 cycles
    assert_eq!(emu.cpu().cycles(), 10 * 1_000 * 3);
}

#[test]
fn test_program_draws_backdrop() {
    // LDA #$3F; STA $2006; LDA #$00; STA $2006; LDA #$2A; STA $2007; JMP *
    let program = [
        0xA9, 0x3F, 0x8D, 0x06, 0x20, 0xA9, 0x00, 0x8D, 0x06, 0x20, 0xA9, 0x2A, 0x8D, 0x07, 0x20,
        0x4C, 0x0F, 0x80,
    ];
    let mut emu = Emulator::load(&nrom(&program)).unwrap();
    emu.run_frame().unwrap();

    let frame = emu.get_frame();
    assert_eq!(frame.pixel(0, 0), system_color(0x2A));
    assert_eq!(frame.pixel(255, 239), system_color(0x2A));
}

#[test]
fn test_shared_frame_publish() {
    let mut emu = Emulator::load(&nrom(&[0x4C, 0x00, 0x80])).unwrap();
    emu.bus_mut().write(0x2006, 0x3F);
    emu.bus_mut().write(0x2006, 0x00);
    emu.bus_mut().write(0x2007, 0x11);

    let shared = SharedFrame::new();
    let reader = shared.clone();
    emu.run_frame().unwrap();
    shared.publish(emu.frame());

    let snapshot = std::thread::spawn(move || reader.snapshot()).join().unwrap();
    assert_eq!(&snapshot, emu.frame());
    assert_eq!(snapshot.pixel(128, 120), system_color(0x11));
}

#[test]
fn test_reset_restarts_program() {
    // INX; JMP $8000
    let mut emu = Emulator::load(&nrom(&[0xE8, 0x4C, 0x00, 0x80])).unwrap();
    emu.bus_mut().write(0x0010, 0xAA);
    emu.run_frame().unwrap();
    assert_ne!(emu.cpu().registers().x, 0);

    emu.reset();
    assert_eq!(emu.frame_count(), 0);
    assert_eq!(emu.cpu().registers().x, 0);
    assert_eq!(emu.cpu().registers().pc, 0x8000);
    assert_eq!(emu.bus().peek(0x0010), 0);
}

#[test]
fn test_independent_instances() {
    let image = nrom(&[0xE8, 0x4C, 0x00, 0x80]);
    let mut a = Emulator::load(&image).unwrap();
    let b = Emulator::load(&image).unwrap();
    a.run_frame().unwrap();
    assert_eq!(a.frame_count(), 1);
    assert_eq!(b.frame_count(), 0);
    assert_eq!(b.cpu().registers().x, 0);
}

#[test]
fn test_halted_instance_reports_error() {
    let config = EmulatorConfig::default().with_opcode_policy(OpcodePolicy::Halt);
    let mut emu = Emulator::load_with_config(&nrom(&[0xEA, 0xFF]), config).unwrap();
    let err = emu.run_frame().unwrap_err();
    assert_eq!(
        err.to_string(),
        "emulator halted at unimplemented opcode $FF (PC=$8001)"
    );
}
