//! Frame throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nes_core::Emulator;

/// NROM image whose program turns on background and sprites, fills the
/// first nametable with tile 1 and then spins
fn busy_rom() -> Vec<u8> {
    #[rustfmt::skip]
    let program = [
        0xA9, 0x1E, 0x8D, 0x01, 0x20, // LDA #$1E; STA $2001
        0xA9, 0x20, 0x8D, 0x06, 0x20, // LDA #$20; STA $2006
        0xA9, 0x00, 0x8D, 0x06, 0x20, // LDA #$00; STA $2006
        0xA2, 0x00,                   // LDX #$00
        0xA9, 0x01,                   // LDA #$01
        0x8D, 0x07, 0x20,             // fill: STA $2007
        0xE8,                         // INX
        0xD0, 0xFA,                   // BNE fill
        0x4C, 0x19, 0x80,             // spin: JMP spin
    ];
    let mut prg = vec![0xEA; 0x4000];
    prg[..program.len()].copy_from_slice(&program);
    prg[0x3FFA..].copy_from_slice(&[0x00, 0x80, 0x00, 0x80, 0x00, 0x80]);

    let mut chr = vec![0u8; 0x2000];
    chr[16..24].fill(0xFF);

    let mut rom = b"NES\x1A".to_vec();
    rom.extend_from_slice(&[1, 1, 0, 0]);
    rom.resize(16, 0);
    rom.extend_from_slice(&prg);
    rom.extend_from_slice(&chr);
    rom
}

fn bench_run_frame(c: &mut Criterion) {
    let rom = busy_rom();
    let mut emu = Emulator::load(&rom).unwrap();

    c.bench_function("run_frame", |b| {
        b.iter(|| {
            emu.run_frame().unwrap();
            black_box(emu.frame().pixel(0, 0));
        })
    });
}

fn bench_get_frame(c: &mut Criterion) {
    let mut emu = Emulator::load(&busy_rom()).unwrap();
    emu.run_frame().unwrap();

    c.bench_function("get_frame", |b| b.iter(|| black_box(emu.get_frame())));
}

criterion_group!(benches, bench_run_frame, bench_get_frame);
criterion_main!(benches);
