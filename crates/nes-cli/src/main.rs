//! NES CLI - Command line interface for NES emulator
//!
//! Runs a ROM headless for a fixed number of frames, then optionally dumps
//! machine state and writes the last frame as a PPM image.

use clap::Parser;
use nes_core::cpu::{decode_opcode, IRQ_VECTOR, NMI_VECTOR, RESET_VECTOR};
use nes_core::ppu::PpuStatus;
use nes_core::{Emulator, EmulatorConfig, OpcodePolicy};
use std::fs;
use std::path::PathBuf;

/// NES Emulator CLI
#[derive(Parser, Debug)]
#[command(name = "nes-cli")]
#[command(about = "A NES emulator CLI", long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Number of frames to run
    #[arg(short, long, default_value = "60")]
    frames: u64,

    /// Dump CPU state after execution
    #[arg(short = 'c', long)]
    dump_cpu: bool,

    /// Dump PPU state after execution
    #[arg(short = 'p', long)]
    dump_ppu: bool,

    /// Write the last frame as a binary PPM image
    #[arg(long, value_name = "OUT.ppm")]
    screenshot: Option<PathBuf>,

    /// Stop at the first unimplemented opcode instead of skipping it
    #[arg(long)]
    halt_on_unknown: bool,

    /// CPU cycles budgeted per frame
    #[arg(long)]
    cycles_per_frame: Option<u32>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    // RUST_LOG, when set, overrides the -v level
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    // Load ROM file
    let rom_data = match fs::read(&args.rom) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to read ROM file {}: {}", args.rom.display(), e);
            std::process::exit(1);
        }
    };

    let mut config = EmulatorConfig::default();
    if args.halt_on_unknown {
        config = config.with_opcode_policy(OpcodePolicy::Halt);
    }
    if let Some(cycles) = args.cycles_per_frame {
        config = config.with_cycles_per_frame(cycles);
    }

    let mut emulator = match Emulator::load_with_config(&rom_data, config) {
        Ok(emulator) => emulator,
        Err(e) => {
            eprintln!("Failed to load ROM: {}", e);
            std::process::exit(1);
        }
    };

    let cartridge = emulator.bus().cartridge();
    println!("Loaded cartridge:");
    println!("  PRG ROM: {} bytes", cartridge.prg_rom().len());
    println!(
        "  CHR {}: {} bytes",
        if cartridge.chr_is_ram() { "RAM" } else { "ROM" },
        cartridge.chr_rom().len()
    );
    println!(
        "  Mapper: {} ({})",
        cartridge.mapper().number(),
        cartridge.mapper().name()
    );
    println!("  Mirroring: {:?}", cartridge.mirroring());
    println!("  PRG RAM: {}", if cartridge.has_prg_ram() { "8KB" } else { "none" });

    println!("\nRunning {} frames...", args.frames);

    let mut failure = None;
    for _ in 0..args.frames {
        if let Err(e) = emulator.run_frame() {
            failure = Some(e);
            break;
        }
    }

    println!("Completed {} frames.", emulator.frame_count());

    // Dump state if requested
    if args.dump_cpu {
        dump_cpu_state(&emulator);
    }

    if args.dump_ppu {
        dump_ppu_state(&emulator);
    }

    if let Some(path) = &args.screenshot {
        if let Err(e) = fs::write(path, emulator.get_frame().to_ppm()) {
            eprintln!("Failed to write screenshot {}: {}", path.display(), e);
            std::process::exit(1);
        }
        println!("Wrote {}", path.display());
    }

    if let Some(e) = failure {
        eprintln!("Error running system: {}", e);
        std::process::exit(1);
    }
}

fn dump_cpu_state(emulator: &Emulator) {
    let cpu = emulator.cpu();
    let regs = cpu.registers();
    let status = cpu.status();

    println!("\nCPU State:");
    println!("  A:    ${:02X}", regs.a);
    println!("  X:    ${:02X}", regs.x);
    println!("  Y:    ${:02X}", regs.y);
    println!("  PC:   ${:04X}", regs.pc);
    println!("  SP:   ${:02X}", regs.sp);
    println!("  P:    ${:02X} ({})", status.bits(), status);
    println!("  Cycles: {}", cpu.cycles());
    println!("  Instructions: {}", cpu.instructions());

    let bus = emulator.bus();
    println!(
        "  Vectors: NMI=${:04X} RESET=${:04X} IRQ=${:04X}",
        bus.peek_u16(NMI_VECTOR),
        bus.peek_u16(RESET_VECTOR),
        bus.peek_u16(IRQ_VECTOR)
    );
    println!("  Next: {}", disassemble(emulator, regs.pc));
}

/// One instruction as `$PC  bytes  MNEMONIC mode`
fn disassemble(emulator: &Emulator, pc: u16) -> String {
    let bus = emulator.bus();
    let opcode = bus.peek(pc);
    let Some(info) = decode_opcode(opcode) else {
        return format!("${:04X}  {:02X}        ???", pc, opcode);
    };

    let bytes: Vec<String> = (0..=info.mode.operand_len())
        .map(|offset| format!("{:02X}", bus.peek(pc.wrapping_add(offset))))
        .collect();
    format!("${:04X}  {:<8}  {:?} {:?}", pc, bytes.join(" "), info.mnemonic, info.mode)
}

fn dump_ppu_state(emulator: &Emulator) {
    let ppu = emulator.bus().ppu();
    let (scroll_x, scroll_y) = ppu.scroll();

    println!("\nPPU State:");
    println!("  PPUCTRL:   ${:02X}", ppu.ctrl.bits());
    println!("  PPUMASK:   ${:02X}", ppu.mask.bits());
    println!("  PPUSTATUS: ${:02X}", ppu.status.bits());
    println!("  VBLANK: {}", ppu.status.contains(PpuStatus::IN_VBLANK));
    println!("  Scroll: ({}, {})", scroll_x, scroll_y);
    println!("  VRAM address: ${:04X}", ppu.vram_addr());
    println!("  OAM address: ${:02X}", ppu.oam_addr());
    println!(
        "  Sprite 0 hit: {}, overflow: {}",
        emulator.ppu().sprite_zero_hit(),
        emulator.ppu().sprite_overflow()
    );
}
