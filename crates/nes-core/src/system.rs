//! NES System Integration
//!
//! This module wires the cartridge, bus, CPU and PPU into an [`Emulator`]
//! that a host drives one frame at a time.
//!
//! One call to [`Emulator::run_frame`]:
//! 1. clears vblank and the sprite flags (pre-render line),
//! 2. runs the share of the instruction budget that falls on the visible
//!    scanlines (241 of 262),
//! 3. renders the frame,
//! 4. raises vblank and, if PPUCTRL asks for it, an NMI,
//! 5. runs the rest of the budget.

use std::collections::HashSet;

use thiserror::Error;

use crate::bus::Bus;
use crate::cartridge::{Cartridge, CartridgeError};
use crate::config::{EmulatorConfig, OpcodePolicy};
use crate::cpu::{Cpu, CpuError};
use crate::framebuffer::Framebuffer;
use crate::ppu::Ppu;

/// Scanline on which vblank starts
const VBLANK_SCANLINE: u64 = 241;
/// NTSC scanlines per frame, pre-render line included
const SCANLINES_PER_FRAME: u64 = 262;

/// Emulator error types
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("failed to load cartridge: {0}")]
    Load(#[from] CartridgeError),
    /// The instance stopped at an unimplemented opcode and no longer runs
    /// until [`Emulator::reset`].
    #[error("emulator halted at unimplemented opcode ${opcode:02X} (PC=${pc:04X})")]
    Halted { opcode: u8, pc: u16 },
}

/// Where the instance stopped under [`OpcodePolicy::Halt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HaltPoint {
    opcode: u8,
    pc: u16,
}

/// A complete NES: cartridge, bus, CPU and PPU owned by one instance
#[derive(Debug, Clone)]
pub struct Emulator {
    cpu: Cpu,
    ppu: Ppu,
    bus: Bus,
    config: EmulatorConfig,
    /// Frame counter
    frame_count: u64,
    halted: Option<HaltPoint>,
    /// Unimplemented opcodes already reported at warn level
    reported_opcodes: HashSet<u8>,
}

impl Emulator {
    /// Parse an iNES image and power the system on with the default config
    pub fn load(rom_data: &[u8]) -> Result<Self, EmulatorError> {
        Self::load_with_config(rom_data, EmulatorConfig::default())
    }

    /// Parse an iNES image and power the system on
    pub fn load_with_config(
        rom_data: &[u8],
        config: EmulatorConfig,
    ) -> Result<Self, EmulatorError> {
        let cartridge = Cartridge::from_rom(rom_data)?;
        let mut emulator = Self {
            cpu: Cpu::new(),
            ppu: Ppu::new(),
            bus: Bus::new(cartridge),
            config,
            frame_count: 0,
            halted: None,
            reported_opcodes: HashSet::new(),
        };
        emulator.reset();
        Ok(emulator)
    }

    /// Power-cycle every component and restart from the reset vector.
    /// Also clears a halted state.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.ppu.reset();
        self.cpu.reset(&mut self.bus);
        self.frame_count = 0;
        self.halted = None;
        self.reported_opcodes.clear();
        log::debug!("Reset: PC=${:04X}", self.cpu.registers().pc);
    }

    /// Run one video frame's worth of instructions and render it
    pub fn run_frame(&mut self) -> Result<(), EmulatorError> {
        if let Some(HaltPoint { opcode, pc }) = self.halted {
            return Err(EmulatorError::Halted { opcode, pc });
        }

        self.bus.ppu_mut().begin_frame();

        let budget = self.config.instructions_per_frame();
        let visible = budget * VBLANK_SCANLINE / SCANLINES_PER_FRAME;
        self.run_instructions(visible)?;

        self.ppu.render_frame(self.bus.ppu(), self.bus.cartridge());
        let (hit, overflow) = (self.ppu.sprite_zero_hit(), self.ppu.sprite_overflow());
        self.bus.ppu_mut().set_sprite_flags(hit, overflow);

        if self.bus.ppu_mut().enter_vblank() {
            self.cpu.nmi(&mut self.bus);
        }
        self.run_instructions(budget - visible)?;

        self.frame_count += 1;
        Ok(())
    }

    /// Execute `count` instructions, applying the opcode policy to every
    /// unimplemented opcode on the way
    fn run_instructions(&mut self, count: u64) -> Result<(), EmulatorError> {
        let target = self.cpu.instructions() + count;
        while self.cpu.instructions() < target {
            let remaining = target - self.cpu.instructions();
            match self.cpu.exec_instructions(&mut self.bus, remaining) {
                Ok(()) => break,
                Err(CpuError::UnimplementedOpcode { opcode, pc }) => {
                    self.unimplemented_opcode(opcode, pc)?;
                }
            }
        }
        Ok(())
    }

    fn unimplemented_opcode(&mut self, opcode: u8, pc: u16) -> Result<(), EmulatorError> {
        match self.config.opcode_policy {
            OpcodePolicy::Skip => {
                if self.reported_opcodes.insert(opcode) {
                    log::warn!("Skipping unimplemented opcode ${opcode:02X} at ${pc:04X}");
                } else {
                    log::trace!("Skipping unimplemented opcode ${opcode:02X} at ${pc:04X}");
                }
                Ok(())
            }
            OpcodePolicy::Halt => {
                log::error!(
                    "Unimplemented opcode ${opcode:02X} at ${pc:04X}, halting after {} frames",
                    self.frame_count
                );
                self.halted = Some(HaltPoint { opcode, pc });
                Err(EmulatorError::Halted { opcode, pc })
            }
        }
    }

    /// Owned copy of the last rendered frame
    pub fn get_frame(&self) -> Framebuffer {
        self.ppu.framebuffer().clone()
    }

    /// Borrow the last rendered frame without copying
    pub fn frame(&self) -> &Framebuffer {
        self.ppu.framebuffer()
    }

    /// Get CPU reference
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Get PPU reference
    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    /// Get bus reference
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Get mutable bus reference
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Get frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// True once an unimplemented opcode stopped the instance
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }
}
