//! NES Core - Pure Rust NES emulator library
//!
//! This crate provides the core emulation logic for a Nintendo Entertainment System (NES):
//! the 2A03 CPU interpreter, the CPU address space with cartridge mapper indirection,
//! and a tile-based PPU that renders one frame at a time.
//! It contains no windowing, file or audio dependencies; hosts feed it cartridge bytes
//! and read back framebuffers.

#![forbid(unsafe_code)]

/// CPU module containing the 2A03 (6502 variant) implementation
pub mod cpu;
/// Memory bus and mapping
pub mod bus;
/// PPU (Picture Processing Unit) implementation
pub mod ppu;
/// Cartridge loading (iNES)
pub mod cartridge;
/// Cartridge mappers (NROM, MMC1)
pub mod mapper;
/// Emulator tuning knobs
pub mod config;
/// RGB framebuffer and cross-thread frame hand-off
pub mod framebuffer;
/// Integration module for complete NES system
pub mod system;

pub use cartridge::{Cartridge, CartridgeError, Mirroring};
pub use config::{EmulatorConfig, OpcodePolicy};
pub use framebuffer::{Framebuffer, Rgb, SharedFrame};
pub use system::{Emulator, EmulatorError};

/// Visible screen width in pixels (32 tiles of 8 pixels)
pub const SCREEN_WIDTH: usize = 256;
/// Visible screen height in pixels (30 tiles of 8 pixels)
pub const SCREEN_HEIGHT: usize = 240;
