//! CPU module - 2A03 (6502 variant) implementation
//!
//! The NES uses a modified 6502 CPU without decimal mode: the D flag can be
//! set and cleared but ADC/SBC always work in binary.
//!
//! Each [`Cpu::step`] fetches one opcode, decodes it through a dense match
//! over the opcode byte, resolves the operand for its addressing mode and
//! executes it against a [`Bus`]. Cycle costs are the documented ones,
//! including page-cross and branch penalties.

use std::fmt;

use bitflags::bitflags;
use thiserror::Error;

/// NMI vector
pub const NMI_VECTOR: u16 = 0xFFFA;
/// Reset vector
pub const RESET_VECTOR: u16 = 0xFFFC;
/// IRQ/BRK vector
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Stack page
const STACK_BASE: u16 = 0x0100;

/// Cycles charged for an opcode the CPU does not implement
const UNKNOWN_OPCODE_CYCLES: u32 = 2;

/// Bus trait for memory and I/O access
pub trait Bus {
    /// Read a byte from the given address
    fn read(&mut self, address: u16) -> u8;
    /// Write a byte to the given address
    fn write(&mut self, address: u16, value: u8);
    /// Cycles the CPU was suspended for since the last call (OAM DMA).
    /// Buses without DMA never stall.
    fn take_stall_cycles(&mut self) -> u32 {
        0
    }
}

bitflags! {
    /// CPU status flags (N V - B D I Z C)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const CARRY             = 0b0000_0001;
        const ZERO              = 0b0000_0010;
        const INTERRUPT_DISABLE = 0b0000_0100;
        const DECIMAL           = 0b0000_1000;
        const BREAK             = 0b0001_0000;
        const UNUSED            = 0b0010_0000;
        const OVERFLOW          = 0b0100_0000;
        const NEGATIVE          = 0b1000_0000;
    }
}

impl Default for StatusFlags {
    /// Power-on value 0x24: I and the unused bit set
    fn default() -> Self {
        StatusFlags::INTERRUPT_DISABLE | StatusFlags::UNUSED
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C:{} Z:{} I:{} D:{} B:{} U:{} V:{} N:{}",
            self.contains(StatusFlags::CARRY) as u8,
            self.contains(StatusFlags::ZERO) as u8,
            self.contains(StatusFlags::INTERRUPT_DISABLE) as u8,
            self.contains(StatusFlags::DECIMAL) as u8,
            self.contains(StatusFlags::BREAK) as u8,
            self.contains(StatusFlags::UNUSED) as u8,
            self.contains(StatusFlags::OVERFLOW) as u8,
            self.contains(StatusFlags::NEGATIVE) as u8
        )
    }
}

/// 2A03 CPU registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuRegisters {
    pub a: u8,             // Accumulator
    pub x: u8,             // X index register
    pub y: u8,             // Y index register
    pub p: StatusFlags,    // Processor status
    pub sp: u8,            // Stack pointer
    pub pc: u16,           // Program counter
}

impl Default for CpuRegisters {
    fn default() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            p: StatusFlags::default(),
            sp: 0xFD, // Stack starts at $01FD
            pc: 0,    // Will be set by reset vector
        }
    }
}

impl fmt::Display for CpuRegisters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC:{:04X} A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X}",
            self.pc,
            self.a,
            self.x,
            self.y,
            self.p.bits(),
            self.sp
        )
    }
}

/// Instruction mnemonic (official opcodes only)
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    // Loads and stores
    LDA, LDX, LDY, STA, STX, STY,
    // Register transfers
    TAX, TAY, TSX, TXA, TXS, TYA,
    // Stack
    PHA, PHP, PLA, PLP,
    // Logic
    AND, EOR, ORA, BIT,
    // Arithmetic
    ADC, SBC, CMP, CPX, CPY,
    // Increments and decrements
    INC, INX, INY, DEC, DEX, DEY,
    // Shifts
    ASL, LSR, ROL, ROR,
    // Jumps and calls
    JMP, JSR, RTS,
    // Branches
    BCC, BCS, BEQ, BMI, BNE, BPL, BVC, BVS,
    // Flag changes
    CLC, CLD, CLI, CLV, SEC, SED, SEI,
    // System
    BRK, NOP, RTI,
}

/// Addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

impl AddressingMode {
    /// Operand bytes following the opcode
    pub fn operand_len(self) -> u16 {
        match self {
            AddressingMode::Implied | AddressingMode::Accumulator => 0,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => 2,
            _ => 1,
        }
    }
}

/// CPU instruction info
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionInfo {
    pub mnemonic: Mnemonic,
    pub mode: AddressingMode,
    pub cycles: u8,
    pub page_cycle: bool, // Extra cycle if page crossed
}

const fn op(
    mnemonic: Mnemonic,
    mode: AddressingMode,
    cycles: u8,
    page_cycle: bool,
) -> Option<InstructionInfo> {
    Some(InstructionInfo {
        mnemonic,
        mode,
        cycles,
        page_cycle,
    })
}

/// Decode an opcode byte; `None` for the 105 unofficial opcodes
pub fn decode_opcode(opcode: u8) -> Option<InstructionInfo> {
    use AddressingMode::*;
    use Mnemonic::*;

    match opcode {
        0x69 => op(ADC, Immediate, 2, false),
        0x65 => op(ADC, ZeroPage, 3, false),
        0x75 => op(ADC, ZeroPageX, 4, false),
        0x6D => op(ADC, Absolute, 4, false),
        0x7D => op(ADC, AbsoluteX, 4, true),
        0x79 => op(ADC, AbsoluteY, 4, true),
        0x61 => op(ADC, IndirectX, 6, false),
        0x71 => op(ADC, IndirectY, 5, true),

        0x29 => op(AND, Immediate, 2, false),
        0x25 => op(AND, ZeroPage, 3, false),
        0x35 => op(AND, ZeroPageX, 4, false),
        0x2D => op(AND, Absolute, 4, false),
        0x3D => op(AND, AbsoluteX, 4, true),
        0x39 => op(AND, AbsoluteY, 4, true),
        0x21 => op(AND, IndirectX, 6, false),
        0x31 => op(AND, IndirectY, 5, true),

        0x0A => op(ASL, Accumulator, 2, false),
        0x06 => op(ASL, ZeroPage, 5, false),
        0x16 => op(ASL, ZeroPageX, 6, false),
        0x0E => op(ASL, Absolute, 6, false),
        0x1E => op(ASL, AbsoluteX, 7, false),

        0x90 => op(BCC, Relative, 2, false),
        0xB0 => op(BCS, Relative, 2, false),
        0xF0 => op(BEQ, Relative, 2, false),
        0x30 => op(BMI, Relative, 2, false),
        0xD0 => op(BNE, Relative, 2, false),
        0x10 => op(BPL, Relative, 2, false),
        0x50 => op(BVC, Relative, 2, false),
        0x70 => op(BVS, Relative, 2, false),

        0x24 => op(BIT, ZeroPage, 3, false),
        0x2C => op(BIT, Absolute, 4, false),

        0x00 => op(BRK, Implied, 7, false),

        0x18 => op(CLC, Implied, 2, false),
        0xD8 => op(CLD, Implied, 2, false),
        0x58 => op(CLI, Implied, 2, false),
        0xB8 => op(CLV, Implied, 2, false),

        0xC9 => op(CMP, Immediate, 2, false),
        0xC5 => op(CMP, ZeroPage, 3, false),
        0xD5 => op(CMP, ZeroPageX, 4, false),
        0xCD => op(CMP, Absolute, 4, false),
        0xDD => op(CMP, AbsoluteX, 4, true),
        0xD9 => op(CMP, AbsoluteY, 4, true),
        0xC1 => op(CMP, IndirectX, 6, false),
        0xD1 => op(CMP, IndirectY, 5, true),

        0xE0 => op(CPX, Immediate, 2, false),
        0xE4 => op(CPX, ZeroPage, 3, false),
        0xEC => op(CPX, Absolute, 4, false),

        0xC0 => op(CPY, Immediate, 2, false),
        0xC4 => op(CPY, ZeroPage, 3, false),
        0xCC => op(CPY, Absolute, 4, false),

        0xC6 => op(DEC, ZeroPage, 5, false),
        0xD6 => op(DEC, ZeroPageX, 6, false),
        0xCE => op(DEC, Absolute, 6, false),
        0xDE => op(DEC, AbsoluteX, 7, false),

        0xCA => op(DEX, Implied, 2, false),
        0x88 => op(DEY, Implied, 2, false),

        0x49 => op(EOR, Immediate, 2, false),
        0x45 => op(EOR, ZeroPage, 3, false),
        0x55 => op(EOR, ZeroPageX, 4, false),
        0x4D => op(EOR, Absolute, 4, false),
        0x5D => op(EOR, AbsoluteX, 4, true),
        0x59 => op(EOR, AbsoluteY, 4, true),
        0x41 => op(EOR, IndirectX, 6, false),
        0x51 => op(EOR, IndirectY, 5, true),

        0xE6 => op(INC, ZeroPage, 5, false),
        0xF6 => op(INC, ZeroPageX, 6, false),
        0xEE => op(INC, Absolute, 6, false),
        0xFE => op(INC, AbsoluteX, 7, false),

        0xE8 => op(INX, Implied, 2, false),
        0xC8 => op(INY, Implied, 2, false),

        0x4C => op(JMP, Absolute, 3, false),
        0x6C => op(JMP, Indirect, 5, false),
        0x20 => op(JSR, Absolute, 6, false),

        0xA9 => op(LDA, Immediate, 2, false),
        0xA5 => op(LDA, ZeroPage, 3, false),
        0xB5 => op(LDA, ZeroPageX, 4, false),
        0xAD => op(LDA, Absolute, 4, false),
        0xBD => op(LDA, AbsoluteX, 4, true),
        0xB9 => op(LDA, AbsoluteY, 4, true),
        0xA1 => op(LDA, IndirectX, 6, false),
        0xB1 => op(LDA, IndirectY, 5, true),

        0xA2 => op(LDX, Immediate, 2, false),
        0xA6 => op(LDX, ZeroPage, 3, false),
        0xB6 => op(LDX, ZeroPageY, 4, false),
        0xAE => op(LDX, Absolute, 4, false),
        0xBE => op(LDX, AbsoluteY, 4, true),

        0xA0 => op(LDY, Immediate, 2, false),
        0xA4 => op(LDY, ZeroPage, 3, false),
        0xB4 => op(LDY, ZeroPageX, 4, false),
        0xAC => op(LDY, Absolute, 4, false),
        0xBC => op(LDY, AbsoluteX, 4, true),

        0x4A => op(LSR, Accumulator, 2, false),
        0x46 => op(LSR, ZeroPage, 5, false),
        0x56 => op(LSR, ZeroPageX, 6, false),
        0x4E => op(LSR, Absolute, 6, false),
        0x5E => op(LSR, AbsoluteX, 7, false),

        0xEA => op(NOP, Implied, 2, false),

        0x09 => op(ORA, Immediate, 2, false),
        0x05 => op(ORA, ZeroPage, 3, false),
        0x15 => op(ORA, ZeroPageX, 4, false),
        0x0D => op(ORA, Absolute, 4, false),
        0x1D => op(ORA, AbsoluteX, 4, true),
        0x19 => op(ORA, AbsoluteY, 4, true),
        0x01 => op(ORA, IndirectX, 6, false),
        0x11 => op(ORA, IndirectY, 5, true),

        0x48 => op(PHA, Implied, 3, false),
        0x08 => op(PHP, Implied, 3, false),
        0x68 => op(PLA, Implied, 4, false),
        0x28 => op(PLP, Implied, 4, false),

        0x2A => op(ROL, Accumulator, 2, false),
        0x26 => op(ROL, ZeroPage, 5, false),
        0x36 => op(ROL, ZeroPageX, 6, false),
        0x2E => op(ROL, Absolute, 6, false),
        0x3E => op(ROL, AbsoluteX, 7, false),

        0x6A => op(ROR, Accumulator, 2, false),
        0x66 => op(ROR, ZeroPage, 5, false),
        0x76 => op(ROR, ZeroPageX, 6, false),
        0x6E => op(ROR, Absolute, 6, false),
        0x7E => op(ROR, AbsoluteX, 7, false),

        0x40 => op(RTI, Implied, 6, false),
        0x60 => op(RTS, Implied, 6, false),

        0xE9 => op(SBC, Immediate, 2, false),
        0xE5 => op(SBC, ZeroPage, 3, false),
        0xF5 => op(SBC, ZeroPageX, 4, false),
        0xED => op(SBC, Absolute, 4, false),
        0xFD => op(SBC, AbsoluteX, 4, true),
        0xF9 => op(SBC, AbsoluteY, 4, true),
        0xE1 => op(SBC, IndirectX, 6, false),
        0xF1 => op(SBC, IndirectY, 5, true),

        0x38 => op(SEC, Implied, 2, false),
        0xF8 => op(SED, Implied, 2, false),
        0x78 => op(SEI, Implied, 2, false),

        0x85 => op(STA, ZeroPage, 3, false),
        0x95 => op(STA, ZeroPageX, 4, false),
        0x8D => op(STA, Absolute, 4, false),
        0x9D => op(STA, AbsoluteX, 5, false),
        0x99 => op(STA, AbsoluteY, 5, false),
        0x81 => op(STA, IndirectX, 6, false),
        0x91 => op(STA, IndirectY, 6, false),

        0x86 => op(STX, ZeroPage, 3, false),
        0x96 => op(STX, ZeroPageY, 4, false),
        0x8E => op(STX, Absolute, 4, false),

        0x84 => op(STY, ZeroPage, 3, false),
        0x94 => op(STY, ZeroPageX, 4, false),
        0x8C => op(STY, Absolute, 4, false),

        0xAA => op(TAX, Implied, 2, false),
        0xA8 => op(TAY, Implied, 2, false),
        0xBA => op(TSX, Implied, 2, false),
        0x8A => op(TXA, Implied, 2, false),
        0x9A => op(TXS, Implied, 2, false),
        0x98 => op(TYA, Implied, 2, false),

        _ => None,
    }
}

/// CPU error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    /// The opcode at `pc` is not one of the official 151. The CPU has already
    /// stepped over it; every other register is untouched.
    #[error("unimplemented opcode ${opcode:02X} at ${pc:04X}")]
    UnimplementedOpcode { opcode: u8, pc: u16 },
}

/// Resolved operand location
#[derive(Debug, Clone, Copy)]
enum Operand {
    None,
    Accumulator,
    Memory(u16),
}

/// CPU emulator state
#[derive(Debug, Clone, Default)]
pub struct Cpu {
    registers: CpuRegisters,
    /// Total cycles executed
    cycles: u64,
    /// Retired instructions, skipped unknown opcodes included
    instructions: u64,
}

impl Cpu {
    /// Create a new CPU instance in power-on state. The program counter is
    /// only loaded by [`Cpu::reset`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the CPU: registers to power-on values, PC from the reset vector
    pub fn reset(&mut self, bus: &mut impl Bus) {
        self.registers = CpuRegisters::default();
        self.registers.pc = read_u16(bus, RESET_VECTOR);
        self.cycles = 0;
        self.instructions = 0;
    }

    /// Get CPU registers
    pub fn registers(&self) -> &CpuRegisters {
        &self.registers
    }

    /// Mutable registers, for test harnesses that start at a fixed PC
    pub fn registers_mut(&mut self) -> &mut CpuRegisters {
        &mut self.registers
    }

    /// Get CPU status flags
    pub fn status(&self) -> StatusFlags {
        self.registers.p
    }

    /// Get total cycles executed
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Get retired instruction count
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    /// Execute exactly `count` instructions, stopping early at the first
    /// unimplemented opcode. The faulting opcode is already stepped over, so
    /// calling again resumes after it.
    pub fn exec_instructions(&mut self, bus: &mut impl Bus, count: u64) -> Result<(), CpuError> {
        for _ in 0..count {
            self.step(bus)?;
        }
        Ok(())
    }

    /// Step one instruction. Returns the cycles it took, DMA stalls included.
    pub fn step(&mut self, bus: &mut impl Bus) -> Result<u32, CpuError> {
        let pc = self.registers.pc;
        let opcode = self.fetch(bus);
        self.instructions += 1;

        let Some(info) = decode_opcode(opcode) else {
            self.cycles += u64::from(UNKNOWN_OPCODE_CYCLES);
            return Err(CpuError::UnimplementedOpcode { opcode, pc });
        };

        let (operand, page_crossed) = self.resolve_operand(bus, info.mode);
        let mut cycles = u32::from(info.cycles);
        if info.page_cycle && page_crossed {
            cycles += 1;
        }
        cycles += self.execute(bus, info.mnemonic, operand);
        cycles += bus.take_stall_cycles();

        self.cycles += u64::from(cycles);
        Ok(cycles)
    }

    /// Non-maskable interrupt: always taken
    pub fn nmi(&mut self, bus: &mut impl Bus) {
        self.interrupt(bus, NMI_VECTOR);
    }

    /// Maskable interrupt request. Returns false if I is set and the request
    /// was ignored.
    pub fn irq(&mut self, bus: &mut impl Bus) -> bool {
        if self.registers.p.contains(StatusFlags::INTERRUPT_DISABLE) {
            return false;
        }
        self.interrupt(bus, IRQ_VECTOR);
        true
    }

    fn interrupt(&mut self, bus: &mut impl Bus, vector: u16) {
        self.push_u16(bus, self.registers.pc);
        // Hardware interrupts push B clear
        let flags = (self.registers.p - StatusFlags::BREAK) | StatusFlags::UNUSED;
        self.push(bus, flags.bits());
        self.registers.p.insert(StatusFlags::INTERRUPT_DISABLE);
        self.registers.pc = read_u16(bus, vector);
        self.cycles += 7;
    }

    fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let value = bus.read(self.registers.pc);
        self.registers.pc = self.registers.pc.wrapping_add(1);
        value
    }

    fn fetch_u16(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Work out where the operand lives and advance PC past it. The flag
    /// reports an indexed access that crossed a page boundary.
    fn resolve_operand(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> (Operand, bool) {
        let x = self.registers.x;
        let y = self.registers.y;

        match mode {
            AddressingMode::Implied => (Operand::None, false),
            AddressingMode::Accumulator => (Operand::Accumulator, false),
            AddressingMode::Immediate => {
                let address = self.registers.pc;
                self.registers.pc = self.registers.pc.wrapping_add(1);
                (Operand::Memory(address), false)
            }
            AddressingMode::ZeroPage => (Operand::Memory(u16::from(self.fetch(bus))), false),
            AddressingMode::ZeroPageX => {
                let address = self.fetch(bus).wrapping_add(x);
                (Operand::Memory(u16::from(address)), false)
            }
            AddressingMode::ZeroPageY => {
                let address = self.fetch(bus).wrapping_add(y);
                (Operand::Memory(u16::from(address)), false)
            }
            AddressingMode::Absolute => (Operand::Memory(self.fetch_u16(bus)), false),
            AddressingMode::AbsoluteX => {
                let base = self.fetch_u16(bus);
                let address = base.wrapping_add(u16::from(x));
                (Operand::Memory(address), page_crossed(base, address))
            }
            AddressingMode::AbsoluteY => {
                let base = self.fetch_u16(bus);
                let address = base.wrapping_add(u16::from(y));
                (Operand::Memory(address), page_crossed(base, address))
            }
            AddressingMode::Indirect => {
                // JMP ($xxFF) fetches the high byte from $xx00
                let pointer = self.fetch_u16(bus);
                let lo = bus.read(pointer);
                let hi = bus.read((pointer & 0xFF00) | (pointer.wrapping_add(1) & 0x00FF));
                (Operand::Memory(u16::from_le_bytes([lo, hi])), false)
            }
            AddressingMode::IndirectX => {
                let pointer = self.fetch(bus).wrapping_add(x);
                (Operand::Memory(read_zero_page_u16(bus, pointer)), false)
            }
            AddressingMode::IndirectY => {
                let pointer = self.fetch(bus);
                let base = read_zero_page_u16(bus, pointer);
                let address = base.wrapping_add(u16::from(y));
                (Operand::Memory(address), page_crossed(base, address))
            }
            AddressingMode::Relative => {
                let offset = self.fetch(bus) as i8;
                let target = self.registers.pc.wrapping_add(offset as u16);
                (Operand::Memory(target), false)
            }
        }
    }

    fn load(&mut self, bus: &mut impl Bus, operand: Operand) -> u8 {
        match operand {
            Operand::Memory(address) => bus.read(address),
            Operand::Accumulator => self.registers.a,
            Operand::None => 0,
        }
    }

    fn store(&mut self, bus: &mut impl Bus, operand: Operand, value: u8) {
        match operand {
            Operand::Memory(address) => bus.write(address, value),
            Operand::Accumulator => self.registers.a = value,
            Operand::None => {}
        }
    }

    /// Run one decoded instruction. Returns extra cycles (taken branches).
    fn execute(&mut self, bus: &mut impl Bus, mnemonic: Mnemonic, operand: Operand) -> u32 {
        use Mnemonic::*;

        match mnemonic {
            LDA => {
                let value = self.load(bus, operand);
                self.registers.a = value;
                self.set_zn(value);
            }
            LDX => {
                let value = self.load(bus, operand);
                self.registers.x = value;
                self.set_zn(value);
            }
            LDY => {
                let value = self.load(bus, operand);
                self.registers.y = value;
                self.set_zn(value);
            }
            STA => self.store(bus, operand, self.registers.a),
            STX => self.store(bus, operand, self.registers.x),
            STY => self.store(bus, operand, self.registers.y),

            TAX => {
                self.registers.x = self.registers.a;
                self.set_zn(self.registers.x);
            }
            TAY => {
                self.registers.y = self.registers.a;
                self.set_zn(self.registers.y);
            }
            TSX => {
                self.registers.x = self.registers.sp;
                self.set_zn(self.registers.x);
            }
            TXA => {
                self.registers.a = self.registers.x;
                self.set_zn(self.registers.a);
            }
            TXS => self.registers.sp = self.registers.x,
            TYA => {
                self.registers.a = self.registers.y;
                self.set_zn(self.registers.a);
            }

            PHA => self.push(bus, self.registers.a),
            PHP => {
                let flags = self.registers.p | StatusFlags::BREAK | StatusFlags::UNUSED;
                self.push(bus, flags.bits());
            }
            PLA => {
                let value = self.pull(bus);
                self.registers.a = value;
                self.set_zn(value);
            }
            PLP => {
                let value = self.pull(bus);
                self.set_flags_from_stack(value);
            }

            AND => {
                let value = self.registers.a & self.load(bus, operand);
                self.registers.a = value;
                self.set_zn(value);
            }
            EOR => {
                let value = self.registers.a ^ self.load(bus, operand);
                self.registers.a = value;
                self.set_zn(value);
            }
            ORA => {
                let value = self.registers.a | self.load(bus, operand);
                self.registers.a = value;
                self.set_zn(value);
            }
            BIT => {
                let value = self.load(bus, operand);
                let p = &mut self.registers.p;
                p.set(StatusFlags::ZERO, self.registers.a & value == 0);
                p.set(StatusFlags::OVERFLOW, value & 0x40 != 0);
                p.set(StatusFlags::NEGATIVE, value & 0x80 != 0);
            }

            ADC => {
                let value = self.load(bus, operand);
                self.add_with_carry(value);
            }
            SBC => {
                // A - M - !C == A + !M + C
                let value = self.load(bus, operand);
                self.add_with_carry(!value);
            }
            CMP => {
                let value = self.load(bus, operand);
                self.compare(self.registers.a, value);
            }
            CPX => {
                let value = self.load(bus, operand);
                self.compare(self.registers.x, value);
            }
            CPY => {
                let value = self.load(bus, operand);
                self.compare(self.registers.y, value);
            }

            INC => {
                let value = self.load(bus, operand).wrapping_add(1);
                self.store(bus, operand, value);
                self.set_zn(value);
            }
            INX => {
                self.registers.x = self.registers.x.wrapping_add(1);
                self.set_zn(self.registers.x);
            }
            INY => {
                self.registers.y = self.registers.y.wrapping_add(1);
                self.set_zn(self.registers.y);
            }
            DEC => {
                let value = self.load(bus, operand).wrapping_sub(1);
                self.store(bus, operand, value);
                self.set_zn(value);
            }
            DEX => {
                self.registers.x = self.registers.x.wrapping_sub(1);
                self.set_zn(self.registers.x);
            }
            DEY => {
                self.registers.y = self.registers.y.wrapping_sub(1);
                self.set_zn(self.registers.y);
            }

            ASL => {
                let value = self.load(bus, operand);
                let result = value << 1;
                self.registers.p.set(StatusFlags::CARRY, value & 0x80 != 0);
                self.store(bus, operand, result);
                self.set_zn(result);
            }
            LSR => {
                let value = self.load(bus, operand);
                let result = value >> 1;
                self.registers.p.set(StatusFlags::CARRY, value & 0x01 != 0);
                self.store(bus, operand, result);
                self.set_zn(result);
            }
            ROL => {
                let value = self.load(bus, operand);
                let carry_in = self.registers.p.contains(StatusFlags::CARRY) as u8;
                let result = (value << 1) | carry_in;
                self.registers.p.set(StatusFlags::CARRY, value & 0x80 != 0);
                self.store(bus, operand, result);
                self.set_zn(result);
            }
            ROR => {
                let value = self.load(bus, operand);
                let carry_in = (self.registers.p.contains(StatusFlags::CARRY) as u8) << 7;
                let result = (value >> 1) | carry_in;
                self.registers.p.set(StatusFlags::CARRY, value & 0x01 != 0);
                self.store(bus, operand, result);
                self.set_zn(result);
            }

            JMP => {
                if let Operand::Memory(target) = operand {
                    self.registers.pc = target;
                }
            }
            JSR => {
                if let Operand::Memory(target) = operand {
                    // Return address is the last byte of the JSR instruction
                    let ret = self.registers.pc.wrapping_sub(1);
                    self.push_u16(bus, ret);
                    self.registers.pc = target;
                }
            }
            RTS => {
                self.registers.pc = self.pull_u16(bus).wrapping_add(1);
            }
            RTI => {
                let flags = self.pull(bus);
                self.set_flags_from_stack(flags);
                self.registers.pc = self.pull_u16(bus);
            }

            BCC => return self.branch(operand, !self.registers.p.contains(StatusFlags::CARRY)),
            BCS => return self.branch(operand, self.registers.p.contains(StatusFlags::CARRY)),
            BNE => return self.branch(operand, !self.registers.p.contains(StatusFlags::ZERO)),
            BEQ => return self.branch(operand, self.registers.p.contains(StatusFlags::ZERO)),
            BPL => return self.branch(operand, !self.registers.p.contains(StatusFlags::NEGATIVE)),
            BMI => return self.branch(operand, self.registers.p.contains(StatusFlags::NEGATIVE)),
            BVC => return self.branch(operand, !self.registers.p.contains(StatusFlags::OVERFLOW)),
            BVS => return self.branch(operand, self.registers.p.contains(StatusFlags::OVERFLOW)),

            CLC => self.registers.p.remove(StatusFlags::CARRY),
            CLD => self.registers.p.remove(StatusFlags::DECIMAL),
            CLI => self.registers.p.remove(StatusFlags::INTERRUPT_DISABLE),
            CLV => self.registers.p.remove(StatusFlags::OVERFLOW),
            SEC => self.registers.p.insert(StatusFlags::CARRY),
            SED => self.registers.p.insert(StatusFlags::DECIMAL),
            SEI => self.registers.p.insert(StatusFlags::INTERRUPT_DISABLE),

            // BRK only marks the break flag and steps over its opcode; there
            // is no stack frame and no jump through $FFFE
            BRK => self.registers.p.insert(StatusFlags::BREAK),
            NOP => {}
        }
        0
    }

    fn add_with_carry(&mut self, value: u8) {
        let a = self.registers.a;
        let carry = self.registers.p.contains(StatusFlags::CARRY) as u16;
        let sum = u16::from(a) + u16::from(value) + carry;
        let result = sum as u8;

        self.registers.p.set(StatusFlags::CARRY, sum > 0xFF);
        self.registers
            .p
            .set(StatusFlags::OVERFLOW, (a ^ result) & (value ^ result) & 0x80 != 0);
        self.registers.a = result;
        self.set_zn(result);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.registers.p.set(StatusFlags::CARRY, register >= value);
        self.set_zn(register.wrapping_sub(value));
    }

    /// Take the branch if `condition` holds: +1 cycle, +1 more when the
    /// target is on another page
    fn branch(&mut self, operand: Operand, condition: bool) -> u32 {
        let Operand::Memory(target) = operand else {
            return 0;
        };
        if !condition {
            return 0;
        }
        let extra = if page_crossed(self.registers.pc, target) { 2 } else { 1 };
        self.registers.pc = target;
        extra
    }

    fn set_zn(&mut self, value: u8) {
        self.registers.p.set(StatusFlags::ZERO, value == 0);
        self.registers.p.set(StatusFlags::NEGATIVE, value & 0x80 != 0);
    }

    /// PLP/RTI: B is not a real latch and bit 5 always reads set
    fn set_flags_from_stack(&mut self, value: u8) {
        self.registers.p =
            (StatusFlags::from_bits_truncate(value) - StatusFlags::BREAK) | StatusFlags::UNUSED;
    }

    fn push(&mut self, bus: &mut impl Bus, value: u8) {
        bus.write(STACK_BASE | u16::from(self.registers.sp), value);
        self.registers.sp = self.registers.sp.wrapping_sub(1);
    }

    fn push_u16(&mut self, bus: &mut impl Bus, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push(bus, hi);
        self.push(bus, lo);
    }

    fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.registers.sp = self.registers.sp.wrapping_add(1);
        bus.read(STACK_BASE | u16::from(self.registers.sp))
    }

    fn pull_u16(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.pull(bus);
        let hi = self.pull(bus);
        u16::from_le_bytes([lo, hi])
    }
}

#[inline]
fn page_crossed(a: u16, b: u16) -> bool {
    a & 0xFF00 != b & 0xFF00
}

fn read_u16(bus: &mut impl Bus, address: u16) -> u16 {
    let lo = bus.read(address);
    let hi = bus.read(address.wrapping_add(1));
    u16::from_le_bytes([lo, hi])
}

/// Pointer read that wraps within page zero
fn read_zero_page_u16(bus: &mut impl Bus, pointer: u8) -> u16 {
    let lo = bus.read(u16::from(pointer));
    let hi = bus.read(u16::from(pointer.wrapping_add(1)));
    u16::from_le_bytes([lo, hi])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat 64KB RAM
    struct TestBus {
        memory: Vec<u8>,
    }

    impl TestBus {
        fn with_program(origin: u16, program: &[u8]) -> Self {
            let mut memory = vec![0; 0x10000];
            memory[origin as usize..origin as usize + program.len()].copy_from_slice(program);
            memory[RESET_VECTOR as usize] = origin as u8;
            memory[RESET_VECTOR as usize + 1] = (origin >> 8) as u8;
            Self { memory }
        }
    }

    impl Bus for TestBus {
        fn read(&mut self, address: u16) -> u8 {
            self.memory[address as usize]
        }

        fn write(&mut self, address: u16, value: u8) {
            self.memory[address as usize] = value;
        }
    }

    fn boot(program: &[u8]) -> (Cpu, TestBus) {
        let mut bus = TestBus::with_program(0x8000, program);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        (cpu, bus)
    }

    #[test]
    fn test_cpu_reset() {
        let (cpu, _) = boot(&[]);
        let r = cpu.registers();
        assert_eq!(r.pc, 0x8000);
        assert_eq!(r.sp, 0xFD);
        assert_eq!(r.p.bits(), 0x24);
        assert_eq!((r.a, r.x, r.y), (0, 0, 0));
    }

    #[test]
    fn test_status_flags() {
        let mut flags = StatusFlags::from_bits_truncate(0xFF);
        assert!(flags.contains(StatusFlags::CARRY));
        flags.remove(StatusFlags::CARRY);
        assert!(!flags.contains(StatusFlags::CARRY));
        assert_eq!(
            StatusFlags::default().to_string(),
            "C:0 Z:0 I:1 D:0 B:0 U:1 V:0 N:0"
        );
    }

    #[test]
    fn test_official_opcode_count() {
        let count = (0..=0xFFu8).filter(|&op| decode_opcode(op).is_some()).count();
        assert_eq!(count, 151);
    }

    #[test]
    fn test_lda_immediate_zero() {
        let (mut cpu, mut bus) = boot(&[0xA9, 0x00]);
        let cycles = cpu.step(&mut bus).unwrap();
        let r = cpu.registers();
        assert_eq!(r.a, 0);
        assert!(r.p.contains(StatusFlags::ZERO));
        assert!(!r.p.contains(StatusFlags::NEGATIVE));
        assert_eq!(r.pc, 0x8002);
        assert_eq!(cycles, 2);
        assert_eq!(cpu.cycles(), 2);
    }

    #[test]
    fn test_brk_sets_break_flag() {
        let (mut cpu, mut bus) = boot(&[0x00]);
        let cycles = cpu.step(&mut bus).unwrap();
        assert!(cpu.status().contains(StatusFlags::BREAK));
        assert!(cpu.status().contains(StatusFlags::UNUSED));
        assert_eq!(cpu.registers().pc, 0x8001);
        assert_eq!(cycles, 7);
    }

    #[test]
    fn test_unknown_opcode_is_skipped() {
        let (mut cpu, mut bus) = boot(&[0x02, 0xA9, 0x07]);
        let before = *cpu.registers();
        let err = cpu.step(&mut bus).unwrap_err();
        assert_eq!(
            err,
            CpuError::UnimplementedOpcode {
                opcode: 0x02,
                pc: 0x8000
            }
        );
        let after = cpu.registers();
        assert_eq!(after.pc, 0x8001);
        assert_eq!(
            (after.a, after.x, after.y, after.sp, after.p),
            (before.a, before.x, before.y, before.sp, before.p)
        );
        assert_eq!(cpu.cycles(), 2);
        assert_eq!(cpu.instructions(), 1);

        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.registers().a, 7);
    }

    #[test]
    fn test_adc_overflow_and_carry() {
        // CLC; LDA #$50; ADC #$50
        let (mut cpu, mut bus) = boot(&[0x18, 0xA9, 0x50, 0x69, 0x50]);
        cpu.exec_instructions(&mut bus, 3).unwrap();
        let p = cpu.status();
        assert_eq!(cpu.registers().a, 0xA0);
        assert!(p.contains(StatusFlags::OVERFLOW));
        assert!(p.contains(StatusFlags::NEGATIVE));
        assert!(!p.contains(StatusFlags::CARRY));
    }

    #[test]
    fn test_sbc_borrow() {
        // SEC; LDA #$00; SBC #$01
        let (mut cpu, mut bus) = boot(&[0x38, 0xA9, 0x00, 0xE9, 0x01]);
        cpu.exec_instructions(&mut bus, 3).unwrap();
        assert_eq!(cpu.registers().a, 0xFF);
        assert!(!cpu.status().contains(StatusFlags::CARRY));
        assert!(cpu.status().contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_decimal_flag_does_not_change_adc() {
        // SED; CLC; LDA #$09; ADC #$01
        let (mut cpu, mut bus) = boot(&[0xF8, 0x18, 0xA9, 0x09, 0x69, 0x01]);
        cpu.exec_instructions(&mut bus, 4).unwrap();
        assert_eq!(cpu.registers().a, 0x0A);
    }

    #[test]
    fn test_jsr_rts() {
        // JSR $8010; LDX #$01 ... $8010: LDY #$02; RTS
        let mut program = vec![0x20, 0x10, 0x80, 0xA2, 0x01];
        program.resize(0x10, 0xEA);
        program.extend_from_slice(&[0xA0, 0x02, 0x60]);
        let (mut cpu, mut bus) = boot(&program);

        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.registers().pc, 0x8010);
        assert_eq!(cpu.registers().sp, 0xFB);
        assert_eq!(bus.memory[0x01FD], 0x80);
        assert_eq!(bus.memory[0x01FC], 0x02);

        cpu.exec_instructions(&mut bus, 3).unwrap();
        assert_eq!(cpu.registers().x, 1);
        assert_eq!(cpu.registers().y, 2);
        assert_eq!(cpu.registers().sp, 0xFD);
    }

    #[test]
    fn test_php_plp_break_and_unused_bits() {
        // PHP; PLA; LDA #$00; PHA; PLP
        let (mut cpu, mut bus) = boot(&[0x08, 0x68, 0xA9, 0x00, 0x48, 0x28]);
        cpu.exec_instructions(&mut bus, 2).unwrap();
        assert_eq!(cpu.registers().a, 0x34);
        cpu.exec_instructions(&mut bus, 3).unwrap();
        assert_eq!(cpu.status().bits(), 0x20);
    }

    #[test]
    fn test_jmp_indirect_page_wrap() {
        let (mut cpu, mut bus) = boot(&[0x6C, 0xFF, 0x02]);
        bus.memory[0x02FF] = 0x34;
        bus.memory[0x0200] = 0x12;
        bus.memory[0x0300] = 0x56;
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.registers().pc, 0x1234);
    }

    #[test]
    fn test_page_cross_penalty() {
        // LDX #$01; LDA $80FF,X
        let (mut cpu, mut bus) = boot(&[0xA2, 0x01, 0xBD, 0xFF, 0x80]);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.step(&mut bus).unwrap(), 5);
    }

    #[test]
    fn test_branch_cycles() {
        // LDA #$00; BEQ +2 (taken); BNE +0 (not taken)
        let (mut cpu, mut bus) = boot(&[0xA9, 0x00, 0xF0, 0x02, 0xEA, 0xEA, 0xD0, 0x00]);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.step(&mut bus).unwrap(), 3);
        assert_eq!(cpu.registers().pc, 0x8006);
        assert_eq!(cpu.step(&mut bus).unwrap(), 2);
        assert_eq!(cpu.registers().pc, 0x8008);
    }

    #[test]
    fn test_branch_page_cross() {
        // At $80FD: BNE -> $8100 region
        let mut program = vec![0xEA; 0xFD];
        program.extend_from_slice(&[0xD0, 0x10]);
        let (mut cpu, mut bus) = boot(&program);
        cpu.registers_mut().pc = 0x80FD;
        assert_eq!(cpu.step(&mut bus).unwrap(), 4);
        assert_eq!(cpu.registers().pc, 0x810F);
    }

    #[test]
    fn test_indirect_y_zero_page_wrap() {
        // LDY #$01; LDA ($FF),Y
        let (mut cpu, mut bus) = boot(&[0xA0, 0x01, 0xB1, 0xFF]);
        bus.memory[0x00FF] = 0x00;
        bus.memory[0x0000] = 0x03;
        bus.memory[0x0301] = 0x42;
        cpu.exec_instructions(&mut bus, 2).unwrap();
        assert_eq!(cpu.registers().a, 0x42);
    }

    #[test]
    fn test_nmi_and_irq() {
        let (mut cpu, mut bus) = boot(&[0xEA]);
        bus.memory[NMI_VECTOR as usize] = 0x00;
        bus.memory[NMI_VECTOR as usize + 1] = 0x90;
        bus.memory[IRQ_VECTOR as usize] = 0x00;
        bus.memory[IRQ_VECTOR as usize + 1] = 0xA0;

        // I is set after reset
        assert!(!cpu.irq(&mut bus));
        assert_eq!(cpu.registers().pc, 0x8000);

        cpu.nmi(&mut bus);
        assert_eq!(cpu.registers().pc, 0x9000);
        assert_eq!(cpu.registers().sp, 0xFA);
        // Pushed flags: B clear, U set
        assert_eq!(bus.memory[0x01FB], 0x24);
        assert_eq!(cpu.cycles(), 7);

        cpu.registers_mut().p.remove(StatusFlags::INTERRUPT_DISABLE);
        assert!(cpu.irq(&mut bus));
        assert_eq!(cpu.registers().pc, 0xA000);
    }

    #[test]
    fn test_rti_restores_state() {
        // SEC; PHP-like frame built by NMI, then RTI at the handler
        let (mut cpu, mut bus) = boot(&[0x38]);
        bus.memory[NMI_VECTOR as usize] = 0x00;
        bus.memory[NMI_VECTOR as usize + 1] = 0x90;
        bus.memory[0x9000] = 0x40;
        cpu.step(&mut bus).unwrap();
        cpu.nmi(&mut bus);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.registers().pc, 0x8001);
        assert_eq!(cpu.status().bits(), 0x25);
        assert_eq!(cpu.registers().sp, 0xFD);
    }

    #[test]
    fn test_rmw_and_compare() {
        // INC $10; INC $10; LDA #$02; CMP $10; ASL $10
        let (mut cpu, mut bus) =
            boot(&[0xE6, 0x10, 0xE6, 0x10, 0xA9, 0x02, 0xC5, 0x10, 0x06, 0x10]);
        cpu.exec_instructions(&mut bus, 4).unwrap();
        assert!(cpu.status().contains(StatusFlags::ZERO));
        assert!(cpu.status().contains(StatusFlags::CARRY));
        cpu.step(&mut bus).unwrap();
        assert_eq!(bus.memory[0x10], 0x04);
        assert!(!cpu.status().contains(StatusFlags::CARRY));
    }

    #[test]
    fn test_stack_pointer_wraps() {
        // LDX #$00; TXS; PHA
        let (mut cpu, mut bus) = boot(&[0xA2, 0x00, 0x9A, 0x48]);
        cpu.exec_instructions(&mut bus, 3).unwrap();
        assert_eq!(cpu.registers().sp, 0xFF);
    }
}
