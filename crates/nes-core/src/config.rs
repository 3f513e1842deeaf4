//! Emulator configuration.
//!
//! The core has no config file of its own; hosts build an [`EmulatorConfig`]
//! (usually from command-line flags) and hand it to [`crate::Emulator`].

/// CPU cycles in one NTSC frame (341 dots x 262 lines / 3).
pub const NTSC_CYCLES_PER_FRAME: u32 = 29_780;

/// Average cost of one instruction used to turn the cycle budget into an
/// instruction budget.
pub const DEFAULT_CYCLES_PER_INSTRUCTION: u32 = 3;

/// What the emulator does when the CPU fetches an opcode it cannot execute.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OpcodePolicy {
    /// Log the opcode, step over it and keep running.
    #[default]
    Skip,
    /// Stop the instance and report it inoperable on every later frame.
    Halt,
}

/// Emulator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulatorConfig {
    /// CPU cycles budgeted per video frame.
    pub cycles_per_frame: u32,
    /// Average cycles per instruction.
    pub cycles_per_instruction: u32,
    /// Unimplemented opcode handling.
    pub opcode_policy: OpcodePolicy,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            cycles_per_frame: NTSC_CYCLES_PER_FRAME,
            cycles_per_instruction: DEFAULT_CYCLES_PER_INSTRUCTION,
            opcode_policy: OpcodePolicy::Skip,
        }
    }
}

impl EmulatorConfig {
    #[must_use]
    pub fn with_cycles_per_frame(mut self, cycles: u32) -> Self {
        self.cycles_per_frame = cycles;
        self
    }

    #[must_use]
    pub fn with_cycles_per_instruction(mut self, cycles: u32) -> Self {
        self.cycles_per_instruction = cycles;
        self
    }

    #[must_use]
    pub fn with_opcode_policy(mut self, policy: OpcodePolicy) -> Self {
        self.opcode_policy = policy;
        self
    }

    /// Instructions executed per call to `run_frame`. Never zero.
    #[must_use]
    pub fn instructions_per_frame(&self) -> u64 {
        let per_instruction = self.cycles_per_instruction.max(1);
        u64::from((self.cycles_per_frame / per_instruction).max(1))
    }
}
