use crate::mem::MemFault;

/// Terminal result of executing one instruction.
///
/// Everything other than [`Outcome::Ok`] ends the current scheduling quantum.
/// For every non-`Ok` outcome the program counter is left pointing one
/// instruction past the one that produced it; the caller backs it off by 4 to
/// report or retry the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Ok,
    AlignmentFault,
    /// Load/store to an address outside the process image.
    DataAbort,
    /// Instruction fetch from an address outside the process image.
    PrefetchAbort,
    Syscall,
    Breakpoint,
    /// Undecodable or unsupported instruction. This is an interpreter or
    /// toolchain bug, never an expected guest fault.
    Fatal,
}

impl Outcome {
    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, Outcome::Ok)
    }

    /// Whether the outcome is a guest memory fault.
    pub const fn is_memory_fault(self) -> bool {
        matches!(self, Outcome::AlignmentFault | Outcome::DataAbort)
    }
}

impl From<MemFault> for Outcome {
    fn from(fault: MemFault) -> Self {
        match fault {
            MemFault::Alignment => Outcome::AlignmentFault,
            MemFault::DataAbort => Outcome::DataAbort,
        }
    }
}
