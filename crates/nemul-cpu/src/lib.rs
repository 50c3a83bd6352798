#![forbid(unsafe_code)]

//! ARMv5TE interpreter for the Nemul console.
//!
//! The interpreter is a pure function over a [`state::CpuState`] and a flat
//! guest memory slice: it has no notion of processes, scheduling or I/O. Each
//! call to [`interp::step`] executes exactly one ARM-state instruction and
//! returns an [`Outcome`] that the caller (normally the `nemul-vm` scheduler)
//! acts on.
//!
//! Thumb state, coprocessor instructions and SWI are not emulated; they decode
//! to [`Outcome::Fatal`].

pub mod interp;
pub mod mem;
pub mod shifter;
pub mod state;
pub mod trace;

mod outcome;

pub use interp::{run, step, step_forced, step_forced_unbacked, RunResult};
pub use mem::{MemFault, MIN_VALID_ADDR};
pub use outcome::Outcome;
pub use state::{condition_passed, CpuState, Psr};

/// `UDF #0x92`: the console's syscall trap.
pub const SYSCALL_INSN: u32 = 0xE7F0_09F2;

/// The ARM breakpoint word GDB plants for software breakpoints.
pub const GDB_BREAKPOINT_INSN: u32 = 0xE7FF_DEFE;

/// `B .`: a branch to itself. Guest code never contains it; it is used as a
/// trap while bringing up the interpreter.
pub const SELF_BRANCH_INSN: u32 = 0xEAFF_FFFE;
