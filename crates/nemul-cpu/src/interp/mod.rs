//! Instruction decode and execute.
//!
//! Decode is a cascade of `(mask, pattern)` matches over the raw instruction
//! word. The order matters: the multiply, extra load/store and miscellaneous
//! encodings all live inside the data-processing space of group 0 and must be
//! matched before falling back to data processing.

mod alu;
mod branch;
mod load_store;
mod misc;
mod multiply;

use crate::mem::{self, MemFault};
use crate::outcome::Outcome;
use crate::state::{condition_passed, CpuState, Psr, COND_UNCONDITIONAL, REG_PC};
use crate::{GDB_BREAKPOINT_INSN, SELF_BRANCH_INSN, SYSCALL_INSN};

/// Offset of the value reads of r15 observe relative to the executing
/// instruction.
pub const PC_READ_OFFSET: u32 = 8;

pub(crate) type ExecResult = Result<(), Outcome>;

type Handler = fn(&mut Exec<'_>) -> ExecResult;

/// Group 0 encodings that are not plain data processing, in match priority.
const GROUP0: &[(u32, u32, Handler)] = &[
    (0x0FC0_00F0, 0x0000_0090, multiply::mul),
    (0x0F80_00F0, 0x0080_0090, multiply::mul_long),
    (0x0FB0_0FF0, 0x0100_0090, load_store::swap),
    (0x0E00_00F0, 0x0000_00B0, load_store::halfword),
    (0x0E10_00F0, 0x0000_00D0, load_store::load_doubleword),
    (0x0E10_00F0, 0x0010_00D0, load_store::load_signed_byte),
    (0x0E10_00F0, 0x0000_00F0, load_store::store_doubleword),
    (0x0E10_00F0, 0x0010_00F0, load_store::load_signed_halfword),
    (0x0FBF_0FFF, 0x010F_0000, misc::mrs),
    (0x0FB0_FFF0, 0x0120_F000, misc::msr_register),
    (0x0FFF_FFF0, 0x012F_FF10, misc::bx),
    (0x0FFF_FFF0, 0x012F_FF30, misc::blx_register),
    (0x0FFF_0FF0, 0x016F_0F10, misc::clz),
    (0x0FF0_00F0, 0x0120_0070, misc::bkpt),
    (0x0F90_00F0, 0x0100_0050, misc::saturating_add_sub),
    (0x0FF0_0090, 0x0100_0080, multiply::smla_xy),
    (0x0FF0_00B0, 0x0120_0080, multiply::smlaw_y),
    (0x0FF0_00B0, 0x0120_00A0, multiply::smulw_y),
    (0x0FF0_0090, 0x0140_0080, multiply::smlal_xy),
    (0x0FF0_0090, 0x0160_0080, multiply::smul_xy),
];

/// Result of [`run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    /// Instructions that completed with [`Outcome::Ok`].
    pub executed: u64,
    pub outcome: Outcome,
}

/// Execute the instruction at PC.
pub fn step(state: &mut CpuState, mem: &mut [u8]) -> Outcome {
    execute(state, mem, None, Stores::Checked)
}

/// Execute `insn` as if it had been fetched from PC.
///
/// The PC is not validated. Used to replay captured instruction traces.
pub fn step_forced(state: &mut CpuState, mem: &mut [u8], insn: u32) -> Outcome {
    execute(state, mem, Some(insn), Stores::Checked)
}

/// Like [`step_forced`], but an aligned store to an address `mem` does not
/// back is dropped instead of raising [`Outcome::DataAbort`].
///
/// Loads and SWP are still bounds checked.
pub fn step_forced_unbacked(state: &mut CpuState, mem: &mut [u8], insn: u32) -> Outcome {
    execute(state, mem, Some(insn), Stores::DropUnbacked)
}

/// Step until `budget` instructions have completed or an instruction returns
/// something other than [`Outcome::Ok`].
pub fn run(state: &mut CpuState, mem: &mut [u8], budget: u64) -> RunResult {
    let mut executed = 0u64;
    while executed < budget {
        let outcome = step(state, mem);
        if !outcome.is_ok() {
            return RunResult { executed, outcome };
        }
        executed += 1;
    }
    RunResult {
        executed,
        outcome: Outcome::Ok,
    }
}

/// What a store outside guest memory does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stores {
    Checked,
    DropUnbacked,
}

fn execute(state: &mut CpuState, mem: &mut [u8], forced: Option<u32>, stores: Stores) -> Outcome {
    let pc = state.pc();
    let next = pc.wrapping_add(4);

    let insn = match forced {
        Some(insn) => insn,
        None => {
            if pc & 3 != 0 {
                state.set_pc(next);
                return Outcome::Fatal;
            }
            match mem::read_u32(mem, pc) {
                Ok(insn) => insn,
                Err(_) => {
                    state.set_pc(next);
                    return Outcome::PrefetchAbort;
                }
            }
        }
    };

    state.set_pc(pc.wrapping_add(PC_READ_OFFSET));
    let mut ex = Exec {
        state,
        mem,
        insn,
        stores,
        branched: false,
    };
    let outcome = match ex.dispatch() {
        Ok(()) => Outcome::Ok,
        Err(outcome) => outcome,
    };
    if !outcome.is_ok() || !ex.branched {
        ex.state.set_pc(next);
    }
    outcome
}

/// Execution context for a single instruction.
pub(crate) struct Exec<'a> {
    pub state: &'a mut CpuState,
    pub mem: &'a mut [u8],
    pub insn: u32,
    stores: Stores,
    branched: bool,
}

impl Exec<'_> {
    fn dispatch(&mut self) -> ExecResult {
        match self.insn {
            SYSCALL_INSN => return Err(Outcome::Syscall),
            GDB_BREAKPOINT_INSN => return Err(Outcome::Breakpoint),
            SELF_BRANCH_INSN => return Err(Outcome::Fatal),
            _ => {}
        }

        let cond = self.insn >> 28;
        if cond == COND_UNCONDITIONAL {
            return misc::unconditional(self);
        }
        if !condition_passed(cond, self.state.cpsr) {
            return Ok(());
        }

        match (self.insn >> 25) & 7 {
            0 => self.dispatch_group0(),
            1 => alu::data_processing_immediate(self),
            2 | 3 => load_store::single(self),
            4 => load_store::block(self),
            5 => branch::branch(self),
            // Coprocessor transfers, SWI and the undefined space.
            _ => Err(Outcome::Fatal),
        }
    }

    fn dispatch_group0(&mut self) -> ExecResult {
        for &(mask, pattern, handler) in GROUP0 {
            if self.insn & mask == pattern {
                return handler(self);
            }
        }

        // Anything else with bits 7 and 4 set is an unallocated multiply or
        // extra load/store encoding.
        if self.insn & 0x90 == 0x90 {
            return Err(Outcome::Fatal);
        }
        // TST/TEQ/CMP/CMN without S belong to the miscellaneous space.
        if self.insn & 0x0190_0000 == 0x0100_0000 {
            return Err(Outcome::Fatal);
        }
        alu::data_processing_register(self)
    }

    #[inline]
    pub fn field(&self, shift: u32) -> u32 {
        (self.insn >> shift) & 0xF
    }

    #[inline]
    pub fn bit(&self, n: u32) -> bool {
        (self.insn >> n) & 1 != 0
    }

    /// Read a register. r15 reads as the instruction address plus 8.
    #[inline]
    pub fn reg(&self, r: u32) -> u32 {
        self.state.regs[(r & 0xF) as usize]
    }

    /// Write a register. Writing r15 is a branch; the low two bits are
    /// dropped.
    pub fn set_reg(&mut self, r: u32, val: u32) {
        let r = (r & 0xF) as usize;
        if r == REG_PC {
            self.branch_to(val & !3);
        } else {
            self.state.regs[r] = val;
        }
    }

    pub fn branch_to(&mut self, target: u32) {
        self.state.regs[REG_PC] = target;
        self.branched = true;
    }

    /// Address of the instruction being executed.
    #[inline]
    pub fn insn_addr(&self) -> u32 {
        self.state.regs[REG_PC].wrapping_sub(PC_READ_OFFSET)
    }

    /// Validate a store. `Ok(false)` means the store is dropped.
    pub fn store_target(&self, addr: u32, size: u32) -> Result<bool, MemFault> {
        match mem::check(self.mem, addr, size) {
            Ok(_) => Ok(true),
            Err(MemFault::DataAbort) if self.stores == Stores::DropUnbacked => Ok(false),
            Err(fault) => Err(fault),
        }
    }

    #[inline]
    pub fn carry(&self) -> bool {
        self.state.flag(Psr::C)
    }
}

/// Reject a value loaded into the PC that would switch to Thumb state.
pub(crate) fn check_arm_target(target: u32) -> ExecResult {
    if target & 1 != 0 {
        return Err(Outcome::Fatal);
    }
    Ok(())
}
