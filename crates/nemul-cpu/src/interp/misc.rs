use super::{check_arm_target, Exec, ExecResult};
use crate::outcome::Outcome;
use crate::shifter::rotated_immediate;
use crate::state::{Psr, REG_LR};

/// CPSR bits user mode may write through MSR, per field-mask bit.
const MSR_FLAGS_FIELD: u32 = 0xFF00_0000;
const MSR_STATUS_FIELD: u32 = 0x00FF_0000;

/// Condition `0xF`: only PLD is meaningful without Thumb and coprocessors.
pub(super) fn unconditional(ex: &mut Exec<'_>) -> ExecResult {
    if ex.insn & 0x0D70_F000 == 0x0550_F000 {
        return Ok(());
    }
    Err(Outcome::Fatal)
}

pub(super) fn mrs(ex: &mut Exec<'_>) -> ExecResult {
    let rd = ex.field(12);
    if ex.bit(22) || rd == 15 {
        return Err(Outcome::Fatal);
    }
    ex.set_reg(rd, ex.state.cpsr);
    Ok(())
}

pub(super) fn msr_register(ex: &mut Exec<'_>) -> ExecResult {
    let val = ex.reg(ex.insn);
    write_psr(ex, val)
}

pub(super) fn msr_immediate(ex: &mut Exec<'_>) -> ExecResult {
    let (val, _) = rotated_immediate(ex.insn & 0xFF, ex.field(8), false);
    write_psr(ex, val)
}

fn write_psr(ex: &mut Exec<'_>, val: u32) -> ExecResult {
    if ex.bit(22) {
        // SPSR does not exist in user mode.
        return Err(Outcome::Fatal);
    }
    // The control and extension fields are ignored in user mode.
    let mut mask = 0;
    if ex.bit(19) {
        mask |= MSR_FLAGS_FIELD;
    }
    if ex.bit(18) {
        mask |= MSR_STATUS_FIELD;
    }
    ex.state.cpsr = (ex.state.cpsr & !mask) | (val & mask);
    Ok(())
}

pub(super) fn bx(ex: &mut Exec<'_>) -> ExecResult {
    let target = ex.reg(ex.insn);
    check_arm_target(target)?;
    ex.branch_to(target & !3);
    Ok(())
}

pub(super) fn blx_register(ex: &mut Exec<'_>) -> ExecResult {
    let target = ex.reg(ex.insn);
    check_arm_target(target)?;
    ex.state.regs[REG_LR] = ex.insn_addr().wrapping_add(4);
    ex.branch_to(target & !3);
    Ok(())
}

pub(super) fn clz(ex: &mut Exec<'_>) -> ExecResult {
    let rd = ex.field(12);
    if rd == 15 || ex.insn & 0xF == 15 {
        return Err(Outcome::Fatal);
    }
    ex.set_reg(rd, ex.reg(ex.insn).leading_zeros());
    Ok(())
}

pub(super) fn bkpt(_ex: &mut Exec<'_>) -> ExecResult {
    Err(Outcome::Breakpoint)
}

/// QADD, QSUB, QDADD, QDSUB.
pub(super) fn saturating_add_sub(ex: &mut Exec<'_>) -> ExecResult {
    let rd = ex.field(12);
    if rd == 15 {
        return Err(Outcome::Fatal);
    }
    let rm = ex.reg(ex.insn) as i32;
    let rn = ex.reg(ex.field(16)) as i32;
    let doubled = ex.bit(22);
    let subtract = ex.bit(21);

    let (operand, mut saturated) = if doubled {
        saturate(i64::from(rn) * 2)
    } else {
        (rn, false)
    };
    let (result, sat) = if subtract {
        saturate(i64::from(rm) - i64::from(operand))
    } else {
        saturate(i64::from(rm) + i64::from(operand))
    };
    saturated |= sat;

    if saturated {
        ex.state.set_flag(Psr::Q, true);
    }
    ex.set_reg(rd, result as u32);
    Ok(())
}

/// Clamp to the signed 32-bit range, reporting whether clamping happened.
pub(super) fn saturate(val: i64) -> (i32, bool) {
    match i32::try_from(val) {
        Ok(v) => (v, false),
        Err(_) if val < 0 => (i32::MIN, true),
        Err(_) => (i32::MAX, true),
    }
}
