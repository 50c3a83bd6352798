use super::misc::saturate;
use super::{Exec, ExecResult};
use crate::outcome::Outcome;
use crate::state::Psr;

fn any_pc(ex: &Exec<'_>, fields: &[u32]) -> bool {
    fields.iter().any(|&shift| ex.field(shift) == 15)
}

/// Select the top (`top == true`) or bottom signed halfword.
fn half(val: u32, top: bool) -> i32 {
    if top {
        (val >> 16) as i16 as i32
    } else {
        val as i16 as i32
    }
}

/// MUL / MLA. Flags: N and Z only; C and V are preserved.
pub(super) fn mul(ex: &mut Exec<'_>) -> ExecResult {
    if any_pc(ex, &[16, 8, 0]) {
        return Err(Outcome::Fatal);
    }
    let rd = ex.field(16);
    let mut result = ex.reg(ex.insn).wrapping_mul(ex.reg(ex.field(8)));
    if ex.bit(21) {
        result = result.wrapping_add(ex.reg(ex.field(12)));
    }
    if ex.bit(20) {
        ex.state.set_nz(result);
    }
    ex.set_reg(rd, result);
    Ok(())
}

/// UMULL / UMLAL / SMULL / SMLAL.
pub(super) fn mul_long(ex: &mut Exec<'_>) -> ExecResult {
    let rd_hi = ex.field(16);
    let rd_lo = ex.field(12);
    if any_pc(ex, &[16, 12, 8, 0]) || rd_hi == rd_lo {
        return Err(Outcome::Fatal);
    }
    let rm = ex.reg(ex.insn);
    let rs = ex.reg(ex.field(8));
    let mut result = if ex.bit(22) {
        (i64::from(rm as i32) * i64::from(rs as i32)) as u64
    } else {
        u64::from(rm) * u64::from(rs)
    };
    if ex.bit(21) {
        let acc = (u64::from(ex.reg(rd_hi)) << 32) | u64::from(ex.reg(rd_lo));
        result = result.wrapping_add(acc);
    }
    if ex.bit(20) {
        ex.state.set_flag(Psr::N, (result as i64) < 0);
        ex.state.set_flag(Psr::Z, result == 0);
    }
    ex.set_reg(rd_lo, result as u32);
    ex.set_reg(rd_hi, (result >> 32) as u32);
    Ok(())
}

/// SMLA<x><y>: 16x16 product plus a 32-bit accumulator. Overflow of the
/// accumulation sets Q; the result wraps.
pub(super) fn smla_xy(ex: &mut Exec<'_>) -> ExecResult {
    if any_pc(ex, &[16, 12, 8, 0]) {
        return Err(Outcome::Fatal);
    }
    let product = half(ex.reg(ex.insn), ex.bit(5)) * half(ex.reg(ex.field(8)), ex.bit(6));
    let acc = ex.reg(ex.field(12)) as i32;
    accumulate_with_q(ex, product, acc)
}

/// SMLAW<y>: top 32 bits of the 48-bit product of a word and a halfword, plus
/// an accumulator.
pub(super) fn smlaw_y(ex: &mut Exec<'_>) -> ExecResult {
    if any_pc(ex, &[16, 12, 8, 0]) {
        return Err(Outcome::Fatal);
    }
    let product = word_by_half(ex);
    let acc = ex.reg(ex.field(12)) as i32;
    accumulate_with_q(ex, product, acc)
}

pub(super) fn smulw_y(ex: &mut Exec<'_>) -> ExecResult {
    if any_pc(ex, &[16, 8, 0]) {
        return Err(Outcome::Fatal);
    }
    let product = word_by_half(ex);
    ex.set_reg(ex.field(16), product as u32);
    Ok(())
}

/// SMLAL<x><y>: 16x16 product added to a 64-bit accumulator.
pub(super) fn smlal_xy(ex: &mut Exec<'_>) -> ExecResult {
    let rd_hi = ex.field(16);
    let rd_lo = ex.field(12);
    if any_pc(ex, &[16, 12, 8, 0]) || rd_hi == rd_lo {
        return Err(Outcome::Fatal);
    }
    let product = half(ex.reg(ex.insn), ex.bit(5)) * half(ex.reg(ex.field(8)), ex.bit(6));
    let acc = (u64::from(ex.reg(rd_hi)) << 32) | u64::from(ex.reg(rd_lo));
    let result = acc.wrapping_add(i64::from(product) as u64);
    ex.set_reg(rd_lo, result as u32);
    ex.set_reg(rd_hi, (result >> 32) as u32);
    Ok(())
}

pub(super) fn smul_xy(ex: &mut Exec<'_>) -> ExecResult {
    if any_pc(ex, &[16, 8, 0]) {
        return Err(Outcome::Fatal);
    }
    let product = half(ex.reg(ex.insn), ex.bit(5)) * half(ex.reg(ex.field(8)), ex.bit(6));
    ex.set_reg(ex.field(16), product as u32);
    Ok(())
}

fn word_by_half(ex: &Exec<'_>) -> i32 {
    let rm = i64::from(ex.reg(ex.insn) as i32);
    let rs = i64::from(half(ex.reg(ex.field(8)), ex.bit(6)));
    ((rm * rs) >> 16) as i32
}

fn accumulate_with_q(ex: &mut Exec<'_>, product: i32, acc: i32) -> ExecResult {
    let (_, overflow) = saturate(i64::from(product) + i64::from(acc));
    if overflow {
        ex.state.set_flag(Psr::Q, true);
    }
    ex.set_reg(ex.field(16), product.wrapping_add(acc) as u32);
    Ok(())
}
