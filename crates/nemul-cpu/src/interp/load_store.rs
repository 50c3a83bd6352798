//! Single, extra and block data transfers plus SWP.
//!
//! Every address is validated before the first architectural side effect, so
//! a faulting instruction leaves registers and memory untouched.
//!
//! Stored copies of r15 hold the instruction address plus 12, as on the
//! ARM926EJ-S. Operand reads of r15 still see plus 8.

use super::{check_arm_target, Exec, ExecResult};
use crate::mem;
use crate::outcome::Outcome;
use crate::shifter::{shift_by_immediate, ShiftKind};

/// Extra offset of a stored r15 beyond the operand read value.
const STORED_PC_EXTRA: u32 = 4;

/// Resolved addressing for single and extra transfers.
struct Addressing {
    rn: u32,
    addr: u32,
    /// Value written back to `rn`, if any.
    writeback: Option<u32>,
}

fn resolve(ex: &Exec<'_>, offset: u32) -> Result<Addressing, Outcome> {
    let pre_index = ex.bit(24);
    let up = ex.bit(23);
    let rn = ex.field(16);
    let base = ex.reg(rn);
    let offset_addr = if up {
        base.wrapping_add(offset)
    } else {
        base.wrapping_sub(offset)
    };
    let writes_back = !pre_index || ex.bit(21);
    if writes_back && rn == 15 {
        return Err(Outcome::Fatal);
    }
    Ok(Addressing {
        rn,
        addr: if pre_index { offset_addr } else { base },
        writeback: writes_back.then_some(offset_addr),
    })
}

/// Value a store writes for register `r`.
fn store_value(ex: &Exec<'_>, r: u32) -> u32 {
    if r & 0xF == 15 {
        ex.reg(15).wrapping_add(STORED_PC_EXTRA)
    } else {
        ex.reg(r)
    }
}

fn apply_writeback(ex: &mut Exec<'_>, a: &Addressing) {
    if let Some(val) = a.writeback {
        ex.set_reg(a.rn, val);
    }
}

/// Commit a loaded value. Write-back happens first so a load into the base
/// register observes the loaded value.
fn finish_load(ex: &mut Exec<'_>, a: &Addressing, rd: u32, val: u32) -> ExecResult {
    if rd == 15 {
        check_arm_target(val)?;
    }
    apply_writeback(ex, a);
    ex.set_reg(rd, val);
    Ok(())
}

/// LDR, STR, LDRB, STRB (and the T variants, which behave identically in
/// user mode).
pub(super) fn single(ex: &mut Exec<'_>) -> ExecResult {
    let insn = ex.insn;
    let offset = if ex.bit(25) {
        if ex.bit(4) {
            // Media instructions / architecturally undefined.
            return Err(Outcome::Fatal);
        }
        let kind = ShiftKind::from_bits(insn >> 5);
        shift_by_immediate(kind, ex.reg(insn), (insn >> 7) & 0x1F, ex.carry()).0
    } else {
        insn & 0xFFF
    };

    let a = resolve(ex, offset)?;
    let rd = ex.field(12);
    let byte = ex.bit(22);

    if ex.bit(20) {
        let val = if byte {
            u32::from(mem::read_u8(ex.mem, a.addr)?)
        } else {
            mem::read_u32(ex.mem, a.addr)?
        };
        finish_load(ex, &a, rd, val)
    } else {
        let val = store_value(ex, rd);
        let size = if byte { 1 } else { 4 };
        if ex.store_target(a.addr, size)? {
            if byte {
                mem::write_u8(ex.mem, a.addr, val as u8)?;
            } else {
                mem::write_u32(ex.mem, a.addr, val)?;
            }
        }
        apply_writeback(ex, &a);
        Ok(())
    }
}

fn extra_offset(ex: &Exec<'_>) -> u32 {
    if ex.bit(22) {
        ((ex.insn >> 4) & 0xF0) | (ex.insn & 0xF)
    } else {
        ex.reg(ex.insn)
    }
}

/// LDRH / STRH.
pub(super) fn halfword(ex: &mut Exec<'_>) -> ExecResult {
    let a = resolve(ex, extra_offset(ex))?;
    let rd = ex.field(12);
    if ex.bit(20) {
        let val = u32::from(mem::read_u16(ex.mem, a.addr)?);
        finish_load(ex, &a, rd, val)
    } else {
        let val = store_value(ex, rd) as u16;
        if ex.store_target(a.addr, 2)? {
            mem::write_u16(ex.mem, a.addr, val)?;
        }
        apply_writeback(ex, &a);
        Ok(())
    }
}

pub(super) fn load_signed_byte(ex: &mut Exec<'_>) -> ExecResult {
    let rd = ex.field(12);
    let a = resolve(ex, extra_offset(ex))?;
    let val = mem::read_u8(ex.mem, a.addr)? as i8 as i32 as u32;
    finish_load(ex, &a, rd, val)
}

pub(super) fn load_signed_halfword(ex: &mut Exec<'_>) -> ExecResult {
    let rd = ex.field(12);
    let a = resolve(ex, extra_offset(ex))?;
    let val = mem::read_u16(ex.mem, a.addr)? as i16 as i32 as u32;
    finish_load(ex, &a, rd, val)
}

/// LDRD/STRD need an even destination that is not r14.
fn doubleword_pair(ex: &Exec<'_>) -> Result<u32, Outcome> {
    let rd = ex.field(12);
    if rd & 1 != 0 || rd == 14 {
        return Err(Outcome::Fatal);
    }
    Ok(rd)
}

pub(super) fn load_doubleword(ex: &mut Exec<'_>) -> ExecResult {
    let rd = doubleword_pair(ex)?;
    let a = resolve(ex, extra_offset(ex))?;
    let (lo, hi) = mem::read_u64(ex.mem, a.addr)?;
    apply_writeback(ex, &a);
    ex.set_reg(rd, lo);
    ex.set_reg(rd + 1, hi);
    Ok(())
}

pub(super) fn store_doubleword(ex: &mut Exec<'_>) -> ExecResult {
    let rd = doubleword_pair(ex)?;
    let a = resolve(ex, extra_offset(ex))?;
    let (lo, hi) = (ex.reg(rd), ex.reg(rd + 1));
    if ex.store_target(a.addr, 8)? {
        mem::write_u64(ex.mem, a.addr, lo, hi)?;
    }
    apply_writeback(ex, &a);
    Ok(())
}

/// SWP / SWPB.
pub(super) fn swap(ex: &mut Exec<'_>) -> ExecResult {
    let addr = ex.reg(ex.field(16));
    let rd = ex.field(12);
    let rm = ex.reg(ex.insn);
    if rd == 15 || ex.field(16) == 15 || ex.insn & 0xF == 15 {
        return Err(Outcome::Fatal);
    }
    let old = if ex.bit(22) {
        let old = mem::read_u8(ex.mem, addr)?;
        mem::write_u8(ex.mem, addr, rm as u8)?;
        u32::from(old)
    } else {
        let old = mem::read_u32(ex.mem, addr)?;
        mem::write_u32(ex.mem, addr, rm)?;
        old
    };
    ex.set_reg(rd, old);
    Ok(())
}

/// LDM / STM.
pub(super) fn block(ex: &mut Exec<'_>) -> ExecResult {
    let pre_index = ex.bit(24);
    let up = ex.bit(23);
    let user_bank = ex.bit(22);
    let writeback = ex.bit(21);
    let load = ex.bit(20);
    let rn = ex.field(16);
    let list = ex.insn & 0xFFFF;

    if user_bank || list == 0 || rn == 15 {
        return Err(Outcome::Fatal);
    }

    let count = list.count_ones();
    let span = count * 4;
    let base = ex.reg(rn);
    let start = match (pre_index, up) {
        (false, true) => base,
        (true, true) => base.wrapping_add(4),
        (false, false) => base.wrapping_sub(span).wrapping_add(4),
        (true, false) => base.wrapping_sub(span),
    };
    let new_base = if up {
        base.wrapping_add(span)
    } else {
        base.wrapping_sub(span)
    };

    let regs = || (0u32..16).filter(move |&r| list & (1 << r) != 0);
    for i in 0..count {
        let addr = start.wrapping_add(i * 4);
        if load {
            mem::check(ex.mem, addr, 4)?;
        } else {
            ex.store_target(addr, 4)?;
        }
    }

    if load {
        let mut loaded = [0u32; 16];
        for (i, r) in regs().enumerate() {
            loaded[r as usize] = mem::read_u32(ex.mem, start.wrapping_add(i as u32 * 4))?;
        }
        if list & (1 << 15) != 0 {
            check_arm_target(loaded[15])?;
        }
        if writeback {
            ex.set_reg(rn, new_base);
        }
        for r in regs() {
            ex.set_reg(r, loaded[r as usize]);
        }
    } else {
        for (i, r) in regs().enumerate() {
            let addr = start.wrapping_add(i as u32 * 4);
            let val = store_value(ex, r);
            if ex.store_target(addr, 4)? {
                mem::write_u32(ex.mem, addr, val)?;
            }
        }
        if writeback {
            ex.set_reg(rn, new_base);
        }
    }
    Ok(())
}
