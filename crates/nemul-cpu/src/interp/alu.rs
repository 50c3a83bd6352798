use super::{Exec, ExecResult};
use crate::outcome::Outcome;
use crate::shifter::{rotated_immediate, shift_by_immediate, shift_by_register, ShiftKind};
use crate::state::Psr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl Opcode {
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0xF {
            0x0 => Opcode::And,
            0x1 => Opcode::Eor,
            0x2 => Opcode::Sub,
            0x3 => Opcode::Rsb,
            0x4 => Opcode::Add,
            0x5 => Opcode::Adc,
            0x6 => Opcode::Sbc,
            0x7 => Opcode::Rsc,
            0x8 => Opcode::Tst,
            0x9 => Opcode::Teq,
            0xA => Opcode::Cmp,
            0xB => Opcode::Cmn,
            0xC => Opcode::Orr,
            0xD => Opcode::Mov,
            0xE => Opcode::Bic,
            _ => Opcode::Mvn,
        }
    }

    /// TST, TEQ, CMP and CMN only update flags.
    pub const fn is_comparison(self) -> bool {
        matches!(self, Opcode::Tst | Opcode::Teq | Opcode::Cmp | Opcode::Cmn)
    }
}

/// How an opcode derives C and V.
#[derive(Debug, Clone, Copy)]
enum FlagSource {
    /// C from the shifter, V untouched.
    Logical,
    Arithmetic { carry: bool, overflow: bool },
}

pub(super) fn data_processing_immediate(ex: &mut Exec<'_>) -> ExecResult {
    let insn = ex.insn;
    if insn & 0x0190_0000 == 0x0100_0000 {
        // TST/TEQ/CMP/CMN with S clear: MSR immediate or undefined.
        if insn & 0x0FB0_F000 == 0x0320_F000 {
            return super::misc::msr_immediate(ex);
        }
        return Err(Outcome::Fatal);
    }
    let (op2, carry) = rotated_immediate(insn & 0xFF, ex.field(8), ex.carry());
    execute(ex, op2, carry)
}

pub(super) fn data_processing_register(ex: &mut Exec<'_>) -> ExecResult {
    let insn = ex.insn;
    let kind = ShiftKind::from_bits(insn >> 5);
    let rm = ex.reg(insn);
    let (op2, carry) = if ex.bit(4) {
        let rs = ex.reg(ex.field(8));
        shift_by_register(kind, rm, rs, ex.carry())
    } else {
        shift_by_immediate(kind, rm, (insn >> 7) & 0x1F, ex.carry())
    };
    execute(ex, op2, carry)
}

fn execute(ex: &mut Exec<'_>, op2: u32, shifter_carry: bool) -> ExecResult {
    let opcode = Opcode::from_bits(ex.insn >> 21);
    let set_flags = ex.bit(20);
    let rd = ex.field(12);
    let rn = ex.reg(ex.field(16));
    let c = ex.carry();

    if set_flags && rd == 15 && !opcode.is_comparison() {
        // `MOVS pc, lr` and friends restore CPSR from SPSR, which user mode
        // does not have.
        return Err(Outcome::Fatal);
    }

    let (result, source) = match opcode {
        Opcode::And | Opcode::Tst => (rn & op2, FlagSource::Logical),
        Opcode::Eor | Opcode::Teq => (rn ^ op2, FlagSource::Logical),
        Opcode::Orr => (rn | op2, FlagSource::Logical),
        Opcode::Mov => (op2, FlagSource::Logical),
        Opcode::Bic => (rn & !op2, FlagSource::Logical),
        Opcode::Mvn => (!op2, FlagSource::Logical),
        Opcode::Add | Opcode::Cmn => add_with_carry(rn, op2, false),
        Opcode::Adc => add_with_carry(rn, op2, c),
        Opcode::Sub | Opcode::Cmp => sub_with_carry(rn, op2, true),
        Opcode::Sbc => sub_with_carry(rn, op2, c),
        Opcode::Rsb => sub_with_carry(op2, rn, true),
        Opcode::Rsc => sub_with_carry(op2, rn, c),
    };

    if set_flags {
        ex.state.set_nz(result);
        match source {
            FlagSource::Logical => ex.state.set_flag(Psr::C, shifter_carry),
            FlagSource::Arithmetic { carry, overflow } => {
                ex.state.set_flag(Psr::C, carry);
                ex.state.set_flag(Psr::V, overflow);
            }
        }
    }

    if !opcode.is_comparison() {
        ex.set_reg(rd, result);
    }
    Ok(())
}

/// `a + b + carry_in`, evaluated in 64 bits.
fn add_with_carry(a: u32, b: u32, carry_in: bool) -> (u32, FlagSource) {
    let unsigned = u64::from(a) + u64::from(b) + u64::from(carry_in);
    let signed = i64::from(a as i32) + i64::from(b as i32) + i64::from(carry_in);
    (
        unsigned as u32,
        FlagSource::Arithmetic {
            carry: unsigned > u64::from(u32::MAX),
            overflow: signed < i64::from(i32::MIN) || signed > i64::from(i32::MAX),
        },
    )
}

/// `a - b - !carry_in`. C is set when no borrow occurred.
fn sub_with_carry(a: u32, b: u32, carry_in: bool) -> (u32, FlagSource) {
    let borrow = u64::from(!carry_in);
    let unsigned = u64::from(a) + u64::from(!b) + u64::from(carry_in);
    let signed = i64::from(a as i32) - i64::from(b as i32) - borrow as i64;
    (
        unsigned as u32,
        FlagSource::Arithmetic {
            carry: unsigned > u64::from(u32::MAX),
            overflow: signed < i64::from(i32::MIN) || signed > i64::from(i32::MAX),
        },
    )
}
