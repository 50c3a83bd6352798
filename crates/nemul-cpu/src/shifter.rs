//! Barrel shifter.
//!
//! Immediate-encoded and register-encoded shift amounts have different edge
//! cases, so they get separate entry points. Both return the shifted value
//! and the shifter carry-out.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl ShiftKind {
    /// Decode the two-bit shift type field (instruction bits 6:5).
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => ShiftKind::Lsl,
            1 => ShiftKind::Lsr,
            2 => ShiftKind::Asr,
            _ => ShiftKind::Ror,
        }
    }
}

/// Shift by a 5-bit immediate.
///
/// An amount of 0 encodes `LSL #0` (value and carry unchanged), `LSR #32`,
/// `ASR #32` and `RRX` respectively.
pub fn shift_by_immediate(kind: ShiftKind, value: u32, amount: u32, carry_in: bool) -> (u32, bool) {
    let amount = amount & 0x1F;
    match (kind, amount) {
        (ShiftKind::Lsl, 0) => (value, carry_in),
        (ShiftKind::Lsl, n) => (value << n, bit(value, 32 - n)),
        (ShiftKind::Lsr, 0) => (0, bit(value, 31)),
        (ShiftKind::Lsr, n) => (value >> n, bit(value, n - 1)),
        (ShiftKind::Asr, 0) => {
            let sign = bit(value, 31);
            (if sign { u32::MAX } else { 0 }, sign)
        }
        (ShiftKind::Asr, n) => (((value as i32) >> n) as u32, bit(value, n - 1)),
        (ShiftKind::Ror, 0) => ((u32::from(carry_in) << 31) | (value >> 1), bit(value, 0)),
        (ShiftKind::Ror, n) => (value.rotate_right(n), bit(value, n - 1)),
    }
}

/// Shift by the bottom byte of a register.
pub fn shift_by_register(kind: ShiftKind, value: u32, amount: u32, carry_in: bool) -> (u32, bool) {
    let amount = amount & 0xFF;
    if amount == 0 {
        return (value, carry_in);
    }
    match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => (value << amount, bit(value, 32 - amount)),
            32 => (0, bit(value, 0)),
            _ => (0, false),
        },
        ShiftKind::Lsr => match amount {
            1..=31 => (value >> amount, bit(value, amount - 1)),
            32 => (0, bit(value, 31)),
            _ => (0, false),
        },
        ShiftKind::Asr => match amount {
            1..=31 => (((value as i32) >> amount) as u32, bit(value, amount - 1)),
            _ => {
                let sign = bit(value, 31);
                (if sign { u32::MAX } else { 0 }, sign)
            }
        },
        ShiftKind::Ror => {
            let rot = amount & 0x1F;
            if rot == 0 {
                (value, bit(value, 31))
            } else {
                (value.rotate_right(rot), bit(value, rot - 1))
            }
        }
    }
}

/// Data-processing immediate operand: `imm8` rotated right by `2 * rotate`.
///
/// The carry-out is the incoming carry when `rotate` is zero, bit 31 of the
/// result otherwise.
pub fn rotated_immediate(imm8: u32, rotate: u32, carry_in: bool) -> (u32, bool) {
    let rotate = rotate & 0xF;
    let value = (imm8 & 0xFF).rotate_right(rotate * 2);
    if rotate == 0 {
        (value, carry_in)
    } else {
        (value, bit(value, 31))
    }
}

#[inline]
fn bit(value: u32, n: u32) -> bool {
    (value >> n) & 1 != 0
}
