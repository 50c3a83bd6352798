use nemul_cpu::shifter::{rotated_immediate, shift_by_immediate, shift_by_register, ShiftKind};

const KINDS: [ShiftKind; 4] = [ShiftKind::Lsl, ShiftKind::Lsr, ShiftKind::Asr, ShiftKind::Ror];
const OPERANDS: [u32; 5] = [0, 1, 0x8000_0000, 0xFFFF_FFFF, 0x8000_0001];

/// Wide-integer model of the shifter for a non-zero effective amount.
fn model(kind: ShiftKind, value: u32, amount: u32) -> (u32, bool) {
    let wide = u64::from(value);
    let signed = i64::from(value as i32);
    match kind {
        ShiftKind::Lsl if amount >= 64 => (0, false),
        ShiftKind::Lsl => {
            let r = wide << amount;
            (r as u32, (r >> 32) & 1 != 0)
        }
        ShiftKind::Lsr if amount >= 64 => (0, false),
        ShiftKind::Lsr => ((wide >> amount) as u32, (wide >> (amount - 1)) & 1 != 0),
        ShiftKind::Asr => {
            let n = amount.min(32);
            ((signed >> n) as u32, (signed >> (n - 1)) & 1 != 0)
        }
        ShiftKind::Ror => {
            let n = amount % 32;
            if n == 0 {
                (value, value >> 31 != 0)
            } else {
                (value.rotate_right(n), (value >> (n - 1)) & 1 != 0)
            }
        }
    }
}

#[test]
fn immediate_amounts() {
    for kind in KINDS {
        for value in OPERANDS {
            for carry in [false, true] {
                for amount in [1, 31] {
                    assert_eq!(
                        shift_by_immediate(kind, value, amount, carry),
                        model(kind, value, amount),
                        "{kind:?} {value:#x} #{amount}"
                    );
                }
            }
        }
    }
}

#[test]
fn immediate_zero_encodings() {
    for value in OPERANDS {
        for carry in [false, true] {
            // LSL #0 passes everything through.
            assert_eq!(shift_by_immediate(ShiftKind::Lsl, value, 0, carry), (value, carry));
            // LSR #0 and ASR #0 mean a shift by 32.
            assert_eq!(
                shift_by_immediate(ShiftKind::Lsr, value, 0, carry),
                model(ShiftKind::Lsr, value, 32)
            );
            assert_eq!(
                shift_by_immediate(ShiftKind::Asr, value, 0, carry),
                model(ShiftKind::Asr, value, 32)
            );
            // ROR #0 is RRX.
            assert_eq!(
                shift_by_immediate(ShiftKind::Ror, value, 0, carry),
                ((u32::from(carry) << 31) | (value >> 1), value & 1 != 0)
            );
        }
    }
}

#[test]
fn register_amounts() {
    for kind in KINDS {
        for value in OPERANDS {
            for carry in [false, true] {
                assert_eq!(
                    shift_by_register(kind, value, 0, carry),
                    (value, carry),
                    "{kind:?} by 0 keeps value and carry"
                );
                for amount in [1, 31, 32, 33, 255] {
                    assert_eq!(
                        shift_by_register(kind, value, amount, carry),
                        model(kind, value, amount),
                        "{kind:?} {value:#x} by {amount}"
                    );
                }
            }
        }
    }
}

#[test]
fn register_amount_uses_bottom_byte_only() {
    assert_eq!(shift_by_register(ShiftKind::Lsl, 1, 0x100, true), (1, true));
    assert_eq!(shift_by_register(ShiftKind::Lsl, 1, 0x104, false), (0x10, false));
}

#[test]
fn register_lsl_32_carries_out_bit0() {
    assert_eq!(shift_by_register(ShiftKind::Lsl, 1, 32, false), (0, true));
    assert_eq!(shift_by_register(ShiftKind::Lsl, 2, 32, true), (0, false));
}

#[test]
fn rotated_immediate_carry() {
    assert_eq!(rotated_immediate(0xFF, 0, true), (0xFF, true));
    assert_eq!(rotated_immediate(0xFF, 0, false), (0xFF, false));
    // 0x02 ror 2 = 0x8000_0000, carry from bit 31.
    assert_eq!(rotated_immediate(0x02, 1, false), (0x8000_0000, true));
    assert_eq!(rotated_immediate(0x01, 4, true), (0x0100_0000, false));
}
