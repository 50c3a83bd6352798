use nemul_cpu::{condition_passed, step, CpuState, Outcome, Psr};

fn cpsr_for(nzcv: u32) -> u32 {
    (nzcv << 28) | 0x10
}

/// Condition semantics expressed as comparisons of the operands of the
/// `CMP` that would have produced the flags, where that makes sense, and as
/// raw flag tests otherwise.
fn expected(cond: u32, nzcv: u32) -> bool {
    let n = nzcv & 8 != 0;
    let z = nzcv & 4 != 0;
    let c = nzcv & 2 != 0;
    let v = nzcv & 1 != 0;
    let ge = n == v;
    let hi = c && !z;
    match cond {
        0 => z,
        1 => !z,
        2 => c,
        3 => !c,
        4 => n,
        5 => !n,
        6 => v,
        7 => !v,
        8 => hi,
        9 => !hi,
        10 => ge,
        11 => !ge,
        12 => ge && !z,
        13 => !(ge && !z),
        14 => true,
        _ => false,
    }
}

#[test]
fn truth_table() {
    for cond in 0..16 {
        for nzcv in 0..16 {
            assert_eq!(
                condition_passed(cond, cpsr_for(nzcv)),
                expected(cond, nzcv),
                "cond {cond:#x} nzcv {nzcv:04b}"
            );
        }
    }
}

#[test]
fn other_cpsr_bits_do_not_matter() {
    for cond in 0..15 {
        let noisy = cpsr_for(0b0101) | Psr::Q.bits() | 0x000F_00C0;
        assert_eq!(
            condition_passed(cond, noisy),
            condition_passed(cond, cpsr_for(0b0101))
        );
    }
}

#[test]
fn failed_condition_skips_instruction() {
    let mut mem = vec![0u8; 0x2000];
    // moveq r0, #1 ; movne r1, #1
    mem[0x1000..0x1004].copy_from_slice(&0x03A0_0001u32.to_le_bytes());
    mem[0x1004..0x1008].copy_from_slice(&0x13A0_1001u32.to_le_bytes());

    let mut state = CpuState::at(0x1000);
    assert_eq!(step(&mut state, &mut mem), Outcome::Ok);
    assert_eq!(step(&mut state, &mut mem), Outcome::Ok);
    assert_eq!(state.regs[0], 0);
    assert_eq!(state.regs[1], 1);
    assert_eq!(state.pc(), 0x1008);
}

#[test]
fn magic_words_ignore_the_condition_check() {
    // The syscall word has condition AL; flip flags to make sure nothing
    // other than the exact word matters.
    let mut mem = vec![0u8; 0x2000];
    mem[0x1000..0x1004].copy_from_slice(&nemul_cpu::SYSCALL_INSN.to_le_bytes());
    let mut state = CpuState::at(0x1000);
    state.cpsr = cpsr_for(0b1111);
    assert_eq!(step(&mut state, &mut mem), Outcome::Syscall);
    assert_eq!(state.pc(), 0x1004);
}
