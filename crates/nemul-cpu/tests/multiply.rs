use nemul_cpu::{step, CpuState, Outcome, Psr};

const CODE: u32 = 0x1000;

fn exec(insn: u32, regs: &[(usize, u32)]) -> (CpuState, Outcome) {
    let mut mem = vec![0u8; 0x2000];
    mem[0x1000..0x1004].copy_from_slice(&insn.to_le_bytes());
    let mut state = CpuState::at(CODE);
    for &(r, v) in regs {
        state.regs[r] = v;
    }
    let outcome = step(&mut state, &mut mem);
    (state, outcome)
}

#[test]
fn mul_and_mla_wrap() {
    // mul r0, r1, r2
    let (s, o) = exec(0xE000_0291, &[(1, 0x1_0001), (2, 0x1_0001)]);
    assert_eq!(o, Outcome::Ok);
    assert_eq!(s.regs[0], 0x0002_0001);

    // mla r0, r1, r2, r3
    let (s, _) = exec(0xE020_3291, &[(1, 3), (2, 4), (3, 0xFFFF_FFFF)]);
    assert_eq!(s.regs[0], 11);
}

#[test]
fn muls_sets_only_n_and_z() {
    let cv = (Psr::C | Psr::V).bits();
    let mut state = CpuState::at(CODE);
    state.cpsr |= cv;
    let mut mem = vec![0u8; 0x2000];
    // muls r0, r1, r2
    mem[0x1000..0x1004].copy_from_slice(&0xE010_0291u32.to_le_bytes());
    state.regs[1] = 0;
    state.regs[2] = 5;
    assert_eq!(step(&mut state, &mut mem), Outcome::Ok);
    assert!(state.flag(Psr::Z));
    assert!(!state.flag(Psr::N));
    assert_eq!(state.cpsr & cv, cv);
}

#[test]
fn long_multiplies() {
    // umull r0, r1, r2, r3
    let (s, _) = exec(0xE081_0392, &[(2, 0xFFFF_FFFF), (3, 0xFFFF_FFFF)]);
    assert_eq!((s.regs[0], s.regs[1]), (0x0000_0001, 0xFFFF_FFFE));

    // smull r0, r1, r2, r3
    let (s, _) = exec(0xE0C1_0392, &[(2, 0xFFFF_FFFF), (3, 2)]);
    assert_eq!((s.regs[0], s.regs[1]), (0xFFFF_FFFE, 0xFFFF_FFFF));

    // smlal r0, r1, r2, r3
    let (s, _) = exec(0xE0E1_0392, &[(0, 5), (1, 0), (2, 0xFFFF_FFFF), (3, 2)]);
    assert_eq!((s.regs[0], s.regs[1]), (3, 0));
}

#[test]
fn long_multiply_with_same_destinations_is_fatal() {
    // umull r0, r0, r2, r3
    let (s, o) = exec(0xE080_0392, &[]);
    assert_eq!(o, Outcome::Fatal);
    assert_eq!(s.pc(), CODE + 4);
}

#[test]
fn halfword_multiplies() {
    // smulbb r0, r1, r2
    let (s, _) = exec(0xE160_0281, &[(1, 0x0003_FFFE), (2, 0x7FFF_0005)]);
    assert_eq!(s.regs[0], (-10i32) as u32);

    // smultb r0, r1, r2
    let (s, _) = exec(0xE160_02A1, &[(1, 0x0003_FFFE), (2, 0x7FFF_0005)]);
    assert_eq!(s.regs[0], 15);

    // smulwb r0, r1, r2: (r1 * r2.b) >> 16
    let (s, _) = exec(0xE120_02A1, &[(1, 0x0001_0000), (2, 0x0000_0002)]);
    assert_eq!(s.regs[0], 2);

    // smlalbb r0, r1, r2, r3
    let (s, _) = exec(0xE141_0382, &[(0, 0xFFFF_FFFF), (1, 0), (2, 2), (3, 3)]);
    assert_eq!((s.regs[0], s.regs[1]), (5, 1));
}

#[test]
fn halfword_accumulate_overflow_sets_q() {
    // smlabb r0, r1, r2, r3
    let (s, o) = exec(0xE100_3281, &[(1, 1), (2, 1), (3, 0x7FFF_FFFF)]);
    assert_eq!(o, Outcome::Ok);
    assert_eq!(s.regs[0], 0x8000_0000);
    assert!(s.flag(Psr::Q));

    // smlawb r0, r1, r2, r3 without overflow
    let (s, _) = exec(0xE120_3281, &[(1, 0x0001_0000), (2, 2), (3, 10)]);
    assert_eq!(s.regs[0], 12);
    assert!(!s.flag(Psr::Q));
}
