use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub const REG_SP: usize = 13;
pub const REG_LR: usize = 14;
pub const REG_PC: usize = 15;

/// CPSR mode field value for User mode.
pub const CPSR_MODE_USR: u32 = 0x10;
pub const CPSR_MODE_MASK: u32 = 0x1F;

/// Condition field value of the unconditional instruction space.
pub const COND_UNCONDITIONAL: u32 = 0xF;

bitflags! {
    /// Program status bits the interpreter reads or writes.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct Psr: u32 {
        const N = 1 << 31;
        const Z = 1 << 30;
        const C = 1 << 29;
        const V = 1 << 28;
        const Q = 1 << 27;
        const GE0 = 1 << 16;
        const GE1 = 1 << 17;
        const GE2 = 1 << 18;
        const GE3 = 1 << 19;
    }
}

/// Architectural register file of one emulated process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuState {
    pub regs: [u32; 16],
    pub cpsr: u32,
}

impl Default for CpuState {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuState {
    pub const fn new() -> Self {
        Self {
            regs: [0; 16],
            cpsr: CPSR_MODE_USR,
        }
    }

    /// Construct a state that will start executing at `pc`.
    pub fn at(pc: u32) -> Self {
        let mut state = Self::new();
        state.set_pc(pc);
        state
    }

    #[inline]
    pub fn pc(&self) -> u32 {
        self.regs[REG_PC]
    }

    #[inline]
    pub fn set_pc(&mut self, pc: u32) {
        self.regs[REG_PC] = pc;
    }

    #[inline]
    pub fn flags(&self) -> Psr {
        Psr::from_bits_retain(self.cpsr)
    }

    #[inline]
    pub fn flag(&self, flag: Psr) -> bool {
        self.flags().contains(flag)
    }

    #[inline]
    pub fn set_flag(&mut self, flag: Psr, val: bool) {
        let mut flags = self.flags();
        flags.set(flag, val);
        self.cpsr = flags.bits();
    }

    /// Update N and Z from a 32-bit result.
    #[inline]
    pub fn set_nz(&mut self, result: u32) {
        self.set_flag(Psr::N, (result as i32) < 0);
        self.set_flag(Psr::Z, result == 0);
    }
}

/// Evaluate an ARM condition field against the N, Z, C and V flags of `cpsr`.
///
/// Condition `0xF` is treated as "never"; the interpreter handles that
/// encoding as the unconditional instruction space before consulting this
/// table.
pub fn condition_passed(cond: u32, cpsr: u32) -> bool {
    let flags = Psr::from_bits_retain(cpsr);
    let n = flags.contains(Psr::N);
    let z = flags.contains(Psr::Z);
    let c = flags.contains(Psr::C);
    let v = flags.contains(Psr::V);

    match cond & 0xF {
        0x0 => z,
        0x1 => !z,
        0x2 => c,
        0x3 => !c,
        0x4 => n,
        0x5 => !n,
        0x6 => v,
        0x7 => !v,
        0x8 => c && !z,
        0x9 => !c || z,
        0xA => n == v,
        0xB => n != v,
        0xC => !z && n == v,
        0xD => z || n != v,
        0xE => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_helpers_preserve_other_bits() {
        let mut state = CpuState::new();
        state.cpsr |= 0x000F_0000;
        state.set_flag(Psr::C, true);
        assert_eq!(state.cpsr, CPSR_MODE_USR | 0x000F_0000 | (1 << 29));
        state.set_nz(0);
        assert!(state.flag(Psr::Z));
        assert!(!state.flag(Psr::N));
        state.set_nz(0x8000_0000);
        assert!(state.flag(Psr::N));
        assert!(!state.flag(Psr::Z));
        assert!(state.flag(Psr::C));
    }
}
