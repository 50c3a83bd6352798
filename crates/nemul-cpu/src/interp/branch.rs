use super::{Exec, ExecResult};
use crate::state::REG_LR;

/// B / BL with a signed 24-bit word offset relative to PC+8.
pub(super) fn branch(ex: &mut Exec<'_>) -> ExecResult {
    let offset = (((ex.insn << 8) as i32) >> 6) as u32;
    let pc = ex.reg(15);
    if ex.bit(24) {
        ex.state.regs[REG_LR] = ex.insn_addr().wrapping_add(4);
    }
    ex.branch_to(pc.wrapping_add(offset));
    Ok(())
}
