//! Live interval construction (§4.4 "1. Interval construction").
//!
//! Walks one function's body — the instruction selector's flattened,
//! single-block-per-function stream — and extends every virtual
//! register's `[live_start, live_end]` to cover each instruction index
//! that mentions it, operand or [`crate::asm::AsmInstr::extra_deps`]
//! alike. This runs before allocation proper and before the
//! call-site-save pass, both of which read the intervals this leaves
//! behind in [`crate::asm::VRegInfo`].

use crate::asm::AsmFunction;

pub fn build_intervals(func: &mut AsmFunction) {
    for (idx, instr) in func.body.iter().enumerate() {
        for v in instr.vregs() {
            let info = func.vreg_info_mut(v);
            info.live_start = Some(info.live_start.map_or(idx, |s| s.min(idx)));
            info.live_end = Some(info.live_end.map_or(idx, |e| e.max(idx)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{imm, vreg, AsmFunction, AsmOpcode};

    #[test]
    fn interval_spans_first_to_last_use() {
        let mut func = AsmFunction::new();
        let v = func.new_vreg();
        func.emit2(AsmOpcode::Mov, vreg(v, 32), imm(1));
        func.emit0(AsmOpcode::Cdq);
        func.emit2(AsmOpcode::Add, vreg(v, 32), imm(1));
        build_intervals(&mut func);
        let info = func.vreg_info(v);
        assert_eq!(info.live_start, Some(0));
        assert_eq!(info.live_end, Some(2));
    }

    #[test]
    fn untouched_vreg_has_no_interval() {
        let mut func = AsmFunction::new();
        let v = func.new_vreg();
        build_intervals(&mut func);
        assert_eq!(func.vreg_info(v).live_start, None);
    }
}
