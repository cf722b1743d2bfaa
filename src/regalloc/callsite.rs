//! Call-site caller-save preservation (§4.4 "3. Call-site save
//! analysis").
//!
//! The source asserts this count is zero; `SPEC_FULL.md` §4.4 lifts
//! that restriction since instruction selection already allows calls
//! nested inside arbitrary expressions, which makes a live caller-save
//! register across a nested call a routine occurrence. A register is
//! "live across" a `CALL` at body index `idx` when its interval
//! strictly spans it (`start < idx < end`) — this excludes the call's
//! own pre-colored argument/result vregs, whose intervals touch `idx`
//! but do not cross it.
//!
//! Saving an odd number of registers at one call site would itself
//! misalign `RSP` by 8 bytes for the duration of the call (each `PUSH`
//! moves it by 8) — padded here with an extra `SUB`/`ADD RSP, 8` pair
//! so every call site keeps `RSP` 16-byte aligned independent of the
//! frame-level callee-save parity `prologue::synthesize` accounts for.

use smallvec::smallvec;

use crate::asm::reg::PhysicalRegister;
use crate::asm::{phys, AsmFunction, AsmInstr, AsmOpcode};

/// One call site's set of caller-save registers to preserve, in a
/// stable (by register code) order.
struct CallSiteSave {
    body_index: usize,
    regs: Vec<PhysicalRegister>,
}

fn find_call_site_saves(func: &AsmFunction) -> Vec<CallSiteSave> {
    let mut saves = Vec::new();
    for (idx, instr) in func.body.iter().enumerate() {
        if instr.op != AsmOpcode::Call {
            continue;
        }
        let mut regs: Vec<PhysicalRegister> = func
            .vregs()
            .iter()
            .filter_map(|(_, info)| {
                let start = info.live_start?;
                let end = info.live_end?;
                if start < idx && end > idx {
                    info.assigned_physical.filter(|r| r.is_caller_save())
                } else {
                    None
                }
            })
            .collect();
        regs.sort_by_key(|r| r.code());
        regs.dedup();
        if !regs.is_empty() {
            saves.push(CallSiteSave { body_index: idx, regs });
        }
    }
    saves
}

/// Splices `PUSH`/`POP` pairs (and, when needed, an alignment padding
/// pair) around every call site [`find_call_site_saves`] flagged. Must
/// run after allocation, while operands still name virtual registers
/// (the pushed/popped registers are physical and need no rewriting) —
/// and before [`super::assign::rewrite_operands_to_physical`], so that
/// pass has one single flat pass over the final body.
pub fn insert_call_site_saves(func: &mut AsmFunction) {
    let saves = find_call_site_saves(func);
    if saves.is_empty() {
        return;
    }
    let mut by_index: rustc_hash::FxHashMap<usize, Vec<PhysicalRegister>> =
        saves.into_iter().map(|s| (s.body_index, s.regs)).collect();

    let mut new_body = Vec::with_capacity(func.body.len());
    for (idx, mut instr) in std::mem::take(&mut func.body).into_iter().enumerate() {
        let Some(regs) = by_index.remove(&idx) else {
            new_body.push(instr);
            continue;
        };
        let label = instr.label.take();
        let needs_pad = regs.len() % 2 == 1;
        let mut first_label = label;

        if needs_pad {
            new_body.push(labeled(
                AsmInstr {
                    op: AsmOpcode::Sub,
                    operands: smallvec![phys(PhysicalRegister::Rsp, 64), crate::asm::imm(8)],
                    label: None,
                    extra_deps: Default::default(),
                },
                &mut first_label,
            ));
        }
        for r in &regs {
            new_body.push(labeled(
                AsmInstr {
                    op: AsmOpcode::Push,
                    operands: smallvec![phys(*r, 64)],
                    label: None,
                    extra_deps: Default::default(),
                },
                &mut first_label,
            ));
        }
        if let Some(l) = first_label.take() {
            instr.label = Some(l);
        }
        new_body.push(instr);
        for r in regs.iter().rev() {
            new_body.push(AsmInstr {
                op: AsmOpcode::Pop,
                operands: smallvec![phys(*r, 64)],
                label: None,
                extra_deps: Default::default(),
            });
        }
        if needs_pad {
            new_body.push(AsmInstr {
                op: AsmOpcode::Add,
                operands: smallvec![phys(PhysicalRegister::Rsp, 64), crate::asm::imm(8)],
                label: None,
                extra_deps: Default::default(),
            });
        }
    }
    func.body = new_body;
}

/// Attaches `label` (if still unclaimed) to `instr` and clears it, so
/// a block-entry label that happened to fall on a `CALL` ends up on
/// whichever synthesized instruction is now first instead.
fn labeled(mut instr: AsmInstr, label: &mut Option<crate::asm::Label>) -> AsmInstr {
    if let Some(l) = label.take() {
        instr.label = Some(l);
    }
    instr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::reg::ARG_REGS;
    use crate::asm::{imm, phys, vreg, AsmFunction};
    use crate::regalloc::assign::{assign_registers, precolored_vregs};
    use crate::regalloc::interval::build_intervals;

    #[test]
    fn live_across_call_gets_saved() {
        let mut func = AsmFunction::new();
        let live = func.new_vreg();
        func.emit2(AsmOpcode::Mov, vreg(live, 32), imm(9));
        let arg = func.new_precolored_vreg(ARG_REGS[0]);
        func.emit2(AsmOpcode::Mov, vreg(arg, 32), imm(1));
        let call_idx = func.emit1(AsmOpcode::Call, crate::asm::imm(0));
        func.add_extra_dep(call_idx, arg);
        func.emit2(AsmOpcode::Add, imm(0), vreg(live, 32));

        build_intervals(&mut func);
        let precolored = precolored_vregs(&func);
        assign_registers(&mut func, &precolored).unwrap();
        // Force the live vreg onto a caller-save register for the test.
        func.vreg_info_mut(live).assigned_physical = Some(PhysicalRegister::Rcx);

        insert_call_site_saves(&mut func);
        let ops: Vec<AsmOpcode> = func.body.iter().map(|i| i.op).collect();
        assert!(ops.windows(3).any(|w| matches!(
            (w[0], w[1], w[2]),
            (AsmOpcode::Push, AsmOpcode::Call, AsmOpcode::Pop)
        )));
    }

    #[test]
    fn call_with_no_live_caller_saves_is_untouched() {
        let mut func = AsmFunction::new();
        let call_idx = func.emit1(AsmOpcode::Call, crate::asm::imm(0));
        let _ = call_idx;
        let before = func.body.len();
        insert_call_site_saves(&mut func);
        assert_eq!(func.body.len(), before);
    }
}
