//! Prologue/epilogue synthesis (§4.4 "Prologue/epilogue synthesis").
//!
//! Runs last, once every physical register the body actually touches
//! is known: scans for callee-save registers in use, reserves the
//! frame, and emits the fixed `PUSH RBP`/`MOV RBP, RSP`/... shape RBP
//! is always used (§4.4: "RBP is unconditionally used (no
//! frame-pointer omission)"), matching [`crate::config::Flags`]'s
//! `enable_frame_pointer_elimination` staying unread today.

use smallvec::smallvec;

use crate::asm::operand::{AsmOperand, RegRef};
use crate::asm::reg::PhysicalRegister;
use crate::asm::{imm, phys, AsmFunction, AsmInstr, AsmOpcode};

/// Every callee-save physical register mentioned by a (by now fully
/// physical) body operand, in register-code order.
fn used_callee_save_registers(func: &AsmFunction) -> Vec<PhysicalRegister> {
    let mut used = Vec::new();
    for instr in &func.body {
        for op in &instr.operands {
            if let Some(r) = op.physical_reg() {
                if r.is_callee_save() && !used.contains(&r) {
                    used.push(r);
                }
            }
        }
    }
    used.sort_by_key(|r| r.code());
    used
}

/// [`crate::isel`] bakes every local's address into `[RBP + offset]`
/// memory operands without knowing which callee-save registers the
/// allocator will later decide to push — it can't know, since the
/// callee-save set is only known after allocation. Each callee-save
/// `PUSH` lands at `[RBP-8]`, `[RBP-16]`, … *below* RBP, in the same
/// region `isel::frame::Frame` already assigned to locals assuming
/// nothing but the locals occupied that space. Once the final
/// callee-save count is known, every local's offset is shifted further
/// down by `8 * callee_saves.len()` bytes so it lands below the pushed
/// callee-save area instead of colliding with it. Locals are always
/// negative, RBP-based offsets (this subset never stack-passes
/// arguments, so no positive-offset `[RBP + …]` operand exists to
/// avoid touching).
fn bias_stack_slots(func: &mut AsmFunction, callee_save_count: usize) {
    if callee_save_count == 0 {
        return;
    }
    let bias = 8 * callee_save_count as i32;
    for instr in &mut func.body {
        for op in &mut instr.operands {
            if let AsmOperand::Mem { base: RegRef::Physical(PhysicalRegister::Rbp), offset, .. } = op {
                *offset -= bias;
            }
        }
    }
}

/// Synthesizes `func.prologue`/`func.epilogue` and attaches
/// `func.entry_label`/`func.ret_label` to their respective first
/// instructions. Must run after [`super::assign::rewrite_operands_to_physical`]
/// so the callee-save scan sees the final, physical-only body.
pub fn synthesize(func: &mut AsmFunction) {
    let callee_saves = used_callee_save_registers(func);
    bias_stack_slots(func, callee_saves.len());

    // §9 "Design Notes": keep RSP 16-byte aligned at every `CALL` in the
    // body. The System V ABI guarantees `RSP % 16 == 8` at this
    // function's own entry point (the `CALL` that reached us pushed an
    // 8-byte return address onto a 16-aligned caller `RSP`). Counting
    // every 8-byte push from entry to the end of the prologue: `PUSH
    // RBP` is one, each callee-save is one more, so the total is `1 +
    // callee_saves.len()`. Each push flips 16-byte alignment (since 8
    // mod 16 != 0); starting from the misaligned entry state, alignment
    // is restored (realigned to 0 mod 16) exactly when that total count
    // is odd, i.e. when `callee_saves.len()` is even. Otherwise — an
    // odd `callee_saves.len()` — the frame is left 8-byte-misaligned
    // after the pushes and the subsequent `SUB RSP, frame_size` (itself
    // always a multiple of 16, from `Frame::total_usage`) needs an
    // extra 8 bytes folded in to flip it back into alignment.
    let pushes_before_sub = 1 + callee_saves.len();
    let needs_pad = pushes_before_sub % 2 == 0;
    let frame_size = func.local_stack_usage + if needs_pad { 8 } else { 0 };

    let mut prologue = Vec::new();
    prologue.push(AsmInstr {
        op: AsmOpcode::Push,
        operands: smallvec![phys(PhysicalRegister::Rbp, 64)],
        label: None,
        extra_deps: Default::default(),
    });
    prologue.push(AsmInstr {
        op: AsmOpcode::Mov,
        operands: smallvec![phys(PhysicalRegister::Rbp, 64), phys(PhysicalRegister::Rsp, 64)],
        label: None,
        extra_deps: Default::default(),
    });
    for r in &callee_saves {
        prologue.push(AsmInstr {
            op: AsmOpcode::Push,
            operands: smallvec![phys(*r, 64)],
            label: None,
            extra_deps: Default::default(),
        });
    }
    prologue.push(AsmInstr {
        op: AsmOpcode::Sub,
        operands: smallvec![phys(PhysicalRegister::Rsp, 64), imm(frame_size)],
        label: None,
        extra_deps: Default::default(),
    });
    let entry_label = func.new_label();
    prologue[0].label = Some(entry_label);
    func.entry_label = entry_label;
    func.prologue = prologue;

    let mut epilogue = Vec::new();
    epilogue.push(AsmInstr {
        op: AsmOpcode::Add,
        operands: smallvec![phys(PhysicalRegister::Rsp, 64), imm(frame_size)],
        label: Some(func.ret_label),
        extra_deps: Default::default(),
    });
    for r in callee_saves.iter().rev() {
        epilogue.push(AsmInstr {
            op: AsmOpcode::Pop,
            operands: smallvec![phys(*r, 64)],
            label: None,
            extra_deps: Default::default(),
        });
    }
    epilogue.push(AsmInstr {
        op: AsmOpcode::Pop,
        operands: smallvec![phys(PhysicalRegister::Rbp, 64)],
        label: None,
        extra_deps: Default::default(),
    });
    epilogue.push(AsmInstr { op: AsmOpcode::Ret, operands: Default::default(), label: None, extra_deps: Default::default() });
    func.epilogue = epilogue;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::AsmFunction;

    #[test]
    fn empty_frame_still_emits_sub_rsp_zero() {
        let mut func = AsmFunction::new();
        synthesize(&mut func);
        assert_eq!(func.prologue[0].op, AsmOpcode::Push);
        assert_eq!(func.prologue.last().unwrap().op, AsmOpcode::Sub);
        assert_eq!(func.prologue.last().unwrap().operands[1], imm(0));
        assert_eq!(func.epilogue[0].label, Some(func.ret_label));
    }

    #[test]
    fn used_callee_save_round_trips_through_prologue_and_epilogue() {
        let mut func = AsmFunction::new();
        func.body.push(AsmInstr {
            op: AsmOpcode::Mov,
            operands: smallvec![phys(PhysicalRegister::Rbx, 64), imm(1)],
            label: None,
            extra_deps: Default::default(),
        });
        synthesize(&mut func);
        assert!(func.prologue.iter().any(|i| i.op == AsmOpcode::Push
            && i.operands.first() == Some(&phys(PhysicalRegister::Rbx, 64))));
        assert!(func.epilogue.iter().any(|i| i.op == AsmOpcode::Pop
            && i.operands.first() == Some(&phys(PhysicalRegister::Rbx, 64))));
    }
}
