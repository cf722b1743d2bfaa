//! Deterministic textual form of assembly (§4.8 "Testing tooling":
//! `dump_asm`, `dump_live_ranges`), in the same spirit as
//! [`crate::ir::dump_trans_unit`] — walks structures in the order
//! they're stored, never a `HashMap`'s iteration order, so output is
//! stable across runs for golden-file comparison.

use std::fmt::Write as _;

use crate::asm::function::AsmFunction;
use crate::asm::instr::{AsmInstr, AsmOpcode};
use crate::asm::operand::{AsmOperand, RegRef};
use crate::ir::Global;

/// One function's instructions (prologue, then body, then epilogue),
/// one per line, AT&T-adjacent but not a real assembler's syntax —
/// this exists for tests and debugging, not for feeding an assembler.
pub fn dump_asm(global: Global, func: &AsmFunction) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{global}:");
    for instr in func.instructions() {
        if let Some(l) = instr.label {
            let _ = writeln!(out, "{l}:");
        }
        let _ = writeln!(out, "  {}", dump_instr(instr));
    }
    out
}

fn dump_instr(instr: &AsmInstr) -> String {
    let mnemonic = mnemonic(instr.op);
    let operands = instr
        .operands
        .iter()
        .map(dump_operand)
        .collect::<Vec<_>>()
        .join(", ");
    if operands.is_empty() {
        mnemonic.to_string()
    } else {
        format!("{mnemonic} {operands}")
    }
}

fn mnemonic(op: AsmOpcode) -> String {
    match op {
        AsmOpcode::Mov => "mov".to_string(),
        AsmOpcode::Movsx => "movsx".to_string(),
        AsmOpcode::Movzx => "movzx".to_string(),
        AsmOpcode::Ret => "ret".to_string(),
        AsmOpcode::Call => "call".to_string(),
        AsmOpcode::Xor => "xor".to_string(),
        AsmOpcode::And => "and".to_string(),
        AsmOpcode::Or => "or".to_string(),
        AsmOpcode::Not => "not".to_string(),
        AsmOpcode::Neg => "neg".to_string(),
        AsmOpcode::Shl => "shl".to_string(),
        AsmOpcode::Shr => "shr".to_string(),
        AsmOpcode::Add => "add".to_string(),
        AsmOpcode::Sub => "sub".to_string(),
        AsmOpcode::Push => "push".to_string(),
        AsmOpcode::Pop => "pop".to_string(),
        AsmOpcode::Imul => "imul".to_string(),
        AsmOpcode::Idiv => "idiv".to_string(),
        AsmOpcode::Cdq => "cdq".to_string(),
        AsmOpcode::Cmp => "cmp".to_string(),
        AsmOpcode::SetCc(cond) => format!("set{}", cond.suffix()),
        AsmOpcode::Test => "test".to_string(),
        AsmOpcode::Jmp => "jmp".to_string(),
        AsmOpcode::JCc(cond) => format!("j{}", cond.suffix()),
        AsmOpcode::Adc => "adc".to_string(),
        AsmOpcode::Sbb => "sbb".to_string(),
    }
}

fn dump_operand(op: &AsmOperand) -> String {
    match op {
        AsmOperand::Reg { reg, width, deref: false } => dump_reg(reg, *width),
        AsmOperand::Reg { reg, width, deref: true } => format!("[{}]", dump_reg(reg, *width)),
        AsmOperand::Mem { base, width, offset } => {
            format!("[{}{:+}]:{width}", dump_reg(base, 64), offset)
        }
        AsmOperand::GlobalMem { global, width, offset } => {
            format!("[rip+{global}{offset:+}]:{width}")
        }
        AsmOperand::Imm(v) => format!("{v}"),
        AsmOperand::Sym(global) => format!("${global}"),
        AsmOperand::Label(l) => format!("{l}"),
    }
}

fn dump_reg(reg: &RegRef, width: u32) -> String {
    match reg {
        RegRef::Physical(p) => p.name(width).to_string(),
        RegRef::Virtual(v) => format!("{v}"),
    }
}

/// Every virtual register's live interval and (if allocation has run)
/// assigned physical register, one per line — used to assert on
/// [`crate::regalloc::build_intervals`]'s output directly (§4.8).
pub fn dump_live_ranges(func: &AsmFunction) -> String {
    let mut out = String::new();
    for (v, info) in func.vregs().iter() {
        let range = match (info.live_start, info.live_end) {
            (Some(s), Some(e)) => format!("[{s}, {e})"),
            _ => "unused".to_string(),
        };
        let assigned = match info.assigned_physical {
            Some(p) => p.name(64).to_string(),
            None => "-".to_string(),
        };
        let _ = writeln!(out, "{v}: {range} -> {assigned}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{imm, phys, reg::PhysicalRegister};
    use crate::entity::EntityRef;

    #[test]
    fn dump_asm_renders_mov_immediate() {
        let mut func = AsmFunction::new();
        func.emit2(AsmOpcode::Mov, phys(PhysicalRegister::Rax, 32), imm(42));
        let text = dump_asm(Global::new(0), &func);
        assert!(text.contains("mov eax, 42"));
    }

    #[test]
    fn dump_live_ranges_reports_unassigned_vreg() {
        let mut func = AsmFunction::new();
        let v = func.new_vreg();
        func.emit2(AsmOpcode::Mov, crate::asm::vreg(v, 32), imm(1));
        let text = dump_live_ranges(&func);
        assert!(text.contains("unused") || text.contains("->"));
    }
}
