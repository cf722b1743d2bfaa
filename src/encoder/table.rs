//! Per-(opcode, operand-shape) encoding, dispatched from
//! [`encode_instr`] — the hand-written equivalent of a
//! `cranelift-codegen` recipe table (§4.5: "an `EncodingRow`
//! descriptor per (opcode, operand-shape) pair... in the spirit of
//! `cranelift-codegen`'s meta-generated x86 recipes... but hand-written
//! `const` tables").
//!
//! Byte values throughout are the Intel SDM Vol. 2 opcode maps for the
//! subset of instructions [`crate::isel::select`] and
//! [`crate::regalloc`] ever produce, plus a few (`SHL`/`SHR`/`ADC`/
//! `SBB`/`TEST`) no current selection path emits but the `AsmOpcode`
//! vocabulary still promises a shape for.

use crate::asm::instr::Condition;
use crate::asm::operand::AsmOperand;
use crate::asm::{AsmInstr, AsmOpcode, Label};
use crate::error::{CodegenError, CodegenResult};
use crate::ir::Global;

use super::fixup::{FixupKind, FixupTarget};
use super::modrm::{
    emit_prefix, emit_rm, fits_signed8, reg_code_of, rm_rex_b, Enc,
};

/// A two-operand integer ALU opcode's four forms: `r/m, r` and `r, r/m`
/// at the instruction's declared width, the same pair at the 8-bit
/// width (these differ from the wide forms only in the low opcode
/// bit), and the `ModR/M.reg` extension digit its `r/m, imm` form uses
/// (opcodes `0x80`/`0x81`/`0x83`, all shared across this family).
struct EncodingRow {
    op: AsmOpcode,
    rm_r: u8,
    r_rm: u8,
    rm_r8: u8,
    r_rm8: u8,
    digit: u8,
}

#[rustfmt::skip]
const ARITH_ROWS: &[EncodingRow] = &[
    EncodingRow { op: AsmOpcode::Add, rm_r: 0x01, r_rm: 0x03, rm_r8: 0x00, r_rm8: 0x02, digit: 0 },
    EncodingRow { op: AsmOpcode::Or,  rm_r: 0x09, r_rm: 0x0B, rm_r8: 0x08, r_rm8: 0x0A, digit: 1 },
    EncodingRow { op: AsmOpcode::Adc, rm_r: 0x11, r_rm: 0x13, rm_r8: 0x10, r_rm8: 0x12, digit: 2 },
    EncodingRow { op: AsmOpcode::Sbb, rm_r: 0x19, r_rm: 0x1B, rm_r8: 0x18, r_rm8: 0x1A, digit: 3 },
    EncodingRow { op: AsmOpcode::And, rm_r: 0x21, r_rm: 0x23, rm_r8: 0x20, r_rm8: 0x22, digit: 4 },
    EncodingRow { op: AsmOpcode::Sub, rm_r: 0x29, r_rm: 0x2B, rm_r8: 0x28, r_rm8: 0x2A, digit: 5 },
    EncodingRow { op: AsmOpcode::Xor, rm_r: 0x31, r_rm: 0x33, rm_r8: 0x30, r_rm8: 0x32, digit: 6 },
    EncodingRow { op: AsmOpcode::Cmp, rm_r: 0x39, r_rm: 0x3B, rm_r8: 0x38, r_rm8: 0x3A, digit: 7 },
];

fn arith_row(op: AsmOpcode) -> CodegenResult<&'static EncodingRow> {
    ARITH_ROWS
        .iter()
        .find(|r| r.op == op)
        .ok_or_else(|| CodegenError::invariant(format!("{op:?} has no arithmetic encoding row")))
}

/// The condition-code nibble shared by `Jcc` (`0x0F 0x80+cc`) and
/// `SETcc` (`0x0F 0x90+cc`) — the signed conditions only, matching
/// [`Condition`]'s own variants (no unsigned `b`/`be`/`a`/`ae` codes
/// are ever produced).
fn condition_nibble(c: Condition) -> u8 {
    match c {
        Condition::Eq => 0x4,
        Condition::Ne => 0x5,
        Condition::Lt => 0xC,
        Condition::Ge => 0xD,
        Condition::Le => 0xE,
        Condition::Gt => 0xF,
    }
}

fn label_of(op: &AsmOperand) -> CodegenResult<Label> {
    match op {
        AsmOperand::Label(l) => Ok(*l),
        other => Err(CodegenError::invariant(format!("{other:?} is not a label operand"))),
    }
}

fn narrow_to(op: &AsmOperand, width: u32) -> AsmOperand {
    match *op {
        AsmOperand::Reg { reg, deref, .. } => AsmOperand::Reg { reg, width, deref },
        other => other,
    }
}

fn encode_two_operand_arith(row: &EncodingRow, dst: &AsmOperand, src: &AsmOperand) -> CodegenResult<Enc> {
    let mut enc = Enc::new();
    let width = dst.width().ok_or_else(|| CodegenError::invariant("arithmetic destination has no width"))?;
    match src {
        AsmOperand::Imm(v) => {
            let rex_b = rm_rex_b(dst)?;
            emit_prefix(&mut enc, width, false, false, rex_b);
            if width == 8 {
                enc.u8(0x80);
                emit_rm(&mut enc, dst, row.digit)?;
                enc.imm_bytes(*v, 1);
            } else if fits_signed8(*v, width) {
                enc.u8(0x83);
                emit_rm(&mut enc, dst, row.digit)?;
                enc.imm_bytes(*v, 1);
            } else {
                enc.u8(0x81);
                emit_rm(&mut enc, dst, row.digit)?;
                enc.imm_bytes(*v, if width == 16 { 2 } else { 4 });
            }
        }
        _ => {
            let reg_code = reg_code_of(src)?;
            let rex_r = reg_code >= 8;
            let rex_b = rm_rex_b(dst)?;
            emit_prefix(&mut enc, width, rex_r, false, rex_b);
            enc.u8(if width == 8 { row.rm_r8 } else { row.rm_r });
            emit_rm(&mut enc, dst, reg_code)?;
        }
    }
    Ok(enc)
}

fn encode_mov(dst: &AsmOperand, src: &AsmOperand) -> CodegenResult<Enc> {
    let mut enc = Enc::new();
    let width = dst.width().ok_or_else(|| CodegenError::invariant("mov destination has no width"))?;
    match src {
        AsmOperand::Imm(v) => match dst {
            AsmOperand::Reg { deref: false, .. } => {
                let code = reg_code_of(dst)?;
                emit_prefix(&mut enc, width, false, false, code >= 8);
                enc.u8((if width == 8 { 0xB0 } else { 0xB8 }) + (code & 7));
                let size = match width {
                    8 => 1,
                    16 => 2,
                    32 => 4,
                    64 => 8,
                    other => return Err(CodegenError::invariant(format!("unsupported mov width {other}"))),
                };
                enc.imm_bytes(*v, size);
            }
            _ => {
                let rex_b = rm_rex_b(dst)?;
                emit_prefix(&mut enc, width, false, false, rex_b);
                enc.u8(if width == 8 { 0xC6 } else { 0xC7 });
                emit_rm(&mut enc, dst, 0)?;
                enc.imm_bytes(*v, if width == 16 { 2 } else { 4 });
            }
        },
        AsmOperand::Sym(global) => {
            // The symbol's address, materialized whole into a 64-bit
            // register (§3 "the symbol, not the memory it names, is
            // the operand").
            let code = reg_code_of(dst)?;
            emit_prefix(&mut enc, 64, false, false, code >= 8);
            enc.u8(0xB8 + (code & 7));
            enc.placeholder(FixupKind::Absolute, FixupTarget::Symbol(*global), 0, 8);
        }
        _ if matches!(dst, AsmOperand::Reg { deref: false, .. }) => {
            let reg_code = reg_code_of(dst)?;
            let rex_r = reg_code >= 8;
            let rex_b = rm_rex_b(src)?;
            emit_prefix(&mut enc, width, rex_r, false, rex_b);
            enc.u8(if width == 8 { 0x8A } else { 0x8B });
            emit_rm(&mut enc, src, reg_code)?;
        }
        _ => {
            let reg_code = reg_code_of(src)?;
            let rex_r = reg_code >= 8;
            let rex_b = rm_rex_b(dst)?;
            emit_prefix(&mut enc, width, rex_r, false, rex_b);
            enc.u8(if width == 8 { 0x88 } else { 0x89 });
            emit_rm(&mut enc, dst, reg_code)?;
        }
    }
    Ok(enc)
}

fn encode_movzx(dst: &AsmOperand, src: &AsmOperand) -> CodegenResult<Enc> {
    let to_width = dst.width().ok_or_else(|| CodegenError::invariant("movzx destination has no width"))?;
    let from_width = src.width().ok_or_else(|| CodegenError::invariant("movzx source has no width"))?;
    if from_width >= to_width {
        // Nothing to extend; also covers the common "zero-extend from
        // 32 to 64" case, where writing the 32-bit sub-register
        // already zeroes the upper 32 bits of its 64-bit parent.
        return encode_mov(&narrow_to(dst, from_width.min(to_width)), src);
    }
    let mut enc = Enc::new();
    let reg_code = reg_code_of(dst)?;
    let rex_r = reg_code >= 8;
    let rex_b = rm_rex_b(src)?;
    emit_prefix(&mut enc, to_width, rex_r, false, rex_b);
    enc.u8(0x0F);
    enc.u8(if from_width == 8 { 0xB6 } else { 0xB7 });
    emit_rm(&mut enc, src, reg_code)?;
    Ok(enc)
}

fn encode_movsx(dst: &AsmOperand, src: &AsmOperand) -> CodegenResult<Enc> {
    let to_width = dst.width().ok_or_else(|| CodegenError::invariant("movsx destination has no width"))?;
    let from_width = src.width().ok_or_else(|| CodegenError::invariant("movsx source has no width"))?;
    let mut enc = Enc::new();
    let reg_code = reg_code_of(dst)?;
    let rex_r = reg_code >= 8;
    let rex_b = rm_rex_b(src)?;
    if from_width == 32 {
        // MOVSXD: the only sign-extending move whose source is itself
        // 32 bits wide.
        emit_prefix(&mut enc, to_width, rex_r, false, rex_b);
        enc.u8(0x63);
        emit_rm(&mut enc, src, reg_code)?;
        return Ok(enc);
    }
    emit_prefix(&mut enc, to_width, rex_r, false, rex_b);
    enc.u8(0x0F);
    enc.u8(if from_width == 8 { 0xBE } else { 0xBF });
    emit_rm(&mut enc, src, reg_code)?;
    Ok(enc)
}

fn encode_f7_unary(digit: u8, op: &AsmOperand) -> CodegenResult<Enc> {
    let mut enc = Enc::new();
    let width = op.width().ok_or_else(|| CodegenError::invariant("unary operand has no width"))?;
    let rex_b = rm_rex_b(op)?;
    emit_prefix(&mut enc, width, false, false, rex_b);
    enc.u8(if width == 8 { 0xF6 } else { 0xF7 });
    emit_rm(&mut enc, op, digit)?;
    Ok(enc)
}

fn encode_shift(digit: u8, dst: &AsmOperand, count: &AsmOperand) -> CodegenResult<Enc> {
    let mut enc = Enc::new();
    let width = dst.width().ok_or_else(|| CodegenError::invariant("shift destination has no width"))?;
    let AsmOperand::Imm(v) = count else {
        return Err(CodegenError::invariant("shift count must be an immediate"));
    };
    let rex_b = rm_rex_b(dst)?;
    emit_prefix(&mut enc, width, false, false, rex_b);
    enc.u8(if width == 8 { 0xC0 } else { 0xC1 });
    emit_rm(&mut enc, dst, digit)?;
    enc.imm_bytes(*v, 1);
    Ok(enc)
}

fn encode_push(op: &AsmOperand) -> CodegenResult<Enc> {
    let mut enc = Enc::new();
    let code = reg_code_of(op)?;
    if code >= 8 {
        enc.u8(0x41);
    }
    enc.u8(0x50 + (code & 7));
    Ok(enc)
}

fn encode_pop(op: &AsmOperand) -> CodegenResult<Enc> {
    let mut enc = Enc::new();
    let code = reg_code_of(op)?;
    if code >= 8 {
        enc.u8(0x41);
    }
    enc.u8(0x58 + (code & 7));
    Ok(enc)
}

fn encode_imul(ops: &[AsmOperand]) -> CodegenResult<Enc> {
    let mut enc = Enc::new();
    if ops.len() == 3 {
        let (dst, a, imm_op) = (&ops[0], &ops[1], &ops[2]);
        let width = dst.width().ok_or_else(|| CodegenError::invariant("imul destination has no width"))?;
        let AsmOperand::Imm(v) = imm_op else {
            return Err(CodegenError::invariant("3-operand imul's third operand must be an immediate"));
        };
        let reg_code = reg_code_of(dst)?;
        let rex_r = reg_code >= 8;
        let rex_b = rm_rex_b(a)?;
        emit_prefix(&mut enc, width, rex_r, false, rex_b);
        if fits_signed8(*v, width) {
            enc.u8(0x6B);
            emit_rm(&mut enc, a, reg_code)?;
            enc.imm_bytes(*v, 1);
        } else {
            enc.u8(0x69);
            emit_rm(&mut enc, a, reg_code)?;
            enc.imm_bytes(*v, if width == 16 { 2 } else { 4 });
        }
    } else {
        let (dst, src) = (&ops[0], &ops[1]);
        let width = dst.width().ok_or_else(|| CodegenError::invariant("imul destination has no width"))?;
        let reg_code = reg_code_of(dst)?;
        let rex_r = reg_code >= 8;
        let rex_b = rm_rex_b(src)?;
        emit_prefix(&mut enc, width, rex_r, false, rex_b);
        enc.u8(0x0F);
        enc.u8(0xAF);
        emit_rm(&mut enc, src, reg_code)?;
    }
    Ok(enc)
}

fn encode_setcc(cond: Condition, dst: &AsmOperand) -> CodegenResult<Enc> {
    let mut enc = Enc::new();
    let rex_b = rm_rex_b(dst)?;
    emit_prefix(&mut enc, 8, false, false, rex_b);
    enc.u8(0x0F);
    enc.u8(0x90 + condition_nibble(cond));
    emit_rm(&mut enc, dst, 0)?;
    Ok(enc)
}

fn encode_test(a: &AsmOperand, b: &AsmOperand) -> CodegenResult<Enc> {
    let mut enc = Enc::new();
    let width = a.width().ok_or_else(|| CodegenError::invariant("test operand has no width"))?;
    match b {
        AsmOperand::Imm(v) => {
            let rex_b = rm_rex_b(a)?;
            emit_prefix(&mut enc, width, false, false, rex_b);
            enc.u8(if width == 8 { 0xF6 } else { 0xF7 });
            emit_rm(&mut enc, a, 0)?;
            enc.imm_bytes(*v, if width == 16 { 2 } else { 4 });
        }
        _ => {
            let reg_code = reg_code_of(b)?;
            let rex_r = reg_code >= 8;
            let rex_b = rm_rex_b(a)?;
            emit_prefix(&mut enc, width, rex_r, false, rex_b);
            enc.u8(if width == 8 { 0x84 } else { 0x85 });
            emit_rm(&mut enc, a, reg_code)?;
        }
    }
    Ok(enc)
}

fn encode_call(op: &AsmOperand, current_fn: Global) -> CodegenResult<Enc> {
    let mut enc = Enc::new();
    match op {
        AsmOperand::Sym(global) => {
            enc.u8(0xE8);
            enc.placeholder(FixupKind::PcRelative, FixupTarget::Symbol(*global), 0, 4);
        }
        AsmOperand::Label(l) => {
            enc.u8(0xE8);
            enc.placeholder(FixupKind::PcRelative, FixupTarget::Label(current_fn, *l), 0, 4);
        }
        reg_op => {
            let rex_b = rm_rex_b(reg_op)?;
            emit_prefix(&mut enc, 64, false, false, rex_b);
            enc.u8(0xFF);
            emit_rm(&mut enc, reg_op, 2)?;
        }
    }
    Ok(enc)
}

fn encode_jmp(target: Label, current_fn: Global) -> Enc {
    let mut enc = Enc::new();
    enc.u8(0xE9);
    enc.placeholder(FixupKind::PcRelative, FixupTarget::Label(current_fn, target), 0, 4);
    enc
}

fn encode_jcc(cond: Condition, target: Label, current_fn: Global) -> Enc {
    let mut enc = Enc::new();
    enc.u8(0x0F);
    enc.u8(0x80 + condition_nibble(cond));
    enc.placeholder(FixupKind::PcRelative, FixupTarget::Label(current_fn, target), 0, 4);
    enc
}

/// Encodes one instruction, given the [`Global`] of the function it
/// belongs to (needed to namespace its [`Label`] operands for fixup
/// resolution — labels are only unique within their own function).
pub(super) fn encode_instr(instr: &AsmInstr, current_fn: Global) -> CodegenResult<Enc> {
    let ops = &instr.operands;
    match instr.op {
        AsmOpcode::Mov => encode_mov(&ops[0], &ops[1]),
        AsmOpcode::Movsx => encode_movsx(&ops[0], &ops[1]),
        AsmOpcode::Movzx => encode_movzx(&ops[0], &ops[1]),
        AsmOpcode::Ret => Ok(Enc { bytes: vec![0xC3], fixups: Vec::new() }),
        AsmOpcode::Call => encode_call(&ops[0], current_fn),
        AsmOpcode::Xor | AsmOpcode::And | AsmOpcode::Or | AsmOpcode::Adc | AsmOpcode::Sbb | AsmOpcode::Add | AsmOpcode::Sub | AsmOpcode::Cmp => {
            let row = arith_row(instr.op)?;
            encode_two_operand_arith(row, &ops[0], &ops[1])
        }
        AsmOpcode::Not => encode_f7_unary(2, &ops[0]),
        AsmOpcode::Neg => encode_f7_unary(3, &ops[0]),
        AsmOpcode::Idiv => encode_f7_unary(7, &ops[0]),
        AsmOpcode::Shl => encode_shift(4, &ops[0], &ops[1]),
        AsmOpcode::Shr => encode_shift(5, &ops[0], &ops[1]),
        AsmOpcode::Push => encode_push(&ops[0]),
        AsmOpcode::Pop => encode_pop(&ops[0]),
        AsmOpcode::Imul => encode_imul(ops),
        AsmOpcode::Cdq => Ok(Enc { bytes: vec![0x99], fixups: Vec::new() }),
        AsmOpcode::SetCc(cond) => encode_setcc(cond, &ops[0]),
        AsmOpcode::Test => encode_test(&ops[0], &ops[1]),
        AsmOpcode::Jmp => Ok(encode_jmp(label_of(&ops[0])?, current_fn)),
        AsmOpcode::JCc(cond) => Ok(encode_jcc(cond, label_of(&ops[0])?, current_fn)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{imm, phys, reg::PhysicalRegister};

    /// Seed scenario 1: `int f(void) { return 42; }` must encode `MOV
    /// EAX, 42` as exactly `B8 2A 00 00 00` (§8).
    #[test]
    fn mov_eax_imm32_matches_seed_scenario() {
        let enc = encode_mov(&phys(PhysicalRegister::Rax, 32), &imm(42)).unwrap();
        assert_eq!(enc.bytes, vec![0xB8, 0x2A, 0x00, 0x00, 0x00]);
        assert!(enc.fixups.is_empty());
    }

    #[test]
    fn mov_high_register_imm64_gets_rex_w_and_b() {
        let enc = encode_mov(&phys(PhysicalRegister::R9, 64), &imm(1)).unwrap();
        assert_eq!(enc.bytes[0], 0x49); // REX.WB
        assert_eq!(enc.bytes[1], 0xB8 + 1);
        assert_eq!(enc.bytes.len(), 2 + 8);
    }

    #[test]
    fn add_reg_imm_uses_sign_extended_imm8_form_when_it_fits() {
        let enc = encode_two_operand_arith(
            arith_row(AsmOpcode::Add).unwrap(),
            &phys(PhysicalRegister::Rcx, 32),
            &imm(5),
        )
        .unwrap();
        assert_eq!(enc.bytes[0], 0x83);
        assert_eq!(enc.bytes.last(), Some(&5u8));
    }

    #[test]
    fn add_reg_imm_falls_back_to_imm32_form_when_too_large() {
        let enc = encode_two_operand_arith(
            arith_row(AsmOpcode::Add).unwrap(),
            &phys(PhysicalRegister::Rcx, 32),
            &imm(1000),
        )
        .unwrap();
        assert_eq!(enc.bytes[0], 0x81);
    }
}
