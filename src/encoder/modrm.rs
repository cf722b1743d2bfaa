//! REX/ModR/M/SIB/displacement composition (§4.5, steps 1/3/4/5 of
//! "Per instruction, the encoder composes...").
//!
//! [`Enc`] is a single instruction's byte buffer plus whichever local
//! fixups it needed; [`emit_rm`] writes the ModR/M (+ SIB, + an
//! in-unit-resolved or fixed-up displacement) for one r/m operand, and
//! [`emit_prefix`] writes the operand-size/REX prefix bytes that must
//! precede the opcode. Splitting "does this operand need REX.B" from
//! "write its ModR/M bytes" lets a caller compute every REX bit before
//! it has written a single opcode byte, since REX must come last among
//! prefixes.

use crate::asm::reg::PhysicalRegister;
use crate::asm::operand::{AsmOperand, RegRef};
use crate::error::{CodegenError, CodegenResult};

use super::fixup::{FixupKind, FixupTarget};

pub(super) struct LocalFixup {
    pub local_offset: u32,
    pub kind: FixupKind,
    pub size: u8,
    pub target: FixupTarget,
    pub addend: i32,
}

/// One instruction's encoded bytes, plus any fixups discovered while
/// writing them (offsets are local to `bytes`, not yet the absolute
/// text-buffer offset — the caller in `encoder::mod` adds that base).
#[derive(Default)]
pub(super) struct Enc {
    pub bytes: Vec<u8>,
    pub fixups: Vec<LocalFixup>,
}

impl Enc {
    pub fn new() -> Enc {
        Enc::default()
    }

    pub fn u8(&mut self, b: u8) {
        self.bytes.push(b);
    }

    pub fn bytes(&mut self, b: &[u8]) {
        self.bytes.extend_from_slice(b);
    }

    pub fn imm_bytes(&mut self, value: u64, size: u8) {
        self.bytes(&value.to_le_bytes()[..size as usize]);
    }

    /// Pushes `size` zero bytes and records a fixup over them.
    pub fn placeholder(&mut self, kind: FixupKind, target: FixupTarget, addend: i32, size: u8) {
        let local_offset = self.bytes.len() as u32;
        for _ in 0..size {
            self.bytes.push(0);
        }
        self.fixups.push(LocalFixup { local_offset, kind, size, target, addend });
    }
}

/// Whether `op` (used as an r/m operand) requires REX.B/REX.X — i.e.
/// its base register's code is >= 8. `GlobalMem`/RIP-relative operands
/// never need it (no base register is actually encoded).
pub(super) fn rm_rex_b(op: &AsmOperand) -> CodegenResult<bool> {
    match op {
        AsmOperand::Reg { reg: RegRef::Physical(p), .. } => Ok(p.code() >= 8),
        AsmOperand::Mem { base: RegRef::Physical(p), .. } => Ok(p.code() >= 8),
        AsmOperand::GlobalMem { .. } => Ok(false),
        other => Err(CodegenError::invariant(format!("{other:?} is not a valid r/m operand"))),
    }
}

/// The physical register code of a direct (non-memory) register
/// operand — the "reg" or "r/m-as-register" side of an instruction.
pub(super) fn reg_code_of(op: &AsmOperand) -> CodegenResult<u8> {
    match op {
        AsmOperand::Reg { reg: RegRef::Physical(p), deref: false, .. } => Ok(p.code()),
        other => Err(CodegenError::invariant(format!("{other:?} is not a direct register operand"))),
    }
}

/// Writes the operand-size prefix (`0x66` for 16-bit operands) and, if
/// any of `rex_w`/`rex_r`/`rex_x`/`rex_b` is set, the REX byte — in
/// that order, since REX must immediately precede the opcode.
pub(super) fn emit_prefix(enc: &mut Enc, width: u32, rex_r: bool, rex_x: bool, rex_b: bool) {
    if width == 16 {
        enc.u8(0x66);
    }
    let rex_w = width == 64;
    if rex_w || rex_r || rex_x || rex_b {
        enc.u8(0x40 | ((rex_w as u8) << 3) | ((rex_r as u8) << 2) | ((rex_x as u8) << 1) | (rex_b as u8));
    }
}

/// Writes the ModR/M byte (plus SIB and displacement, when the operand
/// needs them) for `rm` against `reg_field` — either a real register's
/// low 3 bits, or an opcode-extension digit (§4.5 "a ModR/M-extension
/// digit when the instruction has no register operand").
pub(super) fn emit_rm(enc: &mut Enc, rm: &AsmOperand, reg_field: u8) -> CodegenResult<()> {
    match rm {
        AsmOperand::Reg { reg: RegRef::Physical(p), deref: false, .. } => {
            enc.u8(0xC0 | ((reg_field & 7) << 3) | (p.code() & 7));
            Ok(())
        }
        AsmOperand::Reg { reg: RegRef::Physical(p), deref: true, .. } => emit_mem(enc, *p, 0, reg_field),
        AsmOperand::Mem { base: RegRef::Physical(p), offset, .. } => emit_mem(enc, *p, *offset, reg_field),
        AsmOperand::GlobalMem { global, offset, .. } => {
            // mod=00, rm=101 is RIP-relative addressing in 64-bit mode
            // when no SIB byte follows (Intel SDM Vol. 2A, Table 2-7).
            enc.u8(((reg_field & 7) << 3) | 0x05);
            enc.placeholder(FixupKind::PcRelative, FixupTarget::Symbol(*global), *offset, 4);
            Ok(())
        }
        other => Err(CodegenError::invariant(format!("{other:?} is not a valid r/m operand"))),
    }
}

enum Disp {
    None,
    D8(i8),
    D32(i32),
}

fn emit_mem(enc: &mut Enc, base: PhysicalRegister, offset: i32, reg_field: u8) -> CodegenResult<()> {
    let code = base.code();
    let low3 = code & 7;
    // RSP/R12 (rm=100) always need a SIB byte: that rm value is the
    // "SIB follows" marker rather than a real base. RBP/R13 (rm=101)
    // can never use mod=00: that (mod, rm) pair means RIP-relative.
    let needs_sib = low3 == 4;
    let forced_disp = low3 == 5;

    let (md, disp) = if offset == 0 && !forced_disp {
        (0b00, Disp::None)
    } else if let Ok(d8) = i8::try_from(offset) {
        (0b01, Disp::D8(d8))
    } else {
        (0b10, Disp::D32(offset))
    };

    if needs_sib {
        enc.u8((md << 6) | ((reg_field & 7) << 3) | 0x04);
        enc.u8(low3); // scale=00, index=100 (none), base=low3
    } else {
        enc.u8((md << 6) | ((reg_field & 7) << 3) | low3);
    }
    match disp {
        Disp::None => {}
        Disp::D8(d) => enc.u8(d as u8),
        Disp::D32(d) => enc.bytes(&d.to_le_bytes()),
    }
    Ok(())
}

/// Truncates `v` (the bit pattern of an integer of `width` bits) to
/// its signed value at that width.
pub(super) fn sign_extend(v: u64, width: u32) -> i64 {
    match width {
        8 => (v as u8) as i8 as i64,
        16 => (v as u16) as i16 as i64,
        32 => (v as u32) as i32 as i64,
        _ => v as i64,
    }
}

pub(super) fn fits_signed8(v: u64, width: u32) -> bool {
    (-128..=127).contains(&sign_extend(v, width))
}
