//! x86-64 general-purpose physical registers (§4.3, §4.4).
//!
//! Only the 16 GPRs are modeled — this subset never touches SSE/AVX
//! registers. Ordering here doubles as `REGISTER_INDEX`, the 4-bit
//! encoding used by both ModR/M.reg/rm and the REX extension bits.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[rustfmt::skip]
pub enum PhysicalRegister {
    Rax, Rcx, Rdx, Rbx, Rsp, Rbp, Rsi, Rdi,
    R8, R9, R10, R11, R12, R13, R14, R15,
}

use PhysicalRegister::*;

pub const ALL: [PhysicalRegister; 16] =
    [Rax, Rcx, Rdx, Rbx, Rsp, Rbp, Rsi, Rdi, R8, R9, R10, R11, R12, R13, R14, R15];

/// The System V AMD64 integer argument registers, in order.
pub const ARG_REGS: [PhysicalRegister; 6] = [Rdi, Rsi, Rdx, Rcx, R8, R9];

/// Allocation order: caller-save first (cheapest to hand out — no
/// prologue/epilogue cost), then callee-save, `RAX` last since it's
/// also the call-result and `RET`/`IDIV` register and so the one most
/// likely to need a reload anyway (§4.4 "prefers caller-save, then
/// callee-save, then RAX last").
pub const ALLOCATION_ORDER: [PhysicalRegister; 14] =
    [Rcx, Rdx, Rsi, Rdi, R8, R9, R10, R11, Rbx, R12, R13, R14, R15, Rax];

impl PhysicalRegister {
    /// The 4-bit encoding used in ModR/M/SIB/opcode low bits and REX.
    pub fn code(self) -> u8 {
        ALL.iter().position(|r| *r == self).unwrap() as u8
    }

    /// REX.B/R/X extension bit: set when this register's code is >= 8.
    pub fn needs_rex_extension(self) -> bool {
        self.code() >= 8
    }

    pub fn is_caller_save(self) -> bool {
        matches!(self, Rax | Rcx | Rdx | Rsi | Rdi | R8 | R9 | R10 | R11)
    }

    pub fn is_callee_save(self) -> bool {
        !self.is_caller_save() && !matches!(self, Rsp | Rbp)
    }

    pub fn name(self, width: u32) -> &'static str {
        match (self, width) {
            (Rax, 64) => "rax", (Rax, 32) => "eax", (Rax, 16) => "ax", (Rax, 8) => "al",
            (Rcx, 64) => "rcx", (Rcx, 32) => "ecx", (Rcx, 16) => "cx", (Rcx, 8) => "cl",
            (Rdx, 64) => "rdx", (Rdx, 32) => "edx", (Rdx, 16) => "dx", (Rdx, 8) => "dl",
            (Rbx, 64) => "rbx", (Rbx, 32) => "ebx", (Rbx, 16) => "bx", (Rbx, 8) => "bl",
            (Rsp, 64) => "rsp", (Rsp, 32) => "esp", (Rsp, 16) => "sp", (Rsp, 8) => "spl",
            (Rbp, 64) => "rbp", (Rbp, 32) => "ebp", (Rbp, 16) => "bp", (Rbp, 8) => "bpl",
            (Rsi, 64) => "rsi", (Rsi, 32) => "esi", (Rsi, 16) => "si", (Rsi, 8) => "sil",
            (Rdi, 64) => "rdi", (Rdi, 32) => "edi", (Rdi, 16) => "di", (Rdi, 8) => "dil",
            (R8, 64) => "r8", (R8, 32) => "r8d", (R8, 16) => "r8w", (R8, 8) => "r8b",
            (R9, 64) => "r9", (R9, 32) => "r9d", (R9, 16) => "r9w", (R9, 8) => "r9b",
            (R10, 64) => "r10", (R10, 32) => "r10d", (R10, 16) => "r10w", (R10, 8) => "r10b",
            (R11, 64) => "r11", (R11, 32) => "r11d", (R11, 16) => "r11w", (R11, 8) => "r11b",
            (R12, 64) => "r12", (R12, 32) => "r12d", (R12, 16) => "r12w", (R12, 8) => "r12b",
            (R13, 64) => "r13", (R13, 32) => "r13d", (R13, 16) => "r13w", (R13, 8) => "r13b",
            (R14, 64) => "r14", (R14, 32) => "r14d", (R14, 16) => "r14w", (R14, 8) => "r14b",
            (R15, 64) => "r15", (R15, 32) => "r15d", (R15, 16) => "r15w", (R15, 8) => "r15b",
            (_, w) => panic!("unsupported register width {w}"),
        }
    }
}

impl fmt::Display for PhysicalRegister {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name(64))
    }
}
