//! Assembly-IR instructions (§3 "Assembly IR", §4.3 "Emission API").

use smallvec::SmallVec;

use crate::asm::operand::AsmOperand;
use crate::asm::{Label, VReg};

/// A signed integer comparison condition, shared between `CMP`'s
/// consumers: `SETcc` and `Jcc`. Named after the IR comparison opcode
/// it lowers from rather than the Intel mnemonic, since that's the
/// direction instruction selection reads it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Condition {
    /// The Intel suffix this condition encodes to (`sete`, `jne`, ...).
    pub fn suffix(self) -> &'static str {
        match self {
            Condition::Eq => "e",
            Condition::Ne => "ne",
            Condition::Lt => "l",
            Condition::Le => "le",
            Condition::Gt => "g",
            Condition::Ge => "ge",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AsmOpcode {
    Mov,
    Movsx,
    Movzx,
    Ret,
    Call,
    Xor,
    And,
    Or,
    Not,
    Neg,
    Shl,
    Shr,
    Add,
    Sub,
    Push,
    Pop,
    Imul,
    Idiv,
    Cdq,
    Cmp,
    SetCc(Condition),
    Test,
    Jmp,
    JCc(Condition),
    Adc,
    Sbb,
}

/// One assembly instruction: an opcode, up to three operands (§4.3
/// says "`emit0`/`emit1`/`emit2`/`emit3`"), an optional label attached
/// to it (a jump target elsewhere in the function may point here), and
/// any extra virtual-register dependencies the operand list doesn't
/// otherwise name — `IDIV`'s implicit read/write of `RAX`/`RDX`, for
/// instance, which register allocation still needs to see to avoid
/// clobbering a live value.
#[derive(Clone, Debug)]
pub struct AsmInstr {
    pub op: AsmOpcode,
    pub operands: SmallVec<[AsmOperand; 3]>,
    pub label: Option<Label>,
    pub extra_deps: SmallVec<[VReg; 2]>,
}

impl AsmInstr {
    /// Every virtual register this instruction mentions, including
    /// `extra_deps` — the set live-interval construction extends.
    pub fn vregs(&self) -> impl Iterator<Item = VReg> + '_ {
        self.operands
            .iter()
            .filter_map(|op| op.vreg())
            .chain(self.extra_deps.iter().copied())
    }
}
