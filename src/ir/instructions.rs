//! Instruction opcodes and payloads (§3 "IR instructions").
//!
//! `Opcode` is a plain tag; `InstData` is the sum type that replaces
//! the source's `(enum IrOp op; union payload)` pair. Each `InstData`
//! variant corresponds 1:1 to an `Opcode`, so `InstData::opcode` is a
//! trivial projection — kept, rather than collapsed away, because
//! several passes (constant folding's foldable-opcode check, dump's
//! mnemonic table, instruction selection's per-opcode dispatch) are
//! naturally phrased in terms of the opcode alone.

use crate::ir::entities::Block;
use crate::ir::types::IrType;
use crate::ir::value::Value;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Opcode {
    Local,
    Field,
    Load,
    Store,
    Cast,
    Zext,
    Sext,
    Branch,
    Cond,
    Ret,
    RetVoid,
    Call,
    BitXor,
    BitAnd,
    BitOr,
    BitNot,
    LogNot,
    Mul,
    Div,
    Add,
    Sub,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Opcode {
    /// The integer binary/unary opcodes that constant folding handles,
    /// per §4.1 "Constant folding": all arithmetic, bitwise, comparison,
    /// and unary logical/bitwise ops.
    pub fn is_foldable(self) -> bool {
        !matches!(
            self,
            Opcode::Local
                | Opcode::Field
                | Opcode::Load
                | Opcode::Store
                | Opcode::Cast
                | Opcode::Zext
                | Opcode::Sext
                | Opcode::Branch
                | Opcode::Cond
                | Opcode::Ret
                | Opcode::RetVoid
                | Opcode::Call
        )
    }

    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Branch | Opcode::Cond | Opcode::Ret | Opcode::RetVoid
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Opcode::Eq | Opcode::Neq | Opcode::Gt | Opcode::Gte | Opcode::Lt | Opcode::Lte
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Local => "local",
            Opcode::Field => "field",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Cast => "cast",
            Opcode::Zext => "zext",
            Opcode::Sext => "sext",
            Opcode::Branch => "branch",
            Opcode::Cond => "cond",
            Opcode::Ret => "ret",
            Opcode::RetVoid => "ret_void",
            Opcode::Call => "call",
            Opcode::BitXor => "bit_xor",
            Opcode::BitAnd => "bit_and",
            Opcode::BitOr => "bit_or",
            Opcode::BitNot => "bit_not",
            Opcode::LogNot => "log_not",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Eq => "eq",
            Opcode::Neq => "neq",
            Opcode::Gt => "gt",
            Opcode::Gte => "gte",
            Opcode::Lt => "lt",
            Opcode::Lte => "lte",
        }
    }
}

/// The opcode-specific payload of an instruction.
#[derive(Clone, Debug)]
pub enum InstData {
    /// Reserves a stack slot of the given type; the result is a
    /// pointer to it.
    Local { ty: IrType },
    /// Address of a named field of a struct-typed base pointer.
    Field {
        base: Value,
        struct_ty: IrType,
        field_index: u32,
    },
    Load { ptr: Value, ty: IrType },
    Store { ptr: Value, value: Value, ty: IrType },
    /// A same-size bit reinterpretation (integer <-> pointer, or a
    /// truncating narrow cast); never changes representation width
    /// beyond what `to` declares.
    Cast { value: Value, to: IrType },
    Zext { value: Value, to: IrType },
    Sext { value: Value, to: IrType },
    Branch { target: Block },
    Cond {
        cond: Value,
        then_block: Block,
        else_block: Block,
    },
    Ret { value: Value },
    RetVoid,
    Call {
        callee: Value,
        args: Vec<Value>,
        ret_ty: IrType,
    },
    Binary { op: Opcode, lhs: Value, rhs: Value },
    Unary { op: Opcode, value: Value },
}

impl InstData {
    pub fn opcode(&self) -> Opcode {
        match self {
            InstData::Local { .. } => Opcode::Local,
            InstData::Field { .. } => Opcode::Field,
            InstData::Load { .. } => Opcode::Load,
            InstData::Store { .. } => Opcode::Store,
            InstData::Cast { .. } => Opcode::Cast,
            InstData::Zext { .. } => Opcode::Zext,
            InstData::Sext { .. } => Opcode::Sext,
            InstData::Branch { .. } => Opcode::Branch,
            InstData::Cond { .. } => Opcode::Cond,
            InstData::Ret { .. } => Opcode::Ret,
            InstData::RetVoid => Opcode::RetVoid,
            InstData::Call { .. } => Opcode::Call,
            InstData::Binary { op, .. } => *op,
            InstData::Unary { op, .. } => *op,
        }
    }

    /// The operand values read by this instruction, in a stable order.
    /// Used by instruction selection and the register allocator's
    /// interval-construction pass; block/global targets are not values
    /// and are not included.
    pub fn operands(&self) -> Vec<Value> {
        match self {
            InstData::Local { .. } | InstData::RetVoid => vec![],
            InstData::Field { base, .. } => vec![base.clone()],
            InstData::Load { ptr, .. } => vec![ptr.clone()],
            InstData::Store { ptr, value, .. } => vec![ptr.clone(), value.clone()],
            InstData::Cast { value, .. }
            | InstData::Zext { value, .. }
            | InstData::Sext { value, .. } => vec![value.clone()],
            InstData::Branch { .. } => vec![],
            InstData::Cond { cond, .. } => vec![cond.clone()],
            InstData::Ret { value } => vec![value.clone()],
            InstData::Call { callee, args, .. } => {
                let mut v = vec![callee.clone()];
                v.extend_from_slice(args);
                v
            }
            InstData::Binary { lhs, rhs, .. } => vec![lhs.clone(), rhs.clone()],
            InstData::Unary { value, .. } => vec![value.clone()],
        }
    }
}
