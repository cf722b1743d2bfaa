//! IR values (§3 "IR values").
//!
//! A [`Value`] is a pure handle, never mutated in place. The only way
//! to produce one is through [`crate::ir::Builder`] (for instruction
//! results) or the free functions [`Value::constant`],
//! [`Value::argument`] and [`Value::global`] for the other three kinds.
//!
//! `Value` carries an `IrType` inline (`Const`/`Arg`/`Inst`), and
//! `IrType` itself is not `Copy` (`Function` holds an `Rc`, `Array` a
//! `Box`, both needed for the recursive/shared compound-type cases), so
//! `Value` is `Clone` only — cheap in the common `Int`/`Pointer`/`Struct`
//! cases (no allocation touched) and an `Rc` bump or a `Box` clone in
//! the rare `Function`/`Array` case.

use crate::ir::entities::{Global, Inst};
use crate::ir::types::IrType;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Value {
    /// A compile-time constant of the given type, stored as a 64-bit
    /// unsigned payload (sign-extended/truncated by consumers as their
    /// own type dictates).
    Const { ty: IrType, bits: u64 },
    /// The `index`-th argument of the enclosing function.
    Arg { ty: IrType, index: u32 },
    /// The result of a non-void instruction.
    Inst { ty: IrType, inst: Inst },
    /// The address of a global (always pointer-typed).
    Global { global: Global },
}

impl Value {
    pub fn constant(ty: IrType, bits: u64) -> Value {
        debug_assert!(ty.is_integer() || ty.is_pointer());
        Value::Const { ty, bits }
    }

    pub fn argument(ty: IrType, index: u32) -> Value {
        Value::Arg { ty, index }
    }

    pub fn global(global: Global) -> Value {
        Value::Global { global }
    }

    pub fn ty(&self) -> IrType {
        match self {
            Value::Const { ty, .. } => ty.clone(),
            Value::Arg { ty, .. } => ty.clone(),
            Value::Inst { ty, .. } => ty.clone(),
            Value::Global { .. } => IrType::Pointer,
        }
    }

    /// The constant payload, if this value is a compile-time constant.
    pub fn as_const(&self) -> Option<u64> {
        match self {
            Value::Const { bits, .. } => Some(*bits),
            _ => None,
        }
    }
}
