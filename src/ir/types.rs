//! The IR type system (§3 "IR types").
//!
//! Deliberately small: an integer carries only a bit width (signedness
//! lives one level up, in the C type environment built by `ir_gen`, not
//! here — the IR itself doesn't care whether an add is signed). Structs
//! are referenced by name: equality of two struct types is equality of
//! their [`StructId`], which is exactly "by name" since a translation
//! unit only ever assigns one id per struct tag.

use std::fmt;
use std::rc::Rc;

use crate::ir::entities::StructId;

/// An IR-level type. Pointer is opaque (no pointee is tracked at this
/// level; `FIELD`/`LOAD`/`STORE` carry the type they need directly).
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum IrType {
    /// Integer of the given bit width (8, 16, 32 or 64).
    Int(u32),
    /// An 8-byte opaque pointer.
    Pointer,
    /// A function type: return type plus ordered parameter types.
    Function(Rc<FunctionType>),
    /// A named struct, referenced by id into the owning translation
    /// unit's struct table.
    Struct(StructId),
    /// A fixed-length array of a known element type.
    Array(Box<IrType>, u64),
    /// No value: the type of `STORE`, `BRANCH`, `COND`, `RET`, `RET_VOID`,
    /// and of a function with no return value.
    Void,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FunctionType {
    pub return_type: IrType,
    pub param_types: Vec<IrType>,
}

impl IrType {
    pub const I8: IrType = IrType::Int(8);
    pub const I16: IrType = IrType::Int(16);
    pub const I32: IrType = IrType::Int(32);
    pub const I64: IrType = IrType::Int(64);

    pub fn is_integer(&self) -> bool {
        matches!(self, IrType::Int(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, IrType::Pointer)
    }

    /// Bit width of an integer type. Panics on non-integers; callers
    /// are expected to have checked `is_integer` first, matching the
    /// crate-wide convention that type mismatches are internal
    /// invariant violations, not recoverable errors, once they reach
    /// this layer (`ir_gen` is where a real type mismatch becomes a
    /// `CodegenError`).
    pub fn bit_width(&self) -> u32 {
        match self {
            IrType::Int(w) => *w,
            _ => panic!("bit_width of non-integer IrType {self:?}"),
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IrType::Int(w) => write!(f, "i{w}"),
            IrType::Pointer => write!(f, "ptr"),
            IrType::Function(sig) => {
                write!(f, "(")?;
                for (i, p) in sig.param_types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {}", sig.return_type)
            }
            IrType::Struct(id) => write!(f, "struct{id}"),
            IrType::Array(elem, count) => write!(f, "[{elem}; {count}]"),
            IrType::Void => write!(f, "void"),
        }
    }
}
