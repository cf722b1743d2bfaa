//! The typed, three-address IR this back end lowers C into (§3, §4.1).
//!
//! A [`TransUnit`] owns every global; each function global owns a
//! [`Function`] of [`Block`]s of [`Inst`]s. [`Builder`] is the only way
//! to append instructions, and folds constant-foldable operations
//! eagerly rather than emitting them (§4.1 "Constant folding").

pub mod builder;
pub mod dump;
pub mod entities;
pub mod function;
pub mod global;
pub mod instructions;
pub mod types;
pub mod value;
pub mod verify;

pub use builder::Builder;
pub use dump::dump_trans_unit;
pub use entities::{Block, Global, Inst, StructId};
pub use function::{BlockData, Function, InstRecord};
pub use global::{GlobalData, Initializer, StructDef, StructField, TransUnit};
pub use instructions::{InstData, Opcode};
pub use types::{FunctionType, IrType};
pub use value::Value;
pub use verify::verify_function;
