//! Instruction selection: lowering one [`crate::ir::TransUnit`] into an
//! [`crate::asm::AsmModule`] (§4.3 "Instruction selection").

pub mod frame;
pub mod select;

pub use select::{select_function, select_module};
