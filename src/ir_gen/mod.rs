//! Front-end-adjacent support: the AST shapes this crate consumes, the
//! C type environment, and the lowering pass that turns one into IR
//! (§4.2 "IR generation (`ir_gen`)").
//!
//! This module does not parse C source — see the doc comment on
//! [`ast`] — it only provides the data a parser would hand to
//! [`lower_translation_unit`].

pub mod ast;
pub mod ctype;
pub mod lower;
pub mod scope;

pub use ctype::{CType, TypeEnv};
pub use lower::lower_translation_unit;
pub use scope::{LoopStack, LoopTargets, ValueScope};
