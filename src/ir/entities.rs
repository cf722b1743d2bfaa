//! Entity references used throughout the IR (§3).
//!
//! Each of these is a dense `u32` index into a [`crate::entity::PrimaryMap`]
//! owned by the enclosing [`crate::ir::Function`] or
//! [`crate::ir::TransUnit`]. They replace the source compiler's raw
//! pointers into pool-allocated nodes.

use crate::entity::entity_impl;

/// A basic block within a function.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// An instruction within a function. Stable for the lifetime of the
/// function; never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// A global (function or variable) within a translation unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Global(u32);
entity_impl!(Global, "g");

/// A named struct type within a translation unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(u32);
entity_impl!(StructId, "struct");
