//! Symbol records shared between the IR's back-reference from a
//! [`crate::ir::Global`] to its assembly symbol and the encoder's
//! binary-image symbol table (§3 "Fixups and binary image", §4.6).
//!
//! Living in its own module (rather than under `ir` or `encoder`) lets
//! both sides refer to a symbol by the same stable index without
//! creating a dependency cycle between the two subsystems — the weak
//! back-reference the design notes call for.

use std::fmt;

/// A stable, 1-based index into a [`crate::image::BinaryImage`]'s
/// symbol table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "sym{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Section {
    Text,
    Data,
    Bss,
    Undef,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Linkage {
    Global,
    Local,
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub section: Section,
    /// Section-local byte offset. Meaningless (left at 0) for `Undef`.
    pub offset: u32,
    pub size: u32,
    pub linkage: Linkage,
    pub index: SymbolId,
}
