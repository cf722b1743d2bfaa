//! Deferred patches discovered while encoding one instruction (§4.5
//! "A label or symbol immediate emits zeroes plus a fixup record at
//! the current offset").
//!
//! Distinct from [`crate::image::Relocation`]: a [`Fixup`] may target
//! either an in-unit [`crate::ir::Global`] or an in-function
//! [`crate::asm::Label`] — labels never survive past fixup resolution,
//! since nothing outside this crate can resolve them. Only fixups
//! whose `Global` stays undefined become relocations in the output
//! image.

pub use crate::image::FixupKind;
use crate::asm::Label;
use crate::ir::Global;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FixupTarget {
    Symbol(Global),
    /// A label defined somewhere in `Global`'s own function body.
    Label(Global, Label),
}

/// A fixup anchored to an absolute text-buffer offset, ready for
/// [`super::resolve_fixups`].
#[derive(Clone, Copy, Debug)]
pub struct Fixup {
    pub kind: FixupKind,
    pub size: u8,
    pub offset: u32,
    pub next_instr_offset: u32,
    pub target: FixupTarget,
    pub addend: i32,
}
