//! The final output of encoding (§3 "Fixups and binary image", §4.6
//! "Binary image").
//!
//! Owns the three output buffers plus the symbol table; consumed by an
//! external ELF object writer (§6 "External interfaces") that this
//! crate does not implement. Every defined symbol's `(section, offset,
//! size)` exactly delimits its bytes — no padding is ever inserted
//! between consecutive globals.

use crate::symbol::{Linkage, Section, Symbol, SymbolId};

/// A fixup's resolution state (§6 "kind ∈ {absolute, pc-relative}").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FixupKind {
    Absolute,
    PcRelative,
}

/// A fixup [`crate::encoder::assemble`] could not resolve because its
/// target symbol is undefined in this translation unit — handed to the
/// object writer as a relocation (§6: "the unresolved set is
/// exclusively cross-TU references").
#[derive(Clone, Copy, Debug)]
pub struct Relocation {
    pub offset: u32,
    pub kind: FixupKind,
    pub size: u8,
    pub symbol: SymbolId,
}

#[derive(Clone, Debug, Default)]
pub struct BinaryImage {
    pub text: Vec<u8>,
    pub data: Vec<u8>,
    pub bss_size: u32,
    symbols: Vec<Symbol>,
    relocations: Vec<Relocation>,
}

impl BinaryImage {
    pub fn new() -> BinaryImage {
        BinaryImage::default()
    }

    /// Appends a symbol-table entry and returns its stable, 1-based
    /// index (§3: "symbols record... a stable symbol-table index").
    pub fn add_symbol(
        &mut self,
        name: impl Into<String>,
        section: Section,
        offset: u32,
        size: u32,
        linkage: Linkage,
    ) -> SymbolId {
        let index = SymbolId((self.symbols.len() + 1) as u32);
        self.symbols.push(Symbol { name: name.into(), section, offset, size, linkage, index });
        index
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[(id.0 - 1) as usize]
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn add_relocation(&mut self, relocation: Relocation) {
        self.relocations.push(relocation);
    }

    pub fn relocations(&self) -> &[Relocation] {
        &self.relocations
    }
}
