//! A single-translation-unit C compiler backend: IR construction,
//! instruction selection, linear-scan register allocation, and x86-64
//! machine code encoding (see `SPEC_FULL.md`).
//!
//! The pipeline is a straight line with no feedback between stages:
//!
//! 1. [`ir_gen::lower_translation_unit`] (or direct [`ir::Builder`]
//!    calls) builds an [`ir::TransUnit`].
//! 2. [`isel::select_module`] lowers it to an [`asm::AsmModule`] of
//!    virtual-register assembly IR.
//! 3. [`regalloc::allocate_module`] assigns every virtual register a
//!    physical one and synthesizes prologues/epilogues in place.
//! 4. [`encoder::assemble`] encodes the result into a [`image::BinaryImage`].
//!
//! [`compile`] runs all four stages for callers that don't need to
//! inspect the intermediate IR or assembly forms.

pub mod asm;
pub mod config;
pub mod encoder;
pub mod entity;
pub mod error;
pub mod image;
pub mod ir;
pub mod ir_gen;
pub mod isel;
pub mod regalloc;
pub mod symbol;

pub use config::Flags;
pub use error::{CodegenError, CodegenResult};
pub use image::BinaryImage;
pub use ir::TransUnit;

/// Runs instruction selection, register allocation, and encoding over
/// an already-built, already-verified translation unit, producing its
/// binary image. `flags.verify_ir` governs whether [`ir::verify_function`]
/// runs first; a caller that already verified (e.g. incrementally,
/// while lowering) can pass a `Flags` with it disabled to avoid paying
/// for it twice.
pub fn compile(tu: &mut TransUnit, flags: &Flags) -> CodegenResult<BinaryImage> {
    if flags.verify_ir {
        for (_global, data) in tu.globals() {
            if let ir::Initializer::Function(function) = &data.init {
                ir::verify_function(tu, function)?;
            }
        }
    }

    let mut module = isel::select_module(tu)?;
    regalloc::allocate_module(tu, &mut module)?;
    encoder::assemble(tu, &module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Builder, IrType};
    use crate::symbol::Linkage;

    #[test]
    fn compile_runs_the_full_pipeline() {
        let mut tu = TransUnit::new();
        let g = tu.add_function("f", IrType::I32, vec![], Linkage::Global);
        tu.global_mut(g).defined = true;
        let mut b = Builder::new(&mut tu);
        b.set_current_function(g);
        let entry = b.create_block("entry");
        b.set_current_block(entry);
        let c = b.value_const(IrType::I32, 42);
        b.build_ret(c);

        let image = compile(&mut tu, &Flags::new()).unwrap();
        assert!(image.text.windows(5).any(|w| w == [0xB8, 0x2A, 0x00, 0x00, 0x00]));
    }
}
