//! IR invariant checking (§8 "Invariants to verify").
//!
//! Runs after `ir_gen` lowers a function and, gated by
//! [`crate::Flags::verify_ir`], after every mutation in debug builds —
//! mirroring `cranelift-codegen`'s own `enable_verifier` setting. A
//! violation here always indicates a bug in this crate, never a bad
//! input (malformed input is rejected earlier, during lowering), so it
//! surfaces as `CodegenError::InvariantViolation`.

use crate::error::{CodegenError, CodegenResult};
use crate::ir::function::Function;
use crate::ir::global::TransUnit;
use crate::ir::instructions::InstData;
use crate::ir::value::Value;

pub fn verify_function(tu: &TransUnit, func: &Function) -> CodegenResult<()> {
    for block in func.blocks() {
        let insts = func.block_insts(block);
        if insts.is_empty() {
            return Err(CodegenError::invariant(format!(
                "block {} has no instructions (must end in a terminator)",
                func.block_name(block)
            )));
        }
        for (i, inst) in insts.iter().enumerate() {
            let is_terminator = func.inst(*inst).data.opcode().is_terminator();
            let is_last = i == insts.len() - 1;
            if is_terminator != is_last {
                return Err(CodegenError::invariant(format!(
                    "block {} must end with exactly one terminator",
                    func.block_name(block)
                )));
            }
        }
        verify_load_store_widths(tu, func, block)?;
    }
    Ok(())
}

fn verify_load_store_widths(
    tu: &TransUnit,
    func: &Function,
    block: crate::ir::entities::Block,
) -> CodegenResult<()> {
    for inst in func.block_insts(block) {
        let data = &func.inst(*inst).data;
        let (ptr, accessed_ty) = match data {
            InstData::Load { ptr, ty } => (ptr, ty),
            InstData::Store { ptr, ty, .. } => (ptr, ty),
            _ => continue,
        };
        if let Value::Inst { inst: local_inst, .. } = ptr {
            if let InstData::Local { ty: local_ty } = &func.inst(*local_inst).data {
                if tu.size_of(local_ty) != tu.size_of(accessed_ty) {
                    return Err(CodegenError::invariant(format!(
                        "load/store of {} against a local of type {} (size mismatch)",
                        accessed_ty, local_ty
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::Builder;
    use crate::ir::types::IrType;
    use crate::symbol::Linkage;

    #[test]
    fn rejects_unterminated_block() {
        let mut tu = TransUnit::new();
        let g = tu.add_function("f", IrType::Void, vec![], Linkage::Global);
        let mut b = Builder::new(&mut tu);
        b.set_current_function(g);
        let entry = b.create_block("entry");
        b.set_current_block(entry);
        // no terminator emitted
        let func = tu.global(g).function().unwrap().clone();
        assert!(verify_function(&tu, &func).is_err());
    }

    #[test]
    fn accepts_terminated_block() {
        let mut tu = TransUnit::new();
        let g = tu.add_function("f", IrType::Void, vec![], Linkage::Global);
        let mut b = Builder::new(&mut tu);
        b.set_current_function(g);
        let entry = b.create_block("entry");
        b.set_current_block(entry);
        b.build_ret_void();
        let func = tu.global(g).function().unwrap().clone();
        assert!(verify_function(&tu, &func).is_ok());
    }
}
