//! The IR builder API (§4.1 "Public contract") and constant folding.
//!
//! A [`Builder`] borrows a [`TransUnit`] and tracks the current
//! function/block, mirroring the source's `IrBuilder`. Every
//! `build_*` method appends an instruction to the current block and
//! returns the [`Value`] handle for its result — except for the four
//! terminator-producing methods (`build_branch`, `build_cond`,
//! `build_ret`, `build_ret_void`) and `build_store`, which produce no
//! usable value and so return `()` rather than a `Value` typed `Void`
//! that nothing could ever consume; the builder still appends the
//! `InstData` payload described in §3 for each.

use log::trace;

use crate::error::{CodegenError, CodegenResult};
use crate::ir::entities::{Block, Global, Inst, StructId};
use crate::ir::global::TransUnit;
use crate::ir::instructions::{InstData, Opcode};
use crate::ir::types::IrType;
use crate::ir::value::Value;

pub struct Builder<'a> {
    tu: &'a mut TransUnit,
    current_function: Option<Global>,
    current_block: Option<Block>,
}

impl<'a> Builder<'a> {
    pub fn new(tu: &'a mut TransUnit) -> Builder<'a> {
        Builder {
            tu,
            current_function: None,
            current_block: None,
        }
    }

    pub fn trans_unit(&self) -> &TransUnit {
        self.tu
    }

    pub fn trans_unit_mut(&mut self) -> &mut TransUnit {
        self.tu
    }

    pub fn set_current_function(&mut self, global: Global) {
        debug_assert!(self.tu.global(global).function().is_some());
        self.current_function = Some(global);
        self.current_block = None;
    }

    pub fn current_function(&self) -> Global {
        self.current_function.expect("no current function set")
    }

    pub fn set_current_block(&mut self, block: Block) {
        self.current_block = Some(block);
    }

    pub fn current_block(&self) -> Block {
        self.current_block.expect("no current block set")
    }

    pub fn create_block(&mut self, name: impl Into<String>) -> Block {
        self.func_mut().create_block(name)
    }

    fn func_mut(&mut self) -> &mut crate::ir::function::Function {
        let global = self.current_function();
        self.tu
            .global_mut(global)
            .function_mut()
            .expect("current function global has no body")
    }

    fn push(&mut self, ty: IrType, data: InstData) -> Inst {
        let block = self.current_block();
        trace!("build {:?} in {:?}", data.opcode(), block);
        self.func_mut().push_inst(block, ty, data)
    }

    // ---- value constructors that emit no instruction -------------------

    pub fn value_const(&self, ty: IrType, bits: u64) -> Value {
        Value::constant(ty, bits)
    }

    pub fn value_arg(&self, ty: IrType, index: u32) -> Value {
        Value::argument(ty, index)
    }

    pub fn value_global(&self, global: Global) -> Value {
        Value::global(global)
    }

    // ---- memory ---------------------------------------------------------

    pub fn build_local(&mut self, ty: IrType) -> Value {
        let inst = self.push(IrType::Pointer, InstData::Local { ty });
        Value::Inst { ty: IrType::Pointer, inst }
    }

    pub fn build_field(
        &mut self,
        base: Value,
        struct_ty: IrType,
        field_name: &str,
    ) -> CodegenResult<Value> {
        let struct_id = match &struct_ty {
            IrType::Struct(id) => *id,
            other => {
                return Err(CodegenError::invariant(format!(
                    "FIELD against non-struct type {other}"
                )))
            }
        };
        let field_index = self
            .tu
            .strukt(struct_id)
            .field_index(field_name)
            .ok_or_else(|| {
                CodegenError::invariant(format!(
                    "no field `{field_name}` on struct {struct_id}"
                ))
            })?;
        let inst = self.push(
            IrType::Pointer,
            InstData::Field {
                base,
                struct_ty,
                field_index,
            },
        );
        Ok(Value::Inst { ty: IrType::Pointer, inst })
    }

    pub fn build_load(&mut self, pointer: Value, ty: IrType) -> Value {
        let inst = self.push(ty.clone(), InstData::Load { ptr: pointer, ty });
        Value::Inst { ty: self.func_ty_of(inst), inst }
    }

    fn func_ty_of(&self, inst: Inst) -> IrType {
        // Re-derive from the function: avoids holding a borrow across
        // `push`, since the instruction record is the single source of
        // truth for an instruction's result type.
        let global = self.current_function.expect("no current function set");
        self.tu
            .global(global)
            .function()
            .expect("current function global has no body")
            .inst_type(inst)
    }

    pub fn build_store(&mut self, pointer: Value, value: Value, ty: IrType) {
        self.push(
            IrType::Void,
            InstData::Store {
                ptr: pointer,
                value,
                ty,
            },
        );
    }

    // ---- conversions ------------------------------------------------------

    pub fn build_cast(&mut self, value: Value, to: IrType) -> Value {
        let inst = self.push(to.clone(), InstData::Cast { value, to });
        Value::Inst { ty: self.func_ty_of(inst), inst }
    }

    pub fn build_zext(&mut self, value: Value, to: IrType) -> Value {
        let inst = self.push(to.clone(), InstData::Zext { value, to });
        Value::Inst { ty: self.func_ty_of(inst), inst }
    }

    pub fn build_sext(&mut self, value: Value, to: IrType) -> Value {
        let inst = self.push(to.clone(), InstData::Sext { value, to });
        Value::Inst { ty: self.func_ty_of(inst), inst }
    }

    // ---- control flow -------------------------------------------------

    pub fn build_branch(&mut self, target: Block) {
        self.push(IrType::Void, InstData::Branch { target });
    }

    pub fn build_cond(&mut self, cond: Value, then_block: Block, else_block: Block) {
        self.push(
            IrType::Void,
            InstData::Cond {
                cond,
                then_block,
                else_block,
            },
        );
    }

    pub fn build_ret(&mut self, value: Value) {
        self.push(IrType::Void, InstData::Ret { value });
    }

    pub fn build_ret_void(&mut self) {
        self.push(IrType::Void, InstData::RetVoid);
    }

    pub fn build_call(
        &mut self,
        callee: Value,
        return_type: IrType,
        args: Vec<Value>,
    ) -> CodegenResult<Value> {
        if args.len() > 6 {
            return Err(CodegenError::exhausted(format!(
                "call with {} arguments exceeds the supported arity of 6",
                args.len()
            )));
        }
        let inst = self.push(
            return_type.clone(),
            InstData::Call {
                callee,
                args,
                ret_ty: return_type,
            },
        );
        Ok(Value::Inst { ty: self.func_ty_of(inst), inst })
    }

    // ---- arithmetic / bitwise / comparison -----------------------------

    pub fn build_binary(&mut self, op: Opcode, lhs: Value, rhs: Value) -> CodegenResult<Value> {
        if lhs.ty() != rhs.ty() {
            return Err(CodegenError::invariant(format!(
                "{:?} requires identical operand types, got {} and {}",
                op,
                lhs.ty(),
                rhs.ty()
            )));
        }
        let result_ty = if op.is_comparison() { IrType::I32 } else { lhs.ty() };
        if let Some(folded) = fold_binary(op, &lhs, &rhs, &result_ty) {
            return Ok(folded);
        }
        let inst = self.push(result_ty.clone(), InstData::Binary { op, lhs, rhs });
        Ok(Value::Inst { ty: self.func_ty_of(inst), inst })
    }

    pub fn build_unary(&mut self, op: Opcode, value: Value) -> CodegenResult<Value> {
        let result_ty = value.ty();
        if let Some(folded) = fold_unary(op, &value, &result_ty) {
            return Ok(folded);
        }
        let inst = self.push(result_ty.clone(), InstData::Unary { op, value });
        Ok(Value::Inst { ty: self.func_ty_of(inst), inst })
    }

    pub fn build_add(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::Add, a, b)
    }
    pub fn build_sub(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::Sub, a, b)
    }
    pub fn build_mul(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::Mul, a, b)
    }
    pub fn build_div(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::Div, a, b)
    }
    pub fn build_bit_xor(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::BitXor, a, b)
    }
    pub fn build_bit_and(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::BitAnd, a, b)
    }
    pub fn build_bit_or(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::BitOr, a, b)
    }
    pub fn build_eq(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::Eq, a, b)
    }
    pub fn build_neq(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::Neq, a, b)
    }
    pub fn build_gt(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::Gt, a, b)
    }
    pub fn build_gte(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::Gte, a, b)
    }
    pub fn build_lt(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::Lt, a, b)
    }
    pub fn build_lte(&mut self, a: Value, b: Value) -> CodegenResult<Value> {
        self.build_binary(Opcode::Lte, a, b)
    }
    pub fn build_bit_not(&mut self, a: Value) -> CodegenResult<Value> {
        self.build_unary(Opcode::BitNot, a)
    }
    pub fn build_log_not(&mut self, a: Value) -> CodegenResult<Value> {
        self.build_unary(Opcode::LogNot, a)
    }

    // exposed for the struct builder API (§4.1 "Public contract":
    // `add_struct(name, num_fields)` — fields are filled by caller).
    pub fn add_struct(&mut self, name: impl Into<String>, num_fields: usize) -> StructId {
        self.tu.add_struct(name, num_fields)
    }
}

fn mask(bits: u64, width: u32) -> u64 {
    if width >= 64 {
        bits
    } else {
        bits & ((1u64 << width) - 1)
    }
}

/// Folds a foldable binary opcode when both operands are constants,
/// using unsigned 64-bit semantics (§4.1: signed comparisons are not
/// folded in this tier). Returns `None` when either operand is not a
/// constant, or folding would require evaluating an undefined
/// operation (division by zero).
fn fold_binary(op: Opcode, lhs: &Value, rhs: &Value, result_ty: &IrType) -> Option<Value> {
    if !op.is_foldable() {
        return None;
    }
    let a = lhs.as_const()?;
    let b = rhs.as_const()?;
    let width = lhs.ty().bit_width().max(1);
    let a = mask(a, width);
    let b = mask(b, width);
    let computed = match op {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Mul => a.wrapping_mul(b),
        Opcode::Div => {
            if b == 0 {
                return None;
            }
            a / b
        }
        Opcode::BitXor => a ^ b,
        Opcode::BitAnd => a & b,
        Opcode::BitOr => a | b,
        Opcode::Eq => (a == b) as u64,
        Opcode::Neq => (a != b) as u64,
        Opcode::Gt => (a > b) as u64,
        Opcode::Gte => (a >= b) as u64,
        Opcode::Lt => (a < b) as u64,
        Opcode::Lte => (a <= b) as u64,
        _ => return None,
    };
    let result_width = result_ty.bit_width().max(1);
    Some(Value::constant(result_ty.clone(), mask(computed, result_width)))
}

fn fold_unary(op: Opcode, value: &Value, result_ty: &IrType) -> Option<Value> {
    if !op.is_foldable() {
        return None;
    }
    let a = value.as_const()?;
    let width = value.ty().bit_width().max(1);
    let a = mask(a, width);
    let computed = match op {
        Opcode::BitNot => mask(!a, width),
        Opcode::LogNot => (a == 0) as u64,
        _ => return None,
    };
    Some(Value::constant(result_ty.clone(), computed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::IrType;

    #[test]
    fn folds_constant_add() {
        let mut tu = TransUnit::new();
        let g = tu.add_function("f", IrType::I32, vec![], crate::symbol::Linkage::Global);
        let mut b = Builder::new(&mut tu);
        b.set_current_function(g);
        let entry = b.create_block("entry");
        b.set_current_block(entry);
        let a = b.value_const(IrType::I32, 40);
        let c = b.value_const(IrType::I32, 2);
        let sum = b.build_add(a, c).unwrap();
        assert_eq!(sum.as_const(), Some(42));
    }

    #[test]
    fn does_not_fold_nonconstant_add() {
        let mut tu = TransUnit::new();
        let g = tu.add_function("f", IrType::I32, vec![IrType::I32], crate::symbol::Linkage::Global);
        let mut b = Builder::new(&mut tu);
        b.set_current_function(g);
        let entry = b.create_block("entry");
        b.set_current_block(entry);
        let arg = b.value_arg(IrType::I32, 0);
        let c = b.value_const(IrType::I32, 1);
        let sum = b.build_add(arg, c).unwrap();
        assert!(sum.as_const().is_none());
    }

    #[test]
    fn rejects_mismatched_operand_types() {
        let mut tu = TransUnit::new();
        let g = tu.add_function("f", IrType::I32, vec![], crate::symbol::Linkage::Global);
        let mut b = Builder::new(&mut tu);
        b.set_current_function(g);
        let entry = b.create_block("entry");
        b.set_current_block(entry);
        let a = b.value_const(IrType::I32, 1);
        let c = b.value_const(IrType::I64, 1);
        assert!(b.build_add(a, c).is_err());
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        let mut tu = TransUnit::new();
        let g = tu.add_function("f", IrType::I32, vec![], crate::symbol::Linkage::Global);
        let mut b = Builder::new(&mut tu);
        b.set_current_function(g);
        let entry = b.create_block("entry");
        b.set_current_block(entry);
        let a = b.value_const(IrType::I32, 1);
        let z = b.value_const(IrType::I32, 0);
        let result = b.build_div(a, z).unwrap();
        assert!(result.as_const().is_none());
    }
}
