//! AST-to-IR lowering (§4.2 "Lowering").
//!
//! [`lower_translation_unit`] walks a parsed translation unit once,
//! threading a single [`Builder`], [`TypeEnv`] and [`ValueScope`]
//! through every top-level item. There is no separate "resolve types"
//! pass — declarators are resolved to a [`CType`] exactly where the
//! source's `ir_gen_declarator` does it, at the point a name comes into
//! scope.
//!
//! Lvalue/rvalue discipline follows §4.2 literally: [`lower_lvalue`]
//! always produces a pointer plus the pointee's `CType`; [`lower_rvalue`]
//! loads through that pointer unless the result is itself struct- or
//! array-typed, in which case the address *is* the value (struct
//! assignment and array decay both fall out of this one rule).

use crate::error::{CodegenError, CodegenResult};
use crate::ir::{Builder, IrType, TransUnit, Value};
use crate::ir_gen::ast::{
    BinOp, BlockItem, Decl, DeclSpecifiers, Declarator, Expr, ForInit, ParamDecl, PostOp, Stmt,
    StorageClass, StructMember, TopLevelItem, UnaryOp,
};
use crate::ir_gen::ctype::{CType, TypeEnv};
use crate::ir_gen::scope::{LoopStack, LoopTargets, ValueScope};
use crate::symbol::Linkage;

/// Lowers every item of a parsed translation unit into `tu`, in order.
pub fn lower_translation_unit(tu: &mut TransUnit, items: &[TopLevelItem]) -> CodegenResult<()> {
    let mut lower = Lower {
        b: Builder::new(tu),
        types: TypeEnv::new(),
        values: ValueScope::new(),
        loops: LoopStack::default(),
    };
    for item in items {
        lower.lower_top_level(item)?;
    }
    Ok(())
}

struct Lower<'a> {
    b: Builder<'a>,
    types: TypeEnv,
    values: ValueScope,
    loops: LoopStack,
}

impl<'a> Lower<'a> {
    fn lower_top_level(&mut self, item: &TopLevelItem) -> CodegenResult<()> {
        match item {
            TopLevelItem::StructDef { tag, members } => self.lower_struct_def(tag, members),
            TopLevelItem::Typedef(decl) => self.lower_typedef(decl),
            TopLevelItem::VarDecl(decl) => self.lower_var_decl(decl),
            TopLevelItem::FunctionDecl { specifiers, declarator } => {
                self.lower_function_decl(specifiers, declarator)
            }
            TopLevelItem::FunctionDef { specifiers, declarator, body } => {
                self.lower_function_def(specifiers, declarator, body)
            }
        }
    }

    fn lower_struct_def(&mut self, tag: &str, members: &[StructMember]) -> CodegenResult<()> {
        let mut resolved = Vec::with_capacity(members.len());
        for m in members {
            let base = base_type_from_specifiers(&m.specifiers, &self.types)?;
            let (name, ty) = resolve_declarator(base, &m.declarator, &self.types)?;
            resolved.push((name, ty));
        }
        let id = self.b.add_struct(tag, resolved.len());
        for (i, (name, ty)) in resolved.iter().enumerate() {
            self.b.trans_unit_mut().set_struct_field(id, i, name.clone(), ty.to_ir());
        }
        self.b.trans_unit_mut().finish_struct(id);
        self.types.register_struct(id, resolved);
        self.types.declare_struct_tag(tag, CType::Struct { tag: tag.to_string(), ir_id: id });
        Ok(())
    }

    fn lower_typedef(&mut self, decl: &Decl) -> CodegenResult<()> {
        let base = base_type_from_specifiers(&decl.specifiers, &self.types)?;
        let (name, ty) = resolve_declarator(base, &decl.declarator, &self.types)?;
        self.types.declare_typedef(&name, ty);
        Ok(())
    }

    fn lower_var_decl(&mut self, decl: &Decl) -> CodegenResult<()> {
        let base = base_type_from_specifiers(&decl.specifiers, &self.types)?;
        let (name, ty) = resolve_declarator(base, &decl.declarator, &self.types)?;
        let linkage = match decl.specifiers.storage_class {
            Some(StorageClass::Static) => Linkage::Local,
            _ => Linkage::Global,
        };
        let global = match self.b.trans_unit().find_global_by_name(&name) {
            Some(g) => g,
            None => self.b.trans_unit_mut().add_var(name.clone(), ty.to_ir(), linkage),
        };
        if let Some(init) = &decl.init {
            match init {
                Expr::IntLiteral(v) => {
                    let g = self.b.trans_unit_mut().global_mut(global);
                    g.init = crate::ir::Initializer::Constant(*v);
                    g.defined = true;
                }
                _ => return Err(CodegenError::unsupported("non-constant global initializer")),
            }
        }
        self.values.declare(&name, ty, Value::global(global));
        Ok(())
    }

    fn lower_function_decl(
        &mut self,
        specifiers: &DeclSpecifiers,
        declarator: &Declarator,
    ) -> CodegenResult<()> {
        let base = base_type_from_specifiers(specifiers, &self.types)?;
        let (name, fn_ty) = resolve_declarator(base, declarator, &self.types)?;
        let (return_type, param_types) = function_parts(&fn_ty)?;
        if self.b.trans_unit().find_global_by_name(&name).is_none() {
            self.b.trans_unit_mut().add_function(
                name.clone(),
                return_type.to_ir(),
                param_types.iter().map(CType::to_ir).collect(),
                Linkage::Global,
            );
        }
        let global = self.b.trans_unit().find_global_by_name(&name).unwrap();
        self.values.declare(&name, fn_ty, Value::global(global));
        Ok(())
    }

    fn lower_function_def(
        &mut self,
        specifiers: &DeclSpecifiers,
        declarator: &Declarator,
        body: &Stmt,
    ) -> CodegenResult<()> {
        let base = base_type_from_specifiers(specifiers, &self.types)?;
        let (name, fn_ty) = resolve_declarator(base, declarator, &self.types)?;
        let (return_type, param_types) = function_parts(&fn_ty)?;
        let param_decls = find_function_params(declarator)
            .ok_or_else(|| CodegenError::invariant("function definition has no parameter list"))?;
        let param_bindings = function_param_bindings(param_decls, &self.types)?;

        let global = match self.b.trans_unit().find_global_by_name(&name) {
            Some(g) => g,
            None => self.b.trans_unit_mut().add_function(
                name.clone(),
                return_type.to_ir(),
                param_types.iter().map(CType::to_ir).collect(),
                Linkage::Global,
            ),
        };
        self.b.trans_unit_mut().global_mut(global).defined = true;
        self.values.declare(&name, fn_ty, Value::global(global));

        self.b.set_current_function(global);
        let entry = self.b.create_block("entry");
        self.b.set_current_block(entry);
        self.values.push();
        for (i, (pname, pty)) in param_bindings.iter().enumerate() {
            let ir_ty = pty.to_ir();
            let slot = self.b.build_local(ir_ty.clone());
            let arg = self.b.value_arg(ir_ty.clone(), i as u32);
            self.b.build_store(slot, arg, ir_ty);
            self.values.declare(pname, pty.clone(), slot);
        }
        self.lower_stmt(body)?;
        self.values.pop();
        Ok(())
    }

    // ---- statements -----------------------------------------------------

    fn lower_stmt(&mut self, stmt: &Stmt) -> CodegenResult<()> {
        match stmt {
            Stmt::Compound(items) => {
                self.values.push();
                for item in items {
                    match item {
                        BlockItem::Decl(decl) => self.lower_local_decl(decl)?,
                        BlockItem::Stmt(s) => self.lower_stmt(s)?,
                    }
                }
                self.values.pop();
                Ok(())
            }
            Stmt::Expr(e) => {
                self.lower_rvalue(e)?;
                Ok(())
            }
            Stmt::Empty => Ok(()),
            Stmt::Return(Some(e)) => {
                let (v, _) = self.lower_rvalue(e)?;
                self.b.build_ret(v);
                Ok(())
            }
            Stmt::Return(None) => {
                self.b.build_ret_void();
                Ok(())
            }
            Stmt::If(cond, then_s, else_s) => self.lower_if(cond, then_s, else_s.as_deref()),
            Stmt::While(cond, body) => self.lower_while(cond, body),
            Stmt::For(init, cond, update, body) => {
                self.lower_for(init, cond.as_ref(), update.as_ref(), body)
            }
            Stmt::Break => {
                let targets = self
                    .loops
                    .current()
                    .ok_or_else(|| CodegenError::invariant("`break` outside a loop"))?;
                self.b.build_branch(targets.break_target);
                Ok(())
            }
            Stmt::Continue => {
                let targets = self
                    .loops
                    .current()
                    .ok_or_else(|| CodegenError::invariant("`continue` outside a loop"))?;
                self.b.build_branch(targets.continue_target);
                Ok(())
            }
        }
    }

    fn lower_local_decl(&mut self, decl: &Decl) -> CodegenResult<()> {
        if decl.specifiers.storage_class == Some(StorageClass::Typedef) {
            return self.lower_typedef(decl);
        }
        let base = base_type_from_specifiers(&decl.specifiers, &self.types)?;
        let (name, ty) = resolve_declarator(base, &decl.declarator, &self.types)?;
        let ir_ty = ty.to_ir();
        let slot = self.b.build_local(ir_ty.clone());
        self.values.declare(&name, ty, slot);
        if let Some(init) = &decl.init {
            let (v, _) = self.lower_rvalue(init)?;
            self.b.build_store(slot, v, ir_ty);
        }
        Ok(())
    }

    fn lower_if(&mut self, cond: &Expr, then_s: &Stmt, else_s: Option<&Stmt>) -> CodegenResult<()> {
        let initial_block = self.b.current_block();
        let then_block = self.b.create_block("if.then");
        let after_block = self.b.create_block("if.after");

        self.b.set_current_block(then_block);
        self.lower_stmt(then_s)?;
        self.b.build_branch(after_block);

        let else_block = match else_s {
            Some(else_s) => {
                let eb = self.b.create_block("if.else");
                self.b.set_current_block(eb);
                self.lower_stmt(else_s)?;
                self.b.build_branch(after_block);
                Some(eb)
            }
            None => None,
        };

        self.b.set_current_block(initial_block);
        let (cond_v, _) = self.lower_rvalue(cond)?;
        match else_block {
            Some(eb) => self.b.build_cond(cond_v, then_block, eb),
            None => self.b.build_cond(cond_v, then_block, after_block),
        }

        self.b.set_current_block(after_block);
        Ok(())
    }

    fn lower_while(&mut self, cond: &Expr, body: &Stmt) -> CodegenResult<()> {
        let pre_header = self.b.create_block("while.ph");
        let body_block = self.b.create_block("while.body");
        let after = self.b.create_block("while.after");

        self.b.build_branch(pre_header);
        self.b.set_current_block(pre_header);
        let (cond_v, _) = self.lower_rvalue(cond)?;
        self.b.build_cond(cond_v, body_block, after);

        self.loops.push(LoopTargets { break_target: after, continue_target: pre_header });
        self.b.set_current_block(body_block);
        self.lower_stmt(body)?;
        self.b.build_branch(pre_header);
        self.loops.pop();

        self.b.set_current_block(after);
        Ok(())
    }

    fn lower_for(
        &mut self,
        init: &ForInit,
        cond: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
    ) -> CodegenResult<()> {
        self.values.push();
        match init {
            ForInit::Decl(decl) => self.lower_local_decl(decl)?,
            ForInit::Expr(e) => {
                self.lower_rvalue(e)?;
            }
            ForInit::None => {}
        }

        let pre_header = self.b.create_block("for.ph");
        let body_block = self.b.create_block("for.body");
        let update_block = self.b.create_block("for.update");
        let after = self.b.create_block("for.after");

        self.b.build_branch(pre_header);
        self.b.set_current_block(pre_header);
        match cond {
            Some(c) => {
                let (v, _) = self.lower_rvalue(c)?;
                self.b.build_cond(v, body_block, after);
            }
            None => self.b.build_branch(body_block),
        }

        self.loops.push(LoopTargets { break_target: after, continue_target: update_block });
        self.b.set_current_block(body_block);
        self.lower_stmt(body)?;
        self.b.build_branch(update_block);
        self.loops.pop();

        self.b.set_current_block(update_block);
        if let Some(u) = update {
            self.lower_rvalue(u)?;
        }
        self.b.build_branch(pre_header);

        self.b.set_current_block(after);
        self.values.pop();
        Ok(())
    }

    // ---- lvalues ----------------------------------------------------------

    /// Resolves `e` to a pointer Value plus the pointee's `CType`. Only
    /// the shapes §4.2 names as legal lvalues are accepted; everything
    /// else is an internal-invariant error (a real front end would
    /// reject a non-lvalue assignment target before this pass runs).
    fn lower_lvalue(&mut self, e: &Expr) -> CodegenResult<(Value, CType)> {
        match e {
            Expr::Ident(name) => self
                .values
                .lookup(name)
                .map(|(ty, v)| (v, ty))
                .ok_or_else(|| CodegenError::invariant(format!("undefined identifier `{name}`"))),
            Expr::Unary(UnaryOp::Deref, inner) => {
                let (v, ty) = self.lower_rvalue(inner)?;
                if !ty.is_pointer_like() {
                    return Err(CodegenError::invariant("dereference of a non-pointer value"));
                }
                Ok((v, ty.pointee().clone()))
            }
            Expr::Index(base, idx) => self.lower_index_addr(base, idx),
            Expr::Field(base, field) => {
                let (base_ptr, base_ty) = self.lower_lvalue(base)?;
                self.lower_field_addr(base_ptr, &base_ty, field)
            }
            Expr::Arrow(base, field) => {
                let (base_ptr, base_ty) = self.lower_rvalue(base)?;
                if !base_ty.is_pointer_like() {
                    return Err(CodegenError::invariant("`->` against a non-pointer value"));
                }
                self.lower_field_addr(base_ptr, base_ty.pointee(), field)
            }
            _ => Err(CodegenError::invariant("expression is not an lvalue")),
        }
    }

    fn lower_field_addr(
        &mut self,
        base_ptr: Value,
        struct_ty: &CType,
        field_name: &str,
    ) -> CodegenResult<(Value, CType)> {
        let CType::Struct { ir_id, .. } = struct_ty else {
            return Err(CodegenError::invariant("field access against a non-struct value"));
        };
        let (_, field_ty) = self.types.struct_member(*ir_id, field_name).ok_or_else(|| {
            CodegenError::invariant(format!("no field `{field_name}` on this struct"))
        })?;
        let ptr = self.b.build_field(base_ptr, struct_ty.to_ir(), field_name)?;
        Ok((ptr, field_ty))
    }

    fn lower_index_addr(&mut self, base: &Expr, idx: &Expr) -> CodegenResult<(Value, CType)> {
        let (base_v, base_ty) = self.lower_rvalue(base)?;
        if !base_ty.is_pointer_like() {
            return Err(CodegenError::invariant("`[]` against a non-pointer value"));
        }
        let (idx_v, idx_ty) = self.lower_rvalue(idx)?;
        if !idx_ty.is_integer() {
            return Err(CodegenError::invariant("array index must be an integer"));
        }
        let elem_ty = base_ty.pointee().clone();
        let ptr = self.build_ptr_add(base_v, &elem_ty, idx_v)?;
        Ok((ptr, elem_ty))
    }

    /// `p + i`: zext `i` to a 64-bit integer, cast `p` to that same
    /// type, multiply by `sizeof(elem)`, add, cast back to `ptr` — the
    /// exact sequence `ir_gen_add` in the original emits for pointer
    /// arithmetic.
    fn build_ptr_add(&mut self, ptr_v: Value, elem_ty: &CType, idx_v: Value) -> CodegenResult<Value> {
        let i64_ty = IrType::I64;
        let idx_ext = self.b.build_zext(idx_v, i64_ty.clone());
        let ptr_as_int = self.b.build_cast(ptr_v, i64_ty.clone());
        let elem_size = self.b.trans_unit().size_of(&elem_ty.to_ir());
        let size_const = self.b.value_const(i64_ty.clone(), elem_size);
        let addend = self.b.build_mul(idx_ext, size_const)?;
        let sum = self.b.build_add(ptr_as_int, addend)?;
        Ok(self.b.build_cast(sum, IrType::Pointer))
    }

    // ---- rvalues ------------------------------------------------------

    fn lower_rvalue(&mut self, e: &Expr) -> CodegenResult<(Value, CType)> {
        match e {
            Expr::IntLiteral(v) => Ok((self.b.value_const(IrType::I32, *v), CType::INT)),
            Expr::Ident(name) => {
                let (ty, v) = self
                    .values
                    .lookup(name)
                    .ok_or_else(|| CodegenError::invariant(format!("undefined identifier `{name}`")))?;
                self.load_unless_aggregate(v, ty)
            }
            Expr::Field(..) | Expr::Arrow(..) | Expr::Index(..) => {
                let (ptr, ty) = self.lower_lvalue(e)?;
                self.load_unless_aggregate(ptr, ty)
            }
            Expr::Unary(UnaryOp::Deref, _) => {
                let (ptr, ty) = self.lower_lvalue(e)?;
                self.load_unless_aggregate(ptr, ty)
            }
            Expr::Unary(UnaryOp::AddrOf, inner) => {
                let (ptr, ty) = self.lower_lvalue(inner)?;
                Ok((ptr, ty.pointer_to()))
            }
            Expr::Unary(UnaryOp::Plus, inner) => self.lower_rvalue(inner),
            Expr::Unary(UnaryOp::Neg, inner) => {
                let (v, ty) = self.lower_rvalue(inner)?;
                let zero = self.b.value_const(ty.to_ir(), 0);
                let result = self.b.build_sub(zero, v)?;
                Ok((result, ty))
            }
            Expr::Unary(UnaryOp::BitNot, inner) => {
                let (v, ty) = self.lower_rvalue(inner)?;
                Ok((self.b.build_bit_not(v)?, ty))
            }
            Expr::Unary(UnaryOp::LogNot, inner) => {
                let (v, _) = self.lower_rvalue(inner)?;
                Ok((self.b.build_log_not(v)?, CType::INT))
            }
            Expr::Unary(UnaryOp::PreInc, inner) => self.lower_incdec(inner, true, true),
            Expr::Unary(UnaryOp::PreDec, inner) => self.lower_incdec(inner, false, true),
            Expr::PostIncDec(PostOp::Inc, inner) => self.lower_incdec(inner, true, false),
            Expr::PostIncDec(PostOp::Dec, inner) => self.lower_incdec(inner, false, false),
            Expr::Binary(op, a, b) => self.lower_binary(*op, a, b),
            Expr::Assign(None, lhs, rhs) => {
                let (v, _) = self.lower_rvalue(rhs)?;
                let (ptr, lty) = self.lower_lvalue(lhs)?;
                self.b.build_store(ptr, v, lty.to_ir());
                Ok((v, lty))
            }
            Expr::Assign(Some(op), lhs, rhs) => {
                let (ptr, lty) = self.lower_lvalue(lhs)?;
                let cur = self.b.build_load(ptr, lty.to_ir());
                let (rv, _) = self.lower_rvalue(rhs)?;
                let result = self.apply_binop(*op, cur, rv)?;
                self.b.build_store(ptr, result, lty.to_ir());
                Ok((result, lty))
            }
            Expr::Comma(a, b) => {
                self.lower_rvalue(a)?;
                self.lower_rvalue(b)
            }
            Expr::Ternary(cond, t, f) => self.lower_ternary(cond, t, f),
            Expr::Call(callee, args) => self.lower_call(callee, args),
        }
    }

    /// A struct- or array-typed pointer *is* its own value (§4.2); every
    /// other type is loaded through the pointer.
    fn load_unless_aggregate(&mut self, ptr: Value, ty: CType) -> CodegenResult<(Value, CType)> {
        match &ty {
            CType::Struct { .. } | CType::Array(..) | CType::Function { .. } => Ok((ptr, ty)),
            _ => {
                let ir_ty = ty.to_ir();
                Ok((self.b.build_load(ptr, ir_ty), ty))
            }
        }
    }

    fn lower_incdec(&mut self, target: &Expr, is_inc: bool, is_pre: bool) -> CodegenResult<(Value, CType)> {
        let (ptr, ty) = self.lower_lvalue(target)?;
        let cur = self.b.build_load(ptr, ty.to_ir());
        let updated = if ty.is_pointer_like() {
            let elem_ty = ty.pointee().clone();
            let one = self.b.value_const(IrType::I64, if is_inc { 1 } else { (-1i64) as u64 });
            self.build_ptr_add(cur, &elem_ty, one)?
        } else {
            let one = self.b.value_const(ty.to_ir(), 1);
            if is_inc {
                self.b.build_add(cur, one)?
            } else {
                self.b.build_sub(cur, one)?
            }
        };
        self.b.build_store(ptr, updated, ty.to_ir());
        Ok((if is_pre { updated } else { cur }, ty))
    }

    fn lower_binary(&mut self, op: BinOp, a: &Expr, b: &Expr) -> CodegenResult<(Value, CType)> {
        match op {
            BinOp::LogAnd => self.lower_logical(a, b, true),
            BinOp::LogOr => self.lower_logical(a, b, false),
            BinOp::Add => self.lower_add(a, b),
            BinOp::Sub => self.lower_sub(a, b),
            BinOp::Mod | BinOp::Shl | BinOp::Shr => {
                Err(CodegenError::unsupported(format!("`{op:?}` has no corresponding IR opcode")))
            }
            _ => {
                let (av, aty) = self.lower_rvalue(a)?;
                let (bv, _) = self.lower_rvalue(b)?;
                let result = self.apply_binop(op, av, bv)?;
                let result_ty = if is_comparison(op) { CType::INT } else { aty };
                Ok((result, result_ty))
            }
        }
    }

    fn apply_binop(&mut self, op: BinOp, a: Value, b: Value) -> CodegenResult<Value> {
        match op {
            BinOp::Mul => self.b.build_mul(a, b),
            BinOp::Div => self.b.build_div(a, b),
            BinOp::BitAnd => self.b.build_bit_and(a, b),
            BinOp::BitXor => self.b.build_bit_xor(a, b),
            BinOp::BitOr => self.b.build_bit_or(a, b),
            BinOp::Eq => self.b.build_eq(a, b),
            BinOp::Ne => self.b.build_neq(a, b),
            BinOp::Gt => self.b.build_gt(a, b),
            BinOp::Ge => self.b.build_gte(a, b),
            BinOp::Lt => self.b.build_lt(a, b),
            BinOp::Le => self.b.build_lte(a, b),
            BinOp::Add => self.b.build_add(a, b),
            BinOp::Sub => self.b.build_sub(a, b),
            BinOp::Mod | BinOp::Shl | BinOp::Shr | BinOp::LogAnd | BinOp::LogOr => {
                Err(CodegenError::unsupported(format!("`{op:?}` has no corresponding IR opcode")))
            }
        }
    }

    fn lower_add(&mut self, a: &Expr, b: &Expr) -> CodegenResult<(Value, CType)> {
        let (av, aty) = self.lower_rvalue(a)?;
        let (bv, bty) = self.lower_rvalue(b)?;
        if aty.is_integer() && bty.is_integer() {
            return Ok((self.b.build_add(av, bv)?, aty));
        }
        let (ptr_v, ptr_ty, idx_v) = match (aty.is_pointer_like(), bty.is_pointer_like()) {
            (true, false) => (av, aty, bv),
            (false, true) => (bv, bty, av),
            _ => return Err(CodegenError::unsupported("`+` between these operand types")),
        };
        let elem_ty = ptr_ty.pointee().clone();
        let result = self.build_ptr_add(ptr_v, &elem_ty, idx_v)?;
        let result_ty = elem_ty.pointer_to();
        Ok((result, result_ty))
    }

    fn lower_sub(&mut self, a: &Expr, b: &Expr) -> CodegenResult<(Value, CType)> {
        let (av, aty) = self.lower_rvalue(a)?;
        let (bv, bty) = self.lower_rvalue(b)?;
        if aty.is_integer() && bty.is_integer() {
            return Ok((self.b.build_sub(av, bv)?, aty));
        }
        if aty.is_pointer_like() && bty.is_integer() {
            let elem_ty = aty.pointee().clone();
            let i64_ty = IrType::I64;
            let idx_ext = self.b.build_zext(bv, i64_ty.clone());
            let zero = self.b.value_const(i64_ty.clone(), 0);
            let neg_idx = self.b.build_sub(zero, idx_ext)?;
            let result = self.build_ptr_add(av, &elem_ty, neg_idx)?;
            let result_ty = elem_ty.pointer_to();
            return Ok((result, result_ty));
        }
        Err(CodegenError::unsupported("pointer-pointer subtraction"))
    }

    /// `&&`/`||` short-circuit via control flow into a result slot,
    /// needing no new IR opcode (§9: resolved as a supplement, not a
    /// dropped feature — the IR has no logical-and/or instruction).
    fn lower_logical(&mut self, a: &Expr, b: &Expr, is_and: bool) -> CodegenResult<(Value, CType)> {
        let slot = self.b.build_local(IrType::I32);
        let rhs_block = self.b.create_block(if is_and { "and.rhs" } else { "or.rhs" });
        let short_block = self.b.create_block(if is_and { "and.short" } else { "or.short" });
        let after = self.b.create_block(if is_and { "and.after" } else { "or.after" });

        let (av, _) = self.lower_rvalue(a)?;
        let zero_a = self.b.value_const(av.ty(), 0);
        let a_true = self.b.build_neq(av, zero_a)?;
        if is_and {
            self.b.build_cond(a_true, rhs_block, short_block);
        } else {
            self.b.build_cond(a_true, short_block, rhs_block);
        }

        self.b.set_current_block(rhs_block);
        let (bv, _) = self.lower_rvalue(b)?;
        let zero_b = self.b.value_const(bv.ty(), 0);
        let b_true = self.b.build_neq(bv, zero_b)?;
        self.b.build_store(slot, b_true, IrType::I32);
        self.b.build_branch(after);

        self.b.set_current_block(short_block);
        let short_val = self.b.value_const(IrType::I32, if is_and { 0 } else { 1 });
        self.b.build_store(slot, short_val, IrType::I32);
        self.b.build_branch(after);

        self.b.set_current_block(after);
        let result = self.b.build_load(slot, IrType::I32);
        Ok((result, CType::INT))
    }

    fn lower_ternary(&mut self, cond: &Expr, t: &Expr, f: &Expr) -> CodegenResult<(Value, CType)> {
        let (cv, _) = self.lower_rvalue(cond)?;
        let then_block = self.b.create_block("cond.then");
        let else_block = self.b.create_block("cond.else");
        let after = self.b.create_block("cond.after");
        self.b.build_cond(cv, then_block, else_block);

        self.b.set_current_block(then_block);
        let (tv, tty) = self.lower_rvalue(t)?;
        let slot = self.b.build_local(tty.to_ir());
        self.b.build_store(slot, tv, tty.to_ir());
        self.b.build_branch(after);

        self.b.set_current_block(else_block);
        let (fv, _) = self.lower_rvalue(f)?;
        self.b.build_store(slot, fv, tty.to_ir());
        self.b.build_branch(after);

        self.b.set_current_block(after);
        let result = self.b.build_load(slot, tty.to_ir());
        Ok((result, tty))
    }

    fn lower_call(&mut self, callee: &Expr, args: &[Expr]) -> CodegenResult<(Value, CType)> {
        let (callee_v, callee_ty) = self.lower_rvalue(callee)?;
        let (return_type, param_types) = match &callee_ty {
            CType::Function { return_type, params } => ((**return_type).clone(), params.clone()),
            CType::Pointer(inner) => function_parts(inner)?,
            _ => return Err(CodegenError::invariant("call target is not a function")),
        };
        if args.len() != param_types.len() {
            return Err(CodegenError::invariant(format!(
                "call expects {} arguments, got {}",
                param_types.len(),
                args.len()
            )));
        }
        let mut arg_values = Vec::with_capacity(args.len());
        for a in args {
            let (v, _) = self.lower_rvalue(a)?;
            arg_values.push(v);
        }
        let ir_ret = return_type.to_ir();
        let result = self.b.build_call(callee_v, ir_ret, arg_values)?;
        Ok((result, return_type))
    }
}

fn is_comparison(op: BinOp) -> bool {
    matches!(op, BinOp::Eq | BinOp::Ne | BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le)
}

fn function_parts(ty: &CType) -> CodegenResult<(CType, Vec<CType>)> {
    match ty {
        CType::Function { return_type, params } => Ok(((**return_type).clone(), params.clone())),
        other => Err(CodegenError::invariant(format!("{other:?} is not a function type"))),
    }
}

/// Resolves a specifier-derived base type and a declarator to a
/// `(name, CType)` pair, applying whichever declarator node is
/// outermost to `base` first and recursing toward the identifier — see
/// the doc comment on [`Declarator`].
fn resolve_declarator(base: CType, d: &Declarator, types: &TypeEnv) -> CodegenResult<(String, CType)> {
    match d {
        Declarator::Identifier(name) => Ok((name.clone(), base)),
        Declarator::Pointer(inner) => resolve_declarator(base.pointer_to(), inner, types),
        Declarator::Array(inner, len) => {
            let n = len.ok_or_else(|| CodegenError::unsupported("array declarator with no length"))?;
            resolve_declarator(CType::Array(Box::new(base), n), inner, types)
        }
        Declarator::Function(inner, params, variadic) => {
            if *variadic {
                return Err(CodegenError::unsupported("variadic function"));
            }
            let mut param_types = Vec::with_capacity(params.len());
            for p in params {
                param_types.push(resolve_param_type(p, types)?);
            }
            resolve_declarator(
                CType::Function { return_type: Box::new(base), params: param_types },
                inner,
                types,
            )
        }
    }
}

fn resolve_param_type(p: &ParamDecl, types: &TypeEnv) -> CodegenResult<CType> {
    let base = base_type_from_specifiers(&p.specifiers, types)?;
    match &p.declarator {
        Some(d) => Ok(resolve_declarator(base, d, types)?.1),
        None => Ok(base),
    }
}

fn function_param_bindings(params: &[ParamDecl], types: &TypeEnv) -> CodegenResult<Vec<(String, CType)>> {
    let mut out = Vec::with_capacity(params.len());
    for p in params {
        let base = base_type_from_specifiers(&p.specifiers, types)?;
        let declarator = p
            .declarator
            .as_ref()
            .ok_or_else(|| CodegenError::unsupported("unnamed parameter in a function definition"))?;
        out.push(resolve_declarator(base, declarator, types)?);
    }
    Ok(out)
}

/// Finds the `Function` declarator node reachable from `d` without
/// crossing another `Function` — there is exactly one per top-level
/// declarator in this subset (functions returning functions are not
/// representable in C without an intervening pointer/typedef, and this
/// subset has no function-pointer declarators either).
fn find_function_params(d: &Declarator) -> Option<&Vec<ParamDecl>> {
    match d {
        Declarator::Function(_, params, _) => Some(params),
        Declarator::Pointer(inner) | Declarator::Array(inner, _) => find_function_params(inner),
        Declarator::Identifier(_) => None,
    }
}

fn base_type_from_specifiers(specs: &DeclSpecifiers, types: &TypeEnv) -> CodegenResult<CType> {
    use crate::ir_gen::ast::TypeSpecifier;
    for ts in &specs.type_specifiers {
        return match ts {
            TypeSpecifier::Void => Ok(CType::Void),
            TypeSpecifier::Char => Ok(CType::CHAR),
            TypeSpecifier::Int => Ok(CType::INT),
            TypeSpecifier::Long => Ok(CType::LONG),
            TypeSpecifier::TypedefName(name) => types
                .lookup_bare_type(name)
                .cloned()
                .ok_or_else(|| CodegenError::invariant(format!("unknown type name `{name}`"))),
            TypeSpecifier::Struct(tag) => types
                .lookup_struct_tag(tag)
                .cloned()
                .ok_or_else(|| CodegenError::invariant(format!("undefined struct `{tag}`"))),
        };
    }
    Err(CodegenError::invariant("declaration has no type specifier"))
}
