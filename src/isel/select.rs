//! Per-function instruction selection (§4.3 "Instruction selection").
//!
//! [`select_module`] walks every defined function global in a
//! [`TransUnit`] and produces its [`AsmFunction`] body — prologue and
//! epilogue are left empty here; [`crate::regalloc`] synthesizes them
//! once it knows the callee-save set and final frame size. Selection
//! proceeds in IR order one function at a time, so every `Value` a
//! later instruction reads has already been selected by the time it's
//! needed — the same forward-pass assumption `ir_gen::lower` makes
//! about its own AST walk.

use rustc_hash::FxHashMap;

use crate::asm::reg::ARG_REGS;
use crate::asm::{
    global_mem, imm, label, offset_reg, phys, sym, vreg, AsmFunction, AsmModule, AsmOpcode,
    Condition, Label, PhysicalRegister, RegRef, VReg,
};
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{Block, Function, Global, Inst, InstData, IrType, Opcode, TransUnit, Value};
use crate::isel::frame::Frame;

pub fn select_module(tu: &TransUnit) -> CodegenResult<AsmModule> {
    let mut module = AsmModule::new();
    for (global, data) in tu.globals() {
        if !data.defined {
            continue;
        }
        if let Some(func) = data.function() {
            log::debug!("selecting instructions for {global} ({} blocks)", func.blocks().count());
            let asm_func = select_function(tu, func)?;
            module.insert_function(global, asm_func);
        }
    }
    Ok(module)
}

pub fn select_function(tu: &TransUnit, func: &Function) -> CodegenResult<AsmFunction> {
    let mut sel = Select {
        tu,
        func,
        asm: AsmFunction::new(),
        frame: Frame::new(),
        block_labels: FxHashMap::default(),
        value_map: FxHashMap::default(),
        arg_vregs: Vec::new(),
    };
    sel.select()?;
    Ok(sel.asm)
}

/// The address a `LOCAL`/`FIELD`-typed value resolves to: either an
/// `RBP`-or-register-relative stack/heap offset, or a global's address
/// plus a constant byte offset folded into the relocation at encode
/// time (§4.5's fixups carry an addend the same way an ELF `Rela` does).
#[derive(Clone, Copy)]
enum AddrDesc {
    Stack { base: RegRef, offset: i32 },
    Global { global: Global, offset: i32 },
}

impl AddrDesc {
    fn plus(self, delta: i64) -> AddrDesc {
        match self {
            AddrDesc::Stack { base, offset } => AddrDesc::Stack { base, offset: offset + delta as i32 },
            AddrDesc::Global { global, offset } => AddrDesc::Global { global, offset: offset + delta as i32 },
        }
    }
}

enum ConvertKind {
    Cast,
    Zext,
    Sext,
}

struct Select<'a> {
    tu: &'a TransUnit,
    func: &'a Function,
    asm: AsmFunction,
    frame: Frame,
    block_labels: FxHashMap<Block, Label>,
    /// Maps an instruction producing a scalar register result to the
    /// vreg holding it. `LOCAL`/`FIELD` results (pointers) are deliberately
    /// absent here — their "value" is a compile-time address descriptor,
    /// resolved on demand by [`Select::addr_of`], unless something reads
    /// them as a plain register (array/struct decay, `&expr`), in which
    /// case [`Select::value_reg`] both materializes and memoizes them.
    value_map: FxHashMap<Inst, VReg>,
    arg_vregs: Vec<VReg>,
}

impl<'a> Select<'a> {
    fn select(&mut self) -> CodegenResult<()> {
        if self.func.arity() as usize > ARG_REGS.len() {
            return Err(CodegenError::exhausted(format!(
                "function with {} parameters exceeds the supported arity of {}",
                self.func.arity(),
                ARG_REGS.len()
            )));
        }
        for (i, _ty) in self.func.param_types.iter().enumerate() {
            self.arg_vregs.push(self.asm.new_precolored_vreg(ARG_REGS[i]));
        }
        for block in self.func.blocks() {
            let l = self.asm.new_label();
            self.block_labels.insert(block, l);
        }
        for block in self.func.blocks() {
            let insts = self.func.block_insts(block).to_vec();
            let start = self.asm.body.len();
            for inst in insts {
                self.select_inst(inst)?;
            }
            if self.asm.body.len() == start {
                return Err(CodegenError::invariant(format!(
                    "block {} produced no instructions",
                    self.func.block_name(block)
                )));
            }
            let l = self.block_labels[&block];
            self.asm.attach_label(start, l);
        }
        self.asm.local_stack_usage = self.frame.total_usage();
        Ok(())
    }

    fn select_inst(&mut self, inst: Inst) -> CodegenResult<()> {
        let data = self.func.inst(inst).data.clone();
        match data {
            InstData::Local { ty } => {
                self.frame.alloc(inst, &ty, self.tu);
            }
            InstData::Field { .. } => {
                // No asm: resolved lazily through `addr_of`/`value_reg`.
            }
            InstData::Load { ptr, ty } => {
                let addr = self.addr_of(ptr)?;
                let width = width_of(&ty);
                let operand = self.addr_operand(addr, width);
                let dst = self.asm.new_vreg();
                self.asm.emit2(AsmOpcode::Mov, vreg(dst, width), operand);
                self.value_map.insert(inst, dst);
            }
            InstData::Store { ptr, value, ty } => {
                let addr = self.addr_of(ptr)?;
                let width = width_of(&ty);
                let operand = self.addr_operand(addr, width);
                let val = self.read_operand(value)?;
                self.asm.emit2(AsmOpcode::Mov, operand, val);
            }
            InstData::Cast { value, to } => self.select_convert(inst, value, &to, ConvertKind::Cast)?,
            InstData::Zext { value, to } => self.select_convert(inst, value, &to, ConvertKind::Zext)?,
            InstData::Sext { value, to } => self.select_convert(inst, value, &to, ConvertKind::Sext)?,
            InstData::Branch { target } => {
                let l = self.block_labels[&target];
                self.asm.emit1(AsmOpcode::Jmp, label(l));
            }
            InstData::Cond { cond, then_block, else_block } => {
                let cop = self.read_operand(cond)?;
                self.asm.emit2(AsmOpcode::Cmp, cop, imm(0));
                let el = self.block_labels[&else_block];
                let th = self.block_labels[&then_block];
                self.asm.emit1(AsmOpcode::JCc(Condition::Eq), label(el));
                self.asm.emit1(AsmOpcode::Jmp, label(th));
            }
            InstData::Ret { value } => {
                let width = width_of(&value.ty());
                self.materialize_into(value, RegRef::Physical(PhysicalRegister::Rax), width)?;
                let rl = self.asm.ret_label;
                self.asm.emit1(AsmOpcode::Jmp, label(rl));
            }
            InstData::RetVoid => {
                let rl = self.asm.ret_label;
                self.asm.emit1(AsmOpcode::Jmp, label(rl));
            }
            InstData::Call { callee, args, ret_ty } => self.select_call(inst, callee, args, &ret_ty)?,
            InstData::Binary { op, lhs, rhs } => self.select_binary(inst, op, lhs, rhs)?,
            InstData::Unary { op, value } => self.select_unary(inst, op, value)?,
        }
        Ok(())
    }

    // ---- addressing ------------------------------------------------

    fn addr_of(&mut self, v: Value) -> CodegenResult<AddrDesc> {
        match v {
            Value::Global { global } => Ok(AddrDesc::Global { global, offset: 0 }),
            Value::Inst { inst, .. } => {
                if let Some(off) = self.frame.offset_of(inst) {
                    return Ok(AddrDesc::Stack {
                        base: RegRef::Physical(PhysicalRegister::Rbp),
                        offset: off as i32,
                    });
                }
                if let Some(vr) = self.value_map.get(&inst).copied() {
                    return Ok(AddrDesc::Stack { base: RegRef::Virtual(vr), offset: 0 });
                }
                if let InstData::Field { base, struct_ty, field_index } = self.func.inst(inst).data.clone() {
                    let field_offset = self.field_byte_offset(&struct_ty, field_index)?;
                    return Ok(self.addr_of(base)?.plus(field_offset as i64));
                }
                Err(CodegenError::invariant(format!(
                    "{inst} used as an address before it was selected"
                )))
            }
            other => Err(CodegenError::invariant(format!("{other:?} cannot be used as an address"))),
        }
    }

    fn addr_operand(&self, addr: AddrDesc, width: u32) -> crate::asm::AsmOperand {
        match addr {
            AddrDesc::Stack { base, offset } => offset_reg(base, width, offset),
            AddrDesc::Global { global, offset } => global_mem(global, width, offset),
        }
    }

    fn field_byte_offset(&self, struct_ty: &IrType, field_index: u32) -> CodegenResult<u64> {
        let IrType::Struct(id) = struct_ty else {
            return Err(CodegenError::invariant(format!("FIELD against non-struct type {struct_ty}")));
        };
        self.tu
            .strukt(*id)
            .fields
            .get(field_index as usize)
            .map(|f| f.offset)
            .ok_or_else(|| CodegenError::invariant(format!("field index {field_index} out of range on struct {id}")))
    }

    // ---- value materialization --------------------------------------

    /// A vreg already holding `v`'s value, materializing it if needed.
    fn value_reg(&mut self, v: Value) -> CodegenResult<VReg> {
        match v {
            Value::Inst { inst, .. } => {
                if let Some(vr) = self.value_map.get(&inst).copied() {
                    return Ok(vr);
                }
                let dst = self.asm.new_vreg();
                self.materialize_into(v, RegRef::Virtual(dst), 64)?;
                self.value_map.insert(inst, dst);
                Ok(dst)
            }
            Value::Arg { index, .. } => self
                .arg_vregs
                .get(index as usize)
                .copied()
                .ok_or_else(|| CodegenError::invariant(format!("argument index {index} out of range"))),
            Value::Const { ty, bits } => {
                let width = width_of(&ty);
                let dst = self.asm.new_vreg();
                self.asm.emit2(AsmOpcode::Mov, vreg(dst, width), imm(bits));
                Ok(dst)
            }
            Value::Global { .. } => {
                let dst = self.asm.new_vreg();
                self.materialize_into(v, RegRef::Virtual(dst), 64)?;
                Ok(dst)
            }
        }
    }

    /// Writes `v`'s value into `dst` directly — used for `RET`
    /// (targets `phys(RAX)`), `CALL` argument binding (targets a fresh
    /// pre-colored vreg), and [`Select::value_reg`]'s materialization
    /// of an address used as a plain value.
    fn materialize_into(&mut self, v: Value, dst: RegRef, width: u32) -> CodegenResult<()> {
        match v {
            Value::Const { bits, .. } => {
                self.asm.emit2(AsmOpcode::Mov, reg_operand(dst, width), imm(bits));
            }
            Value::Arg { index, .. } => {
                let src = self
                    .arg_vregs
                    .get(index as usize)
                    .copied()
                    .ok_or_else(|| CodegenError::invariant(format!("argument index {index} out of range")))?;
                self.asm.emit2(AsmOpcode::Mov, reg_operand(dst, width), vreg(src, width));
            }
            Value::Global { global } => {
                self.asm.emit2(AsmOpcode::Mov, reg_operand(dst, width), sym(global));
            }
            Value::Inst { inst, .. } => {
                if let Some(src) = self.value_map.get(&inst).copied() {
                    self.asm.emit2(AsmOpcode::Mov, reg_operand(dst, width), vreg(src, width));
                    return Ok(());
                }
                let addr = if let Some(off) = self.frame.offset_of(inst) {
                    AddrDesc::Stack { base: RegRef::Physical(PhysicalRegister::Rbp), offset: off as i32 }
                } else if let InstData::Field { base, struct_ty, field_index } = self.func.inst(inst).data.clone() {
                    let field_offset = self.field_byte_offset(&struct_ty, field_index)?;
                    self.addr_of(base)?.plus(field_offset as i64)
                } else {
                    return Err(CodegenError::invariant(format!("{inst} used before it was selected")));
                };
                match addr {
                    AddrDesc::Stack { base, offset } => {
                        self.asm.emit2(AsmOpcode::Mov, reg_operand(dst, width), reg_operand(base, width));
                        if offset != 0 {
                            self.asm.emit2(AsmOpcode::Add, reg_operand(dst, width), imm(offset as i64 as u64));
                        }
                    }
                    AddrDesc::Global { global, offset } => {
                        self.asm.emit2(AsmOpcode::Mov, reg_operand(dst, width), sym(global));
                        if offset != 0 {
                            self.asm.emit2(AsmOpcode::Add, reg_operand(dst, width), imm(offset as i64 as u64));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// An operand suitable for directly reading `v`: the constant
    /// itself, or a register holding it.
    fn read_operand(&mut self, v: Value) -> CodegenResult<crate::asm::AsmOperand> {
        match v {
            Value::Const { bits, .. } => Ok(imm(bits)),
            _ => {
                let width = width_of(&v.ty());
                let r = self.value_reg(v)?;
                Ok(vreg(r, width))
            }
        }
    }

    // ---- opcode families --------------------------------------------

    fn select_convert(&mut self, inst: Inst, value: Value, to: &IrType, kind: ConvertKind) -> CodegenResult<()> {
        let to_width = width_of(to);
        let from_width = width_of(&value.ty());
        let src = self.value_reg(value)?;
        let dst = self.asm.new_vreg();
        match kind {
            ConvertKind::Cast => {
                self.asm.emit2(AsmOpcode::Mov, vreg(dst, to_width), vreg(src, to_width));
            }
            ConvertKind::Zext => {
                self.asm.emit2(AsmOpcode::Movzx, vreg(dst, to_width), vreg(src, from_width));
            }
            ConvertKind::Sext => {
                self.asm.emit2(AsmOpcode::Movsx, vreg(dst, to_width), vreg(src, from_width));
            }
        }
        self.value_map.insert(inst, dst);
        Ok(())
    }

    fn select_binary(&mut self, inst: Inst, op: Opcode, lhs: Value, rhs: Value) -> CodegenResult<()> {
        let width = width_of(&lhs.ty());
        if op.is_comparison() {
            let cond = comparison_condition(op);
            let a = self.read_operand(lhs)?;
            let b = self.read_operand(rhs)?;
            self.asm.emit2(AsmOpcode::Cmp, a, b);
            let dst = self.emit_setcc(cond, 32);
            self.value_map.insert(inst, dst);
            return Ok(());
        }
        match op {
            Opcode::Mul => {
                let dst = self.asm.new_vreg();
                if let Some(c) = rhs.as_const() {
                    let a = self.read_operand(lhs)?;
                    self.asm.emit3(AsmOpcode::Imul, vreg(dst, width), a, imm(c));
                } else if let Some(c) = lhs.as_const() {
                    let b = self.read_operand(rhs)?;
                    self.asm.emit3(AsmOpcode::Imul, vreg(dst, width), b, imm(c));
                } else {
                    let a = self.read_operand(lhs)?;
                    let b = self.read_operand(rhs)?;
                    self.asm.emit2(AsmOpcode::Mov, vreg(dst, width), a);
                    self.asm.emit2(AsmOpcode::Imul, vreg(dst, width), b);
                }
                self.value_map.insert(inst, dst);
            }
            Opcode::Div => self.select_div(inst, lhs, rhs, width)?,
            Opcode::Add | Opcode::Sub | Opcode::BitXor | Opcode::BitAnd | Opcode::BitOr => {
                let opcode = match op {
                    Opcode::Add => AsmOpcode::Add,
                    Opcode::Sub => AsmOpcode::Sub,
                    Opcode::BitXor => AsmOpcode::Xor,
                    Opcode::BitAnd => AsmOpcode::And,
                    Opcode::BitOr => AsmOpcode::Or,
                    _ => unreachable!(),
                };
                let a = self.read_operand(lhs)?;
                let b = self.read_operand(rhs)?;
                let dst = self.asm.new_vreg();
                self.asm.emit2(AsmOpcode::Mov, vreg(dst, width), a);
                self.asm.emit2(opcode, vreg(dst, width), b);
                self.value_map.insert(inst, dst);
            }
            other => return Err(CodegenError::invariant(format!("{other:?} is not selectable as a binary op"))),
        }
        Ok(())
    }

    fn select_div(&mut self, inst: Inst, lhs: Value, rhs: Value, width: u32) -> CodegenResult<()> {
        let rax = self.asm.new_precolored_vreg(PhysicalRegister::Rax);
        let rdx = self.asm.new_precolored_vreg(PhysicalRegister::Rdx);
        self.materialize_into(lhs, RegRef::Virtual(rax), width)?;
        let cdq_idx = self.asm.emit0(AsmOpcode::Cdq);
        self.asm.add_extra_dep(cdq_idx, rax);
        self.asm.add_extra_dep(cdq_idx, rdx);
        // IDIV's divisor must be a register or memory operand, never an
        // immediate — force constants into a register first.
        let divisor = self.value_reg(rhs)?;
        let idiv_idx = self.asm.emit1(AsmOpcode::Idiv, vreg(divisor, width));
        self.asm.add_extra_dep(idiv_idx, rax);
        self.asm.add_extra_dep(idiv_idx, rdx);
        let dst = self.asm.new_vreg();
        self.asm.emit2(AsmOpcode::Mov, vreg(dst, width), vreg(rax, width));
        self.value_map.insert(inst, dst);
        Ok(())
    }

    fn select_unary(&mut self, inst: Inst, op: Opcode, value: Value) -> CodegenResult<()> {
        let width = width_of(&value.ty());
        match op {
            Opcode::BitNot => {
                let a = self.read_operand(value)?;
                let dst = self.asm.new_vreg();
                self.asm.emit2(AsmOpcode::Mov, vreg(dst, width), a);
                self.asm.emit1(AsmOpcode::Not, vreg(dst, width));
                self.value_map.insert(inst, dst);
            }
            Opcode::LogNot => {
                let a = self.read_operand(value)?;
                self.asm.emit2(AsmOpcode::Cmp, a, imm(0));
                let dst = self.emit_setcc(Condition::Eq, 32);
                self.value_map.insert(inst, dst);
            }
            other => return Err(CodegenError::invariant(format!("{other:?} is not selectable as a unary op"))),
        }
        Ok(())
    }

    fn select_call(&mut self, inst: Inst, callee: Value, args: Vec<Value>, ret_ty: &IrType) -> CodegenResult<()> {
        if args.len() > ARG_REGS.len() {
            return Err(CodegenError::exhausted(format!(
                "call with {} arguments exceeds the supported arity of {}",
                args.len(),
                ARG_REGS.len()
            )));
        }
        let mut arg_vregs = Vec::with_capacity(args.len());
        for (i, a) in args.into_iter().enumerate() {
            let width = width_of(&a.ty());
            let v = self.asm.new_precolored_vreg(ARG_REGS[i]);
            self.materialize_into(a, RegRef::Virtual(v), width)?;
            arg_vregs.push(v);
        }
        let callee_operand = match callee {
            Value::Global { global } => sym(global),
            other => {
                let r = self.value_reg(other)?;
                vreg(r, 64)
            }
        };
        let call_idx = self.asm.emit1(AsmOpcode::Call, callee_operand);
        for v in &arg_vregs {
            self.asm.add_extra_dep(call_idx, *v);
        }
        if !matches!(ret_ty, IrType::Void) {
            let width = width_of(ret_ty);
            let result = self.asm.new_precolored_vreg(PhysicalRegister::Rax);
            self.asm.add_extra_dep(call_idx, result);
            let dst = self.asm.new_vreg();
            self.asm.emit2(AsmOpcode::Mov, vreg(dst, width), vreg(result, width));
            self.value_map.insert(inst, dst);
        }
        Ok(())
    }

    fn emit_setcc(&mut self, cond: Condition, width: u32) -> VReg {
        let dst = self.asm.new_vreg();
        self.asm.emit1(AsmOpcode::SetCc(cond), vreg(dst, 8));
        self.asm.emit2(AsmOpcode::Movzx, vreg(dst, width), vreg(dst, 8));
        dst
    }
}

fn reg_operand(r: RegRef, width: u32) -> crate::asm::AsmOperand {
    match r {
        RegRef::Virtual(v) => vreg(v, width),
        RegRef::Physical(p) => phys(p, width),
    }
}

fn comparison_condition(op: Opcode) -> Condition {
    match op {
        Opcode::Eq => Condition::Eq,
        Opcode::Neq => Condition::Ne,
        Opcode::Gt => Condition::Gt,
        Opcode::Gte => Condition::Ge,
        Opcode::Lt => Condition::Lt,
        Opcode::Lte => Condition::Le,
        _ => unreachable!("comparison_condition called with non-comparison opcode {op:?}"),
    }
}

/// The register width an `IrType` occupies: integers use their own bit
/// width; pointers, function addresses, and aggregate-decayed
/// addresses (arrays/structs used as a value) are always 64-bit.
fn width_of(ty: &IrType) -> u32 {
    match ty {
        IrType::Int(w) => *w,
        IrType::Pointer | IrType::Function(_) | IrType::Struct(_) | IrType::Array(_, _) => 64,
        IrType::Void => 0,
    }
}
