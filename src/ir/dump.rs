//! Deterministic textual form of a translation unit (§4.1 `dump_trans_unit`,
//! §6 "Pretty-printers", §8 "Round-trip"). Used for golden-file tests;
//! stable across re-runs of the same `TransUnit` by construction, since
//! it only ever walks the `PrimaryMap`s in insertion order.

use std::fmt::Write as _;

use crate::ir::entities::Global;
use crate::ir::global::{Initializer, TransUnit};
use crate::ir::instructions::InstData;
use crate::ir::value::Value;

pub fn dump_trans_unit(tu: &TransUnit) -> String {
    let mut out = String::new();
    for (global, _) in tu.globals() {
        dump_global(tu, global, &mut out);
    }
    out
}

fn dump_global(tu: &TransUnit, global: Global, out: &mut String) {
    let data = tu.global(global);
    let linkage = match data.linkage {
        crate::symbol::Linkage::Global => "global",
        crate::symbol::Linkage::Local => "local",
    };
    match &data.init {
        Initializer::Function(func) => {
            let params = func
                .param_types
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                out,
                "{} function {}({}) -> {} {{",
                linkage, data.name, params, func.return_type
            );
            for block in func.blocks() {
                let _ = writeln!(out, "  {}:", func.block_name(block));
                for inst in func.block_insts(block) {
                    let rec = func.inst(*inst);
                    let _ = write!(out, "    ");
                    if rec.ty != crate::ir::types::IrType::Void {
                        let _ = write!(out, "%{} = ", func.local_id(*inst));
                    }
                    let _ = writeln!(out, "{}", dump_inst(&rec.data, func));
                }
            }
            let _ = writeln!(out, "}}");
        }
        Initializer::Constant(c) => {
            let _ = writeln!(out, "{} var {}: {} = {}", linkage, data.name, data.ty, c);
        }
        Initializer::None => {
            let _ = writeln!(out, "{} var {}: {} (undefined)", linkage, data.name, data.ty);
        }
    }
}

fn dump_inst(data: &InstData, func: &crate::ir::function::Function) -> String {
    match data {
        InstData::Local { ty } => format!("local {ty}"),
        InstData::Field { base, struct_ty, field_index } => {
            format!("field {}, {struct_ty}, #{field_index}", dump_value(base, func))
        }
        InstData::Load { ptr, ty } => format!("load {}, {ty}", dump_value(ptr, func)),
        InstData::Store { ptr, value, ty } => {
            format!("store {}, {}, {ty}", dump_value(ptr, func), dump_value(value, func))
        }
        InstData::Cast { value, to } => format!("cast {}, {to}", dump_value(value, func)),
        InstData::Zext { value, to } => format!("zext {}, {to}", dump_value(value, func)),
        InstData::Sext { value, to } => format!("sext {}, {to}", dump_value(value, func)),
        InstData::Branch { target } => format!("branch {}", func.block_name(*target)),
        InstData::Cond { cond, then_block, else_block } => format!(
            "cond {}, {}, {}",
            dump_value(cond, func),
            func.block_name(*then_block),
            func.block_name(*else_block)
        ),
        InstData::Ret { value } => format!("ret {}", dump_value(value, func)),
        InstData::RetVoid => "ret_void".to_string(),
        InstData::Call { callee, args, ret_ty } => {
            let args = args
                .iter()
                .map(|a| dump_value(a, func))
                .collect::<Vec<_>>()
                .join(", ");
            format!("call {}({}) -> {ret_ty}", dump_value(callee, func), args)
        }
        InstData::Binary { op, lhs, rhs } => {
            format!("{} {}, {}", op.mnemonic(), dump_value(lhs, func), dump_value(rhs, func))
        }
        InstData::Unary { op, value } => format!("{} {}", op.mnemonic(), dump_value(value, func)),
    }
}

fn dump_value(value: &Value, func: &crate::ir::function::Function) -> String {
    match value {
        Value::Const { ty, bits } => format!("{bits}:{ty}"),
        Value::Arg { ty, index } => format!("arg{index}:{ty}"),
        Value::Inst { inst, .. } => format!("%{}", func.local_id(*inst)),
        Value::Global { global } => format!("@{global}"),
    }
}
