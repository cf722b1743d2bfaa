//! Integration tests for spec.md's seed end-to-end scenarios 2-6
//! (scenario 1, "return-constant", is covered in-crate by
//! `encoder::tests::return_constant_encodes_seed_scenario_bytes` since
//! it exercises the encoder's exact byte output). These build IR
//! directly through the public `Builder` API (no parser is in scope,
//! per §6) and drive it through the full pipeline via `compile`.

use naive_codegen::asm::dump_asm;
use naive_codegen::ir::{Builder, IrType};
use naive_codegen::isel::select_module;
use naive_codegen::regalloc::allocate_module;
use naive_codegen::symbol::{Linkage, Section};
use naive_codegen::{compile, Flags, TransUnit};

/// Scenario 2: `int f(int a, int b) { int c = a + b; return c; }`.
#[test]
fn local_and_add() {
    let _ = env_logger::try_init();
    let mut tu = TransUnit::new();
    let g = tu.add_function("f", IrType::I32, vec![IrType::I32, IrType::I32], Linkage::Global);
    tu.global_mut(g).defined = true;
    let mut b = Builder::new(&mut tu);
    b.set_current_function(g);
    let entry = b.create_block("entry");
    b.set_current_block(entry);
    let slot = b.build_local(IrType::I32);
    let a = b.value_arg(IrType::I32, 0);
    let bb = b.value_arg(IrType::I32, 1);
    b.build_store(slot, a, IrType::I32);
    let lhs = b.build_load(slot, IrType::I32);
    let sum = b.build_add(lhs, bb).unwrap();
    b.build_store(slot, sum, IrType::I32);
    let c = b.build_load(slot, IrType::I32);
    b.build_ret(c);

    let image = compile(&mut tu, &Flags::new()).unwrap();
    assert!(!image.text.is_empty());
    assert_eq!(image.symbol(tu.global(g).symbol.unwrap()).section, Section::Text);
}

/// Scenario 3: `int f(int x) { if (x == 0) return 1; else return 2; }`.
/// Four blocks: entry, then, else, after (the after block is
/// unreachable here since both arms return, but instruction selection
/// still lowers it the same as any other block).
#[test]
fn if_else_produces_cmp_and_jcc() {
    let _ = env_logger::try_init();
    let mut tu = TransUnit::new();
    let g = tu.add_function("f", IrType::I32, vec![IrType::I32], Linkage::Global);
    tu.global_mut(g).defined = true;
    let mut b = Builder::new(&mut tu);
    b.set_current_function(g);
    let entry = b.create_block("entry");
    let then_block = b.create_block("then");
    let else_block = b.create_block("else");
    let after = b.create_block("after");

    b.set_current_block(entry);
    let x = b.value_arg(IrType::I32, 0);
    let zero = b.value_const(IrType::I32, 0);
    let cond = b.build_eq(x, zero).unwrap();
    b.build_cond(cond, then_block, else_block);

    b.set_current_block(then_block);
    let one = b.value_const(IrType::I32, 1);
    b.build_ret(one);

    b.set_current_block(else_block);
    let two = b.value_const(IrType::I32, 2);
    b.build_ret(two);

    b.set_current_block(after);
    b.build_ret_void();

    let module = select_module(&tu).unwrap();
    let func = module.function(g).unwrap();
    let text = dump_asm(g, func);
    assert!(text.contains("cmp"));
    assert!(text.to_lowercase().contains("je") || text.to_lowercase().contains("jne"));
}

/// Scenario 4: `int f(int n) { int i=0; while (i != n) { if (i == 5)
/// break; i = i + 1; } return i; }`. Verifies `break` binds to the
/// loop's `after` block and the loop body branches back to the
/// pre-header, producing a backward jump target.
#[test]
fn while_loop_with_break_has_a_backward_branch() {
    let _ = env_logger::try_init();
    let mut tu = TransUnit::new();
    let g = tu.add_function("f", IrType::I32, vec![IrType::I32], Linkage::Global);
    tu.global_mut(g).defined = true;
    let mut b = Builder::new(&mut tu);
    b.set_current_function(g);

    let entry = b.create_block("entry");
    let pre_header = b.create_block("while.cond");
    let body = b.create_block("while.body");
    let break_check_then = b.create_block("if.then");
    let break_check_after = b.create_block("if.after");
    let after = b.create_block("while.after");

    b.set_current_block(entry);
    let slot = b.build_local(IrType::I32);
    let zero = b.value_const(IrType::I32, 0);
    b.build_store(slot, zero, IrType::I32);
    b.build_branch(pre_header);

    b.set_current_block(pre_header);
    let i = b.build_load(slot, IrType::I32);
    let n = b.value_arg(IrType::I32, 0);
    let cond = b.build_neq(i, n).unwrap();
    b.build_cond(cond, body, after);

    b.set_current_block(body);
    let i2 = b.build_load(slot, IrType::I32);
    let five = b.value_const(IrType::I32, 5);
    let is_five = b.build_eq(i2, five).unwrap();
    b.build_cond(is_five, break_check_then, break_check_after);

    b.set_current_block(break_check_then);
    b.build_branch(after);

    b.set_current_block(break_check_after);
    let i3 = b.build_load(slot, IrType::I32);
    let one = b.value_const(IrType::I32, 1);
    let next = b.build_add(i3, one).unwrap();
    b.build_store(slot, next, IrType::I32);
    b.build_branch(pre_header);

    b.set_current_block(after);
    let result = b.build_load(slot, IrType::I32);
    b.build_ret(result);

    let mut module = select_module(&tu).unwrap();
    allocate_module(&tu, &mut module).unwrap();
    let func = module.function(g).unwrap();
    // The branch back to the loop header must carry a label target
    // whose instruction precedes it in emission order (a backward jump).
    let label_positions: std::collections::HashMap<_, _> = func
        .instructions()
        .enumerate()
        .filter_map(|(idx, instr)| instr.label.map(|l| (l, idx)))
        .collect();
    let mut saw_backward_jmp = false;
    for (idx, instr) in func.instructions().enumerate() {
        if instr.op == naive_codegen::asm::AsmOpcode::Jmp {
            if let Some(naive_codegen::asm::AsmOperand::Label(target)) = instr.operands.first() {
                if let Some(&target_idx) = label_positions.get(target) {
                    if target_idx <= idx {
                        saw_backward_jmp = true;
                    }
                }
            }
        }
    }
    assert!(saw_backward_jmp, "expected a backward jmp to the loop header");
}

/// Scenario 5: `struct P { int x; int y; }; int f(struct P *p) {
/// return p->x + p->y; }`. Field offsets 0 and 4, struct size 8.
#[test]
fn struct_field_access_computes_offsets() {
    let _ = env_logger::try_init();
    let mut tu = TransUnit::new();
    let p_struct = tu.add_struct("P", 2);
    tu.set_struct_field(p_struct, 0, "x", IrType::I32);
    tu.set_struct_field(p_struct, 1, "y", IrType::I32);
    tu.finish_struct(p_struct);

    let g = tu.add_function("f", IrType::I32, vec![IrType::Pointer], Linkage::Global);
    tu.global_mut(g).defined = true;
    let mut b = Builder::new(&mut tu);
    b.set_current_function(g);
    let entry = b.create_block("entry");
    b.set_current_block(entry);
    let p = b.value_arg(IrType::Pointer, 0);
    let struct_ty = IrType::Struct(p_struct);
    let x_ptr = b.build_field(p, struct_ty.clone(), "x").unwrap();
    let y_ptr = b.build_field(p, struct_ty, "y").unwrap();
    let x = b.build_load(x_ptr, IrType::I32);
    let y = b.build_load(y_ptr, IrType::I32);
    let sum = b.build_add(x, y).unwrap();
    b.build_ret(sum);

    assert_eq!(tu.size_of(&IrType::Struct(p_struct)), 8);
    let mut module = select_module(&tu).unwrap();
    allocate_module(&tu, &mut module).unwrap();
    let func = module.function(g).unwrap();
    for instr in func.instructions() {
        for op in &instr.operands {
            assert!(op.vreg().is_none());
        }
    }
}

/// Scenario 6: `int g(int, int, int); int f(void) { return g(1, 2, 3); }`.
/// Three MOVs into the System V integer argument registers, a CALL to
/// `g` (an undefined global, so it surfaces as a relocation), and the
/// result read back from RAX.
#[test]
fn function_call_produces_a_relocation_for_the_callee() {
    let _ = env_logger::try_init();
    let mut tu = TransUnit::new();
    let callee = tu.add_function("g", IrType::I32, vec![IrType::I32; 3], Linkage::Global);
    let f = tu.add_function("f", IrType::I32, vec![], Linkage::Global);
    tu.global_mut(f).defined = true;
    let mut b = Builder::new(&mut tu);
    b.set_current_function(f);
    let entry = b.create_block("entry");
    b.set_current_block(entry);
    let callee_v = b.value_global(callee);
    let args = vec![
        b.value_const(IrType::I32, 1),
        b.value_const(IrType::I32, 2),
        b.value_const(IrType::I32, 3),
    ];
    let result = b.build_call(callee_v, IrType::I32, args).unwrap();
    b.build_ret(result);

    let image = compile(&mut tu, &Flags::new()).unwrap();
    assert_eq!(image.relocations().len(), 1);
    let reloc = &image.relocations()[0];
    assert_eq!(image.symbol(reloc.symbol).name, "g");
    assert_eq!(image.symbol(reloc.symbol).section, Section::Undef);
}
