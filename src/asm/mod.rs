//! The machine-independent-in-spirit, x86-64-specific-in-practice
//! assembly IR instruction selection targets (§3 "Assembly IR", §4.3).
//!
//! A [`VReg`] is an unbounded virtual register, resolved to a
//! [`reg::PhysicalRegister`] by [`crate::regalloc`]; a [`Label`] names
//! a jump target within one function. Both are per-[`function::AsmFunction`]
//! namespaces, the same way [`crate::ir::Block`]/[`crate::ir::Inst`]
//! are per-[`crate::ir::Function`].

use crate::entity::entity_impl;

pub mod dump;
pub mod function;
pub mod instr;
pub mod module;
pub mod operand;
pub mod reg;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct VReg(u32);
entity_impl!(VReg, "v");

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Label(u32);
entity_impl!(Label, "L");

pub use dump::{dump_asm, dump_live_ranges};
pub use function::{AsmFunction, VRegInfo};
pub use instr::{AsmInstr, AsmOpcode, Condition};
pub use module::AsmModule;
pub use operand::{deref, global_mem, imm, label, offset_reg, phys, sym, vreg, AsmOperand, RegRef};
pub use reg::PhysicalRegister;
