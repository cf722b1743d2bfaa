//! Stack-frame layout for one function (§4.3 "`LOCAL`: increment
//! `local_stack_usage`... record (ir_id → offset)").
//!
//! Every `LOCAL` grows the frame downward from `RBP` by its type's
//! size, rounded up to the type's natural alignment first so each slot
//! starts correctly aligned. The map is keyed by the `LOCAL`
//! instruction's own [`Inst`] handle — that handle stands in for the
//! stack slot everywhere else in this crate (`FIELD`'s recursive
//! address folding, `LOAD`/`STORE`'s pointer operand).
//!
//! Offsets recorded here assume locals are the only thing below `RBP`.
//! They are not: the register allocator, which only runs after this
//! pass, may push callee-save registers immediately below `RBP` as
//! well. [`crate::regalloc::prologue`] shifts every local's offset down
//! by the final callee-save count once that count is known, so the
//! offsets this module hands out are provisional, not final.

use rustc_hash::FxHashMap;

use crate::ir::{Inst, IrType, TransUnit};

#[derive(Default)]
pub struct Frame {
    offsets: FxHashMap<Inst, i64>,
    usage: u64,
}

impl Frame {
    pub fn new() -> Frame {
        Frame::default()
    }

    /// Reserves a slot for `inst`'s `LOCAL` of type `ty`, returning its
    /// offset from `RBP` (always negative — the frame grows down).
    pub fn alloc(&mut self, inst: Inst, ty: &IrType, tu: &TransUnit) -> i64 {
        let size = tu.size_of(ty).max(1);
        let align = tu.align_of(ty).max(1);
        self.usage = align_up(self.usage, align) + size;
        let offset = -(self.usage as i64);
        self.offsets.insert(inst, offset);
        offset
    }

    pub fn offset_of(&self, inst: Inst) -> Option<i64> {
        self.offsets.get(&inst).copied()
    }

    /// Total bytes the prologue must reserve with `SUB RSP, n`, rounded
    /// up to 16 so the frame itself never misaligns `RSP` (the ABI's
    /// 16-byte-at-`CALL` requirement from `Design Notes` is otherwise
    /// the allocator's problem, not the frame's).
    pub fn total_usage(&self) -> u64 {
        align_up(self.usage, 16)
    }
}

fn align_up(offset: u64, align: u64) -> u64 {
    (offset + align - 1) / align * align
}
