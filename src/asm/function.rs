//! Per-function assembly state: the virtual register table and the
//! emitted instruction stream, split into prologue/body/epilogue
//! (§3 "Assembly IR", §4.4 "Prologue/epilogue").

use smallvec::SmallVec;

use crate::asm::instr::{AsmInstr, AsmOpcode};
use crate::asm::operand::AsmOperand;
use crate::asm::reg::PhysicalRegister;
use crate::asm::{Label, VReg};
use crate::entity::{EntityRef, PrimaryMap};

/// One virtual register's allocation record. An append-only table
/// (§4.3 "Virtual register table"): entries are never removed, only
/// filled in by the register allocator. A pre-colored vreg (a call
/// argument or result pinned to a specific physical register by
/// instruction selection) starts with `assigned_physical` already set
/// and the allocator must never reassign it.
#[derive(Clone, Copy, Debug, Default)]
pub struct VRegInfo {
    pub assigned_physical: Option<PhysicalRegister>,
    pub live_start: Option<usize>,
    pub live_end: Option<usize>,
}

impl VRegInfo {
    pub fn precolored(reg: PhysicalRegister) -> VRegInfo {
        VRegInfo { assigned_physical: Some(reg), live_start: None, live_end: None }
    }

    pub fn is_precolored(&self) -> bool {
        self.assigned_physical.is_some() && self.live_start.is_none() && self.live_end.is_none()
    }
}

/// The assembly-IR form of a single function: instruction selection
/// fills `body` (and pins `ret_label` to the epilogue's first
/// instruction); the register allocator fills `prologue`/`epilogue`
/// once it knows the callee-save set and frame size.
#[derive(Clone, Debug, Default)]
pub struct AsmFunction {
    pub prologue: Vec<AsmInstr>,
    pub body: Vec<AsmInstr>,
    pub epilogue: Vec<AsmInstr>,
    pub ret_label: Label,
    /// The label a `CALL` to this function targets — attached to the
    /// prologue's first instruction once the register allocator
    /// synthesizes it (§4.4 "The prologue's first instruction carries
    /// the function's entry label").
    pub entry_label: Label,
    /// Total bytes reserved by `LOCAL` instructions in this function
    /// (§4.3: computed over the *whole* body, not per reachable path).
    pub local_stack_usage: u64,
    vregs: PrimaryMap<VReg, VRegInfo>,
    next_label: u32,
}

impl AsmFunction {
    pub fn new() -> AsmFunction {
        let mut f = AsmFunction {
            prologue: Vec::new(),
            body: Vec::new(),
            epilogue: Vec::new(),
            ret_label: Label::new(0),
            local_stack_usage: 0,
            vregs: PrimaryMap::new(),
            next_label: 1,
        };
        f.ret_label = f.new_label();
        f
    }

    pub fn new_vreg(&mut self) -> VReg {
        self.vregs.push(VRegInfo::default())
    }

    pub fn new_precolored_vreg(&mut self, reg: PhysicalRegister) -> VReg {
        self.vregs.push(VRegInfo::precolored(reg))
    }

    pub fn new_label(&mut self) -> Label {
        let l = Label::new(self.next_label as usize);
        self.next_label += 1;
        l
    }

    pub fn vregs(&self) -> &PrimaryMap<VReg, VRegInfo> {
        &self.vregs
    }

    pub fn vreg_info(&self, v: VReg) -> &VRegInfo {
        &self.vregs[v]
    }

    pub fn vreg_info_mut(&mut self, v: VReg) -> &mut VRegInfo {
        &mut self.vregs[v]
    }

    fn push(&mut self, op: AsmOpcode, operands: SmallVec<[AsmOperand; 3]>) -> usize {
        self.body.push(AsmInstr { op, operands, label: None, extra_deps: SmallVec::new() });
        self.body.len() - 1
    }

    pub fn emit0(&mut self, op: AsmOpcode) -> usize {
        self.push(op, SmallVec::new())
    }

    pub fn emit1(&mut self, op: AsmOpcode, a: AsmOperand) -> usize {
        let mut ops = SmallVec::new();
        ops.push(a);
        self.push(op, ops)
    }

    pub fn emit2(&mut self, op: AsmOpcode, a: AsmOperand, b: AsmOperand) -> usize {
        let mut ops = SmallVec::new();
        ops.push(a);
        ops.push(b);
        self.push(op, ops)
    }

    pub fn emit3(&mut self, op: AsmOpcode, a: AsmOperand, b: AsmOperand, c: AsmOperand) -> usize {
        let mut ops = SmallVec::new();
        ops.push(a);
        ops.push(b);
        ops.push(c);
        self.push(op, ops)
    }

    pub fn attach_label(&mut self, index: usize, label: Label) {
        self.body[index].label = Some(label);
    }

    pub fn add_extra_dep(&mut self, index: usize, v: VReg) {
        self.body[index].extra_deps.push(v);
    }

    /// The full emission order a downstream pass walks over: prologue,
    /// then body, then epilogue.
    pub fn instructions(&self) -> impl Iterator<Item = &AsmInstr> {
        self.prologue.iter().chain(self.body.iter()).chain(self.epilogue.iter())
    }
}
