//! Basic blocks and functions (§3 "IR blocks and functions").

use crate::entity::PrimaryMap;
use crate::ir::entities::{Block, Inst};
use crate::ir::instructions::InstData;
use crate::ir::types::IrType;

/// A basic block: a name and an ordered sequence of instructions.
#[derive(Clone, Debug, Default)]
pub struct BlockData {
    pub name: String,
    pub insts: Vec<Inst>,
}

/// The record stored for each instruction: its result type, its
/// opcode-specific payload, and the block that owns it (so dump and
/// the verifier can recover "id within its block" without a second
/// lookup structure).
#[derive(Clone, Debug)]
pub struct InstRecord {
    pub ty: IrType,
    pub data: InstData,
    pub block: Block,
}

/// A function body: an ordered list of blocks (the first is the
/// entry), plus the signature needed by callers (instruction selection
/// in particular needs `param_types`/`return_type` without having to
/// chase back to the owning `Global`).
#[derive(Clone, Debug)]
pub struct Function {
    pub param_types: Vec<IrType>,
    pub return_type: IrType,
    blocks: PrimaryMap<Block, BlockData>,
    block_order: Vec<Block>,
    insts: PrimaryMap<Inst, InstRecord>,
}

impl Function {
    pub fn new(param_types: Vec<IrType>, return_type: IrType) -> Function {
        Function {
            param_types,
            return_type,
            blocks: PrimaryMap::new(),
            block_order: Vec::new(),
            insts: PrimaryMap::new(),
        }
    }

    pub fn arity(&self) -> u32 {
        self.param_types.len() as u32
    }

    pub fn entry_block(&self) -> Block {
        self.block_order[0]
    }

    pub fn create_block(&mut self, name: impl Into<String>) -> Block {
        let block = self.blocks.push(BlockData {
            name: name.into(),
            insts: Vec::new(),
        });
        self.block_order.push(block);
        block
    }

    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.block_order.iter().copied()
    }

    pub fn block(&self, block: Block) -> &BlockData {
        &self.blocks[block]
    }

    pub fn block_name(&self, block: Block) -> &str {
        &self.blocks[block].name
    }

    pub fn block_insts(&self, block: Block) -> &[Inst] {
        &self.blocks[block].insts
    }

    pub fn push_inst(&mut self, block: Block, ty: IrType, data: InstData) -> Inst {
        let inst = self.insts.push(InstRecord { ty, data, block });
        self.blocks[block].insts.push(inst);
        inst
    }

    pub fn inst(&self, inst: Inst) -> &InstRecord {
        &self.insts[inst]
    }

    pub fn inst_type(&self, inst: Inst) -> IrType {
        self.insts[inst].ty.clone()
    }

    /// Position of `inst` within its own block's instruction list: the
    /// "id within its block" the specification describes.
    pub fn local_id(&self, inst: Inst) -> usize {
        let block = self.insts[inst].block;
        self.blocks[block]
            .insts
            .iter()
            .position(|i| *i == inst)
            .expect("instruction missing from its own owning block")
    }

    /// True if `block` ends with exactly one terminator and no
    /// non-terminator instruction follows it — the invariant checked
    /// by the verifier (§8).
    pub fn block_is_terminated(&self, block: Block) -> bool {
        match self.blocks[block].insts.last() {
            Some(last) => self.insts[*last].data.opcode().is_terminator(),
            None => false,
        }
    }
}
