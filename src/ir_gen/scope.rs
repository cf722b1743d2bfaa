//! The value environment: a scope chain from name to `(CType, Value)`
//! (§4.2 "Value environment (scope chain)"). Entering a compound
//! statement or a `for`-init pushes a scope; leaving it pops.

use rustc_hash::FxHashMap;

use crate::ir::Value;
use crate::ir_gen::ctype::CType;

pub struct ValueScope {
    scopes: Vec<FxHashMap<String, (CType, Value)>>,
}

impl ValueScope {
    pub fn new() -> ValueScope {
        ValueScope {
            scopes: vec![FxHashMap::default()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty(), "popped the outermost value scope");
    }

    pub fn declare(&mut self, name: &str, ty: CType, value: Value) {
        self.scopes
            .last_mut()
            .unwrap()
            .insert(name.to_string(), (ty, value));
    }

    pub fn lookup(&self, name: &str) -> Option<(CType, Value)> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get(name))
            .cloned()
    }
}

impl Default for ValueScope {
    fn default() -> Self {
        Self::new()
    }
}

/// The innermost enclosing loop's `break`/`continue` targets, tracked
/// as a stack so nested loops each see their own (§4.2 "break").
#[derive(Default)]
pub struct LoopStack {
    loops: Vec<LoopTargets>,
}

#[derive(Clone, Copy)]
pub struct LoopTargets {
    pub break_target: crate::ir::Block,
    pub continue_target: crate::ir::Block,
}

impl LoopStack {
    pub fn push(&mut self, targets: LoopTargets) {
        self.loops.push(targets);
    }

    pub fn pop(&mut self) {
        self.loops.pop();
    }

    pub fn current(&self) -> Option<LoopTargets> {
        self.loops.last().copied()
    }
}
