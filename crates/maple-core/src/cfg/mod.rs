//! Control-flow graph over AST statements.
//!
//! Blocks hold statement node ids (not nodes), so a [`CfgModule`] is tied to
//! the [`crate::ast::AstPool`] it was built from only by id. Block ids are
//! dense per module and double as indices into [`CfgModule::blocks`].

pub mod builder;

pub use builder::CfgBuilder;

use crate::ast::NodeId;
use crate::error::CfgError;
use bitflags::bitflags;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a basic block within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BbId(pub u32);

impl BbId {
    /// Position in [`CfgModule::blocks`].
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Index of a function in [`CfgModule::functions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

impl FuncId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What shape of control flow a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BbKind {
    /// Not yet classified.
    #[default]
    Unknown,
    /// Falls through to a single successor (function entry and exit, straight-line code).
    Uncond,
    /// Plain statements: a function body, a branch arm or a loop body.
    Block,
    /// Holds an `if` condition; two successors (then, else).
    Branch,
    /// Holds a loop condition; successors are the body and the loop exit.
    LoopHeader,
    /// Holds a switch discriminant.
    Switch,
    /// One arm of a switch.
    Case,
    /// Guarded region of a try statement.
    Try,
    /// Handler of a try statement.
    Catch,
    /// Cleanup region of a try statement.
    Finally,
    /// Resumption point after a yield.
    Yield,
    /// Follows a return/break/continue; swallows statements and edges.
    Terminated,
    /// Where control merges again, after a branch or a loop.
    Join,
    /// Second merge point for constructs that need two.
    Join2,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Facts about a block recorded while the graph is built.
    pub struct BbAttrs: u32 {
        /// Function entry.
        const ENTRY = 1 << 0;
        /// Function exit.
        const EXIT = 1 << 1;
        /// Ends in a `break`.
        const BREAK = 1 << 2;
        /// Ends in a `return`.
        const RETURN = 1 << 3;
        /// Ends in a `throw`.
        const THROW = 1 << 4;
        /// Ends in a `continue`.
        const CONT = 1 << 5;
        /// Inside the body of some loop.
        const IN_LOOP = 1 << 6;
        /// Contains at least one call expression.
        const HAS_CALL = 1 << 7;
    }
}

/// A basic block: statements executed in order, entered at the top.
#[derive(Debug, Clone)]
pub struct CfgBB {
    /// This block's unique identifier.
    pub id: BbId,
    /// The control-flow construct this block belongs to.
    pub kind: BbKind,
    pub attrs: BbAttrs,
    /// Condition expression of a branch or loop header.
    pub predicate: Option<NodeId>,
    /// The statement this block was created for (the `if` or `while` node).
    pub aux_node: Option<NodeId>,
    stmts: Vec<NodeId>,
    succs: Vec<BbId>,
    preds: Vec<BbId>,
}

impl CfgBB {
    fn new(id: BbId, kind: BbKind) -> Self {
        Self {
            id,
            kind,
            attrs: BbAttrs::empty(),
            predicate: None,
            aux_node: None,
            stmts: Vec::new(),
            succs: Vec::new(),
            preds: Vec::new(),
        }
    }

    /// Statement node ids in execution order.
    pub fn statements(&self) -> &[NodeId] {
        &self.stmts
    }

    /// Successors in insertion order; a branch lists its true target first.
    pub fn successors(&self) -> &[BbId] {
        &self.succs
    }

    pub fn predecessors(&self) -> &[BbId] {
        &self.preds
    }

    pub fn is_terminated(&self) -> bool {
        self.kind == BbKind::Terminated
    }
}

/// A function (or the module's top-level code) and the blocks it owns.
#[derive(Debug, Clone)]
pub struct CfgFunc {
    /// Position in [`CfgModule::functions`].
    pub id: FuncId,
    /// The `Function` node, or the `Module` node for top-level code.
    pub func_node: NodeId,
    /// Control flow begins here; parameters are defined here.
    pub entry: BbId,
    /// Every return and the final fall-through lead here.
    pub exit: BbId,
    /// Enclosing function; `None` for top-level code.
    pub parent: Option<FuncId>,
    blocks: Vec<BbId>,
    nested: Vec<FuncId>,
}

impl CfgFunc {
    /// Blocks in creation order; the entry block comes first.
    pub fn blocks(&self) -> &[BbId] {
        &self.blocks
    }

    /// Functions declared directly inside this one.
    pub fn nested_functions(&self) -> &[FuncId] {
        &self.nested
    }
}

/// All blocks and functions of one module.
#[derive(Debug, Clone, Default)]
pub struct CfgModule {
    blocks: Vec<CfgBB>,
    functions: Vec<CfgFunc>,
}

impl CfgModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a function with fresh entry and exit blocks.
    pub fn new_function(&mut self, func_node: NodeId, parent: Option<FuncId>) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        let entry = self.alloc_block(BbKind::Uncond);
        let exit = self.alloc_block(BbKind::Uncond);
        self.blocks[entry.index()].attrs |= BbAttrs::ENTRY;
        self.blocks[exit.index()].attrs |= BbAttrs::EXIT;
        self.functions.push(CfgFunc {
            id,
            func_node,
            entry,
            exit,
            parent,
            blocks: vec![entry, exit],
            nested: Vec::new(),
        });
        if let Some(parent) = parent {
            self.func_mut(parent).nested.push(id);
        }
        id
    }

    /// Creates a block owned by `func`.
    pub fn new_block(&mut self, func: FuncId, kind: BbKind) -> BbId {
        let id = self.alloc_block(kind);
        self.func_mut(func).blocks.push(id);
        id
    }

    fn alloc_block(&mut self, kind: BbKind) -> BbId {
        let id = BbId(self.blocks.len() as u32);
        self.blocks.push(CfgBB::new(id, kind));
        id
    }

    /// Appends a statement; terminated blocks drop it.
    pub fn add_statement(&mut self, bb: BbId, stmt: NodeId) {
        let block = self.bb_mut(bb);
        if !block.is_terminated() {
            block.stmts.push(stmt);
        }
    }

    /// Adds the edge `from -> to` once; terminated blocks get no successors.
    pub fn add_edge(&mut self, from: BbId, to: BbId) {
        if self.bb(from).is_terminated() || self.bb(from).succs.contains(&to) {
            return;
        }
        // bad `to` ids panic before anything is mutated
        let _ = self.bb(to);
        self.bb_mut(from).succs.push(to);
        self.bb_mut(to).preds.push(from);
    }

    /// # Panics
    /// Panics if `id` is not a block of this module.
    pub fn bb(&self, id: BbId) -> &CfgBB {
        match self.blocks.get(id.index()) {
            Some(bb) => bb,
            None => panic!("{} is not a block of this module ({} blocks)", id, self.blocks.len()),
        }
    }

    pub fn bb_mut(&mut self, id: BbId) -> &mut CfgBB {
        let len = self.blocks.len();
        match self.blocks.get_mut(id.index()) {
            Some(bb) => bb,
            None => panic!("{} is not a block of this module ({} blocks)", id, len),
        }
    }

    /// # Panics
    /// Panics if `id` is not a function of this module.
    pub fn func(&self, id: FuncId) -> &CfgFunc {
        &self.functions[id.index()]
    }

    fn func_mut(&mut self, id: FuncId) -> &mut CfgFunc {
        &mut self.functions[id.index()]
    }

    /// Every block of the module, indexed by [`BbId::index`].
    pub fn blocks(&self) -> &[CfgBB] {
        &self.blocks
    }

    /// Functions in creation order; top-level code is first.
    pub fn functions(&self) -> &[CfgFunc] {
        &self.functions
    }

    /// The function whose `func_node` is `node`.
    pub fn function_for_node(&self, node: NodeId) -> Option<&CfgFunc> {
        self.functions.iter().find(|f| f.func_node == node)
    }

    /// Blocks of `func` reachable from its entry, in reverse postorder.
    pub fn reverse_postorder(&self, func: FuncId) -> Vec<BbId> {
        let mut visited = vec![false; self.blocks.len()];
        let mut postorder = Vec::new();
        // (block, next successor to look at)
        let mut stack = vec![(self.func(func).entry, 0usize)];
        visited[self.func(func).entry.index()] = true;
        while let Some((bb, next)) = stack.pop() {
            let succs = self.bb(bb).successors();
            if next < succs.len() {
                stack.push((bb, next + 1));
                let succ = succs[next];
                if !visited[succ.index()] {
                    visited[succ.index()] = true;
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(bb);
            }
        }
        postorder.reverse();
        postorder
    }

    /// Checks the structural invariants the dataflow engine relies on.
    pub fn validate(&self) -> Result<(), CfgError> {
        let exists = |id: BbId| id.index() < self.blocks.len();

        for func in &self.functions {
            if !exists(func.entry) {
                return Err(CfgError::MissingEntry {
                    func: func.func_node,
                });
            }
        }

        let mut owner: FxHashMap<NodeId, BbId> = FxHashMap::default();
        for bb in &self.blocks {
            for &succ in &bb.succs {
                if !exists(succ) {
                    return Err(CfgError::DanglingEdge {
                        from: bb.id,
                        to: succ,
                    });
                }
                if !self.blocks[succ.index()].preds.contains(&bb.id) {
                    return Err(CfgError::AsymmetricEdge {
                        from: bb.id,
                        to: succ,
                    });
                }
            }
            for &pred in &bb.preds {
                if !exists(pred) {
                    return Err(CfgError::DanglingEdge {
                        from: pred,
                        to: bb.id,
                    });
                }
                if !self.blocks[pred.index()].succs.contains(&bb.id) {
                    return Err(CfgError::AsymmetricEdge {
                        from: pred,
                        to: bb.id,
                    });
                }
            }
            for &stmt in &bb.stmts {
                if let Some(&first) = owner.get(&stmt) {
                    return Err(CfgError::DuplicateStatement {
                        stmt,
                        first,
                        second: bb.id,
                    });
                }
                owner.insert(stmt, bb.id);
            }
        }
        Ok(())
    }

    /// Test-only hook for building malformed graphs.
    #[cfg(test)]
    pub(crate) fn push_raw_successor(&mut self, from: BbId, to: BbId) {
        self.bb_mut(from).succs.push(to);
    }
}

impl fmt::Display for CfgModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for func in &self.functions {
            writeln!(f, "func node {} entry {} exit {}", func.func_node, func.entry, func.exit)?;
            for &id in &func.blocks {
                let bb = self.bb(id);
                let stmts: Vec<String> = bb.stmts.iter().map(|s| s.to_string()).collect();
                let succs: Vec<String> = bb.succs.iter().map(|s| s.to_string()).collect();
                writeln!(
                    f,
                    "  {} {:?} stmts [{}] succs [{}]",
                    id,
                    bb.kind,
                    stmts.join(", "),
                    succs.join(", ")
                )?;
            }
        }
        Ok(())
    }
}
