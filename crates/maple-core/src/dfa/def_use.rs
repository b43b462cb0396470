//! Use collection for a single definition.

use crate::ast::{AstPool, AstVisitor, NodeId, NodeKind, TreeNode};
use crate::string_table::StrIdx;
use rustc_hash::FxHashSet;

/// Walks statements of one block on behalf of one tracked definition.
///
/// `reach_def` says the tracked definition has been seen (or reaches the
/// block entry); `reach_new_def` says another definition of the same name
/// has since overwritten it. An occurrence is a use of the tracked
/// definition while the first holds and the second does not.
pub(super) struct DefUseChainVisitor<'d> {
    pub def_node: NodeId,
    pub name: StrIdx,
    pub defs: &'d FxHashSet<NodeId>,
    pub def_uses: &'d FxHashSet<NodeId>,
    pub reach_def: bool,
    pub reach_new_def: bool,
    pub uses: &'d mut FxHashSet<NodeId>,
}

impl DefUseChainVisitor<'_> {
    pub fn is_live(&self) -> bool {
        self.reach_def && !self.reach_new_def
    }

    fn occurrence(&mut self, id: NodeId) {
        if id == self.def_node {
            // a def-use node reads the value that reached it, which may be
            // this same definition around a loop
            if self.def_uses.contains(&id) && self.is_live() {
                self.uses.insert(id);
            }
            self.reach_def = true;
            self.reach_new_def = false;
        } else if self.defs.contains(&id) {
            if self.def_uses.contains(&id) && self.is_live() {
                self.uses.insert(id);
            }
            self.reach_new_def = true;
        } else if self.is_live() {
            self.uses.insert(id);
        }
    }
}

impl<'a> AstVisitor<'a> for DefUseChainVisitor<'_> {
    fn visit_identifier(&mut self, _pool: &'a AstPool, node: &'a TreeNode) {
        if node.str_idx() == self.name {
            self.occurrence(node.id());
        }
    }

    /// The declared variable itself is never a use; only the declaration
    /// node can act as a definition.
    fn visit_decl(&mut self, pool: &'a AstPool, node: &'a TreeNode) {
        if let NodeKind::Decl {
            init: Some(init), ..
        } = *node.kind()
        {
            self.visit_node(pool, init);
            if node.str_idx() == self.name {
                self.occurrence(node.id());
            }
        }
    }

    fn visit_function(&mut self, _pool: &'a AstPool, _node: &'a TreeNode) {}
}
