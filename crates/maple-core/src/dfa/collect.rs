//! Per-statement information gathering.

use crate::ast::visit::walk_field_member;
use crate::ast::{AstPool, AstVisitor, NodeId, NodeKind, TreeNode};
use crate::string_table::StrIdx;
use rustc_hash::FxHashMap;

/// Maps every identifier under a statement to that statement.
pub(super) struct CollectInfoVisitor<'m> {
    pub stmt: NodeId,
    pub node_to_stmt: &'m mut FxHashMap<NodeId, NodeId>,
}

impl<'a> AstVisitor<'a> for CollectInfoVisitor<'_> {
    fn visit_identifier(&mut self, _pool: &'a AstPool, node: &'a TreeNode) {
        self.node_to_stmt.insert(node.id(), self.stmt);
    }

    fn visit_field(&mut self, pool: &'a AstPool, node: &'a TreeNode) {
        walk_field_member(self, pool, node);
    }

    fn visit_function(&mut self, _pool: &'a AstPool, _node: &'a TreeNode) {}
}

/// A statement that defines a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DefSite {
    pub name: StrIdx,
    pub node: NodeId,
    /// Reads the previous value as well (compound assignment, `++`, `--`).
    pub is_def_use: bool,
}

/// Classifies `stmt` as a definition site.
///
/// Initialized declarations, assignments to an identifier or field, and
/// increments/decrements qualify. A declaration without an initializer does
/// not.
pub(super) fn def_site(pool: &AstPool, stmt: NodeId) -> Option<DefSite> {
    let node = pool.node(stmt);
    match *node.kind() {
        NodeKind::Decl { init: Some(_), .. } => Some(DefSite {
            name: node.str_idx(),
            node: stmt,
            is_def_use: false,
        }),
        NodeKind::BinOperator { op, a, .. } if op.is_assign() => {
            let target = pool.base_identifier(a)?;
            Some(DefSite {
                name: pool.node(target).str_idx(),
                node: target,
                is_def_use: op.is_compound_assign(),
            })
        }
        NodeKind::UnaOperator { op, opnd, .. } if op.is_inc_dec() => {
            let target = pool.base_identifier(opnd)?;
            Some(DefSite {
                name: pool.node(target).str_idx(),
                node: target,
                is_def_use: true,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, OprId};
    use crate::string_table::StringTable;

    #[test]
    fn test_decl_without_init_is_not_a_def() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let bare = b.decl("x", None);
        let one = b.int(1);
        let init = b.decl("x", Some(one));
        let pool = b.finish();

        assert_eq!(def_site(&pool, bare), None);
        let site = def_site(&pool, init).unwrap();
        assert_eq!(site.node, init);
        assert!(!site.is_def_use);
    }

    #[test]
    fn test_assignment_defines_base_identifier() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let obj = b.ident("obj");
        let f = b.field(obj, "f");
        let v = b.int(3);
        let assign = b.assign(f, v);
        let x = b.ident("x");
        let one = b.int(1);
        let add = b.binary(OprId::AddAssign, x, one);
        let y = b.ident("y");
        let dec = b.dec(y, false);
        let z = b.ident("z");
        let two = b.int(2);
        let sum = b.binary(OprId::Add, z, two);
        let pool = b.finish();

        let site = def_site(&pool, assign).unwrap();
        assert_eq!(site.node, obj);
        assert!(!site.is_def_use);
        assert_eq!(def_site(&pool, add).map(|s| (s.node, s.is_def_use)), Some((x, true)));
        assert_eq!(def_site(&pool, dec).map(|s| (s.node, s.is_def_use)), Some((y, true)));
        assert_eq!(def_site(&pool, sum), None);
    }

    #[test]
    fn test_collect_maps_identifiers_to_statement() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let obj = b.ident("obj");
        let f = b.field(obj, "len");
        let x = b.ident("x");
        let stmt = b.assign(x, f);
        let pool = b.finish();

        let mut map = FxHashMap::default();
        CollectInfoVisitor {
            stmt,
            node_to_stmt: &mut map,
        }
        .visit_node(&pool, stmt);

        assert_eq!(map.get(&obj), Some(&stmt));
        assert_eq!(map.get(&x), Some(&stmt));
        assert_eq!(map.len(), 3, "member name identifiers resolve too");
    }
}
