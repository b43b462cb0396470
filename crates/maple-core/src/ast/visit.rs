//! Depth-first AST visitor.
//!
//! Each `visit_*` method defaults to the matching `walk_*` function, so an
//! implementation overrides only the node kinds it cares about and calls the
//! walker itself when it still wants the children visited.

use super::{AstPool, NodeId, NodeKind, TreeNode};

pub trait AstVisitor<'ast>: Sized {
    fn visit_node(&mut self, pool: &'ast AstPool, id: NodeId) {
        walk_node(self, pool, id)
    }

    fn visit_function(&mut self, pool: &'ast AstPool, node: &'ast TreeNode) {
        walk_function(self, pool, node)
    }

    fn visit_identifier(&mut self, _pool: &'ast AstPool, _node: &'ast TreeNode) {}

    fn visit_literal(&mut self, _pool: &'ast AstPool, _node: &'ast TreeNode) {}

    fn visit_decl(&mut self, pool: &'ast AstPool, node: &'ast TreeNode) {
        walk_decl(self, pool, node)
    }

    fn visit_bin_operator(&mut self, pool: &'ast AstPool, node: &'ast TreeNode) {
        walk_bin_operator(self, pool, node)
    }

    fn visit_una_operator(&mut self, pool: &'ast AstPool, node: &'ast TreeNode) {
        walk_una_operator(self, pool, node)
    }

    fn visit_field(&mut self, pool: &'ast AstPool, node: &'ast TreeNode) {
        walk_field(self, pool, node)
    }

    fn visit_call(&mut self, pool: &'ast AstPool, node: &'ast TreeNode) {
        walk_call(self, pool, node)
    }
}

pub fn walk_node<'a>(visitor: &mut impl AstVisitor<'a>, pool: &'a AstPool, id: NodeId) {
    let node = pool.node(id);
    match &node.kind {
        NodeKind::Module { body } => {
            for &stmt in body {
                visitor.visit_node(pool, stmt);
            }
        }
        NodeKind::Function { .. } => visitor.visit_function(pool, node),
        NodeKind::Block { stmts } => {
            for &stmt in stmts {
                visitor.visit_node(pool, stmt);
            }
        }
        NodeKind::Identifier => visitor.visit_identifier(pool, node),
        NodeKind::Literal(_) => visitor.visit_literal(pool, node),
        NodeKind::Decl { .. } => visitor.visit_decl(pool, node),
        NodeKind::BinOperator { .. } => visitor.visit_bin_operator(pool, node),
        NodeKind::UnaOperator { .. } => visitor.visit_una_operator(pool, node),
        NodeKind::Field { .. } => visitor.visit_field(pool, node),
        NodeKind::Call { .. } => visitor.visit_call(pool, node),
        NodeKind::Return { result } => {
            if let Some(result) = *result {
                visitor.visit_node(pool, result);
            }
        }
        NodeKind::CondBranch {
            cond,
            true_branch,
            false_branch,
        } => {
            visitor.visit_node(pool, *cond);
            visitor.visit_node(pool, *true_branch);
            if let Some(false_branch) = *false_branch {
                visitor.visit_node(pool, false_branch);
            }
        }
        NodeKind::WhileLoop { cond, body } => {
            visitor.visit_node(pool, *cond);
            visitor.visit_node(pool, *body);
        }
        NodeKind::Break | NodeKind::Continue => {}
    }
}

pub fn walk_function<'a>(visitor: &mut impl AstVisitor<'a>, pool: &'a AstPool, node: &'a TreeNode) {
    if let NodeKind::Function { params, body } = &node.kind {
        for &param in params {
            visitor.visit_node(pool, param);
        }
        visitor.visit_node(pool, *body);
    }
}

/// Initializer first, then the declared variable.
pub fn walk_decl<'a>(visitor: &mut impl AstVisitor<'a>, pool: &'a AstPool, node: &'a TreeNode) {
    if let NodeKind::Decl { var, init } = node.kind {
        if let Some(init) = init {
            visitor.visit_node(pool, init);
        }
        visitor.visit_node(pool, var);
    }
}

/// Assignments visit the right operand before the left, matching evaluation
/// order; all other operators go left to right.
pub fn walk_bin_operator<'a>(
    visitor: &mut impl AstVisitor<'a>,
    pool: &'a AstPool,
    node: &'a TreeNode,
) {
    if let NodeKind::BinOperator { op, a, b } = node.kind {
        if op.is_assign() {
            visitor.visit_node(pool, b);
            visitor.visit_node(pool, a);
        } else {
            visitor.visit_node(pool, a);
            visitor.visit_node(pool, b);
        }
    }
}

pub fn walk_una_operator<'a>(
    visitor: &mut impl AstVisitor<'a>,
    pool: &'a AstPool,
    node: &'a TreeNode,
) {
    if let NodeKind::UnaOperator { opnd, .. } = node.kind {
        visitor.visit_node(pool, opnd);
    }
}

/// Only the base is visited; the member name is not a variable reference.
pub fn walk_field<'a>(visitor: &mut impl AstVisitor<'a>, pool: &'a AstPool, node: &'a TreeNode) {
    if let NodeKind::Field { upper, .. } = node.kind {
        visitor.visit_node(pool, upper);
    }
}

/// Visits the base and then the member name identifier.
pub fn walk_field_member<'a>(
    visitor: &mut impl AstVisitor<'a>,
    pool: &'a AstPool,
    node: &'a TreeNode,
) {
    if let NodeKind::Field { upper, field } = node.kind {
        visitor.visit_node(pool, upper);
        visitor.visit_node(pool, field);
    }
}

pub fn walk_call<'a>(visitor: &mut impl AstVisitor<'a>, pool: &'a AstPool, node: &'a TreeNode) {
    if let NodeKind::Call { method, args } = &node.kind {
        visitor.visit_node(pool, *method);
        for &arg in args {
            visitor.visit_node(pool, arg);
        }
    }
}
