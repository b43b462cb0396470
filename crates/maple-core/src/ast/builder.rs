//! Programmatic AST construction.

use super::{AstPool, LitData, NodeId, NodeKind, OprId};
use crate::string_table::{StrIdx, StringTable};

/// Builds nodes into an [`AstPool`], interning names as it goes.
///
/// Children must be built before their parents, so ids grow bottom-up.
pub struct AstBuilder<'s> {
    pool: AstPool,
    strings: &'s StringTable,
}

impl<'s> AstBuilder<'s> {
    pub fn new(strings: &'s StringTable) -> Self {
        Self {
            pool: AstPool::new(),
            strings,
        }
    }

    /// Continues building into an existing pool.
    pub fn with_pool(pool: AstPool, strings: &'s StringTable) -> Self {
        Self { pool, strings }
    }

    pub fn strings(&self) -> &'s StringTable {
        self.strings
    }

    pub fn pool(&self) -> &AstPool {
        &self.pool
    }

    pub fn finish(self) -> AstPool {
        self.pool
    }

    fn intern(&self, name: &str) -> StrIdx {
        self.strings.get_or_create_str_idx(name)
    }

    pub fn ident(&mut self, name: &str) -> NodeId {
        let idx = self.intern(name);
        self.pool.push(idx, NodeKind::Identifier)
    }

    pub fn int(&mut self, value: i64) -> NodeId {
        self.pool
            .push(StrIdx::EMPTY, NodeKind::Literal(LitData::Int(value)))
    }

    pub fn float(&mut self, value: f64) -> NodeId {
        self.pool
            .push(StrIdx::EMPTY, NodeKind::Literal(LitData::Float(value)))
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.pool
            .push(StrIdx::EMPTY, NodeKind::Literal(LitData::Bool(value)))
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        let idx = self.intern(value);
        self.pool
            .push(StrIdx::EMPTY, NodeKind::Literal(LitData::Str(idx)))
    }

    pub fn null(&mut self) -> NodeId {
        self.pool.push(StrIdx::EMPTY, NodeKind::Literal(LitData::Null))
    }

    /// `decl name [= init]`
    pub fn decl(&mut self, name: &str, init: Option<NodeId>) -> NodeId {
        let idx = self.intern(name);
        let var = self.pool.push(idx, NodeKind::Identifier);
        self.pool.push(idx, NodeKind::Decl { var, init })
    }

    pub fn binary(&mut self, op: OprId, a: NodeId, b: NodeId) -> NodeId {
        self.pool
            .push(StrIdx::EMPTY, NodeKind::BinOperator { op, a, b })
    }

    /// `target = value`
    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.binary(OprId::Assign, target, value)
    }

    pub fn unary(&mut self, op: OprId, opnd: NodeId, is_post: bool) -> NodeId {
        self.pool
            .push(StrIdx::EMPTY, NodeKind::UnaOperator { op, opnd, is_post })
    }

    pub fn inc(&mut self, target: NodeId, is_post: bool) -> NodeId {
        self.unary(OprId::Inc, target, is_post)
    }

    pub fn dec(&mut self, target: NodeId, is_post: bool) -> NodeId {
        self.unary(OprId::Dec, target, is_post)
    }

    /// `upper.name`
    pub fn field(&mut self, upper: NodeId, name: &str) -> NodeId {
        let field = self.ident(name);
        self.pool
            .push(StrIdx::EMPTY, NodeKind::Field { upper, field })
    }

    pub fn call(&mut self, method: NodeId, args: Vec<NodeId>) -> NodeId {
        self.pool
            .push(StrIdx::EMPTY, NodeKind::Call { method, args })
    }

    pub fn ret(&mut self, result: Option<NodeId>) -> NodeId {
        self.pool.push(StrIdx::EMPTY, NodeKind::Return { result })
    }

    pub fn block(&mut self, stmts: Vec<NodeId>) -> NodeId {
        self.pool.push(StrIdx::EMPTY, NodeKind::Block { stmts })
    }

    pub fn if_else(
        &mut self,
        cond: NodeId,
        true_branch: NodeId,
        false_branch: Option<NodeId>,
    ) -> NodeId {
        self.pool.push(
            StrIdx::EMPTY,
            NodeKind::CondBranch {
                cond,
                true_branch,
                false_branch,
            },
        )
    }

    pub fn while_loop(&mut self, cond: NodeId, body: NodeId) -> NodeId {
        self.pool
            .push(StrIdx::EMPTY, NodeKind::WhileLoop { cond, body })
    }

    pub fn brk(&mut self) -> NodeId {
        self.pool.push(StrIdx::EMPTY, NodeKind::Break)
    }

    pub fn cont(&mut self) -> NodeId {
        self.pool.push(StrIdx::EMPTY, NodeKind::Continue)
    }

    /// A function whose parameters are plain identifiers.
    pub fn function(&mut self, name: &str, params: &[&str], body: Vec<NodeId>) -> NodeId {
        let params = params.iter().map(|p| self.ident(p)).collect();
        let body = self.block(body);
        let idx = self.intern(name);
        self.pool.push(idx, NodeKind::Function { params, body })
    }

    pub fn module(&mut self, body: Vec<NodeId>) -> NodeId {
        self.pool.push(StrIdx::EMPTY, NodeKind::Module { body })
    }

    /// Appends a statement to an existing module or block node.
    pub fn push_stmt(&mut self, parent: NodeId, stmt: NodeId) {
        match self.pool.kind_mut(parent) {
            NodeKind::Module { body } => body.push(stmt),
            NodeKind::Block { stmts } => stmts.push(stmt),
            other => panic!("cannot append a statement to {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decl_shares_name_with_var() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let one = b.int(1);
        let decl = b.decl("x", Some(one));
        let pool = b.finish();

        let node = pool.node(decl);
        let NodeKind::Decl { var, init } = *node.kind() else {
            panic!("expected a decl, got {}", node.kind_name());
        };
        assert_eq!(init, Some(one));
        assert_eq!(pool.node(var).str_idx(), node.str_idx());
        assert_eq!(&*strings.get_string(node.str_idx()), "x");
    }

    #[test]
    fn test_function_params_are_identifiers() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let a = b.ident("a");
        let ret = b.ret(Some(a));
        let func = b.function("f", &["a", "b"], vec![ret]);
        let pool = b.finish();

        let params = pool.params(func);
        assert_eq!(params.len(), 2);
        assert!(params.iter().all(|&p| pool.node(p).is_identifier()));
        assert_eq!(pool.node(params[0]).str_idx(), pool.node(a).str_idx());
    }

    #[test]
    fn test_push_stmt_extends_module() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let module = b.module(Vec::new());
        let brk = b.brk();
        b.push_stmt(module, brk);
        let pool = b.finish();
        assert_eq!(
            pool.node(module).kind(),
            &NodeKind::Module { body: vec![brk] }
        );
    }
}
