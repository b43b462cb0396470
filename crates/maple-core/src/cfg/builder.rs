//! CFG construction from an AST module.
//!
//! Top-level code becomes one function rooted at the `Module` node; every
//! `Function` node gets its own [`CfgFunc`](super::CfgFunc) nested under the function it
//! appears in. Branch and loop-header blocks hold their condition expression
//! as their only statement.

use super::{BbAttrs, BbId, BbKind, CfgModule, FuncId};
use crate::ast::{AstPool, AstVisitor, NodeId, NodeKind, TreeNode};
use crate::error::CfgError;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct LoopTargets {
    header: BbId,
    exit: BbId,
}

/// Builder that constructs a [`CfgModule`] from an AST module.
pub struct CfgBuilder<'a> {
    pool: &'a AstPool,
    cfg: CfgModule,
    func: FuncId,
    /// Innermost loop last, for break/continue resolution.
    loop_stack: Vec<LoopTargets>,
}

impl<'a> CfgBuilder<'a> {
    pub fn build(pool: &'a AstPool, module: NodeId) -> Result<CfgModule, CfgError> {
        let mut cfg = CfgModule::new();
        let func = cfg.new_function(module, None);
        let mut builder = CfgBuilder {
            pool,
            cfg,
            func,
            loop_stack: Vec::new(),
        };

        let body: &[NodeId] = match pool.node(module).kind() {
            NodeKind::Module { body } => body,
            NodeKind::Block { stmts } => stmts,
            _ => std::slice::from_ref(&module),
        };
        builder.build_body(body)?;

        debug!(
            functions = builder.cfg.functions().len(),
            blocks = builder.cfg.blocks().len(),
            "built CFG"
        );
        Ok(builder.cfg)
    }

    /// Lays out `stmts` between the current function's entry and exit.
    fn build_body(&mut self, stmts: &[NodeId]) -> Result<(), CfgError> {
        let entry = self.cfg.func(self.func).entry;
        let exit = self.cfg.func(self.func).exit;
        let first = self.cfg.new_block(self.func, BbKind::Block);
        self.cfg.add_edge(entry, first);

        let mut current = first;
        for &stmt in stmts {
            current = self.process_statement(stmt, current)?;
        }
        self.cfg.add_edge(current, exit);
        Ok(())
    }

    fn build_function(&mut self, node: NodeId) -> Result<(), CfgError> {
        let pool = self.pool;
        let NodeKind::Function { body, .. } = *pool.node(node).kind() else {
            return Ok(());
        };
        let nested = self.cfg.new_function(node, Some(self.func));
        let saved_func = std::mem::replace(&mut self.func, nested);
        let saved_loops = std::mem::take(&mut self.loop_stack);

        let stmts: &[NodeId] = match pool.node(body).kind() {
            NodeKind::Block { stmts } => stmts,
            _ => std::slice::from_ref(&body),
        };
        let result = self.build_body(stmts);

        self.func = saved_func;
        self.loop_stack = saved_loops;
        result
    }

    fn new_block(&mut self, kind: BbKind) -> BbId {
        let id = self.cfg.new_block(self.func, kind);
        if !self.loop_stack.is_empty() {
            self.cfg.bb_mut(id).attrs |= BbAttrs::IN_LOOP;
        }
        id
    }

    /// Block that collects code following a jump; it is never reached.
    fn dead_block(&mut self) -> BbId {
        self.new_block(BbKind::Terminated)
    }

    /// Processes one statement; returns the block control continues in.
    fn process_statement(&mut self, stmt: NodeId, current: BbId) -> Result<BbId, CfgError> {
        let pool = self.pool;
        match pool.node(stmt).kind() {
            NodeKind::Function { .. } => {
                self.build_function(stmt)?;
                Ok(current)
            }
            NodeKind::Block { stmts } => {
                let mut current = current;
                for &s in stmts {
                    current = self.process_statement(s, current)?;
                }
                Ok(current)
            }
            NodeKind::CondBranch {
                cond,
                true_branch,
                false_branch,
            } => {
                let branch = self.new_block(BbKind::Branch);
                self.cfg.add_edge(current, branch);
                self.add_statement(branch, *cond);
                self.cfg.bb_mut(branch).predicate = Some(*cond);
                self.cfg.bb_mut(branch).aux_node = Some(stmt);

                let then_bb = self.new_block(BbKind::Block);
                self.cfg.add_edge(branch, then_bb);
                let then_end = self.process_statement(*true_branch, then_bb)?;

                let join = self.new_block(BbKind::Join);
                match *false_branch {
                    Some(false_branch) => {
                        let else_bb = self.new_block(BbKind::Block);
                        self.cfg.add_edge(branch, else_bb);
                        let else_end = self.process_statement(false_branch, else_bb)?;
                        self.cfg.add_edge(else_end, join);
                    }
                    None => self.cfg.add_edge(branch, join),
                }
                self.cfg.add_edge(then_end, join);
                Ok(join)
            }
            NodeKind::WhileLoop { cond, body } => {
                let header = self.new_block(BbKind::LoopHeader);
                self.cfg.add_edge(current, header);
                self.add_statement(header, *cond);
                self.cfg.bb_mut(header).predicate = Some(*cond);
                self.cfg.bb_mut(header).aux_node = Some(stmt);

                let exit = self.new_block(BbKind::Join);
                self.loop_stack.push(LoopTargets { header, exit });
                let body_bb = self.new_block(BbKind::Block);
                self.cfg.add_edge(header, body_bb);
                let body_end = self.process_statement(*body, body_bb);
                self.loop_stack.pop();

                // back edge
                self.cfg.add_edge(body_end?, header);
                self.cfg.add_edge(header, exit);
                Ok(exit)
            }
            NodeKind::Return { .. } => {
                self.add_statement(current, stmt);
                self.cfg.bb_mut(current).attrs |= BbAttrs::RETURN;
                let exit = self.cfg.func(self.func).exit;
                self.cfg.add_edge(current, exit);
                Ok(self.dead_block())
            }
            NodeKind::Break => {
                let Some(targets) = self.loop_stack.last().copied() else {
                    return Err(CfgError::OutsideLoop {
                        kind: "break",
                        node: stmt,
                    });
                };
                self.add_statement(current, stmt);
                self.cfg.bb_mut(current).attrs |= BbAttrs::BREAK;
                self.cfg.add_edge(current, targets.exit);
                Ok(self.dead_block())
            }
            NodeKind::Continue => {
                let Some(targets) = self.loop_stack.last().copied() else {
                    return Err(CfgError::OutsideLoop {
                        kind: "continue",
                        node: stmt,
                    });
                };
                self.add_statement(current, stmt);
                self.cfg.bb_mut(current).attrs |= BbAttrs::CONT;
                self.cfg.add_edge(current, targets.header);
                Ok(self.dead_block())
            }
            _ => {
                self.add_statement(current, stmt);
                Ok(current)
            }
        }
    }

    fn add_statement(&mut self, bb: BbId, stmt: NodeId) {
        if self.cfg.bb(bb).is_terminated() {
            return;
        }
        self.cfg.add_statement(bb, stmt);
        let mut finder = CallFinder { found: false };
        finder.visit_node(self.pool, stmt);
        if finder.found {
            self.cfg.bb_mut(bb).attrs |= BbAttrs::HAS_CALL;
        }
    }
}

struct CallFinder {
    found: bool,
}

impl<'a> AstVisitor<'a> for CallFinder {
    fn visit_call(&mut self, _pool: &'a AstPool, _node: &'a TreeNode) {
        self.found = true;
    }

    // nested function bodies are not executed here
    fn visit_function(&mut self, _pool: &'a AstPool, _node: &'a TreeNode) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, OprId};
    use crate::string_table::StringTable;

    /// Blocks of `func` with the given kind, in creation order.
    fn find_kind(cfg: &CfgModule, func: FuncId, kind: BbKind) -> Vec<BbId> {
        cfg.func(func)
            .blocks()
            .iter()
            .copied()
            .filter(|&b| cfg.bb(b).kind == kind)
            .collect()
    }

    #[test]
    fn test_straight_line_code_is_one_block() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let one = b.int(1);
        let d = b.decl("x", Some(one));
        let x = b.ident("x");
        let two = b.int(2);
        let a = b.assign(x, two);
        let module = b.module(vec![d, a]);
        let pool = b.finish();

        let cfg = CfgBuilder::build(&pool, module).unwrap();
        assert_eq!(cfg.functions().len(), 1);
        let func = &cfg.functions()[0];
        let entry = cfg.bb(func.entry);
        assert_eq!(entry.successors().len(), 1);
        let body = cfg.bb(entry.successors()[0]);
        assert_eq!(body.statements(), &[d, a]);
        assert_eq!(body.successors(), &[func.exit]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_if_else_forms_diamond() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let c = b.ident("c");
        let x1 = b.ident("x");
        let one = b.int(1);
        let s1 = b.assign(x1, one);
        let then = b.block(vec![s1]);
        let x2 = b.ident("x");
        let two = b.int(2);
        let s2 = b.assign(x2, two);
        let other = b.block(vec![s2]);
        let branch = b.if_else(c, then, Some(other));
        let module = b.module(vec![branch]);
        let pool = b.finish();

        let cfg = CfgBuilder::build(&pool, module).unwrap();
        let func = FuncId(0);
        let branches = find_kind(&cfg, func, BbKind::Branch);
        assert_eq!(branches.len(), 1);
        let bb = cfg.bb(branches[0]);
        assert_eq!(bb.statements(), &[c], "branch block holds the condition");
        assert_eq!(bb.predicate, Some(c));
        assert_eq!(bb.aux_node, Some(branch));
        assert_eq!(bb.successors().len(), 2);

        let joins = find_kind(&cfg, func, BbKind::Join);
        assert_eq!(cfg.bb(joins[0]).predecessors().len(), 2);
    }

    #[test]
    fn test_while_loop_has_back_edge() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let i = b.ident("i");
        let ten = b.int(10);
        let cond = b.binary(OprId::Lt, i, ten);
        let i2 = b.ident("i");
        let inc = b.inc(i2, true);
        let body = b.block(vec![inc]);
        let lp = b.while_loop(cond, body);
        let module = b.module(vec![lp]);
        let pool = b.finish();

        let cfg = CfgBuilder::build(&pool, module).unwrap();
        let header = find_kind(&cfg, FuncId(0), BbKind::LoopHeader)[0];
        let preds = cfg.bb(header).predecessors();
        assert_eq!(preds.len(), 2, "entry path plus back edge");
        let body_bb = preds
            .iter()
            .copied()
            .find(|&p| cfg.bb(p).statements().contains(&inc))
            .expect("loop body must feed the header");
        assert!(cfg.bb(body_bb).attrs.contains(BbAttrs::IN_LOOP));
    }

    #[test]
    fn test_code_after_return_is_dropped() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let r = b.ret(None);
        let x = b.ident("x");
        let one = b.int(1);
        let dead = b.assign(x, one);
        let f = b.function("f", &[], vec![r, dead]);
        let module = b.module(vec![f]);
        let pool = b.finish();

        let cfg = CfgBuilder::build(&pool, module).unwrap();
        assert_eq!(cfg.functions().len(), 2);
        let func = cfg.function_for_node(f).unwrap();
        assert_eq!(func.parent, Some(FuncId(0)));
        let all: Vec<NodeId> = func
            .blocks()
            .iter()
            .flat_map(|&bb| cfg.bb(bb).statements().to_vec())
            .collect();
        assert_eq!(all, vec![r]);
        assert!(cfg.bb(func.exit).predecessors().len() == 1);
    }

    #[test]
    fn test_break_outside_loop_is_an_error() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let brk = b.brk();
        let module = b.module(vec![brk]);
        let pool = b.finish();

        assert_eq!(
            CfgBuilder::build(&pool, module).unwrap_err(),
            CfgError::OutsideLoop {
                kind: "break",
                node: brk
            }
        );
    }

    #[test]
    fn test_call_sets_has_call() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let callee = b.ident("print");
        let arg = b.int(1);
        let call = b.call(callee, vec![arg]);
        let module = b.module(vec![call]);
        let pool = b.finish();

        let cfg = CfgBuilder::build(&pool, module).unwrap();
        let entry = cfg.functions()[0].entry;
        let body = cfg.bb(entry).successors()[0];
        assert!(cfg.bb(body).attrs.contains(BbAttrs::HAS_CALL));
    }
}
