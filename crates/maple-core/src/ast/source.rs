//! Serde-friendly function descriptions lowered into an [`AstPool`].
//!
//! This is the input format of the command-line driver and of fixture files.
//! A module is a list of top-level statements; functions are statements too.
//!
//! ```yaml
//! body:
//!   - function:
//!       name: f
//!       params: [a]
//!       body:
//!         - decl: { name: x, init: { ident: a } }
//!         - assign: { target: { ident: x }, op: "+=", value: { int: 1 } }
//!         - return: { ident: x }
//! ```

use super::{AstBuilder, AstPool, NodeId, OprId};
use crate::error::{Result, SourceError};
use crate::string_table::StringTable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleSource {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Vec<StmtSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionSource {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<StmtSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StmtSource {
    Decl {
        name: String,
        #[serde(default)]
        init: Option<ExprSource>,
    },
    Assign {
        target: ExprSource,
        #[serde(default = "default_assign_op")]
        op: String,
        value: ExprSource,
    },
    Expr(ExprSource),
    Return(Option<ExprSource>),
    If {
        cond: ExprSource,
        #[serde(default)]
        then: Vec<StmtSource>,
        #[serde(default, rename = "else")]
        otherwise: Option<Vec<StmtSource>>,
    },
    While {
        cond: ExprSource,
        #[serde(default)]
        body: Vec<StmtSource>,
    },
    Block(Vec<StmtSource>),
    Function(FunctionSource),
    Break,
    Continue,
}

fn default_assign_op() -> String {
    "=".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprSource {
    Ident(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
    Binary {
        op: String,
        lhs: Box<ExprSource>,
        rhs: Box<ExprSource>,
    },
    Unary {
        op: String,
        operand: Box<ExprSource>,
        #[serde(default)]
        postfix: bool,
    },
    Field {
        base: Box<ExprSource>,
        name: String,
    },
    Call {
        callee: Box<ExprSource>,
        #[serde(default)]
        args: Vec<ExprSource>,
    },
}

impl ModuleSource {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Lowers the description into a fresh pool; returns the pool and the
    /// module node.
    pub fn lower(&self, strings: &StringTable) -> Result<(AstPool, NodeId)> {
        let mut lowering = Lowering {
            builder: AstBuilder::new(strings),
        };
        let body = lowering.stmts(&self.body)?;
        let module = lowering.builder.module(body);
        Ok((lowering.builder.finish(), module))
    }
}

struct Lowering<'s> {
    builder: AstBuilder<'s>,
}

impl Lowering<'_> {
    fn stmts(&mut self, stmts: &[StmtSource]) -> Result<Vec<NodeId>> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn stmt(&mut self, stmt: &StmtSource) -> Result<NodeId> {
        match stmt {
            StmtSource::Decl { name, init } => {
                let init = init.as_ref().map(|e| self.expr(e)).transpose()?;
                Ok(self.builder.decl(name, init))
            }
            StmtSource::Assign { target, op, value } => {
                let opr = OprId::binary_from_symbol(op)
                    .ok_or_else(|| SourceError::UnknownOperator(op.clone()))?;
                if !opr.is_assign() {
                    return Err(SourceError::MisplacedOperator(op.clone()));
                }
                let target = self.assign_target(target)?;
                let value = self.expr(value)?;
                Ok(self.builder.binary(opr, target, value))
            }
            StmtSource::Expr(expr) => self.expr(expr),
            StmtSource::Return(result) => {
                let result = result.as_ref().map(|e| self.expr(e)).transpose()?;
                Ok(self.builder.ret(result))
            }
            StmtSource::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.expr(cond)?;
                let then = self.stmts(then)?;
                let then = self.builder.block(then);
                let otherwise = match otherwise {
                    Some(stmts) => {
                        let stmts = self.stmts(stmts)?;
                        Some(self.builder.block(stmts))
                    }
                    None => None,
                };
                Ok(self.builder.if_else(cond, then, otherwise))
            }
            StmtSource::While { cond, body } => {
                let cond = self.expr(cond)?;
                let body = self.stmts(body)?;
                let body = self.builder.block(body);
                Ok(self.builder.while_loop(cond, body))
            }
            StmtSource::Block(stmts) => {
                let stmts = self.stmts(stmts)?;
                Ok(self.builder.block(stmts))
            }
            StmtSource::Function(func) => {
                let body = self.stmts(&func.body)?;
                let params: Vec<&str> = func.params.iter().map(String::as_str).collect();
                Ok(self.builder.function(&func.name, &params, body))
            }
            StmtSource::Break => Ok(self.builder.brk()),
            StmtSource::Continue => Ok(self.builder.cont()),
        }
    }

    fn assign_target(&mut self, target: &ExprSource) -> Result<NodeId> {
        match target {
            ExprSource::Ident(_) | ExprSource::Field { .. } => self.expr(target),
            _ => Err(SourceError::InvalidAssignTarget),
        }
    }

    fn expr(&mut self, expr: &ExprSource) -> Result<NodeId> {
        match expr {
            ExprSource::Ident(name) => Ok(self.builder.ident(name)),
            ExprSource::Int(v) => Ok(self.builder.int(*v)),
            ExprSource::Float(v) => Ok(self.builder.float(*v)),
            ExprSource::Bool(v) => Ok(self.builder.boolean(*v)),
            ExprSource::Str(s) => Ok(self.builder.string(s)),
            ExprSource::Null => Ok(self.builder.null()),
            ExprSource::Binary { op, lhs, rhs } => {
                let opr = OprId::binary_from_symbol(op)
                    .ok_or_else(|| SourceError::UnknownOperator(op.clone()))?;
                let a = if opr.is_assign() {
                    self.assign_target(lhs)?
                } else {
                    self.expr(lhs)?
                };
                let b = self.expr(rhs)?;
                Ok(self.builder.binary(opr, a, b))
            }
            ExprSource::Unary {
                op,
                operand,
                postfix,
            } => {
                let opr = OprId::unary_from_symbol(op)
                    .ok_or_else(|| SourceError::UnknownOperator(op.clone()))?;
                if *postfix && !opr.is_inc_dec() {
                    return Err(SourceError::MisplacedOperator(op.clone()));
                }
                let opnd = if opr.is_inc_dec() {
                    self.assign_target(operand)?
                } else {
                    self.expr(operand)?
                };
                Ok(self.builder.unary(opr, opnd, *postfix))
            }
            ExprSource::Field { base, name } => {
                let upper = self.expr(base)?;
                Ok(self.builder.field(upper, name))
            }
            ExprSource::Call { callee, args } => {
                let method = self.expr(callee)?;
                let args = args
                    .iter()
                    .map(|a| self.expr(a))
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.builder.call(method, args))
            }
        }
    }
}
