use crate::ast::NodeId;
use crate::cfg::BbId;
use crate::mir::{PrimType, TyIdx};
use thiserror::Error;

/// Structural problems found by [`crate::cfg::CfgModule::validate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CfgError {
    #[error("function {func} has no entry block")]
    MissingEntry { func: NodeId },

    #[error("edge {from} -> {to} refers to a block that does not exist")]
    DanglingEdge { from: BbId, to: BbId },

    #[error("edge {from} -> {to} is missing its predecessor entry")]
    AsymmetricEdge { from: BbId, to: BbId },

    #[error("statement {stmt} appears in both {first} and {second}")]
    DuplicateStatement {
        stmt: NodeId,
        first: BbId,
        second: BbId,
    },

    #[error("`{kind}` at node {node} is not inside a loop")]
    OutsideLoop { kind: &'static str, node: NodeId },
}

/// Inconsistent requests against the type table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeTableError {
    #[error("pointee {pointee} already has a {existing:?} pointer; cannot create a {requested:?} pointer to it")]
    PointerKindConflict {
        pointee: TyIdx,
        existing: PrimType,
        requested: PrimType,
    },

    #[error("type index {0} is not in the type table")]
    UnknownTyIdx(TyIdx),

    #[error("type {0} is not struct-like")]
    NotStructLike(TyIdx),
}

/// Errors raised while lowering a function description into the AST pool.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("operator `{0}` cannot be used here")]
    MisplacedOperator(String),

    #[error("assignment target must be an identifier or field access")]
    InvalidAssignTarget,

    #[error("invalid JSON function description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML function description: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T, E = SourceError> = std::result::Result<T, E>;
