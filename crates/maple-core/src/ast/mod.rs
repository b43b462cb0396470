//! AST node model consumed by the CFG builder and the dataflow engine.
//!
//! Nodes live in an [`AstPool`] and refer to each other by [`NodeId`], which
//! is also the identity the dataflow results are keyed by. Ids are dense and
//! assigned in creation order.

pub mod builder;
pub mod source;
pub mod visit;

pub use builder::AstBuilder;
pub use visit::AstVisitor;

use crate::string_table::StrIdx;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node in an [`AstPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operators of binary and unary operator nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OprId {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ShlAssign,
    ShrAssign,
    BandAssign,
    BorAssign,
    BxorAssign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Band,
    Bor,
    Bxor,
    Land,
    Lor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Inc,
    Dec,
    Minus,
    Not,
    Bcomp,
}

impl OprId {
    const BINARY: &'static [(&'static str, OprId)] = &[
        ("=", OprId::Assign),
        ("+=", OprId::AddAssign),
        ("-=", OprId::SubAssign),
        ("*=", OprId::MulAssign),
        ("/=", OprId::DivAssign),
        ("%=", OprId::ModAssign),
        ("<<=", OprId::ShlAssign),
        (">>=", OprId::ShrAssign),
        ("&=", OprId::BandAssign),
        ("|=", OprId::BorAssign),
        ("^=", OprId::BxorAssign),
        ("+", OprId::Add),
        ("-", OprId::Sub),
        ("*", OprId::Mul),
        ("/", OprId::Div),
        ("%", OprId::Mod),
        ("<<", OprId::Shl),
        (">>", OprId::Shr),
        ("&", OprId::Band),
        ("|", OprId::Bor),
        ("^", OprId::Bxor),
        ("&&", OprId::Land),
        ("||", OprId::Lor),
        ("==", OprId::Eq),
        ("!=", OprId::Ne),
        ("<", OprId::Lt),
        ("<=", OprId::Le),
        (">", OprId::Gt),
        (">=", OprId::Ge),
    ];

    const UNARY: &'static [(&'static str, OprId)] = &[
        ("++", OprId::Inc),
        ("--", OprId::Dec),
        ("-", OprId::Minus),
        ("!", OprId::Not),
        ("~", OprId::Bcomp),
    ];

    pub fn binary_from_symbol(symbol: &str) -> Option<OprId> {
        Self::BINARY
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, op)| *op)
    }

    pub fn unary_from_symbol(symbol: &str) -> Option<OprId> {
        Self::UNARY
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, op)| *op)
    }

    pub fn symbol(self) -> &'static str {
        Self::BINARY
            .iter()
            .chain(Self::UNARY)
            .find(|(_, op)| *op == self)
            .map(|(s, _)| *s)
            .unwrap_or("?")
    }

    /// `=` or any compound assignment.
    pub fn is_assign(self) -> bool {
        matches!(
            self,
            OprId::Assign
                | OprId::AddAssign
                | OprId::SubAssign
                | OprId::MulAssign
                | OprId::DivAssign
                | OprId::ModAssign
                | OprId::ShlAssign
                | OprId::ShrAssign
                | OprId::BandAssign
                | OprId::BorAssign
                | OprId::BxorAssign
        )
    }

    /// Assignment that also reads the previous value of its target.
    pub fn is_compound_assign(self) -> bool {
        self.is_assign() && self != OprId::Assign
    }

    pub fn is_inc_dec(self) -> bool {
        matches!(self, OprId::Inc | OprId::Dec)
    }
}

impl fmt::Display for OprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Payload of a literal node.
#[derive(Debug, Clone, PartialEq)]
pub enum LitData {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(StrIdx),
    Null,
}

/// Kind-specific payload of a [`TreeNode`]; children are referenced by id.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Module {
        body: Vec<NodeId>,
    },
    Function {
        params: Vec<NodeId>,
        body: NodeId,
    },
    Block {
        stmts: Vec<NodeId>,
    },
    Identifier,
    Literal(LitData),
    /// Variable declaration; the node's name is the declared variable.
    Decl {
        var: NodeId,
        init: Option<NodeId>,
    },
    BinOperator {
        op: OprId,
        a: NodeId,
        b: NodeId,
    },
    UnaOperator {
        op: OprId,
        opnd: NodeId,
        is_post: bool,
    },
    /// `upper.field`; `field` is an identifier naming the member.
    Field {
        upper: NodeId,
        field: NodeId,
    },
    Call {
        method: NodeId,
        args: Vec<NodeId>,
    },
    Return {
        result: Option<NodeId>,
    },
    CondBranch {
        cond: NodeId,
        true_branch: NodeId,
        false_branch: Option<NodeId>,
    },
    WhileLoop {
        cond: NodeId,
        body: NodeId,
    },
    Break,
    Continue,
}

/// One AST node.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    id: NodeId,
    str_idx: StrIdx,
    kind: NodeKind,
}

impl TreeNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Name of identifiers, declarations and functions; empty otherwise.
    pub fn str_idx(&self) -> StrIdx {
        self.str_idx
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Module { .. } => "Module",
            NodeKind::Function { .. } => "Function",
            NodeKind::Block { .. } => "Block",
            NodeKind::Identifier => "Identifier",
            NodeKind::Literal(_) => "Literal",
            NodeKind::Decl { .. } => "Decl",
            NodeKind::BinOperator { .. } => "BinOperator",
            NodeKind::UnaOperator { .. } => "UnaOperator",
            NodeKind::Field { .. } => "Field",
            NodeKind::Call { .. } => "Call",
            NodeKind::Return { .. } => "Return",
            NodeKind::CondBranch { .. } => "CondBranch",
            NodeKind::WhileLoop { .. } => "WhileLoop",
            NodeKind::Break => "Break",
            NodeKind::Continue => "Continue",
        }
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, NodeKind::Identifier)
    }

    /// Initializer of a declaration.
    pub fn decl_init(&self) -> Option<NodeId> {
        match self.kind {
            NodeKind::Decl { init, .. } => init,
            _ => None,
        }
    }

    /// Operator of a binary or unary operator node.
    pub fn opr_id(&self) -> Option<OprId> {
        match self.kind {
            NodeKind::BinOperator { op, .. } | NodeKind::UnaOperator { op, .. } => Some(op),
            _ => None,
        }
    }
}

/// Owner of all nodes of one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct AstPool {
    nodes: Vec<TreeNode>,
}

impl AstPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node and returns its id.
    pub fn push(&mut self, str_idx: StrIdx, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(TreeNode { id, str_idx, kind });
        id
    }

    /// # Panics
    /// Panics if `id` does not belong to this pool.
    pub fn node(&self, id: NodeId) -> &TreeNode {
        match self.nodes.get(id.index()) {
            Some(node) => node,
            None => panic!("node {} is not in the AST pool ({} nodes)", id, self.nodes.len()),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.index())
    }

    pub(crate) fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        let len = self.nodes.len();
        match self.nodes.get_mut(id.index()) {
            Some(node) => &mut node.kind,
            None => panic!("node {} is not in the AST pool ({} nodes)", id, len),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter()
    }

    /// The identifier an assignment target ultimately names: the identifier
    /// itself, or the base of a (possibly nested) field access.
    pub fn base_identifier(&self, id: NodeId) -> Option<NodeId> {
        let node = self.get(id)?;
        match node.kind {
            NodeKind::Identifier => Some(id),
            NodeKind::Field { upper, .. } => self.base_identifier(upper),
            _ => None,
        }
    }

    /// Formal parameters of a function node; empty for anything else.
    pub fn params(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Function { params, .. } => params,
            _ => &[],
        }
    }
}
