//! Maple compiler core.
//!
//! Two subsystems the lowering passes depend on:
//!
//! - [`dfa`]: reaching definitions and def-use chains over an AST-level
//!   control-flow graph ([`cfg`]) using [`bit_vector::BitVector`] facts.
//! - [`mir`]: hash-consed MIR types, constant tables and symbols, owned by a
//!   [`context::CompilationContext`] instead of process-wide globals.

pub mod ast;
pub mod bit_vector;
pub mod cfg;
pub mod config;
pub mod context;
pub mod dfa;
pub mod error;
pub mod mir;
pub mod string_table;

pub use bit_vector::BitVector;
pub use config::{DfaConfig, KillPolicy};
pub use context::CompilationContext;
pub use error::{CfgError, SourceError, TypeTableError};
pub use string_table::{StrIdx, StringTable, UStrIdx};
