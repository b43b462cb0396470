//! Test utilities and fixtures for Maple
//!
//! Lowers YAML module descriptions, builds their CFGs and runs the dataflow
//! engine, so integration tests and benches can talk in names instead of
//! node ids.

pub mod fixtures;

use maple_core::ast::source::ModuleSource;
use maple_core::ast::{AstPool, NodeId, NodeKind};
use maple_core::cfg::{CfgBuilder, CfgModule, FuncId};
use maple_core::dfa::AstDfa;
use maple_core::{DfaConfig, StrIdx, StringTable};

/// A lowered module together with its CFG.
pub struct Lowered {
    pub strings: StringTable,
    pub pool: AstPool,
    pub module: NodeId,
    pub cfg: CfgModule,
}

/// Lowers and builds a CFG for a YAML module description.
///
/// # Panics
/// Panics if the description does not parse, lower or validate; fixtures are
/// expected to be well formed.
pub fn lower_yaml(text: &str) -> Lowered {
    let source = ModuleSource::from_yaml(text).expect("fixture must parse");
    let strings = StringTable::new();
    let (pool, module) = source.lower(&strings).expect("fixture must lower");
    let cfg = CfgBuilder::build(&pool, module).expect("fixture CFG must build");
    cfg.validate().expect("fixture CFG must validate");
    Lowered {
        strings,
        pool,
        module,
        cfg,
    }
}

impl Lowered {
    fn name(&self, name: &str) -> StrIdx {
        self.strings
            .get_str_idx(name)
            .unwrap_or_else(|| panic!("`{}` does not occur in the fixture", name))
    }

    /// The function for module-level code.
    pub fn top_level(&self) -> FuncId {
        self.cfg.functions()[0].id
    }

    /// # Panics
    /// Panics if no function is called `name`.
    pub fn func_named(&self, name: &str) -> FuncId {
        let name = self.name(name);
        self.cfg
            .functions()
            .iter()
            .find(|f| f.parent.is_some() && self.pool.node(f.func_node).str_idx() == name)
            .map(|f| f.id)
            .unwrap_or_else(|| panic!("no function named {}", name))
    }

    /// Identifier nodes spelled `name`, in creation order.
    pub fn idents(&self, name: &str) -> Vec<NodeId> {
        let name = self.name(name);
        self.pool
            .iter()
            .filter(|n| n.is_identifier() && n.str_idx() == name)
            .map(|n| n.id())
            .collect()
    }

    /// Declaration nodes of `name`, in creation order.
    pub fn decls(&self, name: &str) -> Vec<NodeId> {
        let name = self.name(name);
        self.pool
            .iter()
            .filter(|n| matches!(n.kind(), NodeKind::Decl { .. }) && n.str_idx() == name)
            .map(|n| n.id())
            .collect()
    }

    pub fn analyze(&self, func: FuncId) -> AstDfa<'_> {
        self.analyze_with(func, DfaConfig::default())
    }

    pub fn analyze_with(&self, func: FuncId, config: DfaConfig) -> AstDfa<'_> {
        let mut dfa = AstDfa::with_config(&self.pool, &self.cfg, config);
        dfa.data_flow_analysis(func);
        dfa
    }
}
