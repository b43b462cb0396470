//! Reaching definitions and def-use chains over the AST-level CFG.
//!
//! [`AstDfa::data_flow_analysis`] runs four phases over one function:
//!
//! 1. collect info: statement -> block and identifier -> statement maps, and
//!    the function's parameters as definitions at the entry block;
//! 2. collect def nodes: definition positions in worklist order from the
//!    entry, which fixes the bit-vector layout;
//! 3. build bit vectors: per-block `Prsv`/`Gen`, then the `RchIn` fixpoint
//!    `RchIn[bb] = U_pred (RchIn[p] & Prsv[p]) | Gen[p]`;
//! 4. build def-use chain: a forward walk per definition that stops at the
//!    next definition of the same name.
//!
//! Results stay available until [`AstDfa::clear`]. Analysing another function
//! with the same instance requires clearing first.

mod collect;
mod def_use;
pub mod positions;

pub use positions::{BitIndex, DefId, DefPosition, DefPositionTable};

use crate::ast::{AstPool, AstVisitor, NodeId};
use crate::bit_vector::BitVector;
use crate::cfg::{BbId, CfgModule, FuncId};
use crate::config::{DfaConfig, KillPolicy};
use crate::string_table::StringTable;
use collect::{def_site, CollectInfoVisitor};
use def_use::DefUseChainVisitor;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt::Write as _;
use tracing::{debug, trace};

/// Dataflow engine for one function at a time.
pub struct AstDfa<'a> {
    pool: &'a AstPool,
    cfg: &'a CfgModule,
    config: DfaConfig,
    /// Function of the current run; `None` until analysed or after `clear`.
    func: Option<FuncId>,

    /// Identifier (and statement) node -> enclosing statement.
    node_to_stmt: FxHashMap<NodeId, NodeId>,
    /// Statement -> containing block. Parameters map through the function node.
    stmt_to_bb: FxHashMap<NodeId, BbId>,
    /// Blocks reachable from the entry, in collection order.
    bbs: Vec<BbId>,

    /// Definition positions in bit order.
    positions: DefPositionTable,
    /// Owning block of each definition, indexed by `DefId`.
    def_bbs: Vec<BbId>,
    /// Statement -> the definition it makes.
    stmt_defs: FxHashMap<NodeId, DefId>,
    /// Parameter identifier nodes.
    params: FxHashSet<NodeId>,
    /// Every definition node, parameters included.
    defs: FxHashSet<NodeId>,
    /// Definitions that also read the previous value (`+=`, `++`).
    def_uses: FxHashSet<NodeId>,

    /// Per reachable block; all vectors are `positions.len()` bits wide.
    prsv_map: FxHashMap<BbId, BitVector>,
    gen_map: FxHashMap<BbId, BitVector>,
    rch_in_map: FxHashMap<BbId, BitVector>,
    /// Only filled when `DfaConfig::build_out_map` is set.
    rch_out_map: FxHashMap<BbId, BitVector>,
    iterations: usize,

    /// Definition node -> use nodes.
    def_use: FxHashMap<NodeId, FxHashSet<NodeId>>,
}

impl<'a> AstDfa<'a> {
    /// Engine with the default [`DfaConfig`].
    pub fn new(pool: &'a AstPool, cfg: &'a CfgModule) -> Self {
        Self::with_config(pool, cfg, DfaConfig::default())
    }

    pub fn with_config(pool: &'a AstPool, cfg: &'a CfgModule, config: DfaConfig) -> Self {
        Self {
            pool,
            cfg,
            config,
            func: None,
            node_to_stmt: FxHashMap::default(),
            stmt_to_bb: FxHashMap::default(),
            bbs: Vec::new(),
            positions: DefPositionTable::new(),
            def_bbs: Vec::new(),
            stmt_defs: FxHashMap::default(),
            params: FxHashSet::default(),
            defs: FxHashSet::default(),
            def_uses: FxHashSet::default(),
            prsv_map: FxHashMap::default(),
            gen_map: FxHashMap::default(),
            rch_in_map: FxHashMap::default(),
            rch_out_map: FxHashMap::default(),
            iterations: 0,
            def_use: FxHashMap::default(),
        }
    }

    /// Runs all phases over `func`.
    ///
    /// # Panics
    /// Panics if results of a previous run have not been cleared, or if the
    /// CFG refers to blocks or nodes that do not exist.
    pub fn data_flow_analysis(&mut self, func: FuncId) {
        assert!(
            self.func.is_none(),
            "call clear() before analysing another function"
        );
        self.func = Some(func);

        self.collect_info(func);
        self.collect_def_nodes(func);
        self.build_bit_vectors(func);
        self.build_def_use_chain();
    }

    /// Drops all per-function results.
    pub fn clear(&mut self) {
        self.func = None;
        self.node_to_stmt.clear();
        self.stmt_to_bb.clear();
        self.bbs.clear();
        self.positions.clear();
        self.def_bbs.clear();
        self.stmt_defs.clear();
        self.params.clear();
        self.defs.clear();
        self.def_uses.clear();
        self.prsv_map.clear();
        self.gen_map.clear();
        self.rch_in_map.clear();
        self.rch_out_map.clear();
        self.iterations = 0;
        self.def_use.clear();
    }

    fn collect_info(&mut self, func: FuncId) {
        let cfg_func = self.cfg.func(func);
        let entry = cfg_func.entry;

        // parameters are defined by the function node itself, at entry
        self.stmt_to_bb.insert(cfg_func.func_node, entry);
        for &param in self.pool.params(cfg_func.func_node) {
            self.node_to_stmt.insert(param, cfg_func.func_node);
        }

        let mut stmt_count = 0usize;
        for &bb in cfg_func.blocks() {
            for &stmt in self.cfg.bb(bb).statements() {
                stmt_count += 1;
                self.stmt_to_bb.insert(stmt, bb);
                self.node_to_stmt.insert(stmt, stmt);
                CollectInfoVisitor {
                    stmt,
                    node_to_stmt: &mut self.node_to_stmt,
                }
                .visit_node(self.pool, stmt);
            }
        }
        debug!(
            func = %cfg_func.func_node,
            blocks = cfg_func.blocks().len(),
            statements = stmt_count,
            "collected statement info"
        );
    }

    fn collect_def_nodes(&mut self, func: FuncId) {
        let cfg_func = self.cfg.func(func);
        let entry = cfg_func.entry;

        for &param in self.pool.params(cfg_func.func_node) {
            let name = self.pool.node(param).str_idx();
            self.positions.push(DefPosition { name, node: param });
            self.def_bbs.push(entry);
            self.params.insert(param);
            self.defs.insert(param);
        }

        let mut visited: FxHashSet<BbId> = FxHashSet::default();
        let mut worklist = VecDeque::from([entry]);
        while let Some(bb) = worklist.pop_front() {
            if !visited.insert(bb) {
                continue;
            }
            self.bbs.push(bb);
            let block = self.cfg.bb(bb);
            for &stmt in block.statements() {
                if let Some(site) = def_site(self.pool, stmt) {
                    let def = self.positions.push(DefPosition {
                        name: site.name,
                        node: site.node,
                    });
                    self.def_bbs.push(bb);
                    self.stmt_defs.insert(stmt, def);
                    self.defs.insert(site.node);
                    if site.is_def_use {
                        self.def_uses.insert(site.node);
                    }
                }
            }
            worklist.extend(block.successors().iter().copied());
        }
        debug!(
            blocks = self.bbs.len(),
            defs = self.positions.len(),
            "collected definition positions"
        );
    }

    /// Definitions whose `Prsv` bit `def` clears.
    fn killed_by(&self, def: DefId) -> impl Iterator<Item = DefId> + '_ {
        let name = self.positions.position(def).name;
        match self.config.kill_policy {
            KillPolicy::ConservativeSameNameKill => self
                .positions
                .defs_named(name)
                .iter()
                .copied()
                .filter(move |&other| other != def),
        }
    }

    fn build_bit_vectors(&mut self, func: FuncId) {
        let width = self.positions.len();
        if width == 0 {
            debug!("no definitions; skipping bit vectors");
            return;
        }
        let entry = self.cfg.func(func).entry;

        for &bb in &self.bbs {
            let mut prsv = BitVector::alloc(width);
            prsv.wipe_off(0xFF);
            let mut gen = BitVector::alloc(width);
            if bb == entry {
                for &param in &self.params {
                    if let Some(def) = self.positions.def_at_node(param) {
                        gen.set_bit(self.positions.bit_of(def).index());
                    }
                }
            }
            for &stmt in self.cfg.bb(bb).statements() {
                let Some(&def) = self.stmt_defs.get(&stmt) else {
                    continue;
                };
                for other in self.killed_by(def) {
                    let bit = self.positions.bit_of(other).index();
                    prsv.clear_bit(bit);
                    gen.clear_bit(bit);
                }
                gen.set_bit(self.positions.bit_of(def).index());
            }
            self.prsv_map.insert(bb, prsv);
            self.gen_map.insert(bb, gen);
            self.rch_in_map.insert(bb, BitVector::alloc(width));
        }

        self.solve_reaching_definitions(func);

        if self.config.build_out_map {
            for &bb in &self.bbs {
                if let Some(out) = self.rch_out(bb) {
                    self.rch_out_map.insert(bb, out);
                }
            }
        }
        if self.config.trace {
            trace!("bit vectors\n{}", self.dump_bit_vectors());
        }
    }

    /// `(RchIn[pred] & Prsv[pred]) | Gen[pred]` joined over all analysed preds.
    fn meet_over_preds(&self, bb: BbId) -> BitVector {
        let mut rch_in = BitVector::alloc(self.positions.len());
        for pred in self.cfg.bb(bb).predecessors() {
            // unreachable predecessors carry no facts
            let (Some(pin), Some(prsv), Some(gen)) = (
                self.rch_in_map.get(pred),
                self.prsv_map.get(pred),
                self.gen_map.get(pred),
            ) else {
                continue;
            };
            let mut tmp = pin.clone();
            tmp.and(prsv);
            tmp.or(gen);
            rch_in.or(&tmp);
        }
        rch_in
    }

    fn solve_reaching_definitions(&mut self, func: FuncId) {
        let mut queued = BitVector::alloc(self.cfg.blocks().len());
        let mut worklist: VecDeque<BbId> = VecDeque::new();
        for bb in self.cfg.reverse_postorder(func) {
            queued.set_bit(bb.index());
            worklist.push_back(bb);
        }

        while let Some(bb) = worklist.pop_front() {
            queued.clear_bit(bb.index());
            self.iterations += 1;

            let rch_in = self.meet_over_preds(bb);
            let changed = self
                .rch_in_map
                .get(&bb)
                .map_or(true, |old| !old.equal(&rch_in));
            if !changed {
                continue;
            }
            self.rch_in_map.insert(bb, rch_in);
            for &succ in self.cfg.bb(bb).successors() {
                if self.rch_in_map.contains_key(&succ) && !queued.get_bit(succ.index()) {
                    queued.set_bit(succ.index());
                    worklist.push_back(succ);
                }
            }
        }
        debug!(iterations = self.iterations, "reaching definitions converged");
    }

    fn build_def_use_chain(&mut self) {
        if self.positions.is_empty() {
            return;
        }
        let mut def_use: FxHashMap<NodeId, FxHashSet<NodeId>> = FxHashMap::default();

        for (def, pos) in self.positions.iter() {
            let bit = self.positions.bit_of(def).index();
            let start = self.def_bbs[def.index()];
            let is_param = self.params.contains(&pos.node);
            let mut uses = FxHashSet::default();

            let mut visited: FxHashSet<BbId> = FxHashSet::default();
            let mut worklist = VecDeque::from([start]);
            while let Some(bb) = worklist.pop_front() {
                if !visited.insert(bb) {
                    continue;
                }
                let reaches_in = self.rch_in_map[&bb].get_bit(bit);
                if bb != start && !reaches_in && !self.gen_map[&bb].get_bit(bit) {
                    continue;
                }

                let mut visitor = DefUseChainVisitor {
                    def_node: pos.node,
                    name: pos.name,
                    defs: &self.defs,
                    def_uses: &self.def_uses,
                    reach_def: reaches_in || (is_param && bb == start),
                    reach_new_def: false,
                    uses: &mut uses,
                };
                for &stmt in self.cfg.bb(bb).statements() {
                    visitor.visit_node(self.pool, stmt);
                }

                if visitor.is_live() {
                    for &succ in self.cfg.bb(bb).successors() {
                        if self.rch_in_map.contains_key(&succ) {
                            worklist.push_back(succ);
                        }
                    }
                }
            }
            def_use.insert(pos.node, uses);
        }

        debug!(
            defs = def_use.len(),
            uses = def_use.values().map(|u| u.len()).sum::<usize>(),
            "built def-use chains"
        );
        self.def_use = def_use;
    }

    /// The function analysed by the last run.
    pub fn function(&self) -> Option<FuncId> {
        self.func
    }

    pub fn config(&self) -> &DfaConfig {
        &self.config
    }

    /// Definition site of the last run (declaration, assignment base,
    /// increment target or parameter).
    pub fn is_def(&self, node: NodeId) -> bool {
        self.defs.contains(&node)
    }

    /// Definition that also reads the previous value of its variable.
    pub fn is_def_use(&self, node: NodeId) -> bool {
        self.def_uses.contains(&node)
    }

    /// Parameter identifier of the analysed function.
    pub fn is_param(&self, node: NodeId) -> bool {
        self.params.contains(&node)
    }

    /// Definition positions; a position's index is its bit in every vector.
    pub fn def_positions(&self) -> &DefPositionTable {
        &self.positions
    }

    /// Block a definition belongs to.
    pub fn def_bb(&self, def: DefId) -> BbId {
        self.def_bbs[def.index()]
    }

    /// Definition node -> use nodes.
    pub fn def_use_map(&self) -> &FxHashMap<NodeId, FxHashSet<NodeId>> {
        &self.def_use
    }

    /// Uses of the definition at `def_node`, sorted by node id.
    pub fn uses_of(&self, def_node: NodeId) -> Vec<NodeId> {
        let mut uses: Vec<NodeId> = self
            .def_use
            .get(&def_node)
            .map(|u| u.iter().copied().collect())
            .unwrap_or_default();
        uses.sort_unstable();
        uses
    }

    /// Definitions whose chains contain `use_node`, sorted by node id.
    pub fn reaching_defs_of(&self, use_node: NodeId) -> Vec<NodeId> {
        let mut defs: Vec<NodeId> = self
            .def_use
            .iter()
            .filter(|(_, uses)| uses.contains(&use_node))
            .map(|(&def, _)| def)
            .collect();
        defs.sort_unstable();
        defs
    }

    /// Statement enclosing `node`.
    pub fn stmt_of(&self, node: NodeId) -> Option<NodeId> {
        self.node_to_stmt.get(&node).copied()
    }

    /// Block holding `stmt`; the function node maps to the entry block.
    pub fn bb_of_stmt(&self, stmt: NodeId) -> Option<BbId> {
        self.stmt_to_bb.get(&stmt).copied()
    }

    /// Block containing `node`, through its statement.
    pub fn bb_of_node(&self, node: NodeId) -> Option<BbId> {
        self.stmt_of(node).and_then(|stmt| self.bb_of_stmt(stmt))
    }

    /// Blocks reachable from the entry, in collection order.
    pub fn reachable_blocks(&self) -> &[BbId] {
        &self.bbs
    }

    /// Definitions reaching the entry of `bb`. `None` for unreachable blocks
    /// and functions without definitions.
    pub fn rch_in(&self, bb: BbId) -> Option<&BitVector> {
        self.rch_in_map.get(&bb)
    }

    /// The last definition of each name made in `bb`.
    pub fn gen_set(&self, bb: BbId) -> Option<&BitVector> {
        self.gen_map.get(&bb)
    }

    /// Definitions `bb` lets through: everything but names it redefines.
    pub fn prsv(&self, bb: BbId) -> Option<&BitVector> {
        self.prsv_map.get(&bb)
    }

    /// Definitions live at the exit of `bb`: `(RchIn & Prsv) | Gen`.
    pub fn rch_out(&self, bb: BbId) -> Option<BitVector> {
        if let Some(out) = self.rch_out_map.get(&bb) {
            return Some(out.clone());
        }
        let mut out = self.rch_in_map.get(&bb)?.clone();
        out.and(self.prsv_map.get(&bb)?);
        out.or(self.gen_map.get(&bb)?);
        Some(out)
    }

    /// Blocks popped off the worklist while solving.
    pub fn fixpoint_iterations(&self) -> usize {
        self.iterations
    }

    /// True when one more round of the transfer equation changes nothing.
    pub fn verify_fixpoint(&self) -> bool {
        self.bbs.iter().all(|&bb| match self.rch_in_map.get(&bb) {
            Some(rch_in) => self.meet_over_preds(bb).equal(rch_in),
            None => true,
        })
    }

    /// Per-block `Prsv`, `Gen` and `RchIn`, blocks in id order.
    pub fn dump_bit_vectors(&self) -> String {
        let mut blocks = self.bbs.clone();
        blocks.sort_unstable();
        let mut out = String::new();
        for (label, map) in [
            ("Prsv", &self.prsv_map),
            ("Gen", &self.gen_map),
            ("RchIn", &self.rch_in_map),
        ] {
            let _ = writeln!(out, "=== {} ===", label);
            for bb in &blocks {
                if let Some(bv) = map.get(bb) {
                    let _ = writeln!(out, "{} : {}", bb, bv);
                }
            }
        }
        out
    }

    /// One line per definition, in collection order:
    /// `d<i> <name> (s<idx>) node <n> stmt <s> bb B<b> -> [uses]`.
    pub fn dump_def_use(&self, strings: &StringTable) -> String {
        let mut out = String::new();
        for (def, pos) in self.positions.iter() {
            let stmt = self
                .stmt_of(pos.node)
                .map_or_else(|| "?".to_string(), |s| s.to_string());
            let uses: Vec<String> = self
                .uses_of(pos.node)
                .iter()
                .map(|u| u.to_string())
                .collect();
            let _ = writeln!(
                out,
                "{} {} ({}) node {} stmt {} bb {} -> [{}]",
                def,
                strings.get_string(pos.name),
                pos.name,
                pos.node,
                stmt,
                self.def_bb(def),
                uses.join(", ")
            );
        }
        out
    }

    /// Serializable summary of the results.
    pub fn report(&self, strings: &StringTable) -> DefUseReport {
        let function = self
            .func
            .map(|f| {
                let node = self.pool.node(self.cfg.func(f).func_node);
                strings.get_string(node.str_idx()).to_string()
            })
            .unwrap_or_default();
        let defs = self
            .positions
            .iter()
            .map(|(def, pos)| DefReport {
                name: strings.get_string(pos.name).to_string(),
                node: pos.node.0,
                stmt: self.stmt_of(pos.node).map(|s| s.0),
                bb: self.def_bb(def).0,
                is_param: self.is_param(pos.node),
                is_def_use: self.is_def_use(pos.node),
                uses: self.uses_of(pos.node).iter().map(|u| u.0).collect(),
            })
            .collect();
        DefUseReport {
            function,
            iterations: self.iterations,
            defs,
        }
    }
}

/// Results of one run, as written by `mapleopt dfa --format json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefUseReport {
    /// Function name; empty for module-level code.
    pub function: String,
    /// Blocks popped off the worklist while solving.
    pub iterations: usize,
    /// In bit order.
    pub defs: Vec<DefReport>,
}

/// One definition and its uses; ids are raw node and block numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefReport {
    /// Variable name.
    pub name: String,
    /// Definition node.
    pub node: u32,
    /// Enclosing statement; the function node for parameters.
    pub stmt: Option<u32>,
    /// Owning block.
    pub bb: u32,
    pub is_param: bool,
    pub is_def_use: bool,
    /// Use nodes, ascending.
    pub uses: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, OprId};
    use crate::cfg::{BbKind, CfgBuilder};

    // ── Helpers ──────────────────────────────────────────────────────

    /// Analyses the first function found in the module (or top-level code).
    fn analyze<'a>(pool: &'a AstPool, cfg: &'a CfgModule) -> AstDfa<'a> {
        let func = cfg
            .functions()
            .iter()
            .find(|f| f.parent.is_some())
            .unwrap_or(&cfg.functions()[0])
            .id;
        let mut dfa = AstDfa::new(pool, cfg);
        dfa.data_flow_analysis(func);
        dfa
    }

    // ── Straight-line code ───────────────────────────────────────────

    #[test]
    fn test_redefinition_kills_previous_def() {
        // decl x = 1; y = x + 2; x = 3; z = x;
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let one = b.int(1);
        let d1 = b.decl("x", Some(one));
        let y = b.ident("y");
        let x_use1 = b.ident("x");
        let two = b.int(2);
        let sum = b.binary(OprId::Add, x_use1, two);
        let s2 = b.assign(y, sum);
        let x_def2 = b.ident("x");
        let three = b.int(3);
        let s3 = b.assign(x_def2, three);
        let z = b.ident("z");
        let x_use2 = b.ident("x");
        let s4 = b.assign(z, x_use2);
        let module = b.module(vec![d1, s2, s3, s4]);
        let pool = b.finish();
        let cfg = CfgBuilder::build(&pool, module).unwrap();

        let dfa = analyze(&pool, &cfg);
        assert!(dfa.is_def(d1));
        assert!(dfa.is_def(x_def2));
        assert_eq!(dfa.uses_of(d1), vec![x_use1]);
        assert_eq!(dfa.uses_of(x_def2), vec![x_use2]);
        assert!(!dfa.uses_of(d1).contains(&x_def2), "a redefinition is not a use");
        assert_eq!(dfa.reaching_defs_of(x_use2), vec![x_def2]);
        assert_eq!(dfa.stmt_of(x_use1), Some(s2));
    }

    #[test]
    fn test_compound_assign_is_def_and_use() {
        // decl x = 1; x += 1;
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let one = b.int(1);
        let d1 = b.decl("x", Some(one));
        let x = b.ident("x");
        let one2 = b.int(1);
        let add = b.binary(OprId::AddAssign, x, one2);
        let module = b.module(vec![d1, add]);
        let pool = b.finish();
        let cfg = CfgBuilder::build(&pool, module).unwrap();

        let dfa = analyze(&pool, &cfg);
        assert_eq!(dfa.uses_of(d1), vec![x]);
        assert!(dfa.is_def(x));
        assert!(dfa.is_def_use(x));
        assert!(!dfa.is_def_use(d1));
    }

    #[test]
    fn test_decl_without_init_does_not_kill() {
        // decl x = 1; decl x; y = x;
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let one = b.int(1);
        let d1 = b.decl("x", Some(one));
        let bare = b.decl("x", None);
        let y = b.ident("y");
        let x = b.ident("x");
        let s = b.assign(y, x);
        let module = b.module(vec![d1, bare, s]);
        let pool = b.finish();
        let cfg = CfgBuilder::build(&pool, module).unwrap();

        let dfa = analyze(&pool, &cfg);
        assert!(!dfa.is_def(bare));
        assert_eq!(dfa.uses_of(d1), vec![x]);
    }

    #[test]
    fn test_self_reference_in_decl_is_not_own_use() {
        // decl x = 1; decl x = x + 1;
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let one = b.int(1);
        let d1 = b.decl("x", Some(one));
        let x = b.ident("x");
        let one2 = b.int(1);
        let sum = b.binary(OprId::Add, x, one2);
        let d2 = b.decl("x", Some(sum));
        let module = b.module(vec![d1, d2]);
        let pool = b.finish();
        let cfg = CfgBuilder::build(&pool, module).unwrap();

        let dfa = analyze(&pool, &cfg);
        assert_eq!(dfa.uses_of(d1), vec![x]);
        assert!(dfa.uses_of(d2).is_empty());
    }

    // ── Parameters and control flow ──────────────────────────────────

    #[test]
    fn test_parameter_reaches_return() {
        // function f(a) { return a; }
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let a = b.ident("a");
        let ret = b.ret(Some(a));
        let f = b.function("f", &["a"], vec![ret]);
        let module = b.module(vec![f]);
        let pool = b.finish();
        let cfg = CfgBuilder::build(&pool, module).unwrap();

        let dfa = analyze(&pool, &cfg);
        let param = pool.params(f)[0];
        let def = dfa.def_positions().def_at_node(param).unwrap();
        let entry = cfg.function_for_node(f).unwrap().entry;
        assert!(dfa.is_param(param));
        assert_eq!(dfa.def_bb(def), entry);
        assert_eq!(dfa.stmt_of(param), Some(f));
        assert_eq!(dfa.bb_of_node(param), Some(entry));
        assert!(dfa.gen_set(entry).unwrap().get_bit(dfa.def_positions().bit_of(def).index()));
        assert_eq!(dfa.uses_of(param), vec![a]);
    }

    #[test]
    fn test_both_branches_reach_join() {
        // decl x = 0; if (c) { x = 1; } else { x = 2; } y = x;
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let zero = b.int(0);
        let d0 = b.decl("x", Some(zero));
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
        let y = b.ident("y");
        let x_use = b.ident("x");
        let s3 = b.assign(y, x_use);
        let module = b.module(vec![d0, branch, s3]);
        let pool = b.finish();
        let cfg = CfgBuilder::build(&pool, module).unwrap();

        let dfa = analyze(&pool, &cfg);
        assert!(dfa.uses_of(d0).is_empty(), "both paths redefine x");
        assert_eq!(dfa.uses_of(x1), vec![x_use]);
        assert_eq!(dfa.uses_of(x2), vec![x_use]);
        assert_eq!(dfa.reaching_defs_of(x_use), vec![x1, x2]);
        assert!(dfa.verify_fixpoint());
    }

    #[test]
    fn test_loop_carried_increment_uses_itself() {
        // decl i = 0; while (i < 10) { i++; } z = i;
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let zero = b.int(0);
        let d0 = b.decl("i", Some(zero));
        let i_cond = b.ident("i");
        let ten = b.int(10);
        let cond = b.binary(OprId::Lt, i_cond, ten);
        let i_inc = b.ident("i");
        let inc = b.inc(i_inc, true);
        let body = b.block(vec![inc]);
        let lp = b.while_loop(cond, body);
        let z = b.ident("z");
        let i_after = b.ident("i");
        let s = b.assign(z, i_after);
        let module = b.module(vec![d0, lp, s]);
        let pool = b.finish();
        let cfg = CfgBuilder::build(&pool, module).unwrap();

        let dfa = analyze(&pool, &cfg);
        assert_eq!(dfa.uses_of(d0), vec![i_cond, i_inc, i_after]);
        assert_eq!(dfa.uses_of(i_inc), vec![i_cond, i_inc, i_after]);
        assert!(dfa.verify_fixpoint());

        let header = cfg.functions()[0]
            .blocks()
            .iter()
            .copied()
            .find(|&bb| cfg.bb(bb).kind == BbKind::LoopHeader)
            .unwrap();
        assert_eq!(dfa.rch_in(header).unwrap().count_ones(), 2);
    }

    #[test]
    fn test_only_last_same_name_def_leaves_block() {
        // decl x = 0; while (c) { y = x; x = 1; x = 2; }
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let zero = b.int(0);
        let d0 = b.decl("x", Some(zero));
        let c = b.ident("c");
        let y = b.ident("y");
        let x_read = b.ident("x");
        let s_read = b.assign(y, x_read);
        let x_first = b.ident("x");
        let one = b.int(1);
        let s_first = b.assign(x_first, one);
        let x_second = b.ident("x");
        let two = b.int(2);
        let s_second = b.assign(x_second, two);
        let body = b.block(vec![s_read, s_first, s_second]);
        let lp = b.while_loop(c, body);
        let module = b.module(vec![d0, lp]);
        let pool = b.finish();
        let cfg = CfgBuilder::build(&pool, module).unwrap();

        let dfa = analyze(&pool, &cfg);
        let bit = |node| {
            let def = dfa.def_positions().def_at_node(node).unwrap();
            dfa.def_positions().bit_of(def).index()
        };
        let body_bb = dfa.bb_of_stmt(s_read).unwrap();
        assert_eq!(dfa.bb_of_stmt(s_second), Some(body_bb));

        let gen = dfa.gen_set(body_bb).unwrap();
        assert!(!gen.get_bit(bit(x_first)), "x = 1 is overwritten within the block");
        assert!(gen.get_bit(bit(x_second)));
        let prsv = dfa.prsv(body_bb).unwrap();
        assert!(!prsv.get_bit(bit(d0)));

        let out = dfa.rch_out(body_bb).unwrap();
        assert!(!out.get_bit(bit(x_first)));
        assert!(out.get_bit(bit(x_second)));

        let header = dfa.bb_of_stmt(c).unwrap();
        let rch_in = dfa.rch_in(header).unwrap();
        assert!(rch_in.get_bit(bit(d0)));
        assert!(rch_in.get_bit(bit(x_second)));
        assert!(!rch_in.get_bit(bit(x_first)));

        assert_eq!(dfa.reaching_defs_of(x_read), vec![d0, x_second]);
        assert!(dfa.uses_of(x_first).is_empty());
        assert!(dfa.verify_fixpoint());
    }

    #[test]
    fn test_unreachable_block_keeps_no_facts() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let one = b.int(1);
        let d = b.decl("x", Some(one));
        let module = b.module(vec![d]);
        let pool = b.finish();
        let mut cfg = CfgBuilder::build(&pool, module).unwrap();
        let island = cfg.new_block(FuncId(0), BbKind::Block);

        let dfa = analyze(&pool, &cfg);
        assert!(dfa.rch_in(island).is_none());
        assert!(!dfa.reachable_blocks().contains(&island));
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    #[test]
    fn test_no_definitions_yields_empty_results() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let callee = b.ident("print");
        let call = b.call(callee, vec![]);
        let module = b.module(vec![call]);
        let pool = b.finish();
        let cfg = CfgBuilder::build(&pool, module).unwrap();

        let dfa = analyze(&pool, &cfg);
        assert!(dfa.def_positions().is_empty());
        assert!(dfa.def_use_map().is_empty());
        assert_eq!(dfa.dump_def_use(&strings), "");
    }

    #[test]
    #[should_panic(expected = "clear()")]
    fn test_rerun_without_clear_panics() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let module = b.module(vec![]);
        let pool = b.finish();
        let cfg = CfgBuilder::build(&pool, module).unwrap();
        let mut dfa = AstDfa::new(&pool, &cfg);
        dfa.data_flow_analysis(FuncId(0));
        dfa.data_flow_analysis(FuncId(0));
    }

    #[test]
    fn test_clear_allows_next_function() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let a = b.ident("a");
        let ret = b.ret(Some(a));
        let f = b.function("f", &["a"], vec![ret]);
        let bb = b.ident("b");
        let ret2 = b.ret(Some(bb));
        let g = b.function("g", &["b"], vec![ret2]);
        let module = b.module(vec![f, g]);
        let pool = b.finish();
        let cfg = CfgBuilder::build(&pool, module).unwrap();

        let mut dfa = AstDfa::new(&pool, &cfg);
        dfa.data_flow_analysis(cfg.function_for_node(f).unwrap().id);
        assert_eq!(dfa.uses_of(pool.params(f)[0]), vec![a]);
        dfa.clear();
        dfa.data_flow_analysis(cfg.function_for_node(g).unwrap().id);
        assert_eq!(dfa.def_positions().len(), 1);
        assert_eq!(dfa.uses_of(pool.params(g)[0]), vec![bb]);
        assert!(dfa.uses_of(pool.params(f)[0]).is_empty());
    }

    #[test]
    fn test_out_map_matches_transfer() {
        let strings = StringTable::new();
        let mut b = AstBuilder::new(&strings);
        let one = b.int(1);
        let d = b.decl("x", Some(one));
        let module = b.module(vec![d]);
        let pool = b.finish();
        let cfg = CfgBuilder::build(&pool, module).unwrap();
        let config = DfaConfig {
            build_out_map: true,
            ..DfaConfig::default()
        };
        let mut dfa = AstDfa::with_config(&pool, &cfg, config);
        dfa.data_flow_analysis(FuncId(0));

        let bb = dfa.bb_of_stmt(d).unwrap();
        let out = dfa.rch_out(bb).unwrap();
        assert!(out.get_bit(0));
        let exit = cfg.functions()[0].exit;
        assert!(dfa.rch_in(exit).unwrap().get_bit(0));
    }
}
