//! Reaching definitions on randomly shaped CFGs.

use maple_core::ast::{AstBuilder, AstPool};
use maple_core::cfg::{BbId, BbKind, CfgModule, FuncId};
use maple_core::dfa::AstDfa;
use maple_core::{BitVector, StringTable};
use proptest::prelude::*;

const NAMES: [&str; 3] = ["a", "b", "c"];

/// Per block: a list of `NAMES[dst] = NAMES[src]` assignments.
type Shape = (Vec<Vec<(usize, usize)>>, Vec<(usize, usize)>);

fn shape() -> impl Strategy<Value = Shape> {
    (1usize..8).prop_flat_map(|n| {
        (
            proptest::collection::vec(proptest::collection::vec((0..3usize, 0..3usize), 0..3), n),
            proptest::collection::vec((0..n, 0..n), 0..(2 * n)),
        )
    })
}

struct Built {
    pool: AstPool,
    cfg: CfgModule,
    func: FuncId,
}

fn build(strings: &StringTable, (blocks, edges): &Shape) -> Built {
    let mut b = AstBuilder::new(strings);
    let func_node = b.module(Vec::new());
    let mut cfg = CfgModule::new();
    let func = cfg.new_function(func_node, None);
    let ids: Vec<BbId> = blocks
        .iter()
        .map(|stmts| {
            let bb = cfg.new_block(func, BbKind::Block);
            for &(dst, src) in stmts {
                let target = b.ident(NAMES[dst]);
                let value = b.ident(NAMES[src]);
                let stmt = b.assign(target, value);
                cfg.add_statement(bb, stmt);
            }
            bb
        })
        .collect();
    let entry = cfg.func(func).entry;
    let exit = cfg.func(func).exit;
    cfg.add_edge(entry, ids[0]);
    cfg.add_edge(ids[ids.len() - 1], exit);
    for &(from, to) in edges {
        cfg.add_edge(ids[from], ids[to]);
    }
    Built {
        pool: b.finish(),
        cfg,
        func,
    }
}

/// Round-robin iteration of the transfer equation until nothing changes.
fn naive_rch_in(dfa: &AstDfa<'_>, cfg: &CfgModule) -> Vec<(BbId, BitVector)> {
    let blocks = dfa.reachable_blocks().to_vec();
    let width = dfa.def_positions().len();
    let mut rch_in: Vec<BitVector> = blocks.iter().map(|_| BitVector::alloc(width)).collect();
    loop {
        let mut changed = false;
        for (i, &bb) in blocks.iter().enumerate() {
            let mut next = BitVector::alloc(width);
            for pred in cfg.bb(bb).predecessors() {
                let Some(p) = blocks.iter().position(|b| b == pred) else {
                    continue;
                };
                let mut out = rch_in[p].clone();
                out.and(dfa.prsv(*pred).unwrap());
                out.or(dfa.gen_set(*pred).unwrap());
                next.or(&out);
            }
            if !next.equal(&rch_in[i]) {
                rch_in[i] = next;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    blocks.into_iter().zip(rch_in).collect()
}

proptest! {
    #[test]
    fn prop_worklist_matches_round_robin(shape in shape()) {
        let strings = StringTable::new();
        let built = build(&strings, &shape);
        let mut dfa = AstDfa::new(&built.pool, &built.cfg);
        dfa.data_flow_analysis(built.func);
        prop_assume!(!dfa.def_positions().is_empty());

        prop_assert!(dfa.verify_fixpoint());
        for (bb, expected) in naive_rch_in(&dfa, &built.cfg) {
            prop_assert!(dfa.rch_in(bb).unwrap().equal(&expected), "RchIn differs at {}", bb);
        }
    }

    #[test]
    fn prop_chains_are_consistent(shape in shape()) {
        let strings = StringTable::new();
        let built = build(&strings, &shape);
        let mut dfa = AstDfa::new(&built.pool, &built.cfg);
        dfa.data_flow_analysis(built.func);

        for (_, pos) in dfa.def_positions().iter() {
            for used in dfa.uses_of(pos.node) {
                prop_assert_eq!(built.pool.node(used).str_idx(), pos.name);
                prop_assert!(dfa.reaching_defs_of(used).contains(&pos.node));
                // every use sits in a reachable block
                let bb = dfa.bb_of_node(used).unwrap();
                prop_assert!(dfa.rch_in(bb).is_some());
            }
        }
    }
}
