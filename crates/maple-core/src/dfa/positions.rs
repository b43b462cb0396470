//! Definition positions and their bit-vector layout.

use crate::ast::NodeId;
use crate::string_table::StrIdx;
use rustc_hash::FxHashMap;
use std::fmt;

/// Identity of a definition position, in collection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub u32);

impl DefId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// Position of a definition's fact in every dataflow bit vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitIndex(pub u32);

impl BitIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A definition site: the variable it defines and the node that defines it.
///
/// The node is the `Decl` for initialized declarations, and the target
/// identifier (the base identifier for field targets) for assignments and
/// increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefPosition {
    pub name: StrIdx,
    pub node: NodeId,
}

/// Append-only table of definition positions with the `DefId <-> BitIndex`
/// mapping that fixes the bit-vector layout.
#[derive(Debug, Clone, Default)]
pub struct DefPositionTable {
    positions: Vec<DefPosition>,
    def_to_bit: Vec<BitIndex>,
    bit_to_def: Vec<DefId>,
    by_node: FxHashMap<NodeId, DefId>,
    by_name: FxHashMap<StrIdx, Vec<DefId>>,
}

impl DefPositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a position; its bit is the next free one.
    ///
    /// # Panics
    /// Panics if the node is already registered as a definition.
    pub fn push(&mut self, pos: DefPosition) -> DefId {
        let def = DefId(self.positions.len() as u32);
        let bit = BitIndex(self.bit_to_def.len() as u32);
        let prev = self.by_node.insert(pos.node, def);
        assert!(prev.is_none(), "node {} registered as a definition twice", pos.node);
        self.positions.push(pos);
        self.def_to_bit.push(bit);
        self.bit_to_def.push(def);
        self.by_name.entry(pos.name).or_default().push(def);
        def
    }

    /// Number of positions, which is also the bit-vector width.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, def: DefId) -> DefPosition {
        self.positions[def.index()]
    }

    pub fn bit_of(&self, def: DefId) -> BitIndex {
        self.def_to_bit[def.index()]
    }

    pub fn def_of(&self, bit: BitIndex) -> DefId {
        self.bit_to_def[bit.index()]
    }

    pub fn def_at_node(&self, node: NodeId) -> Option<DefId> {
        self.by_node.get(&node).copied()
    }

    /// All definitions of `name`, in collection order.
    pub fn defs_named(&self, name: StrIdx) -> &[DefId] {
        self.by_name.get(&name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (DefId, DefPosition)> + '_ {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, pos)| (DefId(i as u32), *pos))
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.def_to_bit.clear();
        self.bit_to_def.clear();
        self.by_node.clear();
        self.by_name.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_follow_collection_order() {
        let mut table = DefPositionTable::new();
        let x = StrIdx(1);
        let y = StrIdx(2);
        let d0 = table.push(DefPosition { name: x, node: NodeId(4) });
        let d1 = table.push(DefPosition { name: y, node: NodeId(7) });
        let d2 = table.push(DefPosition { name: x, node: NodeId(9) });

        assert_eq!(table.len(), 3);
        assert_eq!(table.bit_of(d2), BitIndex(2));
        assert_eq!(table.def_of(BitIndex(1)), d1);
        assert_eq!(table.defs_named(x), &[d0, d2]);
        assert_eq!(table.def_at_node(NodeId(7)), Some(d1));
        assert_eq!(table.def_at_node(NodeId(5)), None);
        assert!(table.defs_named(StrIdx(3)).is_empty());
    }

    #[test]
    #[should_panic(expected = "twice")]
    fn test_duplicate_node_panics() {
        let mut table = DefPositionTable::new();
        table.push(DefPosition { name: StrIdx(1), node: NodeId(4) });
        table.push(DefPosition { name: StrIdx(2), node: NodeId(4) });
    }

    #[test]
    fn test_clear_resets_layout() {
        let mut table = DefPositionTable::new();
        table.push(DefPosition { name: StrIdx(1), node: NodeId(4) });
        table.clear();
        assert!(table.is_empty());
        let d = table.push(DefPosition { name: StrIdx(1), node: NodeId(4) });
        assert_eq!(d, DefId(0));
        assert_eq!(table.bit_of(d), BitIndex(0));
    }
}
