//! Global symbol table.

use super::TyIdx;
use crate::string_table::StrIdx;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;

/// Index of a global symbol; 0 is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StIdx(pub u32);

impl StIdx {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$st{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Var,
    Func,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Global,
    Extern,
    FileStatic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirSymbol {
    pub st_idx: StIdx,
    pub name: StrIdx,
    pub kind: SymbolKind,
    pub storage: StorageClass,
    pub ty: TyIdx,
}

struct SymbolTableInner {
    symbols: Vec<Option<MirSymbol>>,
    by_name: FxHashMap<StrIdx, StIdx>,
}

/// Symbols indexed by [`StIdx`] with an optional name map.
///
/// A symbol is only findable by name after
/// [`add_to_string_symbol_map`](Self::add_to_string_symbol_map).
pub struct GSymbolTable {
    inner: RwLock<SymbolTableInner>,
}

impl Default for GSymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GSymbolTable {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SymbolTableInner {
                symbols: vec![None],
                by_name: FxHashMap::default(),
            }),
        }
    }

    pub fn create_symbol(
        &self,
        name: StrIdx,
        kind: SymbolKind,
        storage: StorageClass,
        ty: TyIdx,
    ) -> StIdx {
        let mut inner = self.inner.write();
        let st_idx = StIdx(inner.symbols.len() as u32);
        inner.symbols.push(Some(MirSymbol {
            st_idx,
            name,
            kind,
            storage,
            ty,
        }));
        st_idx
    }

    /// Maps the symbol's name to it. Returns `false` if the name is already
    /// taken by another symbol.
    ///
    /// # Panics
    /// Panics if `st_idx` was not created by this table.
    pub fn add_to_string_symbol_map(&self, st_idx: StIdx) -> bool {
        let mut inner = self.inner.write();
        let name = match inner.symbols.get(st_idx.index()).and_then(Option::as_ref) {
            Some(sym) => sym.name,
            None => panic!("symbol {} is not in the table", st_idx),
        };
        if let Some(&existing) = inner.by_name.get(&name) {
            return existing == st_idx;
        }
        inner.by_name.insert(name, st_idx);
        true
    }

    pub fn remove_from_string_symbol_map(&self, st_idx: StIdx) -> bool {
        let mut inner = self.inner.write();
        let Some(name) = inner
            .symbols
            .get(st_idx.index())
            .and_then(Option::as_ref)
            .map(|sym| sym.name)
        else {
            return false;
        };
        if inner.by_name.get(&name) == Some(&st_idx) {
            inner.by_name.remove(&name);
            true
        } else {
            false
        }
    }

    pub fn get_st_idx_from_str_idx(&self, name: StrIdx) -> Option<StIdx> {
        self.inner.read().by_name.get(&name).copied()
    }

    pub fn symbol(&self, st_idx: StIdx) -> Option<MirSymbol> {
        self.inner
            .read()
            .symbols
            .get(st_idx.index())
            .and_then(Option::clone)
    }

    /// Number of slots, including the reserved slot 0.
    pub fn len(&self) -> usize {
        self.inner.read().symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}
