//! String interning.
//!
//! Names are interned to dense indices so that AST nodes, types and symbols
//! can carry a `u32` instead of an owned string. Index 0 always holds the
//! empty string.

use indexmap::IndexSet;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

/// An index type a [`StringTable`] hands out.
pub trait StringIndex: Copy + Eq + Hash + fmt::Debug {
    fn from_raw(raw: u32) -> Self;
    fn raw(self) -> u32;
}

macro_rules! string_index {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            /// Index of the empty string.
            pub const EMPTY: $name = $name(0);

            pub fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl StringIndex for $name {
            fn from_raw(raw: u32) -> Self {
                $name(raw)
            }

            fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

string_index!(
    /// Index of an interned identifier, type or symbol name.
    StrIdx,
    "s"
);
string_index!(
    /// Index of an interned user string literal.
    UStrIdx,
    "u"
);

/// Thread-safe, append-only string interner.
///
/// Lookups take the read lock; a miss escalates to the write lock and
/// re-probes before inserting, so two threads racing on the same string
/// always agree on one index.
pub struct StringTable<I: StringIndex = StrIdx> {
    strings: RwLock<IndexSet<Arc<str>>>,
    _index: PhantomData<fn() -> I>,
}

impl<I: StringIndex> StringTable<I> {
    pub fn new() -> Self {
        let mut strings = IndexSet::new();
        strings.insert(Arc::<str>::from(""));
        Self {
            strings: RwLock::new(strings),
            _index: PhantomData,
        }
    }

    /// Returns the index for `s`, interning it on first sight.
    pub fn get_or_create_str_idx(&self, s: &str) -> I {
        if let Some(idx) = self.get_str_idx(s) {
            return idx;
        }
        let mut strings = self.strings.write();
        // insert_full returns the existing slot when another writer got here first
        let (idx, _) = strings.insert_full(Arc::from(s));
        I::from_raw(idx as u32)
    }

    /// Returns the index for `s` if it has been interned.
    pub fn get_str_idx(&self, s: &str) -> Option<I> {
        self.strings
            .read()
            .get_index_of(s)
            .map(|idx| I::from_raw(idx as u32))
    }

    /// Returns the string behind `idx`.
    ///
    /// # Panics
    /// Panics if `idx` was not handed out by this table.
    pub fn get_string(&self, idx: I) -> Arc<str> {
        match self.try_get_string(idx) {
            Some(s) => s,
            None => panic!(
                "string index {:?} out of range ({} strings interned)",
                idx,
                self.len()
            ),
        }
    }

    pub fn try_get_string(&self, idx: I) -> Option<Arc<str>> {
        self.strings.read().get_index(idx.raw() as usize).cloned()
    }

    /// Number of interned strings, including the reserved empty string.
    pub fn len(&self) -> usize {
        self.strings.read().len()
    }

    /// Always false: the empty string occupies slot 0.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl<I: StringIndex> Default for StringTable<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: StringIndex> fmt::Debug for StringTable<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringTable")
            .field("len", &self.len())
            .finish()
    }
}
