//! Enumerations.

use super::PrimType;
use crate::string_table::StrIdx;
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumIdx(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirEnum {
    pub name: StrIdx,
    /// Underlying integer type.
    pub prim: PrimType,
    pub elements: Vec<(StrIdx, i64)>,
}

impl MirEnum {
    pub fn value_of(&self, element: StrIdx) -> Option<i64> {
        self.elements
            .iter()
            .find(|(name, _)| *name == element)
            .map(|&(_, value)| value)
    }
}

#[derive(Default)]
pub struct EnumTable {
    enums: RwLock<Vec<MirEnum>>,
}

impl EnumTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    /// Panics unless `prim` is an integer type.
    pub fn create_enum(&self, name: StrIdx, prim: PrimType) -> EnumIdx {
        assert!(prim.is_integer(), "enum backed by non-integer {}", prim);
        let mut enums = self.enums.write();
        enums.push(MirEnum {
            name,
            prim,
            elements: Vec::new(),
        });
        EnumIdx(enums.len() as u32 - 1)
    }

    /// Returns `false` if `idx` is unknown.
    pub fn add_element(&self, idx: EnumIdx, name: StrIdx, value: i64) -> bool {
        match self.enums.write().get_mut(idx.0 as usize) {
            Some(e) => {
                e.elements.push((name, value));
                true
            }
            None => false,
        }
    }

    pub fn get(&self, idx: EnumIdx) -> Option<MirEnum> {
        self.enums.read().get(idx.0 as usize).cloned()
    }

    pub fn find_by_name(&self, name: StrIdx) -> Option<EnumIdx> {
        self.enums
            .read()
            .iter()
            .position(|e| e.name == name)
            .map(|i| EnumIdx(i as u32))
    }

    pub fn len(&self) -> usize {
        self.enums.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.enums.read().is_empty()
    }
}
