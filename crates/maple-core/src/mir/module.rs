//! Per-module MIR bookkeeping.

use super::TyIdx;
use crate::string_table::StrIdx;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Name to type mapping.
#[derive(Default)]
pub struct TypeNameTable {
    names: RwLock<FxHashMap<StrIdx, TyIdx>>,
}

impl TypeNameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_ty_idx_from_name(&self, name: StrIdx) -> Option<TyIdx> {
        self.names.read().get(&name).copied()
    }

    /// Returns the previous binding of `name`.
    pub fn set_ty_idx_for_name(&self, name: StrIdx, ty: TyIdx) -> Option<TyIdx> {
        self.names.write().insert(name, ty)
    }

    /// Binds `name` to `ty` unless it is already bound; returns the binding
    /// that holds afterwards.
    pub fn get_or_insert(&self, name: StrIdx, ty: TyIdx) -> TyIdx {
        if let Some(existing) = self.get_ty_idx_from_name(name) {
            return existing;
        }
        *self.names.write().entry(name).or_insert(ty)
    }

    pub fn remove(&self, name: StrIdx) -> Option<TyIdx> {
        self.names.write().remove(&name)
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}

/// Types a compilation unit declares, in declaration order.
pub struct MirModule {
    name: StrIdx,
    type_names: TypeNameTable,
    type_def_order: Vec<StrIdx>,
    classes: Vec<TyIdx>,
}

impl MirModule {
    pub fn new(name: StrIdx) -> Self {
        Self {
            name,
            type_names: TypeNameTable::new(),
            type_def_order: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn name(&self) -> StrIdx {
        self.name
    }

    pub fn type_name_table(&self) -> &TypeNameTable {
        &self.type_names
    }

    /// Binds `name` to `ty`; a first binding is appended to the definition
    /// order.
    pub fn declare_type(&mut self, name: StrIdx, ty: TyIdx) {
        if self.type_names.set_ty_idx_for_name(name, ty).is_none() {
            self.type_def_order.push(name);
        }
    }

    pub fn type_def_order(&self) -> &[StrIdx] {
        &self.type_def_order
    }

    pub fn add_class(&mut self, ty: TyIdx) {
        if !self.classes.contains(&ty) {
            self.classes.push(ty);
        }
    }

    pub fn classes(&self) -> &[TyIdx] {
        &self.classes
    }
}
