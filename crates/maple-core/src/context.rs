//! Owner of every interning table a compilation shares.

use crate::error::TypeTableError;
use crate::mir::{
    EnumTable, FieldAttrs, FieldPair, FpConstTable, GSymbolTable, IntConstTable, MirModule,
    MirStructType, MirType, StructKind, TyIdx, TypeAttrs, TypeNameTable, TypeTable,
};
use crate::string_table::{StrIdx, StringTable, UStrIdx};
use tracing::debug;

type Result<T> = std::result::Result<T, TypeTableError>;

/// Shared compilation state.
///
/// Every table synchronizes internally, so a context can be borrowed by any
/// number of threads at once.
#[derive(Default)]
pub struct CompilationContext {
    strings: StringTable<StrIdx>,
    user_strings: StringTable<UStrIdx>,
    types: TypeTable,
    type_names: TypeNameTable,
    int_consts: IntConstTable,
    fp_consts: FpConstTable,
    symbols: GSymbolTable,
    enums: EnumTable,
}

impl CompilationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strings(&self) -> &StringTable<StrIdx> {
        &self.strings
    }

    pub fn user_strings(&self) -> &StringTable<UStrIdx> {
        &self.user_strings
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Names of classes and interfaces (from first declaration) and of
    /// completed struct-like types, across modules.
    pub fn type_names(&self) -> &TypeNameTable {
        &self.type_names
    }

    pub fn int_consts(&self) -> &IntConstTable {
        &self.int_consts
    }

    pub fn fp_consts(&self) -> &FpConstTable {
        &self.fp_consts
    }

    pub fn symbols(&self) -> &GSymbolTable {
        &self.symbols
    }

    pub fn enums(&self) -> &EnumTable {
        &self.enums
    }

    fn get_or_create_struct_or_union(
        &self,
        kind: StructKind,
        name: &str,
        fields: Vec<FieldPair>,
        parent_fields: Vec<FieldPair>,
        attrs: TypeAttrs,
        module: &mut MirModule,
    ) -> Result<TyIdx> {
        let name = self.strings.get_or_create_str_idx(name);
        let mut proto = MirStructType::new(kind, name);
        proto.fields = fields;
        proto.parent_fields = parent_fields;
        proto.attrs = attrs;
        let idx = self.types.get_or_create_mir_type(&MirType::Struct(proto))?;
        module.declare_type(name, idx);
        Ok(idx)
    }

    pub fn get_or_create_struct_type(
        &self,
        name: &str,
        fields: Vec<FieldPair>,
        parent_fields: Vec<FieldPair>,
        module: &mut MirModule,
    ) -> Result<TyIdx> {
        self.get_or_create_struct_or_union(
            StructKind::Struct,
            name,
            fields,
            parent_fields,
            TypeAttrs::default(),
            module,
        )
    }

    pub fn get_or_create_union_type(
        &self,
        name: &str,
        fields: Vec<FieldPair>,
        parent_fields: Vec<FieldPair>,
        module: &mut MirModule,
    ) -> Result<TyIdx> {
        self.get_or_create_struct_or_union(
            StructKind::Union,
            name,
            fields,
            parent_fields,
            TypeAttrs::default(),
            module,
        )
    }

    fn get_or_create_class_or_interface(
        &self,
        kind: StructKind,
        name: &str,
        module: &mut MirModule,
    ) -> Result<TyIdx> {
        let name = self.strings.get_or_create_str_idx(name);
        let known = self
            .type_names
            .get_ty_idx_from_name(name)
            .or_else(|| module.type_name_table().get_ty_idx_from_name(name))
            .filter(|&ty| self.is_class_like(ty));
        if let Some(existing) = known {
            module.declare_type(name, existing);
            module.add_class(existing);
            return Ok(existing);
        }

        let created = self
            .types
            .get_or_create_mir_type(&MirType::Struct(MirStructType::new(kind, name)))?;
        // a concurrent declaration of the same name may have won
        let idx = self.type_names.get_or_insert(name, created);
        let idx = if self.is_class_like(idx) { idx } else { created };
        module.declare_type(name, idx);
        module.add_class(idx);
        debug!(%name, %idx, ?kind, "declared class-like type");
        Ok(idx)
    }

    fn is_class_like(&self, ty: TyIdx) -> bool {
        self.types
            .with_type(ty, |t| t.as_struct().is_some_and(|st| st.kind.is_class_like()))
            == Some(true)
    }

    /// A class starts out incomplete; see [`complete_type`](Self::complete_type).
    pub fn get_or_create_class_type(&self, name: &str, module: &mut MirModule) -> Result<TyIdx> {
        self.get_or_create_class_or_interface(StructKind::ClassIncomplete, name, module)
    }

    pub fn get_or_create_interface_type(
        &self,
        name: &str,
        module: &mut MirModule,
    ) -> Result<TyIdx> {
        self.get_or_create_class_or_interface(StructKind::InterfaceIncomplete, name, module)
    }

    /// Marks a struct-like type complete and publishes its name globally.
    pub fn complete_type(&self, ty: TyIdx) -> Result<()> {
        self.types.set_complete(ty)?;
        let name = self
            .types
            .with_type(ty, |t| t.as_struct().map(|st| st.name))
            .flatten()
            .ok_or(TypeTableError::NotStructLike(ty))?;
        self.type_names.set_ty_idx_for_name(name, ty);
        Ok(())
    }

    /// Appends a `final` field named `field_name`.
    pub fn add_field_to_struct_type(
        &self,
        struct_ty: TyIdx,
        field_name: &str,
        field_ty: TyIdx,
    ) -> Result<()> {
        let name = self.strings.get_or_create_str_idx(field_name);
        self.types.add_field_to_struct_type(
            struct_ty,
            FieldPair {
                name,
                ty: field_ty,
                attrs: FieldAttrs::FINAL,
            },
        )
    }
}
