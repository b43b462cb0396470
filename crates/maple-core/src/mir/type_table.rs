//! Hash-consed MIR types.

use super::types::{
    FieldPair, FuncAttrs, MethodPair, MirArrayType, MirFuncType, MirGenericInstantType,
    MirPtrType, MirStructType, MirType, PrimType, TypeAttrs,
};
use super::TyIdx;
use crate::error::TypeTableError;
use crate::string_table::StrIdx;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

type Result<T> = std::result::Result<T, TypeTableError>;

struct TypeTableInner {
    /// Slot 0 is reserved and stays `None`.
    types: Vec<Option<MirType>>,
    buckets: FxHashMap<u64, Vec<TyIdx>>,
    /// pointee -> `Ptr` pointer with default attributes.
    ptr_cache: FxHashMap<TyIdx, TyIdx>,
    /// pointee -> `Ref` pointer with default attributes.
    ref_cache: FxHashMap<TyIdx, TyIdx>,
}

impl TypeTableInner {
    fn get(&self, idx: TyIdx) -> Option<&MirType> {
        self.types.get(idx.index()).and_then(Option::as_ref)
    }

    fn lookup(&self, ty: &MirType, hash: u64) -> Option<TyIdx> {
        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|&idx| self.get(idx) == Some(ty))
    }

    fn insert(&mut self, ty: MirType, hash: u64) -> TyIdx {
        let idx = TyIdx(self.types.len() as u32);
        trace!(%idx, kind = ?ty.kind(), "new type");
        self.types.push(Some(ty));
        self.buckets.entry(hash).or_default().push(idx);
        idx
    }

    fn check_exists(&self, idx: TyIdx) -> Result<()> {
        match self.get(idx) {
            Some(_) => Ok(()),
            None => Err(TypeTableError::UnknownTyIdx(idx)),
        }
    }

    fn pointer_cache(&self, prim: PrimType) -> Option<&FxHashMap<TyIdx, TyIdx>> {
        match prim {
            PrimType::Ptr => Some(&self.ptr_cache),
            PrimType::Ref => Some(&self.ref_cache),
            _ => None,
        }
    }

    fn struct_mut(&mut self, idx: TyIdx) -> Result<&mut MirStructType> {
        match self.types.get_mut(idx.index()).and_then(Option::as_mut) {
            Some(MirType::Struct(st)) => Ok(st),
            Some(_) => Err(TypeTableError::NotStructLike(idx)),
            None => Err(TypeTableError::UnknownTyIdx(idx)),
        }
    }
}

/// Every distinct MIR type, each stored once under a stable [`TyIdx`].
///
/// Lookups take the read lock. A miss takes the write lock and probes again
/// before inserting, so concurrent requests for the same type agree on one
/// index. The pointer caches only short-circuit that structural lookup.
pub struct TypeTable {
    inner: RwLock<TypeTableInner>,
    first_derived: TyIdx,
    void_ptr: TyIdx,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    /// Seeds one scalar per [`PrimType`] at the index equal to its
    /// discriminant, followed by `void*`.
    pub fn new() -> Self {
        let mut inner = TypeTableInner {
            types: vec![None],
            buckets: FxHashMap::default(),
            ptr_cache: FxHashMap::default(),
            ref_cache: FxHashMap::default(),
        };
        for prim in PrimType::ALL {
            let ty = MirType::Scalar(prim);
            let hash = ty.type_hash();
            let idx = inner.insert(ty, hash);
            debug_assert_eq!(idx, TyIdx::from(prim));
        }
        let first_derived = TyIdx(inner.types.len() as u32);

        let void = TyIdx::from(PrimType::Void);
        let void_ptr_ty = MirType::Pointer(MirPtrType {
            pointed: void,
            prim: PrimType::Ptr,
            attrs: TypeAttrs::default(),
        });
        let hash = void_ptr_ty.type_hash();
        let void_ptr = inner.insert(void_ptr_ty, hash);
        inner.ptr_cache.insert(void, void_ptr);

        Self {
            inner: RwLock::new(inner),
            first_derived,
            void_ptr,
        }
    }

    /// First index that is not a seeded primitive scalar.
    pub fn first_derived_ty_idx(&self) -> TyIdx {
        self.first_derived
    }

    pub fn void_ptr_ty_idx(&self) -> TyIdx {
        self.void_ptr
    }

    /// Number of slots, including the reserved slot 0.
    pub fn len(&self) -> usize {
        self.inner.read().types.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, idx: TyIdx) -> bool {
        self.inner.read().get(idx).is_some()
    }

    /// Returns the index of the structurally equal type, creating it if it
    /// is new.
    pub fn get_or_create_mir_type(&self, ty: &MirType) -> Result<TyIdx> {
        if let MirType::Pointer(ptr) = ty {
            return self.get_or_create_pointer(ptr);
        }
        {
            let inner = self.inner.read();
            for referenced in ty.referenced_types() {
                inner.check_exists(referenced)?;
            }
        }
        Ok(self.intern(ty))
    }

    fn intern(&self, ty: &MirType) -> TyIdx {
        let hash = ty.type_hash();
        {
            let inner = self.inner.read();
            if let Some(idx) = inner.lookup(ty, hash) {
                return idx;
            }
        }
        let mut inner = self.inner.write();
        if let Some(idx) = inner.lookup(ty, hash) {
            return idx;
        }
        inner.insert(ty.clone(), hash)
    }

    fn get_or_create_pointer(&self, ptr: &MirPtrType) -> Result<TyIdx> {
        assert!(
            ptr.prim.is_pointer(),
            "{} is not a pointer primitive",
            ptr.prim
        );
        let cacheable = ptr.attrs.is_default();
        {
            let inner = self.inner.read();
            inner.check_exists(ptr.pointed)?;
            if cacheable {
                if let Some(&idx) = inner
                    .pointer_cache(ptr.prim)
                    .and_then(|cache| cache.get(&ptr.pointed))
                {
                    return Ok(idx);
                }
            }
        }

        let mut inner = self.inner.write();
        if cacheable {
            if let Some(&idx) = inner
                .pointer_cache(ptr.prim)
                .and_then(|cache| cache.get(&ptr.pointed))
            {
                return Ok(idx);
            }
            if ptr.pointed >= self.first_derived {
                let other = match ptr.prim {
                    PrimType::Ptr => Some(PrimType::Ref),
                    PrimType::Ref => Some(PrimType::Ptr),
                    _ => None,
                };
                if let Some(other) = other {
                    let taken = inner
                        .pointer_cache(other)
                        .is_some_and(|cache| cache.contains_key(&ptr.pointed));
                    if taken {
                        return Err(TypeTableError::PointerKindConflict {
                            pointee: ptr.pointed,
                            existing: other,
                            requested: ptr.prim,
                        });
                    }
                }
            }
        }

        let ty = MirType::Pointer(ptr.clone());
        let hash = ty.type_hash();
        let idx = match inner.lookup(&ty, hash) {
            Some(idx) => idx,
            None => inner.insert(ty, hash),
        };
        if cacheable {
            match ptr.prim {
                PrimType::Ptr => {
                    inner.ptr_cache.insert(ptr.pointed, idx);
                }
                PrimType::Ref => {
                    inner.ref_cache.insert(ptr.pointed, idx);
                }
                _ => {}
            }
        }
        Ok(idx)
    }

    pub fn get_or_create_pointer_type(
        &self,
        pointed: TyIdx,
        prim: PrimType,
        attrs: TypeAttrs,
    ) -> Result<TyIdx> {
        self.get_or_create_pointer(&MirPtrType {
            pointed,
            prim,
            attrs,
        })
    }

    /// `ptr` to `pointed` with default attributes.
    pub fn pointer_to(&self, pointed: TyIdx) -> Result<TyIdx> {
        self.get_or_create_pointer_type(pointed, PrimType::Ptr, TypeAttrs::default())
    }

    pub fn get_or_create_array_type(
        &self,
        elem: TyIdx,
        sizes: &[u32],
        attrs: TypeAttrs,
    ) -> Result<TyIdx> {
        self.get_or_create_mir_type(&MirType::Array(MirArrayType {
            elem,
            sizes: sizes.to_vec(),
            attrs,
        }))
    }

    pub fn get_or_create_farray_type(&self, elem: TyIdx) -> Result<TyIdx> {
        self.get_or_create_mir_type(&MirType::FArray { elem })
    }

    pub fn get_or_create_jarray_type(&self, elem: TyIdx) -> Result<TyIdx> {
        self.get_or_create_mir_type(&MirType::JArray { elem })
    }

    /// An empty `param_attrs` gives every parameter default attributes.
    ///
    /// # Panics
    /// Panics if `param_attrs` is non-empty and its length differs from
    /// `params`.
    pub fn get_or_create_function_type(
        &self,
        ret: TyIdx,
        params: &[TyIdx],
        param_attrs: &[TypeAttrs],
        attrs: FuncAttrs,
        ret_attrs: TypeAttrs,
    ) -> Result<TyIdx> {
        let param_attrs = if param_attrs.is_empty() {
            vec![TypeAttrs::default(); params.len()]
        } else {
            assert_eq!(
                param_attrs.len(),
                params.len(),
                "one attribute set per parameter"
            );
            param_attrs.to_vec()
        };
        self.get_or_create_mir_type(&MirType::Function(MirFuncType {
            ret,
            params: params.to_vec(),
            param_attrs,
            attrs,
            ret_attrs,
        }))
    }

    /// # Panics
    /// Panics unless `prim` is an integer type at least `field_size` bits wide.
    pub fn get_or_create_bit_field_type(&self, field_size: u8, prim: PrimType) -> TyIdx {
        assert!(prim.is_integer(), "bit field of non-integer {}", prim);
        assert!(
            u32::from(field_size) <= prim.bit_size(),
            "{} bits do not fit in {}",
            field_size,
            prim
        );
        self.intern(&MirType::BitField { prim, field_size })
    }

    pub fn get_or_create_type_param(&self, name: StrIdx) -> TyIdx {
        self.intern(&MirType::TypeParam { name })
    }

    pub fn get_or_create_type_by_name(&self, name: StrIdx) -> TyIdx {
        self.intern(&MirType::ByName { name })
    }

    pub fn get_or_create_generic_instant_type(
        &self,
        generic: TyIdx,
        instant: Vec<(TyIdx, TyIdx)>,
    ) -> Result<TyIdx> {
        self.get_or_create_mir_type(&MirType::GenericInstant(MirGenericInstantType {
            generic,
            instant,
        }))
    }

    /// Clone of the type at `idx`.
    ///
    /// # Panics
    /// Panics if `idx` is not in the table.
    pub fn type_from_ty_idx(&self, idx: TyIdx) -> MirType {
        match self.inner.read().get(idx) {
            Some(ty) => ty.clone(),
            None => panic!("type index {} is not in the type table", idx),
        }
    }

    pub fn try_type(&self, idx: TyIdx) -> Option<MirType> {
        self.inner.read().get(idx).cloned()
    }

    /// Runs `f` on the type at `idx` under the read lock.
    pub fn with_type<R>(&self, idx: TyIdx, f: impl FnOnce(&MirType) -> R) -> Option<R> {
        self.inner.read().get(idx).map(f)
    }

    pub fn prim_type_of(&self, idx: TyIdx) -> Option<PrimType> {
        self.with_type(idx, MirType::prim_type)
    }

    /// The pointee of a pointer type, or `idx` itself otherwise.
    pub fn get_pointed_type_if_applicable(&self, idx: TyIdx) -> TyIdx {
        self.with_type(idx, |ty| ty.as_pointer().map(|ptr| ptr.pointed))
            .flatten()
            .unwrap_or(idx)
    }

    pub fn add_field_to_struct_type(&self, struct_ty: TyIdx, field: FieldPair) -> Result<()> {
        let mut inner = self.inner.write();
        inner.check_exists(field.ty)?;
        inner.struct_mut(struct_ty)?.fields.push(field);
        Ok(())
    }

    pub fn add_static_field(&self, struct_ty: TyIdx, field: FieldPair) -> Result<()> {
        let mut inner = self.inner.write();
        inner.check_exists(field.ty)?;
        inner.struct_mut(struct_ty)?.static_fields.push(field);
        Ok(())
    }

    pub fn add_method(&self, struct_ty: TyIdx, method: MethodPair) -> Result<()> {
        let mut inner = self.inner.write();
        inner.check_exists(method.ty)?;
        inner.struct_mut(struct_ty)?.methods.push(method);
        Ok(())
    }

    pub fn set_parent(&self, class_ty: TyIdx, parent: TyIdx) -> Result<()> {
        let mut inner = self.inner.write();
        inner.check_exists(parent)?;
        inner.struct_mut(class_ty)?.parent = Some(parent);
        Ok(())
    }

    pub fn add_interface(&self, class_ty: TyIdx, interface: TyIdx) -> Result<()> {
        let mut inner = self.inner.write();
        inner.check_exists(interface)?;
        inner.struct_mut(class_ty)?.interfaces.push(interface);
        Ok(())
    }

    /// Turns an incomplete struct, class or interface into its complete
    /// kind, moving it to the bucket of its new hash. Returns `false` if the
    /// type was already complete.
    pub fn set_complete(&self, struct_ty: TyIdx) -> Result<bool> {
        let mut inner = self.inner.write();
        let st = inner.struct_mut(struct_ty)?;
        if !st.kind.is_incomplete() {
            return Ok(false);
        }
        let old_hash = MirType::Struct(st.clone()).type_hash();
        st.kind = st.kind.completed();
        let new_hash = MirType::Struct(st.clone()).type_hash();

        if let Some(bucket) = inner.buckets.get_mut(&old_hash) {
            bucket.retain(|&idx| idx != struct_ty);
            if bucket.is_empty() {
                inner.buckets.remove(&old_hash);
            }
        }
        inner.buckets.entry(new_hash).or_default().push(struct_ty);
        trace!(idx = %struct_ty, "type completed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::types::{FieldAttrs, MirTypeKind, StructKind};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn i32_ty() -> TyIdx {
        TyIdx::from(PrimType::I32)
    }

    #[test]
    fn test_seeded_primitives() {
        let table = TypeTable::new();
        for prim in PrimType::ALL {
            assert_eq!(
                table.type_from_ty_idx(TyIdx::from(prim)),
                MirType::Scalar(prim)
            );
        }
        assert!(table.try_type(TyIdx(0)).is_none());
        assert_eq!(
            table.first_derived_ty_idx(),
            TyIdx(PrimType::ALL.len() as u32 + 1)
        );
        let void_ptr = table.void_ptr_ty_idx();
        assert_eq!(
            table.pointer_to(TyIdx::from(PrimType::Void)).unwrap(),
            void_ptr
        );
        assert_eq!(
            table.get_pointed_type_if_applicable(void_ptr),
            TyIdx::from(PrimType::Void)
        );
    }

    #[test]
    fn test_interning_is_structural() {
        let table = TypeTable::new();
        let a = table
            .get_or_create_array_type(i32_ty(), &[4, 8], TypeAttrs::default())
            .unwrap();
        let b = table
            .get_or_create_array_type(i32_ty(), &[4, 8], TypeAttrs::default())
            .unwrap();
        let c = table
            .get_or_create_array_type(i32_ty(), &[8, 4], TypeAttrs::default())
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.type_from_ty_idx(a).kind(), MirTypeKind::Array);
    }

    #[test]
    fn test_pointer_cache_agrees_with_structural_path() {
        let table = TypeTable::new();
        let via_builder = table.pointer_to(i32_ty()).unwrap();
        let via_type = table
            .get_or_create_mir_type(&MirType::Pointer(MirPtrType {
                pointed: i32_ty(),
                prim: PrimType::Ptr,
                attrs: TypeAttrs::default(),
            }))
            .unwrap();
        assert_eq!(via_builder, via_type);

        let aligned = table
            .get_or_create_pointer_type(i32_ty(), PrimType::Ptr, TypeAttrs::default().with_align(8))
            .unwrap();
        assert_ne!(aligned, via_builder);
        let aligned_again = table
            .get_or_create_pointer_type(i32_ty(), PrimType::Ptr, TypeAttrs::default().with_align(8))
            .unwrap();
        assert_eq!(aligned, aligned_again);
    }

    #[test]
    fn test_ref_and_ptr_to_primitive_coexist() {
        let table = TypeTable::new();
        let p = table.pointer_to(i32_ty()).unwrap();
        let r = table
            .get_or_create_pointer_type(i32_ty(), PrimType::Ref, TypeAttrs::default())
            .unwrap();
        assert_ne!(p, r);
    }

    #[test]
    fn test_ref_after_ptr_to_derived_type_is_rejected() {
        let table = TypeTable::new();
        let arr = table
            .get_or_create_array_type(i32_ty(), &[3], TypeAttrs::default())
            .unwrap();
        table.pointer_to(arr).unwrap();
        let err = table
            .get_or_create_pointer_type(arr, PrimType::Ref, TypeAttrs::default())
            .unwrap_err();
        assert_eq!(
            err,
            TypeTableError::PointerKindConflict {
                pointee: arr,
                existing: PrimType::Ptr,
                requested: PrimType::Ref,
            }
        );
    }

    #[test]
    fn test_unknown_reference_is_an_error() {
        let table = TypeTable::new();
        let bogus = TyIdx(10_000);
        assert_eq!(
            table.pointer_to(bogus).unwrap_err(),
            TypeTableError::UnknownTyIdx(bogus)
        );
        assert!(table.get_or_create_farray_type(bogus).is_err());
        assert!(table.get_or_create_farray_type(TyIdx(0)).is_err());
    }

    #[test]
    fn test_function_types() {
        let table = TypeTable::new();
        let f = table
            .get_or_create_function_type(
                i32_ty(),
                &[i32_ty(), TyIdx::from(PrimType::F64)],
                &[],
                FuncAttrs::empty(),
                TypeAttrs::default(),
            )
            .unwrap();
        let varargs = table
            .get_or_create_function_type(
                i32_ty(),
                &[i32_ty(), TyIdx::from(PrimType::F64)],
                &[],
                FuncAttrs::VARARGS,
                TypeAttrs::default(),
            )
            .unwrap();
        assert_ne!(f, varargs);
        let func = table.type_from_ty_idx(varargs);
        assert!(func.as_function().unwrap().is_varargs());
        assert_eq!(func.as_function().unwrap().param_attrs.len(), 2);
    }

    #[test]
    fn test_struct_growth_keeps_identity_and_lookup() {
        let table = TypeTable::new();
        let proto = MirType::Struct(MirStructType::new(StructKind::ClassIncomplete, StrIdx(9)));
        let class = table.get_or_create_mir_type(&proto).unwrap();
        table
            .add_field_to_struct_type(
                class,
                FieldPair {
                    name: StrIdx(10),
                    ty: i32_ty(),
                    attrs: FieldAttrs::FINAL,
                },
            )
            .unwrap();
        let st = table.type_from_ty_idx(class);
        assert_eq!(st.as_struct().unwrap().fields.len(), 1);

        assert!(table.set_complete(class).unwrap());
        assert!(!table.set_complete(class).unwrap());
        assert_eq!(table.type_from_ty_idx(class).kind(), MirTypeKind::Class);

        let completed = table.type_from_ty_idx(class);
        assert_eq!(table.get_or_create_mir_type(&completed).unwrap(), class);
    }

    #[test]
    fn test_struct_mutation_rejects_non_structs() {
        let table = TypeTable::new();
        let field = FieldPair {
            name: StrIdx(1),
            ty: i32_ty(),
            attrs: FieldAttrs::empty(),
        };
        assert_eq!(
            table.add_field_to_struct_type(i32_ty(), field).unwrap_err(),
            TypeTableError::NotStructLike(i32_ty())
        );
    }

    #[test]
    fn test_misc_builders() {
        let table = TypeTable::new();
        let bf = table.get_or_create_bit_field_type(3, PrimType::U8);
        assert_eq!(bf, table.get_or_create_bit_field_type(3, PrimType::U8));
        assert_eq!(table.prim_type_of(bf), Some(PrimType::U8));

        let t = table.get_or_create_type_param(StrIdx(4));
        let by_name = table.get_or_create_type_by_name(StrIdx(4));
        assert_ne!(t, by_name);

        let jarr = table.get_or_create_jarray_type(i32_ty()).unwrap();
        let generic = table
            .get_or_create_generic_instant_type(jarr, vec![(t, i32_ty())])
            .unwrap();
        assert_eq!(
            table.type_from_ty_idx(generic).kind(),
            MirTypeKind::GenericInstant
        );
    }

    #[test]
    #[should_panic(expected = "do not fit")]
    fn test_oversized_bit_field_panics() {
        TypeTable::new().get_or_create_bit_field_type(9, PrimType::U8);
    }

    #[test]
    fn test_concurrent_interning_agrees() {
        let table = Arc::new(TypeTable::new());
        let results: Vec<Vec<TyIdx>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let table = Arc::clone(&table);
                    s.spawn(move || {
                        (1..64u32)
                            .map(|n| {
                                let arr = table
                                    .get_or_create_array_type(
                                        TyIdx::from(PrimType::I64),
                                        &[n],
                                        TypeAttrs::default(),
                                    )
                                    .unwrap();
                                table.pointer_to(arr).unwrap()
                            })
                            .collect()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for other in &results[1..] {
            assert_eq!(other, &results[0]);
        }
        // 63 arrays plus 63 pointers on top of the seeded types.
        assert_eq!(
            table.len(),
            table.first_derived_ty_idx().index() + 1 + 63 * 2
        );
    }

    proptest! {
        #[test]
        fn prop_interning_is_idempotent(sizes in proptest::collection::vec(1u32..16, 1..4), align_log in 0u32..5) {
            let table = TypeTable::new();
            let attrs = TypeAttrs::default().with_align(1 << align_log);
            let first = table.get_or_create_array_type(i32_ty(), &sizes, attrs).unwrap();
            let len = table.len();
            let second = table.get_or_create_array_type(i32_ty(), &sizes, attrs).unwrap();
            prop_assert_eq!(first, second);
            prop_assert_eq!(table.len(), len);
            let ty = table.type_from_ty_idx(first);
            prop_assert_eq!(table.get_or_create_mir_type(&ty).unwrap(), first);
        }
    }
}
