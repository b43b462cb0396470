//! MIR type representations.
//!
//! Types refer to each other by [`TyIdx`]; a type value is only meaningful
//! next to the [`super::TypeTable`] that handed out those indices.

use crate::string_table::StrIdx;
use bitflags::bitflags;
use rustc_hash::FxHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Primitive types. The discriminant is also the [`TyIdx`] of the scalar
/// type a fresh type table seeds for it; 0 is never a valid type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PrimType {
    Void = 1,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    U1,
    Ptr,
    Ref,
    A32,
    A64,
    F32,
    F64,
    F128,
    C64,
    C128,
    ConstStr,
    Agg,
    Unknown,
}

impl PrimType {
    pub const ALL: [PrimType; 24] = [
        PrimType::Void,
        PrimType::I8,
        PrimType::I16,
        PrimType::I32,
        PrimType::I64,
        PrimType::I128,
        PrimType::U8,
        PrimType::U16,
        PrimType::U32,
        PrimType::U64,
        PrimType::U128,
        PrimType::U1,
        PrimType::Ptr,
        PrimType::Ref,
        PrimType::A32,
        PrimType::A64,
        PrimType::F32,
        PrimType::F64,
        PrimType::F128,
        PrimType::C64,
        PrimType::C128,
        PrimType::ConstStr,
        PrimType::Agg,
        PrimType::Unknown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimType::Void => "void",
            PrimType::I8 => "i8",
            PrimType::I16 => "i16",
            PrimType::I32 => "i32",
            PrimType::I64 => "i64",
            PrimType::I128 => "i128",
            PrimType::U8 => "u8",
            PrimType::U16 => "u16",
            PrimType::U32 => "u32",
            PrimType::U64 => "u64",
            PrimType::U128 => "u128",
            PrimType::U1 => "u1",
            PrimType::Ptr => "ptr",
            PrimType::Ref => "ref",
            PrimType::A32 => "a32",
            PrimType::A64 => "a64",
            PrimType::F32 => "f32",
            PrimType::F64 => "f64",
            PrimType::F128 => "f128",
            PrimType::C64 => "c64",
            PrimType::C128 => "c128",
            PrimType::ConstStr => "constStr",
            PrimType::Agg => "agg",
            PrimType::Unknown => "unknown",
        }
    }

    /// Size in bits; 0 for types without a fixed size.
    pub fn bit_size(self) -> u32 {
        match self {
            PrimType::U1 => 1,
            PrimType::I8 | PrimType::U8 => 8,
            PrimType::I16 | PrimType::U16 => 16,
            PrimType::I32 | PrimType::U32 | PrimType::A32 | PrimType::F32 => 32,
            PrimType::I64
            | PrimType::U64
            | PrimType::Ptr
            | PrimType::Ref
            | PrimType::A64
            | PrimType::F64
            | PrimType::C64 => 64,
            PrimType::I128 | PrimType::U128 | PrimType::F128 | PrimType::C128 => 128,
            PrimType::Void | PrimType::ConstStr | PrimType::Agg | PrimType::Unknown => 0,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            PrimType::I8
                | PrimType::I16
                | PrimType::I32
                | PrimType::I64
                | PrimType::I128
                | PrimType::U8
                | PrimType::U16
                | PrimType::U32
                | PrimType::U64
                | PrimType::U128
                | PrimType::U1
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimType::I8 | PrimType::I16 | PrimType::I32 | PrimType::I64 | PrimType::I128
        )
    }

    /// The scalar seeded at `idx`, if `idx` is a scalar slot.
    pub fn from_ty_idx(idx: TyIdx) -> Option<PrimType> {
        idx.index()
            .checked_sub(1)
            .and_then(|i| PrimType::ALL.get(i))
            .copied()
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimType::F32 | PrimType::F64 | PrimType::F128)
    }

    pub fn is_pointer(self) -> bool {
        matches!(
            self,
            PrimType::Ptr | PrimType::Ref | PrimType::A32 | PrimType::A64
        )
    }
}

impl fmt::Display for PrimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dense index into the type table; the canonical identity of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TyIdx(pub u32);

impl TyIdx {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<PrimType> for TyIdx {
    fn from(prim: PrimType) -> Self {
        TyIdx(prim as u32)
    }
}

impl fmt::Display for TyIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<ty {}>", self.0)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeAttrFlags: u64 {
        const CONST = 1 << 0;
        const VOLATILE = 1 << 1;
        const RESTRICT = 1 << 2;
        const PACKED = 1 << 3;
        const INCOMPLETE_ARRAY = 1 << 4;
        const ABSTRACT = 1 << 5;
        const FINAL = 1 << 6;
        const PUBLIC = 1 << 7;
        const PRIVATE = 1 << 8;
        const PROTECTED = 1 << 9;
        const STATIC = 1 << 10;
        const ANNOTATION = 1 << 11;
    }
}

/// Attributes attached to pointer, array, struct and parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeAttrs {
    pub flags: TypeAttrFlags,
    /// log2(alignment) + 1; 0 means natural alignment.
    align_code: u8,
}

impl TypeAttrs {
    pub fn new(flags: TypeAttrFlags) -> Self {
        Self {
            flags,
            align_code: 0,
        }
    }

    /// No flags and natural alignment; the only attributes the pointer
    /// cache serves.
    pub fn is_default(&self) -> bool {
        *self == TypeAttrs::default()
    }

    /// # Panics
    /// Panics unless `align` is a power of two.
    pub fn set_align(&mut self, align: u32) {
        assert!(align.is_power_of_two(), "alignment {} is not a power of two", align);
        self.align_code = align.trailing_zeros() as u8 + 1;
    }

    pub fn with_align(mut self, align: u32) -> Self {
        self.set_align(align);
        self
    }

    /// Explicit alignment in bytes, 0 when natural.
    pub fn align(&self) -> u32 {
        match self.align_code {
            0 => 0,
            code => 1 << (code - 1),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldAttrs: u32 {
        const CONST = 1 << 0;
        const VOLATILE = 1 << 1;
        const FINAL = 1 << 2;
        const STATIC = 1 << 3;
        const PUBLIC = 1 << 4;
        const PRIVATE = 1 << 5;
        const PROTECTED = 1 << 6;
        const TRANSIENT = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FuncAttrs: u32 {
        const VARARGS = 1 << 0;
        const FIRSTARG_RETURN = 1 << 1;
        const STATIC = 1 << 2;
        const VIRTUAL = 1 << 3;
        const ABSTRACT = 1 << 4;
        const FINAL = 1 << 5;
        const CONSTRUCTOR = 1 << 6;
        const PUBLIC = 1 << 7;
        const PRIVATE = 1 << 8;
        const PROTECTED = 1 << 9;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldPair {
    pub name: StrIdx,
    pub ty: TyIdx,
    pub attrs: FieldAttrs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodPair {
    pub name: StrIdx,
    /// A function type.
    pub ty: TyIdx,
    pub attrs: FuncAttrs,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MirPtrType {
    pub pointed: TyIdx,
    /// `Ptr`, `Ref`, `A32` or `A64`.
    pub prim: PrimType,
    pub attrs: TypeAttrs,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MirArrayType {
    pub elem: TyIdx,
    /// Extent per dimension, outermost first.
    pub sizes: Vec<u32>,
    pub attrs: TypeAttrs,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MirFuncType {
    pub ret: TyIdx,
    pub params: Vec<TyIdx>,
    pub param_attrs: Vec<TypeAttrs>,
    pub attrs: FuncAttrs,
    pub ret_attrs: TypeAttrs,
}

impl MirFuncType {
    pub fn is_varargs(&self) -> bool {
        self.attrs.contains(FuncAttrs::VARARGS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructKind {
    Struct,
    Union,
    StructIncomplete,
    Class,
    ClassIncomplete,
    Interface,
    InterfaceIncomplete,
}

impl StructKind {
    pub fn is_incomplete(self) -> bool {
        matches!(
            self,
            StructKind::StructIncomplete
                | StructKind::ClassIncomplete
                | StructKind::InterfaceIncomplete
        )
    }

    pub fn is_class_like(self) -> bool {
        matches!(
            self,
            StructKind::Class
                | StructKind::ClassIncomplete
                | StructKind::Interface
                | StructKind::InterfaceIncomplete
        )
    }

    /// The complete counterpart of an incomplete kind.
    pub fn completed(self) -> StructKind {
        match self {
            StructKind::StructIncomplete => StructKind::Struct,
            StructKind::ClassIncomplete => StructKind::Class,
            StructKind::InterfaceIncomplete => StructKind::Interface,
            other => other,
        }
    }
}

/// Structs, unions, classes and interfaces.
///
/// Field and method vectors grow in place while the type is being filled in;
/// they are left out of the hash, so growth never moves the type to another
/// bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MirStructType {
    pub kind: StructKind,
    pub name: StrIdx,
    pub fields: Vec<FieldPair>,
    pub static_fields: Vec<FieldPair>,
    pub parent_fields: Vec<FieldPair>,
    pub methods: Vec<MethodPair>,
    /// Superclass of a class.
    pub parent: Option<TyIdx>,
    pub interfaces: Vec<TyIdx>,
    pub attrs: TypeAttrs,
}

impl MirStructType {
    pub fn new(kind: StructKind, name: StrIdx) -> Self {
        Self {
            kind,
            name,
            fields: Vec::new(),
            static_fields: Vec::new(),
            parent_fields: Vec::new(),
            methods: Vec::new(),
            parent: None,
            interfaces: Vec::new(),
            attrs: TypeAttrs::default(),
        }
    }

    pub fn field(&self, name: StrIdx) -> Option<&FieldPair> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MirGenericInstantType {
    pub generic: TyIdx,
    /// (type parameter, argument) pairs.
    pub instant: Vec<(TyIdx, TyIdx)>,
}

/// Coarse classification of a [`MirType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirTypeKind {
    Scalar,
    BitField,
    Array,
    FArray,
    JArray,
    Struct,
    Union,
    StructIncomplete,
    Class,
    ClassIncomplete,
    Interface,
    InterfaceIncomplete,
    ConstString,
    Pointer,
    Function,
    ByName,
    Param,
    GenericInstant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MirType {
    Scalar(PrimType),
    BitField { prim: PrimType, field_size: u8 },
    Pointer(MirPtrType),
    Array(MirArrayType),
    /// Flexible array of unknown length.
    FArray { elem: TyIdx },
    /// Managed array with a length header.
    JArray { elem: TyIdx },
    Struct(MirStructType),
    Function(MirFuncType),
    /// Reference to a type by name, resolved later.
    ByName { name: StrIdx },
    TypeParam { name: StrIdx },
    GenericInstant(MirGenericInstantType),
}

impl MirType {
    pub fn kind(&self) -> MirTypeKind {
        match self {
            MirType::Scalar(PrimType::ConstStr) => MirTypeKind::ConstString,
            MirType::Scalar(_) => MirTypeKind::Scalar,
            MirType::BitField { .. } => MirTypeKind::BitField,
            MirType::Pointer(_) => MirTypeKind::Pointer,
            MirType::Array(_) => MirTypeKind::Array,
            MirType::FArray { .. } => MirTypeKind::FArray,
            MirType::JArray { .. } => MirTypeKind::JArray,
            MirType::Struct(st) => match st.kind {
                StructKind::Struct => MirTypeKind::Struct,
                StructKind::Union => MirTypeKind::Union,
                StructKind::StructIncomplete => MirTypeKind::StructIncomplete,
                StructKind::Class => MirTypeKind::Class,
                StructKind::ClassIncomplete => MirTypeKind::ClassIncomplete,
                StructKind::Interface => MirTypeKind::Interface,
                StructKind::InterfaceIncomplete => MirTypeKind::InterfaceIncomplete,
            },
            MirType::Function(_) => MirTypeKind::Function,
            MirType::ByName { .. } => MirTypeKind::ByName,
            MirType::TypeParam { .. } => MirTypeKind::Param,
            MirType::GenericInstant(_) => MirTypeKind::GenericInstant,
        }
    }

    pub fn prim_type(&self) -> PrimType {
        match self {
            MirType::Scalar(prim) | MirType::BitField { prim, .. } => *prim,
            MirType::Pointer(ptr) => ptr.prim,
            MirType::Array(_)
            | MirType::FArray { .. }
            | MirType::JArray { .. }
            | MirType::Struct(_) => PrimType::Agg,
            MirType::Function(_) => PrimType::Ptr,
            MirType::ByName { .. } | MirType::TypeParam { .. } | MirType::GenericInstant(_) => {
                PrimType::Unknown
            }
        }
    }

    pub fn is_struct_like(&self) -> bool {
        matches!(self, MirType::Struct(_))
    }

    pub fn as_struct(&self) -> Option<&MirStructType> {
        match self {
            MirType::Struct(st) => Some(st),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&MirPtrType> {
        match self {
            MirType::Pointer(ptr) => Some(ptr),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&MirFuncType> {
        match self {
            MirType::Function(func) => Some(func),
            _ => None,
        }
    }

    /// Hash used by the type table's buckets.
    ///
    /// Struct-like types hash only their kind, name and attributes.
    pub fn type_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        std::mem::discriminant(self).hash(&mut hasher);
        match self {
            MirType::Struct(st) => {
                st.kind.hash(&mut hasher);
                st.name.hash(&mut hasher);
                st.attrs.hash(&mut hasher);
            }
            other => other.hash(&mut hasher),
        }
        hasher.finish()
    }

    /// Every type index this type refers to directly.
    pub fn referenced_types(&self) -> Vec<TyIdx> {
        match self {
            MirType::Scalar(_)
            | MirType::BitField { .. }
            | MirType::ByName { .. }
            | MirType::TypeParam { .. } => Vec::new(),
            MirType::Pointer(ptr) => vec![ptr.pointed],
            MirType::Array(arr) => vec![arr.elem],
            MirType::FArray { elem } | MirType::JArray { elem } => vec![*elem],
            MirType::Struct(st) => st
                .fields
                .iter()
                .chain(&st.static_fields)
                .chain(&st.parent_fields)
                .map(|f| f.ty)
                .chain(st.methods.iter().map(|m| m.ty))
                .chain(st.parent)
                .chain(st.interfaces.iter().copied())
                .collect(),
            MirType::Function(func) => std::iter::once(func.ret)
                .chain(func.params.iter().copied())
                .collect(),
            MirType::GenericInstant(gi) => std::iter::once(gi.generic)
                .chain(gi.instant.iter().flat_map(|&(p, a)| [p, a]))
                .collect(),
        }
    }
}
