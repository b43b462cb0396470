//! MIR type system, constants and symbols.

pub mod consts;
pub mod enums;
pub mod module;
pub mod symbol;
pub mod type_table;
pub mod types;

pub use consts::{
    FpConstTable, IntConstTable, MirDoubleConst, MirFloat128Const, MirFloatConst, MirIntConst,
};
pub use enums::{EnumIdx, EnumTable, MirEnum};
pub use module::{MirModule, TypeNameTable};
pub use symbol::{GSymbolTable, MirSymbol, StIdx, StorageClass, SymbolKind};
pub use type_table::TypeTable;
pub use types::{
    FieldAttrs, FieldPair, FuncAttrs, MethodPair, MirArrayType, MirFuncType,
    MirGenericInstantType, MirPtrType, MirStructType, MirType, MirTypeKind, PrimType, StructKind,
    TyIdx, TypeAttrFlags, TypeAttrs,
};
