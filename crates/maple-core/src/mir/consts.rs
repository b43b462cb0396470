//! Deduplicated integer and floating-point constants.
//!
//! Equal constants are handed out as the same `Arc`, so identity comparison
//! with [`Arc::ptr_eq`] is a valid equality test.

use super::{PrimType, TyIdx};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Probe under the read lock, then re-probe and insert under the write lock.
fn get_or_insert<K, V>(
    map: &RwLock<FxHashMap<K, Arc<V>>>,
    key: K,
    make: impl FnOnce() -> V,
) -> Arc<V>
where
    K: Eq + Hash,
{
    if let Some(found) = map.read().get(&key) {
        return Arc::clone(found);
    }
    let mut map = map.write();
    Arc::clone(map.entry(key).or_insert_with(|| Arc::new(make())))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MirIntConst {
    /// Two's-complement bits, truncated to the width of `ty` and then sign-
    /// or zero-extended by its signedness.
    bits: u128,
    ty: TyIdx,
}

impl MirIntConst {
    pub fn ty(&self) -> TyIdx {
        self.ty
    }

    pub fn bits(&self) -> u128 {
        self.bits
    }

    pub fn as_i64(&self) -> i64 {
        self.bits as i64
    }

    pub fn as_i128(&self) -> i128 {
        self.bits as i128
    }

    pub fn is_zero(&self) -> bool {
        self.bits == 0
    }
}

/// Fits `bits` to the scalar width of `ty`.
///
/// Derived types (enums, by-name types) carry no width here and keep all 128
/// bits.
fn normalize_int_bits(bits: u128, ty: TyIdx) -> u128 {
    let Some(prim) = PrimType::from_ty_idx(ty) else {
        return bits;
    };
    let width = prim.bit_size();
    if prim.is_float() || width == 0 || width >= u128::BITS {
        return bits;
    }
    let shift = u128::BITS - width;
    if prim.is_signed() {
        (((bits << shift) as i128) >> shift) as u128
    } else {
        (bits << shift) >> shift
    }
}

/// Integer constants keyed by (value, type).
#[derive(Default)]
pub struct IntConstTable {
    consts: RwLock<FxHashMap<(u128, TyIdx), Arc<MirIntConst>>>,
}

impl IntConstTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_int_const(&self, value: i64, ty: TyIdx) -> Arc<MirIntConst> {
        self.get_or_create_int128_const(i128::from(value) as u128, ty)
    }

    pub fn get_or_create_int128_const(&self, bits: u128, ty: TyIdx) -> Arc<MirIntConst> {
        let bits = normalize_int_bits(bits, ty);
        get_or_insert(&self.consts, (bits, ty), || MirIntConst { bits, ty })
    }

    pub fn len(&self) -> usize {
        self.consts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.consts.read().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirFloatConst {
    pub value: f32,
}

impl MirFloatConst {
    pub fn ty(&self) -> TyIdx {
        TyIdx::from(PrimType::F32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirDoubleConst {
    pub value: f64,
}

impl MirDoubleConst {
    pub fn ty(&self) -> TyIdx {
        TyIdx::from(PrimType::F64)
    }
}

/// IEEE binary128 value as `[high, low]` 64-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirFloat128Const {
    pub words: [u64; 2],
}

const F128_SIGN: u64 = 1 << 63;
const F128_EXP_MASK: u64 = 0x7fff << 48;
const F128_HIGH_MANTISSA: u64 = (1 << 48) - 1;

impl MirFloat128Const {
    pub const NAN: MirFloat128Const = MirFloat128Const {
        words: [0x7fff_8000_0000_0000, 0],
    };
    pub const INFINITY: MirFloat128Const = MirFloat128Const {
        words: [F128_EXP_MASK, 0],
    };
    pub const NEG_INFINITY: MirFloat128Const = MirFloat128Const {
        words: [F128_SIGN | F128_EXP_MASK, 0],
    };
    pub const NEG_ZERO: MirFloat128Const = MirFloat128Const {
        words: [F128_SIGN, 0],
    };

    pub fn ty(&self) -> TyIdx {
        TyIdx::from(PrimType::F128)
    }

    fn exponent_all_ones(&self) -> bool {
        self.words[0] & F128_EXP_MASK == F128_EXP_MASK
    }

    fn mantissa_is_zero(&self) -> bool {
        self.words[0] & F128_HIGH_MANTISSA == 0 && self.words[1] == 0
    }

    pub fn is_nan(&self) -> bool {
        self.exponent_all_ones() && !self.mantissa_is_zero()
    }

    pub fn is_infinite(&self) -> bool {
        self.exponent_all_ones() && self.mantissa_is_zero()
    }

    pub fn is_sign_negative(&self) -> bool {
        self.words[0] & F128_SIGN != 0
    }
}

/// Shared instances for values that never go through the hash maps.
struct Specials<T> {
    nan: Arc<T>,
    inf: Arc<T>,
    minus_inf: Arc<T>,
    minus_zero: Arc<T>,
}

impl<T> Specials<T> {
    fn new(nan: T, inf: T, minus_inf: T, minus_zero: T) -> Self {
        Self {
            nan: Arc::new(nan),
            inf: Arc::new(inf),
            minus_inf: Arc::new(minus_inf),
            minus_zero: Arc::new(minus_zero),
        }
    }
}

/// Floating-point constants keyed by bit pattern.
///
/// Every NaN payload collapses to one NaN constant per width; infinities and
/// negative zero are fixed singletons.
pub struct FpConstTable {
    floats: RwLock<FxHashMap<u32, Arc<MirFloatConst>>>,
    doubles: RwLock<FxHashMap<u64, Arc<MirDoubleConst>>>,
    float128s: RwLock<FxHashMap<[u64; 2], Arc<MirFloat128Const>>>,
    float_specials: Specials<MirFloatConst>,
    double_specials: Specials<MirDoubleConst>,
    float128_specials: Specials<MirFloat128Const>,
}

impl Default for FpConstTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FpConstTable {
    pub fn new() -> Self {
        Self {
            floats: RwLock::default(),
            doubles: RwLock::default(),
            float128s: RwLock::default(),
            float_specials: Specials::new(
                MirFloatConst { value: f32::NAN },
                MirFloatConst {
                    value: f32::INFINITY,
                },
                MirFloatConst {
                    value: f32::NEG_INFINITY,
                },
                MirFloatConst { value: -0.0 },
            ),
            double_specials: Specials::new(
                MirDoubleConst { value: f64::NAN },
                MirDoubleConst {
                    value: f64::INFINITY,
                },
                MirDoubleConst {
                    value: f64::NEG_INFINITY,
                },
                MirDoubleConst { value: -0.0 },
            ),
            float128_specials: Specials::new(
                MirFloat128Const::NAN,
                MirFloat128Const::INFINITY,
                MirFloat128Const::NEG_INFINITY,
                MirFloat128Const::NEG_ZERO,
            ),
        }
    }

    pub fn get_or_create_float_const(&self, value: f32) -> Arc<MirFloatConst> {
        let specials = &self.float_specials;
        if value.is_nan() {
            Arc::clone(&specials.nan)
        } else if value == f32::INFINITY {
            Arc::clone(&specials.inf)
        } else if value == f32::NEG_INFINITY {
            Arc::clone(&specials.minus_inf)
        } else if value == 0.0 && value.is_sign_negative() {
            Arc::clone(&specials.minus_zero)
        } else {
            get_or_insert(&self.floats, value.to_bits(), || MirFloatConst { value })
        }
    }

    pub fn get_or_create_double_const(&self, value: f64) -> Arc<MirDoubleConst> {
        let specials = &self.double_specials;
        if value.is_nan() {
            Arc::clone(&specials.nan)
        } else if value == f64::INFINITY {
            Arc::clone(&specials.inf)
        } else if value == f64::NEG_INFINITY {
            Arc::clone(&specials.minus_inf)
        } else if value == 0.0 && value.is_sign_negative() {
            Arc::clone(&specials.minus_zero)
        } else {
            get_or_insert(&self.doubles, value.to_bits(), || MirDoubleConst { value })
        }
    }

    pub fn get_or_create_float128_const(&self, words: [u64; 2]) -> Arc<MirFloat128Const> {
        let value = MirFloat128Const { words };
        let specials = &self.float128_specials;
        if value.is_nan() {
            Arc::clone(&specials.nan)
        } else if value.is_infinite() {
            if value.is_sign_negative() {
                Arc::clone(&specials.minus_inf)
            } else {
                Arc::clone(&specials.inf)
            }
        } else if value == MirFloat128Const::NEG_ZERO {
            Arc::clone(&specials.minus_zero)
        } else {
            get_or_insert(&self.float128s, words, || value)
        }
    }

    /// Interned constants, not counting the singletons.
    pub fn len(&self) -> usize {
        self.floats.read().len() + self.doubles.read().len() + self.float128s.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_consts_dedup_by_value_and_type() {
        let table = IntConstTable::new();
        let i32_ty = TyIdx::from(PrimType::I32);
        let i64_ty = TyIdx::from(PrimType::I64);
        let a = table.get_or_create_int_const(42, i32_ty);
        let b = table.get_or_create_int_const(42, i32_ty);
        let c = table.get_or_create_int_const(42, i64_ty);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(table.len(), 2);
        assert_eq!(a.as_i64(), 42);
        assert_eq!(c.ty(), i64_ty);
    }

    #[test]
    fn test_negative_int_is_sign_extended() {
        let table = IntConstTable::new();
        let ty = TyIdx::from(PrimType::I128);
        let narrow = table.get_or_create_int_const(-1, ty);
        let wide = table.get_or_create_int128_const(u128::MAX, ty);
        assert!(Arc::ptr_eq(&narrow, &wide));
        assert_eq!(narrow.as_i128(), -1);
    }

    #[test]
    fn test_unsigned_consts_fold_to_type_width() {
        let table = IntConstTable::new();
        let u32_ty = TyIdx::from(PrimType::U32);
        let minus_one = table.get_or_create_int_const(-1, u32_ty);
        let max = table.get_or_create_int_const(0xFFFF_FFFF, u32_ty);
        assert!(Arc::ptr_eq(&minus_one, &max));
        assert_eq!(max.bits(), 0xFFFF_FFFF);

        let u8_ty = TyIdx::from(PrimType::U8);
        let wrapped = table.get_or_create_int_const(256, u8_ty);
        assert!(Arc::ptr_eq(&wrapped, &table.get_or_create_int_const(0, u8_ty)));
        assert!(wrapped.is_zero());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_signed_consts_fold_to_type_width() {
        let table = IntConstTable::new();
        let i8_ty = TyIdx::from(PrimType::I8);
        let high = table.get_or_create_int_const(0xFF, i8_ty);
        let minus_one = table.get_or_create_int_const(-1, i8_ty);
        assert!(Arc::ptr_eq(&high, &minus_one));
        assert_eq!(high.as_i64(), -1);

        let i32_ty = TyIdx::from(PrimType::I32);
        let from_u128 = table.get_or_create_int128_const(0xFFFF_FFFF, i32_ty);
        assert_eq!(from_u128.as_i64(), -1);
        assert!(Arc::ptr_eq(&from_u128, &table.get_or_create_int_const(-1, i32_ty)));

        let bit = table.get_or_create_int_const(3, TyIdx::from(PrimType::U1));
        assert_eq!(bit.bits(), 1);
    }

    #[test]
    fn test_derived_type_keeps_full_bits() {
        let table = IntConstTable::new();
        let derived = TyIdx(PrimType::ALL.len() as u32 + 5);
        let c = table.get_or_create_int_const(-1, derived);
        assert_eq!(c.bits(), u128::MAX);
    }

    #[test]
    fn test_nan_payloads_share_one_constant() {
        let table = FpConstTable::new();
        let quiet = table.get_or_create_double_const(f64::NAN);
        let payload = table.get_or_create_double_const(f64::from_bits(0x7ff0_0000_0000_0001));
        assert!(Arc::ptr_eq(&quiet, &payload));
        let f = table.get_or_create_float_const(f32::from_bits(0x7fc0_1234));
        assert!(Arc::ptr_eq(&f, &table.get_or_create_float_const(f32::NAN)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_signed_zero_and_infinities_are_distinct() {
        let table = FpConstTable::new();
        let zero = table.get_or_create_double_const(0.0);
        let neg_zero = table.get_or_create_double_const(-0.0);
        assert!(!Arc::ptr_eq(&zero, &neg_zero));
        assert!(Arc::ptr_eq(&neg_zero, &table.get_or_create_double_const(-0.0)));
        let inf = table.get_or_create_float_const(f32::INFINITY);
        let neg_inf = table.get_or_create_float_const(f32::NEG_INFINITY);
        assert!(!Arc::ptr_eq(&inf, &neg_inf));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_ordinary_floats_dedup() {
        let table = FpConstTable::new();
        let a = table.get_or_create_float_const(1.5);
        let b = table.get_or_create_float_const(1.5);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.ty(), TyIdx::from(PrimType::F32));
        let d = table.get_or_create_double_const(1.5);
        assert_eq!(d.value, 1.5);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_float128_classification() {
        let table = FpConstTable::new();
        let other_nan = table.get_or_create_float128_const([0x7fff_0000_0000_0000, 1]);
        assert!(Arc::ptr_eq(
            &other_nan,
            &table.get_or_create_float128_const(MirFloat128Const::NAN.words)
        ));
        let neg_inf = table.get_or_create_float128_const(MirFloat128Const::NEG_INFINITY.words);
        assert!(neg_inf.is_infinite() && neg_inf.is_sign_negative());
        let one = [0x3fff_0000_0000_0000, 0];
        assert!(Arc::ptr_eq(
            &table.get_or_create_float128_const(one),
            &table.get_or_create_float128_const(one)
        ));
        assert_eq!(table.len(), 1);
    }
}
