//! Fixed-length bit vectors used as dataflow facts.
//!
//! Every vector taking part in one dataflow problem has the same length (the
//! number of definition positions), so the binary operations assert equal
//! lengths instead of growing.

use std::fmt;

const WORD_BITS: usize = u64::BITS as usize;

/// Dense fixed-size bit set packed into `u64` words.
///
/// Bits past `len` in the last word are kept zero so that [`BitVector::equal`]
/// is a plain word comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    words: Vec<u64>,
    len: usize,
}

impl BitVector {
    /// Allocates a vector of `n` bits, all clear.
    ///
    /// # Panics
    /// Panics if `n == 0`; callers with no facts to track must skip allocation.
    pub fn alloc(n: usize) -> Self {
        assert!(n > 0, "BitVector::alloc requires a nonzero bit count");
        Self {
            words: vec![0; n.div_ceil(WORD_BITS)],
            len: n,
        }
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sets every byte of the backing storage to `byte`.
    ///
    /// `0x00` clears everything and `0xFF` sets everything; other patterns
    /// repeat per byte. Bits beyond `len` stay zero.
    pub fn wipe_off(&mut self, byte: u8) {
        let word = u64::from_ne_bytes([byte; 8]);
        self.words.fill(word);
        self.mask_tail();
    }

    #[inline]
    pub fn set_bit(&mut self, i: usize) {
        self.check_index(i);
        self.words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
    }

    #[inline]
    pub fn clear_bit(&mut self, i: usize) {
        self.check_index(i);
        self.words[i / WORD_BITS] &= !(1u64 << (i % WORD_BITS));
    }

    #[inline]
    pub fn get_bit(&self, i: usize) -> bool {
        self.check_index(i);
        self.words[i / WORD_BITS] & (1u64 << (i % WORD_BITS)) != 0
    }

    /// `self |= other`
    pub fn or(&mut self, other: &BitVector) {
        self.check_same_len(other);
        for (dst, src) in self.words.iter_mut().zip(&other.words) {
            *dst |= *src;
        }
    }

    /// `self &= other`
    pub fn and(&mut self, other: &BitVector) {
        self.check_same_len(other);
        for (dst, src) in self.words.iter_mut().zip(&other.words) {
            *dst &= *src;
        }
    }

    /// Bitwise equality; the fixpoint "no change" test.
    pub fn equal(&self, other: &BitVector) -> bool {
        self.check_same_len(other);
        self.words == other.words
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Indices of set bits in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(wi * WORD_BITS + bit)
            })
        })
    }

    fn mask_tail(&mut self) {
        let used = self.len % WORD_BITS;
        if used != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << used) - 1;
            }
        }
    }

    #[inline]
    fn check_index(&self, i: usize) {
        assert!(
            i < self.len,
            "bit index {} out of bounds (length {})",
            i,
            self.len
        );
    }

    #[inline]
    fn check_same_len(&self, other: &BitVector) {
        assert_eq!(
            self.len, other.len,
            "bit vectors of different lengths cannot be combined"
        );
    }
}

/// Bits in index order, grouped by eight.
impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len {
            if i > 0 && i % 8 == 0 {
                f.write_str(" ")?;
            }
            f.write_str(if self.get_bit(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}
