//! # Bitset Table — One Presence Bit per Slot
//!
//! Every component type (and every flag) owns a [`BitsetTable`]: one bit per
//! entity slot, packed into 32-bit words. Bit `i` is set when slot `i` "has"
//! that component.
//!
//! ```text
//! slot:    31 ............ 3 2 1 0 | 63 ........... 35 34 33 32
//! words:   [ 0000 ... 0000 1 0 1 1 ] [ 0000 ... 0000  0  1  0  0 ]
//!                   word 0                     word 1
//! ```
//!
//! Storing presence this way lets the query engine test 32 slots at a time
//! with a single AND, and locate the set bits inside a word with
//! `trailing_zeros`.
//!
//! The last word may be partially used when the capacity is not a multiple
//! of 32. Those padding bits are never set, and [`BitsetTable::valid_mask`]
//! tells scans which bits are real.

/// Number of slots covered by one word.
pub const WORD_BITS: usize = u32::BITS as usize;

/// Number of words needed to hold `bits` presence bits.
#[inline]
pub const fn words_for(bits: usize) -> usize {
    bits.div_ceil(WORD_BITS)
}

/// Fixed-capacity presence bitset, organized into 32-bit words.
#[derive(Clone, PartialEq, Eq)]
pub struct BitsetTable {
    words: Vec<u32>,
    len: usize,
}

impl BitsetTable {
    /// Create a table of `len` bits, all clear.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; words_for(len)],
            len,
        }
    }

    /// Create a table of `len` bits, all set. Padding bits stay clear.
    pub fn filled(len: usize) -> Self {
        let mut table = Self {
            words: vec![u32::MAX; words_for(len)],
            len,
        };
        if let Some(last) = table.words.len().checked_sub(1) {
            table.words[last] &= table.valid_mask(last);
        }
        table
    }

    /// Number of bits (slots) covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of 32-bit words.
    #[inline]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Raw word at `word_index`.
    #[inline]
    pub fn word(&self, word_index: usize) -> u32 {
        self.words[word_index]
    }

    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Mask of the bits in `word_index` that map to real slots.
    #[inline]
    pub fn valid_mask(&self, word_index: usize) -> u32 {
        let start = word_index * WORD_BITS;
        let remaining = self.len.saturating_sub(start);
        if remaining >= WORD_BITS {
            u32::MAX
        } else {
            (1u32 << remaining) - 1
        }
    }

    /// Returns `true` if every real slot in `word_index` is set.
    #[inline]
    pub fn word_is_full(&self, word_index: usize) -> bool {
        self.words[word_index] == self.valid_mask(word_index)
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.len, "bit {index} out of range {}", self.len);
        (self.words[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.len, "bit {index} out of range {}", self.len);
        self.words[index / WORD_BITS] |= 1 << (index % WORD_BITS);
    }

    #[inline]
    pub fn clear(&mut self, index: usize) {
        debug_assert!(index < self.len, "bit {index} out of range {}", self.len);
        self.words[index / WORD_BITS] &= !(1 << (index % WORD_BITS));
    }

    /// Set or clear bit `index` depending on `value`.
    #[inline]
    pub fn assign(&mut self, index: usize, value: bool) {
        if value {
            self.set(index);
        } else {
            self.clear(index);
        }
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate the indices of all set bits in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_index, &word)| {
                let base = word_index * WORD_BITS;
                let mut bits = word;
                std::iter::from_fn(move || {
                    if bits == 0 {
                        return None;
                    }
                    let tz = bits.trailing_zeros() as usize;
                    bits &= bits - 1;
                    Some(base + tz)
                })
            })
    }
}

impl std::fmt::Debug for BitsetTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitsetTable")
            .field("len", &self.len)
            .field("ones", &self.count_ones())
            .finish()
    }
}
