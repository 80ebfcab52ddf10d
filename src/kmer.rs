//! Bit-packed k-mer keys.
//!
//! A k-mer of length `k` (1-32) is packed two bits per base, most significant
//! base first, into the low `2k` bits of a `u64`:
//!
//! | base | code |
//! |------|------|
//! | A    | `00` |
//! | C    | `01` |
//! | G    | `10` |
//! | T    | `11` |
//!
//! The encoding preserves lexicographic order, so the numerically smaller of a
//! k-mer and its reverse complement is also the alphabetically smaller one.
//! Soft-masked (lower-case) bases encode like their upper-case forms.

use std::fmt;

use crate::error::{InvalidBaseError, KmerLengthError};

/// Smallest supported k-mer length.
pub const MIN_K: u8 = 1;

/// Largest supported k-mer length (a packed k-mer must fit in a `u64`).
pub const MAX_K: u8 = 32;

const INVALID: u8 = 0xFF;

/// ASCII -> 2-bit code, `INVALID` for anything outside `ACGTacgt`.
static BASE_CODES: [u8; 256] = {
    let mut table = [INVALID; 256];
    table[b'A' as usize] = 0;
    table[b'a' as usize] = 0;
    table[b'C' as usize] = 1;
    table[b'c' as usize] = 1;
    table[b'G' as usize] = 2;
    table[b'g' as usize] = 2;
    table[b'T' as usize] = 3;
    table[b't' as usize] = 3;
    table
};

const CODE_BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Returns the 2-bit code of `base`, or `None` if it is not a nucleotide.
#[inline]
pub fn encode_base(base: u8) -> Option<u64> {
    match BASE_CODES[base as usize] {
        INVALID => None,
        code => Some(u64::from(code)),
    }
}

/// A validated k-mer length in `1..=32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KmerLength(u8);

impl KmerLength {
    /// Validates `k`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kmercov::kmer::KmerLength;
    ///
    /// assert_eq!(KmerLength::new(21)?.get(), 21);
    /// assert!(KmerLength::new(0).is_err());
    /// assert!(KmerLength::new(33).is_err());
    /// # Ok::<(), kmercov::error::KmerLengthError>(())
    /// ```
    pub fn new(k: usize) -> Result<Self, KmerLengthError> {
        match u8::try_from(k) {
            Ok(k) if (MIN_K..=MAX_K).contains(&k) => Ok(Self(k)),
            _ => Err(KmerLengthError {
                k,
                min: MIN_K,
                max: MAX_K,
            }),
        }
    }

    /// The k-mer length as a `usize`.
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    /// Number of significant bits in a packed k-mer of this length.
    pub const fn bits(self) -> u32 {
        2 * self.0 as u32
    }

    /// Mask selecting the significant bits of a packed k-mer.
    pub const fn mask(self) -> u64 {
        if self.0 == MAX_K {
            u64::MAX
        } else {
            (1 << self.bits()) - 1
        }
    }
}

impl TryFrom<usize> for KmerLength {
    type Error = KmerLengthError;

    fn try_from(k: usize) -> Result<Self, Self::Error> {
        Self::new(k)
    }
}

impl fmt::Display for KmerLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A packed k-mer key.
///
/// The length is not stored in the key; operations that depend on it take a
/// [`KmerLength`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Kmer(u64);

impl Kmer {
    /// Wraps already-packed bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The packed bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Packs a window of 1-32 bases.
    ///
    /// # Errors
    ///
    /// Returns the first byte that is not one of `ACGTacgt` with its position.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kmercov::kmer::Kmer;
    ///
    /// assert_eq!(Kmer::encode(b"ACGT")?.bits(), 0b00_01_10_11);
    /// assert_eq!(Kmer::encode(b"ACNT").unwrap_err().position, 2);
    /// # Ok::<(), kmercov::error::InvalidBaseError>(())
    /// ```
    pub fn encode(window: &[u8]) -> Result<Self, InvalidBaseError> {
        debug_assert!(window.len() <= MAX_K as usize);
        window
            .iter()
            .enumerate()
            .try_fold(0u64, |packed, (position, &base)| {
                encode_base(base)
                    .map(|code| (packed << 2) | code)
                    .ok_or(InvalidBaseError { base, position })
            })
            .map(Self)
    }

    /// Reverse complement: reverse the bases and swap A<->T, C<->G.
    ///
    /// Complementing a 2-bit code is a bitwise NOT, so the whole word is
    /// inverted, its 2-bit groups reversed, and the `k` bases that end up in
    /// the high bits are shifted back down.
    #[must_use]
    pub const fn reverse_complement(self, k: KmerLength) -> Self {
        let mut x = !self.0;
        x = ((x >> 2) & 0x3333_3333_3333_3333) | ((x & 0x3333_3333_3333_3333) << 2);
        x = ((x >> 4) & 0x0F0F_0F0F_0F0F_0F0F) | ((x & 0x0F0F_0F0F_0F0F_0F0F) << 4);
        x = x.swap_bytes();
        Self(x >> (64 - k.bits()))
    }

    /// The smaller of this k-mer and its reverse complement.
    #[must_use]
    pub fn canonical(self, k: KmerLength) -> Self {
        self.min(self.reverse_complement(k))
    }

    /// Unpacks into upper-case bases.
    pub fn to_bytes(self, k: KmerLength) -> Vec<u8> {
        (0..k.get())
            .rev()
            .map(|i| CODE_BASES[((self.0 >> (2 * i)) & 0b11) as usize])
            .collect()
    }

    /// Unpacks into an upper-case DNA string.
    pub fn to_string_with(self, k: KmerLength) -> String {
        self.to_bytes(k).into_iter().map(char::from).collect()
    }
}

impl From<Kmer> for u64 {
    fn from(kmer: Kmer) -> Self {
        kmer.0
    }
}
