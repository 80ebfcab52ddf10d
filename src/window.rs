//! Sliding k-mer windows over a nucleotide sequence.
//!
//! [`Windows`] yields the raw overlapping slices (stride 1). [`Kmers`] is the
//! fused extractor and encoder used while counting: it rolls the forward and
//! reverse-complement codes one base at a time and yields a key for every
//! window made only of valid bases.
//!
//! Both iterators are `Clone`; a clone restarts from the clone point, and a
//! fresh call to [`windows`] or [`Kmers::new`] always yields the same sequence.

use std::iter::FusedIterator;

use crate::kmer::{encode_base, Kmer, KmerLength};

/// Number of windows of length `k` in a sequence of length `len`.
///
/// Clamped at zero when `len < k`.
///
/// ```rust
/// use kmercov::{kmer::KmerLength, window::window_count};
///
/// let k = KmerLength::new(4)?;
/// assert_eq!(window_count(10, k), 7);
/// assert_eq!(window_count(3, k), 0);
/// # Ok::<(), kmercov::error::KmerLengthError>(())
/// ```
pub const fn window_count(len: usize, k: KmerLength) -> usize {
    (len + 1).saturating_sub(k.get())
}

/// Overlapping windows of `k` bases.
pub fn windows(seq: &[u8], k: KmerLength) -> Windows<'_> {
    Windows {
        seq,
        k: k.get(),
        pos: 0,
    }
}

/// Iterator over the overlapping `k`-length slices of a sequence.
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    seq: &'a [u8],
    k: usize,
    pos: usize,
}

impl<'a> Iterator for Windows<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.seq.get(self.pos..self.pos + self.k)?;
        self.pos += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.seq.len() + 1).saturating_sub(self.pos + self.k);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows<'_> {}

impl FusedIterator for Windows<'_> {}

/// Rolling encoder yielding one key per valid window.
///
/// A window containing a byte outside `ACGTacgt` is skipped; counting resumes
/// with the first window that lies entirely after the offending byte.
#[derive(Debug, Clone)]
pub struct Kmers<'a> {
    seq: &'a [u8],
    k: KmerLength,
    canonical: bool,
    pos: usize,
    run: usize,
    forward: u64,
    reverse: u64,
}

impl<'a> Kmers<'a> {
    /// Keys of `seq`, canonicalized when `canonical` is set.
    pub const fn new(seq: &'a [u8], k: KmerLength, canonical: bool) -> Self {
        Self {
            seq,
            k,
            canonical,
            pos: 0,
            run: 0,
            forward: 0,
            reverse: 0,
        }
    }
}

impl Iterator for Kmers<'_> {
    type Item = Kmer;

    fn next(&mut self) -> Option<Kmer> {
        let k = self.k.get();
        let high_shift = self.k.bits() - 2;

        while let Some(&base) = self.seq.get(self.pos) {
            self.pos += 1;
            let Some(code) = encode_base(base) else {
                self.run = 0;
                continue;
            };
            self.forward = ((self.forward << 2) | code) & self.k.mask();
            self.reverse = (self.reverse >> 2) | ((0b11 ^ code) << high_shift);
            self.run += 1;

            if self.run >= k {
                let key = if self.canonical {
                    self.forward.min(self.reverse)
                } else {
                    self.forward
                };
                return Some(Kmer::from_bits(key));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.seq.len() - self.pos;
        let upper = if self.run + 1 >= self.k.get() {
            rest
        } else {
            (rest + self.run + 1).saturating_sub(self.k.get())
        };
        (0, Some(upper))
    }
}

impl FusedIterator for Kmers<'_> {}
