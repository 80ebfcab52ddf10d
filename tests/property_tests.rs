//! Property-based tests using proptest.
//!
//! These check invariants of the encoder, the window extractor and the
//! counting table over generated inputs.

use bytes::Bytes;
use kmercov::{
    ingest::Ingestor,
    kmer::{Kmer, KmerLength},
    table::{CountingTable, TableConfig},
    window::{window_count, windows, Kmers},
};
use proptest::prelude::*;
use std::collections::HashMap;

/// Strategy for generating DNA sequences over `ACGT`.
fn dna_sequence(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(
        prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')],
        min_len..=max_len,
    )
}

/// Strategy for sequences that may contain `N`.
fn noisy_sequence(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(
        prop_oneof![
            4 => Just(b'A'),
            4 => Just(b'C'),
            4 => Just(b'G'),
            4 => Just(b'T'),
            1 => Just(b'N'),
        ],
        0..=max_len,
    )
}

/// Reverse complement of an upper-case DNA string.
fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match b {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            _ => b'A',
        })
        .collect()
}

/// Counts by brute force, for comparison with the table.
fn naive_counts(reads: &[Vec<u8>], k: KmerLength, canonical: bool) -> HashMap<u64, u64> {
    let mut counts = HashMap::new();
    for read in reads {
        for window in windows(read, k) {
            if let Ok(kmer) = Kmer::encode(window) {
                let kmer = if canonical { kmer.canonical(k) } else { kmer };
                *counts.entry(kmer.bits()).or_insert(0) += 1;
            }
        }
    }
    counts
}

proptest! {
    /// Encoding then unpacking returns the upper-case input.
    #[test]
    fn encode_roundtrip(seq in dna_sequence(1, 32)) {
        let k = KmerLength::new(seq.len()).unwrap();
        let kmer = Kmer::encode(&seq).unwrap();
        prop_assert_eq!(kmer.to_bytes(k), seq);
    }

    /// Bit-level reverse complement agrees with the string definition.
    #[test]
    fn reverse_complement_matches_strings(seq in dna_sequence(1, 32)) {
        let k = KmerLength::new(seq.len()).unwrap();
        let kmer = Kmer::encode(&seq).unwrap();
        let expected = Kmer::encode(&reverse_complement(&seq)).unwrap();
        prop_assert_eq!(kmer.reverse_complement(k), expected);
        prop_assert_eq!(kmer.reverse_complement(k).reverse_complement(k), kmer);
    }

    /// canonical(canonical(s)) == canonical(s) and
    /// canonical(s) == canonical(revcomp(s)).
    #[test]
    fn canonical_idempotent_and_symmetric(seq in dna_sequence(1, 32)) {
        let k = KmerLength::new(seq.len()).unwrap();
        let kmer = Kmer::encode(&seq).unwrap();
        let canonical = kmer.canonical(k);
        prop_assert_eq!(canonical.canonical(k), canonical);
        prop_assert_eq!(kmer.reverse_complement(k).canonical(k), canonical);
        // Numeric order is lexicographic order.
        let text = canonical.to_bytes(k);
        prop_assert!(text <= seq);
        prop_assert!(text <= reverse_complement(&seq));
    }

    /// A sequence of length L yields max(0, L - k + 1) windows.
    #[test]
    fn window_count_is_clamped(len in 0usize..100, k in 1usize..=32) {
        let seq = vec![b'A'; len];
        let k = KmerLength::new(k).unwrap();
        let expected = (len + 1).saturating_sub(k.get());
        prop_assert_eq!(windows(&seq, k).count(), expected);
        prop_assert_eq!(window_count(len, k), expected);
    }

    /// The rolling encoder agrees with encoding each window separately.
    #[test]
    fn rolling_encoder_matches_windows(seq in noisy_sequence(120), k in 1usize..=32, canonical: bool) {
        let k = KmerLength::new(k).unwrap();
        let rolled: Vec<_> = Kmers::new(&seq, k, canonical).collect();
        let encoded: Vec<_> = windows(&seq, k)
            .filter_map(|w| Kmer::encode(w).ok())
            .map(|kmer| if canonical { kmer.canonical(k) } else { kmer })
            .collect();
        prop_assert_eq!(rolled, encoded);
    }

    /// Inserting a key with a total of N returns exactly N, across the
    /// counter saturation threshold.
    #[test]
    fn overflow_roundtrip(bits in 1u32..=8, deltas in proptest::collection::vec(1u64..300, 1..40)) {
        let table = CountingTable::new(TableConfig::new(4).counter_bits(bits)).unwrap();
        let kmer = Kmer::from_bits(42);
        for &delta in &deltas {
            table.increment(kmer, delta).unwrap();
        }
        prop_assert_eq!(table.mark_done().lookup(kmer), Some(deltas.iter().sum()));
    }

    /// Parallel ingestion with resizes matches a brute-force count, whatever
    /// the interleaving.
    #[test]
    fn table_matches_naive_counts(
        reads in proptest::collection::vec(noisy_sequence(60), 1..30),
        k in 1usize..=12,
        canonical: bool,
        threads in 1usize..=4,
    ) {
        let k = KmerLength::new(k).unwrap();
        let expected = naive_counts(&reads, k, canonical);

        let sequences: Vec<Bytes> = reads.iter().cloned().map(Bytes::from).collect();
        let (table, summary) = Ingestor::new(k, TableConfig::new(2).counter_bits(2))
            .canonical(canonical)
            .threads(threads)
            .count_sequences(sequences)
            .unwrap();

        prop_assert_eq!(table.len(), expected.len());
        prop_assert_eq!(summary.counted_windows, expected.values().sum::<u64>());
        for (&bits, &count) in &expected {
            prop_assert_eq!(table.lookup(Kmer::from_bits(bits)), Some(count));
        }
    }
}
