//! Direct library API tests.
//!
//! These tests call the library without going through the CLI, so they can
//! assert on table contents and summaries directly.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;

use bytes::Bytes;
use kmercov::{
    builder::KmerCounter,
    coverage::{gene_coverage, position_counts, Coverage},
    error::{BuilderError, KmerCovError},
    ingest::{count_sequences, Ingestor},
    kmer::{Kmer, KmerLength},
    reader::read_genes,
    stats::TableStats,
    table::{CountingTable, TableConfig},
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn k(n: usize) -> KmerLength {
    KmerLength::new(n).unwrap()
}

fn key(s: &str) -> Kmer {
    Kmer::encode(s.as_bytes()).unwrap()
}

#[test]
fn forward_scenario() {
    let table = count_sequences([Bytes::from_static(b"ACGTACGT")], k(4), false).unwrap();

    assert_eq!(table.lookup(key("ACGT")), Some(2));
    assert_eq!(table.lookup(key("CGTA")), Some(1));
    assert_eq!(table.lookup(key("GTAC")), Some(1));
    // ACGTACGT also contains TACG at offset 3.
    assert_eq!(table.lookup(key("TACG")), Some(1));
    assert_eq!(table.len(), 4);
}

#[test]
fn canonical_scenario_counts_palindrome_once_per_window() {
    let table = count_sequences([Bytes::from_static(b"ACGTACGT")], k(4), true).unwrap();

    assert_eq!(key("ACGT").reverse_complement(k(4)), key("ACGT"));
    assert_eq!(table.get(key("ACGT")), 2);
    assert_eq!(table.stats().total, 5);
}

#[test]
fn gene_coverage_scenario() {
    let table = count_sequences([Bytes::from_static(b"ACGTACGT")], k(4), false).unwrap();
    let counts = position_counts(&table, b"ACGTACGTAC", k(4), false);
    assert_eq!(counts, [2, 1, 1, 1, 2, 1, 1]);

    let Coverage::Value(mean) = gene_coverage(&table, b"ACGTACGTAC", k(4), false) else {
        panic!("gene is longer than k");
    };
    assert!((mean - 9.0 / 7.0).abs() < 1e-12);
}

#[test]
fn unseen_windows_contribute_zero() {
    let table = count_sequences([Bytes::from_static(b"ACGT")], k(4), false).unwrap();
    let Coverage::Value(mean) = gene_coverage(&table, b"ACGTACGTAC", k(4), false) else {
        panic!("gene is longer than k");
    };
    // Only the two ACGT windows were seen.
    assert!((mean - 2.0 / 7.0).abs() < 1e-12);
}

#[test]
fn stats_scenario() {
    let table = CountingTable::new(TableConfig::new(8)).unwrap();
    for (seq, count) in [("AAAA", 5), ("CCCC", 1), ("GGGG", 1), ("TTTT", 3)] {
        table.increment(key(seq), count).unwrap();
    }
    let stats = table.mark_done().stats();
    assert_eq!(
        stats,
        TableStats {
            distinct: 4,
            max: 5,
            total: 10
        }
    );
}

#[test]
fn count_fixture_files() {
    let (table, summary) = Ingestor::new(k(4), TableConfig::new(4))
        .threads(3)
        .count_files(&[fixture("reads.fa")])
        .unwrap();

    assert_eq!(table.get(key("ACGT")), 4);
    assert_eq!(table.get(key("GATT")), 2);
    assert_eq!(summary.sequences, 3);
    assert_eq!(summary.counted_windows, 18);
    assert_eq!(summary.skipped_windows, 5);
    assert!(summary.resizes > 0);
    assert_eq!(
        table.stats(),
        TableStats {
            distinct: 11,
            max: 4,
            total: 18
        }
    );
}

#[test]
fn count_unreadable_file_fails_before_counting() {
    let result = Ingestor::new(k(4), TableConfig::new(4))
        .count_files(&[fixture("reads.fa"), PathBuf::from("/nonexistent/more.fa")]);
    assert!(matches!(result, Err(KmerCovError::SequenceRead { .. })));
}

#[test]
fn genes_fixture_joins_wrapped_lines() {
    let genes = read_genes(fixture("genes.fa")).unwrap();
    let ids: Vec<_> = genes.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(ids, ["gene1", "gene2", "tiny"]);
    assert_eq!(genes[0].seq.as_ref(), b"ACGTACGTAC");
}

#[test]
fn builder_end_to_end() {
    let results = KmerCounter::new()
        .k(4)
        .unwrap()
        .threads(2)
        .table_size(8)
        .coverage(&[fixture("reads.fa")], fixture("genes.fa"))
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, "gene1");
    assert_eq!(results[0].1, Coverage::Value(13.0 / 7.0));
    assert_eq!(results[1].1, Coverage::Value(19.0 / 11.0));
    assert_eq!(results[2].1, Coverage::Undefined);
}

#[test]
fn builder_requires_k() {
    let result = KmerCounter::new().count_sequences([Bytes::from_static(b"ACGT")]);
    assert!(matches!(result, Err(BuilderError::KmerLengthNotSet)));
}
