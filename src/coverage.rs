//! Per-gene k-mer coverage over a frozen counting table.
//!
//! Every window of a gene is encoded the same way the reads were (canonical
//! or not) and looked up. Absent keys and windows containing a base outside
//! `ACGT` contribute zero but still count towards the window total, so the
//! coverage of a gene is `sum(counts) / (len - k + 1)`.
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use kmercov::{coverage::{Coverage, CoverageQuery}, ingest::count_sequences, kmer::KmerLength};
//!
//! let k = KmerLength::new(4)?;
//! let table = count_sequences([Bytes::from_static(b"ACGTACGT")], k, false)?;
//! let query = CoverageQuery::new(&table, k, false);
//!
//! assert_eq!(query.position_counts(b"ACGTACGTAC"), [2, 1, 1, 1, 2, 1, 1]);
//! assert_eq!(query.coverage(b"ACG"), Coverage::Undefined);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{fmt, io::Write};

use bytes::Bytes;
use rayon::{prelude::*, ThreadPool};
use tracing::info_span;

use crate::{
    error::KmerCovError,
    kmer::{Kmer, KmerLength},
    profile::write_record,
    table::FrozenTable,
    window::windows,
};

/// Default number of decimals in text output.
pub const DEFAULT_PRECISION: usize = 15;

/// A named reference sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gene {
    pub id: String,
    pub seq: Bytes,
}

impl Gene {
    pub fn new(id: impl Into<String>, seq: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            seq: seq.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// Mean coverage of one gene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coverage {
    Value(f64),
    /// The gene is shorter than the k-mer length and has no windows.
    Undefined,
}

impl Coverage {
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Undefined => None,
        }
    }

    /// Formats with `precision` decimals, widened below 0.1 so that at least
    /// `precision` significant digits remain. Undefined coverage prints as
    /// `NaN`.
    pub fn display(self, precision: usize) -> impl fmt::Display {
        DisplayCoverage {
            coverage: self,
            precision,
        }
    }
}

struct DisplayCoverage {
    coverage: Coverage,
    precision: usize,
}

impl fmt::Display for DisplayCoverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.coverage {
            Coverage::Value(v) => {
                let decimals = self.precision + leading_zeros(v);
                write!(f, "{v:.decimals$}")
            }
            Coverage::Undefined => f.write_str("NaN"),
        }
    }
}

/// Zeros between the decimal point and the first significant digit of a
/// value in `(0, 0.1)`, so small means keep their significant digits.
fn leading_zeros(v: f64) -> usize {
    if v > 0.0 && v < 0.1 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let magnitude = (-v.log10().floor()) as usize;
        magnitude - 1
    } else {
        0
    }
}

/// Read-only lookups against a frozen table.
#[derive(Debug, Clone, Copy)]
pub struct CoverageQuery<'a> {
    table: &'a FrozenTable,
    k: KmerLength,
    canonical: bool,
}

impl<'a> CoverageQuery<'a> {
    /// `canonical` must match the setting the table was built with.
    pub const fn new(table: &'a FrozenTable, k: KmerLength, canonical: bool) -> Self {
        Self {
            table,
            k,
            canonical,
        }
    }

    /// The count of every window of `seq`, in position order.
    pub fn position_counts(&self, seq: &[u8]) -> Vec<u64> {
        windows(seq, self.k)
            .map(|window| {
                Kmer::encode(window).map_or(0, |kmer| {
                    let kmer = if self.canonical {
                        kmer.canonical(self.k)
                    } else {
                        kmer
                    };
                    self.table.get(kmer)
                })
            })
            .collect()
    }

    /// Mean count over the windows of `seq`.
    pub fn coverage(&self, seq: &[u8]) -> Coverage {
        mean(&self.position_counts(seq))
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(counts: &[u64]) -> Coverage {
    if counts.is_empty() {
        return Coverage::Undefined;
    }
    let sum: u128 = counts.iter().map(|&c| u128::from(c)).sum();
    Coverage::Value(sum as f64 / counts.len() as f64)
}

/// Mean coverage of a single sequence.
pub fn gene_coverage(table: &FrozenTable, seq: &[u8], k: KmerLength, canonical: bool) -> Coverage {
    CoverageQuery::new(table, k, canonical).coverage(seq)
}

/// Per-window counts of a single sequence.
pub fn position_counts(table: &FrozenTable, seq: &[u8], k: KmerLength, canonical: bool) -> Vec<u64> {
    CoverageQuery::new(table, k, canonical).position_counts(seq)
}

/// How coverage results are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One line per gene with the mean coverage.
    Text { precision: usize, with_names: bool },
    /// One binary profile record per gene.
    Binary,
}

impl Default for OutputMode {
    fn default() -> Self {
        Self::Text {
            precision: DEFAULT_PRECISION,
            with_names: false,
        }
    }
}

/// Computes every gene on `pool` and writes the results in gene order.
pub fn write_coverage<W: Write>(
    query: &CoverageQuery<'_>,
    genes: &[Gene],
    mode: OutputMode,
    pool: &ThreadPool,
    out: &mut W,
) -> Result<(), KmerCovError> {
    let _span = info_span!("coverage", genes = genes.len()).entered();

    match mode {
        OutputMode::Text {
            precision,
            with_names,
        } => {
            let results: Vec<Coverage> = pool.install(|| {
                genes
                    .par_iter()
                    .map(|gene| query.coverage(&gene.seq))
                    .collect()
            });
            for (gene, coverage) in genes.iter().zip(results) {
                if with_names {
                    write!(out, "{}\t", gene.id)?;
                }
                writeln!(out, "{}", coverage.display(precision))?;
            }
        }
        OutputMode::Binary => {
            let profiles: Vec<Vec<u64>> = pool.install(|| {
                genes
                    .par_iter()
                    .map(|gene| query.position_counts(&gene.seq))
                    .collect()
            });
            for counts in &profiles {
                write_record(out, counts)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ingest::{count_sequences, worker_pool},
        profile::ProfileReader,
    };
    use std::io::Cursor;

    fn k(n: usize) -> KmerLength {
        KmerLength::new(n).unwrap()
    }

    fn pool() -> ThreadPool {
        worker_pool(2).unwrap()
    }

    fn table(reads: &[&'static [u8]], k: KmerLength, canonical: bool) -> FrozenTable {
        count_sequences(reads.iter().map(|r| Bytes::from_static(r)), k, canonical).unwrap()
    }

    #[test]
    fn gene_mean_counts_unseen_windows_as_zero() {
        let table = table(&[b"ACGTACGT"], k(4), false);
        let coverage = gene_coverage(&table, b"ACGTACGTAC", k(4), false);
        let Coverage::Value(v) = coverage else {
            panic!("expected a value");
        };
        // ACGT:2 CGTA:1 GTAC:1 TACG:1 ACGT:2 CGTA:1 GTAC:1
        assert!((v - 9.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn unseen_window_contributes_zero() {
        let table = table(&[b"ACGTA"], k(4), false);
        assert_eq!(position_counts(&table, b"ACGTACG", k(4), false), [1, 1, 0, 0]);
    }

    #[test]
    fn invalid_windows_contribute_zero() {
        let table = table(&[b"ACGT"], k(2), false);
        assert_eq!(position_counts(&table, b"ACNGT", k(2), false), [1, 0, 0, 1]);
        assert_eq!(gene_coverage(&table, b"ACNGT", k(2), false), Coverage::Value(0.5));
    }

    #[test]
    fn canonical_lookup_matches_reverse_strand() {
        let table = table(&[b"AAAAA"], k(3), true);
        assert_eq!(position_counts(&table, b"TTTT", k(3), true), [3, 3]);
    }

    #[test]
    fn short_gene_is_undefined() {
        let table = table(&[b"ACGT"], k(4), false);
        assert_eq!(gene_coverage(&table, b"ACG", k(4), false), Coverage::Undefined);
        assert_eq!(gene_coverage(&table, b"", k(4), false), Coverage::Undefined);
        assert_eq!(Coverage::Undefined.display(3).to_string(), "NaN");
    }

    #[test]
    fn small_means_keep_significant_digits() {
        assert_eq!(Coverage::Value(2.5e-9).display(3).to_string(), "0.00000000250");
        assert_eq!(Coverage::Value(0.05).display(3).to_string(), "0.0500");
        assert_eq!(Coverage::Value(0.5).display(3).to_string(), "0.500");
        assert_eq!(Coverage::Value(0.0).display(3).to_string(), "0.000");
        assert_eq!(Coverage::Value(12.25).display(2).to_string(), "12.25");

        let tiny = Coverage::Value(1.0 / 3.0e9).display(DEFAULT_PRECISION).to_string();
        let digits = tiny.trim_start_matches(['0', '.']);
        assert_eq!(digits.len(), DEFAULT_PRECISION, "{tiny}");
    }

    #[test]
    fn text_output() {
        let table = table(&[b"ACGTACGT"], k(4), false);
        let query = CoverageQuery::new(&table, k(4), false);
        let genes = [
            Gene::new("g1", Bytes::from_static(b"ACGT")),
            Gene::new("g2", Bytes::from_static(b"AC")),
            Gene::new("g3", Bytes::from_static(b"ACGTA")),
        ];

        let mut out = Vec::new();
        let mode = OutputMode::Text {
            precision: 3,
            with_names: true,
        };
        write_coverage(&query, &genes, mode, &pool(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "g1\t2.000\ng2\tNaN\ng3\t1.500\n");
    }

    #[test]
    fn default_precision_is_fifteen() {
        let table = table(&[b"ACGT"], k(4), false);
        let query = CoverageQuery::new(&table, k(4), false);
        let genes = [Gene::new("g", Bytes::from_static(b"ACGT"))];
        let mut out = Vec::new();
        write_coverage(&query, &genes, OutputMode::default(), &pool(), &mut out).unwrap();
        assert_eq!(out, b"1.000000000000000\n");
    }

    #[test]
    fn binary_output_round_trips_through_profile_reader() {
        let table = table(&[b"ACGTACGT"], k(4), false);
        let query = CoverageQuery::new(&table, k(4), false);
        let genes = [
            Gene::new("g1", Bytes::from_static(b"ACGTACGTAC")),
            Gene::new("g2", Bytes::from_static(b"AC")),
        ];

        let mut out = Vec::new();
        write_coverage(&query, &genes, OutputMode::Binary, &pool(), &mut out).unwrap();
        let records: Vec<_> = ProfileReader::new(Cursor::new(out), "mem")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records, [vec![2, 1, 1, 1, 2, 1, 1], vec![]]);
    }
}
