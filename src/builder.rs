//! Builder API for counting and coverage from library code.
//!
//! # Example
//!
//! ```rust,no_run
//! use kmercov::builder::KmerCounter;
//!
//! let results = KmerCounter::new()
//!     .k(21)?
//!     .canonical(true)
//!     .threads(8)
//!     .table_size(1 << 24)
//!     .coverage(&["sample_1.fq", "sample_2.fq"], "genes.fa")?;
//!
//! for (gene, coverage) in results {
//!     println!("{gene}: {:?}", coverage.value());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{io::Write, path::Path};

use bytes::Bytes;
use rayon::prelude::*;

use crate::{
    coverage::{write_coverage, Coverage, CoverageQuery, OutputMode},
    error::{BuilderError, KmerLengthError},
    ingest::{worker_pool, IngestSummary, Ingestor},
    kmer::KmerLength,
    reader::read_genes,
    table::{FrozenTable, TableConfig},
};

/// Default initial table size of the builder.
pub const DEFAULT_TABLE_SIZE: usize = 1 << 20;

/// A builder for counting runs.
///
/// Defaults: forward k-mers, one thread, a table of
/// [`DEFAULT_TABLE_SIZE`] slots with 7-bit counters and 126 reprobes.
#[derive(Debug, Clone, Copy)]
pub struct KmerCounter {
    k: Option<KmerLength>,
    canonical: bool,
    threads: usize,
    table: TableConfig,
}

impl Default for KmerCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl KmerCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            k: None,
            canonical: false,
            threads: 1,
            table: TableConfig::new(DEFAULT_TABLE_SIZE),
        }
    }

    /// Sets the k-mer length (1-32).
    ///
    /// ```rust
    /// use kmercov::builder::KmerCounter;
    ///
    /// let counter = KmerCounter::new().k(21)?;
    /// assert!(KmerCounter::new().k(33).is_err());
    /// # Ok::<(), kmercov::error::KmerLengthError>(())
    /// ```
    pub fn k(mut self, k: usize) -> Result<Self, KmerLengthError> {
        self.k = Some(KmerLength::new(k)?);
        Ok(self)
    }

    /// Sets an already validated k-mer length.
    #[must_use]
    pub const fn k_validated(mut self, k: KmerLength) -> Self {
        self.k = Some(k);
        self
    }

    #[must_use]
    pub const fn canonical(mut self, canonical: bool) -> Self {
        self.canonical = canonical;
        self
    }

    #[must_use]
    pub const fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Initial number of table slots; the table grows on demand.
    #[must_use]
    pub const fn table_size(mut self, size: usize) -> Self {
        let table = self.table;
        self.table = TableConfig::new(size)
            .counter_bits(table.get_counter_bits())
            .max_reprobe(table.get_max_reprobe())
            .max_load(table.get_max_load())
            .max_capacity(table.get_max_capacity());
        self
    }

    #[must_use]
    pub const fn counter_bits(mut self, bits: u32) -> Self {
        self.table = self.table.counter_bits(bits);
        self
    }

    #[must_use]
    pub const fn max_reprobe(mut self, reprobes: usize) -> Self {
        self.table = self.table.max_reprobe(reprobes);
        self
    }

    /// Table size that counting may not grow past.
    #[must_use]
    pub const fn max_table_size(mut self, size: Option<usize>) -> Self {
        self.table = self.table.max_capacity(size);
        self
    }

    pub const fn get_k(&self) -> Option<KmerLength> {
        self.k
    }

    pub const fn is_canonical(&self) -> bool {
        self.canonical
    }

    pub const fn get_threads(&self) -> usize {
        self.threads
    }

    pub const fn get_table_config(&self) -> TableConfig {
        self.table
    }

    fn ingestor(&self) -> Result<Ingestor, BuilderError> {
        let k = self.k.ok_or(BuilderError::KmerLengthNotSet)?;
        Ok(Ingestor::new(k, self.table)
            .canonical(self.canonical)
            .threads(self.threads))
    }

    /// Counts every read of the given FASTA/FASTQ files.
    pub fn count<P: AsRef<Path>>(
        &self,
        reads: &[P],
    ) -> Result<(FrozenTable, IngestSummary), BuilderError> {
        Ok(self.ingestor()?.count_files(reads)?)
    }

    /// Counts in-memory sequences.
    ///
    /// ```rust
    /// use bytes::Bytes;
    /// use kmercov::{builder::KmerCounter, kmer::Kmer};
    ///
    /// let table = KmerCounter::new()
    ///     .k(4)?
    ///     .table_size(64)
    ///     .count_sequences([Bytes::from_static(b"ACGTACGT")])?;
    /// assert_eq!(table.get(Kmer::encode(b"ACGT")?), 2);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn count_sequences<I>(&self, sequences: I) -> Result<FrozenTable, BuilderError>
    where
        I: IntoIterator<Item = Bytes>,
        I::IntoIter: Send,
    {
        Ok(self.ingestor()?.count_sequences(sequences)?.0)
    }

    /// Counts the reads, then returns the coverage of every gene in order.
    pub fn coverage<P, Q>(&self, reads: &[P], genes: Q) -> Result<Vec<(String, Coverage)>, BuilderError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let ingestor = self.ingestor()?;
        let pool = worker_pool(self.threads)?;
        let (table, _) = ingestor.count_files_in(&pool, reads)?;
        let genes = read_genes(genes)?;
        let query = CoverageQuery::new(&table, ingestor.k(), ingestor.is_canonical());

        let results = pool.install(|| {
            genes
                .into_par_iter()
                .map(|gene| {
                    let coverage = query.coverage(&gene.seq);
                    (gene.id, coverage)
                })
                .collect()
        });
        Ok(results)
    }

    /// Counts the reads and writes the coverage of every gene to `writer`.
    pub fn coverage_to_writer<P, Q, W>(
        &self,
        reads: &[P],
        genes: Q,
        mode: OutputMode,
        mut writer: W,
    ) -> Result<IngestSummary, BuilderError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        W: Write,
    {
        let ingestor = self.ingestor()?;
        let pool = worker_pool(self.threads)?;
        let (table, summary) = ingestor.count_files_in(&pool, reads)?;
        let genes = read_genes(genes)?;
        let query = CoverageQuery::new(&table, ingestor.k(), ingestor.is_canonical());

        write_coverage(&query, &genes, mode, &pool, &mut writer)?;
        Ok(summary)
    }
}
