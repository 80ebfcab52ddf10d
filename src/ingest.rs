//! Parallel ingestion of sequencing reads into a [`CountingTable`].
//!
//! Reads from every input file are chained in order and bridged onto a
//! dedicated rayon pool. The bridge serializes pulls from the underlying
//! readers, so a file is parsed by one worker at a time, while every worker
//! increments the shared table concurrently. Once the pool drains the table
//! is frozen exactly once and handed back together with an [`IngestSummary`].
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use kmercov::{ingest::Ingestor, kmer::{Kmer, KmerLength}, table::TableConfig};
//!
//! let k = KmerLength::new(4)?;
//! let (table, summary) = Ingestor::new(k, TableConfig::new(64))
//!     .count_sequences([Bytes::from_static(b"ACGTACGT")])?;
//!
//! assert_eq!(table.get(Kmer::encode(b"ACGT")?), 2);
//! assert_eq!(summary.counted_windows, 5);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::Path;

use bytes::Bytes;
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use tracing::{info, info_span, warn};

use crate::{
    error::{KmerCovError, TableError},
    kmer::KmerLength,
    progress::ProgressTracker,
    reader::{open_reads, ReadRecords},
    table::{CountingTable, FrozenTable, TableConfig},
    window::{window_count, Kmers},
};

/// Starting size for [`count_sequences`]; the table grows as needed.
const SMALL_TABLE: usize = 1 << 10;

/// What happened during one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub sequences: u64,
    pub bases: u64,
    /// Windows encoded and added to the table.
    pub counted_windows: u64,
    /// Windows dropped because they contain a base outside `ACGT`.
    pub skipped_windows: u64,
    /// Records that failed to parse or carried no sequence.
    pub skipped_records: u64,
    /// Slot count of the frozen table.
    pub capacity: usize,
    pub resizes: usize,
}

/// Drives the window extractor and encoder over a stream of reads.
#[derive(Debug, Clone, Copy)]
pub struct Ingestor {
    k: KmerLength,
    canonical: bool,
    threads: usize,
    table: TableConfig,
}

impl Ingestor {
    /// An ingestor counting forward k-mers on a single thread.
    pub const fn new(k: KmerLength, table: TableConfig) -> Self {
        Self {
            k,
            canonical: false,
            threads: 1,
            table,
        }
    }

    /// Count each k-mer and its reverse complement under one key.
    #[must_use]
    pub const fn canonical(mut self, canonical: bool) -> Self {
        self.canonical = canonical;
        self
    }

    /// Worker count; zero is treated as one.
    #[must_use]
    pub const fn threads(mut self, threads: usize) -> Self {
        self.threads = if threads == 0 { 1 } else { threads };
        self
    }

    pub const fn k(&self) -> KmerLength {
        self.k
    }

    pub const fn is_canonical(&self) -> bool {
        self.canonical
    }

    /// Counts every read of every file in `paths` on a pool of
    /// [`threads`](Self::threads) workers.
    ///
    /// All files are opened before any counting starts.
    pub fn count_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
    ) -> Result<(FrozenTable, IngestSummary), KmerCovError> {
        let sources = open_reads(paths)?;
        self.ingest_files(&worker_pool(self.threads)?, sources)
    }

    /// Like [`count_files`](Self::count_files), but on an existing pool that
    /// the caller can reuse afterwards, e.g. for the coverage pass.
    pub fn count_files_in<P: AsRef<Path>>(
        &self,
        pool: &ThreadPool,
        paths: &[P],
    ) -> Result<(FrozenTable, IngestSummary), KmerCovError> {
        let sources = open_reads(paths)?;
        self.ingest_files(pool, sources)
    }

    fn ingest_files(
        &self,
        pool: &ThreadPool,
        sources: Vec<ReadRecords>,
    ) -> Result<(FrozenTable, IngestSummary), KmerCovError> {
        info!(files = sources.len(), "Opened reads files");
        self.ingest(pool, sources.into_iter().flatten())
    }

    /// Counts in-memory sequences.
    pub fn count_sequences<I>(&self, sequences: I) -> Result<(FrozenTable, IngestSummary), KmerCovError>
    where
        I: IntoIterator<Item = Bytes>,
        I::IntoIter: Send,
    {
        self.count_sequences_in(&worker_pool(self.threads)?, sequences)
    }

    /// Counts in-memory sequences on an existing pool.
    pub fn count_sequences_in<I>(
        &self,
        pool: &ThreadPool,
        sequences: I,
    ) -> Result<(FrozenTable, IngestSummary), KmerCovError>
    where
        I: IntoIterator<Item = Bytes>,
        I::IntoIter: Send,
    {
        self.ingest(pool, sequences.into_iter().map(Ok))
    }

    fn ingest<I>(&self, pool: &ThreadPool, records: I) -> Result<(FrozenTable, IngestSummary), KmerCovError>
    where
        I: Iterator<Item = Result<Bytes, KmerCovError>> + Send,
    {
        let _span = info_span!(
            "ingest",
            k = self.k.get(),
            canonical = self.canonical,
            threads = pool.current_num_threads()
        )
        .entered();

        let table = CountingTable::new(self.table)?;
        let tracker = ProgressTracker::new();

        pool.install(|| {
            records
                .par_bridge()
                .try_for_each(|record| self.ingest_record(&table, &tracker, record))
        })?;

        // All workers have joined; the write phase ends here.
        let table = table.mark_done();
        let progress = tracker.snapshot();
        let summary = IngestSummary {
            sequences: progress.sequences_processed,
            bases: progress.bases_processed,
            counted_windows: progress.kmers_counted,
            skipped_windows: progress.windows_skipped,
            skipped_records: progress.records_skipped,
            capacity: table.capacity(),
            resizes: table.resizes(),
        };

        info!(
            sequences = summary.sequences,
            distinct = table.len(),
            counted = summary.counted_windows,
            skipped_windows = summary.skipped_windows,
            skipped_records = summary.skipped_records,
            capacity = summary.capacity,
            resizes = summary.resizes,
            "Ingestion complete"
        );
        Ok((table, summary))
    }

    fn ingest_record(
        &self,
        table: &CountingTable,
        tracker: &ProgressTracker,
        record: Result<Bytes, KmerCovError>,
    ) -> Result<(), TableError> {
        let seq = match record {
            Ok(seq) if !seq.is_empty() => seq,
            Ok(_) => {
                warn!("Skipping record with an empty sequence");
                tracker.record_skipped();
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed record");
                tracker.record_skipped();
                return Ok(());
            }
        };

        let counted = table.increment_all(Kmers::new(&seq, self.k, self.canonical))?;
        tracker.record_sequence(
            seq.len() as u64,
            window_count(seq.len(), self.k) as u64,
            counted,
        );
        Ok(())
    }
}

/// A dedicated pool of `threads` workers.
pub fn worker_pool(threads: usize) -> Result<ThreadPool, KmerCovError> {
    ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("kmercov-worker-{i}"))
        .build()
        .map_err(|e| KmerCovError::ThreadPool {
            details: e.to_string(),
        })
}

/// Counts in-memory sequences on one thread, starting from a small table.
///
/// ```rust
/// use bytes::Bytes;
/// use kmercov::{ingest::count_sequences, kmer::KmerLength};
///
/// let k = KmerLength::new(3)?;
/// let table = count_sequences([Bytes::from_static(b"AAAA")], k, false)?;
/// assert_eq!(table.len(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn count_sequences<I>(sequences: I, k: KmerLength, canonical: bool) -> Result<FrozenTable, KmerCovError>
where
    I: IntoIterator<Item = Bytes>,
    I::IntoIter: Send,
{
    Ingestor::new(k, TableConfig::new(SMALL_TABLE))
        .canonical(canonical)
        .count_sequences(sequences)
        .map(|(table, _)| table)
}
