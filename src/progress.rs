//! Ingestion accounting.
//!
//! Workers record every sequence they finish into a shared
//! [`ProgressTracker`]; the coordinator turns the final snapshot into the
//! ingestion summary.

use std::sync::atomic::{AtomicU64, Ordering};

/// Progress snapshot during k-mer counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Number of sequences processed so far.
    pub sequences_processed: u64,
    /// Total number of bases processed so far.
    pub bases_processed: u64,
    /// Windows that were encoded and counted.
    pub kmers_counted: u64,
    /// Windows skipped because they contain an invalid base.
    pub windows_skipped: u64,
    /// Records that could not be parsed and were skipped.
    pub records_skipped: u64,
}

/// Thread-safe progress tracker using atomic counters.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    sequences: AtomicU64,
    bases: AtomicU64,
    kmers: AtomicU64,
    skipped_windows: AtomicU64,
    skipped_records: AtomicU64,
}

impl ProgressTracker {
    /// Create a new progress tracker with zero counts.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sequences: AtomicU64::new(0),
            bases: AtomicU64::new(0),
            kmers: AtomicU64::new(0),
            skipped_windows: AtomicU64::new(0),
            skipped_records: AtomicU64::new(0),
        }
    }

    /// Record a finished sequence of `bases` bases, of which `windows`
    /// windows existed and `counted` were valid.
    pub fn record_sequence(&self, bases: u64, windows: u64, counted: u64) {
        self.sequences.fetch_add(1, Ordering::Relaxed);
        self.bases.fetch_add(bases, Ordering::Relaxed);
        self.kmers.fetch_add(counted, Ordering::Relaxed);
        self.skipped_windows
            .fetch_add(windows.saturating_sub(counted), Ordering::Relaxed);
    }

    /// Record a record that failed to parse.
    pub fn record_skipped(&self) {
        self.skipped_records.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the current progress.
    ///
    /// The returned values represent the state at a point in time and may
    /// change immediately after this call returns.
    pub fn snapshot(&self) -> Progress {
        Progress {
            sequences_processed: self.sequences.load(Ordering::Relaxed),
            bases_processed: self.bases.load(Ordering::Relaxed),
            kmers_counted: self.kmers.load(Ordering::Relaxed),
            windows_skipped: self.skipped_windows.load(Ordering::Relaxed),
            records_skipped: self.skipped_records.load(Ordering::Relaxed),
        }
    }
}
