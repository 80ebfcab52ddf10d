//! Summary statistics over a finished counting table.
//!
//! # Example
//!
//! ```rust
//! use kmercov::stats::TableStats;
//!
//! let stats = TableStats::from_counts([5, 1, 1, 3]);
//! assert_eq!(stats.distinct, 4);
//! assert_eq!(stats.max, 5);
//! assert_eq!(stats.total, 10);
//! ```

use std::fmt;

/// Distinct key count, largest count and sum of counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Number of distinct k-mers.
    pub distinct: u64,
    /// Largest count of any single k-mer.
    pub max: u64,
    /// Total k-mer occurrences (sum of all counts).
    pub total: u64,
}

impl TableStats {
    /// Accumulates statistics in a single pass.
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        counts
            .into_iter()
            .fold(Self::default(), |stats, count| Self {
                distinct: stats.distinct + 1,
                max: stats.max.max(count),
                total: stats.total + count,
            })
    }

    /// Average count per distinct k-mer, `0.0` for an empty table.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.distinct == 0 {
            0.0
        } else {
            self.total as f64 / self.distinct as f64
        }
    }
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "distinct:{}", self.distinct)?;
        writeln!(f, "max:{}", self.max)?;
        write!(f, "total:{}", self.total)
    }
}
