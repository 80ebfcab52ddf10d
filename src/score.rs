//! Collapsing binary profiles into one score per gene.
//!
//! Each profile record is trimmed, clamped and reduced with a
//! [`ScoreMethod`]. Scoring several profiles yields a [`ScoreTable`] with one
//! row per gene and one column per profile.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use rayon::prelude::*;
use tracing::{debug, info_span};

use crate::{error::KmerCovError, profile::ProfileReader};

/// Reduction applied to the per-position counts of a gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScoreMethod {
    /// Arithmetic mean.
    Mean,
    /// Median; the mean of the two middle values for even lengths.
    Median,
}

/// Positions dropped from each end and the range of counts kept.
///
/// Counts outside `min..=max` are replaced by zero, not removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimClamp {
    pub left_trim: usize,
    pub right_trim: usize,
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl TrimClamp {
    pub fn apply(&self, counts: &[u32]) -> Vec<u32> {
        let end = counts.len().saturating_sub(self.right_trim);
        let start = self.left_trim.min(end);
        counts[start..end]
            .iter()
            .map(|&count| {
                let below = self.min.is_some_and(|min| count < min);
                let above = self.max.is_some_and(|max| count > max);
                if below || above {
                    0
                } else {
                    count
                }
            })
            .collect()
    }
}

/// Scores one record; `NaN` when nothing is left after trimming.
#[allow(clippy::cast_precision_loss)]
pub fn score(counts: &[u32], method: ScoreMethod, trim: &TrimClamp) -> f64 {
    let mut counts = trim.apply(counts);
    if counts.is_empty() {
        return f64::NAN;
    }
    match method {
        ScoreMethod::Mean => {
            let sum: u64 = counts.iter().map(|&c| u64::from(c)).sum();
            sum as f64 / counts.len() as f64
        }
        ScoreMethod::Median => {
            counts.sort_unstable();
            let mid = counts.len() / 2;
            if counts.len() % 2 == 0 {
                (f64::from(counts[mid - 1]) + f64::from(counts[mid])) / 2.0
            } else {
                f64::from(counts[mid])
            }
        }
    }
}

/// Scores of several profiles over the same genes.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    genes: Vec<String>,
    columns: Vec<(String, Vec<f64>)>,
}

impl ScoreTable {
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    /// `(profile name, scores in gene order)` pairs in input order.
    pub fn columns(&self) -> &[(String, Vec<f64>)] {
        &self.columns
    }

    /// Writes a header row of profile names, then one row per gene.
    pub fn write_tsv<W: Write>(&self, out: &mut W) -> Result<(), KmerCovError> {
        for (name, _) in &self.columns {
            write!(out, "\t{name}")?;
        }
        writeln!(out)?;
        for (row, gene) in self.genes.iter().enumerate() {
            write!(out, "{gene}")?;
            for (_, scores) in &self.columns {
                write!(out, "\t{:?}", scores[row])?;
            }
            writeln!(out)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Column name of a profile: its file name without the extension.
pub fn profile_name(path: &Path) -> String {
    path.file_stem()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Scores every profile in `paths` against `genes`.
///
/// Every profile must hold exactly one record per gene.
pub fn score_profiles(
    paths: &[PathBuf],
    genes: Vec<String>,
    method: ScoreMethod,
    trim: TrimClamp,
) -> Result<ScoreTable, KmerCovError> {
    let _span = info_span!("score", profiles = paths.len(), genes = genes.len()).entered();

    let columns = paths
        .par_iter()
        .map(|path| {
            debug!(path = %path.display(), "Scoring profile");
            let scores = ProfileReader::open(path)?
                .map(|record| record.map(|counts| score(&counts, method, &trim)))
                .collect::<Result<Vec<_>, _>>()?;
            if scores.len() != genes.len() {
                return Err(KmerCovError::InvalidProfile {
                    details: format!(
                        "holds {} records but there are {} genes",
                        scores.len(),
                        genes.len()
                    ),
                    path: path.clone(),
                });
            }
            Ok((profile_name(path), scores))
        })
        .collect::<Result<Vec<_>, KmerCovError>>()?;

    Ok(ScoreTable { genes, columns })
}
