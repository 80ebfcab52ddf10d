//! Validated settings of a `count` run.
//!
//! Everything that can be rejected without touching the reads is checked
//! here, so bad arguments fail before any counting starts.

use std::{fs, path::Path, path::PathBuf};

use crate::{
    cli::CountArgs,
    coverage::OutputMode,
    error::KmerCovError,
    kmer::KmerLength,
    table::TableConfig,
};

#[derive(Debug, Clone)]
pub struct CountConfig {
    pub k: KmerLength,
    pub canonical: bool,
    pub threads: usize,
    pub table: TableConfig,
    pub stats: bool,
    pub reads: Vec<PathBuf>,
    pub genes: PathBuf,
    pub output: Option<PathBuf>,
    pub mode: OutputMode,
}

impl CountConfig {
    pub fn from_args(args: &CountArgs) -> Result<Self, KmerCovError> {
        let k = KmerLength::new(args.k)?;

        if args.threads == 0 {
            return Err(KmerCovError::InvalidConfig {
                details: "thread count must be at least 1".into(),
            });
        }

        let table = TableConfig::new(args.size)
            .counter_bits(args.counter_bits)
            .max_reprobe(args.max_reprobe)
            .max_capacity(args.max_size);
        table.validate()?;

        for path in args.reads.iter().chain(std::iter::once(&args.genes)) {
            check_readable(path)?;
        }
        if let Some(output) = &args.output {
            check_absent(output)?;
        }

        let mode = if args.binary {
            OutputMode::Binary
        } else {
            OutputMode::Text {
                precision: args.precision,
                with_names: args.with_names,
            }
        };

        Ok(Self {
            k,
            canonical: args.canonical,
            threads: args.threads,
            table,
            stats: args.stats,
            reads: args.reads.clone(),
            genes: args.genes.clone(),
            output: args.output.clone(),
            mode,
        })
    }
}

/// Fails with [`KmerCovError::SequenceRead`] unless `path` is a readable file.
pub fn check_readable(path: &Path) -> Result<(), KmerCovError> {
    fs::File::open(path)
        .map(drop)
        .map_err(|source| KmerCovError::SequenceRead {
            source,
            path: path.to_path_buf(),
        })
}

/// Fails with [`KmerCovError::OutputExists`] if `path` is already there.
pub fn check_absent(path: &Path) -> Result<(), KmerCovError> {
    if path.exists() {
        return Err(KmerCovError::OutputExists {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
