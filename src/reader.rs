//! Sequence file readers.
//!
//! Record boundaries and line wrapping are handled by `rust-bio`; this module
//! only picks FASTA or FASTQ, opens files (transparently decompressing `.gz`
//! with the `gzip` feature) and hands out owned sequence buffers.

use std::{
    ffi::OsStr,
    fmt,
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use bio::io::{fasta, fastq};
use bytes::Bytes;
use tracing::debug;

use crate::{coverage::Gene, error::KmerCovError};

type BoxedRead = Box<dyn Read + Send>;

/// Input sequence file format, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceFormat {
    /// `.fa`, `.fasta`, `.fna` and anything unrecognised.
    Fasta,
    /// `.fq`, `.fastq`.
    Fastq,
}

impl SequenceFormat {
    /// Detects the format of `path`, looking through a trailing `.gz`.
    ///
    /// ```
    /// use kmercov::reader::SequenceFormat;
    /// use std::path::Path;
    ///
    /// assert_eq!(SequenceFormat::detect(Path::new("reads.fastq.gz")), SequenceFormat::Fastq);
    /// assert_eq!(SequenceFormat::detect(Path::new("genes.fa")), SequenceFormat::Fasta);
    /// ```
    pub fn detect(path: &Path) -> Self {
        let lower = |ext: &OsStr| ext.to_str().map(str::to_ascii_lowercase);
        let mut ext = path.extension().and_then(lower);
        if ext.as_deref() == Some("gz") {
            ext = path
                .file_stem()
                .and_then(|stem| Path::new(stem).extension())
                .and_then(lower);
        }
        match ext.as_deref() {
            Some("fq" | "fastq") => Self::Fastq,
            _ => Self::Fasta,
        }
    }
}

impl fmt::Display for SequenceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fasta => write!(f, "fasta"),
            Self::Fastq => write!(f, "fastq"),
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

fn open(path: &Path) -> Result<BoxedRead, KmerCovError> {
    let file = File::open(path).map_err(|source| KmerCovError::SequenceRead {
        source,
        path: path.to_path_buf(),
    })?;

    if is_gzip(path) {
        #[cfg(feature = "gzip")]
        return Ok(Box::new(flate2::read::GzDecoder::new(file)));

        #[cfg(not(feature = "gzip"))]
        return Err(KmerCovError::InvalidConfig {
            details: format!(
                "'{}' is gzip compressed; rebuild with the `gzip` feature",
                path.display()
            ),
        });
    }
    Ok(Box::new(file))
}

/// Records of one reads file, yielding each sequence as an owned buffer.
pub enum ReadRecords {
    Fasta(fasta::Records<BufReader<BoxedRead>>),
    Fastq(fastq::Records<BufReader<BoxedRead>>),
}

impl ReadRecords {
    /// Opens `path`, detecting its format.
    pub fn open(path: &Path) -> Result<Self, KmerCovError> {
        let format = SequenceFormat::detect(path);
        debug!(path = %path.display(), %format, "Opening reads file");
        let reader = open(path)?;
        Ok(match format {
            SequenceFormat::Fasta => Self::Fasta(fasta::Reader::new(reader).records()),
            SequenceFormat::Fastq => Self::Fastq(fastq::Reader::new(reader).records()),
        })
    }
}

impl Iterator for ReadRecords {
    type Item = Result<Bytes, KmerCovError>;

    fn next(&mut self) -> Option<Self::Item> {
        let parse = |details: String| KmerCovError::SequenceParse { details };
        match self {
            Self::Fasta(records) => Some(
                records
                    .next()?
                    .map(|record| Bytes::copy_from_slice(record.seq()))
                    .map_err(|e| parse(e.to_string())),
            ),
            Self::Fastq(records) => Some(
                records
                    .next()?
                    .map(|record| Bytes::copy_from_slice(record.seq()))
                    .map_err(|e| parse(e.to_string())),
            ),
        }
    }
}

/// Opens every reads file up front, so an unreadable file fails before any
/// counting starts.
pub fn open_reads<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ReadRecords>, KmerCovError> {
    paths.iter().map(|path| ReadRecords::open(path.as_ref())).collect()
}

/// Reads every gene of a FASTA file, in file order.
///
/// Wrapped sequence lines are joined. A malformed record is fatal, since the
/// output must stay aligned with the gene order.
pub fn read_genes<P: AsRef<Path>>(path: P) -> Result<Vec<Gene>, KmerCovError> {
    let path = path.as_ref();
    let reader = fasta::Reader::new(open(path)?);
    reader
        .records()
        .map(|record| {
            record
                .map(|record| Gene::new(record.id(), Bytes::copy_from_slice(record.seq())))
                .map_err(|e| KmerCovError::SequenceParse {
                    details: format!("{}: {e}", path.display()),
                })
        })
        .collect()
}

/// Gene identifiers of a FASTA file, used to label profile rows.
pub fn read_gene_ids<P: AsRef<Path>>(path: P) -> Result<Vec<String>, KmerCovError> {
    Ok(read_genes(path)?.into_iter().map(|gene| gene.id).collect())
}

/// Display helper for error messages about a list of paths.
pub(crate) fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
