//! # kmercov
//!
//! Concurrent k-mer counting of DNA sequencing reads, followed by per-gene
//! k-mer coverage queries against the finished counts.
//!
//! Reads are split into overlapping k-mers, packed two bits per base into a
//! `u64` and counted in a [`CountingTable`](table::CountingTable): an
//! open-addressing table shared by all worker threads, with narrow in-table
//! counters, exact overflow records and on-demand doubling. Once every read
//! is consumed the table is frozen into a lock-free
//! [`FrozenTable`](table::FrozenTable) and every gene is scored as the mean
//! count of its k-mer windows.
//!
//! ## Quick Start
//!
//! ```rust
//! use bytes::Bytes;
//! use kmercov::{
//!     coverage::{Coverage, CoverageQuery},
//!     ingest::Ingestor,
//!     kmer::KmerLength,
//!     table::TableConfig,
//! };
//!
//! let k = KmerLength::new(4)?;
//! let (table, _summary) = Ingestor::new(k, TableConfig::new(1024))
//!     .threads(2)
//!     .count_sequences([Bytes::from_static(b"ACGTACGT")])?;
//!
//! let query = CoverageQuery::new(&table, k, false);
//! let Coverage::Value(mean) = query.coverage(b"ACGTACGTAC") else {
//!     unreachable!()
//! };
//! assert!((mean - 9.0 / 7.0).abs() < 1e-12);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Features
//!
//! - `gzip`: transparently decompress `.gz` reads and genes files

pub mod builder;
pub mod cli;
pub mod config;
pub mod coverage;
pub mod error;
pub mod ingest;
pub mod kmer;
pub mod profile;
pub mod progress;
pub mod reader;
pub mod run;
pub mod score;
pub mod stats;
pub mod table;
pub mod window;

#[cfg(doctest)]
#[doc = include_str!("../README.md")]
struct ReadmeDoctests;
