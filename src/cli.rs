//! Command-line interface definition.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::{
    coverage::DEFAULT_PRECISION,
    kmer::{MAX_K, MIN_K},
    score::ScoreMethod,
    table::{DEFAULT_COUNTER_BITS, DEFAULT_MAX_REPROBE},
};

/// Concurrent k-mer counting and per-gene k-mer coverage for DNA reads.
#[derive(Parser, Debug)]
#[command(name = "kmercov")]
#[command(version, author, about, long_about = None)]
pub struct Cli {
    /// Log progress to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Count k-mers in reads, then report the coverage of each gene
    Count(CountArgs),
    /// Collapse binary coverage profiles into a gene-by-sample table
    Score(ScoreArgs),
    /// Print a binary coverage profile as text
    Dump(DumpArgs),
}

#[derive(Args, Debug)]
pub struct CountArgs {
    /// K-mer length (1-32)
    #[arg(short = 'k', long = "kmer-length", value_parser = parse_k)]
    pub k: usize,

    /// Count each k-mer together with its reverse complement
    #[arg(short = 'C', long)]
    pub canonical: bool,

    /// Initial hash table size; accepts k, M and G suffixes
    #[arg(short, long, value_parser = parse_size)]
    pub size: usize,

    /// Number of worker threads
    #[arg(short, long, default_value_t = 1)]
    pub threads: usize,

    /// Print distinct, max and total k-mer counts to stderr
    #[arg(long)]
    pub stats: bool,

    /// Width in bits of the in-table counters
    #[arg(long, default_value_t = DEFAULT_COUNTER_BITS)]
    pub counter_bits: u32,

    /// Extra slots tried before the table grows
    #[arg(long, default_value_t = DEFAULT_MAX_REPROBE)]
    pub max_reprobe: usize,

    /// Hash table size that may not be exceeded
    #[arg(long, value_parser = parse_size)]
    pub max_size: Option<usize>,

    /// FASTA file of genes to report coverage for
    #[arg(short, long)]
    pub genes: PathBuf,

    /// Output file (default: stdout); never overwritten
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write per-position counts as binary records instead of means
    #[arg(short, long, conflicts_with_all = ["precision", "with_names"])]
    pub binary: bool,

    /// Decimals in text output
    #[arg(short, long, default_value_t = DEFAULT_PRECISION)]
    pub precision: usize,

    /// Prefix each text line with the gene id
    #[arg(long)]
    pub with_names: bool,

    /// FASTA or FASTQ read files
    #[arg(required = true)]
    pub reads: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Scoring method
    #[arg(short, long, value_enum)]
    pub method: ScoreMethod,

    /// FASTA file of the genes the profiles were computed for
    #[arg(short, long)]
    pub genes: PathBuf,

    /// Drop the first N positions of each gene
    #[arg(long, default_value_t = 0)]
    pub left_trim: usize,

    /// Drop the last N positions of each gene
    #[arg(long, default_value_t = 0)]
    pub right_trim: usize,

    /// Treat counts below this value as 0
    #[arg(long)]
    pub min: Option<u32>,

    /// Treat counts above this value as 0
    #[arg(long)]
    pub max: Option<u32>,

    /// Output file (default: stdout); never overwritten
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Binary profiles written by `count --binary`
    #[arg(required = true)]
    pub profiles: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Binary profile written by `count --binary`
    pub profile: PathBuf,
}

fn parse_k(s: &str) -> Result<usize, String> {
    let k: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if k < usize::from(MIN_K) || k > usize::from(MAX_K) {
        return Err(format!(
            "k-mer length must be between {MIN_K} and {MAX_K}"
        ));
    }
    Ok(k)
}

/// Parses sizes such as `1000`, `64k`, `100M` or `2G` (powers of 1000).
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (digits, multiplier) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 1_000),
        Some((i, 'm' | 'M')) => (&s[..i], 1_000_000),
        Some((i, 'g' | 'G')) => (&s[..i], 1_000_000_000),
        _ => (s, 1),
    };
    let n: usize = digits
        .parse()
        .map_err(|_| format!("'{s}' is not a valid size"))?;
    let size = n
        .checked_mul(multiplier)
        .ok_or_else(|| format!("'{s}' is too large"))?;
    if size == 0 {
        return Err("size must be at least 1".to_string());
    }
    Ok(size)
}
