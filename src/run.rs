//! The `count`, `score` and `dump` pipelines behind the command line.

use std::{
    fs::OpenOptions,
    io::{self, stdout, BufWriter, ErrorKind, Write},
    path::Path,
};

use tracing::{info, info_span};

use crate::{
    cli::{DumpArgs, ScoreArgs},
    config::{check_absent, check_readable, CountConfig},
    coverage::{write_coverage, CoverageQuery},
    error::KmerCovError,
    ingest::{worker_pool, IngestSummary, Ingestor},
    profile::{dump as dump_profile, ProfileReader},
    reader::{display_paths, read_gene_ids, read_genes},
    score::{score_profiles, TrimClamp},
};

/// Opens `path` for writing without ever replacing an existing file, or
/// stdout when no path is given.
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, KmerCovError> {
    let Some(path) = path else {
        return Ok(Box::new(BufWriter::new(stdout().lock())));
    };
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| match source.kind() {
            ErrorKind::AlreadyExists => KmerCovError::OutputExists {
                path: path.to_path_buf(),
            },
            _ => KmerCovError::WriteError { source },
        })?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Counts the reads, optionally reports table statistics, then writes the
/// coverage of every gene.
pub fn count(config: &CountConfig) -> Result<IngestSummary, KmerCovError> {
    info!(
        k = config.k.get(),
        canonical = config.canonical,
        threads = config.threads,
        reads = %display_paths(&config.reads),
        "Counting k-mers"
    );

    // One pool for both the counting and the coverage pass.
    let pool = worker_pool(config.threads)?;
    let (table, summary) = Ingestor::new(config.k, config.table)
        .canonical(config.canonical)
        .count_files_in(&pool, &config.reads)?;

    if config.stats {
        let _span = info_span!("stats").entered();
        let stats = table.stats();
        let mut err = io::stderr().lock();
        writeln!(err, "{stats}")?;
    }

    let genes = read_genes(&config.genes)?;
    info!(genes = genes.len(), "Computing gene coverage");

    let mut out = open_output(config.output.as_deref())?;
    let query = CoverageQuery::new(&table, config.k, config.canonical);
    write_coverage(&query, &genes, config.mode, &pool, &mut out)?;

    Ok(summary)
}

/// Scores binary profiles into a TSV table labelled by gene id.
pub fn score(args: &ScoreArgs) -> Result<(), KmerCovError> {
    check_readable(&args.genes)?;
    for path in &args.profiles {
        check_readable(path)?;
    }
    if let Some(output) = &args.output {
        check_absent(output)?;
    }

    let genes = read_gene_ids(&args.genes)?;
    let trim = TrimClamp {
        left_trim: args.left_trim,
        right_trim: args.right_trim,
        min: args.min,
        max: args.max,
    };
    let table = score_profiles(&args.profiles, genes, args.method, trim)?;

    let mut out = open_output(args.output.as_deref())?;
    table.write_tsv(&mut out)
}

/// Prints a binary profile as text.
pub fn dump(args: &DumpArgs) -> Result<(), KmerCovError> {
    let records = ProfileReader::open(&args.profile)?;
    let mut out = BufWriter::new(stdout().lock());
    match dump_profile(records, &mut out) {
        // A closed pipe (`kmercov dump x | head`) is not an error.
        Err(KmerCovError::WriteError { source }) if source.kind() == ErrorKind::BrokenPipe => Ok(()),
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{coverage::OutputMode, kmer::KmerLength, profile::read_profile, table::TableConfig};
    use std::{fs, path::PathBuf};
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = tempdir().unwrap();
        let reads = dir.path().join("reads.fa");
        let genes = dir.path().join("genes.fa");
        fs::write(&reads, ">r1\nACGTACGT\n").unwrap();
        fs::write(&genes, ">g1\nACGTACGTAC\n>g2\nAC\n").unwrap();
        (dir, reads, genes)
    }

    fn config(reads: PathBuf, genes: PathBuf, output: PathBuf, mode: OutputMode) -> CountConfig {
        CountConfig {
            k: KmerLength::new(4).unwrap(),
            canonical: false,
            threads: 2,
            table: TableConfig::new(8),
            stats: true,
            reads: vec![reads],
            genes,
            output: Some(output),
            mode,
        }
    }

    #[test]
    fn count_writes_text() {
        let (dir, reads, genes) = setup();
        let output = dir.path().join("out.txt");
        let mode = OutputMode::Text {
            precision: 4,
            with_names: false,
        };
        let summary = count(&config(reads, genes, output.clone(), mode)).unwrap();

        assert_eq!(summary.counted_windows, 5);
        assert_eq!(fs::read_to_string(output).unwrap(), "1.2857\nNaN\n");
    }

    #[test]
    fn count_writes_binary() {
        let (dir, reads, genes) = setup();
        let output = dir.path().join("out.cf");
        count(&config(reads, genes, output.clone(), OutputMode::Binary)).unwrap();

        assert_eq!(
            read_profile(&output).unwrap(),
            [vec![2, 1, 1, 1, 2, 1, 1], vec![]]
        );
    }

    #[test]
    fn count_never_overwrites() {
        let (dir, reads, genes) = setup();
        let output = dir.path().join("out.txt");
        fs::write(&output, "keep").unwrap();

        let result = count(&config(reads, genes, output.clone(), OutputMode::default()));
        assert!(matches!(result, Err(KmerCovError::OutputExists { .. })));
        assert_eq!(fs::read_to_string(output).unwrap(), "keep");
    }
}
