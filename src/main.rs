use std::process;

use clap::Parser;
use colored::Colorize;
use kmercov::{
    cli::{Cli, Command},
    config::CountConfig,
    run,
};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Command::Count(args) => CountConfig::from_args(args).and_then(|config| {
            let summary = run::count(&config)?;
            if cli.verbose {
                eprintln!(
                    "{}: {} sequences, {} k-mers counted, {} windows and {} records skipped",
                    "done".bold(),
                    summary.sequences,
                    summary.counted_windows,
                    summary.skipped_windows,
                    summary.skipped_records
                );
            }
            Ok(())
        }),
        Command::Score(args) => run::score(args),
        Command::Dump(args) => run::dump(args),
    };

    if let Err(e) = result {
        eprintln!(
            "{}\n {}",
            "Application error:".blue().bold(),
            e.to_string().blue()
        );
        process::exit(1);
    }
}
