mod cli;
mod db;
mod decode;
mod dedup;
mod error;
mod extractor;
mod fmt;
mod importer;
mod models;
mod normalize;
mod session;
mod settings;
mod sniffer;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() {
    // Diagnostics go to stderr so `--json` output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Sniff {
            file,
            delimiter,
            format,
        } => cli::sniff::run(&file, delimiter, format),
        Commands::Import(args) => cli::import::run(args),
        Commands::Ledger { account } => cli::ledger::run(&account),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
