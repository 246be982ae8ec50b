pub mod import;
pub mod init;
pub mod ledger;
pub mod sniff;

use clap::{Parser, Subcommand};

use crate::models::TxnType;
use crate::sniffer::{get_by_key, FormatKind};

/// Parse `ROW=VALUE` operator edits.
pub(crate) fn parse_row_assignment(s: &str) -> std::result::Result<(usize, String), String> {
    let (row, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ROW=VALUE, got {s:?}"))?;
    let row = row
        .trim()
        .parse()
        .map_err(|_| format!("invalid row index {row:?}"))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("missing value for row {row}"));
    }
    Ok((row, value.to_string()))
}

pub(crate) fn parse_row_type(s: &str) -> std::result::Result<(usize, TxnType), String> {
    let (row, value) = parse_row_assignment(s)?;
    let kind = TxnType::parse(&value)
        .ok_or_else(|| format!("unknown type {value:?} (use INGRESO, GASTO or TRASPASO)"))?;
    Ok((row, kind))
}

pub(crate) fn parse_format(s: &str) -> std::result::Result<FormatKind, String> {
    get_by_key(&s.trim().to_lowercase()).ok_or_else(|| format!("unknown format {s:?}"))
}

#[derive(Parser)]
#[command(name = "extracto", about = "Import bank statements into your ledger.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the ledger database.
    Init {
        /// Path for extracto data (default: ~/Documents/extracto)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Detect the layout of a statement file without importing it.
    Sniff {
        /// Path to CSV or XLSX statement
        file: String,
        /// CSV field delimiter (default from settings)
        #[arg(long)]
        delimiter: Option<char>,
        /// Read the file as this layout instead of detecting it (e.g. bbva)
        #[arg(long, value_parser = parse_format)]
        format: Option<FormatKind>,
    },
    /// Review a statement against the ledger and commit the selected entries.
    Import(import::ImportArgs),
    /// List ledger entries of an account.
    Ledger {
        /// Account reference
        #[arg(long)]
        account: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_row_assignment() {
        assert_eq!(parse_row_assignment("4=savings"), Ok((4, "savings".to_string())));
        assert_eq!(parse_row_assignment(" 7 = food "), Ok((7, "food".to_string())));
        assert!(parse_row_assignment("savings").is_err());
        assert!(parse_row_assignment("x=savings").is_err());
        assert!(parse_row_assignment("3=").is_err());
    }

    #[test]
    fn test_parse_row_type() {
        assert_eq!(parse_row_type("2=traspaso"), Ok((2, TxnType::Traspaso)));
        assert!(parse_row_type("2=refund").is_err());
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("BBVA"), Ok(FormatKind::Bbva));
        assert!(parse_format("monzo").is_err());
    }

    #[test]
    fn test_cli_parses_import_edits() {
        let cli = Cli::try_parse_from([
            "extracto", "import", "stmt.csv", "--account", "checking",
            "--type", "5=TRASPASO", "--dest", "5=savings", "--skip", "3", "--dry-run",
        ])
        .unwrap();
        let Commands::Import(args) = cli.command else {
            panic!("expected import command");
        };
        assert_eq!(args.account.as_deref(), Some("checking"));
        assert_eq!(args.types, vec![(5, TxnType::Traspaso)]);
        assert_eq!(args.dest, vec![(5, "savings".to_string())]);
        assert_eq!(args.skip, vec![3]);
        assert!(args.dry_run);
    }
}
