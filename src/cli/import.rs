use std::path::{Path, PathBuf};

use clap::Args;
use colored::Colorize;
use comfy_table::{Cell, Table};
use tracing::{info, warn};

use crate::db::{checksum_seen, get_connection, init_db, load_snapshot, ImportSource, SqliteLedger};
use crate::error::{ExtractoError, Result};
use crate::fmt::money;
use crate::importer::{compute_checksum, ingest_file, load_normalized_file, load_snapshot_file};
use crate::models::{LedgerSnapshot, TxnType};
use crate::session::ImportSession;
use crate::settings::Settings;
use crate::sniffer::FormatKind;

use super::{parse_format, parse_row_assignment, parse_row_type};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to CSV or XLSX statement
    pub file: String,
    /// FILE is a JSON list of already-normalized records, not a statement
    #[arg(long, conflicts_with_all = ["format", "delimiter"])]
    pub normalized: bool,
    /// Account the statement belongs to (default from settings)
    #[arg(long)]
    pub account: Option<String>,
    /// Compare against a JSON ledger snapshot instead of the local database
    #[arg(long)]
    pub ledger: Option<String>,
    /// CSV field delimiter (default from settings)
    #[arg(long)]
    pub delimiter: Option<char>,
    /// Read the file as this layout instead of detecting it (e.g. bbva)
    #[arg(long, value_parser = parse_format)]
    pub format: Option<FormatKind>,
    /// Select rows flagged as likely duplicates too
    #[arg(long)]
    pub include_duplicates: bool,
    /// Start from every row selected
    #[arg(long, conflicts_with = "none")]
    pub all: bool,
    /// Start from no row selected
    #[arg(long)]
    pub none: bool,
    /// Flip a row's selection
    #[arg(long = "toggle", value_name = "ROW")]
    pub toggle: Vec<usize>,
    /// Deselect a row
    #[arg(long = "skip", value_name = "ROW")]
    pub skip: Vec<usize>,
    /// Select a row
    #[arg(long = "select", value_name = "ROW")]
    pub select: Vec<usize>,
    /// Reclassify a row: ROW=INGRESO|GASTO|TRASPASO
    #[arg(long = "type", value_name = "ROW=TYPE", value_parser = parse_row_type)]
    pub types: Vec<(usize, TxnType)>,
    /// Destination account of a transfer: ROW=ACCOUNT
    #[arg(long = "dest", value_name = "ROW=ACCOUNT", value_parser = parse_row_assignment)]
    pub dest: Vec<(usize, String)>,
    /// Category of a row: ROW=CATEGORY
    #[arg(long = "category", value_name = "ROW=CATEGORY", value_parser = parse_row_assignment)]
    pub category: Vec<(usize, String)>,
    /// Build the batch but do not write it
    #[arg(long)]
    pub dry_run: bool,
    /// Print the batch as JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string()
}

fn resolve_snapshot(args: &ImportArgs, settings: &Settings, account: &str) -> Result<LedgerSnapshot> {
    if let Some(path) = &args.ledger {
        return load_snapshot_file(Path::new(path));
    }
    let path = settings.db_path();
    if !path.exists() {
        return Ok(LedgerSnapshot::default());
    }
    let conn = get_connection(&path)?;
    init_db(&conn)?;
    load_snapshot(&conn, account)
}

fn apply_edits(session: &mut ImportSession, args: &ImportArgs) -> Result<()> {
    if args.all {
        session.select_all(true);
    }
    if args.none {
        session.select_all(false);
    }
    if args.include_duplicates {
        let dups: Vec<usize> = session
            .records()
            .iter()
            .filter(|r| r.is_duplicate)
            .map(|r| r.entry.source_row_index)
            .collect();
        for row in dups {
            session.set_selected(row, true)?;
        }
    }
    for &row in &args.select {
        session.set_selected(row, true)?;
    }
    for &row in &args.skip {
        session.set_selected(row, false)?;
    }
    for &row in &args.toggle {
        session.toggle(row)?;
    }
    for (row, kind) in &args.types {
        session.set_type(*row, Some(*kind))?;
    }
    for (row, account) in &args.dest {
        session.set_destination(*row, Some(account.clone()))?;
    }
    for (row, category) in &args.category {
        session.set_category(*row, Some(category.clone()))?;
    }
    Ok(())
}

fn print_review(session: &ImportSession) {
    let mut table = Table::new();
    table.set_header(vec!["Row", "", "Date", "Description", "Amount", "Type", "Category", "Destination"]);
    for r in session.records() {
        let kind = r.effective_type();
        let amount = match kind {
            TxnType::Ingreso => money(r.entry.amount).green().to_string(),
            TxnType::Gasto => money(-r.entry.amount).red().to_string(),
            TxnType::Traspaso => money(r.entry.amount).cyan().to_string(),
        };
        let mark = match (r.selected, r.is_duplicate) {
            (true, false) => "[x]".to_string(),
            (true, true) => "[x] dup".yellow().to_string(),
            (false, true) => "[ ] dup".yellow().to_string(),
            (false, false) => "[ ]".to_string(),
        };
        table.add_row(vec![
            Cell::new(r.entry.source_row_index),
            Cell::new(mark),
            Cell::new(r.entry.date.format("%d/%m/%Y")),
            Cell::new(&r.entry.description),
            Cell::new(amount),
            Cell::new(kind.as_str()),
            Cell::new(r.override_category.as_deref().unwrap_or("")),
            Cell::new(r.override_destination.as_deref().unwrap_or("")),
        ]);
    }
    println!("{table}");
    println!(
        "{} rows, {} selected, {} likely duplicates",
        session.records().len(),
        session.selected_count(),
        session.duplicate_count()
    );
}

pub fn run(args: ImportArgs) -> Result<()> {
    let settings = Settings::load();
    let account = args
        .account
        .clone()
        .or(settings.default_account.clone())
        .ok_or_else(|| ExtractoError::Other("no account given; pass --account".into()))?;
    let file_path = PathBuf::from(&args.file);

    let snapshot = resolve_snapshot(&args, &settings, &account)?;
    if snapshot.is_empty() {
        info!(account = %account, "ledger snapshot is empty, nothing to compare against");
    }

    let (mut session, source) = if args.normalized {
        let records = load_normalized_file(&file_path)?;
        let source = ImportSource {
            filename: file_name(&file_path),
            format_id: Some("normalized".to_string()),
            checksum: Some(compute_checksum(&file_path)?),
        };
        (ImportSession::from_normalized(records, &snapshot), source)
    } else {
        let delimiter = args.delimiter.unwrap_or(settings.csv_delimiter);
        let ingested = match ingest_file(&file_path, delimiter, args.format) {
            Ok(ingested) => ingested,
            Err(e @ ExtractoError::Decode(_)) => {
                eprintln!("{}", "No transactions found.".yellow());
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        if !args.json {
            println!("Format: {}", ingested.descriptor.format_id.bold());
        }
        let source = ImportSource {
            filename: file_name(&file_path),
            format_id: Some(ingested.descriptor.format_id.to_string()),
            checksum: Some(ingested.checksum),
        };
        (ImportSession::new(ingested.candidates, &snapshot), source)
    };
    if session.is_empty() {
        println!("{}", "No transactions found.".yellow());
        return Ok(());
    }
    apply_edits(&mut session, &args)?;

    if !args.json {
        print_review(&session);
    }

    let payload = match session.build_commit_payload(&account) {
        Ok(payload) => payload,
        Err(ExtractoError::MissingDestination(rows)) => {
            eprintln!(
                "{}",
                "Selected transfers need a destination account (--dest ROW=ACCOUNT).".red()
            );
            return Err(ExtractoError::MissingDestination(rows));
        }
        Err(e) => return Err(e),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    if payload.transactions.is_empty() {
        if !args.json {
            println!("{}", "Nothing selected to import.".yellow());
        }
        return Ok(());
    }
    if args.dry_run {
        if !args.json {
            println!("Dry run: {} transactions would be imported into {account}.", payload.transactions.len());
        }
        return Ok(());
    }

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;
    if let Some(checksum) = &source.checksum {
        if checksum_seen(&conn, &account, checksum)? {
            warn!(file = %file_path.display(), "statement was imported before");
            if !args.json {
                println!("{}", "This file was imported before; review the duplicate flags.".yellow());
            }
        }
    }
    let mut ledger = SqliteLedger::new(conn, source);
    let stored = session.commit(&account, &mut ledger)?;
    if !args.json {
        println!("{}", format!("{stored} transactions imported into {account}.").green());
    }
    Ok(())
}
