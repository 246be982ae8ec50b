use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::money;
use crate::importer::ingest_file;
use crate::models::{AmountColumns, Direction};
use crate::settings::Settings;
use crate::sniffer::FormatKind;

pub fn run(file: &str, delimiter: Option<char>, format: Option<FormatKind>) -> Result<()> {
    let delimiter = delimiter.unwrap_or(Settings::load().csv_delimiter);
    let ingested = ingest_file(Path::new(file), delimiter, format)?;
    let d = &ingested.descriptor;

    println!("Format:      {}", d.format_id.bold());
    match d.header_row_index {
        Some(i) => println!("Header row:  {i}"),
        None => println!("Header row:  none (data read from the first row)"),
    }
    if let Some(delim) = d.repaired_delimiter {
        println!("Repaired:    rows re-split on {:?}", delim);
    }
    println!("Date col:    {}", d.columns.date);
    println!("Desc col:    {}", d.columns.description);
    if let Some(detail) = d.columns.detail {
        println!("Detail col:  {detail}");
    }
    match d.columns.amount {
        AmountColumns::Signed(i) => println!("Amount col:  {i} (signed)"),
        AmountColumns::Split { credit, debit } => {
            println!("Amount cols: credit {credit}, debit {debit}")
        }
    }

    if ingested.candidates.is_empty() {
        println!("{}", "No transactions found.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Row", "Date", "Description", "Amount"]);
    for c in &ingested.candidates {
        let amount = match c.direction {
            Direction::Income => money(c.amount).green().to_string(),
            Direction::Expense => money(-c.amount).red().to_string(),
        };
        table.add_row(vec![
            Cell::new(c.source_row_index),
            Cell::new(c.date.format("%d/%m/%Y")),
            Cell::new(&c.description),
            Cell::new(amount),
        ]);
    }
    println!("\n{} candidate transactions\n{table}", ingested.candidates.len());
    Ok(())
}
