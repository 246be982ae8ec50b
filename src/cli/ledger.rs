use std::str::FromStr;

use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::db::{get_connection, init_db, list_transactions};
use crate::error::Result;
use crate::fmt::money;
use crate::settings::Settings;

pub fn run(account: &str) -> Result<()> {
    let conn = get_connection(&Settings::load().db_path())?;
    init_db(&conn)?;
    let rows = list_transactions(&conn, account)?;
    if rows.is_empty() {
        println!("No ledger entries for {account}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Description", "Amount", "Type", "Destination", "Category"]);
    for row in rows {
        let amount = Decimal::from_str(&row.amount)
            .map(money)
            .unwrap_or(row.amount);
        table.add_row(vec![
            Cell::new(row.date),
            Cell::new(row.description),
            Cell::new(amount),
            Cell::new(row.txn_type),
            Cell::new(row.destination_account_id.unwrap_or_default()),
            Cell::new(row.category_id.unwrap_or_default()),
        ]);
    }
    println!("Ledger: {account}\n{table}");
    Ok(())
}
