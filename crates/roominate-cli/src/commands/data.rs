//! Table commands.

use crate::app::App;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Context, Result};
use roominate_auth::Table;
use serde_json::Value;

fn parse_filters(raw: &[String]) -> Result<Vec<(&str, &str)>> {
    raw.iter()
        .map(|filter| {
            filter
                .split_once('=')
                .filter(|(column, _)| !column.is_empty())
                .with_context(|| format!("Filter must look like column=value, got '{}'", filter))
        })
        .collect()
}

fn parse_object(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("Row is not valid JSON")?;
    if !value.is_object() {
        bail!("Row must be a JSON object");
    }
    Ok(value)
}

fn print_rows(rows: &[Value], format: &OutputFormat) {
    match format {
        OutputFormat::Json => output::print_json(&rows),
        OutputFormat::Text => {
            for row in rows {
                println!("{}", row);
            }
            println!("({} rows)", rows.len());
        }
    }
}

pub async fn get_rows(
    app: &App,
    table: &str,
    filters: &[String],
    format: &OutputFormat,
) -> Result<()> {
    let table: Table = table.parse()?;
    let filters = parse_filters(filters)?;

    match app.rest().select(table, &filters).await {
        Ok(rows) => print_rows(&rows, format),
        Err(e) => output::print_error(&e.user_message(), format),
    }
    Ok(())
}

pub async fn insert_row(app: &App, table: &str, json: &str, format: &OutputFormat) -> Result<()> {
    let table: Table = table.parse()?;
    let row = parse_object(json)?;

    match app.rest().insert(table, &row).await {
        Ok(rows) => print_rows(&rows, format),
        Err(e) => output::print_error(&e.user_message(), format),
    }
    Ok(())
}

pub async fn update_rows(
    app: &App,
    table: &str,
    filters: &[String],
    json: &str,
    format: &OutputFormat,
) -> Result<()> {
    let table: Table = table.parse()?;
    let filters = parse_filters(filters)?;
    let changes = parse_object(json)?;

    match app.rest().update(table, &filters, &changes).await {
        Ok(rows) => print_rows(&rows, format),
        Err(e) => output::print_error(&e.user_message(), format),
    }
    Ok(())
}
