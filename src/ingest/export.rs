//! Writes transactions back out in the formats the parser reads.

use crate::core::error::ExportError;
use crate::core::transaction::Transaction;
use anyhow::anyhow;
use chrono::{DateTime, SecondsFormat};
use std::str::FromStr;
use tracing::debug;

const COLUMNS: [&str; 6] = ["name", "amount", "date", "category", "assetType", "currency"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            other => Err(anyhow!("Unsupported export format: {other}")),
        }
    }
}

/// RFC 3339 with milliseconds, so parsing it back yields the same epoch ms.
pub fn format_date(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}

fn row(transaction: &Transaction) -> [String; 6] {
    [
        transaction.name.clone(),
        transaction.amount.to_string(),
        format_date(transaction.date),
        transaction.category.clone(),
        transaction.asset_type.to_string(),
        transaction.currency.clone(),
    ]
}

fn to_csv(transactions: &[Transaction]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    for transaction in transactions {
        writer.write_record(row(transaction))?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

fn to_markdown(transactions: &[Transaction]) -> String {
    let header = COLUMNS.map(str::to_string);
    let rows: Vec<[String; 6]> = transactions.iter().map(row).collect();

    let mut widths = [0usize; 6];
    for cells in std::iter::once(&header).chain(rows.iter()) {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count() + 2);
        }
    }

    let line = |cells: &[String; 6]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!(" {:<pad$}", cell, pad = width - 1))
            .collect();
        format!("|{}|\n", padded.join("|"))
    };

    let mut out = line(&header);
    let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("|{}|\n", dashes.join("|")));
    for cells in &rows {
        out.push_str(&line(cells));
    }
    out
}

/// Serializes `transactions` in `format`.
pub fn export(transactions: &[Transaction], format: ExportFormat) -> Result<String, ExportError> {
    debug!(count = transactions.len(), ?format, "Exporting transactions");
    match format {
        ExportFormat::Csv => to_csv(transactions),
        ExportFormat::Markdown => Ok(to_markdown(transactions)),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(transactions)?),
    }
}
