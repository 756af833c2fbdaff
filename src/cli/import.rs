use super::ui;
use crate::core::transaction::ImportCandidate;
use crate::ingest::export::format_date;
use crate::ingest::pipeline::{ImportPipeline, ImportReport, ReviewedRow};
use crate::ingest::tabular::TabularFormat;
use anyhow::{Context, Result, anyhow};
use comfy_table::{Cell, Color};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Bodies accepted by `commit`: a bare list, or a saved review report.
#[derive(Deserialize)]
#[serde(untagged)]
enum CommitPayload {
    List(Vec<ImportCandidate>),
    Report { transactions: Vec<ImportCandidate> },
}

impl CommitPayload {
    fn into_candidates(self) -> Vec<ImportCandidate> {
        match self {
            CommitPayload::List(candidates) => candidates,
            CommitPayload::Report { transactions } => transactions,
        }
    }
}

pub fn parse_commit_payload(text: &str) -> Result<Vec<ImportCandidate>> {
    let payload: CommitPayload =
        serde_json::from_str(text).context("Expected a JSON list of transactions")?;
    Ok(payload.into_candidates())
}

pub fn display_report(report: &ImportReport) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Row"),
        ui::header_cell("Name"),
        ui::header_cell("Amount"),
        ui::header_cell("Date"),
        ui::header_cell("Asset"),
        ui::header_cell("Currency"),
        ui::header_cell("Status"),
    ]);

    for (index, row) in report.transactions.iter().enumerate() {
        let cells = match row {
            ReviewedRow::Valid(t) => vec![
                Cell::new(index),
                Cell::new(&t.name),
                ui::signed_cell(t.amount, 4),
                Cell::new(format_date(t.date)),
                Cell::new(t.asset_type),
                Cell::new(&t.currency),
                Cell::new("ok").fg(Color::Green),
            ],
            ReviewedRow::Invalid(c) => {
                let message = report.invalid.get(&index).map_or("invalid", String::as_str);
                let show = |v: &Option<String>| Cell::new(v.as_deref().unwrap_or(""));
                vec![
                    Cell::new(index),
                    show(&c.name),
                    show(&c.amount),
                    show(&c.date),
                    show(&c.asset_type),
                    show(&c.currency),
                    Cell::new(message).fg(Color::Red),
                ]
            }
        };
        table.add_row(cells);
    }

    let summary = format!(
        "{} valid, {} invalid",
        report.valid_count(),
        report.invalid.len()
    );
    let style = if report.invalid.is_empty() {
        ui::StyleType::TotalValue
    } else {
        ui::StyleType::Error
    };
    format!("{table}\n\n{}", ui::style_text(&summary, style))
}

/// Parses and validates a table file, optionally saving the report as JSON.
pub fn review(
    pipeline: &ImportPipeline,
    path: &Path,
    format: Option<TabularFormat>,
    output: Option<&Path>,
) -> Result<()> {
    let format = format
        .or_else(|| TabularFormat::from_path(path))
        .ok_or_else(|| anyhow!("Cannot tell the format of {}, pass --format", path.display()))?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let report = pipeline
        .review_tabular(&text, format)
        .with_context(|| format!("Failed to import {}", path.display()))?;
    println!("{}", display_report(&report));

    if let Some(output) = output {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(output, json)
            .with_context(|| format!("Failed to write report to {}", output.display()))?;
        println!(
            "{}",
            ui::style_text(
                &format!("Report saved to {}", output.display()),
                ui::StyleType::Subtle
            )
        );
    }
    Ok(())
}

/// Commits a reviewed JSON batch. Any invalid record rejects the whole batch.
pub async fn commit(pipeline: &ImportPipeline, path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let candidates = parse_commit_payload(&text)?;
    let saved = pipeline.add_batch(&candidates).await?;
    println!(
        "{} {}",
        ui::style_text("Committed:", ui::StyleType::TotalLabel),
        ui::style_text(&saved.len().to_string(), ui::StyleType::TotalValue)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_payload_shapes() {
        let list = r#"[{"name": "a", "amount": 1, "assetType": "cash", "currency": "usd"}]"#;
        assert_eq!(parse_commit_payload(list).unwrap().len(), 1);

        let report = r#"{
            "transactions": [
                {"name": "a", "amount": 1, "date": 0, "category": "other", "assetType": "cash", "currency": "usd"},
                {"name": "b", "amount": "x"}
            ],
            "invalid": {"1": "amount must be a number, got 'x'"}
        }"#;
        let candidates = parse_commit_payload(report).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].amount.as_deref(), Some("x"));

        assert!(parse_commit_payload("{}").is_err());
    }
}
