use super::ui;
use crate::core::store::TransactionStore;
use crate::core::transaction::{ImportCandidate, Transaction};
use crate::ingest::export::format_date;
use crate::ingest::pipeline::ImportPipeline;
use anyhow::{Context, Result};
use comfy_table::Cell;

/// Renders transactions as a table, oldest first.
pub fn display_transactions(transactions: &[Transaction]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Date"),
        ui::header_cell("Name"),
        ui::header_cell("Category"),
        ui::header_cell("Asset"),
        ui::header_cell("Currency"),
        ui::header_cell("Amount"),
    ]);

    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by_key(|t| t.date);

    for t in sorted {
        table.add_row(vec![
            Cell::new(ui::style_text(&t.id, ui::StyleType::Subtle)),
            Cell::new(format_date(t.date)),
            Cell::new(&t.name),
            Cell::new(&t.category),
            Cell::new(t.asset_type),
            Cell::new(&t.currency),
            ui::signed_cell(t.amount, 4),
        ]);
    }
    table.to_string()
}

pub async fn add(pipeline: &ImportPipeline, candidate: ImportCandidate) -> Result<()> {
    let created = pipeline
        .add_one(&candidate)
        .await
        .context("Failed to add transaction")?;
    println!("{}", display_transactions(std::slice::from_ref(&created)));
    Ok(())
}

pub async fn update(pipeline: &ImportPipeline, id: &str, candidate: ImportCandidate) -> Result<()> {
    let updated = pipeline
        .update_one(id, &candidate)
        .await
        .with_context(|| format!("Failed to update transaction {id}"))?;
    println!("{}", display_transactions(std::slice::from_ref(&updated)));
    Ok(())
}

pub async fn delete(pipeline: &ImportPipeline, id: &str) -> Result<()> {
    pipeline
        .delete(id)
        .await
        .with_context(|| format!("Failed to delete transaction {id}"))?;
    println!("Deleted {}", ui::style_text(id, ui::StyleType::TotalLabel));
    Ok(())
}

pub async fn list(store: &dyn TransactionStore) -> Result<()> {
    let transactions = store
        .get_all_transactions()
        .await
        .context("Failed to read transactions")?;
    if transactions.is_empty() {
        println!("{}", ui::style_text("No transactions yet", ui::StyleType::Subtle));
        return Ok(());
    }
    println!("{}", display_transactions(&transactions));
    println!(
        "\n{} {}",
        ui::style_text("Transactions:", ui::StyleType::TotalLabel),
        transactions.len()
    );
    Ok(())
}

pub async fn categories(store: &dyn TransactionStore) -> Result<()> {
    let categories = store
        .get_all_transaction_categories()
        .await
        .context("Failed to read categories")?;
    for category in categories {
        println!("{category}");
    }
    Ok(())
}
