use super::ui;
use crate::core::balance::{
    BalanceReport, PerformanceReport, compute_balance, compute_performance,
};
use crate::core::cache::{CacheState, ConversionCache};
use crate::core::rates::ConversionRates;
use crate::core::store::TransactionStore;
use crate::core::transaction::AssetType;
use crate::ingest::export::format_date;
use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::Cell;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

impl BalanceReport {
    pub fn display_as_table(&self) -> String {
        let base = &self.base_currency;
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Asset"),
            ui::header_cell("Currency"),
            ui::header_cell("Amount"),
            ui::header_cell(&format!("Value ({base})")),
            ui::header_cell("Allocation"),
            ui::header_cell("Within asset"),
        ]);

        for (asset_type, balances) in &self.currencies {
            for (code, entry) in balances {
                table.add_row(vec![
                    Cell::new(asset_type),
                    Cell::new(code),
                    ui::signed_cell(entry.amount, 4),
                    ui::signed_cell(entry.value, 2),
                    ui::percentage_cell(entry.allocation),
                    ui::percentage_cell(entry.asset_allocation),
                ]);
            }
        }

        let mut output = format!("{}\n\n", ui::style_text("Balance", ui::StyleType::Title));
        output.push_str(&table.to_string());
        output.push('\n');

        let totals = [
            ("Income", self.total_income),
            ("Spend", self.total_spend),
            ("Cash", self.asset_total(AssetType::Cash)),
            ("Stock", self.asset_total(AssetType::Stock)),
            ("Crypto", self.asset_total(AssetType::Crypto)),
        ];
        for (label, value) in totals {
            output.push_str(&format!(
                "\n{}: {value:.2}",
                ui::style_text(label, ui::StyleType::TotalLabel)
            ));
        }
        output.push_str(&format!(
            "\n\nTotal Balance ({}): {}",
            ui::style_text(base, ui::StyleType::TotalLabel),
            ui::style_text(&format!("{:.2}", self.balance), ui::StyleType::TotalValue)
        ));
        output
    }
}

impl PerformanceReport {
    pub fn display_as_table(&self, base_currency: &str) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell(""),
            ui::header_cell(&format!("Total ({base_currency})")),
            ui::header_cell("Per 30 days"),
        ]);
        table.add_row(vec![
            Cell::new("Income"),
            ui::signed_cell(self.income, 2),
            ui::signed_cell(self.average_income, 2),
        ]);
        table.add_row(vec![
            Cell::new("Spend"),
            ui::signed_cell(self.spend, 2),
            ui::signed_cell(self.average_spend, 2),
        ]);
        table.add_row(vec![
            Cell::new("Net"),
            ui::signed_cell(self.net, 2),
            ui::signed_cell(self.average_income + self.average_spend, 2),
        ]);

        format!(
            "{} {} to {}\n\n{table}",
            ui::style_text("Performance", ui::StyleType::Title),
            format_date(self.from),
            format_date(self.to)
        )
    }
}

/// Waits for the first rate refresh, showing a spinner until it lands.
/// Rates older than `interval` are served with a warning.
pub async fn wait_for_rates(
    cache: &ConversionCache,
    interval: Duration,
) -> Result<Arc<ConversionRates>> {
    match cache.state(Utc::now().timestamp_millis(), interval) {
        CacheState::Populated => {}
        CacheState::Stale => warn!("Conversion rates are older than the refresh interval"),
        CacheState::Empty => return wait_with_spinner(cache).await,
    }
    match cache.snapshot() {
        Some(rates) => Ok(rates),
        None => wait_with_spinner(cache).await,
    }
}

async fn wait_with_spinner(cache: &ConversionCache) -> Result<Arc<ConversionRates>> {
    let spinner = ui::new_spinner("Fetching conversion rates...");
    let rates = cache.wait_ready().await;
    spinner.finish_and_clear();
    rates.context("Conversion rates are unavailable")
}

pub async fn balance(
    store: &dyn TransactionStore,
    cache: &ConversionCache,
    base_currency: &str,
    interval: Duration,
    json: bool,
) -> Result<()> {
    let transactions = store
        .get_all_transactions()
        .await
        .context("Failed to read transactions")?;
    let rates = wait_for_rates(cache, interval).await?;
    let report = compute_balance(&transactions, &rates, base_currency);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.display_as_table());
    }
    Ok(())
}

pub async fn performance(
    store: &dyn TransactionStore,
    cache: &ConversionCache,
    base_currency: &str,
    interval: Duration,
    from: i64,
    to: i64,
) -> Result<()> {
    let transactions = store
        .get_all_transactions()
        .await
        .context("Failed to read transactions")?;
    let rates = wait_for_rates(cache, interval).await?;
    let report = compute_performance(&transactions, &rates, base_currency, from, to);
    println!("{}", report.display_as_table(base_currency));
    Ok(())
}
