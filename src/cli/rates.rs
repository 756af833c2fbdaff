use super::ui;
use crate::core::rates::ConversionRates;
use crate::core::refresh::RateRefresher;
use crate::core::transaction::AssetType;
use crate::ingest::export::format_date;
use comfy_table::{Cell, CellAlignment};

impl ConversionRates {
    pub fn display_as_table(&self, base_currency: &str) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Asset"),
            ui::header_cell("Code"),
            ui::header_cell(&format!("Rate ({base_currency})")),
        ]);
        for asset_type in AssetType::ALL {
            for (code, rate) in self.rates(asset_type) {
                table.add_row(vec![
                    Cell::new(asset_type),
                    Cell::new(code),
                    Cell::new(format!("{rate:.6}")).set_alignment(CellAlignment::Right),
                ]);
            }
        }

        let updated = if self.last_updated > 0 {
            format_date(self.last_updated)
        } else {
            "never".to_string()
        };
        format!(
            "{}\n\n{table}\n\n{}",
            ui::style_text("Conversion rates", ui::StyleType::Title),
            ui::style_text(&format!("Last updated: {updated}"), ui::StyleType::Subtle)
        )
    }
}

/// Runs one refresh, or clears the cache when `reset` is set.
pub async fn run(mut refresher: RateRefresher, base_currency: &str, reset: bool) -> anyhow::Result<()> {
    if reset {
        refresher.reset().await;
        println!("{}", ui::style_text("Conversion rates cleared", ui::StyleType::TotalLabel));
        return Ok(());
    }

    let spinner = ui::new_spinner("Refreshing conversion rates...");
    let rates = refresher.refresh_once().await;
    spinner.finish_and_clear();
    println!("{}", rates.display_as_table(base_currency));
    Ok(())
}
