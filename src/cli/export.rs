use super::ui;
use crate::core::store::TransactionStore;
use crate::ingest::export::{ExportFormat, export};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_FILE_STEM: &str = "transactions";

/// Target file for `output`; a directory gets a file named after the format.
pub fn output_file(output: &Path, format: ExportFormat) -> PathBuf {
    if output.is_dir() {
        output.join(format!("{DEFAULT_FILE_STEM}.{}", format.extension()))
    } else {
        output.to_path_buf()
    }
}

/// Writes every stored transaction to `output`, or to stdout.
pub async fn run(store: &dyn TransactionStore, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let transactions = store
        .get_all_transactions()
        .await
        .context("Failed to read transactions")?;
    let text = export(&transactions, format).context("Failed to export transactions")?;

    match output {
        Some(output) => {
            let path = output_file(output, format);
            fs::write(&path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{}",
                ui::style_text(
                    &format!("Exported {} transactions to {}", transactions.len(), path.display()),
                    ui::StyleType::Subtle
                )
            );
        }
        None => print!("{text}"),
    }
    Ok(())
}
