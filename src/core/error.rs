use crate::core::transaction::AssetType;
use thiserror::Error;

/// A single record failed validation. Messages name the offending field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("amount is required")]
    MissingAmount,

    #[error("amount must be a number, got '{0}'")]
    InvalidAmount(String),

    #[error("amount must not be zero")]
    ZeroAmount,

    #[error("name is required")]
    MissingName,

    #[error("assetType is required")]
    MissingAssetType,

    #[error("assetType must be one of cash, stock or crypto, got '{0}'")]
    InvalidAssetType(String),

    #[error("currency is required")]
    MissingCurrency,

    #[error("currency '{currency}' is not allowed for {asset_type}")]
    InvalidCurrency {
        currency: String,
        asset_type: AssetType,
    },
}

/// The header of a tabular upload lacks required columns.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Missing required columns: {}", missing_fields.join(", "))]
pub struct ImportFormatError {
    pub missing_fields: Vec<&'static str>,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Backend(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single symbol could not be resolved. Never surfaced to request callers.
#[derive(Error, Debug)]
pub enum RateSourceError {
    #[error("Request failed for {symbol}: {reason}")]
    Request { symbol: String, reason: anyhow::Error },

    #[error("No rate data found for {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Format(#[from] ImportFormatError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("You have {count} invalid transactions")]
    InvalidBatch { count: usize },

    #[error("Saved {saved} of {submitted} transactions")]
    PartialCommit { saved: usize, submitted: usize },

    #[error("Failed to save transaction")]
    NotSaved,

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON write failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Export write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Exported text is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Conversion cache closed before it was populated")]
    Closed,
}
