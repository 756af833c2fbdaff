//! Core business logic: the data model, validation, rates and balances.

pub mod balance;
pub mod cache;
pub mod config;
pub mod date;
pub mod error;
pub mod log;
pub mod rates;
pub mod refresh;
pub mod store;
pub mod transaction;
pub mod validate;

// Re-export main types for cleaner imports
pub use balance::{BalanceReport, CurrencyBalance, PerformanceReport};
pub use cache::{CacheState, CacheWriter, ConversionCache, conversion_cache};
pub use rates::{ConversionRates, RateSource};
pub use refresh::{RateRefresher, RateSources};
pub use store::{BatchResult, CurrencySet, TransactionStore};
pub use transaction::{AssetType, ImportCandidate, NewTransaction, Transaction};
