//! Storage contract shared by every driver.

use crate::core::config::CurrencyLists;
use crate::core::error::StoreError;
use crate::core::rates::ConversionRates;
use crate::core::transaction::{AssetType, NewTransaction, Transaction};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;

/// Distinct currency codes and symbols grouped by asset type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrencySet {
    pub cash: BTreeSet<String>,
    pub stock: BTreeSet<String>,
    pub crypto: BTreeSet<String>,
}

impl CurrencySet {
    pub fn get(&self, asset_type: AssetType) -> &BTreeSet<String> {
        match asset_type {
            AssetType::Cash => &self.cash,
            AssetType::Stock => &self.stock,
            AssetType::Crypto => &self.crypto,
        }
    }

    pub fn insert(&mut self, asset_type: AssetType, code: &str) {
        let code = asset_type.normalize_code(code);
        match asset_type {
            AssetType::Cash => self.cash.insert(code),
            AssetType::Stock => self.stock.insert(code),
            AssetType::Crypto => self.crypto.insert(code),
        };
    }

    pub fn extend_from(&mut self, lists: &CurrencyLists) {
        for asset_type in AssetType::ALL {
            for code in lists.get(asset_type) {
                self.insert(asset_type, code);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// True when every submitted record was saved.
    pub success: bool,
    pub saved: Vec<Transaction>,
}

pub fn new_transaction_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn get_all_transactions(&self) -> Result<Vec<Transaction>, StoreError>;

    /// Persists one record, assigning its id. `None` if the driver refused it.
    async fn create_transaction(
        &self,
        fields: NewTransaction,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Persists records in order. Drivers with a native batch write override this.
    async fn create_transactions(
        &self,
        batch: Vec<NewTransaction>,
    ) -> Result<BatchResult, StoreError> {
        let submitted = batch.len();
        let mut saved = Vec::with_capacity(submitted);
        for fields in batch {
            if let Some(transaction) = self.create_transaction(fields).await? {
                saved.push(transaction);
            }
        }
        Ok(BatchResult {
            success: saved.len() == submitted,
            saved,
        })
    }

    async fn update_transaction(
        &self,
        id: &str,
        fields: NewTransaction,
    ) -> Result<Option<Transaction>, StoreError>;

    async fn delete_transaction(&self, id: &str) -> Result<bool, StoreError>;

    async fn get_all_transaction_currencies(&self) -> Result<CurrencySet, StoreError> {
        let mut currencies = CurrencySet::default();
        for transaction in self.get_all_transactions().await? {
            currencies.insert(transaction.asset_type, &transaction.currency);
        }
        Ok(currencies)
    }

    async fn get_all_transaction_categories(&self) -> Result<Vec<String>, StoreError> {
        let categories: BTreeSet<String> = self
            .get_all_transactions()
            .await?
            .into_iter()
            .map(|t| t.category)
            .collect();
        Ok(categories.into_iter().collect())
    }

    async fn get_cache(&self) -> Result<Option<ConversionRates>, StoreError>;

    async fn save_cache(&self, rates: &ConversionRates) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_set_normalizes_codes() {
        let mut set = CurrencySet::default();
        set.insert(AssetType::Cash, "EUR");
        set.insert(AssetType::Crypto, "btc");
        set.extend_from(&CurrencyLists {
            cash: vec!["eur".to_string(), "usd".to_string()],
            stock: vec!["aapl".to_string()],
            crypto: vec![],
        });

        assert_eq!(set.cash.iter().collect::<Vec<_>>(), vec!["eur", "usd"]);
        assert!(set.get(AssetType::Stock).contains("AAPL"));
        assert!(set.get(AssetType::Crypto).contains("BTC"));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(new_transaction_id(), new_transaction_id());
    }
}
