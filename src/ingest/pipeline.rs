//! Review-then-commit orchestration of parsing, validation and storage.

use crate::core::config::CurrencyLists;
use crate::core::error::{ImportError, ValidationError};
use crate::core::store::TransactionStore;
use crate::core::transaction::{ImportCandidate, NewTransaction, Transaction};
use crate::core::validate::validate_at;
use crate::ingest::tabular::{self, TabularFormat};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One reviewed row: canonical when it passed validation, raw otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReviewedRow {
    Valid(NewTransaction),
    Invalid(ImportCandidate),
}

impl ReviewedRow {
    pub fn is_valid(&self) -> bool {
        matches!(self, ReviewedRow::Valid(_))
    }
}

/// Result of reviewing an upload. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub transactions: Vec<ReviewedRow>,
    /// Validation message per post-filter row index.
    pub invalid: BTreeMap<usize, String>,
}

impl ImportReport {
    pub fn valid_count(&self) -> usize {
        self.transactions.len() - self.invalid.len()
    }
}

#[derive(Clone)]
pub struct ImportPipeline {
    store: Arc<dyn TransactionStore>,
    allowed: CurrencyLists,
}

impl ImportPipeline {
    pub fn new(store: Arc<dyn TransactionStore>, allowed: CurrencyLists) -> Self {
        Self { store, allowed }
    }

    fn validate_all(
        &self,
        candidates: &[ImportCandidate],
        now: DateTime<Utc>,
    ) -> Vec<Result<NewTransaction, ValidationError>> {
        candidates
            .iter()
            .map(|c| validate_at(c, &self.allowed, now))
            .collect()
    }

    /// Parses and validates an upload without touching storage.
    pub fn review_tabular(&self, text: &str, format: TabularFormat) -> Result<ImportReport, ImportError> {
        let candidates = tabular::parse(text, format)?;
        let results = self.validate_all(&candidates, Utc::now());

        let mut report = ImportReport::default();
        for (index, (candidate, result)) in candidates.into_iter().zip(results).enumerate() {
            match result {
                Ok(transaction) => report.transactions.push(ReviewedRow::Valid(transaction)),
                Err(e) => {
                    report.invalid.insert(index, e.to_string());
                    report.transactions.push(ReviewedRow::Invalid(candidate));
                }
            }
        }
        info!(
            rows = report.transactions.len(),
            invalid = report.invalid.len(),
            "Reviewed upload"
        );
        Ok(report)
    }

    pub async fn add_one(&self, candidate: &ImportCandidate) -> Result<Transaction, ImportError> {
        let fields = validate_at(candidate, &self.allowed, Utc::now())?;
        self.store
            .create_transaction(fields)
            .await?
            .ok_or(ImportError::NotSaved)
    }

    /// Validates every record and commits them only if all are valid.
    pub async fn add_batch(
        &self,
        candidates: &[ImportCandidate],
    ) -> Result<Vec<Transaction>, ImportError> {
        let results = self.validate_all(candidates, Utc::now());
        let count = results.iter().filter(|r| r.is_err()).count();
        if count > 0 {
            warn!(count, submitted = candidates.len(), "Rejected batch");
            return Err(ImportError::InvalidBatch { count });
        }
        let batch = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        self.commit(batch).await
    }

    /// Hands already validated records to storage in one batch call.
    pub async fn commit(&self, batch: Vec<NewTransaction>) -> Result<Vec<Transaction>, ImportError> {
        let submitted = batch.len();
        if submitted == 0 {
            return Ok(Vec::new());
        }
        let result = self.store.create_transactions(batch).await?;
        let saved = result.saved.len();
        if !result.success || saved != submitted {
            warn!(saved, submitted, "Partial commit");
            return Err(ImportError::PartialCommit { saved, submitted });
        }
        debug!(saved, "Committed batch");
        Ok(result.saved)
    }

    pub async fn update_one(
        &self,
        id: &str,
        candidate: &ImportCandidate,
    ) -> Result<Transaction, ImportError> {
        let fields = validate_at(candidate, &self.allowed, Utc::now())?;
        self.store
            .update_transaction(id, fields)
            .await?
            .ok_or_else(|| ImportError::NotFound(id.to_string()))
    }

    pub async fn delete(&self, id: &str) -> Result<(), ImportError> {
        if self.store.delete_transaction(id).await? {
            Ok(())
        } else {
            Err(ImportError::NotFound(id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StoreError;
    use crate::core::rates::ConversionRates;
    use crate::core::transaction::AssetType;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;

    fn candidate(name: &str, amount: &str, asset_type: &str, currency: &str) -> ImportCandidate {
        ImportCandidate {
            name: Some(name.to_string()),
            amount: Some(amount.to_string()),
            date: Some("2024-05-01".to_string()),
            category: None,
            asset_type: Some(asset_type.to_string()),
            currency: Some(currency.to_string()),
        }
    }

    fn pipeline() -> (ImportPipeline, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            ImportPipeline::new(store.clone(), CurrencyLists::default()),
            store,
        )
    }

    #[tokio::test]
    async fn test_review_reports_without_persisting() {
        let (pipeline, store) = pipeline();
        let text = "\
name,amount,date,assetType,currency
Salary,2500,2024-01-31,cash,USD
Bad,abc,2024-01-31,cash,usd
,,,,
Mystery,5,2024-01-31,bond,usd
";
        let report = pipeline.review_tabular(text, TabularFormat::Csv).unwrap();

        assert_eq!(report.transactions.len(), 3);
        assert_eq!(report.valid_count(), 1);
        assert!(report.transactions[0].is_valid());
        assert_eq!(
            report.invalid.get(&1).map(String::as_str),
            Some("amount must be a number, got 'abc'")
        );
        assert!(report.invalid[&2].contains("bond"));
        assert!(matches!(
            &report.transactions[1],
            ReviewedRow::Invalid(c) if c.name.as_deref() == Some("Bad")
        ));
        match &report.transactions[0] {
            ReviewedRow::Valid(t) => {
                assert_eq!(t.currency, "usd");
                assert_eq!(t.category, "other");
            }
            other => panic!("expected a valid row, got {other:?}"),
        }
        assert!(store.get_all_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_well_formed_csv_reviews_clean() {
        let (pipeline, _) = pipeline();
        let text = "\
name,amount,date,category,assetType,currency
Salary,2500,2024-01-31,income,cash,usd
Rent,-1200,2024-02-01,housing,cash,usd
Apple,3,2024-02-03,investing,stock,AAPL
Bitcoin,0.05,2024-02-04,investing,crypto,BTC
Groceries,-84.20,2024-02-05,food,cash,eur
";
        let report = pipeline.review_tabular(text, TabularFormat::Csv).unwrap();
        assert!(report.invalid.is_empty());
        assert_eq!(report.transactions.len(), 5);
        assert!(report.transactions.iter().all(ReviewedRow::is_valid));
    }

    #[tokio::test]
    async fn test_reviewed_dates_survive_commit() {
        let (pipeline, store) = pipeline();
        let text = "\
name,amount,date,assetType,currency
Old,5,1965-01-01,cash,usd
Epoch,7,1970-01-01,cash,usd
";
        let report = pipeline.review_tabular(text, TabularFormat::Csv).unwrap();
        let json = serde_json::to_string(&report.transactions).unwrap();
        let candidates: Vec<ImportCandidate> = serde_json::from_str(&json).unwrap();

        let saved = pipeline.add_batch(&candidates).await.unwrap();
        let dates: Vec<i64> = saved.iter().map(|t| t.date).collect();
        assert_eq!(dates, vec![-157_766_400_000, 0]);
        assert_eq!(store.get_all_transactions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_review_propagates_format_errors() {
        let (pipeline, _) = pipeline();
        let err = pipeline
            .review_tabular("name,date\nx,2024-01-01\n", TabularFormat::Csv)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required columns: amount, assetType, currency"
        );
    }

    #[tokio::test]
    async fn test_batch_with_invalid_records_is_rejected_whole() {
        let (pipeline, store) = pipeline();
        let mut batch = vec![
            candidate("ok 1", "1", "cash", "usd"),
            candidate("ok 2", "2", "stock", "aapl"),
            candidate("ok 3", "3", "crypto", "btc"),
        ];
        batch.extend([
            candidate("zero", "0", "cash", "usd"),
            candidate("nan", "x", "cash", "usd"),
            candidate("", "4", "cash", "usd"),
            candidate("asset", "5", "", "usd"),
            candidate("kind", "6", "bond", "usd"),
            candidate("cur", "7", "cash", ""),
            candidate("unknown", "8", "crypto", "NOPE"),
        ]);

        let err = pipeline.add_batch(&batch).await.unwrap_err();
        assert!(matches!(err, ImportError::InvalidBatch { count: 7 }));
        assert_eq!(err.to_string(), "You have 7 invalid transactions");
        assert!(store.get_all_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_valid_batch_commits_in_order() {
        let (pipeline, store) = pipeline();
        let saved = pipeline
            .add_batch(&[
                candidate("first", "1,000", "cash", "EUR"),
                candidate("second", "0.5", "crypto", "eth"),
            ])
            .await
            .unwrap();

        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].amount, 1_000.0);
        assert_eq!(saved[0].currency, "eur");
        assert_eq!(saved[1].currency, "ETH");
        assert_eq!(store.get_all_transactions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_update_delete() {
        let (pipeline, _) = pipeline();
        let created = pipeline
            .add_one(&candidate("Lunch", "-12", "cash", "usd"))
            .await
            .unwrap();
        assert_eq!(created.amount, -12.0);

        let updated = pipeline
            .update_one(&created.id, &candidate("Lunch", "-15", "cash", "usd"))
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.amount, -15.0);

        let err = pipeline
            .update_one("missing", &candidate("x", "1", "cash", "usd"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::NotFound(id) if id == "missing"));

        let err = pipeline
            .add_one(&candidate("x", "0", "cash", "usd"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Validation(ValidationError::ZeroAmount)));

        pipeline.delete(&created.id).await.unwrap();
        assert!(matches!(
            pipeline.delete(&created.id).await,
            Err(ImportError::NotFound(_))
        ));
    }

    /// Silently drops records with negative amounts.
    struct LossyStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl TransactionStore for LossyStore {
        async fn get_all_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
            self.inner.get_all_transactions().await
        }

        async fn create_transaction(
            &self,
            fields: NewTransaction,
        ) -> Result<Option<Transaction>, StoreError> {
            if fields.amount < 0.0 {
                return Ok(None);
            }
            self.inner.create_transaction(fields).await
        }

        async fn update_transaction(
            &self,
            id: &str,
            fields: NewTransaction,
        ) -> Result<Option<Transaction>, StoreError> {
            self.inner.update_transaction(id, fields).await
        }

        async fn delete_transaction(&self, id: &str) -> Result<bool, StoreError> {
            self.inner.delete_transaction(id).await
        }

        async fn get_cache(&self) -> Result<Option<ConversionRates>, StoreError> {
            self.inner.get_cache().await
        }

        async fn save_cache(&self, rates: &ConversionRates) -> Result<(), StoreError> {
            self.inner.save_cache(rates).await
        }
    }

    #[tokio::test]
    async fn test_partial_commit_is_reported_without_rollback() {
        let store = Arc::new(LossyStore {
            inner: MemoryStore::new(),
        });
        let pipeline = ImportPipeline::new(store.clone(), CurrencyLists::default());

        let batch = vec![
            NewTransaction {
                name: "in".to_string(),
                amount: 10.0,
                date: 0,
                category: "other".to_string(),
                asset_type: AssetType::Cash,
                currency: "usd".to_string(),
            },
            NewTransaction {
                name: "out".to_string(),
                amount: -10.0,
                date: 0,
                category: "other".to_string(),
                asset_type: AssetType::Cash,
                currency: "usd".to_string(),
            },
        ];
        let err = pipeline.commit(batch).await.unwrap_err();
        assert!(matches!(
            err,
            ImportError::PartialCommit {
                saved: 1,
                submitted: 2
            }
        ));
        assert_eq!(store.get_all_transactions().await.unwrap().len(), 1);
    }

    #[test]
    fn test_reviewed_rows_serialize_flat() {
        let row = ReviewedRow::Invalid(ImportCandidate {
            name: Some("x".to_string()),
            ..Default::default()
        });
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["name"], "x");
    }
}
