use crate::core::error::StoreError;
use crate::core::rates::ConversionRates;
use crate::core::store::{BatchResult, TransactionStore, new_transaction_id};
use crate::core::transaction::{NewTransaction, Transaction};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct MemoryState {
    transactions: Vec<Transaction>,
    cache: Option<ConversionRates>,
}

/// In-memory store; contents live as long as the process.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn get_all_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state.transactions.clone())
    }

    async fn create_transaction(
        &self,
        fields: NewTransaction,
    ) -> Result<Option<Transaction>, StoreError> {
        let transaction = fields.with_id(new_transaction_id());
        let mut state = self.inner.lock().await;
        debug!(id = %transaction.id, "Memory INSERT");
        state.transactions.push(transaction.clone());
        Ok(Some(transaction))
    }

    async fn create_transactions(
        &self,
        batch: Vec<NewTransaction>,
    ) -> Result<BatchResult, StoreError> {
        let saved: Vec<Transaction> = batch
            .into_iter()
            .map(|fields| fields.with_id(new_transaction_id()))
            .collect();
        let mut state = self.inner.lock().await;
        debug!(count = saved.len(), "Memory INSERT batch");
        state.transactions.extend(saved.iter().cloned());
        Ok(BatchResult {
            success: true,
            saved,
        })
    }

    async fn update_transaction(
        &self,
        id: &str,
        fields: NewTransaction,
    ) -> Result<Option<Transaction>, StoreError> {
        let mut state = self.inner.lock().await;
        match state.transactions.iter_mut().find(|t| t.id == id) {
            Some(existing) => {
                *existing = fields.with_id(id);
                debug!(id, "Memory UPDATE");
                Ok(Some(existing.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_transaction(&self, id: &str) -> Result<bool, StoreError> {
        let mut state = self.inner.lock().await;
        let before = state.transactions.len();
        state.transactions.retain(|t| t.id != id);
        debug!(id, "Memory REMOVE");
        Ok(state.transactions.len() != before)
    }

    async fn get_cache(&self) -> Result<Option<ConversionRates>, StoreError> {
        Ok(self.inner.lock().await.cache.clone())
    }

    async fn save_cache(&self, rates: &ConversionRates) -> Result<(), StoreError> {
        self.inner.lock().await.cache = Some(rates.clone());
        Ok(())
    }
}
