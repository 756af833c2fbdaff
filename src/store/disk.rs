use crate::core::error::StoreError;
use crate::core::rates::ConversionRates;
use crate::core::store::{BatchResult, TransactionStore, new_transaction_id};
use crate::core::transaction::{NewTransaction, Transaction};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const TRANSACTIONS_PARTITION: &str = "transactions";
const META_PARTITION: &str = "meta";
const CACHE_KEY: &str = "conversion_cache";

/// Store backed by an embedded fjall keyspace. Transactions are JSON values
/// keyed by id; the conversion cache lives in a separate partition.
pub struct DiskStore {
    keyspace: Keyspace,
    transactions: PartitionHandle,
    meta: PartitionHandle,
}

impl DiskStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(db_path)?;

        let keyspace = Config::new(db_path).open()?;
        let transactions =
            keyspace.open_partition(TRANSACTIONS_PARTITION, PartitionCreateOptions::default())?;
        let meta = keyspace.open_partition(META_PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened disk store at {}", db_path.display());

        Ok(Self {
            keyspace,
            transactions,
            meta,
        })
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn put(&self, transaction: &Transaction) -> Result<(), StoreError> {
        self.transactions
            .insert(transaction.id.as_bytes(), serde_json::to_vec(transaction)?)?;
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for DiskStore {
    async fn get_all_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let mut transactions = Vec::new();
        for item in self.transactions.iter() {
            let (_, value) = item?;
            transactions.push(serde_json::from_slice::<Transaction>(&value)?);
        }
        transactions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(transactions)
    }

    async fn create_transaction(
        &self,
        fields: NewTransaction,
    ) -> Result<Option<Transaction>, StoreError> {
        let transaction = fields.with_id(new_transaction_id());
        self.put(&transaction)?;
        self.persist()?;
        debug!(id = %transaction.id, "Disk INSERT");
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

        let mut write = self.keyspace.batch();
        for transaction in &saved {
            write.insert(
                &self.transactions,
                transaction.id.as_bytes(),
                serde_json::to_vec(transaction)?,
            );
        }
        write.commit()?;
        self.persist()?;
        debug!(count = saved.len(), "Disk INSERT batch");

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
        if !self.transactions.contains_key(id.as_bytes())? {
            return Ok(None);
        }
        let transaction = fields.with_id(id);
        self.put(&transaction)?;
        self.persist()?;
        debug!(id, "Disk UPDATE");
        Ok(Some(transaction))
    }

    async fn delete_transaction(&self, id: &str) -> Result<bool, StoreError> {
        if !self.transactions.contains_key(id.as_bytes())? {
            return Ok(false);
        }
        self.transactions.remove(id.as_bytes())?;
        self.persist()?;
        debug!(id, "Disk REMOVE");
        Ok(true)
    }

    async fn get_cache(&self) -> Result<Option<ConversionRates>, StoreError> {
        match self.meta.get(CACHE_KEY)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    async fn save_cache(&self, rates: &ConversionRates) -> Result<(), StoreError> {
        self.meta.insert(CACHE_KEY, serde_json::to_vec(rates)?)?;
        self.persist()
    }
}
