//! Background task that keeps the conversion cache current.

use crate::core::cache::CacheWriter;
use crate::core::config::{AppConfig, CurrencyLists};
use crate::core::rates::{ConversionRates, RateSource};
use crate::core::store::{CurrencySet, TransactionStore};
use crate::core::transaction::AssetType;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One rate source per asset class.
#[derive(Clone)]
pub struct RateSources {
    pub fiat: Arc<dyn RateSource>,
    pub stock: Arc<dyn RateSource>,
    pub crypto: Arc<dyn RateSource>,
}

/// Sole writer of the conversion cache.
pub struct RateRefresher {
    writer: CacheWriter,
    store: Arc<dyn TransactionStore>,
    sources: RateSources,
    base_currency: String,
    defaults: CurrencyLists,
    interval: Duration,
    rates: ConversionRates,
}

impl RateRefresher {
    pub fn new(
        writer: CacheWriter,
        store: Arc<dyn TransactionStore>,
        sources: RateSources,
        config: &AppConfig,
    ) -> Self {
        Self {
            writer,
            store,
            sources,
            base_currency: config.base_currency(),
            defaults: config.default_symbols.clone(),
            interval: config.refresh_interval(),
            rates: ConversionRates::default(),
        }
    }

    pub fn rates(&self) -> &ConversionRates {
        &self.rates
    }

    /// Restores the cache saved by a previous run. It is served right away
    /// only if it is still fresh; otherwise readers wait for the first refresh.
    pub async fn load_persisted(&mut self) {
        match self.store.get_cache().await {
            Ok(Some(rates)) => {
                let fresh = !rates.is_stale(Utc::now().timestamp_millis(), self.interval);
                debug!(last_updated = rates.last_updated, fresh, "Loaded persisted rates");
                self.rates = rates;
                if fresh {
                    self.writer.publish(self.rates.clone());
                }
            }
            Ok(None) => debug!("No persisted rates"),
            Err(e) => warn!(error = %e, "Failed to load persisted rates"),
        }
    }

    /// Time left until the next refresh is due, zero if it is overdue.
    pub fn next_refresh_delay(&self, now_ms: i64) -> Duration {
        if self.rates.last_updated == 0 {
            return Duration::ZERO;
        }
        let next = self.rates.next_refresh(self.interval);
        if next <= now_ms {
            Duration::ZERO
        } else {
            Duration::from_millis(u64::try_from(next - now_ms).unwrap_or(u64::MAX))
        }
    }

    /// Codes in use by stored transactions plus the configured defaults.
    async fn refresh_universe(&self) -> CurrencySet {
        let mut universe = match self.store.get_all_transaction_currencies().await {
            Ok(currencies) => currencies,
            Err(e) => {
                warn!(error = %e, "Failed to read transaction currencies, refreshing defaults only");
                CurrencySet::default()
            }
        };
        universe.extend_from(&self.defaults);
        universe
    }

    /// Runs one refresh cycle and publishes the result.
    pub async fn refresh_once(&mut self) -> Arc<ConversionRates> {
        let universe = self.refresh_universe().await;

        let codes = |asset_type: AssetType| -> Vec<String> {
            universe
                .get(asset_type)
                .iter()
                .filter(|code| asset_type != AssetType::Cash || **code != self.base_currency)
                .cloned()
                .collect()
        };
        let fiat_codes = codes(AssetType::Cash);
        let stock_codes = codes(AssetType::Stock);
        let crypto_codes = codes(AssetType::Crypto);

        let (fiat, stock, crypto) = tokio::join!(
            self.sources.fiat.fetch_rates(&fiat_codes),
            self.sources.stock.fetch_rates(&stock_codes),
            self.sources.crypto.fetch_rates(&crypto_codes),
        );
        info!(
            fiat = fiat.len(),
            stock = stock.len(),
            crypto = crypto.len(),
            requested = fiat_codes.len() + stock_codes.len() + crypto_codes.len(),
            "Fetched conversion rates"
        );

        self.rates.merge(AssetType::Cash, fiat);
        self.rates.merge(AssetType::Stock, stock);
        self.rates.merge(AssetType::Crypto, crypto);
        self.rates.last_updated = Utc::now().timestamp_millis();

        if let Err(e) = self.store.save_cache(&self.rates).await {
            warn!(error = %e, "Failed to persist conversion rates");
        }

        self.writer.publish(self.rates.clone())
    }

    /// Clears every known rate and returns the cache to its empty state.
    pub async fn reset(&mut self) {
        self.rates = ConversionRates::default();
        if let Err(e) = self.store.save_cache(&self.rates).await {
            warn!(error = %e, "Failed to persist reset conversion rates");
        }
        self.writer.reset();
        info!("Conversion rates reset");
    }

    /// Refreshes forever, sleeping until each refresh is due.
    pub async fn run(mut self) {
        loop {
            let delay = self.next_refresh_delay(Utc::now().timestamp_millis());
            if !delay.is_zero() {
                debug!(?delay, "Sleeping until next refresh");
                tokio::time::sleep(delay).await;
            }
            self.refresh_once().await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
