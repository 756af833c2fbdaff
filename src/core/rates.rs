//! Conversion rate tables and the rate-source abstraction.

use crate::core::transaction::AssetType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Rates expressed as base-currency units per one unit of the foreign code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRates {
    #[serde(default)]
    pub fiat_conversions: BTreeMap<String, f64>,
    #[serde(default)]
    pub crypto_conversions: BTreeMap<String, f64>,
    #[serde(default)]
    pub stock_prices: BTreeMap<String, f64>,
    /// Epoch milliseconds of the last refresh, `0` if never refreshed.
    #[serde(default)]
    pub last_updated: i64,
}

impl ConversionRates {
    pub fn rates(&self, asset_type: AssetType) -> &BTreeMap<String, f64> {
        match asset_type {
            AssetType::Cash => &self.fiat_conversions,
            AssetType::Stock => &self.stock_prices,
            AssetType::Crypto => &self.crypto_conversions,
        }
    }

    fn rates_mut(&mut self, asset_type: AssetType) -> &mut BTreeMap<String, f64> {
        match asset_type {
            AssetType::Cash => &mut self.fiat_conversions,
            AssetType::Stock => &mut self.stock_prices,
            AssetType::Crypto => &mut self.crypto_conversions,
        }
    }

    pub fn rate(&self, asset_type: AssetType, code: &str) -> Option<f64> {
        self.rates(asset_type)
            .get(&asset_type.normalize_code(code))
            .copied()
    }

    /// Overlays `fetched` on the existing table. Codes missing from `fetched`
    /// keep their previous rate.
    pub fn merge(&mut self, asset_type: AssetType, fetched: HashMap<String, f64>) {
        let table = self.rates_mut(asset_type);
        for (code, rate) in fetched {
            table.insert(asset_type.normalize_code(&code), rate);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_updated == 0
            && self.fiat_conversions.is_empty()
            && self.crypto_conversions.is_empty()
            && self.stock_prices.is_empty()
    }

    /// Epoch milliseconds at which the next refresh is due.
    pub fn next_refresh(&self, interval: Duration) -> i64 {
        self.last_updated
            .saturating_add(i64::try_from(interval.as_millis()).unwrap_or(i64::MAX))
    }

    pub fn is_stale(&self, now_ms: i64, interval: Duration) -> bool {
        self.next_refresh(interval) <= now_ms
    }
}

/// Resolves rates for one asset class.
///
/// Implementations tolerate partial failure: codes that cannot be resolved are
/// simply absent from the returned map.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self, codes: &[String]) -> HashMap<String, f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_rates_missing_from_update() {
        let mut rates = ConversionRates::default();
        rates.merge(
            AssetType::Cash,
            HashMap::from([("EUR".to_string(), 1.1), ("gbp".to_string(), 1.3)]),
        );
        rates.merge(AssetType::Cash, HashMap::from([("eur".to_string(), 1.2)]));

        assert_eq!(rates.rate(AssetType::Cash, "eur"), Some(1.2));
        assert_eq!(rates.rate(AssetType::Cash, "GBP"), Some(1.3));
        assert_eq!(rates.rate(AssetType::Crypto, "BTC"), None);
    }

    #[test]
    fn test_staleness() {
        let rates = ConversionRates {
            last_updated: 1_000,
            ..Default::default()
        };
        let interval = Duration::from_secs(1);
        assert_eq!(rates.next_refresh(interval), 2_000);
        assert!(!rates.is_stale(1_999, interval));
        assert!(rates.is_stale(2_000, interval));
        assert!(!rates.is_empty());
        assert!(ConversionRates::default().is_empty());
    }

    #[test]
    fn test_cache_json_shape() {
        let mut rates = ConversionRates::default();
        rates.merge(AssetType::Stock, HashMap::from([("aapl".to_string(), 190.0)]));
        let json = serde_json::to_value(&rates).unwrap();
        assert_eq!(json["stockPrices"]["AAPL"], 190.0);
        assert_eq!(json["lastUpdated"], 0);
    }
}
