use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::config::AppConfig;
use crate::core::error::RateSourceError;
use crate::core::rates::RateSource;
use crate::core::refresh::RateSources;
use crate::core::transaction::AssetType;
use crate::providers::util::with_retry;

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
}

#[derive(Deserialize, Debug)]
struct ChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: f64,
    currency: Option<String>,
}

/// Quote for one chart symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartQuote {
    pub price: f64,
    pub currency: Option<String>,
}

/// Rate source backed by the Yahoo Finance chart endpoint, one instance per
/// asset class.
pub struct YahooRateSource {
    base_url: String,
    asset_type: AssetType,
    base_currency: String,
    client: reqwest::Client,
    retries: usize,
    delay_ms: u64,
}

impl YahooRateSource {
    pub fn new(base_url: &str, asset_type: AssetType, config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("tallyfolio/0.1")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(YahooRateSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            asset_type,
            base_currency: config.base_currency().to_uppercase(),
            client,
            retries: config.retry.retries,
            delay_ms: config.retry.delay_ms,
        })
    }

    /// Chart symbol quoting one unit of `code` in the base currency.
    pub fn chart_symbol(&self, code: &str) -> String {
        let code = code.trim().to_uppercase();
        match self.asset_type {
            AssetType::Cash => format!("{code}{}=X", self.base_currency),
            AssetType::Stock => code,
            AssetType::Crypto => format!("{code}-{}", self.base_currency),
        }
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<ChartQuote, RateSourceError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        debug!("Requesting chart from {}", url);

        let request_error = |reason: anyhow::Error| RateSourceError::Request {
            symbol: symbol.to_string(),
            reason,
        };

        let response = with_retry(
            || async {
                self.client
                    .get(&url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
            },
            self.retries,
            self.delay_ms,
        )
        .await
        .map_err(request_error)?;

        let data = response
            .json::<ChartResponse>()
            .await
            .map_err(|e| request_error(e.into()))?;

        let item = data
            .chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| RateSourceError::NotFound(symbol.to_string()))?;

        Ok(ChartQuote {
            price: item.meta.regular_market_price,
            currency: item.meta.currency,
        })
    }

    /// Rate of one code in the base currency. Stock quotes in another
    /// currency are converted through that currency's fiat pair.
    #[instrument(name = "YahooRateFetch", skip(self), fields(asset_type = %self.asset_type))]
    pub async fn fetch_one(&self, code: &str) -> Result<f64, RateSourceError> {
        let quote = self.fetch_quote(&self.chart_symbol(code)).await?;

        match (self.asset_type, quote.currency.as_deref()) {
            (AssetType::Stock, Some(currency))
                if !currency.eq_ignore_ascii_case(&self.base_currency) =>
            {
                let pair = format!("{}{}=X", currency.to_uppercase(), self.base_currency);
                let fx = self.fetch_quote(&pair).await?;
                debug!(code, currency, fx = fx.price, "Converted stock quote");
                Ok(quote.price * fx.price)
            }
            _ => Ok(quote.price),
        }
    }
}

#[async_trait]
impl RateSource for YahooRateSource {
    async fn fetch_rates(&self, codes: &[String]) -> HashMap<String, f64> {
        let results = join_all(codes.iter().map(|code| async move {
            (code, self.fetch_one(code).await)
        }))
        .await;

        results
            .into_iter()
            .filter_map(|(code, result)| match result {
                Ok(rate) => Some((code.clone(), rate)),
                Err(e) => {
                    warn!(code = %code, asset_type = %self.asset_type, error = %e, "Rate lookup failed");
                    None
                }
            })
            .collect()
    }
}

/// Builds the fiat, stock and crypto sources from the configuration.
pub fn yahoo_sources(config: &AppConfig) -> Result<RateSources> {
    let base_url = config.yahoo_base_url();
    Ok(RateSources {
        fiat: Arc::new(YahooRateSource::new(base_url, AssetType::Cash, config)?),
        stock: Arc::new(YahooRateSource::new(base_url, AssetType::Stock, config)?),
        crypto: Arc::new(YahooRateSource::new(base_url, AssetType::Crypto, config)?),
    })
}
