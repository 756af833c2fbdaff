use crate::core::transaction::AssetType;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

const DEFAULT_CASH: &[&str] = &[
    "usd", "eur", "gbp", "inr", "jpy", "chf", "cad", "aud", "nzd", "cny", "hkd", "sgd", "sek",
    "nok", "dkk", "pln", "czk", "huf", "try", "zar", "brl", "mxn", "krw", "rub", "uah", "aed",
    "ils",
];

const DEFAULT_STOCK: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "GOOG", "AMZN", "META", "NVDA", "TSLA", "NFLX", "AMD", "INTC",
    "IBM", "ORCL", "BRK-B", "JPM", "V", "MA", "KO", "PEP", "DIS", "WMT", "SPY", "VOO", "VTI",
    "QQQ",
];

const DEFAULT_CRYPTO: &[&str] = &[
    "BTC", "ETH", "SOL", "BNB", "XRP", "ADA", "DOGE", "DOT", "LTC", "TRX", "AVAX", "LINK",
    "MATIC", "USDT", "USDC",
];

/// Lower bound for the refresh interval; shorter values are raised to it.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 60;

fn to_strings(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

/// Currency or symbol lists keyed by asset type.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CurrencyLists {
    pub cash: Vec<String>,
    pub stock: Vec<String>,
    pub crypto: Vec<String>,
}

/// Lists as written in the config file; absent ones fall back to a base.
#[derive(Deserialize)]
struct PartialLists {
    cash: Option<Vec<String>>,
    stock: Option<Vec<String>>,
    crypto: Option<Vec<String>>,
}

impl PartialLists {
    fn or(self, base: CurrencyLists) -> CurrencyLists {
        CurrencyLists {
            cash: self.cash.unwrap_or(base.cash),
            stock: self.stock.unwrap_or(base.stock),
            crypto: self.crypto.unwrap_or(base.crypto),
        }
    }
}

fn allowed_lists<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CurrencyLists, D::Error> {
    Ok(PartialLists::deserialize(deserializer)?.or(CurrencyLists::default()))
}

fn refresh_lists<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CurrencyLists, D::Error> {
    Ok(PartialLists::deserialize(deserializer)?.or(default_refresh_symbols()))
}

impl CurrencyLists {
    pub fn get(&self, asset_type: AssetType) -> &[String] {
        match asset_type {
            AssetType::Cash => &self.cash,
            AssetType::Stock => &self.stock,
            AssetType::Crypto => &self.crypto,
        }
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, asset_type: AssetType, code: &str) -> bool {
        let code = code.trim();
        self.get(asset_type)
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(code))
    }
}

impl Default for CurrencyLists {
    fn default() -> Self {
        CurrencyLists {
            cash: to_strings(DEFAULT_CASH),
            stock: to_strings(DEFAULT_STOCK),
            crypto: to_strings(DEFAULT_CRYPTO),
        }
    }
}

fn default_refresh_symbols() -> CurrencyLists {
    CurrencyLists {
        cash: to_strings(&["usd", "eur", "gbp"]),
        stock: Vec::new(),
        crypto: to_strings(&["BTC", "ETH"]),
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    Memory,
    #[default]
    Disk,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub driver: StorageDriver,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub retries: usize,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            retries: 3,
            delay_ms: 500,
        }
    }
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Base currency all balances are reported in.
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub storage: StorageConfig,
    pub data_path: Option<String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Allowed currency codes and symbols per asset type.
    #[serde(default, deserialize_with = "allowed_lists")]
    pub currencies: CurrencyLists,
    /// Codes refreshed on every cycle even when no transaction uses them.
    #[serde(default = "default_refresh_symbols", deserialize_with = "refresh_lists")]
    pub default_symbols: CurrencyLists,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            currency: default_currency(),
            refresh_interval_secs: default_refresh_interval_secs(),
            storage: StorageConfig::default(),
            data_path: None,
            providers: ProvidersConfig::default(),
            retry: RetryConfig::default(),
            currencies: CurrencyLists::default(),
            default_symbols: default_refresh_symbols(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "tallyfolio", "tallyfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "tallyfolio", "tallyfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn base_currency(&self) -> String {
        AssetType::Cash.normalize_code(&self.currency)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(MIN_REFRESH_INTERVAL_SECS))
    }

    pub fn yahoo_base_url(&self) -> &str {
        self.providers
            .yahoo
            .as_ref()
            .map_or("https://query1.finance.yahoo.com", |p| &p.base_url)
    }
}
