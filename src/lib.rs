pub mod cli;
pub mod core;
pub mod ingest;
pub mod providers;
pub mod store;

use crate::core::cache::{ConversionCache, conversion_cache};
use crate::core::config::AppConfig;
use crate::core::date::parse_date;
use crate::core::refresh::RateRefresher;
use crate::core::store::TransactionStore;
use crate::core::transaction::ImportCandidate;
use crate::ingest::export::ExportFormat;
use crate::ingest::pipeline::ImportPipeline;
use crate::ingest::tabular::TabularFormat;
use crate::providers::yahoo_finance::yahoo_sources;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const DEFAULT_PERFORMANCE_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub enum AppCommand {
    Add(ImportCandidate),
    List,
    Update {
        id: String,
        fields: ImportCandidate,
    },
    Delete {
        id: String,
    },
    Categories,
    Import {
        path: PathBuf,
        format: Option<TabularFormat>,
        output: Option<PathBuf>,
    },
    Commit {
        path: PathBuf,
    },
    Export {
        format: ExportFormat,
        output: Option<PathBuf>,
    },
    Balance {
        json: bool,
    },
    Performance {
        from: Option<String>,
        to: Option<String>,
    },
    Rates {
        reset: bool,
    },
}

fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

/// Restores persisted rates and starts the background refresh loop.
pub async fn start_refresher(
    config: &AppConfig,
    store: Arc<dyn TransactionStore>,
) -> Result<(ConversionCache, JoinHandle<()>)> {
    let (writer, cache) = conversion_cache();
    let mut refresher = RateRefresher::new(writer, store, yahoo_sources(config)?, config);
    refresher.load_persisted().await;
    Ok((cache, refresher.spawn()))
}

async fn stop_refresher(handle: JoinHandle<()>) {
    handle.abort();
    // Wait for the task to drop its store handle.
    let _ = handle.await;
}

/// Resolves a reporting window; `to` defaults to now and `from` to 30 days before `to`.
pub fn resolve_window(
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(i64, i64)> {
    let parse = |raw: &str| parse_date(raw, now).ok_or_else(|| anyhow!("Unrecognized date: {raw}"));
    let to = match to {
        Some(raw) => parse(raw)?,
        None => now.timestamp_millis(),
    };
    let from = match from {
        Some(raw) => parse(raw)?,
        None => to.saturating_sub(Duration::days(DEFAULT_PERFORMANCE_DAYS).num_milliseconds()),
    };
    Ok((from, to))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("tallyfolio starting...");
    let config = load_config(config_path)?;
    let store = store::open_store(&config)?;
    let pipeline = ImportPipeline::new(Arc::clone(&store), config.currencies.clone());
    let base_currency = config.base_currency();

    match command {
        AppCommand::Add(candidate) => cli::transactions::add(&pipeline, candidate).await,
        AppCommand::List => cli::transactions::list(store.as_ref()).await,
        AppCommand::Update { id, fields } => {
            cli::transactions::update(&pipeline, &id, fields).await
        }
        AppCommand::Delete { id } => cli::transactions::delete(&pipeline, &id).await,
        AppCommand::Categories => cli::transactions::categories(store.as_ref()).await,
        AppCommand::Import {
            path,
            format,
            output,
        } => cli::import::review(&pipeline, &path, format, output.as_deref()),
        AppCommand::Commit { path } => cli::import::commit(&pipeline, &path).await,
        AppCommand::Export { format, output } => {
            cli::export::run(store.as_ref(), format, output.as_deref()).await
        }
        AppCommand::Balance { json } => {
            let (cache, handle) = start_refresher(&config, Arc::clone(&store)).await?;
            let result = cli::balance::balance(
                store.as_ref(),
                &cache,
                &base_currency,
                config.refresh_interval(),
                json,
            )
            .await;
            stop_refresher(handle).await;
            result
        }
        AppCommand::Performance { from, to } => {
            let (from, to) = resolve_window(from.as_deref(), to.as_deref(), Utc::now())?;
            let (cache, handle) = start_refresher(&config, Arc::clone(&store)).await?;
            let result = cli::balance::performance(
                store.as_ref(),
                &cache,
                &base_currency,
                config.refresh_interval(),
                from,
                to,
            )
            .await;
            stop_refresher(handle).await;
            result
        }
        AppCommand::Rates { reset } => {
            let (writer, _cache) = conversion_cache();
            let mut refresher =
                RateRefresher::new(writer, Arc::clone(&store), yahoo_sources(&config)?, &config);
            refresher.load_persisted().await;
            cli::rates::run(refresher, &base_currency, reset).await
        }
    }
}
