//! Turns one raw field set into a canonical transaction.
//!
//! Checks run in a fixed order and the first failure wins: amount, name,
//! asset type, currency. The date never fails validation: a missing or
//! unparsable date falls back to the current time.

use crate::core::config::CurrencyLists;
use crate::core::date::parse_date;
use crate::core::error::ValidationError;
use crate::core::transaction::{AssetType, DEFAULT_CATEGORY, ImportCandidate, NewTransaction};
use chrono::{DateTime, Utc};

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parses an amount, ignoring thousands separators.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '_') && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Validates `candidate` against the allowed currency lists using the wall clock.
pub fn validate(
    candidate: &ImportCandidate,
    allowed: &CurrencyLists,
) -> Result<NewTransaction, ValidationError> {
    validate_at(candidate, allowed, Utc::now())
}

/// Validates `candidate`, using `now` for missing or unparsable dates.
pub fn validate_at(
    candidate: &ImportCandidate,
    allowed: &CurrencyLists,
    now: DateTime<Utc>,
) -> Result<NewTransaction, ValidationError> {
    let raw_amount = non_blank(&candidate.amount).ok_or(ValidationError::MissingAmount)?;
    let amount =
        parse_amount(raw_amount).ok_or_else(|| ValidationError::InvalidAmount(raw_amount.to_string()))?;
    if amount == 0.0 {
        return Err(ValidationError::ZeroAmount);
    }

    let name = non_blank(&candidate.name).ok_or(ValidationError::MissingName)?;

    let raw_asset_type =
        non_blank(&candidate.asset_type).ok_or(ValidationError::MissingAssetType)?;
    let asset_type: AssetType = raw_asset_type
        .parse()
        .map_err(|_| ValidationError::InvalidAssetType(raw_asset_type.to_string()))?;

    let raw_currency = non_blank(&candidate.currency).ok_or(ValidationError::MissingCurrency)?;
    if !allowed.contains(asset_type, raw_currency) {
        return Err(ValidationError::InvalidCurrency {
            currency: raw_currency.to_string(),
            asset_type,
        });
    }

    let date = non_blank(&candidate.date)
        .and_then(|d| parse_date(d, now))
        .unwrap_or_else(|| now.timestamp_millis());

    let category = non_blank(&candidate.category)
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();

    Ok(NewTransaction {
        name: name.to_string(),
        amount,
        date,
        category,
        asset_type,
        currency: asset_type.normalize_code(raw_currency),
    })
}
