//! Aggregates transactions into base-currency balances.
use crate::core::rates::ConversionRates;
use crate::core::transaction::{AssetType, Transaction};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

const DAY_MS: f64 = 86_400_000.0;
const AVERAGE_WINDOW_DAYS: f64 = 30.0;

/// Rounds to 4 decimal places to hide floating point noise.
pub fn round(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        round(numerator / denominator)
    } else {
        0.0
    }
}

/// Holdings of one `(asset type, currency)` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyBalance {
    /// Raw signed sum in the pair's own unit.
    pub amount: f64,
    /// Sum converted to the base currency.
    pub value: f64,
    /// Share of the overall balance.
    pub allocation: f64,
    /// Share of the asset class total.
    pub asset_allocation: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceReport {
    pub base_currency: String,
    pub balance: f64,
    pub total_income: f64,
    pub total_spend: f64,
    pub total_cash: f64,
    pub total_stock: f64,
    pub total_crypto: f64,
    pub currencies: BTreeMap<AssetType, BTreeMap<String, CurrencyBalance>>,
}

impl BalanceReport {
    pub fn asset_total(&self, asset_type: AssetType) -> f64 {
        match asset_type {
            AssetType::Cash => self.total_cash,
            AssetType::Stock => self.total_stock,
            AssetType::Crypto => self.total_crypto,
        }
    }
}

/// Income and spend inside a date window, with per-30-day averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub from: i64,
    pub to: i64,
    pub income: f64,
    pub spend: f64,
    pub net: f64,
    pub average_income: f64,
    pub average_spend: f64,
}

/// Base-currency units per unit of `code`. Unknown codes convert at 1.
pub fn conversion_rate(
    rates: &ConversionRates,
    base_currency: &str,
    asset_type: AssetType,
    code: &str,
) -> f64 {
    if asset_type == AssetType::Cash && code.eq_ignore_ascii_case(base_currency) {
        return 1.0;
    }
    match rates.rate(asset_type, code) {
        Some(rate) => rate,
        None => {
            debug!(%asset_type, code, "No conversion rate, using 1");
            1.0
        }
    }
}

pub fn convert(transaction: &Transaction, rates: &ConversionRates, base_currency: &str) -> f64 {
    transaction.amount
        * conversion_rate(
            rates,
            base_currency,
            transaction.asset_type,
            &transaction.currency,
        )
}

#[derive(Default)]
struct PairTotals {
    amount: f64,
    value: f64,
}

/// Computes totals and per-currency allocations in a single pass.
pub fn compute_balance(
    transactions: &[Transaction],
    rates: &ConversionRates,
    base_currency: &str,
) -> BalanceReport {
    let mut balance = 0.0;
    let mut total_income = 0.0;
    let mut total_spend = 0.0;
    let mut asset_totals: BTreeMap<AssetType, f64> = BTreeMap::new();
    let mut pairs: BTreeMap<(AssetType, String), PairTotals> = BTreeMap::new();

    for transaction in transactions {
        let value = convert(transaction, rates, base_currency);
        balance += value;

        if transaction.asset_type == AssetType::Cash {
            if value >= 0.0 {
                total_income += value;
            } else {
                total_spend += value;
            }
        }
        *asset_totals.entry(transaction.asset_type).or_default() += value;

        let pair = pairs
            .entry((
                transaction.asset_type,
                transaction.asset_type.normalize_code(&transaction.currency),
            ))
            .or_default();
        pair.amount += transaction.amount;
        pair.value += value;
    }

    let asset_total = |asset_type: AssetType| asset_totals.get(&asset_type).copied().unwrap_or(0.0);

    let mut currencies: BTreeMap<AssetType, BTreeMap<String, CurrencyBalance>> = BTreeMap::new();
    for ((asset_type, code), totals) in pairs {
        currencies.entry(asset_type).or_default().insert(
            code,
            CurrencyBalance {
                amount: round(totals.amount),
                value: round(totals.value),
                allocation: ratio(totals.value, balance),
                asset_allocation: ratio(totals.value, asset_total(asset_type)),
            },
        );
    }

    BalanceReport {
        base_currency: base_currency.to_string(),
        balance: round(balance),
        total_income: round(total_income),
        total_spend: round(total_spend),
        total_cash: round(asset_total(AssetType::Cash)),
        total_stock: round(asset_total(AssetType::Stock)),
        total_crypto: round(asset_total(AssetType::Crypto)),
        currencies,
    }
}

/// Sums converted cash income and spend with `from <= date <= to` and
/// extrapolates them to a 30 day average.
pub fn compute_performance(
    transactions: &[Transaction],
    rates: &ConversionRates,
    base_currency: &str,
    from: i64,
    to: i64,
) -> PerformanceReport {
    let (income, spend) = transactions
        .iter()
        .filter(|t| t.asset_type == AssetType::Cash && t.date >= from && t.date <= to)
        .map(|t| convert(t, rates, base_currency))
        .fold((0.0, 0.0), |(income, spend), value| {
            if value >= 0.0 {
                (income + value, spend)
            } else {
                (income, spend + value)
            }
        });

    let window_days = to.saturating_sub(from) as f64 / DAY_MS;
    let scale = if window_days > 0.0 {
        AVERAGE_WINDOW_DAYS / window_days
    } else {
        0.0
    };

    PerformanceReport {
        from,
        to,
        income: round(income),
        spend: round(spend),
        net: round(income + spend),
        average_income: round(income * scale),
        average_spend: round(spend * scale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tx(asset_type: AssetType, currency: &str, amount: f64, date: i64) -> Transaction {
        Transaction {
            id: format!("{currency}-{amount}-{date}"),
            name: "t".to_string(),
            amount,
            date,
            category: "other".to_string(),
            asset_type,
            currency: currency.to_string(),
        }
    }

    fn rates() -> ConversionRates {
        let mut rates = ConversionRates::default();
        rates.merge(AssetType::Cash, HashMap::from([("eur".to_string(), 1.1)]));
        rates.merge(AssetType::Stock, HashMap::from([("AAPL".to_string(), 200.0)]));
        rates.merge(AssetType::Crypto, HashMap::from([("BTC".to_string(), 50_000.0)]));
        rates
    }

    #[test]
    fn test_cash_income_and_spend() {
        let transactions = vec![
            tx(AssetType::Cash, "usd", 10.0, 0),
            tx(AssetType::Cash, "usd", -20.0, 0),
            tx(AssetType::Cash, "usd", 50.0, 0),
        ];
        let report = compute_balance(&transactions, &ConversionRates::default(), "usd");

        assert_eq!(report.balance, 40.0);
        assert_eq!(report.total_income, 60.0);
        assert_eq!(report.total_spend, -20.0);
        assert_eq!(report.total_cash, 40.0);
        let usd = &report.currencies[&AssetType::Cash]["usd"];
        assert_eq!(usd.amount, 40.0);
        assert_eq!(usd.allocation, 1.0);
        assert_eq!(usd.asset_allocation, 1.0);
    }

    #[test]
    fn test_unknown_codes_convert_at_one() {
        let transactions = vec![
            tx(AssetType::Cash, "chf", 25.0, 0),
            tx(AssetType::Stock, "TSLA", 3.0, 0),
            tx(AssetType::Crypto, "DOGE", 100.0, 0),
        ];
        let report = compute_balance(&transactions, &rates(), "usd");

        assert_eq!(report.total_cash, 25.0);
        assert_eq!(report.total_stock, 3.0);
        assert_eq!(report.total_crypto, 100.0);
        assert_eq!(report.balance, 128.0);
    }

    #[test]
    fn test_mixed_assets_and_allocations() {
        let transactions = vec![
            tx(AssetType::Cash, "usd", 1_000.0, 0),
            tx(AssetType::Cash, "eur", 1_000.0, 0),
            tx(AssetType::Stock, "AAPL", 5.0, 0),
            tx(AssetType::Crypto, "BTC", 0.1, 0),
        ];
        let report = compute_balance(&transactions, &rates(), "usd");

        // 1000 + 1100 + 1000 + 5000
        assert_eq!(report.balance, 8_100.0);
        assert_eq!(report.total_cash, 2_100.0);
        assert_eq!(report.total_stock, 1_000.0);
        assert_eq!(report.total_crypto, 5_000.0);
        assert_eq!(report.total_income, 2_100.0);

        let eur = &report.currencies[&AssetType::Cash]["eur"];
        assert_eq!(eur.amount, 1_000.0);
        assert_eq!(eur.value, 1_100.0);
        assert_eq!(eur.allocation, round(1_100.0 / 8_100.0));
        assert_eq!(eur.asset_allocation, round(1_100.0 / 2_100.0));

        let btc = &report.currencies[&AssetType::Crypto]["BTC"];
        assert_eq!(btc.asset_allocation, 1.0);
    }

    #[test]
    fn test_non_positive_denominators_yield_zero_allocation() {
        let transactions = vec![
            tx(AssetType::Cash, "usd", 100.0, 0),
            tx(AssetType::Cash, "usd", -100.0, 0),
            tx(AssetType::Stock, "AAPL", -1.0, 0),
        ];
        let report = compute_balance(&transactions, &rates(), "usd");

        assert_eq!(report.balance, -200.0);
        for balances in report.currencies.values() {
            for entry in balances.values() {
                assert_eq!(entry.allocation, 0.0);
                assert_eq!(entry.asset_allocation, 0.0);
                assert!(entry.allocation.is_finite());
            }
        }
        assert!(compute_balance(&[], &rates(), "usd").currencies.is_empty());
    }

    #[test]
    fn test_totals_are_rounded() {
        let transactions = vec![
            tx(AssetType::Cash, "usd", 0.1, 0),
            tx(AssetType::Cash, "usd", 0.2, 0),
        ];
        let report = compute_balance(&transactions, &ConversionRates::default(), "usd");
        assert_eq!(report.balance, 0.3);
        assert_eq!(round(1.234_567), 1.2346);
    }

    #[test]
    fn test_windowed_performance() {
        let day = 86_400_000;
        let transactions = vec![
            tx(AssetType::Cash, "usd", 300.0, day),
            tx(AssetType::Cash, "usd", -90.0, 5 * day),
            tx(AssetType::Cash, "eur", -10.0, 10 * day),
            tx(AssetType::Cash, "usd", 999.0, 20 * day),
            tx(AssetType::Stock, "AAPL", 1.0, 2 * day),
        ];
        let report = compute_performance(&transactions, &rates(), "usd", 0, 15 * day);

        assert_eq!(report.income, 300.0);
        assert_eq!(report.spend, -101.0);
        assert_eq!(report.net, 199.0);
        assert_eq!(report.average_income, 600.0);
        assert_eq!(report.average_spend, -202.0);
    }

    #[test]
    fn test_empty_window_has_zero_averages() {
        let transactions = vec![tx(AssetType::Cash, "usd", 5.0, 10)];
        let report = compute_performance(&transactions, &rates(), "usd", 10, 10);
        assert_eq!(report.income, 5.0);
        assert_eq!(report.average_income, 0.0);
        assert_eq!(report.average_spend, 0.0);
    }

    #[test]
    fn test_extreme_window_bounds_do_not_overflow() {
        let transactions = vec![tx(AssetType::Cash, "usd", 5.0, 10)];
        let report = compute_performance(&transactions, &rates(), "usd", i64::MIN, i64::MAX);
        assert_eq!(report.income, 5.0);
        assert!(report.average_income >= 0.0);

        let report = compute_performance(&transactions, &rates(), "usd", i64::MAX, i64::MIN);
        assert_eq!(report.income, 0.0);
        assert_eq!(report.average_income, 0.0);
    }

    #[test]
    fn test_report_json_shape() {
        let transactions = vec![tx(AssetType::Crypto, "BTC", 1.0, 0)];
        let report = compute_balance(&transactions, &rates(), "usd");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totalCrypto"], 50_000.0);
        assert_eq!(json["currencies"]["crypto"]["BTC"]["assetAllocation"], 1.0);
    }
}
