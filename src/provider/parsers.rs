use crate::models::{CompanyMetrics, FinancialStatement, Frequency, LineItem, StatementKind};
use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

// ── Timeseries keys ───────────────────────────────────────────────────────────

/// Keys requested per statement. Deliberately wider than the whitelist the
/// normaliser keeps.
pub fn timeseries_keys(kind: StatementKind) -> &'static [&'static str] {
    match kind {
        StatementKind::IncomeStatement => &[
            "TotalRevenue",
            "CostOfRevenue",
            "GrossProfit",
            "OperatingExpense",
            "OperatingIncome",
            "InterestExpense",
            "PretaxIncome",
            "TaxProvision",
            "NetIncome",
            "NetIncomeCommonStockholders",
            "BasicEPS",
            "DilutedEPS",
            "BasicAverageShares",
            "DilutedAverageShares",
            "EBITDA",
        ],
        StatementKind::BalanceSheet => &[
            "CurrentAssets",
            "CashAndCashEquivalents",
            "TotalAssets",
            "CurrentLiabilities",
            "TotalLiabilitiesNetMinorityInterest",
            "LongTermDebt",
            "TotalDebt",
            "RetainedEarnings",
            "StockholdersEquity",
            "OrdinarySharesNumber",
        ],
        StatementKind::CashFlow => &[
            "OperatingCashFlow",
            "InvestingCashFlow",
            "FinancingCashFlow",
            "CommonStockDividendPaid",
            "RepurchaseOfCapitalStock",
            "CapitalExpenditure",
            "StockBasedCompensation",
            "FreeCashFlow",
            "EndCashPosition",
        ],
    }
}

/// "DilutedEPS" → "Diluted EPS" | "RepurchaseOfCapitalStock" → "Repurchase Of Capital Stock"
pub fn humanise_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase() || (prev.is_ascii_uppercase() && next_lower) {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

// ── Timeseries → FinancialStatement ───────────────────────────────────────────

/// Build a statement table from a fundamentals-timeseries response.
///
/// Returns `Ok(None)` when the response carries no data points at all,
/// which is how the endpoint answers for symbols it does not cover.
pub fn parse_timeseries(
    body: &Value,
    kind: StatementKind,
    frequency: Frequency,
) -> Result<Option<FinancialStatement>> {
    let timeseries = body
        .get("timeseries")
        .ok_or_else(|| anyhow!("timeseries response has no 'timeseries' object"))?;

    if let Some(err) = timeseries.get("error").filter(|e| !e.is_null()) {
        bail!("timeseries error: {}", err);
    }

    let Some(results) = timeseries.get("result").and_then(Value::as_array) else {
        return Ok(None);
    };

    let prefix = frequency.key_prefix();
    let mut series: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();

    for entry in results {
        let Some(type_key) = entry.pointer("/meta/type/0").and_then(Value::as_str) else {
            continue;
        };
        let Some(points) = entry.get(type_key).and_then(Value::as_array) else {
            continue;
        };
        let Some(bare) = type_key.strip_prefix(prefix) else {
            debug!("Skipping unexpected series {}", type_key);
            continue;
        };

        let cells = series.entry(bare.to_string()).or_default();
        for point in points.iter().filter(|p| !p.is_null()) {
            let date = point
                .get("asOfDate")
                .and_then(Value::as_str)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            let value = point.pointer("/reportedValue/raw").and_then(Value::as_f64);
            match (date, value) {
                (Some(d), Some(v)) => {
                    cells.insert(d, v);
                }
                _ => warn!("{}: unreadable data point in {}", kind, type_key),
            }
        }
    }

    let periods: Vec<NaiveDate> = series
        .values()
        .flat_map(|cells| cells.keys().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .rev()
        .collect();

    if periods.is_empty() {
        return Ok(None);
    }

    // Keep the requested key order so tables read naturally before filtering.
    let rows = timeseries_keys(kind)
        .iter()
        .filter_map(|key| {
            let cells = series.get(*key)?;
            let values = periods.iter().map(|d| cells.get(d).copied()).collect();
            Some(LineItem::new(humanise_key(key), values))
        })
        .collect();

    Ok(Some(FinancialStatement::new(kind, periods, rows)))
}

// ── quoteSummary → CompanyMetrics ─────────────────────────────────────────────

fn raw_number(summary: &Value, paths: &[&str]) -> Option<f64> {
    paths.iter().find_map(|p| {
        let v = summary.pointer(p)?;
        // Modules report either {"raw": n, "fmt": ".."} or a bare number.
        v.get("raw").unwrap_or(v).as_f64()
    })
}

fn text(summary: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .find_map(|p| summary.pointer(p)?.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Extract company metadata from a quoteSummary response.
///
/// An error object or an empty result means the provider does not know the
/// symbol, which is a hard failure.
pub fn parse_quote_summary(body: &Value, symbol: &str) -> Result<CompanyMetrics> {
    let qs = body
        .get("quoteSummary")
        .ok_or_else(|| anyhow!("quoteSummary response has no 'quoteSummary' object"))?;

    if let Some(err) = qs.get("error").filter(|e| !e.is_null()) {
        let description = err
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        bail!("quoteSummary error for {}: {}", symbol, description);
    }

    let summary = qs
        .pointer("/result/0")
        .filter(|v| !v.is_null())
        .ok_or_else(|| anyhow!("quoteSummary returned no result for {}", symbol))?;

    Ok(CompanyMetrics {
        name: text(summary, &["/price/longName", "/price/shortName"]),
        currency: text(summary, &["/financialData/financialCurrency", "/price/currency"]),
        market_cap: raw_number(summary, &["/price/marketCap", "/summaryDetail/marketCap"]),
        shares_outstanding: raw_number(summary, &["/defaultKeyStatistics/sharesOutstanding"]),
        current_price: raw_number(
            summary,
            &["/financialData/currentPrice", "/price/regularMarketPrice"],
        ),
        forward_pe: raw_number(
            summary,
            &["/summaryDetail/forwardPE", "/defaultKeyStatistics/forwardPE"],
        ),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
