//! Data normaliser: provider profile → filtered statements + valuation metrics.
//!
//! ## Flow
//!
//! `fetch()` issues one provider call, then for each statement independently:
//!   1. keep the most recent `lookback_periods` columns
//!   2. restrict rows to the statement whitelist
//!   3. drop rows with no usable cell
//!   4. append derived rows whose sources survived
//!
//! Metrics are computed from the resulting tables and the company metadata.
//! Anything missing along the way becomes a [`Diagnostic`]; only a provider
//! fault or a profile without any statement is an error.

pub mod metrics;
pub mod stages;

use crate::error::FetchError;
use crate::models::{
    CompanyMetrics, DerivedMetrics, Diagnostic, FinancialStatement, Frequency, Gap, QueryResult,
    StatementKind,
};
use crate::provider::MarketDataSource;
use tracing::{debug, info};

use self::stages::{
    DILUTED_EPS, FREE_CASH_FLOW, FREE_CASH_FLOW_ADJUSTED, append_derived, derived_rows,
    drop_all_missing, filter_rows, truncate_columns, whitelist,
};

pub const DEFAULT_LOOKBACK_PERIODS: usize = 4;

pub struct Normalizer<S> {
    source: S,
    frequency: Frequency,
}

/// Collects gaps for one query.
struct Gaps<'a> {
    symbol: &'a str,
    items: Vec<Diagnostic>,
}

impl<'a> Gaps<'a> {
    fn new(symbol: &'a str) -> Self {
        Self {
            symbol,
            items: Vec::new(),
        }
    }

    fn push(&mut self, gap: Gap) {
        let d = Diagnostic {
            symbol: self.symbol.to_string(),
            gap,
        };
        debug!("{}", d);
        self.items.push(d);
    }
}

impl<S: MarketDataSource> Normalizer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            frequency: Frequency::Annual,
        }
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub async fn fetch(&self, symbol: &str, lookback_periods: usize) -> Result<QueryResult, FetchError> {
        if lookback_periods == 0 {
            return Err(FetchError::InvalidLookback);
        }

        let profile = self
            .source
            .fetch_profile(symbol, self.frequency)
            .await
            .map_err(|cause| FetchError::Provider {
                symbol: symbol.to_string(),
                cause,
            })?;

        let present = StatementKind::ALL
            .iter()
            .filter(|k| profile.statement(**k).is_some_and(|s| !s.is_empty()))
            .count();
        if present == 0 {
            return Err(FetchError::NoStatementData {
                symbol: symbol.to_string(),
            });
        }

        let mut gaps = Gaps::new(symbol);

        let mut normalise = |kind: StatementKind| -> Option<FinancialStatement> {
            match profile.statement(kind).filter(|s| !s.is_empty()) {
                Some(raw) => Some(normalise_statement(raw, lookback_periods, &mut gaps)),
                None => {
                    gaps.push(Gap::MissingStatement { kind });
                    None
                }
            }
        };
        let income_statement = normalise(StatementKind::IncomeStatement);
        let balance_sheet = normalise(StatementKind::BalanceSheet);
        let cash_flow = normalise(StatementKind::CashFlow);

        report_missing_metadata(&profile.metrics, &mut gaps);

        let metrics = derive_metrics(
            income_statement.as_ref(),
            cash_flow.as_ref(),
            &profile.metrics,
            &mut gaps,
        );

        info!(
            "{}: {} of 3 statements, {} notices",
            symbol,
            present,
            gaps.items.len()
        );

        Ok(QueryResult {
            symbol: symbol.to_string(),
            income_statement,
            balance_sheet,
            cash_flow,
            company: profile.metrics,
            metrics,
            diagnostics: gaps.items,
        })
    }
}

fn normalise_statement(
    raw: &FinancialStatement,
    lookback_periods: usize,
    gaps: &mut Gaps<'_>,
) -> FinancialStatement {
    let kind = raw.kind;
    let allowed = whitelist(kind);

    let truncated = truncate_columns(raw, lookback_periods);
    let filtered = filter_rows(&truncated, allowed);
    let mut table = drop_all_missing(&filtered);

    for label in allowed.iter().filter(|l| !table.has_row(l)) {
        gaps.push(Gap::MissingRow {
            kind,
            row: label.to_string(),
        });
    }

    for rule in derived_rows(kind) {
        match append_derived(&table, rule) {
            Ok(next) => table = next,
            Err(missing) => gaps.push(Gap::DerivedRowSkipped {
                kind,
                row: rule.label.to_string(),
                missing: missing.into_iter().map(str::to_string).collect(),
            }),
        }
    }

    table
}

fn report_missing_metadata(company: &CompanyMetrics, gaps: &mut Gaps<'_>) {
    let fields = [
        ("market capitalization", company.market_cap),
        ("shares outstanding", company.shares_outstanding),
        ("current price", company.current_price),
        ("forward P/E", company.forward_pe),
    ];
    for (field, value) in fields {
        if value.is_none() {
            gaps.push(Gap::MissingMetadata {
                field: field.to_string(),
            });
        }
    }
}

fn derive_metrics(
    income: Option<&FinancialStatement>,
    cash_flow: Option<&FinancialStatement>,
    company: &CompanyMetrics,
    gaps: &mut Gaps<'_>,
) -> DerivedMetrics {
    let eps = metrics::latest_with_fallback(income, DILUTED_EPS);
    let fcf = metrics::latest(cash_flow, FREE_CASH_FLOW);
    let fcf_adjusted = metrics::latest(cash_flow, FREE_CASH_FLOW_ADJUSTED);

    let derived = DerivedMetrics {
        current_pe: metrics::price_to_earnings(company.current_price, eps),
        free_cash_flow_per_share: metrics::per_share(fcf, company.shares_outstanding),
        free_cash_flow_per_share_adjusted: metrics::per_share(
            fcf_adjusted,
            company.shares_outstanding,
        ),
        free_cash_flow_yield: metrics::yield_on(fcf, company.market_cap),
        free_cash_flow_yield_adjusted: metrics::yield_on(fcf_adjusted, company.market_cap),
    };

    let undefined = [
        ("current P/E", derived.current_pe.is_none()),
        ("free cash flow per share", derived.free_cash_flow_per_share.is_none()),
        (
            "adjusted free cash flow per share",
            derived.free_cash_flow_per_share_adjusted.is_none(),
        ),
        ("free cash flow yield", derived.free_cash_flow_yield.is_none()),
        (
            "adjusted free cash flow yield",
            derived.free_cash_flow_yield_adjusted.is_none(),
        ),
    ];
    for (metric, missing) in undefined {
        if missing {
            gaps.push(Gap::MetricUndefined {
                metric: metric.to_string(),
            });
        }
    }

    derived
}
