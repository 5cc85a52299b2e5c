use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Statement kinds ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
}

impl StatementKind {
    pub const ALL: [StatementKind; 3] = [
        StatementKind::IncomeStatement,
        StatementKind::BalanceSheet,
        StatementKind::CashFlow,
    ];

    pub fn title(self) -> &'static str {
        match self {
            StatementKind::IncomeStatement => "Income Statement",
            StatementKind::BalanceSheet => "Balance Sheet",
            StatementKind::CashFlow => "Cash Flow Statement",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::IncomeStatement => "income statement",
            StatementKind::BalanceSheet => "balance sheet",
            StatementKind::CashFlow => "cash flow",
        };
        f.write_str(name)
    }
}

/// Reporting frequency of the statement columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Annual,
    Quarterly,
}

impl Frequency {
    /// Key prefix used by the fundamentals timeseries endpoint.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Frequency::Annual => "annual",
            Frequency::Quarterly => "quarterly",
        }
    }
}

// ── Financial statement table ─────────────────────────────────────────────────

/// One named line item; `values[i]` belongs to `FinancialStatement::periods[i]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub label: String,
    pub values: Vec<Option<f64>>,
}

impl LineItem {
    pub fn new(label: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }

    /// Cell at `index`, treating NaN and infinities as missing.
    pub fn cell(&self, index: usize) -> Option<f64> {
        self.values
            .get(index)
            .copied()
            .flatten()
            .filter(|v| v.is_finite())
    }

    pub fn is_all_missing(&self) -> bool {
        (0..self.values.len()).all(|i| self.cell(i).is_none())
    }
}

/// Rows × reporting periods, most recent period first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialStatement {
    pub kind: StatementKind,
    pub periods: Vec<NaiveDate>,
    pub rows: Vec<LineItem>,
}

impl FinancialStatement {
    pub fn new(kind: StatementKind, periods: Vec<NaiveDate>, rows: Vec<LineItem>) -> Self {
        Self {
            kind,
            periods,
            rows,
        }
    }

    pub fn row(&self, label: &str) -> Option<&LineItem> {
        self.rows.iter().find(|r| r.label == label)
    }

    pub fn has_row(&self, label: &str) -> bool {
        self.row(label).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.periods.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.label.as_str())
    }
}

// ── Company metadata ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompanyMetrics {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub current_price: Option<f64>,
    pub forward_pe: Option<f64>,
}

// ── Derived metrics ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DerivedMetrics {
    pub current_pe: Option<f64>,
    pub free_cash_flow_per_share: Option<f64>,
    pub free_cash_flow_per_share_adjusted: Option<f64>,
    /// Percentage string with two decimals, e.g. "4.37%".
    pub free_cash_flow_yield: Option<String>,
    pub free_cash_flow_yield_adjusted: Option<String>,
}

// ── Diagnostics ───────────────────────────────────────────────────────────────

/// A non-fatal hole in the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Gap {
    MissingStatement { kind: StatementKind },
    MissingRow { kind: StatementKind, row: String },
    DerivedRowSkipped { kind: StatementKind, row: String, missing: Vec<String> },
    MissingMetadata { field: String },
    MetricUndefined { metric: String },
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gap::MissingStatement { kind } => write!(f, "no {kind} data"),
            Gap::MissingRow { kind, row } => write!(f, "{kind} has no '{row}' row"),
            Gap::DerivedRowSkipped { row, missing, .. } => write!(
                f,
                "could not compute '{row}' (missing {})",
                missing.join(", ")
            ),
            Gap::MissingMetadata { field } => write!(f, "provider did not report {field}"),
            Gap::MetricUndefined { metric } => write!(f, "could not compute {metric}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub symbol: String,
    pub gap: Gap,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for {}", self.gap, self.symbol)
    }
}

// ── Provider profile ──────────────────────────────────────────────────────────

/// Everything the provider returned for one symbol, before normalisation.
#[derive(Debug, Clone, Default)]
pub struct TickerProfile {
    pub income_statement: Option<FinancialStatement>,
    pub balance_sheet: Option<FinancialStatement>,
    pub cash_flow: Option<FinancialStatement>,
    pub metrics: CompanyMetrics,
}

impl TickerProfile {
    pub fn statement(&self, kind: StatementKind) -> Option<&FinancialStatement> {
        match kind {
            StatementKind::IncomeStatement => self.income_statement.as_ref(),
            StatementKind::BalanceSheet => self.balance_sheet.as_ref(),
            StatementKind::CashFlow => self.cash_flow.as_ref(),
        }
    }
}

// ── Query result ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub symbol: String,
    pub income_statement: Option<FinancialStatement>,
    pub balance_sheet: Option<FinancialStatement>,
    pub cash_flow: Option<FinancialStatement>,
    pub company: CompanyMetrics,
    pub metrics: DerivedMetrics,
    pub diagnostics: Vec<Diagnostic>,
}

impl QueryResult {
    pub fn statement(&self, kind: StatementKind) -> Option<&FinancialStatement> {
        match kind {
            StatementKind::IncomeStatement => self.income_statement.as_ref(),
            StatementKind::BalanceSheet => self.balance_sheet.as_ref(),
            StatementKind::CashFlow => self.cash_flow.as_ref(),
        }
    }
}
