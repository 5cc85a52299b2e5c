//! Pure table transforms. Each stage takes a statement by reference and
//! returns a new one, so stages can be chained and tested in isolation:
//!
//! load → [`truncate_columns`] → [`filter_rows`] → [`drop_all_missing`] → [`append_derived`]

use crate::models::{FinancialStatement, LineItem, StatementKind};

pub const TOTAL_LIABILITIES: &str = "Total Liabilities Net Minority Interest";
pub const STOCKHOLDERS_EQUITY: &str = "Stockholders Equity";
pub const TOTAL_LIABILITIES_AND_EQUITY: &str = "Total Liabilities and Equity";
pub const FREE_CASH_FLOW: &str = "Free Cash Flow";
pub const STOCK_BASED_COMPENSATION: &str = "Stock Based Compensation";
pub const FREE_CASH_FLOW_ADJUSTED: &str = "Free Cash Flow Adjusted for Stock-Based Compensation";
pub const DILUTED_EPS: &str = "Diluted EPS";
pub const BASIC_EPS: &str = "Basic EPS";

/// Rows kept per statement, in output order.
pub fn whitelist(kind: StatementKind) -> &'static [&'static str] {
    match kind {
        StatementKind::IncomeStatement => &[
            "Total Revenue",
            "Gross Profit",
            "Operating Income",
            "Pretax Income",
            "Tax Provision",
            "Net Income",
            BASIC_EPS,
            DILUTED_EPS,
        ],
        StatementKind::BalanceSheet => &[
            "Current Assets",
            "Total Assets",
            "Current Liabilities",
            TOTAL_LIABILITIES,
            "Long Term Debt",
            "Retained Earnings",
            STOCKHOLDERS_EQUITY,
        ],
        StatementKind::CashFlow => &[
            "Operating Cash Flow",
            "Investing Cash Flow",
            "Financing Cash Flow",
            "Common Stock Dividend Paid",
            "Repurchase Of Capital Stock",
            "Capital Expenditure",
            STOCK_BASED_COMPENSATION,
            FREE_CASH_FLOW,
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Subtract,
}

/// A row computed column-wise from two source rows.
#[derive(Debug, Clone, Copy)]
pub struct DerivedRow {
    pub label: &'static str,
    pub lhs: &'static str,
    pub op: Op,
    pub rhs: &'static str,
}

pub fn derived_rows(kind: StatementKind) -> &'static [DerivedRow] {
    match kind {
        StatementKind::IncomeStatement => &[],
        StatementKind::BalanceSheet => &[DerivedRow {
            label: TOTAL_LIABILITIES_AND_EQUITY,
            lhs: TOTAL_LIABILITIES,
            op: Op::Add,
            rhs: STOCKHOLDERS_EQUITY,
        }],
        StatementKind::CashFlow => &[DerivedRow {
            label: FREE_CASH_FLOW_ADJUSTED,
            lhs: FREE_CASH_FLOW,
            op: Op::Subtract,
            rhs: STOCK_BASED_COMPENSATION,
        }],
    }
}

/// Keep at most `limit` period columns, most recent first.
pub fn truncate_columns(table: &FinancialStatement, limit: usize) -> FinancialStatement {
    let keep = limit.min(table.periods.len());
    let rows = table
        .rows
        .iter()
        .map(|r| LineItem::new(r.label.clone(), r.values.iter().take(keep).copied().collect()))
        .collect();
    FinancialStatement::new(table.kind, table.periods[..keep].to_vec(), rows)
}

/// Restrict rows to `allowed`, in that order. Labels the table lacks are omitted.
pub fn filter_rows(table: &FinancialStatement, allowed: &[&str]) -> FinancialStatement {
    let rows = allowed
        .iter()
        .filter_map(|label| table.row(label).cloned())
        .collect();
    FinancialStatement::new(table.kind, table.periods.clone(), rows)
}

/// Drop rows with no usable cell in any retained column.
pub fn drop_all_missing(table: &FinancialStatement) -> FinancialStatement {
    let rows = table
        .rows
        .iter()
        .filter(|r| !r.is_all_missing())
        .cloned()
        .collect();
    FinancialStatement::new(table.kind, table.periods.clone(), rows)
}

/// Append `rule.label` computed from its two source rows.
///
/// Fails with the missing source labels when either is absent; the input is
/// left untouched so the caller can carry on with it.
pub fn append_derived(
    table: &FinancialStatement,
    rule: &DerivedRow,
) -> Result<FinancialStatement, Vec<&'static str>> {
    let (lhs, rhs) = match (table.row(rule.lhs), table.row(rule.rhs)) {
        (Some(l), Some(r)) => (l, r),
        (l, r) => {
            let mut missing = Vec::new();
            if l.is_none() {
                missing.push(rule.lhs);
            }
            if r.is_none() {
                missing.push(rule.rhs);
            }
            return Err(missing);
        }
    };

    let values = (0..table.periods.len())
        .map(|i| match (lhs.cell(i), rhs.cell(i)) {
            (Some(a), Some(b)) => Some(match rule.op {
                Op::Add => a + b,
                Op::Subtract => a - b,
            }),
            _ => None,
        })
        .collect();

    let mut rows = table.rows.clone();
    rows.push(LineItem::new(rule.label, values));
    Ok(FinancialStatement::new(table.kind, table.periods.clone(), rows))
}
