//! Terminal presentation of a [`QueryResult`].
//!
//! Amounts are shown in millions except per-share rows; absent pieces render
//! as placeholders so sibling tables and metrics still show.

use crate::models::{FinancialStatement, QueryResult, StatementKind};
use crate::normalizer::stages::{BASIC_EPS, DILUTED_EPS};
use crate::utils::fmt_amount;
use anyhow::{Context, Result};
use std::fmt::{self, Write as _};
use std::io::Write;

const RULE: &str = "─────────────────────────────────────────────";
const NOT_AVAILABLE: &str = "n/a";

// ── Text dashboard ────────────────────────────────────────────────────────────

fn metric_line(out: &mut String, label: &str, value: Option<String>) -> fmt::Result {
    let value = value.unwrap_or_else(|| NOT_AVAILABLE.to_string());
    writeln!(out, "  {:<26}: {}", label, value)
}

fn two_dp(v: Option<f64>) -> Option<String> {
    v.map(|x| fmt_amount(x, 2))
}

fn is_per_share(label: &str) -> bool {
    label == BASIC_EPS || label == DILUTED_EPS
}

/// Render one statement table, or the placeholder for an absent/empty one.
fn write_statement(
    out: &mut String,
    title: &str,
    table: Option<&FinancialStatement>,
) -> fmt::Result {
    writeln!(out, "\n{}", title)?;

    let Some(table) = table else {
        return writeln!(out, "  No {} available.", title);
    };
    if table.is_empty() {
        return writeln!(out, "  {} is empty.", title);
    }

    let headers: Vec<String> = table
        .periods
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();

    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| {
            let scale = if is_per_share(&r.label) { 1.0 } else { 1e6 };
            (0..headers.len())
                .map(|i| match r.cell(i) {
                    Some(v) => fmt_amount(v / scale, 2),
                    None => "—".to_string(),
                })
                .collect()
        })
        .collect();

    let label_w = table.labels().map(|l| l.chars().count()).max().unwrap_or(0);
    let col_w = cells
        .iter()
        .flatten()
        .chain(headers.iter())
        .map(|c| c.chars().count())
        .max()
        .unwrap_or(0);

    write!(out, "  {:<label_w$}", "")?;
    for h in &headers {
        write!(out, "  {:>col_w$}", h)?;
    }
    out.push('\n');

    for (row, values) in table.rows.iter().zip(&cells) {
        write!(out, "  {:<label_w$}", row.label)?;
        for v in values {
            write!(out, "  {:>col_w$}", v)?;
        }
        out.push('\n');
    }
    Ok(())
}

fn write_dashboard(out: &mut String, result: &QueryResult) -> fmt::Result {
    let c = &result.company;
    let m = &result.metrics;

    let heading = match &c.name {
        Some(name) => format!("{} ({})", name, result.symbol),
        None => result.symbol.clone(),
    };
    writeln!(out, "{}", RULE)?;
    writeln!(out, "  Stock Financial Snapshot — {}", heading)?;
    writeln!(out, "{}", RULE)?;

    writeln!(out, "\nKey Metrics")?;
    metric_line(out, "Market Cap", c.market_cap.map(|v| fmt_amount(v, 0)))?;
    metric_line(out, "Stock Price", two_dp(c.current_price))?;
    metric_line(out, "PE Ratio", two_dp(m.current_pe))?;
    metric_line(out, "Forward PE", two_dp(c.forward_pe))?;
    if let Some(ccy) = &c.currency {
        metric_line(out, "Currency", Some(ccy.clone()))?;
    }

    writeln!(out, "\nFree Cash Flow")?;
    metric_line(out, "FCF per Share", two_dp(m.free_cash_flow_per_share))?;
    metric_line(
        out,
        "FCF per Share (Adjusted)",
        two_dp(m.free_cash_flow_per_share_adjusted),
    )?;
    metric_line(out, "FCF Yield", m.free_cash_flow_yield.clone())?;
    metric_line(
        out,
        "FCF Yield (Adjusted)",
        m.free_cash_flow_yield_adjusted.clone(),
    )?;

    writeln!(out, "\n{}", RULE)?;
    writeln!(out, "Financial Statements (millions, EPS per share)")?;
    for kind in [
        StatementKind::IncomeStatement,
        StatementKind::CashFlow,
        StatementKind::BalanceSheet,
    ] {
        write_statement(out, kind.title(), result.statement(kind))?;
    }

    if !result.diagnostics.is_empty() {
        writeln!(out, "\nNotices")?;
        for d in &result.diagnostics {
            writeln!(out, "  ⚠ {}", d)?;
        }
    }
    Ok(())
}

/// Full dashboard for a successful query.
pub fn render_text(result: &QueryResult) -> Result<String> {
    let mut out = String::new();
    write_dashboard(&mut out, result).context("Failed to render report")?;
    Ok(out)
}

/// One-line message shown when a query fails outright.
pub fn failure_message(symbol: &str) -> String {
    format!(
        "Could not retrieve financial statements for {}. Please check the symbol and country.",
        symbol
    )
}

// ── JSON ──────────────────────────────────────────────────────────────────────

pub fn render_json(result: &QueryResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("Failed to serialise query result")
}

// ── CSV ───────────────────────────────────────────────────────────────────────

/// Write one statement as CSV: a "Line Item" column then one column per period.
/// Values are raw provider units; missing cells are empty.
pub fn write_csv<W: Write>(table: &FinancialStatement, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["Line Item".to_string()];
    header.extend(table.periods.iter().map(|d| d.to_string()));
    wtr.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![row.label.clone()];
        record.extend((0..table.periods.len()).map(|i| {
            row.cell(i).map(|v| v.to_string()).unwrap_or_default()
        }));
        wtr.write_record(&record)?;
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}
