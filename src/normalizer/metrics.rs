//! Valuation metrics derived from the latest period of the filtered statements.
//!
//! Every division goes through [`guarded_div`]; an unusable operand yields
//! `None` instead of a NaN or infinity that would leak into the result.

use crate::models::FinancialStatement;

/// `numerator / denominator`, or `None` if either operand is missing or
/// non-finite, or the denominator is zero.
pub fn guarded_div(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let n = numerator.filter(|v| v.is_finite())?;
    let d = denominator.filter(|v| v.is_finite() && *v != 0.0)?;
    let q = n / d;
    q.is_finite().then_some(q)
}

/// 0.04372 → "4.37%"
pub fn format_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// Latest usable value of `label`: period 0, else period 1.
pub fn latest_with_fallback(table: Option<&FinancialStatement>, label: &str) -> Option<f64> {
    let row = table?.row(label)?;
    row.cell(0).or_else(|| row.cell(1))
}

/// Value of `label` in the most recent period only.
pub fn latest(table: Option<&FinancialStatement>, label: &str) -> Option<f64> {
    table?.row(label)?.cell(0)
}

pub fn price_to_earnings(current_price: Option<f64>, diluted_eps: Option<f64>) -> Option<f64> {
    guarded_div(current_price, diluted_eps)
}

pub fn per_share(amount: Option<f64>, shares_outstanding: Option<f64>) -> Option<f64> {
    guarded_div(amount, shares_outstanding)
}

pub fn yield_on(amount: Option<f64>, market_cap: Option<f64>) -> Option<String> {
    guarded_div(amount, market_cap).map(format_percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineItem, StatementKind};
    use chrono::NaiveDate;

    fn income(eps: Vec<Option<f64>>) -> FinancialStatement {
        let periods = (0..eps.len())
            .map(|i| NaiveDate::from_ymd_opt(2023 - i as i32, 9, 30).unwrap())
            .collect();
        FinancialStatement::new(
            StatementKind::IncomeStatement,
            periods,
            vec![LineItem::new("Diluted EPS", eps)],
        )
    }

    #[test]
    fn test_guarded_div() {
        assert_eq!(guarded_div(Some(10.0), Some(4.0)), Some(2.5));
        assert_eq!(guarded_div(Some(10.0), Some(0.0)), None);
        assert_eq!(guarded_div(Some(10.0), None), None);
        assert_eq!(guarded_div(None, Some(4.0)), None);
        assert_eq!(guarded_div(Some(f64::NAN), Some(4.0)), None);
        assert_eq!(guarded_div(Some(1.0), Some(f64::INFINITY)), None);
        assert_eq!(guarded_div(Some(f64::MAX), Some(f64::MIN_POSITIVE)), None);
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.04372), "4.37%");
        assert_eq!(format_percent(0.1), "10.00%");
        assert_eq!(format_percent(-0.0123), "-1.23%");
    }

    #[test]
    fn test_eps_falls_back_to_previous_period() {
        let t = income(vec![Some(f64::NAN), Some(5.0), Some(4.0)]);
        assert_eq!(latest_with_fallback(Some(&t), "Diluted EPS"), Some(5.0));

        let t = income(vec![None, Some(5.0)]);
        assert_eq!(latest_with_fallback(Some(&t), "Diluted EPS"), Some(5.0));

        // Only one period of fallback.
        let t = income(vec![None, None, Some(4.0)]);
        assert_eq!(latest_with_fallback(Some(&t), "Diluted EPS"), None);

        assert_eq!(latest_with_fallback(None, "Diluted EPS"), None);
    }

    #[test]
    fn test_yield_and_per_share_guards() {
        assert_eq!(yield_on(Some(4.372e9), Some(1.0e11)).as_deref(), Some("4.37%"));
        assert_eq!(yield_on(Some(4.372e9), Some(0.0)), None);
        assert_eq!(per_share(Some(100.0), Some(0.0)), None);
        assert_eq!(per_share(Some(100.0), Some(50.0)), Some(2.0));
        assert_eq!(price_to_earnings(Some(190.0), Some(0.0)), None);
    }
}
