use std::time::{Duration, Instant};
use tracing::info;

/// A simple wall-clock timer for logging elapsed time.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("⏱  Finished: {} (took {:.2?})", self.label, self.elapsed());
    }
}

/// Provider ticker for a symbol traded in `country`.
/// ("aapl", "us") → "AAPL" | ("sap", "de") → "SAP.DE"
pub fn compose_symbol(symbol: &str, country: &str) -> String {
    let symbol = symbol.trim().to_uppercase();
    let country = country.trim().to_uppercase();
    if country == "US" {
        symbol
    } else {
        format!("{}.{}", symbol, country)
    }
}

/// Format with thousands separators and a fixed number of decimals.
/// 1234567.891 → "1,234,567.89"
pub fn fmt_amount(x: f64, decimals: usize) -> String {
    let s = format!("{:.*}", decimals, x.abs());
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s.as_str(), None),
    };

    let mut result = String::new();
    for (i, ch) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    if x < 0.0 && s.chars().any(|c| c != '0' && c != '.') {
        result.push('-');
    }
    let mut out: String = result.chars().rev().collect();
    if let Some(f) = frac_part {
        out.push('.');
        out.push_str(f);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_amount() {
        assert_eq!(fmt_amount(1_234_567.0, 0), "1,234,567");
        assert_eq!(fmt_amount(0.0, 0), "0");
        assert_eq!(fmt_amount(-42_000.0, 0), "-42,000");
        assert_eq!(fmt_amount(999.0, 0), "999");
        assert_eq!(fmt_amount(1_234_567.891, 2), "1,234,567.89");
        assert_eq!(fmt_amount(-0.004, 2), "0.00");
        assert_eq!(fmt_amount(-12_345.5, 2), "-12,345.50");
    }

    #[test]
    fn test_compose_symbol() {
        assert_eq!(compose_symbol("AAPL", "US"), "AAPL");
        assert_eq!(compose_symbol("aapl", "us"), "AAPL");
        assert_eq!(compose_symbol("sap", "de"), "SAP.DE");
        assert_eq!(compose_symbol(" shel ", "L"), "SHEL.L");
    }
}
