//! Errors that abort a whole query.

use thiserror::Error;

/// Total failure of a fetch. Partial gaps never surface here; they travel as
/// diagnostics inside the result.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Lookback window of zero periods
    #[error("lookback must cover at least one reporting period")]
    InvalidLookback,

    /// The market-data provider call itself faulted
    #[error("provider request failed for {symbol}: {cause:#}")]
    Provider {
        symbol: String,
        cause: anyhow::Error,
    },

    /// None of the three statements came back
    #[error("no financial statement data for {symbol}")]
    NoStatementData { symbol: String },
}
