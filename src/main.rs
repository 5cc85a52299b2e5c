mod config;
mod error;
mod models;
mod normalizer;
mod provider;
mod report;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;
use crate::error::FetchError;
use crate::models::{Frequency, QueryResult, StatementKind};
use crate::normalizer::Normalizer;
use crate::provider::YahooProvider;

#[derive(Parser)]
#[command(name = "stock-snapshot", about = "Financial statement snapshot for a listed company", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Ticker symbol, e.g. AAPL
    #[arg(short, long)]
    symbol: String,

    /// Country where the stock is traded, e.g. US, DE, L
    #[arg(short, long, default_value = "US")]
    country: String,

    /// Number of most recent reporting periods to keep
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    periods: Option<u16>,

    /// Use quarterly instead of annual statements
    #[arg(short, long)]
    quarterly: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatementArg {
    Income,
    Balance,
    CashFlow,
}

impl From<StatementArg> for StatementKind {
    fn from(arg: StatementArg) -> Self {
        match arg {
            StatementArg::Income => StatementKind::IncomeStatement,
            StatementArg::Balance => StatementKind::BalanceSheet,
            StatementArg::CashFlow => StatementKind::CashFlow,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Show key metrics and the three financial statements
    Show {
        #[command(flatten)]
        query: QueryArgs,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write one financial statement as CSV to stdout
    Export {
        #[command(flatten)]
        query: QueryArgs,

        #[arg(long, value_enum)]
        statement: StatementArg,
    },
}

/// Run one query; on total failure print the single user-facing error and
/// return `None`.
async fn run_query(config: &AppConfig, args: &QueryArgs) -> Result<Option<QueryResult>> {
    let symbol = utils::compose_symbol(&args.symbol, &args.country);
    let periods = args
        .periods
        .map(usize::from)
        .unwrap_or(config.query.lookback_periods);
    let frequency = if args.quarterly {
        Frequency::Quarterly
    } else {
        config.query.frequency
    };

    let _t = utils::Timer::start(format!("Snapshot {}", symbol));
    let provider = YahooProvider::new(&config.provider).context("Failed to build provider")?;
    let normalizer = Normalizer::new(provider).with_frequency(frequency);

    match normalizer.fetch(&symbol, periods).await {
        Ok(result) => Ok(Some(result)),
        Err(e @ FetchError::InvalidLookback) => Err(e.into()),
        Err(e) => {
            info!("Query failed: {}", e);
            eprintln!("{}", report::failure_message(&symbol));
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "stock_snapshot=warn",
        1 => "stock_snapshot=info,warn",
        2 => "stock_snapshot=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Show { query, format } => {
            let Some(result) = run_query(&config, &query).await? else {
                std::process::exit(1);
            };
            info!("{}: {} notices", result.symbol, result.diagnostics.len());

            match format {
                OutputFormat::Text => print!("{}", report::render_text(&result)?),
                OutputFormat::Json => println!("{}", report::render_json(&result)?),
            }
        }

        Command::Export { query, statement } => {
            let Some(result) = run_query(&config, &query).await? else {
                std::process::exit(1);
            };
            let kind = StatementKind::from(statement);

            match result.statement(kind) {
                Some(table) => report::write_csv(table, std::io::stdout().lock())?,
                None => {
                    eprintln!("No {} available for {}.", kind.title(), result.symbol);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
