//! equitylens: one-shot equity dashboard in the terminal.
//!
//! Fetches price history, fundamentals and statements for one or two tickers,
//! then prints return/risk figures, a DCF valuation and, for two tickers, a
//! side-by-side comparison. Sections that cannot be computed print as N/A.
//!
//! Usage:
//!   cargo run -p dashboard -- --tickers AAPL
//!   cargo run -p dashboard -- --tickers AAPL MSFT --period 3y --metric pb
//!   cargo run -p dashboard -- --tickers INFY.NS --currency USD --fx-rate 0.012
//!   cargo run -p dashboard -- --tickers MSFT --statement income --quarterly --json

mod args;
mod render;

use analysis_orchestrator::{DashboardConfig, DashboardOrchestrator};

const DEFAULT_LOG_FILTER: &str = "equitylens=info,analysis_orchestrator=info,market_data=warn";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    // stdout is reserved for the report itself
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = DashboardConfig::from_env()?;

    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.is_empty() || argv.iter().any(|a| a == "--help" || a == "-h") {
        eprint!("{}", args::USAGE);
        std::process::exit(if argv.is_empty() { 2 } else { 0 });
    }

    let cli = match args::parse_args(&argv, &config) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {:#}", e);
            eprintln!();
            eprint!("{}", args::USAGE);
            std::process::exit(2);
        }
    };

    let orchestrator = DashboardOrchestrator::from_config(config)?;
    tracing::info!(
        "Provider {} (timeout {:?}, cache TTL {}s)",
        orchestrator.config().provider_url,
        orchestrator.config().fetch_timeout,
        orchestrator.cache().ttl().num_seconds()
    );
    let report = orchestrator.run(&cli.request).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::render_text(&report));
    }

    Ok(())
}
