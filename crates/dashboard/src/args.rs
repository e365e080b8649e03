use analysis_core::{AnalysisPeriod, StatementKind, StatementPeriod};
use analysis_orchestrator::{
    CacheMode, CurrencyConversion, DashboardConfig, DashboardRequest, RateSource, StatementRequest,
};
use anyhow::{bail, Context, Result};
use valuation_analysis::{ValuationAssumptions, ValuationMetric};

pub const USAGE: &str = "\
Usage:
  equitylens --tickers AAPL [MSFT] [options]

Options:
  --period 6mo|1y|3y|5y      Price history window (default: 5y)
  --growth PCT               FCF growth, 0-20 (default: 8)
  --wacc PCT                 Discount rate, 5-15 (default: 10)
  --terminal-growth PCT      Terminal growth, 1-5 (default: 3)
  --metric pe|pb             Multiple compared between two tickers (default: pe)
  --currency CODE            Express monetary figures in CODE
  --fx-rate R                Static rate for --currency instead of fetching one
  --statement income|cashflow
  --quarterly                Quarterly instead of annual statements
  --refresh                  Ignore cached data and refetch
  --json                     Print the report as JSON
";

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub request: DashboardRequest,
    pub json: bool,
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|a| a == flag) {
        None => Ok(None),
        Some(i) => match args.get(i + 1) {
            Some(value) if !value.starts_with("--") => Ok(Some(value.as_str())),
            _ => bail!("{} needs a value", flag),
        },
    }
}

fn percent(args: &[String], flag: &str) -> Result<Option<f64>> {
    flag_value(args, flag)?
        .map(|v| {
            v.trim_end_matches('%')
                .parse::<f64>()
                .map(|pct| pct / 100.0)
                .with_context(|| format!("{} expects a percentage, got '{}'", flag, v))
        })
        .transpose()
}

/// Parse command-line arguments (without the program name).
pub fn parse_args(args: &[String], config: &DashboardConfig) -> Result<CliArgs> {
    let tickers: Vec<String> = match args.iter().position(|a| a == "--tickers") {
        Some(idx) => args[idx + 1..]
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .map(|t| t.trim().to_ascii_uppercase())
            .collect(),
        None => bail!("--tickers is required"),
    };
    if tickers.is_empty() || tickers.len() > 2 {
        bail!("--tickers takes one or two symbols, got {}", tickers.len());
    }

    let period = match flag_value(args, "--period")? {
        Some(code) => AnalysisPeriod::parse(code)?,
        None => AnalysisPeriod::FiveYears,
    };

    let defaults = config.default_assumptions;
    let growth = percent(args, "--growth")?;
    let wacc = percent(args, "--wacc")?;
    let terminal = percent(args, "--terminal-growth")?;
    let assumptions = ValuationAssumptions::new(
        growth.unwrap_or(defaults.growth_rate()),
        wacc.unwrap_or(defaults.discount_rate()),
        terminal.unwrap_or(defaults.terminal_growth_rate()),
        defaults.horizon_years(),
    )?;
    if growth.is_some() || wacc.is_some() || terminal.is_some() {
        assumptions.validate_within(&config.assumption_bounds)?;
    }

    let metric = match flag_value(args, "--metric")? {
        Some(value) => ValuationMetric::parse(value)?,
        None => ValuationMetric::TrailingPe,
    };

    let fx_rate = flag_value(args, "--fx-rate")?
        .map(|v| {
            v.parse::<f64>()
                .with_context(|| format!("--fx-rate expects a number, got '{}'", v))
        })
        .transpose()?;
    let currency = match (flag_value(args, "--currency")?, fx_rate) {
        (Some(code), rate) => Some(CurrencyConversion {
            target: code.to_ascii_uppercase(),
            rate: rate.map_or(RateSource::Fetch, RateSource::Static),
        }),
        (None, Some(_)) => bail!("--fx-rate only makes sense together with --currency"),
        (None, None) => None,
    };

    let statement_period = if args.iter().any(|a| a == "--quarterly") {
        StatementPeriod::Quarterly
    } else {
        StatementPeriod::Annual
    };
    let statement = flag_value(args, "--statement")?
        .map(StatementKind::parse)
        .transpose()?
        .map(|kind| StatementRequest {
            kind,
            period: statement_period,
        });

    let cache_mode = if args.iter().any(|a| a == "--refresh") {
        CacheMode::Refresh
    } else {
        CacheMode::Use
    };

    let request = DashboardRequest {
        tickers,
        period,
        assumptions,
        metric,
        currency,
        statement,
        cache_mode,
    };
    request.validate()?;

    Ok(CliArgs {
        request,
        json: args.iter().any(|a| a == "--json"),
    })
}
