use anyhow::{bail, Context, Result};
use market_data::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use quant_analysis::TRADING_DAYS_PER_YEAR;
use serde::Serialize;
use std::time::Duration;
use valuation_analysis::{AssumptionBounds, ValuationAssumptions, DEFAULT_HORIZON_YEARS};

use crate::cache::DEFAULT_CACHE_TTL_SECS;

pub const MAX_FETCH_TIMEOUT_SECS: f64 = 300.0;
pub const MAX_CACHE_TTL_SECS: i64 = 86_400; // 1 day

#[derive(Debug, Clone, Serialize)]
pub struct DashboardConfig {
    pub provider_url: String,
    pub fetch_timeout: Duration,
    pub cache_ttl_secs: i64,
    pub risk_free_rate: f64,            // 0.04 (4%)
    pub trading_days_per_year: u32,     // 252
    pub default_assumptions: ValuationAssumptions,
    pub assumption_bounds: AssumptionBounds,
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &str, default: &str| -> String {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let timeout_secs: f64 = read(
            "EQUITYLENS_FETCH_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT.as_secs_f64().to_string(),
        )
        .trim()
        .parse()
        .context("EQUITYLENS_FETCH_TIMEOUT_SECS must be a number of seconds")?;
        if !timeout_secs.is_finite() || timeout_secs <= 0.0 || timeout_secs > MAX_FETCH_TIMEOUT_SECS {
            bail!(
                "EQUITYLENS_FETCH_TIMEOUT_SECS must be in (0, {}], got {}",
                MAX_FETCH_TIMEOUT_SECS,
                timeout_secs
            );
        }

        let cache_ttl_secs: i64 = read("EQUITYLENS_CACHE_TTL_SECS", &DEFAULT_CACHE_TTL_SECS.to_string())
            .trim()
            .parse()
            .context("EQUITYLENS_CACHE_TTL_SECS must be a whole number of seconds")?;
        if !(0..=MAX_CACHE_TTL_SECS).contains(&cache_ttl_secs) {
            bail!(
                "EQUITYLENS_CACHE_TTL_SECS must be in 0..={}, got {}",
                MAX_CACHE_TTL_SECS,
                cache_ttl_secs
            );
        }

        let risk_free_rate: f64 = read("EQUITYLENS_RISK_FREE_RATE", "0.04")
            .trim()
            .parse()
            .context("EQUITYLENS_RISK_FREE_RATE must be a fraction, e.g. 0.04")?;

        let trading_days_per_year: u32 = read("EQUITYLENS_TRADING_DAYS", &TRADING_DAYS_PER_YEAR.to_string())
            .trim()
            .parse()
            .context("EQUITYLENS_TRADING_DAYS must be a positive integer")?;
        if trading_days_per_year == 0 {
            bail!("EQUITYLENS_TRADING_DAYS must be greater than zero");
        }

        let defaults = ValuationAssumptions::default();
        let growth: f64 = read("EQUITYLENS_DEFAULT_GROWTH", &defaults.growth_rate().to_string())
            .trim()
            .parse()
            .context("EQUITYLENS_DEFAULT_GROWTH must be a fraction")?;
        let wacc: f64 = read("EQUITYLENS_DEFAULT_WACC", &defaults.discount_rate().to_string())
            .trim()
            .parse()
            .context("EQUITYLENS_DEFAULT_WACC must be a fraction")?;
        let terminal: f64 = read(
            "EQUITYLENS_DEFAULT_TERMINAL_GROWTH",
            &defaults.terminal_growth_rate().to_string(),
        )
        .trim()
        .parse()
        .context("EQUITYLENS_DEFAULT_TERMINAL_GROWTH must be a fraction")?;

        let default_assumptions = ValuationAssumptions::new(growth, wacc, terminal, DEFAULT_HORIZON_YEARS)
            .context("default valuation assumptions are inconsistent")?;

        Ok(Self {
            provider_url: read("EQUITYLENS_PROVIDER_URL", DEFAULT_BASE_URL),
            fetch_timeout: Duration::from_secs_f64(timeout_secs),
            cache_ttl_secs,
            risk_free_rate,
            trading_days_per_year,
            default_assumptions,
            assumption_bounds: AssumptionBounds::default(),
        })
    }

    /// Cache lifetime, clamped to `0..=MAX_CACHE_TTL_SECS` for hand-built configs.
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs.clamp(0, MAX_CACHE_TTL_SECS))
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            provider_url: DEFAULT_BASE_URL.to_string(),
            fetch_timeout: DEFAULT_TIMEOUT,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            risk_free_rate: 0.04,
            trading_days_per_year: TRADING_DAYS_PER_YEAR,
            default_assumptions: ValuationAssumptions::default(),
            assumption_bounds: AssumptionBounds::default(),
        }
    }
}
