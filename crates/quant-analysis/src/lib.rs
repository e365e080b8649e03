//! Return and risk analytics over a single price history.
//!
//! Every function is pure and returns a new value. Percentages are on a 0-100
//! scale (`cagr`, `max_drawdown`); volatility and Sharpe inputs are fractions.

use analysis_core::{AnalysisError, PriceSeries};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// Simple day-over-day returns, one fewer than the number of closes.
pub fn daily_returns(series: &PriceSeries) -> Vec<f64> {
    series
        .bars()
        .windows(2)
        .map(|w| (w[1].close - w[0].close) / w[0].close)
        .collect()
}

/// Closes rebased so the first observation is 1.0.
pub fn normalize(series: &PriceSeries) -> Result<Vec<f64>, AnalysisError> {
    let first = series.first_close().ok_or_else(|| {
        AnalysisError::EmptySeries(format!("no prices to normalize for {}", series.symbol()))
    })?;
    if first == 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "{} starts at a zero price and cannot be normalized",
            series.symbol()
        )));
    }
    Ok(series.bars().iter().map(|b| b.close / first).collect())
}

/// Compound annual growth rate between the first and last close, in percent.
pub fn cagr(series: &PriceSeries, years: f64) -> Result<f64, AnalysisError> {
    if !years.is_finite() || years <= 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "CAGR horizon must be a positive number of years, got {}",
            years
        )));
    }
    let (first, last) = match (series.first_close(), series.last_close()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(AnalysisError::EmptySeries(format!(
                "no prices to compute CAGR for {}",
                series.symbol()
            )))
        }
    };
    if first <= 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "{} starting price must be positive for CAGR, got {}",
            series.symbol(),
            first
        )));
    }
    if last < 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "{} ending price is negative ({})",
            series.symbol(),
            last
        )));
    }
    Ok(((last / first).powf(1.0 / years) - 1.0) * 100.0)
}

/// Annualized volatility of daily returns as a fraction (0.25 == 25%).
///
/// Uses the sample standard deviation. A two-point series has a single
/// return and therefore no dispersion, so it yields 0.
pub fn volatility(series: &PriceSeries, trading_days_per_year: u32) -> Result<f64, AnalysisError> {
    if series.len() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "volatility needs at least 2 prices, {} has {}",
            series.symbol(),
            series.len()
        )));
    }
    if trading_days_per_year == 0 {
        return Err(AnalysisError::InvalidInput(
            "trading days per year must be greater than zero".to_string(),
        ));
    }

    let returns = daily_returns(series);
    if returns.iter().any(|r| !r.is_finite()) {
        return Err(AnalysisError::InvalidInput(format!(
            "{} contains a zero price, daily returns are undefined",
            series.symbol()
        )));
    }

    let std_dev = if returns.len() < 2 { 0.0 } else { returns.iter().std_dev() };
    Ok(std_dev * f64::from(trading_days_per_year).sqrt())
}

/// Excess return per unit of volatility. `None` when volatility is zero or
/// not finite.
pub fn sharpe_ratio(annualized_return: f64, annualized_volatility: f64, risk_free_rate: f64) -> Option<f64> {
    if annualized_volatility == 0.0 || !annualized_volatility.is_finite() {
        return None;
    }
    Some((annualized_return - risk_free_rate) / annualized_volatility)
}

/// Largest peak-to-trough decline, in percent.
pub fn max_drawdown(series: &PriceSeries) -> Result<f64, AnalysisError> {
    let closes = series.closes();
    let Some(&first) = closes.first() else {
        return Err(AnalysisError::EmptySeries(format!(
            "no prices to compute drawdown for {}",
            series.symbol()
        )));
    };

    let mut peak = first;
    let mut max_dd = 0.0;
    for &price in &closes {
        if price > peak {
            peak = price;
        }
        if peak > 0.0 {
            let drawdown = (peak - price) / peak;
            if drawdown > max_dd {
                max_dd = drawdown;
            }
        }
    }

    Ok(max_dd * 100.0)
}

/// Headline return/risk figures for one symbol. Each metric is computed
/// independently; a failure leaves that field empty and records why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReturnProfile {
    pub symbol: String,
    pub years: f64,
    pub current_price: Option<f64>,
    pub cagr_pct: Option<f64>,
    pub annualized_volatility: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
    pub notes: Vec<String>,
}

impl RiskReturnProfile {
    pub fn compute(
        series: &PriceSeries,
        years: f64,
        risk_free_rate: f64,
        trading_days_per_year: u32,
    ) -> Self {
        let mut notes = Vec::new();
        let mut keep = |result: Result<f64, AnalysisError>, label: &str| match result {
            Ok(value) => Some(value),
            Err(e) => {
                notes.push(format!("{}: {}", label, e));
                None
            }
        };

        let cagr_pct = keep(cagr(series, years), "cagr");
        let annualized_volatility = keep(volatility(series, trading_days_per_year), "volatility");
        let max_drawdown_pct = keep(max_drawdown(series), "max_drawdown");

        let sharpe_ratio = match (cagr_pct, annualized_volatility) {
            (Some(ret), Some(vol)) => sharpe_ratio(ret / 100.0, vol, risk_free_rate),
            _ => None,
        };

        Self {
            symbol: series.symbol().to_string(),
            years,
            current_price: series.last_close(),
            cagr_pct,
            annualized_volatility,
            sharpe_ratio,
            max_drawdown_pct,
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{AnalysisPeriod, Bar};
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn series_from(symbol: &str, closes: &[f64]) -> PriceSeries {
        let origin = Utc.with_ymd_and_hms(2021, 1, 4, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: origin + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000.0,
            })
            .collect();
        PriceSeries::new(symbol, AnalysisPeriod::ThreeYears, bars).unwrap()
    }

    #[test]
    fn test_normalize_starts_at_one() {
        let series = series_from("AAPL", &[50.0, 55.0, 45.0, 60.0]);
        let normalized = normalize(&series).unwrap();
        assert_eq!(normalized.len(), series.len());
        assert_eq!(normalized[0], 1.0);
        assert_relative_eq!(normalized[3], 1.2);
    }

    #[test]
    fn test_normalize_empty_series() {
        let series = series_from("AAPL", &[]);
        assert!(matches!(normalize(&series), Err(AnalysisError::EmptySeries(_))));
    }

    #[test]
    fn test_cagr_two_series_same_growth() {
        let a = series_from("AAA", &[100.0, 120.0, 150.0]);
        let b = series_from("BBB", &[100.0, 90.0, 150.0]);
        let expected = (1.5_f64.powf(1.0 / 3.0) - 1.0) * 100.0;

        let cagr_a = cagr(&a, 3.0).unwrap();
        let cagr_b = cagr(&b, 3.0).unwrap();
        assert_relative_eq!(cagr_a, expected, epsilon = 1e-12);
        assert_eq!(cagr_a, cagr_b);
        assert_relative_eq!(cagr_a, 14.47, epsilon = 0.005);
    }

    #[test]
    fn test_cagr_invariant_under_scaling() {
        let base = [40.0, 42.5, 39.0, 47.25, 51.0];
        let scaled: Vec<f64> = base.iter().map(|p| p * 7.3).collect();
        let plain = cagr(&series_from("A", &base), 1.5).unwrap();
        let rescaled = cagr(&series_from("A", &scaled), 1.5).unwrap();
        assert_relative_eq!(plain, rescaled, epsilon = 1e-9);
    }

    #[test]
    fn test_cagr_rejects_bad_inputs() {
        let series = series_from("A", &[100.0, 150.0]);
        assert!(matches!(cagr(&series, 0.0), Err(AnalysisError::InvalidInput(_))));
        assert!(matches!(cagr(&series, -1.0), Err(AnalysisError::InvalidInput(_))));

        let zero_start = series_from("A", &[0.0, 150.0]);
        assert!(matches!(cagr(&zero_start, 3.0), Err(AnalysisError::InvalidInput(_))));

        let negative_start = series_from("A", &[-5.0, 150.0]);
        assert!(matches!(cagr(&negative_start, 3.0), Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn test_constant_series_has_zero_volatility_and_no_sharpe() {
        let series = series_from("FLAT", &[25.0; 30]);
        let vol = volatility(&series, TRADING_DAYS_PER_YEAR).unwrap();
        assert_eq!(vol, 0.0);
        assert_eq!(sharpe_ratio(0.05, vol, 0.04), None);
    }

    #[test]
    fn test_volatility_needs_two_points() {
        let series = series_from("ONE", &[25.0]);
        assert!(matches!(
            volatility(&series, TRADING_DAYS_PER_YEAR),
            Err(AnalysisError::InsufficientData(_))
        ));
        let two = series_from("TWO", &[25.0, 26.0]);
        assert_eq!(volatility(&two, TRADING_DAYS_PER_YEAR).unwrap(), 0.0);
    }

    #[test]
    fn test_volatility_annualizes_sample_std() {
        // returns: +10%, -10%  -> mean 0, sample std = sqrt(0.02)
        let series = series_from("X", &[100.0, 110.0, 99.0]);
        let vol = volatility(&series, 252).unwrap();
        assert_relative_eq!(vol, 0.02_f64.sqrt() * 252.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(
            volatility(&series, 1).unwrap() * 252.0_f64.sqrt(),
            vol,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_sharpe_ratio() {
        assert_relative_eq!(sharpe_ratio(0.12, 0.20, 0.04).unwrap(), 0.4, epsilon = 1e-12);
        assert_relative_eq!(sharpe_ratio(0.02, 0.10, 0.04).unwrap(), -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_max_drawdown() {
        let series = series_from("DD", &[100.0, 120.0, 90.0, 110.0, 80.0, 130.0]);
        // peak 120 -> trough 80
        assert_relative_eq!(max_drawdown(&series).unwrap(), 100.0 / 3.0, epsilon = 1e-9);
        assert_eq!(max_drawdown(&series_from("UP", &[1.0, 2.0, 3.0])).unwrap(), 0.0);
    }

    #[test]
    fn test_profile_keeps_independent_metrics() {
        let series = series_from("ONE", &[25.0]);
        let profile = RiskReturnProfile::compute(&series, 1.0, 0.04, TRADING_DAYS_PER_YEAR);
        assert_eq!(profile.cagr_pct, Some(0.0));
        assert_eq!(profile.annualized_volatility, None);
        assert_eq!(profile.sharpe_ratio, None);
        assert_eq!(profile.max_drawdown_pct, Some(0.0));
        assert_eq!(profile.notes.len(), 1);
        assert!(profile.notes[0].starts_with("volatility"));
    }

    #[test]
    fn test_profile_uses_cagr_as_annual_return() {
        let series = series_from("X", &[100.0, 110.0, 99.0, 121.0]);
        let profile = RiskReturnProfile::compute(&series, 1.0, 0.04, 252);
        let vol = profile.annualized_volatility.unwrap();
        let expected = (0.21 - 0.04) / vol;
        assert_relative_eq!(profile.sharpe_ratio.unwrap(), expected, epsilon = 1e-9);
        assert_eq!(profile.current_price, Some(121.0));
    }
}
