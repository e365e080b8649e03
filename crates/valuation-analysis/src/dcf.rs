use analysis_core::{AnalysisError, CashFlowSeries, FiscalValue, FundamentalsSnapshot};
use chrono::NaiveDate;
use serde::Serialize;

pub const DEFAULT_GROWTH_RATE: f64 = 0.08;
pub const DEFAULT_DISCOUNT_RATE: f64 = 0.10;
pub const DEFAULT_TERMINAL_GROWTH_RATE: f64 = 0.03;
pub const DEFAULT_HORIZON_YEARS: u32 = 5;
pub const MAX_HORIZON_YEARS: u32 = 100;

/// Growth and discount inputs for a DCF run. Only constructible through
/// [`ValuationAssumptions::new`], so a value in hand always has
/// `discount_rate > terminal_growth_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValuationAssumptions {
    growth_rate: f64,
    discount_rate: f64,
    terminal_growth_rate: f64,
    horizon_years: u32,
}

impl ValuationAssumptions {
    pub fn new(
        growth_rate: f64,
        discount_rate: f64,
        terminal_growth_rate: f64,
        horizon_years: u32,
    ) -> Result<Self, AnalysisError> {
        for (name, value) in [
            ("growth rate", growth_rate),
            ("discount rate", discount_rate),
            ("terminal growth rate", terminal_growth_rate),
        ] {
            if !value.is_finite() {
                return Err(AnalysisError::InvalidAssumptions(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
        if !(1..=MAX_HORIZON_YEARS).contains(&horizon_years) {
            return Err(AnalysisError::InvalidAssumptions(format!(
                "projection horizon must be 1..={} years, got {}",
                MAX_HORIZON_YEARS, horizon_years
            )));
        }
        if growth_rate <= -1.0 || discount_rate <= -1.0 {
            return Err(AnalysisError::InvalidAssumptions(format!(
                "growth ({}) and discount ({}) rates must be above -100%",
                growth_rate, discount_rate
            )));
        }
        if discount_rate <= terminal_growth_rate {
            return Err(AnalysisError::InvalidAssumptions(format!(
                "discount rate ({:.4}) must exceed terminal growth rate ({:.4})",
                discount_rate, terminal_growth_rate
            )));
        }

        Ok(Self {
            growth_rate,
            discount_rate,
            terminal_growth_rate,
            horizon_years,
        })
    }

    pub fn growth_rate(&self) -> f64 {
        self.growth_rate
    }

    pub fn discount_rate(&self) -> f64 {
        self.discount_rate
    }

    pub fn terminal_growth_rate(&self) -> f64 {
        self.terminal_growth_rate
    }

    pub fn horizon_years(&self) -> u32 {
        self.horizon_years
    }

    /// Reject values outside the ranges offered to users.
    pub fn validate_within(&self, bounds: &AssumptionBounds) -> Result<(), AnalysisError> {
        check_range("growth rate", self.growth_rate, bounds.growth)?;
        check_range("discount rate", self.discount_rate, bounds.discount)?;
        check_range("terminal growth rate", self.terminal_growth_rate, bounds.terminal_growth)
    }
}

impl Default for ValuationAssumptions {
    fn default() -> Self {
        Self {
            growth_rate: DEFAULT_GROWTH_RATE,
            discount_rate: DEFAULT_DISCOUNT_RATE,
            terminal_growth_rate: DEFAULT_TERMINAL_GROWTH_RATE,
            horizon_years: DEFAULT_HORIZON_YEARS,
        }
    }
}

/// Inclusive (min, max) ranges, as fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AssumptionBounds {
    pub growth: (f64, f64),
    pub discount: (f64, f64),
    pub terminal_growth: (f64, f64),
}

impl Default for AssumptionBounds {
    fn default() -> Self {
        Self {
            growth: (0.0, 0.20),
            discount: (0.05, 0.15),
            terminal_growth: (0.01, 0.05),
        }
    }
}

fn check_range(name: &str, value: f64, (min, max): (f64, f64)) -> Result<(), AnalysisError> {
    if value < min || value > max {
        return Err(AnalysisError::InvalidAssumptions(format!(
            "{} {:.2}% is outside the allowed range {:.2}%..={:.2}%",
            name,
            value * 100.0,
            min * 100.0,
            max * 100.0
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DcfValuation {
    pub base_cash_flow: f64,
    pub base_fiscal_date: Option<NaiveDate>,
    pub assumptions: ValuationAssumptions,
    /// Year 1..=horizon projected free cash flow.
    pub projected_cash_flows: Vec<f64>,
    pub present_values: Vec<f64>,
    pub terminal_value: f64,
    pub discounted_terminal_value: f64,
    pub intrinsic_value: f64,
    pub shares_outstanding: Option<f64>,
    pub intrinsic_value_per_share: Option<f64>,
}

impl DcfValuation {
    pub fn verdict(&self, current_price: f64) -> Option<ValuationVerdict> {
        self.intrinsic_value_per_share
            .map(|per_share| ValuationVerdict::classify(per_share, current_price))
    }
}

/// Project, discount and sum free cash flows plus a Gordon-growth terminal value.
pub fn discounted_cash_flow(
    latest_fcf: f64,
    assumptions: &ValuationAssumptions,
) -> Result<DcfValuation, AnalysisError> {
    if !latest_fcf.is_finite() {
        return Err(AnalysisError::InvalidInput(format!(
            "free cash flow must be finite, got {}",
            latest_fcf
        )));
    }

    let growth = 1.0 + assumptions.growth_rate;
    let discount = 1.0 + assumptions.discount_rate;
    let horizon = i32::try_from(assumptions.horizon_years).map_err(|_| {
        AnalysisError::InvalidAssumptions(format!(
            "projection horizon of {} years is out of range",
            assumptions.horizon_years
        ))
    })?;

    let projected_cash_flows: Vec<f64> = (1..=horizon)
        .map(|year| latest_fcf * growth.powi(year))
        .collect();
    let present_values: Vec<f64> = projected_cash_flows
        .iter()
        .zip(1..=horizon)
        .map(|(fcf, year)| fcf / discount.powi(year))
        .collect();

    let final_year = projected_cash_flows.last().copied().unwrap_or(latest_fcf);
    let terminal_value = final_year * (1.0 + assumptions.terminal_growth_rate)
        / (assumptions.discount_rate - assumptions.terminal_growth_rate);
    let discounted_terminal_value = terminal_value / discount.powi(horizon);
    let intrinsic_value = present_values.iter().sum::<f64>() + discounted_terminal_value;

    let overflowed = projected_cash_flows
        .iter()
        .chain(&present_values)
        .chain([&terminal_value, &discounted_terminal_value, &intrinsic_value])
        .any(|v| !v.is_finite());
    if overflowed {
        return Err(AnalysisError::InvalidInput(format!(
            "DCF of free cash flow {} at growth {:.4} over {} years does not produce a finite value",
            latest_fcf, assumptions.growth_rate, horizon
        )));
    }

    Ok(DcfValuation {
        base_cash_flow: latest_fcf,
        base_fiscal_date: None,
        assumptions: *assumptions,
        projected_cash_flows,
        present_values,
        terminal_value,
        discounted_terminal_value,
        intrinsic_value,
        shares_outstanding: None,
        intrinsic_value_per_share: None,
    })
}

/// Full per-share pipeline: latest reported FCF, then shares outstanding,
/// then the projection. Missing inputs fail before any arithmetic runs.
pub fn dcf_per_share(
    cash_flow: &CashFlowSeries,
    fundamentals: &FundamentalsSnapshot,
    assumptions: &ValuationAssumptions,
) -> Result<DcfValuation, AnalysisError> {
    let FiscalValue { fiscal_date, value } = cash_flow.latest_free_cash_flow()?;
    let shares = fundamentals.require_shares_outstanding()?;

    tracing::debug!(
        "DCF for {} from FCF {:.0} ({}), {} shares",
        cash_flow.symbol,
        value,
        fiscal_date,
        shares
    );

    let mut valuation = discounted_cash_flow(value, assumptions)?;
    valuation.base_fiscal_date = Some(fiscal_date);
    valuation.shares_outstanding = Some(shares);
    valuation.intrinsic_value_per_share = Some(valuation.intrinsic_value / shares);
    Ok(valuation)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationVerdict {
    Undervalued,
    Overvalued,
}

impl ValuationVerdict {
    /// Strictly above the market price is undervalued; a tie counts as overvalued.
    pub fn classify(intrinsic_value_per_share: f64, current_price: f64) -> Self {
        if intrinsic_value_per_share > current_price {
            ValuationVerdict::Undervalued
        } else {
            ValuationVerdict::Overvalued
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValuationVerdict::Undervalued => "Undervalued",
            ValuationVerdict::Overvalued => "Overvalued",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{CashFlowEntry, StatementPeriod};
    use approx::assert_relative_eq;

    fn fcf_entry(year: i32, fcf: Option<f64>) -> CashFlowEntry {
        CashFlowEntry {
            fiscal_date: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
            operating_cash_flow: None,
            capital_expenditure: None,
            free_cash_flow: fcf,
        }
    }

    fn fundamentals_with_shares(shares: Option<f64>) -> FundamentalsSnapshot {
        FundamentalsSnapshot {
            shares_outstanding: shares,
            ..FundamentalsSnapshot::new("ACME")
        }
    }

    #[test]
    fn test_reference_valuation() {
        let assumptions = ValuationAssumptions::new(0.08, 0.10, 0.03, 5).unwrap();
        let cash_flow = CashFlowSeries {
            symbol: "ACME".to_string(),
            period: StatementPeriod::Annual,
            entries: vec![fcf_entry(2022, Some(80.0)), fcf_entry(2023, Some(100.0))],
        };
        let valuation =
            dcf_per_share(&cash_flow, &fundamentals_with_shares(Some(50.0)), &assumptions).unwrap();

        let expected = [108.0, 116.64, 125.9712, 136.048896, 146.93280768];
        assert_eq!(valuation.projected_cash_flows.len(), 5);
        for (actual, expected) in valuation.projected_cash_flows.iter().zip(expected) {
            assert_relative_eq!(*actual, expected, epsilon = 1e-9);
        }
        assert_relative_eq!(valuation.present_values[0], 98.1818, epsilon = 1e-4);
        assert_relative_eq!(valuation.terminal_value, 2162.0113, epsilon = 1e-4);
        assert_relative_eq!(valuation.discounted_terminal_value, 1342.4389, epsilon = 1e-4);
        assert_relative_eq!(valuation.intrinsic_value, 1815.8184, epsilon = 1e-4);

        let per_share = valuation.intrinsic_value_per_share.unwrap();
        assert_eq!((per_share * 100.0).round() / 100.0, 36.32);
        assert_eq!(valuation.base_fiscal_date, NaiveDate::from_ymd_opt(2023, 12, 31));
    }

    #[test]
    fn test_latest_fcf_ignores_provider_order() {
        let assumptions = ValuationAssumptions::default();
        let cash_flow = CashFlowSeries {
            symbol: "ACME".to_string(),
            period: StatementPeriod::Annual,
            entries: vec![
                fcf_entry(2021, Some(10.0)),
                fcf_entry(2023, None),
                fcf_entry(2022, Some(100.0)),
            ],
        };
        let valuation =
            dcf_per_share(&cash_flow, &fundamentals_with_shares(Some(1.0)), &assumptions).unwrap();
        assert_eq!(valuation.base_cash_flow, 100.0);
    }

    #[test]
    fn test_discount_not_above_terminal_growth_is_rejected() {
        for (discount, terminal) in [(0.03, 0.03), (0.02, 0.03), (0.05, 0.10), (-0.5, 0.0)] {
            assert!(matches!(
                ValuationAssumptions::new(0.05, discount, terminal, 5),
                Err(AnalysisError::InvalidAssumptions(_))
            ));
        }
    }

    #[test]
    fn test_other_invalid_assumptions() {
        assert!(ValuationAssumptions::new(f64::NAN, 0.10, 0.03, 5).is_err());
        assert!(ValuationAssumptions::new(0.05, 0.10, 0.03, 0).is_err());
        assert!(ValuationAssumptions::new(-1.0, 0.10, 0.03, 5).is_err());
    }

    #[test]
    fn test_horizon_is_bounded() {
        assert!(ValuationAssumptions::new(0.08, 0.10, 0.03, MAX_HORIZON_YEARS).is_ok());
        for horizon in [MAX_HORIZON_YEARS + 1, 2_000_000_000, u32::MAX] {
            assert!(matches!(
                ValuationAssumptions::new(0.08, 0.10, 0.03, horizon),
                Err(AnalysisError::InvalidAssumptions(_))
            ));
        }

        let longest = ValuationAssumptions::new(0.08, 0.10, 0.03, MAX_HORIZON_YEARS).unwrap();
        let valuation = discounted_cash_flow(100.0, &longest).unwrap();
        assert_eq!(valuation.projected_cash_flows.len(), MAX_HORIZON_YEARS as usize);
    }

    #[test]
    fn test_positive_inputs_give_positive_finite_value() {
        for &fcf in &[0.01, 1.0, 250.0, 1.0e9] {
            for &growth in &[-0.2, 0.0, 0.05, 0.2, 0.5] {
                for &(discount, terminal) in &[(0.05, 0.01), (0.10, 0.03), (0.15, 0.149), (0.3, 0.001)] {
                    for horizon in [1, 5, 10] {
                        let assumptions =
                            ValuationAssumptions::new(growth, discount, terminal, horizon).unwrap();
                        let value = discounted_cash_flow(fcf, &assumptions).unwrap().intrinsic_value;
                        assert!(value.is_finite() && value > 0.0, "value {} for fcf {}", value, fcf);
                    }
                }
            }
        }

        // growth that overflows f64 is an error, never an infinite value
        let explosive = ValuationAssumptions::new(1.0e6, 0.10, 0.03, MAX_HORIZON_YEARS).unwrap();
        assert!(matches!(
            discounted_cash_flow(100.0, &explosive),
            Err(AnalysisError::InvalidInput(_))
        ));
        assert!(matches!(
            discounted_cash_flow(f64::MAX, &ValuationAssumptions::default()),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_cash_flow_fails_fast() {
        let cash_flow = CashFlowSeries {
            symbol: "ACME".to_string(),
            period: StatementPeriod::Annual,
            entries: Vec::new(),
        };
        let err = dcf_per_share(
            &cash_flow,
            &fundamentals_with_shares(None),
            &ValuationAssumptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptySeries(_)));
    }

    #[test]
    fn test_missing_shares_is_reported() {
        let cash_flow = CashFlowSeries {
            symbol: "ACME".to_string(),
            period: StatementPeriod::Annual,
            entries: vec![fcf_entry(2023, Some(100.0))],
        };
        for shares in [None, Some(0.0), Some(-10.0)] {
            let err = dcf_per_share(
                &cash_flow,
                &fundamentals_with_shares(shares),
                &ValuationAssumptions::default(),
            )
            .unwrap_err();
            assert!(matches!(err, AnalysisError::MissingData(_)));
        }
    }

    #[test]
    fn test_verdict() {
        assert_eq!(ValuationVerdict::classify(36.32, 30.0), ValuationVerdict::Undervalued);
        assert_eq!(ValuationVerdict::classify(36.32, 40.0), ValuationVerdict::Overvalued);
        assert_eq!(ValuationVerdict::classify(36.32, 36.32), ValuationVerdict::Overvalued);
    }

    #[test]
    fn test_bounds() {
        let bounds = AssumptionBounds::default();
        assert!(ValuationAssumptions::default().validate_within(&bounds).is_ok());
        let too_fast = ValuationAssumptions::new(0.25, 0.10, 0.03, 5).unwrap();
        assert!(matches!(
            too_fast.validate_within(&bounds),
            Err(AnalysisError::InvalidAssumptions(_))
        ));
        let cheap_capital = ValuationAssumptions::new(0.05, 0.04, 0.01, 5).unwrap();
        assert!(cheap_capital.validate_within(&bounds).is_err());
    }
}
