use analysis_core::{
    AnalysisError, AnalysisPeriod, CashFlowSeries, ExchangeRate, FiscalValue,
    FundamentalsSnapshot, IncomeStatement, StatementKind, StatementPeriod,
};
use chrono::{DateTime, Utc};
use quant_analysis::RiskReturnProfile;
use serde::Serialize;
use valuation_analysis::{
    DcfValuation, MultipleComparison, ValuationAssumptions, ValuationMetric, ValuationVerdict,
};

use crate::cache::CacheMode;

/// One independently computed part of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    Available(T),
    /// `data_gap` separates provider gaps from inputs the caller should change.
    Unavailable {
        code: String,
        message: String,
        data_gap: bool,
    },
}

impl<T> Section<T> {
    /// Convert a section result, logging the degradation instead of failing.
    pub fn from_result(section: &str, symbol: &str, result: Result<T, AnalysisError>) -> Self {
        match result {
            Ok(value) => Section::Available(value),
            Err(e) => {
                tracing::warn!("{} section unavailable for {}: {}", section, symbol, e);
                Section::unavailable(&e)
            }
        }
    }

    pub fn unavailable(error: &AnalysisError) -> Self {
        Section::Unavailable {
            code: error.code().to_string(),
            message: error.to_string(),
            data_gap: error.is_data_gap(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Section::Available(_))
    }

    pub fn available(&self) -> Option<&T> {
        match self {
            Section::Available(value) => Some(value),
            Section::Unavailable { .. } => None,
        }
    }
}

/// Where the exchange rate for a currency conversion comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "source", content = "rate", rename_all = "snake_case")]
pub enum RateSource {
    Static(f64),
    Fetch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyConversion {
    /// Reference currency every monetary figure is expressed in.
    pub target: String,
    pub rate: RateSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatementRequest {
    pub kind: StatementKind,
    pub period: StatementPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRequest {
    pub tickers: Vec<String>,
    pub period: AnalysisPeriod,
    pub assumptions: ValuationAssumptions,
    pub metric: ValuationMetric,
    pub currency: Option<CurrencyConversion>,
    pub statement: Option<StatementRequest>,
    #[serde(skip)]
    pub cache_mode: CacheMode,
}

impl DashboardRequest {
    pub fn new(tickers: Vec<String>, period: AnalysisPeriod) -> Self {
        Self {
            tickers,
            period,
            assumptions: ValuationAssumptions::default(),
            metric: ValuationMetric::TrailingPe,
            currency: None,
            statement: None,
            cache_mode: CacheMode::Use,
        }
    }

    /// One or two non-empty symbols and, for a static conversion, a usable rate.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.tickers.is_empty() || self.tickers.len() > 2 {
            return Err(AnalysisError::InvalidInput(format!(
                "expected one or two tickers, got {}",
                self.tickers.len()
            )));
        }
        if let Some(blank) = self.tickers.iter().find(|t| t.trim().is_empty()) {
            return Err(AnalysisError::InvalidInput(format!(
                "ticker symbol cannot be blank ('{}')",
                blank
            )));
        }
        if let Some(conversion) = &self.currency {
            if conversion.target.trim().is_empty() {
                return Err(AnalysisError::InvalidInput(
                    "reference currency code cannot be blank".to_string(),
                ));
            }
            if let RateSource::Static(rate) = conversion.rate {
                ExchangeRate::new("SOURCE", &conversion.target, rate)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceOverview {
    pub current_price: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub points: Vec<PricePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationSummary {
    pub dcf: DcfValuation,
    pub current_price: Option<f64>,
    pub verdict: Option<ValuationVerdict>,
    pub margin_of_safety_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "statement", rename_all = "snake_case")]
pub enum StatementReport {
    Income(IncomeStatement),
    CashFlow(CashFlowSeries),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerReport {
    pub symbol: String,
    /// Currency the monetary figures below are expressed in, when known.
    pub currency: Option<String>,
    pub conversion: Option<Section<ExchangeRate>>,
    pub fundamentals: Section<FundamentalsSnapshot>,
    pub price: Section<PriceOverview>,
    pub risk_return: Section<RiskReturnProfile>,
    pub cash_flow_trend: Section<Vec<FiscalValue>>,
    pub valuation: Section<ValuationSummary>,
    pub statement: Option<Section<StatementReport>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSeries {
    pub symbol: String,
    pub points: Vec<NormalizedPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub window_years: f64,
    pub normalized: [NormalizedSeries; 2],
    pub cagr_pct: [Option<f64>; 2],
    pub multiple: MultipleComparison,
    /// Why a side's CAGR is missing, one line per side.
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub generated_at: DateTime<Utc>,
    pub period: AnalysisPeriod,
    pub assumptions: ValuationAssumptions,
    pub tickers: Vec<TickerReport>,
    pub comparison: Option<Section<ComparisonReport>>,
}

impl DashboardReport {
    /// Count of sections that could not be produced, across all tickers.
    pub fn unavailable_sections(&self) -> usize {
        let per_ticker: usize = self
            .tickers
            .iter()
            .map(|t| {
                [
                    t.fundamentals.is_available(),
                    t.price.is_available(),
                    t.risk_return.is_available(),
                    t.cash_flow_trend.is_available(),
                    t.valuation.is_available(),
                    t.statement.as_ref().map_or(true, |s| s.is_available()),
                    t.conversion.as_ref().map_or(true, |s| s.is_available()),
                ]
                .iter()
                .filter(|ok| !**ok)
                .count()
            })
            .sum();
        let comparison = self
            .comparison
            .as_ref()
            .map_or(0, |c| usize::from(!c.is_available()));
        per_ticker + comparison
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_serializes_with_status() {
        let ok: Section<f64> = Section::Available(1.5);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"status": "available", "data": 1.5})
        );

        let missing: Section<f64> = Section::unavailable(&AnalysisError::MissingData(
            "shares outstanding not available for ACME".to_string(),
        ));
        let value = serde_json::to_value(&missing).unwrap();
        assert_eq!(value["status"], "unavailable");
        assert_eq!(value["data"]["code"], "missing_data");
        assert_eq!(value["data"]["data_gap"], true);

        let bad_rate: Section<f64> =
            Section::unavailable(&AnalysisError::InvalidRate("rate must be positive".to_string()));
        assert_eq!(serde_json::to_value(&bad_rate).unwrap()["data"]["data_gap"], false);
    }

    #[test]
    fn test_request_validation() {
        let ok = DashboardRequest::new(vec!["AAPL".into(), "MSFT".into()], AnalysisPeriod::OneYear);
        assert!(ok.validate().is_ok());

        let none = DashboardRequest::new(Vec::new(), AnalysisPeriod::OneYear);
        assert!(matches!(none.validate(), Err(AnalysisError::InvalidInput(_))));

        let three = DashboardRequest::new(
            vec!["A".into(), "B".into(), "C".into()],
            AnalysisPeriod::OneYear,
        );
        assert!(three.validate().is_err());

        let blank = DashboardRequest::new(vec!["  ".into()], AnalysisPeriod::OneYear);
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_static_rate_is_checked() {
        let mut request = DashboardRequest::new(vec!["INFY.NS".into()], AnalysisPeriod::OneYear);
        request.currency = Some(CurrencyConversion {
            target: "USD".to_string(),
            rate: RateSource::Static(-0.012),
        });
        assert!(matches!(request.validate(), Err(AnalysisError::InvalidRate(_))));

        request.currency = Some(CurrencyConversion {
            target: "USD".to_string(),
            rate: RateSource::Static(0.012),
        });
        assert!(request.validate().is_ok());
    }
}
