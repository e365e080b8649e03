use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// OHLCV bar data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Look-back window offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPeriod {
    SixMonths,
    OneYear,
    ThreeYears,
    FiveYears,
}

impl AnalysisPeriod {
    pub const ALL: [AnalysisPeriod; 4] = [
        AnalysisPeriod::SixMonths,
        AnalysisPeriod::OneYear,
        AnalysisPeriod::ThreeYears,
        AnalysisPeriod::FiveYears,
    ];

    /// Range code understood by chart endpoints
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisPeriod::SixMonths => "6mo",
            AnalysisPeriod::OneYear => "1y",
            AnalysisPeriod::ThreeYears => "3y",
            AnalysisPeriod::FiveYears => "5y",
        }
    }

    pub fn years(&self) -> f64 {
        match self {
            AnalysisPeriod::SixMonths => 0.5,
            AnalysisPeriod::OneYear => 1.0,
            AnalysisPeriod::ThreeYears => 3.0,
            AnalysisPeriod::FiveYears => 5.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisPeriod::SixMonths => "6 Months",
            AnalysisPeriod::OneYear => "1 Year",
            AnalysisPeriod::ThreeYears => "3 Years",
            AnalysisPeriod::FiveYears => "5 Years",
        }
    }

    pub fn parse(code: &str) -> Result<Self, AnalysisError> {
        let normalized = code.trim().to_ascii_lowercase();
        AnalysisPeriod::ALL
            .into_iter()
            .find(|p| p.code() == normalized)
            .ok_or_else(|| {
                AnalysisError::InvalidInput(format!(
                    "unknown analysis period '{}' (expected 6mo, 1y, 3y or 5y)",
                    code
                ))
            })
    }
}

/// Daily price history for one symbol. Timestamps are strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    period: AnalysisPeriod,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(
        symbol: impl Into<String>,
        period: AnalysisPeriod,
        bars: Vec<Bar>,
    ) -> Result<Self, AnalysisError> {
        let symbol = symbol.into();
        if let Some(pos) = bars.windows(2).position(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(AnalysisError::InvalidInput(format!(
                "{} price history is not strictly increasing at row {} ({})",
                symbol,
                pos + 1,
                bars[pos + 1].timestamp
            )));
        }
        if let Some(bar) = bars.iter().find(|b| !b.close.is_finite()) {
            return Err(AnalysisError::InvalidInput(format!(
                "{} has a non-finite close at {}",
                symbol, bar.timestamp
            )));
        }
        Ok(Self { symbol, period, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn period(&self) -> AnalysisPeriod {
        self.period
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first_close(&self) -> Option<f64> {
        self.bars.first().map(|b| b.close)
    }

    /// Most recent close, used as the current price.
    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|b| b.timestamp)
    }

    /// Same symbol and period with a transformed bar set. Ordering is preserved
    /// by every caller (scaling, sub-windowing), so the invariant still holds.
    pub(crate) fn with_bars(&self, bars: Vec<Bar>) -> Self {
        Self {
            symbol: self.symbol.clone(),
            period: self.period,
            bars,
        }
    }
}

/// Company fundamentals. Absent metrics stay `None`; never coerce to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsSnapshot {
    pub symbol: String,
    pub long_name: Option<String>,
    pub currency: Option<String>,
    pub sector: Option<String>,
    pub shares_outstanding: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub market_cap: Option<f64>,
    pub dividend_yield: Option<f64>,
}

impl FundamentalsSnapshot {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    pub fn require_shares_outstanding(&self) -> Result<f64, AnalysisError> {
        match self.shares_outstanding {
            Some(shares) if shares.is_finite() && shares > 0.0 => Ok(shares),
            Some(shares) => Err(AnalysisError::MissingData(format!(
                "shares outstanding for {} is not positive ({})",
                self.symbol, shares
            ))),
            None => Err(AnalysisError::MissingData(format!(
                "shares outstanding not available for {}",
                self.symbol
            ))),
        }
    }
}

/// Which financial statement to drill into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Income,
    CashFlow,
}

impl StatementKind {
    pub fn parse(value: &str) -> Result<Self, AnalysisError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(StatementKind::Income),
            "cashflow" | "cash_flow" | "cash-flow" => Ok(StatementKind::CashFlow),
            other => Err(AnalysisError::InvalidInput(format!(
                "unknown statement type '{}' (expected income or cashflow)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementPeriod {
    Annual,
    Quarterly,
}

impl StatementPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementPeriod::Annual => "annual",
            StatementPeriod::Quarterly => "quarterly",
        }
    }
}

/// A dated amount from a statement series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiscalValue {
    pub fiscal_date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowEntry {
    pub fiscal_date: NaiveDate,
    pub operating_cash_flow: Option<f64>,
    pub capital_expenditure: Option<f64>,
    pub free_cash_flow: Option<f64>,
}

/// Free-cash-flow history in provider order. Nothing here assumes the
/// entries are sorted; "latest" is always resolved by fiscal date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowSeries {
    pub symbol: String,
    pub period: StatementPeriod,
    pub entries: Vec<CashFlowEntry>,
}

impl CashFlowSeries {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted oldest first.
    pub fn chronological(&self) -> Vec<&CashFlowEntry> {
        let mut entries: Vec<&CashFlowEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.fiscal_date);
        entries
    }

    /// Most recent fiscal period that actually reports a free cash flow.
    pub fn latest_free_cash_flow(&self) -> Result<FiscalValue, AnalysisError> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.free_cash_flow
                    .filter(|v| v.is_finite())
                    .map(|value| FiscalValue { fiscal_date: e.fiscal_date, value })
            })
            .max_by_key(|fv| fv.fiscal_date)
            .ok_or_else(|| {
                AnalysisError::EmptySeries(format!(
                    "free cash flow data not available for {}",
                    self.symbol
                ))
            })
    }

    pub fn free_cash_flow_trend(&self) -> Vec<FiscalValue> {
        self.chronological()
            .into_iter()
            .filter_map(|e| {
                e.free_cash_flow
                    .map(|value| FiscalValue { fiscal_date: e.fiscal_date, value })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatementEntry {
    pub fiscal_date: NaiveDate,
    pub total_revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub symbol: String,
    pub period: StatementPeriod,
    pub entries: Vec<IncomeStatementEntry>,
}

impl IncomeStatement {
    pub fn chronological(&self) -> Vec<&IncomeStatementEntry> {
        let mut entries: Vec<&IncomeStatementEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.fiscal_date);
        entries
    }
}

/// Point-in-time multiplier turning `base` amounts into `quote` amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    base: String,
    quote: String,
    rate: f64,
}

impl ExchangeRate {
    pub fn new(
        base: impl Into<String>,
        quote: impl Into<String>,
        rate: f64,
    ) -> Result<Self, AnalysisError> {
        let base = base.into().to_ascii_uppercase();
        let quote = quote.into().to_ascii_uppercase();
        Self::check(&base, &quote, rate)?;
        Ok(Self { base, quote, rate })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Re-check a rate that may have arrived through deserialization.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        Self::check(&self.base, &self.quote, self.rate)
    }

    fn check(base: &str, quote: &str, rate: f64) -> Result<(), AnalysisError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(AnalysisError::InvalidRate(format!(
                "{}/{} rate must be finite and positive, got {}",
                base, quote, rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_codes_round_trip() {
        for period in AnalysisPeriod::ALL {
            assert_eq!(AnalysisPeriod::parse(period.code()).unwrap(), period);
        }
        assert_eq!(AnalysisPeriod::parse(" 5Y ").unwrap(), AnalysisPeriod::FiveYears);
        assert!(matches!(
            AnalysisPeriod::parse("10y"),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_price_series_rejects_duplicate_timestamps() {
        let err = PriceSeries::new("AAPL", AnalysisPeriod::OneYear, vec![bar(2, 10.0), bar(2, 11.0)])
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn test_price_series_rejects_unsorted_timestamps() {
        let result = PriceSeries::new("AAPL", AnalysisPeriod::OneYear, vec![bar(3, 10.0), bar(2, 11.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_price_series_accessors() {
        let series = PriceSeries::new(
            "MSFT",
            AnalysisPeriod::SixMonths,
            vec![bar(2, 10.0), bar(3, 12.0), bar(4, 15.0)],
        )
        .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.first_close(), Some(10.0));
        assert_eq!(series.last_close(), Some(15.0));
        assert_eq!(series.closes(), vec![10.0, 12.0, 15.0]);
        assert!(series.start().unwrap() < series.end().unwrap());
    }

    #[test]
    fn test_empty_price_series_is_allowed() {
        let series = PriceSeries::new("MSFT", AnalysisPeriod::OneYear, Vec::new()).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.last_close(), None);
    }

    #[test]
    fn test_missing_shares_is_distinct_from_zero() {
        let mut snapshot = FundamentalsSnapshot::new("INFY.NS");
        assert!(matches!(
            snapshot.require_shares_outstanding(),
            Err(AnalysisError::MissingData(_))
        ));
        snapshot.shares_outstanding = Some(0.0);
        assert!(matches!(
            snapshot.require_shares_outstanding(),
            Err(AnalysisError::MissingData(_))
        ));
        snapshot.shares_outstanding = Some(4.1e9);
        assert_eq!(snapshot.require_shares_outstanding().unwrap(), 4.1e9);
    }

    #[test]
    fn test_latest_fcf_sorts_by_fiscal_date() {
        // Provider returned oldest first; the newest entry must still win.
        let series = CashFlowSeries {
            symbol: "AAPL".into(),
            period: StatementPeriod::Annual,
            entries: vec![
                CashFlowEntry {
                    fiscal_date: date(2021, 9, 30),
                    operating_cash_flow: None,
                    capital_expenditure: None,
                    free_cash_flow: Some(90.0),
                },
                CashFlowEntry {
                    fiscal_date: date(2023, 9, 30),
                    operating_cash_flow: None,
                    capital_expenditure: None,
                    free_cash_flow: Some(110.0),
                },
                CashFlowEntry {
                    fiscal_date: date(2022, 9, 30),
                    operating_cash_flow: None,
                    capital_expenditure: None,
                    free_cash_flow: Some(100.0),
                },
            ],
        };
        let latest = series.latest_free_cash_flow().unwrap();
        assert_eq!(latest.fiscal_date, date(2023, 9, 30));
        assert_eq!(latest.value, 110.0);

        let trend: Vec<f64> = series.free_cash_flow_trend().iter().map(|v| v.value).collect();
        assert_eq!(trend, vec![90.0, 100.0, 110.0]);
    }

    #[test]
    fn test_latest_fcf_skips_missing_values() {
        let series = CashFlowSeries {
            symbol: "AAPL".into(),
            period: StatementPeriod::Annual,
            entries: vec![
                CashFlowEntry {
                    fiscal_date: date(2024, 9, 30),
                    operating_cash_flow: Some(120.0),
                    capital_expenditure: None,
                    free_cash_flow: None,
                },
                CashFlowEntry {
                    fiscal_date: date(2023, 9, 30),
                    operating_cash_flow: Some(110.0),
                    capital_expenditure: Some(-10.0),
                    free_cash_flow: Some(100.0),
                },
            ],
        };
        assert_eq!(series.latest_free_cash_flow().unwrap().value, 100.0);
    }

    #[test]
    fn test_empty_cash_flow_fails_fast() {
        let series = CashFlowSeries {
            symbol: "AAPL".into(),
            period: StatementPeriod::Annual,
            entries: Vec::new(),
        };
        assert!(matches!(
            series.latest_free_cash_flow(),
            Err(AnalysisError::EmptySeries(_))
        ));
    }

    #[test]
    fn test_exchange_rate_validation() {
        assert!(ExchangeRate::new("inr", "usd", 0.012).is_ok());
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                ExchangeRate::new("INR", "USD", bad),
                Err(AnalysisError::InvalidRate(_))
            ));
        }
        let rate = ExchangeRate::new("inr", "usd", 0.012).unwrap();
        assert_eq!(rate.base(), "INR");
        assert_eq!(rate.quote(), "USD");
    }

    #[test]
    fn test_statement_kind_parse() {
        assert_eq!(StatementKind::parse("Income").unwrap(), StatementKind::Income);
        assert_eq!(StatementKind::parse("cash-flow").unwrap(), StatementKind::CashFlow);
        assert!(StatementKind::parse("balance").is_err());
    }
}
