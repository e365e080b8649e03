//! Currency normalization for monetary fields.
//!
//! Conversion uses a single point-in-time rate; there is no historical FX
//! alignment. Inputs are never mutated, every call returns a new value with the
//! same structure and only the monetary fields scaled.

use crate::{
    AnalysisError, Bar, CashFlowEntry, CashFlowSeries, ExchangeRate, FundamentalsSnapshot,
    IncomeStatement, IncomeStatementEntry, PriceSeries,
};

pub trait CurrencyConvert: Sized {
    fn convert(&self, rate: &ExchangeRate) -> Result<Self, AnalysisError>;
}

/// Convert any supported value with `rate`.
pub fn convert<T: CurrencyConvert>(value: &T, rate: &ExchangeRate) -> Result<T, AnalysisError> {
    value.convert(rate)
}

fn scale(amount: Option<f64>, factor: f64) -> Option<f64> {
    amount.map(|v| v * factor)
}

impl CurrencyConvert for f64 {
    fn convert(&self, rate: &ExchangeRate) -> Result<Self, AnalysisError> {
        rate.validate()?;
        Ok(self * rate.rate())
    }
}

impl CurrencyConvert for PriceSeries {
    fn convert(&self, rate: &ExchangeRate) -> Result<Self, AnalysisError> {
        rate.validate()?;
        let factor = rate.rate();
        let bars = self
            .bars()
            .iter()
            .map(|b| Bar {
                timestamp: b.timestamp,
                open: b.open * factor,
                high: b.high * factor,
                low: b.low * factor,
                close: b.close * factor,
                volume: b.volume,
            })
            .collect();
        Ok(self.with_bars(bars))
    }
}

impl CurrencyConvert for FundamentalsSnapshot {
    /// Only market cap is monetary; ratios, share counts and yields are unitless.
    fn convert(&self, rate: &ExchangeRate) -> Result<Self, AnalysisError> {
        rate.validate()?;
        Ok(FundamentalsSnapshot {
            market_cap: scale(self.market_cap, rate.rate()),
            currency: Some(rate.quote().to_string()),
            ..self.clone()
        })
    }
}

impl CurrencyConvert for CashFlowSeries {
    fn convert(&self, rate: &ExchangeRate) -> Result<Self, AnalysisError> {
        rate.validate()?;
        let factor = rate.rate();
        Ok(CashFlowSeries {
            symbol: self.symbol.clone(),
            period: self.period,
            entries: self
                .entries
                .iter()
                .map(|e| CashFlowEntry {
                    fiscal_date: e.fiscal_date,
                    operating_cash_flow: scale(e.operating_cash_flow, factor),
                    capital_expenditure: scale(e.capital_expenditure, factor),
                    free_cash_flow: scale(e.free_cash_flow, factor),
                })
                .collect(),
        })
    }
}

impl CurrencyConvert for IncomeStatement {
    fn convert(&self, rate: &ExchangeRate) -> Result<Self, AnalysisError> {
        rate.validate()?;
        let factor = rate.rate();
        Ok(IncomeStatement {
            symbol: self.symbol.clone(),
            period: self.period,
            entries: self
                .entries
                .iter()
                .map(|e| IncomeStatementEntry {
                    fiscal_date: e.fiscal_date,
                    total_revenue: scale(e.total_revenue, factor),
                    gross_profit: scale(e.gross_profit, factor),
                    operating_income: scale(e.operating_income, factor),
                    net_income: scale(e.net_income, factor),
                })
                .collect(),
        })
    }
}
