use async_trait::async_trait;
use crate::{
    AnalysisError, AnalysisPeriod, CashFlowSeries, ExchangeRate, FundamentalsSnapshot,
    IncomeStatement, PriceSeries, StatementPeriod,
};

/// Source of market data for the analytics pipeline.
///
/// Implementations map every provider-side failure (unknown symbol, network
/// error, timeout, empty payload) to `AnalysisError::DataUnavailable`. Symbols
/// are not validated client-side; the provider is the source of truth.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_price_history(
        &self,
        symbol: &str,
        period: AnalysisPeriod,
    ) -> Result<PriceSeries, AnalysisError>;

    async fn fetch_fundamentals(&self, symbol: &str) -> Result<FundamentalsSnapshot, AnalysisError>;

    async fn fetch_cash_flow(
        &self,
        symbol: &str,
        period: StatementPeriod,
    ) -> Result<CashFlowSeries, AnalysisError>;

    async fn fetch_income_statement(
        &self,
        symbol: &str,
        period: StatementPeriod,
    ) -> Result<IncomeStatement, AnalysisError>;

    /// Latest rate converting `base` amounts into `quote`.
    async fn fetch_exchange_rate(&self, base: &str, quote: &str) -> Result<ExchangeRate, AnalysisError>;
}
