use analysis_core::{
    AnalysisPeriod, CashFlowSeries, ExchangeRate, FundamentalsSnapshot, IncomeStatement,
    PriceSeries, StatementPeriod,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::hash::Hash;

pub const DEFAULT_CACHE_TTL_SECS: i64 = 300; // 5 minutes

/// How a single request interacts with the session cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Serve fresh entries, fetch and store on miss.
    #[default]
    Use,
    /// Always fetch, then overwrite the stored entry.
    Refresh,
    /// Always fetch and leave the cache untouched.
    Bypass,
}

impl CacheMode {
    pub fn reads(&self) -> bool {
        matches!(self, CacheMode::Use)
    }

    pub fn writes(&self) -> bool {
        !matches!(self, CacheMode::Bypass)
    }
}

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// Read-through store for provider results within one analysis session.
///
/// Owned by the orchestrator and injectable, so tests can pre-seed it or
/// shrink the TTL to force expiry.
pub struct SessionCache {
    ttl: Duration,
    /// Keyed by (symbol, period)
    prices: DashMap<(String, AnalysisPeriod), CacheEntry<PriceSeries>>,
    fundamentals: DashMap<String, CacheEntry<FundamentalsSnapshot>>,
    cash_flows: DashMap<(String, StatementPeriod), CacheEntry<CashFlowSeries>>,
    income_statements: DashMap<(String, StatementPeriod), CacheEntry<IncomeStatement>>,
    /// Keyed by (base, quote)
    exchange_rates: DashMap<(String, String), CacheEntry<ExchangeRate>>,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            prices: DashMap::new(),
            fundamentals: DashMap::new(),
            cash_flows: DashMap::new(),
            income_statements: DashMap::new(),
            exchange_rates: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn price_history(&self, symbol: &str, period: AnalysisPeriod) -> Option<PriceSeries> {
        self.fresh(&self.prices, &(symbol.to_string(), period))
    }

    pub fn seed_price_history(&self, series: PriceSeries) {
        let key = (series.symbol().to_string(), series.period());
        Self::store(&self.prices, key, series);
    }

    pub fn fundamentals(&self, symbol: &str) -> Option<FundamentalsSnapshot> {
        self.fresh(&self.fundamentals, &symbol.to_string())
    }

    pub fn seed_fundamentals(&self, snapshot: FundamentalsSnapshot) {
        Self::store(&self.fundamentals, snapshot.symbol.clone(), snapshot);
    }

    pub fn cash_flow(&self, symbol: &str, period: StatementPeriod) -> Option<CashFlowSeries> {
        self.fresh(&self.cash_flows, &(symbol.to_string(), period))
    }

    pub fn seed_cash_flow(&self, series: CashFlowSeries) {
        Self::store(&self.cash_flows, (series.symbol.clone(), series.period), series);
    }

    pub fn income_statement(&self, symbol: &str, period: StatementPeriod) -> Option<IncomeStatement> {
        self.fresh(&self.income_statements, &(symbol.to_string(), period))
    }

    pub fn seed_income_statement(&self, statement: IncomeStatement) {
        Self::store(
            &self.income_statements,
            (statement.symbol.clone(), statement.period),
            statement,
        );
    }

    pub fn exchange_rate(&self, base: &str, quote: &str) -> Option<ExchangeRate> {
        self.fresh(
            &self.exchange_rates,
            &(base.to_ascii_uppercase(), quote.to_ascii_uppercase()),
        )
    }

    pub fn seed_exchange_rate(&self, rate: ExchangeRate) {
        let key = (rate.base().to_string(), rate.quote().to_string());
        Self::store(&self.exchange_rates, key, rate);
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.prices.len()
            + self.fundamentals.len()
            + self.cash_flows.len()
            + self.income_statements.len()
            + self.exchange_rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.prices.clear();
        self.fundamentals.clear();
        self.cash_flows.clear();
        self.income_statements.clear();
        self.exchange_rates.clear();
    }

    fn fresh<K, T>(&self, map: &DashMap<K, CacheEntry<T>>, key: &K) -> Option<T>
    where
        K: Eq + Hash,
        T: Clone,
    {
        let entry = map.get(key)?;
        if Utc::now() - entry.cached_at < self.ttl {
            Some(entry.data.clone())
        } else {
            None
        }
    }

    fn store<K, T>(map: &DashMap<K, CacheEntry<T>>, key: K, data: T)
    where
        K: Eq + Hash,
    {
        map.insert(
            key,
            CacheEntry {
                data,
                cached_at: Utc::now(),
            },
        );
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_CACHE_TTL_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Bar;
    use chrono::TimeZone;

    fn series(symbol: &str, period: AnalysisPeriod) -> PriceSeries {
        let bar = Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            open: 10.0,
            high: 10.0,
            low: 10.0,
            close: 10.0,
            volume: 0.0,
        };
        PriceSeries::new(symbol, period, vec![bar]).unwrap()
    }

    #[test]
    fn test_prices_keyed_by_symbol_and_period() {
        let cache = SessionCache::default();
        cache.seed_price_history(series("AAPL", AnalysisPeriod::OneYear));

        assert!(cache.price_history("AAPL", AnalysisPeriod::OneYear).is_some());
        assert!(cache.price_history("AAPL", AnalysisPeriod::FiveYears).is_none());
        assert!(cache.price_history("MSFT", AnalysisPeriod::OneYear).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_ttl_never_serves() {
        let cache = SessionCache::new(Duration::zero());
        cache.seed_fundamentals(FundamentalsSnapshot::new("AAPL"));
        assert!(cache.fundamentals("AAPL").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_exchange_rate_key_is_case_insensitive() {
        let cache = SessionCache::default();
        cache.seed_exchange_rate(ExchangeRate::new("inr", "usd", 0.012).unwrap());
        assert!(cache.exchange_rate("INR", "usd").is_some());
        assert!(cache.exchange_rate("USD", "INR").is_none());
    }

    #[test]
    fn test_clear() {
        let cache = SessionCache::default();
        cache.seed_fundamentals(FundamentalsSnapshot::new("AAPL"));
        cache.seed_cash_flow(CashFlowSeries {
            symbol: "AAPL".to_string(),
            period: StatementPeriod::Annual,
            entries: Vec::new(),
        });
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_mode() {
        assert!(CacheMode::Use.reads() && CacheMode::Use.writes());
        assert!(!CacheMode::Refresh.reads() && CacheMode::Refresh.writes());
        assert!(!CacheMode::Bypass.reads() && !CacheMode::Bypass.writes());
    }
}
