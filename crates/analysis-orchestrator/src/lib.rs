use analysis_core::{
    AnalysisError, AnalysisPeriod, CashFlowSeries, ComparisonPair, CurrencyConvert, ExchangeRate,
    FiscalValue, FundamentalsSnapshot, IncomeStatement, MarketDataProvider, PriceSeries,
    StatementKind, StatementPeriod,
};
use market_data::YahooFinanceClient;
use quant_analysis::{cagr, normalize, RiskReturnProfile};
use std::future::Future;
use std::sync::Arc;
use valuation_analysis::{dcf_per_share, margin_of_safety, multiple_premium, ValuationMetric};

pub mod cache;
pub mod config;
pub mod report;

pub use cache::{CacheMode, SessionCache, DEFAULT_CACHE_TTL_SECS};
pub use config::DashboardConfig;
pub use report::{
    ComparisonReport, CurrencyConversion, DashboardReport, DashboardRequest, NormalizedPoint,
    NormalizedSeries, PriceOverview, PricePoint, RateSource, Section, StatementReport,
    StatementRequest, TickerReport, ValuationSummary,
};

/// Everything fetched for one ticker, before sections are derived.
struct TickerData {
    symbol: String,
    currency: Option<String>,
    prices: Result<PriceSeries, AnalysisError>,
    fundamentals: Result<FundamentalsSnapshot, AnalysisError>,
    cash_flow: Result<CashFlowSeries, AnalysisError>,
    statement: Option<Result<StatementReport, AnalysisError>>,
    conversion: Option<Result<ExchangeRate, AnalysisError>>,
}

impl TickerData {
    fn apply_rate(&mut self, rate: &ExchangeRate) -> Result<(), AnalysisError> {
        let prices = convert_ok(&self.prices, rate)?;
        let fundamentals = convert_ok(&self.fundamentals, rate)?;
        let cash_flow = convert_ok(&self.cash_flow, rate)?;
        let statement = match &self.statement {
            Some(Ok(StatementReport::Income(s))) => Some(Ok(StatementReport::Income(s.convert(rate)?))),
            Some(Ok(StatementReport::CashFlow(s))) => {
                Some(Ok(StatementReport::CashFlow(s.convert(rate)?)))
            }
            other => other.clone(),
        };

        self.prices = prices;
        self.fundamentals = fundamentals;
        self.cash_flow = cash_flow;
        self.statement = statement;
        self.currency = Some(rate.quote().to_string());
        Ok(())
    }
}

/// Convert the success side of a fetch result, keeping fetch errors as they are.
fn convert_ok<T: CurrencyConvert + Clone>(
    fetched: &Result<T, AnalysisError>,
    rate: &ExchangeRate,
) -> Result<Result<T, AnalysisError>, AnalysisError> {
    match fetched {
        Ok(value) => Ok(Ok(value.convert(rate)?)),
        Err(e) => Ok(Err(e.clone())),
    }
}

/// Runs the dashboard pipeline: fetch through the session cache, then derive
/// each section independently so one gap never hides the rest.
pub struct DashboardOrchestrator {
    provider: Arc<dyn MarketDataProvider>,
    cache: Arc<SessionCache>,
    config: DashboardConfig,
}

impl DashboardOrchestrator {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: DashboardConfig) -> Self {
        Self {
            provider,
            cache: Arc::new(SessionCache::new(config.cache_ttl())),
            config,
        }
    }

    /// Orchestrator backed by the HTTP provider configured in `config`.
    pub fn from_config(config: DashboardConfig) -> Result<Self, AnalysisError> {
        let client = YahooFinanceClient::with_base_url(&config.provider_url, config.fetch_timeout)?;
        Ok(Self::new(Arc::new(client), config))
    }

    /// Share a pre-seeded or long-lived cache.
    pub fn with_cache(mut self, cache: Arc<SessionCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Build the full report. Only an invalid request is an error; data
    /// problems surface as unavailable sections.
    pub async fn run(&self, request: &DashboardRequest) -> Result<DashboardReport, AnalysisError> {
        request.validate()?;
        tracing::info!(
            "Building dashboard for {} ({})",
            request.tickers.join(", "),
            request.period.code()
        );

        let mut loaded = Vec::with_capacity(request.tickers.len());
        for symbol in &request.tickers {
            loaded.push(self.load_ticker(symbol.trim(), request).await);
        }

        let tickers = loaded
            .iter()
            .map(|data| self.ticker_report(data, request))
            .collect();

        let comparison = match loaded.as_slice() {
            [first, second] => {
                let label = format!("{} vs {}", first.symbol, second.symbol);
                Some(Section::from_result(
                    "comparison",
                    &label,
                    compare(first, second, request.metric),
                ))
            }
            _ => None,
        };

        let report = DashboardReport {
            generated_at: chrono::Utc::now(),
            period: request.period,
            assumptions: request.assumptions,
            tickers,
            comparison,
        };
        tracing::info!(
            "Dashboard ready: {} ticker(s), {} section(s) unavailable",
            report.tickers.len(),
            report.unavailable_sections()
        );
        Ok(report)
    }

    async fn load_ticker(&self, symbol: &str, request: &DashboardRequest) -> TickerData {
        let mode = request.cache_mode;
        let statement = async {
            match request.statement {
                Some(wanted) => Some(self.statement(symbol, wanted, mode).await),
                None => None,
            }
        };

        let (prices, fundamentals, cash_flow, statement) = tokio::join!(
            self.price_history(symbol, request.period, mode),
            self.fundamentals(symbol, mode),
            self.cash_flow(symbol, StatementPeriod::Annual, mode),
            statement,
        );

        let currency = fundamentals.as_ref().ok().and_then(|f| f.currency.clone());
        let mut data = TickerData {
            symbol: symbol.to_string(),
            currency,
            prices,
            fundamentals,
            cash_flow,
            statement,
            conversion: None,
        };

        if let Some(conversion) = &request.currency {
            let resolved = self
                .resolve_rate(symbol, data.currency.as_deref(), conversion, mode)
                .await;
            data.conversion = match resolved {
                Ok(None) => None,
                Ok(Some(rate)) => match data.apply_rate(&rate) {
                    Ok(()) => Some(Ok(rate)),
                    Err(e) => Some(Err(e)),
                },
                Err(e) => Some(Err(e)),
            };
        }

        data
    }

    /// `Ok(None)` when the ticker already reports in the target currency.
    async fn resolve_rate(
        &self,
        symbol: &str,
        native: Option<&str>,
        conversion: &CurrencyConversion,
        mode: CacheMode,
    ) -> Result<Option<ExchangeRate>, AnalysisError> {
        if native.is_some_and(|n| n.eq_ignore_ascii_case(&conversion.target)) {
            return Ok(None);
        }

        match conversion.rate {
            RateSource::Static(rate) => {
                ExchangeRate::new(native.unwrap_or("LOCAL"), &conversion.target, rate).map(Some)
            }
            RateSource::Fetch => {
                let base = native.ok_or_else(|| {
                    AnalysisError::MissingData(format!(
                        "reporting currency for {} is unknown, cannot look up a {} rate",
                        symbol, conversion.target
                    ))
                })?;
                self.exchange_rate(base, &conversion.target, mode).await.map(Some)
            }
        }
    }

    fn ticker_report(&self, data: &TickerData, request: &DashboardRequest) -> TickerReport {
        let symbol = data.symbol.as_str();

        let price = data.prices.clone().and_then(|series| price_overview(&series));

        let risk_return = data.prices.clone().and_then(|series| {
            if series.is_empty() {
                return Err(AnalysisError::EmptySeries(format!("no prices for {}", symbol)));
            }
            Ok(RiskReturnProfile::compute(
                &series,
                series_years(&series),
                self.config.risk_free_rate,
                self.config.trading_days_per_year,
            ))
        });

        let cash_flow_trend = data.cash_flow.clone().and_then(|series| {
            let trend: Vec<FiscalValue> = series.free_cash_flow_trend();
            if trend.is_empty() {
                Err(AnalysisError::EmptySeries(format!(
                    "free cash flow data not available for {}",
                    symbol
                )))
            } else {
                Ok(trend)
            }
        });

        let current_price = data.prices.as_ref().ok().and_then(|s| s.last_close());
        let valuation = valuation_summary(data, request, current_price);

        TickerReport {
            symbol: symbol.to_string(),
            currency: data.currency.clone(),
            conversion: data
                .conversion
                .clone()
                .map(|r| Section::from_result("currency conversion", symbol, r)),
            fundamentals: Section::from_result("fundamentals", symbol, data.fundamentals.clone()),
            price: Section::from_result("price", symbol, price),
            risk_return: Section::from_result("risk/return", symbol, risk_return),
            cash_flow_trend: Section::from_result("free cash flow", symbol, cash_flow_trend),
            valuation: Section::from_result("valuation", symbol, valuation),
            statement: data
                .statement
                .clone()
                .map(|r| Section::from_result("statement", symbol, r)),
        }
    }

    async fn timed<T>(
        &self,
        what: &str,
        symbol: &str,
        fetch: impl Future<Output = Result<T, AnalysisError>>,
    ) -> Result<T, AnalysisError> {
        match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "{} fetch for {} timed out after {:?}",
                    what,
                    symbol,
                    self.config.fetch_timeout
                );
                Err(AnalysisError::DataUnavailable(format!(
                    "{} for {} not received within {:.1}s",
                    what,
                    symbol,
                    self.config.fetch_timeout.as_secs_f64()
                )))
            }
        }
    }

    async fn price_history(
        &self,
        symbol: &str,
        period: AnalysisPeriod,
        mode: CacheMode,
    ) -> Result<PriceSeries, AnalysisError> {
        if mode.reads() {
            if let Some(hit) = self.cache.price_history(symbol, period) {
                tracing::debug!("Cache hit: {} prices ({})", symbol, period.code());
                return Ok(hit);
            }
        }
        let series = self
            .timed("price history", symbol, self.provider.fetch_price_history(symbol, period))
            .await?;
        if mode.writes() {
            self.cache.seed_price_history(series.clone());
        }
        Ok(series)
    }

    async fn fundamentals(&self, symbol: &str, mode: CacheMode) -> Result<FundamentalsSnapshot, AnalysisError> {
        if mode.reads() {
            if let Some(hit) = self.cache.fundamentals(symbol) {
                tracing::debug!("Cache hit: {} fundamentals", symbol);
                return Ok(hit);
            }
        }
        let snapshot = self
            .timed("fundamentals", symbol, self.provider.fetch_fundamentals(symbol))
            .await?;
        if mode.writes() {
            self.cache.seed_fundamentals(snapshot.clone());
        }
        Ok(snapshot)
    }

    async fn cash_flow(
        &self,
        symbol: &str,
        period: StatementPeriod,
        mode: CacheMode,
    ) -> Result<CashFlowSeries, AnalysisError> {
        if mode.reads() {
            if let Some(hit) = self.cache.cash_flow(symbol, period) {
                tracing::debug!("Cache hit: {} {} cash flow", symbol, period.as_str());
                return Ok(hit);
            }
        }
        let series = self
            .timed("cash flow", symbol, self.provider.fetch_cash_flow(symbol, period))
            .await?;
        if mode.writes() {
            self.cache.seed_cash_flow(series.clone());
        }
        Ok(series)
    }

    async fn income_statement(
        &self,
        symbol: &str,
        period: StatementPeriod,
        mode: CacheMode,
    ) -> Result<IncomeStatement, AnalysisError> {
        if mode.reads() {
            if let Some(hit) = self.cache.income_statement(symbol, period) {
                tracing::debug!("Cache hit: {} {} income statement", symbol, period.as_str());
                return Ok(hit);
            }
        }
        let statement = self
            .timed("income statement", symbol, self.provider.fetch_income_statement(symbol, period))
            .await?;
        if mode.writes() {
            self.cache.seed_income_statement(statement.clone());
        }
        Ok(statement)
    }

    async fn statement(
        &self,
        symbol: &str,
        wanted: StatementRequest,
        mode: CacheMode,
    ) -> Result<StatementReport, AnalysisError> {
        match wanted.kind {
            StatementKind::Income => self
                .income_statement(symbol, wanted.period, mode)
                .await
                .map(StatementReport::Income),
            StatementKind::CashFlow => self
                .cash_flow(symbol, wanted.period, mode)
                .await
                .map(StatementReport::CashFlow),
        }
    }

    async fn exchange_rate(&self, base: &str, quote: &str, mode: CacheMode) -> Result<ExchangeRate, AnalysisError> {
        if mode.reads() {
            if let Some(hit) = self.cache.exchange_rate(base, quote) {
                tracing::debug!("Cache hit: {}/{} rate", base, quote);
                return Ok(hit);
            }
        }
        let pair = format!("{}/{}", base, quote);
        let rate = self
            .timed("exchange rate", &pair, self.provider.fetch_exchange_rate(base, quote))
            .await?;
        if mode.writes() {
            self.cache.seed_exchange_rate(rate.clone());
        }
        Ok(rate)
    }
}

fn price_overview(series: &PriceSeries) -> Result<PriceOverview, AnalysisError> {
    let (Some(current_price), Some(start), Some(end)) =
        (series.last_close(), series.start(), series.end())
    else {
        return Err(AnalysisError::EmptySeries(format!(
            "no prices for {}",
            series.symbol()
        )));
    };
    Ok(PriceOverview {
        current_price,
        start,
        end,
        points: series
            .bars()
            .iter()
            .map(|b| PricePoint {
                timestamp: b.timestamp,
                close: b.close,
            })
            .collect(),
    })
}

/// Span actually covered by the series; falls back to the requested period
/// when there is no span to measure.
fn series_years(series: &PriceSeries) -> f64 {
    match (series.start(), series.end()) {
        (Some(start), Some(end)) if end > start => (end - start).num_days().max(1) as f64 / 365.25,
        _ => series.period().years(),
    }
}

fn valuation_summary(
    data: &TickerData,
    request: &DashboardRequest,
    current_price: Option<f64>,
) -> Result<ValuationSummary, AnalysisError> {
    let cash_flow = data.cash_flow.as_ref().map_err(Clone::clone)?;
    let fundamentals = data.fundamentals.as_ref().map_err(Clone::clone)?;
    let dcf = dcf_per_share(cash_flow, fundamentals, &request.assumptions)?;

    let verdict = current_price.and_then(|price| dcf.verdict(price));
    let margin_of_safety_pct = match (dcf.intrinsic_value_per_share, current_price) {
        (Some(per_share), Some(price)) => margin_of_safety(per_share, price),
        _ => None,
    };

    Ok(ValuationSummary {
        dcf,
        current_price,
        verdict,
        margin_of_safety_pct,
    })
}

fn normalized_series(series: &PriceSeries) -> Result<NormalizedSeries, AnalysisError> {
    let values = normalize(series)?;
    Ok(NormalizedSeries {
        symbol: series.symbol().to_string(),
        points: series
            .bars()
            .iter()
            .zip(values)
            .map(|(bar, value)| NormalizedPoint {
                timestamp: bar.timestamp,
                value,
            })
            .collect(),
    })
}

fn compare(
    first: &TickerData,
    second: &TickerData,
    metric: ValuationMetric,
) -> Result<ComparisonReport, AnalysisError> {
    let first_prices = first.prices.as_ref().map_err(Clone::clone)?;
    let second_prices = second.prices.as_ref().map_err(Clone::clone)?;
    let pair = ComparisonPair::new(first_prices, second_prices)?;

    let window_start = pair.first().start().max(pair.second().start());
    let window_end = pair.first().end().min(pair.second().end());
    let (Some(window_start), Some(window_end)) = (window_start, window_end) else {
        return Err(AnalysisError::InsufficientData(format!(
            "{} and {} have no common window",
            first.symbol, second.symbol
        )));
    };

    let years = pair.window_years();
    let mut notes = Vec::new();
    let mut side_cagr = |series: &PriceSeries| match cagr(series, years) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Comparison CAGR unavailable for {}: {}", series.symbol(), e);
            notes.push(format!("CAGR for {}: {}", series.symbol(), e));
            None
        }
    };
    let cagr_pct = [side_cagr(pair.first()), side_cagr(pair.second())];

    // A missing snapshot just means no multiple is known for that side.
    let snapshot = |data: &TickerData| {
        data.fundamentals
            .as_ref()
            .ok()
            .cloned()
            .unwrap_or_else(|| FundamentalsSnapshot::new(data.symbol.clone()))
    };
    let multiple = multiple_premium(&snapshot(first), &snapshot(second), metric);

    Ok(ComparisonReport {
        window_start,
        window_end,
        window_years: years,
        normalized: [normalized_series(pair.first())?, normalized_series(pair.second())?],
        cagr_pct,
        multiple,
        notes,
    })
}
