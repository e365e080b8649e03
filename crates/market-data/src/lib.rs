use analysis_core::{
    AnalysisError, AnalysisPeriod, CashFlowSeries, ExchangeRate, FundamentalsSnapshot,
    IncomeStatement, MarketDataProvider, PriceSeries, StatementPeriod,
};
use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use reqwest::header::REFERER;
use reqwest::{Client, Response, Url};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub mod payload;

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";
/// Page that hands out the session cookie the crumb is bound to.
pub const DEFAULT_SESSION_URL: &str = "https://fc.yahoo.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const REFERER_URL: &str = "https://finance.yahoo.com/";
const FUNDAMENTAL_MODULES: &str = "price,summaryDetail,defaultKeyStatistics,assetProfile";

/// HTTP market data provider backed by the Yahoo Finance chart and
/// quote-summary endpoints.
///
/// Quote-summary calls need a session cookie plus a matching crumb. The
/// cookie lives in the client's cookie store, the crumb is fetched once and
/// reused until the provider rejects it.
#[derive(Clone)]
pub struct YahooFinanceClient {
    client: Client,
    base_url: Url,
    session_url: Url,
    timeout: Duration,
    crumb: Arc<Mutex<Option<String>>>,
}

fn parse_url(url: &str) -> Result<Url, AnalysisError> {
    Url::parse(url)
        .map_err(|e| AnalysisError::InvalidInput(format!("invalid provider URL '{}': {}", url, e)))
}

/// Chart query for a period. Yahoo has no 3y range, so that one is sent as
/// explicit epoch bounds ending at `now`.
fn chart_query(period: AnalysisPeriod, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
    let mut query = match period {
        AnalysisPeriod::ThreeYears => {
            let start = now.checked_sub_months(Months::new(36)).unwrap_or(now);
            vec![
                ("period1", start.timestamp().to_string()),
                ("period2", now.timestamp().to_string()),
            ]
        }
        other => vec![("range", other.code().to_string())],
    };
    query.push(("interval", "1d".to_string()));
    query
}

impl YahooFinanceClient {
    pub fn new(timeout: Duration) -> Result<Self, AnalysisError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::DataUnavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: parse_url(base_url)?,
            session_url: parse_url(DEFAULT_SESSION_URL)?,
            timeout,
            crumb: Arc::new(Mutex::new(None)),
        })
    }

    /// Fetch the session cookie from `session_url` instead of the Yahoo default.
    pub fn with_session_url(mut self, session_url: &str) -> Result<Self, AnalysisError> {
        self.session_url = parse_url(session_url)?;
        Ok(self)
    }

    /// Build an endpoint URL. The symbol is pushed as its own percent-encoded
    /// path segment, never spliced into a format string.
    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, AnalysisError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AnalysisError::InvalidInput(format!("provider URL '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    fn chart_url(&self, symbol: &str, query: &[(&str, String)]) -> Result<Url, AnalysisError> {
        self.endpoint(&["v8", "finance", "chart", symbol], query)
    }

    fn summary_url(&self, symbol: &str, modules: &str, crumb: &str) -> Result<Url, AnalysisError> {
        self.endpoint(
            &["v10", "finance", "quoteSummary", symbol],
            &[("modules", modules.to_string()), ("crumb", crumb.to_string())],
        )
    }

    fn cached_crumb(&self) -> Option<String> {
        self.crumb.lock().ok().and_then(|crumb| crumb.clone())
    }

    fn store_crumb(&self, crumb: Option<String>) {
        if let Ok(mut slot) = self.crumb.lock() {
            *slot = crumb;
        }
    }

    async fn crumb(&self) -> Result<String, AnalysisError> {
        match self.cached_crumb() {
            Some(crumb) => Ok(crumb),
            None => self.refresh_crumb().await,
        }
    }

    async fn refresh_crumb(&self) -> Result<String, AnalysisError> {
        // Only the cookie matters here; the session page itself often answers 404.
        if let Err(e) = self
            .client
            .get(self.session_url.clone())
            .header(REFERER, REFERER_URL)
            .send()
            .await
        {
            tracing::debug!("Session cookie request failed: {}", e);
        }

        let url = self.endpoint(&["v1", "test", "getcrumb"], &[])?;
        let response = self
            .client
            .get(url)
            .header(REFERER, REFERER_URL)
            .send()
            .await
            .map_err(|e| AnalysisError::DataUnavailable(format!("crumb request failed ({})", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::DataUnavailable(format!(
                "crumb request returned HTTP {}",
                status
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::DataUnavailable(format!("unreadable crumb ({})", e)))?;
        let crumb = payload::parse_crumb(&body)
            .ok_or_else(|| AnalysisError::DataUnavailable("provider returned no usable crumb".to_string()))?;

        tracing::debug!("Obtained provider crumb");
        self.store_crumb(Some(crumb.clone()));
        Ok(crumb)
    }

    async fn send(&self, symbol: &str, url: Url) -> Result<Response, AnalysisError> {
        tracing::debug!("GET {} ({})", url.path(), symbol);

        self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::warn!("Provider request for {} timed out after {:?}", symbol, self.timeout);
                AnalysisError::DataUnavailable(format!(
                    "{}: provider did not respond within {}s",
                    symbol,
                    self.timeout.as_secs_f64()
                ))
            } else {
                tracing::warn!("Provider request for {} failed: {}", symbol, e);
                AnalysisError::DataUnavailable(format!("{}: provider unreachable ({})", symbol, e))
            }
        })
    }

    async fn read_json(symbol: &str, response: Response) -> Result<Value, AnalysisError> {
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(AnalysisError::DataUnavailable(format!(
                "{}: unknown symbol",
                symbol
            )));
        }
        if !status.is_success() {
            return Err(AnalysisError::DataUnavailable(format!(
                "{}: HTTP {}: {}",
                symbol,
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AnalysisError::DataUnavailable(format!("{}: unreadable payload ({})", symbol, e)))
    }

    async fn get_chart(&self, symbol: &str, query: &[(&str, String)]) -> Result<Value, AnalysisError> {
        let response = self.send(symbol, self.chart_url(symbol, query)?).await?;
        Self::read_json(symbol, response).await
    }

    /// Quote-summary request; a rejected crumb is refreshed and retried once.
    async fn get_summary(&self, symbol: &str, modules: &str) -> Result<Value, AnalysisError> {
        let crumb = self.crumb().await?;
        let response = self.send(symbol, self.summary_url(symbol, modules, &crumb)?).await?;

        let response = if matches!(response.status().as_u16(), 401 | 429) {
            tracing::info!(
                "Provider rejected crumb for {} (HTTP {}), refreshing",
                symbol,
                response.status()
            );
            self.store_crumb(None);
            let crumb = self.refresh_crumb().await?;
            self.send(symbol, self.summary_url(symbol, modules, &crumb)?).await?
        } else {
            response
        };

        Self::read_json(symbol, response).await
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceClient {
    async fn fetch_price_history(
        &self,
        symbol: &str,
        period: AnalysisPeriod,
    ) -> Result<PriceSeries, AnalysisError> {
        let payload = self.get_chart(symbol, &chart_query(period, Utc::now())).await?;
        let series = payload::parse_price_history(symbol, period, payload)?;
        tracing::debug!("{} {} bars for {}", series.len(), period.code(), symbol);
        Ok(series)
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> Result<FundamentalsSnapshot, AnalysisError> {
        let payload = self.get_summary(symbol, FUNDAMENTAL_MODULES).await?;
        payload::parse_fundamentals(symbol, &payload)
    }

    async fn fetch_cash_flow(
        &self,
        symbol: &str,
        period: StatementPeriod,
    ) -> Result<CashFlowSeries, AnalysisError> {
        let payload = self.get_summary(symbol, payload::cash_flow_module(period)).await?;
        payload::parse_cash_flow(symbol, period, &payload)
    }

    async fn fetch_income_statement(
        &self,
        symbol: &str,
        period: StatementPeriod,
    ) -> Result<IncomeStatement, AnalysisError> {
        let payload = self.get_summary(symbol, payload::income_module(period)).await?;
        payload::parse_income_statement(symbol, period, &payload)
    }

    async fn fetch_exchange_rate(&self, base: &str, quote: &str) -> Result<ExchangeRate, AnalysisError> {
        if base.eq_ignore_ascii_case(quote) {
            return ExchangeRate::new(base, quote, 1.0);
        }
        let pair = format!("{}{}=X", base.to_ascii_uppercase(), quote.to_ascii_uppercase());
        let query = [("range", "5d".to_string()), ("interval", "1d".to_string())];
        let payload = self.get_chart(&pair, &query).await?;
        let rate = payload::parse_last_price(&pair, payload)?;
        ExchangeRate::new(base, quote, rate)
    }
}
