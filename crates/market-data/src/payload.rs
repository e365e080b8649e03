//! Conversion of provider JSON payloads into domain types.
//!
//! Kept free of I/O so every mapping rule can be exercised on fixture JSON.

use analysis_core::{
    AnalysisError, AnalysisPeriod, Bar, CashFlowEntry, CashFlowSeries, FundamentalsSnapshot,
    IncomeStatement, IncomeStatementEntry, PriceSeries, StatementPeriod,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;

// Chart response structures
#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ProviderError {
    fn describe(&self) -> String {
        match (&self.code, &self.description) {
            (Some(code), Some(desc)) => format!("{}: {}", code, desc),
            (Some(code), None) => code.clone(),
            (None, Some(desc)) => desc.clone(),
            (None, None) => "provider returned an error".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn unavailable(symbol: &str, detail: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::DataUnavailable(format!("{}: {}", symbol, detail))
}

fn chart_result(symbol: &str, payload: Value) -> Result<ChartResult, AnalysisError> {
    let envelope: ChartEnvelope = serde_json::from_value(payload)
        .map_err(|e| unavailable(symbol, format!("malformed chart payload ({})", e)))?;

    if let Some(err) = envelope.chart.error {
        return Err(unavailable(symbol, err.describe()));
    }

    envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| unavailable(symbol, "no chart data returned"))
}

/// Daily bars from a chart payload. Rows without a close are dropped, the
/// rest are sorted and de-duplicated by timestamp (last row wins).
pub fn parse_price_history(
    symbol: &str,
    period: AnalysisPeriod,
    payload: Value,
) -> Result<PriceSeries, AnalysisError> {
    let result = chart_result(symbol, payload)?;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let at = |column: &[Option<f64>], i: usize| column.get(i).copied().flatten();

    let mut bars: Vec<Bar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let close = at(&quote.close, i).filter(|c| c.is_finite())?;
            let timestamp = DateTime::<Utc>::from_timestamp(ts, 0)?;
            Some(Bar {
                timestamp,
                open: at(&quote.open, i).unwrap_or(close),
                high: at(&quote.high, i).unwrap_or(close),
                low: at(&quote.low, i).unwrap_or(close),
                close,
                volume: at(&quote.volume, i).unwrap_or(0.0),
            })
        })
        .collect();

    bars.sort_by_key(|b| b.timestamp);
    // keep the last row for a repeated timestamp
    bars.reverse();
    bars.dedup_by_key(|b| b.timestamp);
    bars.reverse();

    if bars.is_empty() {
        return Err(unavailable(symbol, "no price data returned"));
    }

    PriceSeries::new(symbol, period, bars)
}

/// Latest quote from a chart payload, preferring the live market price.
pub fn parse_last_price(symbol: &str, payload: Value) -> Result<f64, AnalysisError> {
    let result = chart_result(symbol, payload)?;
    if let Some(price) = result.meta.regular_market_price.filter(|p| p.is_finite()) {
        return Ok(price);
    }
    result
        .indicators
        .quote
        .first()
        .and_then(|q| q.close.iter().rev().find_map(|c| *c))
        .ok_or_else(|| unavailable(symbol, "no quote in chart payload"))
}

/// Session crumb from a getcrumb response body. HTML pages, rate-limit
/// notices and anything with whitespace are not crumbs.
pub fn parse_crumb(body: &str) -> Option<String> {
    let crumb = body.trim();
    if crumb.is_empty()
        || crumb.len() >= 100
        || crumb.contains(char::is_whitespace)
        || crumb.contains('<')
    {
        return None;
    }
    Some(crumb.to_string())
}

fn summary_result<'a>(symbol: &str, payload: &'a Value) -> Result<&'a Value, AnalysisError> {
    let summary = payload
        .get("quoteSummary")
        .ok_or_else(|| unavailable(symbol, "malformed quote summary payload"))?;

    if let Some(err) = summary.get("error").filter(|e| !e.is_null()) {
        let description = err
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("provider returned an error");
        return Err(unavailable(symbol, description));
    }

    summary
        .get("result")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| unavailable(symbol, "no quote summary returned"))
}

/// Numeric field in the `{"raw": .., "fmt": ..}` shape; `{}` means absent.
fn raw(node: &Value, field: &str) -> Option<f64> {
    node.get(field)
        .and_then(|v| v.get("raw").or(Some(v)))
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite())
}

fn text(node: &Value, field: &str) -> Option<String> {
    node.get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn fiscal_date(node: &Value) -> Option<NaiveDate> {
    let secs = node
        .get("endDate")
        .and_then(|v| v.get("raw").or(Some(v)))
        .and_then(|v| v.as_i64())?;
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

pub fn parse_fundamentals(symbol: &str, payload: &Value) -> Result<FundamentalsSnapshot, AnalysisError> {
    let result = summary_result(symbol, payload)?;
    let empty = Value::Null;
    let price = result.get("price").unwrap_or(&empty);
    let detail = result.get("summaryDetail").unwrap_or(&empty);
    let stats = result.get("defaultKeyStatistics").unwrap_or(&empty);
    let profile = result.get("assetProfile").unwrap_or(&empty);

    Ok(FundamentalsSnapshot {
        symbol: symbol.to_string(),
        long_name: text(price, "longName").or_else(|| text(price, "shortName")),
        currency: text(price, "currency").or_else(|| text(detail, "currency")),
        sector: text(profile, "sector"),
        shares_outstanding: raw(stats, "sharesOutstanding"),
        trailing_pe: raw(detail, "trailingPE"),
        price_to_book: raw(stats, "priceToBook"),
        market_cap: raw(price, "marketCap").or_else(|| raw(detail, "marketCap")),
        dividend_yield: raw(detail, "dividendYield"),
    })
}

fn statements<'a>(
    symbol: &str,
    result: &'a Value,
    module: &str,
    list: &str,
) -> Result<&'a Vec<Value>, AnalysisError> {
    let rows = result
        .get(module)
        .and_then(|m| m.get(list))
        .and_then(|v| v.as_array())
        .ok_or_else(|| unavailable(symbol, format!("{} not returned", module)))?;
    if rows.is_empty() {
        return Err(unavailable(symbol, format!("{} is empty", module)));
    }
    Ok(rows)
}

/// Module name requested for a cash-flow statement of the given period.
pub fn cash_flow_module(period: StatementPeriod) -> &'static str {
    match period {
        StatementPeriod::Annual => "cashflowStatementHistory",
        StatementPeriod::Quarterly => "cashflowStatementHistoryQuarterly",
    }
}

pub fn income_module(period: StatementPeriod) -> &'static str {
    match period {
        StatementPeriod::Annual => "incomeStatementHistory",
        StatementPeriod::Quarterly => "incomeStatementHistoryQuarterly",
    }
}

/// Cash-flow statements in provider order. Free cash flow is the reported
/// figure when present, otherwise operating cash flow plus (negative) capex.
pub fn parse_cash_flow(
    symbol: &str,
    period: StatementPeriod,
    payload: &Value,
) -> Result<CashFlowSeries, AnalysisError> {
    let result = summary_result(symbol, payload)?;
    let rows = statements(symbol, result, cash_flow_module(period), "cashflowStatements")?;

    let entries = rows
        .iter()
        .filter_map(|row| {
            let fiscal_date = fiscal_date(row)?;
            let operating_cash_flow = raw(row, "totalCashFromOperatingActivities");
            let capital_expenditure = raw(row, "capitalExpenditures");
            let free_cash_flow = raw(row, "freeCashFlow").or(match (operating_cash_flow, capital_expenditure) {
                (Some(ocf), Some(capex)) => Some(ocf + capex),
                _ => None,
            });
            Some(CashFlowEntry {
                fiscal_date,
                operating_cash_flow,
                capital_expenditure,
                free_cash_flow,
            })
        })
        .collect();

    Ok(CashFlowSeries {
        symbol: symbol.to_string(),
        period,
        entries,
    })
}

pub fn parse_income_statement(
    symbol: &str,
    period: StatementPeriod,
    payload: &Value,
) -> Result<IncomeStatement, AnalysisError> {
    let result = summary_result(symbol, payload)?;
    let rows = statements(symbol, result, income_module(period), "incomeStatementHistory")?;

    let entries = rows
        .iter()
        .filter_map(|row| {
            Some(IncomeStatementEntry {
                fiscal_date: fiscal_date(row)?,
                total_revenue: raw(row, "totalRevenue"),
                gross_profit: raw(row, "grossProfit"),
                operating_income: raw(row, "operatingIncome"),
                net_income: raw(row, "netIncome"),
            })
        })
        .collect();

    Ok(IncomeStatement {
        symbol: symbol.to_string(),
        period,
        entries,
    })
}
