use analysis_orchestrator::{
    ComparisonReport, DashboardReport, PriceOverview, Section, StatementReport, TickerReport,
    ValuationSummary,
};
use std::fmt::Write;

const LABEL_WIDTH: usize = 16;

/// Compact monetary amount: 1.23T, 4.56B, 7.89M, or plain with two decimals.
pub fn format_amount(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e12 {
        format!("{:.2}T", value / 1e12)
    } else if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else {
        format!("{:.2}", value)
    }
}

fn opt<T>(value: Option<T>, show: impl Fn(T) -> String) -> String {
    value.map(show).unwrap_or_else(|| "N/A".to_string())
}

fn section_line<T>(out: &mut String, label: &str, section: &Section<T>, show: impl Fn(&T) -> String) {
    let body = match section {
        Section::Available(value) => show(value),
        Section::Unavailable {
            message,
            data_gap: true,
            ..
        } => format!("N/A ({})", message),
        Section::Unavailable { message, .. } => format!("N/A ({}; adjust the request)", message),
    };
    let _ = writeln!(out, "  {:<width$}{}", format!("{}:", label), body, width = LABEL_WIDTH);
}

fn price_line(price: &PriceOverview) -> String {
    format!(
        "{:.2}  ({} .. {}, {} points)",
        price.current_price,
        price.start.format("%Y-%m-%d"),
        price.end.format("%Y-%m-%d"),
        price.points.len()
    )
}

fn valuation_line(summary: &ValuationSummary) -> String {
    let per_share = opt(summary.dcf.intrinsic_value_per_share, |v| format!("{:.2}", v));
    let mut line = format!(
        "intrinsic {} per share (total {}, from FCF {})",
        per_share,
        format_amount(summary.dcf.intrinsic_value),
        format_amount(summary.dcf.base_cash_flow)
    );
    if let (Some(price), Some(verdict)) = (summary.current_price, summary.verdict) {
        let _ = write!(line, " vs price {:.2} -> {}", price, verdict.label());
    }
    if let Some(margin) = summary.margin_of_safety_pct {
        let _ = write!(line, ", margin of safety {:.1}%", margin);
    }
    line
}

fn render_statement(out: &mut String, statement: &StatementReport) {
    match statement {
        StatementReport::Income(income) => {
            let _ = writeln!(
                out,
                "    {:<12}{:>12}{:>12}{:>12}{:>12}",
                "Fiscal date", "Revenue", "Gross", "Operating", "Net"
            );
            for entry in income.chronological() {
                let _ = writeln!(
                    out,
                    "    {:<12}{:>12}{:>12}{:>12}{:>12}",
                    entry.fiscal_date,
                    opt(entry.total_revenue, format_amount),
                    opt(entry.gross_profit, format_amount),
                    opt(entry.operating_income, format_amount),
                    opt(entry.net_income, format_amount)
                );
            }
        }
        StatementReport::CashFlow(cash_flow) => {
            let _ = writeln!(
                out,
                "    {:<12}{:>12}{:>12}{:>12}",
                "Fiscal date", "Operating", "Capex", "Free CF"
            );
            for entry in cash_flow.chronological() {
                let _ = writeln!(
                    out,
                    "    {:<12}{:>12}{:>12}{:>12}",
                    entry.fiscal_date,
                    opt(entry.operating_cash_flow, format_amount),
                    opt(entry.capital_expenditure, format_amount),
                    opt(entry.free_cash_flow, format_amount)
                );
            }
        }
    }
}

fn render_ticker(out: &mut String, ticker: &TickerReport) {
    let currency = ticker.currency.as_deref().unwrap_or("currency unknown");
    let _ = writeln!(out, "=== {} ({}) ===", ticker.symbol, currency);

    if let Some(conversion) = &ticker.conversion {
        section_line(out, "Conversion", conversion, |rate| {
            format!("1 {} = {} {}", rate.base(), rate.rate(), rate.quote())
        });
    }
    section_line(out, "Company", &ticker.fundamentals, |f| {
        format!(
            "{} | sector {} | P/E {} | P/B {} | market cap {} | dividend yield {}",
            f.long_name.as_deref().unwrap_or(&f.symbol),
            f.sector.as_deref().unwrap_or("N/A"),
            opt(f.trailing_pe, |v| format!("{:.2}", v)),
            opt(f.price_to_book, |v| format!("{:.2}", v)),
            opt(f.market_cap, format_amount),
            opt(f.dividend_yield, |v| format!("{:.2}%", v * 100.0))
        )
    });
    section_line(out, "Price", &ticker.price, price_line);
    section_line(out, "Risk/return", &ticker.risk_return, |r| {
        format!(
            "CAGR {} | volatility {} | Sharpe {} | max drawdown {}",
            opt(r.cagr_pct, |v| format!("{:.2}%", v)),
            opt(r.annualized_volatility, |v| format!("{:.2}%", v * 100.0)),
            opt(r.sharpe_ratio, |v| format!("{:.2}", v)),
            opt(r.max_drawdown_pct, |v| format!("{:.2}%", v))
        )
    });
    section_line(out, "Free cash flow", &ticker.cash_flow_trend, |trend| {
        trend
            .iter()
            .map(|fv| format!("{} {}", fv.fiscal_date, format_amount(fv.value)))
            .collect::<Vec<_>>()
            .join(", ")
    });
    section_line(out, "Valuation", &ticker.valuation, valuation_line);

    if let Some(statement) = &ticker.statement {
        match statement {
            Section::Available(report) => {
                let _ = writeln!(out, "  Statement:");
                render_statement(out, report);
            }
            unavailable => section_line(out, "Statement", unavailable, |_| String::new()),
        }
    }
}

fn comparison_line(c: &ComparisonReport) -> String {
    let [first, second] = &c.normalized;
    let last = |s: &analysis_orchestrator::NormalizedSeries| s.points.last().map(|p| p.value);
    let mut line = format!(
        "{} .. {} ({:.2}y) | growth of 1: {} {} vs {} {} | CAGR {} vs {} | {} premium {}",
        c.window_start.format("%Y-%m-%d"),
        c.window_end.format("%Y-%m-%d"),
        c.window_years,
        first.symbol,
        opt(last(first), |v| format!("{:.2}", v)),
        second.symbol,
        opt(last(second), |v| format!("{:.2}", v)),
        opt(c.cagr_pct[0], |v| format!("{:.2}%", v)),
        opt(c.cagr_pct[1], |v| format!("{:.2}%", v)),
        c.multiple.metric.label(),
        opt(c.multiple.premium_pct, |v| format!("{:.2}%", v))
    );
    if !c.notes.is_empty() {
        let _ = write!(line, " | {}", c.notes.join("; "));
    }
    line
}

pub fn render_text(report: &DashboardReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "EquityLens | {} | growth {:.1}% | WACC {:.1}% | terminal {:.1}% | {}y horizon",
        report.period.label(),
        report.assumptions.growth_rate() * 100.0,
        report.assumptions.discount_rate() * 100.0,
        report.assumptions.terminal_growth_rate() * 100.0,
        report.assumptions.horizon_years()
    );
    for ticker in &report.tickers {
        let _ = writeln!(out);
        render_ticker(&mut out, ticker);
    }
    if let Some(comparison) = &report.comparison {
        let _ = writeln!(out);
        let _ = writeln!(out, "=== Comparison ===");
        section_line(&mut out, "Window", comparison, comparison_line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{AnalysisError, AnalysisPeriod, FundamentalsSnapshot};
    use analysis_orchestrator::PricePoint;
    use chrono::{TimeZone, Utc};
    use valuation_analysis::ValuationAssumptions;

    fn report() -> DashboardReport {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        let missing = AnalysisError::MissingData("shares outstanding not available for ACME".to_string());
        DashboardReport {
            generated_at: end,
            period: AnalysisPeriod::OneYear,
            assumptions: ValuationAssumptions::default(),
            tickers: vec![TickerReport {
                symbol: "ACME".to_string(),
                currency: Some("USD".to_string()),
                conversion: None,
                fundamentals: Section::Available(FundamentalsSnapshot {
                    long_name: Some("Acme Corp".to_string()),
                    market_cap: Some(2.5e12),
                    ..FundamentalsSnapshot::new("ACME")
                }),
                price: Section::Available(PriceOverview {
                    current_price: 187.5,
                    start,
                    end,
                    points: vec![
                        PricePoint { timestamp: start, close: 150.0 },
                        PricePoint { timestamp: end, close: 187.5 },
                    ],
                }),
                risk_return: Section::unavailable(&AnalysisError::InsufficientData(
                    "volatility needs at least 2 prices".to_string(),
                )),
                cash_flow_trend: Section::Available(Vec::new()),
                valuation: Section::unavailable(&missing),
                statement: None,
            }],
            comparison: None,
        }
    }

    #[test]
    fn test_unavailable_sections_render_as_na_with_reason() {
        let text = render_text(&report());
        assert!(text.contains("=== ACME (USD) ==="));
        assert!(text.contains("Price:          187.50  (2024-01-02 .. 2024-12-31, 2 points)"));
        assert!(text.contains("N/A (Missing data: shares outstanding not available for ACME)"));
        assert!(text.contains("N/A (Insufficient data: volatility needs at least 2 prices)"));
        assert!(text.contains("Acme Corp | sector N/A | P/E N/A"));
        assert!(text.contains("market cap 2.50T"));
    }

    #[test]
    fn test_input_errors_are_told_apart_from_data_gaps() {
        let mut report = report();
        report.tickers[0].conversion = Some(Section::unavailable(&AnalysisError::InvalidRate(
            "rate must be positive, got -1".to_string(),
        )));
        let text = render_text(&report);
        assert!(text.contains("N/A (Invalid exchange rate: rate must be positive, got -1; adjust the request)"));
        assert!(text.contains("N/A (Missing data: shares outstanding not available for ACME)\n"));
    }

    #[test]
    fn test_header_lists_assumptions() {
        let text = render_text(&report());
        assert!(text.starts_with("EquityLens | 1 Year | growth 8.0% | WACC 10.0% | terminal 3.0% | 5y horizon"));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1.234e12), "1.23T");
        assert_eq!(format_amount(-4.5e9), "-4.50B");
        assert_eq!(format_amount(7_890_000.0), "7.89M");
        assert_eq!(format_amount(36.316), "36.32");
    }
}
