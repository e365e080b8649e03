use analysis_core::{AnalysisError, FundamentalsSnapshot};
use serde::{Deserialize, Serialize};

/// A price multiple that can be compared across two companies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationMetric {
    TrailingPe,
    PriceToBook,
}

impl ValuationMetric {
    pub fn parse(value: &str) -> Result<Self, AnalysisError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pe" | "p/e" | "trailing_pe" => Ok(ValuationMetric::TrailingPe),
            "pb" | "p/b" | "price_to_book" => Ok(ValuationMetric::PriceToBook),
            other => Err(AnalysisError::InvalidInput(format!(
                "unknown valuation metric '{}' (expected pe or pb)",
                other
            ))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValuationMetric::TrailingPe => "P/E",
            ValuationMetric::PriceToBook => "P/B",
        }
    }

    pub fn value_of(&self, fundamentals: &FundamentalsSnapshot) -> Option<f64> {
        match self {
            ValuationMetric::TrailingPe => fundamentals.trailing_pe,
            ValuationMetric::PriceToBook => fundamentals.price_to_book,
        }
    }
}

/// Percentage by which `a` is priced above (positive) or below `b`.
pub fn valuation_premium(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) if b != 0.0 => Some((a / b - 1.0) * 100.0),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultipleComparison {
    pub metric: ValuationMetric,
    pub first_symbol: String,
    pub second_symbol: String,
    pub first_value: Option<f64>,
    pub second_value: Option<f64>,
    /// `None` when either side lacks the metric or the second is zero.
    pub premium_pct: Option<f64>,
}

pub fn multiple_premium(
    first: &FundamentalsSnapshot,
    second: &FundamentalsSnapshot,
    metric: ValuationMetric,
) -> MultipleComparison {
    let first_value = metric.value_of(first);
    let second_value = metric.value_of(second);
    MultipleComparison {
        metric,
        first_symbol: first.symbol.clone(),
        second_symbol: second.symbol.clone(),
        first_value,
        second_value,
        premium_pct: valuation_premium(first_value, second_value),
    }
}

/// Discount of the market price to intrinsic value, in percent of intrinsic.
pub fn margin_of_safety(intrinsic_value_per_share: f64, current_price: f64) -> Option<f64> {
    if !intrinsic_value_per_share.is_finite() || intrinsic_value_per_share <= 0.0 {
        return None;
    }
    Some((intrinsic_value_per_share - current_price) / intrinsic_value_per_share * 100.0)
}
