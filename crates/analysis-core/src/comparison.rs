use serde::Serialize;

use crate::{AnalysisError, PriceSeries};

/// Two price histories restricted to the window both of them cover.
///
/// CAGR and normalized prices are only comparable across entities when they
/// are measured over the same dates, so construction trims both sides to the
/// latest shared start and earliest shared end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonPair {
    first: PriceSeries,
    second: PriceSeries,
}

impl ComparisonPair {
    pub fn new(first: &PriceSeries, second: &PriceSeries) -> Result<Self, AnalysisError> {
        let (Some(a_start), Some(a_end), Some(b_start), Some(b_end)) =
            (first.start(), first.end(), second.start(), second.end())
        else {
            return Err(AnalysisError::InsufficientData(format!(
                "cannot compare {} and {}: one of the series is empty",
                first.symbol(),
                second.symbol()
            )));
        };

        let start = a_start.max(b_start);
        let end = a_end.min(b_end);

        let trim = |series: &PriceSeries| {
            let bars = series
                .bars()
                .iter()
                .filter(|b| b.timestamp >= start && b.timestamp <= end)
                .cloned()
                .collect::<Vec<_>>();
            series.with_bars(bars)
        };

        let first = trim(first);
        let second = trim(second);

        if first.len() < 2 || second.len() < 2 {
            return Err(AnalysisError::InsufficientData(format!(
                "{} and {} share fewer than two data points",
                first.symbol(),
                second.symbol()
            )));
        }

        Ok(Self { first, second })
    }

    pub fn first(&self) -> &PriceSeries {
        &self.first
    }

    pub fn second(&self) -> &PriceSeries {
        &self.second
    }

    /// Length of the shared window in years (365.25-day years).
    pub fn window_years(&self) -> f64 {
        match (self.first.start(), self.first.end()) {
            (Some(start), Some(end)) => (end - start).num_days() as f64 / 365.25,
            _ => 0.0,
        }
    }
}
