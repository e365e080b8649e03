use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Unknown symbol, unreachable provider, timeout or empty payload.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Invalid exchange rate: {0}")]
    InvalidRate(String),

    #[error("Invalid valuation assumptions: {0}")]
    InvalidAssumptions(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A field the provider is allowed to omit was absent for this entity.
    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Empty series: {0}")]
    EmptySeries(String),
}

impl AnalysisError {
    /// Stable tag for presentation layers and serialized reports.
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::DataUnavailable(_) => "data_unavailable",
            AnalysisError::InvalidRate(_) => "invalid_rate",
            AnalysisError::InvalidAssumptions(_) => "invalid_assumptions",
            AnalysisError::InvalidInput(_) => "invalid_input",
            AnalysisError::MissingData(_) => "missing_data",
            AnalysisError::InsufficientData(_) => "insufficient_data",
            AnalysisError::EmptySeries(_) => "empty_series",
        }
    }

    /// True for errors caused by history/fields the provider did not supply,
    /// as opposed to user inputs that need adjusting.
    pub fn is_data_gap(&self) -> bool {
        matches!(
            self,
            AnalysisError::DataUnavailable(_)
                | AnalysisError::MissingData(_)
                | AnalysisError::InsufficientData(_)
                | AnalysisError::EmptySeries(_)
        )
    }
}
