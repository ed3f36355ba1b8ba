#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("invalid attendance status '{value}' (expected present, absent, bunk or cancelled)")]
    InvalidStatus { value: String },
    #[error("invalid threshold {value} (expected a percentage between 0 and 100)")]
    InvalidThreshold { value: i64 },
    #[error(
        "invalid counting mode '{value}' (expected bunk_as_present, bunk_as_absent or bunk_ignored)"
    )]
    InvalidMode { value: String },
    #[error("invalid month '{value}' (expected YYYY-MM)")]
    InvalidMonth { value: String },
}

pub type AggregateResult<T> = Result<T, AggregateError>;
