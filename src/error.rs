use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgument),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("config error: {0}")]
    Config(String),
}

impl AppError {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

/// Malformed input rejected before any exchange call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidArgument {
    #[error("granularity {granularity} is not one of {allowed}")]
    Granularity { granularity: u32, allowed: String },

    #[error("max samples per request must be > 0")]
    SampleCap,

    #[error("granularity {granularity} x {max_samples_per_request} samples overflows the window span")]
    WindowSpan {
        granularity: u32,
        max_samples_per_request: u32,
    },

    #[error("start {start} is after end {end}")]
    Range { start: String, end: String },

    #[error("invalid timestamp '{0}'")]
    Timestamp(String),

    #[error("start and end must use the same timestamp representation")]
    MismatchedTimestamps,

    #[error("unknown product id '{0}'")]
    Product(String),
}

/// Failure surfaced by an exchange client. The kind is decided once, where the
/// vendor response is decoded, and travels unchanged through the pipeline.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("exchange rejected request (status {status}): {message}")]
    InvalidArgument { status: u16, message: String },

    #[error("exchange authentication failed (status {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("exchange resource not found: {message}")]
    NotFound { message: String },

    #[error("exchange rate limit exceeded: {message}")]
    RateLimited { message: String },

    #[error("exchange server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("exchange error (status {status}): {message}")]
    Unknown { status: u16, message: String },
}

impl ExchangeError {
    /// Map a non-success HTTP status and the vendor's message into a kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => Self::InvalidArgument { status, message },
            401 | 403 => Self::Authentication { status, message },
            404 => Self::NotFound { message },
            429 => Self::RateLimited { message },
            500..=599 => Self::Server { status, message },
            _ => Self::Unknown { status, message },
        }
    }
}
