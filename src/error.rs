use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Invalid API key: it must be at least {min} characters long", min = crate::config::MIN_API_KEY_LEN)]
    InvalidCredential,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("Unknown model '{0}'")]
    UnknownModel(String),

    #[error("No metrics selected: choose at least one metric to extract")]
    NoMetricsSelected,

    #[error("PDF text extraction failed: {0}")]
    PdfExtraction(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Outcome of a single failed chat-completion call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("API key rejected or missing")]
    InvalidCredential,

    #[error("Request timed out")]
    Timeout,

    #[error("Too many requests, rate limited by the provider")]
    RateLimited,

    #[error("Insufficient API credit")]
    InsufficientCredit,

    #[error("{}", transport_message(.status, .message))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),
}

fn transport_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP error {}: {}", code, message),
        None => format!("Transport error: {}", message),
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return CompletionError::Timeout;
        }
        CompletionError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
