use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Network error for {url}: {message}")]
    NetworkError { url: String, message: String },

    #[error("HTTP {status} returned by {url}")]
    HttpStatusError { url: String, status: u16 },

    #[error("Empty payload returned by {url}")]
    EmptyPayloadError { url: String },

    #[error("Could not decode payload from {url} (tried: {})", .tried.join(", "))]
    DecodeError { url: String, tried: Vec<String> },

    #[error("Malformed {format} payload from {url}: {message}")]
    MalformedPayloadError {
        url: String,
        format: String,
        message: String,
    },

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Payload,
    Config,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn network(url: &str, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        EtlError::NetworkError {
            url: url.to_string(),
            message,
        }
    }

    pub fn malformed(url: &str, format: impl ToString, message: impl ToString) -> Self {
        EtlError::MalformedPayloadError {
            url: url.to_string(),
            format: format.to_string(),
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::NetworkError { .. }
            | EtlError::HttpStatusError { .. }
            | EtlError::HttpClientError(_) => ErrorCategory::Network,
            EtlError::EmptyPayloadError { .. }
            | EtlError::DecodeError { .. }
            | EtlError::MalformedPayloadError { .. }
            | EtlError::CsvError(_) => ErrorCategory::Payload,
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Config,
            EtlError::IoError(_) => ErrorCategory::Io,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::EmptyPayloadError { .. } => ErrorSeverity::Low,
            EtlError::NetworkError { .. }
            | EtlError::HttpStatusError { .. }
            | EtlError::DecodeError { .. }
            | EtlError::MalformedPayloadError { .. } => ErrorSeverity::Medium,
            EtlError::HttpClientError(_)
            | EtlError::CsvError(_)
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorSeverity::High,
            EtlError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// 單一來源層級可恢復的錯誤：換下一個端點或格式即可
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EtlError::NetworkError { .. }
                | EtlError::HttpStatusError { .. }
                | EtlError::EmptyPayloadError { .. }
                | EtlError::DecodeError { .. }
                | EtlError::MalformedPayloadError { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::NetworkError { .. } => {
                "Check your connection or raise run.timeout_seconds in the config"
            }
            EtlError::HttpStatusError { .. } => {
                "The endpoint may have moved; update the source URL in the config"
            }
            EtlError::EmptyPayloadError { .. } => {
                "Configure a json_fallback endpoint for this source"
            }
            EtlError::DecodeError { .. } => "The payload uses an unsupported character encoding",
            EtlError::MalformedPayloadError { .. } => {
                "Check the endpoint format, records_path and record_key settings"
            }
            EtlError::HttpClientError(_) => "Check the TLS and proxy settings of this machine",
            EtlError::CsvError(_) => "Inspect the collected data for unexpected values",
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => "Fix the configuration file and run again",
            EtlError::IoError(_) => "Check that the output directory is writable",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach a data source: {}", self),
            ErrorCategory::Payload => format!("A data source returned unusable data: {}", self),
            ErrorCategory::Config => format!("Invalid configuration: {}", self),
            ErrorCategory::Io => format!("Could not write output files: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
