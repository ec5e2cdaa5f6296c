use crate::domain::{BatchId, LogLevel, LogTarget};
use crate::internal_logger::InternalLogger;
use thiserror::Error;

/// Why an upload attempt failed before any HTTP response was received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("DNS resolution failed: {0}")]
    Dns(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unable to create the request: {0}")]
    RequestCreation(String),
    #[error("Invalid client token: {0}")]
    InvalidToken(String),
}

/// Response code of the intake, or why no response was received.
pub type UploadOutcome = Result<u16, UploadError>;

/// Outcome of one batch upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Success { code: u16 },
    NetworkError { error: String },
    DnsError { error: String },
    InvalidTokenError { code: Option<u16> },
    HttpRedirection { code: u16 },
    HttpClientError { code: u16 },
    HttpClientRateLimiting { code: u16 },
    HttpServerError { code: u16 },
    UnknownError { code: Option<u16> },
    RequestCreationError { error: String },
}

impl UploadStatus {
    /// Maps an intake response code to its status.
    pub fn from_response_code(code: u16) -> Self {
        match code {
            202 => UploadStatus::Success { code },
            300..=399 => UploadStatus::HttpRedirection { code },
            401 | 403 => UploadStatus::InvalidTokenError { code: Some(code) },
            408 | 429 => UploadStatus::HttpClientRateLimiting { code },
            400..=499 => UploadStatus::HttpClientError { code },
            500..=599 => UploadStatus::HttpServerError { code },
            _ => UploadStatus::UnknownError { code: Some(code) },
        }
    }

    pub fn from_error(error: &UploadError) -> Self {
        match error {
            UploadError::Dns(e) => UploadStatus::DnsError { error: e.clone() },
            UploadError::Network(e) => UploadStatus::NetworkError { error: e.clone() },
            UploadError::RequestCreation(e) => UploadStatus::RequestCreationError { error: e.clone() },
            UploadError::InvalidToken(_) => UploadStatus::InvalidTokenError { code: None },
        }
    }

    /// Total mapping from a transport outcome to a status.
    pub fn classify(outcome: UploadOutcome) -> Self {
        match outcome {
            Ok(code) => Self::from_response_code(code),
            Err(e) => Self::from_error(&e),
        }
    }

    /// HTTP status code, `None` when no response was received.
    pub fn code(&self) -> Option<u16> {
        match self {
            UploadStatus::Success { code }
            | UploadStatus::HttpRedirection { code }
            | UploadStatus::HttpClientError { code }
            | UploadStatus::HttpClientRateLimiting { code }
            | UploadStatus::HttpServerError { code } => Some(*code),
            UploadStatus::InvalidTokenError { code } | UploadStatus::UnknownError { code } => *code,
            UploadStatus::NetworkError { .. }
            | UploadStatus::DnsError { .. }
            | UploadStatus::RequestCreationError { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadStatus::Success { .. })
    }

    /// Transient failures keep the batch on disk for a later attempt.
    pub fn should_retry(&self) -> bool {
        matches!(
            self,
            UploadStatus::NetworkError { .. }
                | UploadStatus::DnsError { .. }
                | UploadStatus::HttpServerError { .. }
                | UploadStatus::HttpClientRateLimiting { .. }
        )
    }

    /// The request never reached the intake because of connectivity.
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            UploadStatus::NetworkError { .. } | UploadStatus::DnsError { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            UploadStatus::Success { .. } => "success",
            UploadStatus::NetworkError { .. } => "network_error",
            UploadStatus::DnsError { .. } => "dns_error",
            UploadStatus::InvalidTokenError { .. } => "invalid_token_error",
            UploadStatus::HttpRedirection { .. } => "http_redirection",
            UploadStatus::HttpClientError { .. } => "http_client_error",
            UploadStatus::HttpClientRateLimiting { .. } => "http_client_rate_limiting",
            UploadStatus::HttpServerError { .. } => "http_server_error",
            UploadStatus::UnknownError { .. } => "unknown_error",
            UploadStatus::RequestCreationError { .. } => "request_creation_error",
        }
    }

    /// Level, audiences and message describing this status for `context`.
    pub fn log_entry(
        &self,
        context: &str,
        byte_size: usize,
        batch_id: Option<&BatchId>,
    ) -> (LogLevel, &'static [LogTarget], String) {
        const USER: &[LogTarget] = &[LogTarget::User];
        const USER_AND_TELEMETRY: &[LogTarget] = &[LogTarget::User, LogTarget::Telemetry];

        let batch = match batch_id {
            Some(id) => format!("Batch {id} [{byte_size} bytes] ({context})"),
            None => format!("Batch [{byte_size} bytes] ({context})"),
        };
        match self {
            UploadStatus::Success { .. } => {
                (LogLevel::Info, USER, format!("{batch} sent successfully."))
            }
            UploadStatus::NetworkError { error } => (
                LogLevel::Warn,
                USER,
                format!("{batch} failed because of a network error ({error}); we will retry later."),
            ),
            UploadStatus::DnsError { error } => (
                LogLevel::Warn,
                USER,
                format!("{batch} failed because of a DNS error ({error}); we will retry later."),
            ),
            UploadStatus::InvalidTokenError { .. } => (
                LogLevel::Error,
                USER,
                format!(
                    "{batch} failed because your token is invalid; the batch was dropped. \
                     Make sure that the provided token still exists and you're targeting \
                     the relevant Datadog site."
                ),
            ),
            UploadStatus::HttpRedirection { .. } => (
                LogLevel::Warn,
                USER,
                format!("{batch} failed because of a network redirection; the batch was dropped."),
            ),
            UploadStatus::HttpClientError { .. } => (
                LogLevel::Error,
                USER_AND_TELEMETRY,
                format!(
                    "{batch} failed because of a processing error or invalid data; \
                     the batch was dropped."
                ),
            ),
            UploadStatus::HttpClientRateLimiting { .. } => (
                LogLevel::Warn,
                USER_AND_TELEMETRY,
                format!(
                    "{batch} failed because of an intake rate limitation; we will retry later."
                ),
            ),
            UploadStatus::HttpServerError { .. } => (
                LogLevel::Error,
                USER,
                format!(
                    "{batch} failed because of a server processing error; we will retry later."
                ),
            ),
            UploadStatus::UnknownError { code } => {
                let code = code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
                (
                    LogLevel::Error,
                    USER,
                    format!(
                        "{batch} failed because of an unexpected HTTP error \
                         (status code = {code}); the batch was dropped."
                    ),
                )
            }
            UploadStatus::RequestCreationError { error } => (
                LogLevel::Error,
                USER_AND_TELEMETRY,
                format!(
                    "{batch} failed because of an error when creating the request ({error}); \
                     the batch was dropped."
                ),
            ),
        }
    }

    pub fn log_status(
        &self,
        context: &str,
        byte_size: usize,
        logger: &dyn InternalLogger,
        batch_id: Option<&BatchId>,
    ) {
        let (level, targets, message) = self.log_entry(context, byte_size, batch_id);
        logger.log(level, targets, &message);
    }
}
