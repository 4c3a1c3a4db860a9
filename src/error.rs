use thiserror::Error;

/// Pre-flight checks; these never reach the network or the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("command is empty")]
    EmptyCommand,
    #[error("source text is empty")]
    EmptyText,
    #[error("command is too short")]
    CommandTooShort,
}

impl ValidationError {
    pub fn message_key(self) -> &'static str {
        match self {
            ValidationError::EmptyCommand => "error_empty_command",
            ValidationError::EmptyText => "error_empty_text",
            ValidationError::CommandTooShort => "error_command_too_short",
        }
    }
}

/// Classification of a dispatched request that did not produce text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    EmptyResult,
    BadRequest,
    ServerError,
    RateLimited,
    Timeout,
    ConnectionRefused,
    Unknown,
}

impl FailureKind {
    pub fn retryable(self) -> bool {
        !matches!(self, FailureKind::BadRequest)
    }

    pub fn message_key(self) -> &'static str {
        match self {
            FailureKind::EmptyResult => "error_empty_result",
            FailureKind::BadRequest => "error_bad_request",
            FailureKind::ServerError => "error_server",
            FailureKind::RateLimited => "error_rate_limited",
            FailureKind::Timeout => "error_timeout",
            FailureKind::ConnectionRefused => "error_connection_refused",
            FailureKind::Unknown => "error_unknown",
        }
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            400 => FailureKind::BadRequest,
            429 => FailureKind::RateLimited,
            500..=599 => FailureKind::ServerError,
            _ => FailureKind::Unknown,
        }
    }
}

/// A dispatched request that failed. `message` is the raw error text that
/// goes into the ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn retryable(&self) -> bool {
        self.kind.retryable()
    }
}

/// Rejections that happen locally, before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("retry limit reached")]
    RetryExhausted,
    #[error("last failure cannot be retried")]
    NotRetryable,
    #[error("nothing to retry")]
    NothingToRetry,
}

impl SubmitError {
    pub fn message_key(self) -> &'static str {
        match self {
            SubmitError::Invalid(v) => v.message_key(),
            SubmitError::RetryExhausted => "error_retry_exhausted",
            SubmitError::NotRetryable => "error_not_retryable",
            SubmitError::NothingToRetry => "error_nothing_to_retry",
        }
    }
}
