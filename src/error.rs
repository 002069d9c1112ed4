use thiserror::Error;
use uuid::Uuid;

use crate::money::Amount;

/// SDK Error type
#[derive(Error, Debug)]
pub enum Error {
    /// Client-side input validation failure
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested withdrawal would exceed the daily KYC limit
    #[error("Daily limit exceeded. Remaining: {remaining}")]
    LimitExceeded { remaining: Amount },

    /// Requested total is larger than the available balance
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Amount, required: Amount },

    /// PIN was rejected by the backend
    #[error("Incorrect PIN")]
    PinRejected,

    /// Biometric confirmation and PIN fallback both failed or were declined
    #[error("Step-up authentication failed")]
    BiometricRejected,

    /// OTP submission error
    #[error("OTP error: {0}")]
    Otp(String),

    /// Backend rejected the request
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A remote call did not resolve in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A side-effecting call left the client but no answer came back; the
    /// backend may or may not have applied it
    #[error("Outcome of {operation} unknown (idempotency key {idempotency_key})")]
    OutcomeUnknown {
        operation: String,
        idempotency_key: Uuid,
    },

    /// Bank transfer still pending after the last verification attempt.
    /// Re-verify `reference` instead of starting a new transfer.
    #[error("Transfer {reference} still pending after {attempts} verification attempts")]
    TransferTimedOut { reference: String, attempts: u32 },

    /// Bank transfer was declined during verification
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Flow was abandoned by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// State machine received an event it cannot handle in its current state
    #[error("Invalid transition: {event} in state {state}")]
    InvalidTransition { state: String, event: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether repeating the same request later could succeed.
    ///
    /// Timeouts, transport failures and 5xx/429 backend responses are
    /// transient. Everything the user has to act on (bad input, limits,
    /// wrong PIN, declined transfer) is terminal, and so is a side-effecting
    /// call whose outcome is unknown.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout(_) => true,
            Error::Backend { status, .. } => *status >= 500 || *status == 429,
            Error::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            Error::Validation(_)
            | Error::LimitExceeded { .. }
            | Error::InsufficientBalance { .. }
            | Error::PinRejected
            | Error::BiometricRejected
            | Error::Otp(_)
            | Error::OutcomeUnknown { .. }
            | Error::TransferTimedOut { .. }
            | Error::TransferFailed(_)
            | Error::Cancelled
            | Error::InvalidTransition { .. }
            | Error::Config(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Other(_) => false,
        }
    }

    /// Reclassify a failure of the side-effecting call `operation`. Timeouts
    /// and transport errors become [`Error::OutcomeUnknown`]; answers from
    /// the backend are kept as they are.
    pub(crate) fn after_submission(self, operation: &str, idempotency_key: Uuid) -> Error {
        match self {
            Error::Timeout(_) | Error::Http(_) => Error::OutcomeUnknown {
                operation: operation.to_string(),
                idempotency_key,
            },
            other => other,
        }
    }

    /// Message shown to the user for this failure.
    ///
    /// Backend messages are passed through verbatim; anything else without a
    /// user-facing meaning collapses into a generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            Error::Backend { message, .. } if !message.is_empty() => message.clone(),
            Error::Validation(message) | Error::Otp(message) => message.clone(),
            Error::OutcomeUnknown { .. } => {
                "We could not confirm this transaction. Check your history before trying again."
                    .to_string()
            }
            Error::TransferTimedOut { reference, .. } => format!(
                "Transfer {} is still processing. Check its status before trying again.",
                reference
            ),
            Error::Http(_) | Error::Serialization(_) | Error::Io(_) | Error::Config(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}
