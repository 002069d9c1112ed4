//! Bank-rail transfer sub-flow
//!
//! Runs after the outer [`AuthGate`](crate::gate::AuthGate) has authorized
//! the transfer:
//!
//! ```text
//! Confirm --initiate--> OtpRequired --otp ok--> Processing --verified--> Success
//!    |                    ^   |                     |
//!    |                    +---+ otp rejected        +--failed/timed out--> Error
//!    +--(no OTP needed)--------------------------> Processing
//! ```
//!
//! Settlement confirmation polls with exponential backoff instead of a
//! single delayed check, and ends in `Error` with
//! [`Error::TransferTimedOut`] when the rail is still pending after the last
//! attempt.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::PaymentBackend;
use crate::config::PollingConfig;
use crate::error::Error;
use crate::remote::{guarded, pause};
use crate::types::{InitiateTransferRequest, VerificationOutcome};
use crate::validation::validate_otp_format;

/// Bank transfer progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BankTransferState {
    Confirm,
    OtpRequired,
    Processing,
    Success,
    Error,
}

impl fmt::Display for BankTransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Settled transfer details
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferConfirmation {
    pub reference: String,
    /// Verification calls made, including the successful one
    pub attempts: u32,
}

/// One bank transfer, from confirmation to settlement
pub struct BankTransferFlow<'a, B: PaymentBackend + ?Sized> {
    backend: &'a B,
    polling: PollingConfig,
    timeout: Duration,
    cancel: CancellationToken,
    state: BankTransferState,
    reference: Option<String>,
    otp_error: Option<String>,
    otp_attempts: u32,
    message: Option<String>,
}

impl<'a, B: PaymentBackend + ?Sized> BankTransferFlow<'a, B> {
    pub fn new(
        backend: &'a B,
        polling: PollingConfig,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            polling,
            timeout,
            cancel,
            state: BankTransferState::Confirm,
            reference: None,
            otp_error: None,
            otp_attempts: 0,
            message: None,
        }
    }

    /// Pick up a transfer that was already initiated, e.g. after
    /// [`Error::TransferTimedOut`], and go straight to confirmation
    pub fn resume(
        backend: &'a B,
        polling: PollingConfig,
        timeout: Duration,
        cancel: CancellationToken,
        reference: impl Into<String>,
    ) -> Self {
        let mut flow = Self::new(backend, polling, timeout, cancel);
        flow.reference = Some(reference.into());
        flow.state = BankTransferState::Processing;
        flow
    }

    pub fn state(&self) -> BankTransferState {
        self.state
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Inline error from the last rejected OTP
    pub fn otp_error(&self) -> Option<&str> {
        self.otp_error.as_deref()
    }

    pub fn otp_attempts(&self) -> u32 {
        self.otp_attempts
    }

    /// Message returned by the rail when the transfer was initiated
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Start the transfer. Moves to `OtpRequired` or straight to `Processing`.
    pub async fn initiate(
        &mut self,
        request: &InitiateTransferRequest,
    ) -> Result<BankTransferState, Error> {
        self.expect_state(BankTransferState::Confirm, "initiate")?;

        let result = guarded(
            &self.cancel,
            self.timeout,
            "initiate_transfer",
            self.backend.initiate_transfer(request),
        )
        .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let e = e.after_submission("initiate_transfer", request.idempotency_key);
                return Err(self.fail(e));
            }
        };

        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "Transfer could not be initiated".to_string());
            return Err(self.fail(Error::Backend {
                status: 400,
                message,
            }));
        }

        let reference = match response.reference {
            Some(reference) if !reference.is_empty() => reference,
            _ => {
                return Err(self.fail(Error::Other(
                    "Transfer initiated without a reference".to_string(),
                )))
            }
        };

        info!(
            reference = %reference,
            requires_auth = response.requires_auth,
            "bank transfer initiated"
        );
        self.reference = Some(reference);
        self.message = response.message;
        self.state = if response.requires_auth {
            BankTransferState::OtpRequired
        } else {
            BankTransferState::Processing
        };
        Ok(self.state)
    }

    /// Submit an OTP. A rejected OTP keeps the flow in `OtpRequired` with an
    /// inline error so the user can try again in place.
    pub async fn submit_otp(&mut self, otp: &str) -> Result<BankTransferState, Error> {
        self.expect_state(BankTransferState::OtpRequired, "submit_otp")?;

        if let Err(e) = validate_otp_format(otp) {
            self.otp_error = Some(e.user_message());
            return Ok(self.state);
        }

        let reference = self.current_reference()?;
        self.otp_attempts += 1;
        let result = guarded(
            &self.cancel,
            self.timeout,
            "submit_otp",
            self.backend.submit_otp(&reference, otp),
        )
        .await;
        let response = match result {
            Ok(response) => response,
            Err(e @ Error::Cancelled) => return Err(self.fail(e)),
            Err(e) => {
                // transport trouble is also shown inline; the OTP may still be valid
                warn!(reference = %reference, error = %e, "OTP submission failed");
                self.otp_error = Some(e.user_message());
                return Ok(self.state);
            }
        };

        if response.success {
            debug!(reference = %reference, attempts = self.otp_attempts, "OTP accepted");
            self.otp_error = None;
            self.state = BankTransferState::Processing;
        } else {
            self.otp_error = Some(
                response
                    .error
                    .unwrap_or_else(|| "Invalid OTP. Please try again.".to_string()),
            );
        }
        Ok(self.state)
    }

    /// Poll the rail until the transfer settles, fails, or attempts run out
    pub async fn await_confirmation(&mut self) -> Result<TransferConfirmation, Error> {
        self.expect_state(BankTransferState::Processing, "await_confirmation")?;
        let reference = self.current_reference()?;

        let polling = self.polling;
        let mut attempts = 0;
        for delay in polling.delays() {
            if let Err(e) = pause(&self.cancel, delay).await {
                return Err(self.fail(e));
            }
            attempts += 1;

            let result = guarded(
                &self.cancel,
                self.timeout,
                "verify_transfer",
                self.backend.verify_transfer(&reference),
            )
            .await;
            let outcome = match result {
                Ok(response) => response.outcome(),
                Err(e @ Error::Cancelled) => return Err(self.fail(e)),
                Err(e) if e.is_retryable() => {
                    warn!(reference = %reference, attempt = attempts, error = %e, "verification call failed, will retry");
                    VerificationOutcome::Pending
                }
                Err(e) => return Err(self.fail(e)),
            };

            match outcome {
                VerificationOutcome::Completed => {
                    info!(reference = %reference, attempts, "bank transfer settled");
                    self.state = BankTransferState::Success;
                    return Ok(TransferConfirmation {
                        reference,
                        attempts,
                    });
                }
                VerificationOutcome::Pending => {
                    debug!(reference = %reference, attempt = attempts, "bank transfer still pending");
                }
                VerificationOutcome::Failed(reason) => {
                    return Err(self.fail(Error::TransferFailed(reason)));
                }
            }
        }

        Err(self.fail(Error::TransferTimedOut {
            reference,
            attempts,
        }))
    }

    fn fail(&mut self, error: Error) -> Error {
        if !matches!(error, Error::Cancelled) {
            warn!(reference = ?self.reference, error = %error, "bank transfer failed");
        }
        self.state = BankTransferState::Error;
        error
    }

    fn current_reference(&self) -> Result<String, Error> {
        self.reference
            .clone()
            .ok_or_else(|| Error::Other("Bank transfer has no reference".to_string()))
    }

    fn expect_state(&self, expected: BankTransferState, action: &str) -> Result<(), Error> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                state: self.state.to_string(),
                event: action.to_string(),
            })
        }
    }
}
