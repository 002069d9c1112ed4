//! PIN and step-up authentication gate
//!
//! A single state value replaces the set of "show PIN modal" / "show
//! biometric prompt" flags a screen would otherwise juggle. Every
//! `(state, event)` pair is handled explicitly; pairs that make no sense
//! are reported as [`Error::InvalidTransition`] and leave the state as is.
//!
//! ```text
//! NotStarted --Continue--> PinPending --PinAccepted--> PinVerified
//!     ^                        |                          |
//!     +------PinRejected-------+        step-up needed? --+-- no --> Authorized
//!     |                                       | yes                    |
//!     +---BiometricRejected--- BiometricPending --BiometricAccepted--> +
//!     |
//!     +--Reset-- Failed <--RemoteFailure-- (any started state)
//! ```

use std::fmt;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::Error;
use crate::money::Amount;

/// Where a guarded transaction is in its authentication sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuthGateState {
    NotStarted,
    PinPending,
    PinVerified,
    BiometricPending,
    Authorized,
    Failed,
}

impl fmt::Display for AuthGateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Inputs to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    /// Amount step passed validation; carries the debit total
    Continue { total: Amount },
    PinAccepted,
    PinRejected,
    /// Biometric confirmation or PIN fallback succeeded
    BiometricAccepted,
    BiometricRejected,
    /// The processing call for this authorization finished successfully
    Completed,
    /// A remote call rejected or failed
    RemoteFailure,
    /// Modal closed or failure acknowledged
    Reset,
}

impl fmt::Display for GateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateEvent::Continue { total } => write!(f, "Continue({})", total),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// When large transactions need a second confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepUpPolicy {
    pub enabled: bool,
    pub threshold: Amount,
}

impl StepUpPolicy {
    pub fn new(enabled: bool, threshold: Amount) -> Self {
        Self { enabled, threshold }
    }

    /// Strictly greater than the threshold; a total equal to it does not step up
    pub fn requires_step_up(&self, total: Amount) -> bool {
        self.enabled && total > self.threshold
    }
}

#[derive(Debug, Clone, Copy)]
struct Authorization {
    idempotency_key: Uuid,
    claimed: bool,
}

/// Authentication state machine for one transaction screen
#[derive(Debug, Clone)]
pub struct AuthGate {
    state: AuthGateState,
    policy: StepUpPolicy,
    total: Amount,
    authorization: Option<Authorization>,
    history: Vec<AuthGateState>,
}

impl AuthGate {
    pub fn new(policy: StepUpPolicy) -> Self {
        Self {
            state: AuthGateState::NotStarted,
            policy,
            total: Amount::ZERO,
            authorization: None,
            history: vec![AuthGateState::NotStarted],
        }
    }

    pub fn state(&self) -> AuthGateState {
        self.state
    }

    /// Every state entered so far, in order, starting with `NotStarted`
    pub fn history(&self) -> &[AuthGateState] {
        &self.history
    }

    pub fn has_visited(&self, state: AuthGateState) -> bool {
        self.history.contains(&state)
    }

    /// Total the current authorization was started for
    pub fn total(&self) -> Amount {
        self.total
    }

    /// Feed an event and return the resulting state
    pub fn apply(&mut self, event: GateEvent) -> Result<AuthGateState, Error> {
        use AuthGateState::*;

        let next = match (self.state, event) {
            (NotStarted, GateEvent::Continue { total }) => {
                self.total = total;
                PinPending
            }
            (PinPending, GateEvent::PinAccepted) => {
                self.enter(PinVerified);
                if self.policy.requires_step_up(self.total) {
                    BiometricPending
                } else {
                    Authorized
                }
            }
            (PinPending, GateEvent::PinRejected) => NotStarted,
            (BiometricPending, GateEvent::BiometricAccepted) => Authorized,
            (BiometricPending, GateEvent::BiometricRejected) => NotStarted,
            (Authorized, GateEvent::Completed) if self.is_claimed() => NotStarted,
            (
                PinPending | PinVerified | BiometricPending | Authorized,
                GateEvent::RemoteFailure,
            ) => Failed,
            (_, GateEvent::Reset) => NotStarted,
            (state, event) => {
                return Err(Error::InvalidTransition {
                    state: state.to_string(),
                    event: event.to_string(),
                })
            }
        };

        self.enter(next);
        Ok(next)
    }

    /// Take the right to issue the processing call.
    ///
    /// Returns the idempotency key the first time it is called in the
    /// `Authorized` state and `None` on every later call, so a re-entered
    /// authorized step cannot submit twice.
    pub fn claim_submission(&mut self) -> Option<Uuid> {
        if self.state != AuthGateState::Authorized {
            return None;
        }
        match self.authorization.as_mut() {
            Some(auth) if !auth.claimed => {
                auth.claimed = true;
                Some(auth.idempotency_key)
            }
            _ => None,
        }
    }

    fn is_claimed(&self) -> bool {
        self.authorization.map(|a| a.claimed).unwrap_or(false)
    }

    fn enter(&mut self, next: AuthGateState) {
        debug!(from = %self.state, to = %next, "auth gate transition");
        match next {
            AuthGateState::Authorized if self.state != AuthGateState::Authorized => {
                self.authorization = Some(Authorization {
                    idempotency_key: Uuid::new_v4(),
                    claimed: false,
                });
            }
            AuthGateState::NotStarted => {
                self.authorization = None;
                self.total = Amount::ZERO;
            }
            _ => {}
        }
        self.state = next;
        self.history.push(next);
    }
}
