//! Authentication collaborators for guarded transactions
//!
//! PIN checks always happen on the backend: the client sends the PIN and
//! receives a yes/no answer, it never sees a stored hash. Biometric
//! confirmation is a local device capability exposed through
//! [`BiometricAuthenticator`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::validation::validate_pin_format;

/// Identity and security preferences of the user running a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: String,
    /// Step-up confirmation for large transactions
    pub transaction_auth_enabled: bool,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>, transaction_auth_enabled: bool) -> Self {
        Self {
            user_id: user_id.into(),
            transaction_auth_enabled,
        }
    }
}

/// A transaction PIN. Never printed, never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct SecurePin(String);

impl SecurePin {
    /// Create a PIN after checking it is exactly four digits
    pub fn new(pin: impl Into<String>) -> Result<Self, Error> {
        let pin = pin.into();
        validate_pin_format(&pin)?;
        Ok(Self(pin))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecurePin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecurePin(****)")
    }
}

impl Serialize for SecurePin {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Why a PIN is being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinPurpose {
    /// First gate of every guarded transaction
    Transaction,
    /// Fallback when biometric step-up is unavailable or declined
    StepUpFallback,
}

/// Result of asking the device for biometric confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiometricOutcome {
    Confirmed,
    /// The user declined or the sensor did not match
    Rejected,
    /// No enrolled biometrics on this device
    Unavailable,
}

/// Device biometric capability
#[async_trait]
pub trait BiometricAuthenticator: Send + Sync {
    /// Whether biometric confirmation can be attempted at all
    fn is_available(&self) -> bool;

    /// Ask the user to confirm with biometrics
    async fn authenticate(&self, reason: &str) -> Result<BiometricOutcome, Error>;
}

/// Authenticator for devices without biometric hardware; step-up always falls back to PIN
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableBiometric;

#[async_trait]
impl BiometricAuthenticator for UnavailableBiometric {
    fn is_available(&self) -> bool {
        false
    }

    async fn authenticate(&self, _reason: &str) -> Result<BiometricOutcome, Error> {
        Ok(BiometricOutcome::Unavailable)
    }
}

/// User-facing input prompts used by a flow.
///
/// Returning `None` means the user dismissed the prompt.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn request_pin(&self, purpose: PinPurpose) -> Option<String>;

    /// `error` carries the inline message from a previous failed attempt
    async fn request_otp(&self, message: &str, error: Option<&str>) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_pin_redacted() {
        let pin = SecurePin::new("1234").unwrap();
        assert_eq!(format!("{:?}", pin), "SecurePin(****)");
        assert_eq!(pin.as_str(), "1234");
        assert!(SecurePin::new("12").is_err());
    }

    #[tokio::test]
    async fn test_unavailable_biometric() {
        let bio = UnavailableBiometric;
        assert!(!bio.is_available());
        assert_eq!(
            bio.authenticate("Confirm").await.unwrap(),
            BiometricOutcome::Unavailable
        );
    }
}
