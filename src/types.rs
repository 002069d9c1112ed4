//! Request and response bodies exchanged with the AlaskaPay backend
//!
//! Amounts travel as major-unit JSON numbers; see [`crate::money::major_units`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{self, Amount, Currency};

// ============================================================================
// PIN
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct VerifyPinRequest<'a> {
    pub user_id: &'a str,
    pub pin: &'a crate::auth::SecurePin,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPinResponse {
    pub valid: bool,
}

// ============================================================================
// BILL PAYMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillPaymentRequest {
    pub saved_biller_id: String,
    pub payee_id: String,
    pub account_number: String,
    #[serde(with = "money::major_units")]
    pub amount: Amount,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub idempotency_key: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Backend fraud screening verdict attached to a bill payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudDecision {
    Approve,
    Review,
    Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudCheck {
    pub decision: FraudDecision,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillPaymentResponse {
    pub payment: PaymentRecord,
    pub fraud_check: FraudCheck,
}

// ============================================================================
// WALLET TRANSFER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransferRequest {
    pub recipient_phone: String,
    #[serde(with = "money::major_units")]
    pub amount: Amount,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub idempotency_key: Uuid,
}

/// Generic acknowledgement returned by simple mutations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// WITHDRAWAL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub wallet_id: String,
    pub bank_account_id: String,
    #[serde(with = "money::major_units")]
    pub amount: Amount,
    #[serde(with = "money::major_units")]
    pub fee: Amount,
    #[serde(with = "money::major_units")]
    pub net_amount: Amount,
    pub currency: Currency,
    pub kyc_tier: u8,
    pub idempotency_key: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletRow {
    pub id: String,
    #[serde(with = "money::major_units")]
    pub balance: Amount,
}

// ============================================================================
// BANK TRANSFER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiateTransferRequest {
    pub user_id: String,
    pub bank_account_id: String,
    #[serde(with = "money::major_units")]
    pub amount: Amount,
    pub currency: Currency,
    pub idempotency_key: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiateTransferResponse {
    pub success: bool,
    #[serde(default)]
    pub reference: Option<String>,
    /// The rail wants an OTP before processing
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOtpRequest<'a> {
    pub reference: &'a str,
    pub otp: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyTransferRequest<'a> {
    pub reference: &'a str,
}

/// Settlement status reported by the bank rail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyTransferResponse {
    pub success: bool,
    #[serde(default)]
    pub status: Option<TransferStatus>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Interpreted result of one verification call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Completed,
    Pending,
    Failed(String),
}

impl VerifyTransferResponse {
    pub fn outcome(&self) -> VerificationOutcome {
        match (self.success, self.status) {
            (_, Some(TransferStatus::Pending)) => VerificationOutcome::Pending,
            (true, None | Some(TransferStatus::Completed)) => VerificationOutcome::Completed,
            _ => VerificationOutcome::Failed(
                self.error
                    .clone()
                    .unwrap_or_else(|| "Transfer verification failed".to_string()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_outcome() {
        let pending: VerifyTransferResponse =
            serde_json::from_str(r#"{"success":false,"status":"pending"}"#).unwrap();
        assert_eq!(pending.outcome(), VerificationOutcome::Pending);

        let done: VerifyTransferResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(done.outcome(), VerificationOutcome::Completed);

        let failed: VerifyTransferResponse =
            serde_json::from_str(r#"{"success":false,"error":"Account closed"}"#).unwrap();
        assert_eq!(
            failed.outcome(),
            VerificationOutcome::Failed("Account closed".to_string())
        );
    }

    #[test]
    fn test_bill_payment_body() {
        let req = BillPaymentRequest {
            saved_biller_id: "sb-1".into(),
            payee_id: "payee-1".into(),
            account_number: "0123456789".into(),
            amount: Amount::from_major(1000),
            currency: Currency::Ngn,
            scheduled_date: None,
            notes: None,
            idempotency_key: Uuid::nil(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["amount"], 1000);
        assert_eq!(json["currency"], "NGN");
        assert!(json.get("notes").is_none());
    }
}
