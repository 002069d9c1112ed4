//! Remote collaborator interface
//!
//! Everything authoritative (balances, PIN hashes, fraud screening,
//! settlement) lives on the backend. Flows only talk to it through this
//! trait so they can be driven by the HTTP client in production and by
//! scripted fakes in tests.

use async_trait::async_trait;

use crate::auth::SecurePin;
use crate::error::Error;
use crate::limits::KycLimitContext;
use crate::money::Amount;
use crate::types::{
    Ack, BillPaymentRequest, BillPaymentResponse, InitiateTransferRequest,
    InitiateTransferResponse, OtpResponse, VerifyTransferResponse, WalletTransferRequest,
    WithdrawalRecord, WithdrawalRequest,
};

#[async_trait]
pub trait PaymentBackend: Send + Sync {
    /// Check a PIN server-side; `Ok(false)` means the PIN did not match
    async fn verify_pin(&self, user_id: &str, pin: &SecurePin) -> Result<bool, Error>;

    async fn fetch_balance(&self, wallet_id: &str) -> Result<Amount, Error>;

    async fn fetch_kyc_limits(&self, user_id: &str) -> Result<KycLimitContext, Error>;

    async fn process_bill_payment(
        &self,
        request: &BillPaymentRequest,
    ) -> Result<BillPaymentResponse, Error>;

    async fn wallet_transfer(&self, request: &WalletTransferRequest) -> Result<Ack, Error>;

    async fn create_withdrawal_request(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalRecord, Error>;

    async fn initiate_transfer(
        &self,
        request: &InitiateTransferRequest,
    ) -> Result<InitiateTransferResponse, Error>;

    async fn submit_otp(&self, reference: &str, otp: &str) -> Result<OtpResponse, Error>;

    async fn verify_transfer(&self, reference: &str) -> Result<VerifyTransferResponse, Error>;
}
