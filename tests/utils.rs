use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alaskapay_sdk::{
    backend::PaymentBackend,
    types::{
        Ack, BillPaymentRequest, BillPaymentResponse, FraudCheck, FraudDecision,
        InitiateTransferRequest, InitiateTransferResponse, OtpResponse, PaymentRecord,
        TransferStatus, VerifyTransferResponse, WalletTransferRequest, WithdrawalRecord,
        WithdrawalRequest,
    },
    Amount, AuthContext, BiometricAuthenticator, BiometricOutcome, Error, FlowEvent,
    KycLimitContext, Orchestrator, PinPurpose, Prompter, SdkConfig, SecurePin, TransactionKind,
};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use tokio::sync::mpsc;

#[cfg(test)]
#[allow(dead_code)]
pub mod test_utils {
    use super::*;

    /// PIN accepted by [`MockBackend::new`]
    pub const PIN: &str = "1234";

    /// Install a test subscriber so `RUST_LOG=alaskapay_sdk=debug` shows flow logs
    pub fn init_test_env() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    /// Configuration used by flow tests: NGN, step-up above 500, default fees
    pub fn test_config() -> SdkConfig {
        SdkConfig::default()
    }

    pub fn auth(transaction_auth_enabled: bool) -> AuthContext {
        AuthContext::new("user-1", transaction_auth_enabled)
    }

    pub fn bill_payment() -> TransactionKind {
        TransactionKind::BillPayment {
            saved_biller_id: "sb-ikeja".to_string(),
            payee_id: "ikeja-electric".to_string(),
            account_number: "0123456789".to_string(),
            scheduled_date: None,
            notes: None,
        }
    }

    pub fn withdrawal() -> TransactionKind {
        TransactionKind::Withdrawal {
            wallet_id: "wallet-1".to_string(),
            bank_account_id: "bank-1".to_string(),
        }
    }

    pub fn bank_transfer() -> TransactionKind {
        TransactionKind::BankTransfer {
            bank_account_id: "bank-1".to_string(),
        }
    }

    pub fn pending() -> VerifyTransferResponse {
        VerifyTransferResponse {
            success: false,
            status: Some(TransferStatus::Pending),
            error: None,
        }
    }

    pub fn settled() -> VerifyTransferResponse {
        VerifyTransferResponse {
            success: true,
            status: Some(TransferStatus::Completed),
            error: None,
        }
    }

    pub fn otp_rejected(message: &str) -> OtpResponse {
        OtpResponse {
            success: false,
            error: Some(message.to_string()),
        }
    }

    /// Scripted backend. PINs are checked against an argon2 hash the way the
    /// real server does; transfer responses are popped from queues.
    pub struct MockBackend {
        pin_hash: String,
        balance: Amount,
        limits: KycLimitContext,
        fraud_decision: FraudDecision,
        processing_error: Option<(u16, String)>,
        processing_delay: Duration,
        requires_otp: bool,
        otp_results: Mutex<VecDeque<OtpResponse>>,
        verify_results: Mutex<VecDeque<VerifyTransferResponse>>,
        calls: Mutex<Vec<&'static str>>,
        pub bill_payments: Mutex<Vec<BillPaymentRequest>>,
        pub wallet_transfers: Mutex<Vec<WalletTransferRequest>>,
        pub withdrawals: Mutex<Vec<WithdrawalRequest>>,
        pub initiated: Mutex<Vec<InitiateTransferRequest>>,
        pub submitted_otps: Mutex<Vec<String>>,
        pub verify_times: Mutex<Vec<tokio::time::Instant>>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::with_pin(PIN)
        }

        pub fn with_pin(pin: &str) -> Self {
            let salt = SaltString::encode_b64(b"alaskapay-fixture").unwrap();
            let pin_hash = Argon2::default()
                .hash_password(pin.as_bytes(), &salt)
                .unwrap()
                .to_string();
            Self {
                pin_hash,
                balance: Amount::from_major(100_000),
                limits: KycLimitContext::new(
                    2,
                    Amount::from_major(50_000),
                    Amount::ZERO,
                ),
                fraud_decision: FraudDecision::Approve,
                processing_error: None,
                processing_delay: Duration::ZERO,
                requires_otp: false,
                otp_results: Mutex::new(VecDeque::new()),
                verify_results: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
                bill_payments: Mutex::new(Vec::new()),
                wallet_transfers: Mutex::new(Vec::new()),
                withdrawals: Mutex::new(Vec::new()),
                initiated: Mutex::new(Vec::new()),
                submitted_otps: Mutex::new(Vec::new()),
                verify_times: Mutex::new(Vec::new()),
            }
        }

        pub fn balance(mut self, balance: Amount) -> Self {
            self.balance = balance;
            self
        }

        pub fn limits(mut self, limits: KycLimitContext) -> Self {
            self.limits = limits;
            self
        }

        pub fn fraud_decision(mut self, decision: FraudDecision) -> Self {
            self.fraud_decision = decision;
            self
        }

        /// Make every processing call fail with this status and message
        pub fn processing_error(mut self, status: u16, message: &str) -> Self {
            self.processing_error = Some((status, message.to_string()));
            self
        }

        pub fn processing_delay(mut self, delay: Duration) -> Self {
            self.processing_delay = delay;
            self
        }

        pub fn requiring_otp(mut self) -> Self {
            self.requires_otp = true;
            self
        }

        /// Responses to OTP submissions, in order; accepted once exhausted
        pub fn otp_results(self, results: Vec<OtpResponse>) -> Self {
            *self.otp_results.lock().unwrap() = results.into();
            self
        }

        /// Responses to verification polls, in order; settled once exhausted
        pub fn verify_results(self, results: Vec<VerifyTransferResponse>) -> Self {
            *self.verify_results.lock().unwrap() = results.into();
            self
        }

        pub fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self, name: &str) -> usize {
            self.calls().iter().filter(|c| **c == name).count()
        }

        /// Processing calls of any kind
        pub fn submissions(&self) -> usize {
            [
                "process_bill_payment",
                "wallet_transfer",
                "create_withdrawal_request",
                "initiate_transfer",
            ]
            .iter()
            .map(|name| self.call_count(name))
            .sum()
        }

        fn record(&self, name: &'static str) {
            self.calls.lock().unwrap().push(name);
        }

        async fn process(&self) -> Result<(), Error> {
            if !self.processing_delay.is_zero() {
                tokio::time::sleep(self.processing_delay).await;
            }
            match &self.processing_error {
                Some((status, message)) => Err(Error::Backend {
                    status: *status,
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl PaymentBackend for MockBackend {
        async fn verify_pin(&self, _user_id: &str, pin: &SecurePin) -> Result<bool, Error> {
            self.record("verify_pin");
            let hash = PasswordHash::new(&self.pin_hash)
                .map_err(|e| Error::Other(e.to_string()))?;
            Ok(Argon2::default()
                .verify_password(pin.as_str().as_bytes(), &hash)
                .is_ok())
        }

        async fn fetch_balance(&self, _wallet_id: &str) -> Result<Amount, Error> {
            self.record("fetch_balance");
            Ok(self.balance)
        }

        async fn fetch_kyc_limits(&self, _user_id: &str) -> Result<KycLimitContext, Error> {
            self.record("fetch_kyc_limits");
            Ok(self.limits)
        }

        async fn process_bill_payment(
            &self,
            request: &BillPaymentRequest,
        ) -> Result<BillPaymentResponse, Error> {
            self.record("process_bill_payment");
            self.bill_payments.lock().unwrap().push(request.clone());
            self.process().await?;
            Ok(BillPaymentResponse {
                payment: PaymentRecord {
                    id: "pay-1".to_string(),
                    status: "completed".to_string(),
                    reference: Some("BP-0001".to_string()),
                },
                fraud_check: FraudCheck {
                    decision: self.fraud_decision,
                    risk_score: Some(0.1),
                    reasons: Vec::new(),
                },
            })
        }

        async fn wallet_transfer(&self, request: &WalletTransferRequest) -> Result<Ack, Error> {
            self.record("wallet_transfer");
            self.wallet_transfers.lock().unwrap().push(request.clone());
            self.process().await?;
            Ok(Ack {
                success: true,
                reference: Some("WT-0001".to_string()),
                message: None,
            })
        }

        async fn create_withdrawal_request(
            &self,
            request: &WithdrawalRequest,
        ) -> Result<WithdrawalRecord, Error> {
            self.record("create_withdrawal_request");
            self.withdrawals.lock().unwrap().push(request.clone());
            self.process().await?;
            Ok(WithdrawalRecord {
                id: "wd-1".to_string(),
                status: "pending".to_string(),
            })
        }

        async fn initiate_transfer(
            &self,
            request: &InitiateTransferRequest,
        ) -> Result<InitiateTransferResponse, Error> {
            self.record("initiate_transfer");
            self.initiated.lock().unwrap().push(request.clone());
            self.process().await?;
            Ok(InitiateTransferResponse {
                success: true,
                reference: Some("TRF-0001".to_string()),
                requires_auth: self.requires_otp,
                message: self
                    .requires_otp
                    .then(|| "Enter the OTP sent to 080****1234".to_string()),
            })
        }

        async fn submit_otp(&self, _reference: &str, otp: &str) -> Result<OtpResponse, Error> {
            self.record("submit_otp");
            self.submitted_otps.lock().unwrap().push(otp.to_string());
            Ok(self
                .otp_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(OtpResponse {
                    success: true,
                    error: None,
                }))
        }

        async fn verify_transfer(&self, _reference: &str) -> Result<VerifyTransferResponse, Error> {
            self.record("verify_transfer");
            self.verify_times
                .lock()
                .unwrap()
                .push(tokio::time::Instant::now());
            Ok(self
                .verify_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(settled))
        }
    }

    /// Device biometric stand-in
    pub struct MockBiometric {
        available: bool,
        outcome: BiometricOutcome,
        calls: AtomicUsize,
    }

    impl MockBiometric {
        pub fn new(available: bool, outcome: BiometricOutcome) -> Self {
            Self {
                available,
                outcome,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn confirming() -> Self {
            Self::new(true, BiometricOutcome::Confirmed)
        }

        pub fn unavailable() -> Self {
            Self::new(false, BiometricOutcome::Unavailable)
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BiometricAuthenticator for MockBiometric {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn authenticate(&self, _reason: &str) -> Result<BiometricOutcome, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome)
        }
    }

    /// Answers prompts from queues; an empty queue dismisses the prompt
    #[derive(Default)]
    pub struct ScriptedPrompter {
        pins: Mutex<VecDeque<String>>,
        otps: Mutex<VecDeque<String>>,
        pub pin_requests: Mutex<Vec<PinPurpose>>,
        pub otp_errors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedPrompter {
        pub fn new(pins: &[&str], otps: &[&str]) -> Self {
            Self {
                pins: Mutex::new(pins.iter().map(|p| p.to_string()).collect()),
                otps: Mutex::new(otps.iter().map(|o| o.to_string()).collect()),
                ..Self::default()
            }
        }

        pub fn pin_requests(&self) -> Vec<PinPurpose> {
            self.pin_requests.lock().unwrap().clone()
        }

        pub fn otp_errors(&self) -> Vec<Option<String>> {
            self.otp_errors.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Prompter for ScriptedPrompter {
        async fn request_pin(&self, purpose: PinPurpose) -> Option<String> {
            self.pin_requests.lock().unwrap().push(purpose);
            self.pins.lock().unwrap().pop_front()
        }

        async fn request_otp(&self, _message: &str, error: Option<&str>) -> Option<String> {
            self.otp_errors
                .lock()
                .unwrap()
                .push(error.map(str::to_string));
            self.otps.lock().unwrap().pop_front()
        }
    }

    pub type TestOrchestrator = Orchestrator<MockBackend, MockBiometric>;

    /// Orchestrator wired to the mocks, plus the receiving end of its events
    pub fn orchestrator(
        backend: Arc<MockBackend>,
        biometric: Arc<MockBiometric>,
    ) -> (TestOrchestrator, mpsc::UnboundedReceiver<FlowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = Orchestrator::new(backend, biometric, &test_config()).with_events(tx);
        (orchestrator, rx)
    }

    /// Everything sent so far
    pub fn drain(rx: &mut mpsc::UnboundedReceiver<FlowEvent>) -> Vec<FlowEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }
}
