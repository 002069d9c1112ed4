//! Guarded transaction orchestration
//!
//! Sequences one monetary action: amount validation, PIN gate, optional
//! step-up confirmation, then exactly one processing call. Progress is
//! reported as [`FlowEvent`]s over an unbounded channel so any front end can
//! render it; once the caller cancels, no further events are sent.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::auth::{
    AuthContext, BiometricAuthenticator, BiometricOutcome, PinPurpose, Prompter, SecurePin,
};
use crate::backend::PaymentBackend;
use crate::bank_transfer::{BankTransferFlow, BankTransferState, TransferConfirmation};
use crate::config::{FeeSchedule, FlowConfig, PollingConfig, SdkConfig};
use crate::error::Error;
use crate::fee::{self, FeeQuote, FeeRule};
use crate::gate::{AuthGate, AuthGateState, GateEvent, StepUpPolicy};
use crate::limits::{check_withdrawal_limit, KycLimitContext};
use crate::money::{self, Amount, Currency};
use crate::remote::guarded;
use crate::types::{
    BillPaymentRequest, FraudDecision, InitiateTransferRequest, WalletTransferRequest,
    WithdrawalRequest,
};
use crate::validation::{check_balance, validate_amount, validate_phone};

/// What is being paid and to whom
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    BillPayment {
        saved_biller_id: String,
        payee_id: String,
        account_number: String,
        scheduled_date: Option<NaiveDate>,
        notes: Option<String>,
    },
    Withdrawal {
        wallet_id: String,
        bank_account_id: String,
    },
    WalletTransfer {
        recipient_phone: String,
        description: Option<String>,
    },
    BankTransfer {
        bank_account_id: String,
    },
}

impl TransactionKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::BillPayment { .. } => "bill_payment",
            TransactionKind::Withdrawal { .. } => "withdrawal",
            TransactionKind::WalletTransfer { .. } => "wallet_transfer",
            TransactionKind::BankTransfer { .. } => "bank_transfer",
        }
    }

    /// Biller account, recipient or bank account the money goes to
    pub fn target_descriptor(&self) -> String {
        match self {
            TransactionKind::BillPayment {
                payee_id,
                account_number,
                ..
            } => format!("{} ({})", payee_id, account_number),
            TransactionKind::Withdrawal {
                bank_account_id, ..
            } => bank_account_id.clone(),
            TransactionKind::WalletTransfer {
                recipient_phone, ..
            } => recipient_phone.clone(),
            TransactionKind::BankTransfer { bank_account_id } => bank_account_id.clone(),
        }
    }

    /// Fee rule that applies to this kind
    pub fn fee_rule(&self, fees: &FeeSchedule) -> FeeRule {
        match self {
            TransactionKind::BillPayment { .. } => fees.bill_payment,
            TransactionKind::Withdrawal { .. } => fees.withdrawal,
            TransactionKind::WalletTransfer { .. } => fees.wallet_transfer,
            TransactionKind::BankTransfer { .. } => fees.bank_transfer,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        let required = |value: &str, name: &str| {
            if value.trim().is_empty() {
                Err(Error::Validation(format!("{} is required", name)))
            } else {
                Ok(())
            }
        };
        match self {
            TransactionKind::BillPayment {
                saved_biller_id,
                payee_id,
                account_number,
                ..
            } => {
                required(saved_biller_id, "Biller")?;
                required(payee_id, "Payee")?;
                required(account_number, "Account number")
            }
            TransactionKind::Withdrawal {
                wallet_id,
                bank_account_id,
            } => {
                required(wallet_id, "Wallet")?;
                required(bank_account_id, "Bank account")
            }
            TransactionKind::WalletTransfer {
                recipient_phone, ..
            } => validate_phone(recipient_phone),
            TransactionKind::BankTransfer { bank_account_id } => {
                required(bank_account_id, "Bank account")
            }
        }
    }
}

/// A transaction between amount entry and submission.
///
/// Only the principal and fee rule are stored; fee and total are derived on
/// every read so they cannot drift from their inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    kind: TransactionKind,
    principal: Amount,
    currency: Currency,
    fee_rule: FeeRule,
}

impl PendingTransaction {
    pub fn new(
        kind: TransactionKind,
        principal: Amount,
        currency: Currency,
        fee_rule: FeeRule,
    ) -> Self {
        Self {
            kind,
            principal,
            currency,
            fee_rule,
        }
    }

    /// Build from user-entered amount text using the configured fee schedule
    pub fn from_input(
        kind: TransactionKind,
        amount: &str,
        flow: &FlowConfig,
    ) -> Result<Self, Error> {
        let principal = validate_amount(amount)?;
        let fee_rule = kind.fee_rule(&flow.fees);
        Ok(Self::new(kind, principal, flow.currency, fee_rule))
    }

    pub fn kind(&self) -> &TransactionKind {
        &self.kind
    }

    pub fn principal(&self) -> Amount {
        self.principal
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn fee_rule(&self) -> FeeRule {
        self.fee_rule
    }

    pub fn set_principal(&mut self, principal: Amount) {
        self.principal = principal;
    }

    pub fn quote(&self) -> Result<FeeQuote, Error> {
        fee::calculate(self.principal, &self.fee_rule)
    }
}

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Completed transaction summary. Amounts serialize in major units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub kind: &'static str,
    pub reference: Option<String>,
    pub currency: Currency,
    pub quote: FeeQuote,
    /// Taken from the wallet: the principal for withdrawals, whose fee comes
    /// out of the payout, otherwise the total
    #[serde(with = "money::major_units")]
    pub debited: Amount,
    pub idempotency_key: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraud_decision: Option<FraudDecision>,
}

/// Progress reported while a flow runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FlowEvent {
    Quote(FeeQuote),
    GateChanged(AuthGateState),
    BankTransferChanged(BankTransferState),
    Notice { level: NoticeLevel, message: String },
    /// Sent exactly once per successful run
    Completed(Receipt),
}

/// Runs guarded transactions against a backend
pub struct Orchestrator<B: PaymentBackend + ?Sized, Bio: BiometricAuthenticator + ?Sized> {
    backend: Arc<B>,
    biometric: Arc<Bio>,
    flow: FlowConfig,
    polling: PollingConfig,
    timeout: Duration,
    events: Option<mpsc::UnboundedSender<FlowEvent>>,
}

impl<B, Bio> Orchestrator<B, Bio>
where
    B: PaymentBackend + ?Sized,
    Bio: BiometricAuthenticator + ?Sized,
{
    pub fn new(backend: Arc<B>, biometric: Arc<Bio>, config: &SdkConfig) -> Self {
        Self {
            backend,
            biometric,
            flow: config.flow.clone(),
            polling: config.polling,
            timeout: config.backend.request_timeout(),
            events: None,
        }
    }

    /// Send progress events to `sender`
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<FlowEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn flow_config(&self) -> &FlowConfig {
        &self.flow
    }

    /// Start a pending transaction from amount text
    pub fn pending(&self, kind: TransactionKind, amount: &str) -> Result<PendingTransaction, Error> {
        PendingTransaction::from_input(kind, amount, &self.flow)
    }

    /// Run one transaction to completion.
    ///
    /// Any failure is reported as an error notice and leaves nothing to
    /// resume: the caller starts again from amount entry. Cancellation is
    /// silent.
    pub async fn run<P: Prompter + ?Sized>(
        &self,
        auth: &AuthContext,
        tx: &PendingTransaction,
        prompter: &P,
        cancel: &CancellationToken,
    ) -> Result<Receipt, Error> {
        let span = info_span!("transaction", kind = tx.kind().label(), user = %auth.user_id);
        self.settle(auth, tx, prompter, cancel).instrument(span).await
    }

    async fn settle<P: Prompter + ?Sized>(
        &self,
        auth: &AuthContext,
        tx: &PendingTransaction,
        prompter: &P,
        cancel: &CancellationToken,
    ) -> Result<Receipt, Error> {
        let mut gate = AuthGate::new(StepUpPolicy::new(
            auth.transaction_auth_enabled,
            self.flow.step_up_threshold,
        ));

        match self.drive(&mut gate, auth, tx, prompter, cancel).await {
            Ok(receipt) => {
                self.step(&mut gate, GateEvent::Completed, cancel)?;
                info!(reference = ?receipt.reference, total = %receipt.quote.total, "transaction completed");
                self.notice(cancel, NoticeLevel::Success, success_message(tx, &receipt));
                self.emit(cancel, FlowEvent::Completed(receipt.clone()));
                Ok(receipt)
            }
            Err(Error::Cancelled) => {
                info!(state = %gate.state(), "transaction cancelled");
                let _ = gate.apply(GateEvent::Reset);
                Err(Error::Cancelled)
            }
            Err(e) => {
                warn!(state = %gate.state(), error = %e, retryable = e.is_retryable(), "transaction failed");
                if gate.state() != AuthGateState::NotStarted {
                    let _ = self.step(&mut gate, GateEvent::RemoteFailure, cancel);
                }
                self.notice(cancel, NoticeLevel::Error, e.user_message());
                if gate.state() != AuthGateState::NotStarted {
                    let _ = self.step(&mut gate, GateEvent::Reset, cancel);
                }
                Err(e)
            }
        }
    }

    async fn drive<P: Prompter + ?Sized>(
        &self,
        gate: &mut AuthGate,
        auth: &AuthContext,
        tx: &PendingTransaction,
        prompter: &P,
        cancel: &CancellationToken,
    ) -> Result<Receipt, Error> {
        let quote = tx.quote()?;
        self.emit(cancel, FlowEvent::Quote(quote));

        if !quote.principal.is_positive() {
            return Err(Error::Validation("Please enter a valid amount".to_string()));
        }
        tx.kind().validate()?;

        let limits = match tx.kind() {
            TransactionKind::Withdrawal { wallet_id, .. } => {
                let balance = self
                    .call(cancel, "fetch_balance", self.backend.fetch_balance(wallet_id))
                    .await?;
                check_balance(balance, quote.principal)?;

                let limits = self
                    .call(
                        cancel,
                        "fetch_kyc_limits",
                        self.backend.fetch_kyc_limits(&auth.user_id),
                    )
                    .await?;
                check_withdrawal_limit(&limits, quote.principal).into_result()?;
                Some(limits)
            }
            _ => None,
        };

        self.step(gate, GateEvent::Continue { total: quote.total }, cancel)?;

        let pin = self
            .collect_pin(prompter, PinPurpose::Transaction, cancel)
            .await?;
        let accepted = self
            .call(
                cancel,
                "verify_pin",
                self.backend.verify_pin(&auth.user_id, &pin),
            )
            .await?;
        if !accepted {
            self.step(gate, GateEvent::PinRejected, cancel)?;
            return Err(Error::PinRejected);
        }

        if self.step(gate, GateEvent::PinAccepted, cancel)? == AuthGateState::BiometricPending {
            if self.step_up(auth, tx, &quote, prompter, cancel).await? {
                self.step(gate, GateEvent::BiometricAccepted, cancel)?;
            } else {
                self.step(gate, GateEvent::BiometricRejected, cancel)?;
                return Err(Error::BiometricRejected);
            }
        }

        let idempotency_key = gate
            .claim_submission()
            .ok_or_else(|| Error::InvalidTransition {
                state: gate.state().to_string(),
                event: "submit".to_string(),
            })?;

        self.submit(auth, tx, quote, limits, idempotency_key, prompter, cancel)
            .await
    }

    /// Biometric confirmation with PIN fallback
    async fn step_up<P: Prompter + ?Sized>(
        &self,
        auth: &AuthContext,
        tx: &PendingTransaction,
        quote: &FeeQuote,
        prompter: &P,
        cancel: &CancellationToken,
    ) -> Result<bool, Error> {
        if self.biometric.is_available() {
            let reason = format!(
                "Confirm {} of {}",
                tx.kind().label().replace('_', " "),
                tx.currency().format(quote.total)
            );
            let outcome = self
                .call(cancel, "biometric", self.biometric.authenticate(&reason))
                .await?;
            if outcome == BiometricOutcome::Confirmed {
                return Ok(true);
            }
            info!(?outcome, "biometric step-up not confirmed, falling back to PIN");
        }

        let pin = self
            .collect_pin(prompter, PinPurpose::StepUpFallback, cancel)
            .await?;
        self.call(
            cancel,
            "verify_pin",
            self.backend.verify_pin(&auth.user_id, &pin),
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit<P: Prompter + ?Sized>(
        &self,
        auth: &AuthContext,
        tx: &PendingTransaction,
        quote: FeeQuote,
        limits: Option<KycLimitContext>,
        idempotency_key: Uuid,
        prompter: &P,
        cancel: &CancellationToken,
    ) -> Result<Receipt, Error> {
        let debited = match tx.kind() {
            TransactionKind::Withdrawal { .. } => quote.principal,
            _ => quote.total,
        };
        let mut receipt = Receipt {
            kind: tx.kind().label(),
            reference: None,
            currency: tx.currency(),
            quote,
            debited,
            idempotency_key,
            fraud_decision: None,
        };

        match tx.kind() {
            TransactionKind::BillPayment {
                saved_biller_id,
                payee_id,
                account_number,
                scheduled_date,
                notes,
            } => {
                let request = BillPaymentRequest {
                    saved_biller_id: saved_biller_id.clone(),
                    payee_id: payee_id.clone(),
                    account_number: account_number.clone(),
                    amount: quote.principal,
                    currency: tx.currency(),
                    scheduled_date: *scheduled_date,
                    notes: notes.clone(),
                    idempotency_key,
                };
                let response = self
                    .submit_call(
                        cancel,
                        "process_bill_payment",
                        idempotency_key,
                        self.backend.process_bill_payment(&request),
                    )
                    .await?;

                match response.fraud_check.decision {
                    FraudDecision::Block => {
                        return Err(Error::Backend {
                            status: 403,
                            message: "Payment was blocked by fraud screening".to_string(),
                        })
                    }
                    FraudDecision::Review => {
                        warn!(payment = %response.payment.id, reasons = ?response.fraud_check.reasons, "payment flagged for review");
                        self.notice(
                            cancel,
                            NoticeLevel::Info,
                            "Payment submitted and is under review".to_string(),
                        );
                    }
                    FraudDecision::Approve => {}
                }
                receipt.fraud_decision = Some(response.fraud_check.decision);
                receipt.reference = response
                    .payment
                    .reference
                    .or(Some(response.payment.id));
            }
            TransactionKind::WalletTransfer {
                recipient_phone,
                description,
            } => {
                let request = WalletTransferRequest {
                    recipient_phone: recipient_phone.clone(),
                    amount: quote.principal,
                    currency: tx.currency(),
                    description: description.clone(),
                    idempotency_key,
                };
                let ack = self
                    .submit_call(
                        cancel,
                        "wallet_transfer",
                        idempotency_key,
                        self.backend.wallet_transfer(&request),
                    )
                    .await?;
                if !ack.success {
                    return Err(Error::Backend {
                        status: 400,
                        message: ack.message.unwrap_or_else(|| "Transfer failed".to_string()),
                    });
                }
                receipt.reference = ack.reference;
            }
            TransactionKind::Withdrawal {
                wallet_id,
                bank_account_id,
            } => {
                let request = WithdrawalRequest {
                    wallet_id: wallet_id.clone(),
                    bank_account_id: bank_account_id.clone(),
                    amount: quote.principal,
                    fee: quote.fee,
                    net_amount: quote.net,
                    currency: tx.currency(),
                    kyc_tier: limits.map(|l| l.tier).unwrap_or_default(),
                    idempotency_key,
                };
                let record = self
                    .submit_call(
                        cancel,
                        "create_withdrawal_request",
                        idempotency_key,
                        self.backend.create_withdrawal_request(&request),
                    )
                    .await?;
                receipt.reference = Some(record.id);
            }
            TransactionKind::BankTransfer { bank_account_id } => {
                let request = InitiateTransferRequest {
                    user_id: auth.user_id.clone(),
                    bank_account_id: bank_account_id.clone(),
                    amount: quote.principal,
                    currency: tx.currency(),
                    idempotency_key,
                };
                let reference = self.bank_transfer(&request, prompter, cancel).await?;
                receipt.reference = Some(reference);
            }
        }

        Ok(receipt)
    }

    async fn bank_transfer<P: Prompter + ?Sized>(
        &self,
        request: &InitiateTransferRequest,
        prompter: &P,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let mut flow = BankTransferFlow::new(
            &*self.backend,
            self.polling,
            self.timeout,
            cancel.clone(),
        );
        self.emit(cancel, FlowEvent::BankTransferChanged(flow.state()));

        let result = flow.initiate(request).await;
        self.emit(cancel, FlowEvent::BankTransferChanged(flow.state()));
        result?;

        while flow.state() == BankTransferState::OtpRequired {
            let message = flow
                .message()
                .unwrap_or("Enter the OTP sent to your phone")
                .to_string();
            let input = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                otp = prompter.request_otp(&message, flow.otp_error()) => otp,
            };
            let otp = input.ok_or(Error::Cancelled)?;

            // a rejected OTP is handed back to the prompter with the next request
            let state = flow.submit_otp(&otp).await?;
            if state != BankTransferState::OtpRequired {
                self.emit(cancel, FlowEvent::BankTransferChanged(state));
            }
        }

        let result = flow.await_confirmation().await;
        self.emit(cancel, FlowEvent::BankTransferChanged(flow.state()));
        result.map(|confirmation| confirmation.reference)
    }

    /// Poll an already initiated bank transfer again, typically after
    /// [`Error::TransferTimedOut`]. No new transfer is started.
    pub async fn check_transfer(
        &self,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<TransferConfirmation, Error> {
        let mut flow = BankTransferFlow::resume(
            &*self.backend,
            self.polling,
            self.timeout,
            cancel.clone(),
            reference,
        );
        let result = flow
            .await_confirmation()
            .instrument(info_span!("transfer_check", reference = %reference))
            .await;
        self.emit(cancel, FlowEvent::BankTransferChanged(flow.state()));
        result
    }

    async fn collect_pin<P: Prompter + ?Sized>(
        &self,
        prompter: &P,
        purpose: PinPurpose,
        cancel: &CancellationToken,
    ) -> Result<SecurePin, Error> {
        let input = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            pin = prompter.request_pin(purpose) => pin,
        };
        SecurePin::new(input.ok_or(Error::Cancelled)?)
    }

    async fn call<T, F>(&self, cancel: &CancellationToken, label: &str, call: F) -> Result<T, Error>
    where
        F: std::future::Future<Output = Result<T, Error>>,
    {
        guarded(cancel, self.timeout, label, call).await
    }

    async fn submit_call<T, F>(
        &self,
        cancel: &CancellationToken,
        label: &str,
        idempotency_key: Uuid,
        call: F,
    ) -> Result<T, Error>
    where
        F: std::future::Future<Output = Result<T, Error>>,
    {
        self.call(cancel, label, call)
            .await
            .map_err(|e| e.after_submission(label, idempotency_key))
    }

    fn step(
        &self,
        gate: &mut AuthGate,
        event: GateEvent,
        cancel: &CancellationToken,
    ) -> Result<AuthGateState, Error> {
        let before = gate.history().len();
        let state = gate.apply(event)?;
        for entered in gate.history()[before..].to_vec() {
            self.emit(cancel, FlowEvent::GateChanged(entered));
        }
        Ok(state)
    }

    fn notice(&self, cancel: &CancellationToken, level: NoticeLevel, message: String) {
        self.emit(cancel, FlowEvent::Notice { level, message });
    }

    fn emit(&self, cancel: &CancellationToken, event: FlowEvent) {
        if cancel.is_cancelled() {
            return;
        }
        if let Some(sender) = &self.events {
            // receiver gone means nobody is watching; the flow itself carries on
            let _ = sender.send(event);
        }
    }
}

fn success_message(tx: &PendingTransaction, receipt: &Receipt) -> String {
    let amount = tx.currency().format(receipt.quote.principal);
    match tx.kind() {
        TransactionKind::BillPayment { .. } => format!("Bill payment of {} successful", amount),
        TransactionKind::Withdrawal { .. } => format!(
            "Withdrawal of {} requested. You will receive {}",
            amount,
            tx.currency().format(receipt.quote.net)
        ),
        TransactionKind::WalletTransfer {
            recipient_phone, ..
        } => format!("Sent {} to {}", amount, recipient_phone),
        TransactionKind::BankTransfer { .. } => format!("Bank transfer of {} completed", amount),
    }
}
