pub mod auth;
pub mod backend;
pub mod bank_transfer;
pub mod client;
pub mod config;
pub mod error;
pub mod fee;
pub mod gate;
pub mod limits;
pub mod logging;
pub mod money;
pub mod orchestrator;
pub mod types;
pub mod validation;

mod remote;

pub use auth::{
    AuthContext, BiometricAuthenticator, BiometricOutcome, PinPurpose, Prompter, SecurePin,
    UnavailableBiometric,
};
pub use backend::PaymentBackend;
pub use bank_transfer::{BankTransferFlow, BankTransferState, TransferConfirmation};
pub use client::AlaskaPayClient;
pub use config::{BackendConfig, FeeSchedule, FlowConfig, PollingConfig, SdkConfig};
pub use error::Error;
pub use fee::{calculate, FeeQuote, FeeRule};
pub use gate::{AuthGate, AuthGateState, GateEvent, StepUpPolicy};
pub use limits::{check_withdrawal_limit, KycLimitContext, LimitDecision};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
pub use money::{Amount, Currency};
pub use orchestrator::{
    FlowEvent, NoticeLevel, Orchestrator, PendingTransaction, Receipt, TransactionKind,
};
