//! AlaskaPay command-line client
//!
//! Runs guarded transactions against the configured backend. PIN and OTP
//! are read from the terminal; there is no biometric hardware here, so
//! step-up confirmation always falls back to a second PIN entry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use alaskapay_sdk::{
    calculate, init_logging, AlaskaPayClient, AuthContext, BankTransferState, Currency, Error,
    FlowEvent, LogLevel, NoticeLevel, Orchestrator, PinPurpose, Prompter, Receipt, SdkConfig,
    StepUpPolicy, TransactionKind, UnavailableBiometric,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use dialoguer::{Confirm, Input, Password};
use thiserror::Error as ThisError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(ThisError, Debug)]
enum CliError {
    #[error("SDK Error: {0}")]
    Sdk(#[from] Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Toml Error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Command Error: {0}")]
    Command(String),
}

#[derive(Parser)]
#[command(name = "alaskapay")]
#[command(about = "AlaskaPay guarded transactions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Acting user; defaults to ALASKAPAY_USER_ID
    #[arg(long, global = true)]
    user_id: Option<String>,

    /// Access token of the signed-in user; defaults to ALASKAPAY_SESSION_TOKEN
    #[arg(long, global = true)]
    session_token: Option<String>,

    /// Require step-up confirmation for large transactions
    #[arg(long, global = true)]
    step_up: bool,

    /// Skip the confirmation question after the quote
    #[arg(short, long, global = true)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show fee, total and net for an amount
    Quote {
        #[arg(long, value_enum)]
        kind: QuoteKind,
        #[arg(long)]
        amount: String,
    },

    /// Pay a saved biller
    PayBill {
        #[arg(long)]
        saved_biller_id: String,
        #[arg(long)]
        payee_id: String,
        #[arg(long)]
        account_number: String,
        #[arg(long)]
        amount: String,
        /// Pay on a later date (YYYY-MM-DD)
        #[arg(long)]
        scheduled_date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Withdraw from a wallet to a bank account
    Withdraw {
        #[arg(long)]
        wallet_id: String,
        #[arg(long)]
        bank_account_id: String,
        #[arg(long)]
        amount: String,
    },

    /// Send money to another wallet by phone number
    Transfer {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// Transfer to a bank account over the bank rail
    BankTransfer {
        #[arg(long)]
        bank_account_id: String,
        #[arg(long)]
        amount: String,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum QuoteKind {
    Bill,
    Withdrawal,
    WalletTransfer,
    BankTransfer,
}

/// Reads PIN and OTP from the terminal
struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn request_pin(&self, purpose: PinPurpose) -> Option<String> {
        let prompt = match purpose {
            PinPurpose::Transaction => "Enter transaction PIN",
            PinPurpose::StepUpFallback => "Confirm with your PIN again",
        };
        tokio::task::spawn_blocking(move || Password::new().with_prompt(prompt).interact().ok())
            .await
            .ok()
            .flatten()
    }

    async fn request_otp(&self, message: &str, error: Option<&str>) -> Option<String> {
        if let Some(error) = error {
            eprintln!("{} {}", "✗".red(), error);
        }
        let prompt = message.to_string();
        tokio::task::spawn_blocking(move || {
            Input::<String>::new()
                .with_prompt(prompt)
                .interact_text()
                .ok()
        })
        .await
        .ok()
        .flatten()
    }
}

fn main() -> Result<(), CliError> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli));
    // after Ctrl-C a PIN or OTP prompt can still be blocked on terminal input
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.clone().unwrap_or_else(SdkConfig::default_path);
    let mut config = SdkConfig::from_sources(Some(&config_path))?;
    if cli.verbose {
        config.logging.level = LogLevel::Debug;
    }
    init_logging(&config.logging.clone().with_env_overrides())?;
    debug!(path = %config_path.display(), "configuration loaded");

    let (kind, amount) = match &cli.command {
        Commands::Quote { kind, amount } => return quote(&config, *kind, amount, cli.step_up),
        Commands::Config(command) => return config_command(&config, &config_path, command),
        Commands::PayBill {
            saved_biller_id,
            payee_id,
            account_number,
            amount,
            scheduled_date,
            notes,
        } => (
            TransactionKind::BillPayment {
                saved_biller_id: saved_biller_id.clone(),
                payee_id: payee_id.clone(),
                account_number: account_number.clone(),
                scheduled_date: *scheduled_date,
                notes: notes.clone(),
            },
            amount,
        ),
        Commands::Withdraw {
            wallet_id,
            bank_account_id,
            amount,
        } => (
            TransactionKind::Withdrawal {
                wallet_id: wallet_id.clone(),
                bank_account_id: bank_account_id.clone(),
            },
            amount,
        ),
        Commands::Transfer {
            to,
            amount,
            description,
        } => (
            TransactionKind::WalletTransfer {
                recipient_phone: to.clone(),
                description: description.clone(),
            },
            amount,
        ),
        Commands::BankTransfer {
            bank_account_id,
            amount,
        } => (
            TransactionKind::BankTransfer {
                bank_account_id: bank_account_id.clone(),
            },
            amount,
        ),
    };

    run_transaction(&cli, &config, kind, amount).await
}

fn quote(
    config: &SdkConfig,
    kind: QuoteKind,
    amount: &str,
    step_up: bool,
) -> Result<(), CliError> {
    for line in quote_lines(config, kind, amount, step_up)? {
        println!("{}", line);
    }
    Ok(())
}

fn quote_lines(
    config: &SdkConfig,
    kind: QuoteKind,
    amount: &str,
    step_up: bool,
) -> Result<Vec<String>, CliError> {
    let fees = &config.flow.fees;
    let rule = match kind {
        QuoteKind::Bill => fees.bill_payment,
        QuoteKind::Withdrawal => fees.withdrawal,
        QuoteKind::WalletTransfer => fees.wallet_transfer,
        QuoteKind::BankTransfer => fees.bank_transfer,
    };
    let principal = alaskapay_sdk::validation::validate_amount(amount)?;
    let quote = calculate(principal, &rule)?;
    let currency = config.flow.currency;

    let mut lines = vec![
        format!("{:<10} {}", "Amount:", currency.format(quote.principal)),
        format!("{:<10} {} ({})", "Fee:", currency.format(quote.fee), rule),
        format!("{:<10} {}", "Total:", currency.format(quote.total).as_str().bold()),
    ];
    if matches!(kind, QuoteKind::Withdrawal) {
        lines.push(format!("{:<10} {}", "You get:", currency.format(quote.net)));
    }
    if StepUpPolicy::new(step_up, config.flow.step_up_threshold).requires_step_up(quote.total) {
        lines.push(
            "Totals above the step-up threshold need a second confirmation"
                .dimmed()
                .to_string(),
        );
    }
    Ok(lines)
}

fn config_command(
    config: &SdkConfig,
    path: &Path,
    command: &ConfigCommands,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let mut shown = config.clone();
            if !shown.backend.api_key.is_empty() {
                shown.backend.api_key = "****".to_string();
            }
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&shown)?);
            Ok(())
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::Command(format!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                )));
            }
            SdkConfig::default().save(path)?;
            println!("{} Wrote {}", "✓".green(), path.display());
            Ok(())
        }
    }
}

async fn run_transaction(
    cli: &Cli,
    config: &SdkConfig,
    kind: TransactionKind,
    amount: &str,
) -> Result<(), CliError> {
    let user_id = cli
        .user_id
        .clone()
        .or_else(|| std::env::var("ALASKAPAY_USER_ID").ok())
        .ok_or_else(|| CliError::Command("--user-id or ALASKAPAY_USER_ID is required".into()))?;
    let session = cli
        .session_token
        .clone()
        .or_else(|| std::env::var("ALASKAPAY_SESSION_TOKEN").ok());

    let mut client = AlaskaPayClient::new(config.backend.clone())?;
    if let Some(token) = session {
        client = client.with_session(token);
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::new(Arc::new(client), Arc::new(UnavailableBiometric), config)
        .with_events(events_tx);

    let pending = orchestrator.pending(kind, amount)?;
    let quote = pending.quote()?;
    let currency = pending.currency();
    println!(
        "{} {} to {}: fee {}, total {}",
        pending.kind().label().replace('_', " "),
        currency.format(quote.principal),
        pending.kind().target_descriptor(),
        currency.format(quote.fee),
        currency.format(quote.total).as_str().bold()
    );
    if !cli.yes {
        let proceed = tokio::task::spawn_blocking(|| {
            Confirm::new()
                .with_prompt("Continue?")
                .default(true)
                .interact()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false);
        if !proceed {
            return Ok(());
        }
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });
    let printer = tokio::spawn(print_events(events_rx, currency));

    let auth = AuthContext::new(user_id, cli.step_up);
    let result = orchestrator
        .run(&auth, &pending, &TerminalPrompter, &cancel)
        .await;
    // closes the event channel so the printer finishes
    drop(orchestrator);
    let _ = printer.await;

    match result {
        Ok(_) => Ok(()),
        Err(Error::Cancelled) => {
            println!("{}", "Cancelled".yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn print_events(mut events: mpsc::UnboundedReceiver<FlowEvent>, currency: Currency) {
    while let Some(event) = events.recv().await {
        match event {
            FlowEvent::Notice { level, message } => match level {
                NoticeLevel::Success => println!("{} {}", "✓".green(), message),
                NoticeLevel::Info => println!("{} {}", "i".blue(), message),
                NoticeLevel::Error => eprintln!("{} {}", "✗".red(), message),
            },
            FlowEvent::BankTransferChanged(BankTransferState::Processing) => {
                println!("{}", "Waiting for the bank to confirm the transfer...".dimmed())
            }
            FlowEvent::Completed(receipt) => {
                for line in receipt_lines(&receipt, currency) {
                    println!("{}", line);
                }
            }
            other => debug!(event = ?other, "flow event"),
        }
    }
}

fn receipt_lines(receipt: &Receipt, currency: Currency) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(reference) = &receipt.reference {
        lines.push(format!("{:<10} {}", "Reference:", reference));
    }
    lines.push(format!("{:<10} {}", "Debited:", currency.format(receipt.debited)));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    use alaskapay_sdk::{Amount, FeeRule};
    use uuid::Uuid;

    #[test]
    fn test_step_up_hint_follows_flag() {
        let config = SdkConfig::default();
        let hint = |lines: &[String]| lines.iter().any(|l| l.contains("step-up threshold"));

        let plain = quote_lines(&config, QuoteKind::Bill, "1000", false).unwrap();
        assert!(!hint(&plain));
        let guarded = quote_lines(&config, QuoteKind::Bill, "1000", true).unwrap();
        assert!(hint(&guarded));
        let small = quote_lines(&config, QuoteKind::Bill, "500", true).unwrap();
        assert!(!hint(&small));
    }

    #[test]
    fn test_withdrawal_receipt_shows_principal_debited() {
        let quote = calculate(
            Amount::from_major(2500),
            &FeeRule::flat(Amount::from_major(50)),
        )
        .unwrap();
        let receipt = Receipt {
            kind: "withdrawal",
            reference: Some("wd-1".to_string()),
            currency: Currency::Ngn,
            quote,
            debited: quote.principal,
            idempotency_key: Uuid::nil(),
            fraud_decision: None,
        };

        let lines = receipt_lines(&receipt, Currency::Ngn);
        assert!(lines[0].contains("wd-1"));
        assert!(lines[1].contains("NGN 2500.00"));
    }
}
