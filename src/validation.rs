//! Validation utilities for transaction input
//!
//! Input checks applied before a flow leaves the amount step. These are
//! advisory: the backend repeats every check authoritatively.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::Error;
use crate::money::Amount;

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("static regex"))
}

fn account_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{10}$").expect("static regex"))
}

/// Validate a user-entered amount; it must parse and be greater than zero
pub fn validate_amount(amount: &str) -> Result<Amount, Error> {
    let value = Amount::parse_major(amount)?;
    if !value.is_positive() {
        return Err(Error::Validation("Please enter a valid amount".to_string()));
    }
    Ok(value)
}

/// Validate a transaction PIN (exactly four digits)
pub fn validate_pin_format(pin: &str) -> Result<(), Error> {
    if pin.len() == 4 && pin.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::Validation("PIN must be 4 digits".to_string()))
    }
}

/// Validate a one-time password sent by the bank rail
pub fn validate_otp_format(otp: &str) -> Result<(), Error> {
    let len = otp.len();
    if (4..=8).contains(&len) && otp.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::Otp("OTP must be 4 to 8 digits".to_string()))
    }
}

/// Validate a recipient phone number
pub fn validate_phone(phone: &str) -> Result<(), Error> {
    let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    if phone_regex().is_match(&compact) {
        Ok(())
    } else {
        Err(Error::Validation("Invalid phone number".to_string()))
    }
}

/// Validate a 10-digit bank account number
pub fn validate_account_number(account: &str) -> Result<(), Error> {
    if account_regex().is_match(account.trim()) {
        Ok(())
    } else {
        Err(Error::Validation(
            "Account number must be 10 digits".to_string(),
        ))
    }
}

/// Reject a debit larger than the available balance
pub fn check_balance(available: Amount, required: Amount) -> Result<(), Error> {
    if required > available {
        Err(Error::InsufficientBalance {
            available,
            required,
        })
    } else {
        Ok(())
    }
}
