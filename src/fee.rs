//! Fee and total derivation
//!
//! Fees are computed in minor units. Percentage rules are stored in basis
//! points and rounded half-up to the nearest minor unit, so a quote for a
//! given principal and rule is always the same number of kobo.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::money::{self, Amount};

/// Basis points in one hundred percent
pub const BASIS_POINTS_PER_UNIT: i64 = 10_000;

/// How a transaction fee is derived from its principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeRule {
    /// Fixed fee regardless of principal
    Flat {
        #[serde(with = "money::major_units")]
        value: Amount,
    },
    /// Share of the principal, in basis points (150 = 1.5%)
    Percentage { basis_points: u32 },
}

impl Default for FeeRule {
    fn default() -> Self {
        FeeRule::Flat {
            value: Amount::ZERO,
        }
    }
}

impl FeeRule {
    pub fn flat(value: Amount) -> Self {
        FeeRule::Flat { value }
    }

    pub fn percentage_bp(basis_points: u32) -> Self {
        FeeRule::Percentage { basis_points }
    }

    /// Percentage rule from decimal text, e.g. `"1.5"` for 1.5%
    pub fn percentage(text: &str) -> Result<Self, Error> {
        let bp = money::parse_fixed(text, 2)?;
        let basis_points = u32::try_from(bp)
            .map_err(|_| Error::Validation("Percentage is too large".to_string()))?;
        Ok(FeeRule::Percentage { basis_points })
    }

    /// Fee charged on `principal`
    pub fn fee_for(&self, principal: Amount) -> Result<Amount, Error> {
        if principal.is_negative() {
            return Err(Error::Validation(
                "Amount must not be negative".to_string(),
            ));
        }
        match *self {
            FeeRule::Flat { value } => Ok(value),
            FeeRule::Percentage { basis_points } => {
                let scaled = i128::from(principal.minor()) * i128::from(basis_points);
                let half = i128::from(BASIS_POINTS_PER_UNIT / 2);
                let fee = (scaled + half) / i128::from(BASIS_POINTS_PER_UNIT);
                i64::try_from(fee)
                    .map(Amount::from_minor)
                    .map_err(|_| Error::Validation("Fee overflow".to_string()))
            }
        }
    }
}

impl fmt::Display for FeeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeRule::Flat { value } => write!(f, "flat {}", value),
            FeeRule::Percentage { basis_points } => {
                write!(f, "{}.{:02}%", basis_points / 100, basis_points % 100)
            }
        }
    }
}

impl FromStr for FeeRule {
    type Err = Error;

    /// `"10"` or `"flat:10"` for a flat fee, `"1.5%"` or `"percent:1.5"` for a percentage.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(p) = s.strip_suffix('%') {
            return FeeRule::percentage(p);
        }
        if let Some(p) = s.strip_prefix("percent:") {
            return FeeRule::percentage(p);
        }
        let flat = s.strip_prefix("flat:").unwrap_or(s);
        Amount::parse_major(flat).map(FeeRule::flat)
    }
}

/// Derived amounts for a principal under a fee rule, serialized in major units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    #[serde(with = "money::major_units")]
    pub principal: Amount,
    #[serde(with = "money::major_units")]
    pub fee: Amount,
    /// Amount debited from the payer: `principal + fee`
    #[serde(with = "money::major_units")]
    pub total: Amount,
    /// Amount paid out when the fee is deducted from the principal
    #[serde(with = "money::major_units")]
    pub net: Amount,
}

/// Compute the fee, total and net amounts for `principal`
pub fn calculate(principal: Amount, rule: &FeeRule) -> Result<FeeQuote, Error> {
    let fee = rule.fee_for(principal)?;
    Ok(FeeQuote {
        principal,
        fee,
        total: principal.checked_add(fee)?,
        net: principal.saturating_sub(fee),
    })
}
