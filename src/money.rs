//! Monetary amounts in integer minor units
//!
//! Every currency the wallet serves (NGN, USD, GHS, KES) has two decimal
//! places, so an [`Amount`] is a count of kobo/cents. Conversion to and from
//! major-unit text only happens at the edges: user input, display, and the
//! JSON bodies sent to the backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Minor units per major unit
pub const MINOR_PER_MAJOR: i64 = 100;

/// Number of fractional digits in a major-unit string
pub const DECIMALS: usize = 2;

/// Supported wallet currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Ngn,
    Usd,
    Ghs,
    Kes,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Ngn => "NGN",
            Currency::Usd => "USD",
            Currency::Ghs => "GHS",
            Currency::Kes => "KES",
        }
    }

    /// Render an amount with the currency code, e.g. `NGN 1010.00`
    pub fn format(&self, amount: Amount) -> String {
        format!("{} {}", self.code(), amount)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NGN" => Ok(Currency::Ngn),
            "USD" => Ok(Currency::Usd),
            "GHS" => Ok(Currency::Ghs),
            "KES" => Ok(Currency::Kes),
            other => Err(Error::Validation(format!("Unsupported currency: {}", other))),
        }
    }
}

/// An amount of money in minor units
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn from_major(major: i64) -> Self {
        Self(major * MINOR_PER_MAJOR)
    }

    pub const fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Parse a non-negative major-unit string such as `"1000"` or `"12.5"`.
    ///
    /// At most two fractional digits are accepted; anything finer than one
    /// minor unit is rejected rather than rounded.
    pub fn parse_major(text: &str) -> Result<Self, Error> {
        parse_fixed(text, DECIMALS).map(Self)
    }

    pub fn checked_add(self, other: Amount) -> Result<Amount, Error> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or_else(|| Error::Validation("Amount overflow".to_string()))
    }

    pub fn checked_sub(self, other: Amount) -> Result<Amount, Error> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or_else(|| Error::Validation("Amount overflow".to_string()))
    }

    /// Subtract, clamping at zero
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0).max(0))
    }

    /// Major-unit string with exactly two decimals
    pub fn to_major_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_PER_MAJOR as u64;
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            abs / per,
            abs % per,
            width = DECIMALS
        )
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse_major(s)
    }
}

/// Parse unsigned decimal text into an integer scaled by `10^scale`.
///
/// Shared by amounts (scale 2) and percentage fee rules, where two decimal
/// places of a percent are basis points.
pub(crate) fn parse_fixed(text: &str, scale: usize) -> Result<i64, Error> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::Validation("Amount is required".to_string()));
    }

    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(Error::Validation("Invalid number format".to_string()));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
    {
        return Err(Error::Validation("Invalid number format".to_string()));
    }
    if frac.len() > scale {
        return Err(Error::Validation(format!(
            "At most {} decimal places are allowed",
            scale
        )));
    }

    let overflow = || Error::Validation("Amount is too large".to_string());
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let frac_value: i64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<width$}", frac, width = scale)
            .parse()
            .map_err(|_| overflow())?
    };

    whole
        .checked_mul(10_i64.pow(scale as u32))
        .and_then(|w| w.checked_add(frac_value))
        .ok_or_else(overflow)
}

/// Serde adapter writing amounts as major-unit JSON numbers.
///
/// Whole amounts are written as integers (`1000`), fractional ones as
/// floats (`12.5`). Reading accepts integers, floats and strings.
pub mod major_units {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    use super::{Amount, MINOR_PER_MAJOR};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        let minor = amount.minor();
        if minor % MINOR_PER_MAJOR == 0 {
            serializer.serialize_i64(minor / MINOR_PER_MAJOR)
        } else {
            serializer.serialize_f64(minor as f64 / MINOR_PER_MAJOR as f64)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(MajorVisitor)
    }

    struct MajorVisitor;

    impl<'de> Visitor<'de> for MajorVisitor {
        type Value = Amount;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative major-unit amount")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
            if v < 0 {
                return Err(E::custom("amount must not be negative"));
            }
            v.checked_mul(MINOR_PER_MAJOR)
                .map(Amount::from_minor)
                .ok_or_else(|| E::custom("amount is too large"))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
            let v = i64::try_from(v).map_err(|_| E::custom("amount is too large"))?;
            self.visit_i64(v)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
            self.visit_str(&v.to_string())
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
            Amount::parse_major(v).map_err(E::custom)
        }
    }

    /// Same as the parent module for `Option<Amount>`
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::super::Amount;

        pub fn serialize<S: Serializer>(
            amount: &Option<Amount>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match amount {
                Some(a) => super::serialize(a, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Amount>, D::Error> {
            #[derive(Deserialize)]
            struct Wrapper(#[serde(with = "super")] Amount);

            Option::<Wrapper>::deserialize(deserializer).map(|w| w.map(|Wrapper(a)| a))
        }
    }
}
