//! KYC tier withdrawal limits
//!
//! The backend is the authority on limits. The client check only keeps a
//! user from walking through PIN entry for a withdrawal that would be
//! refused anyway.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::money::{self, Amount};

/// Read-only snapshot of a user's daily withdrawal allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycLimitContext {
    pub tier: u8,
    #[serde(with = "money::major_units")]
    pub daily_limit: Amount,
    #[serde(with = "money::major_units")]
    pub consumed_today: Amount,
}

impl KycLimitContext {
    pub fn new(tier: u8, daily_limit: Amount, consumed_today: Amount) -> Self {
        Self {
            tier,
            daily_limit,
            consumed_today,
        }
    }

    /// Allowance left for today, never negative
    pub fn remaining(&self) -> Amount {
        self.daily_limit.saturating_sub(self.consumed_today)
    }
}

/// Outcome of a limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    Allowed { remaining_after: Amount },
    Denied { remaining: Amount },
}

impl LimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, LimitDecision::Allowed { .. })
    }

    /// Message shown when the request is denied
    pub fn message(&self) -> Option<String> {
        match self {
            LimitDecision::Allowed { .. } => None,
            LimitDecision::Denied { remaining } => {
                Some(format!("Daily limit exceeded. Remaining: {}", remaining))
            }
        }
    }

    pub fn into_result(self) -> Result<Amount, Error> {
        match self {
            LimitDecision::Allowed { remaining_after } => Ok(remaining_after),
            LimitDecision::Denied { remaining } => Err(Error::LimitExceeded { remaining }),
        }
    }
}

/// Allowed iff `consumed_today + requested <= daily_limit`
pub fn check_withdrawal_limit(ctx: &KycLimitContext, requested: Amount) -> LimitDecision {
    let remaining = ctx.remaining();
    match ctx.consumed_today.checked_add(requested) {
        Ok(after) if after <= ctx.daily_limit => LimitDecision::Allowed {
            remaining_after: ctx.daily_limit.saturating_sub(after),
        },
        _ => LimitDecision::Denied { remaining },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> KycLimitContext {
        KycLimitContext::new(1, Amount::from_major(1000), Amount::from_major(800))
    }

    #[test]
    fn test_over_limit_denied_with_remaining() {
        let decision = check_withdrawal_limit(&ctx(), Amount::from_major(250));
        assert_eq!(
            decision,
            LimitDecision::Denied {
                remaining: Amount::from_major(200)
            }
        );
        assert_eq!(
            decision.message().unwrap(),
            "Daily limit exceeded. Remaining: 200.00"
        );
        assert!(matches!(
            decision.into_result(),
            Err(Error::LimitExceeded { remaining }) if remaining == Amount::from_major(200)
        ));
    }

    #[test]
    fn test_exact_limit_allowed() {
        let decision = check_withdrawal_limit(&ctx(), Amount::from_major(200));
        assert!(decision.is_allowed());
        assert_eq!(
            decision,
            LimitDecision::Allowed {
                remaining_after: Amount::ZERO
            }
        );
        assert!(decision.message().is_none());
    }

    #[test]
    fn test_consumed_beyond_limit() {
        let ctx = KycLimitContext::new(0, Amount::from_major(100), Amount::from_major(150));
        assert_eq!(ctx.remaining(), Amount::ZERO);
        assert!(!check_withdrawal_limit(&ctx, Amount::from_minor(1)).is_allowed());
    }
}
