//! Maximum slippage policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::TaskError;
use crate::domain::{Address, Slippage};

/// Default max slippage plus per-token overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippagePolicy {
    /// Upper bound for tokens without an override
    #[serde(default)]
    pub default_max: Slippage,

    /// Per-token overrides
    #[serde(default)]
    pub custom: BTreeMap<Address, Slippage>,
}

impl SlippagePolicy {
    /// Effective max slippage for `token`
    pub fn effective(&self, token: Address) -> Slippage {
        self.custom.get(&token).copied().unwrap_or(self.default_max)
    }

    /// Pass iff `slippage` does not exceed the effective max of `token`
    pub fn check(&self, token: Address, slippage: Slippage) -> Result<(), TaskError> {
        let max = self.effective(token);
        if slippage <= max {
            return Ok(());
        }
        Err(TaskError::SlippageTooHigh {
            token,
            slippage,
            max,
        })
    }

    pub fn validate(&self) -> Result<(), TaskError> {
        std::iter::once(&self.default_max)
            .chain(self.custom.values())
            .try_for_each(|max| validate_max(*max))
    }

    pub fn set_default(&mut self, max: Slippage) -> Result<(), TaskError> {
        validate_max(max)?;
        self.default_max = max;
        Ok(())
    }

    pub fn set_custom(&mut self, token: Address, max: Slippage) -> Result<(), TaskError> {
        if token.is_zero() {
            return Err(TaskError::InvalidToken);
        }
        validate_max(max)?;
        self.custom.insert(token, max);
        Ok(())
    }

    /// Drop the override for `token`; returns the removed max if any
    pub fn clear_custom(&mut self, token: Address) -> Option<Slippage> {
        self.custom.remove(&token)
    }
}

fn validate_max(max: Slippage) -> Result<(), TaskError> {
    if max > Slippage::ONE {
        return Err(TaskError::SlippageAboveOne(max));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = Address::from_low_u8(1);

    fn pct(s: &str) -> Slippage {
        Slippage::from_fraction_str(s).unwrap()
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let mut policy = SlippagePolicy::default();
        policy.set_default(pct("0.01")).unwrap();

        assert!(policy.check(TOKEN, Slippage::ZERO).is_ok());
        assert!(policy.check(TOKEN, pct("0.01")).is_ok());
        assert!(matches!(
            policy.check(TOKEN, pct("0.02")),
            Err(TaskError::SlippageTooHigh { .. })
        ));
    }

    #[test]
    fn test_zero_default_rejects_any_slippage() {
        let policy = SlippagePolicy::default();
        assert!(policy.check(TOKEN, Slippage::ZERO).is_ok());
        assert!(policy.check(TOKEN, Slippage::from_raw(1)).is_err());
    }

    #[test]
    fn test_override_and_clear() {
        let mut policy = SlippagePolicy::default();
        policy.set_default(pct("0.01")).unwrap();
        policy.set_custom(TOKEN, pct("0.05")).unwrap();

        assert_eq!(policy.effective(TOKEN), pct("0.05"));
        assert!(policy.check(TOKEN, pct("0.05")).is_ok());

        policy.clear_custom(TOKEN);
        assert_eq!(policy.effective(TOKEN), pct("0.01"));
    }

    #[test]
    fn test_above_one_is_rejected() {
        let mut policy = SlippagePolicy::default();
        assert!(policy.set_default(Slippage::ONE).is_ok());
        let too_high = Slippage::from_raw(Slippage::ONE.raw() + 1);
        assert_eq!(policy.set_default(too_high), Err(TaskError::SlippageAboveOne(too_high)));
        assert_eq!(policy.default_max, Slippage::ONE);
        assert_eq!(
            policy.set_custom(TOKEN, too_high),
            Err(TaskError::SlippageAboveOne(too_high))
        );
    }
}
