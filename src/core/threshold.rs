//! Amount threshold policy.
//!
//! Each token resolves to an effective `{min, max}` range: its custom
//! override if one is set, otherwise the default. A `max` of zero leaves
//! the range unbounded above.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::TaskError;
use crate::domain::{Address, Amount, Threshold};

/// Default threshold plus per-token overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    /// Range applied to tokens without an override
    #[serde(default)]
    pub default: Threshold,

    /// Per-token overrides
    #[serde(default)]
    pub custom: BTreeMap<Address, Threshold>,
}

impl ThresholdPolicy {
    /// Effective threshold for `token`
    pub fn effective(&self, token: Address) -> Threshold {
        self.custom.get(&token).copied().unwrap_or(self.default)
    }

    /// Pass iff `amount` lies inside the effective range of `token`
    pub fn check(&self, token: Address, amount: Amount) -> Result<(), TaskError> {
        let threshold = self.effective(token);
        if threshold.contains(amount) {
            return Ok(());
        }
        Err(TaskError::ThresholdNotMet {
            token,
            amount,
            min: threshold.min,
            max: threshold.max,
        })
    }

    /// Ensure every configured range is coherent
    pub fn validate(&self) -> Result<(), TaskError> {
        std::iter::once(&self.default)
            .chain(self.custom.values())
            .try_for_each(validate_threshold)
    }

    pub fn set_default(&mut self, threshold: Threshold) -> Result<(), TaskError> {
        validate_threshold(&threshold)?;
        self.default = threshold;
        Ok(())
    }

    pub fn set_custom(&mut self, token: Address, threshold: Threshold) -> Result<(), TaskError> {
        if token.is_zero() {
            return Err(TaskError::InvalidToken);
        }
        validate_threshold(&threshold)?;
        self.custom.insert(token, threshold);
        Ok(())
    }

    /// Drop the override for `token`; returns the removed range if any
    pub fn clear_custom(&mut self, token: Address) -> Option<Threshold> {
        self.custom.remove(&token)
    }
}

fn validate_threshold(threshold: &Threshold) -> Result<(), TaskError> {
    if threshold.is_valid() {
        Ok(())
    } else {
        Err(TaskError::InvalidThreshold {
            min: threshold.min,
            max: threshold.max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = Address::from_low_u8(1);
    const OTHER: Address = Address::from_low_u8(2);

    #[test]
    fn test_default_applies_without_override() {
        let policy = ThresholdPolicy {
            default: Threshold::new(10, 0),
            ..Default::default()
        };

        assert!(policy.check(TOKEN, 10).is_ok());
        assert!(policy.check(TOKEN, u128::MAX).is_ok());
        assert!(matches!(
            policy.check(TOKEN, 9),
            Err(TaskError::ThresholdNotMet { min: 10, max: 0, .. })
        ));
    }

    #[test]
    fn test_override_takes_precedence() {
        let mut policy = ThresholdPolicy::default();
        policy.set_default(Threshold::new(10, 0)).unwrap();
        policy.set_custom(TOKEN, Threshold::new(11, 20)).unwrap();

        assert!(policy.check(TOKEN, 10).is_err());
        assert!(policy.check(TOKEN, 21).is_err());
        assert!(policy.check(TOKEN, 20).is_ok());
        assert!(policy.check(OTHER, 10).is_ok());

        assert_eq!(policy.clear_custom(TOKEN), Some(Threshold::new(11, 20)));
        assert!(policy.check(TOKEN, 10).is_ok());
    }

    #[test]
    fn test_incoherent_ranges_are_rejected() {
        let mut policy = ThresholdPolicy::default();
        let err = policy.set_default(Threshold::new(5, 4)).unwrap_err();
        assert_eq!(err, TaskError::InvalidThreshold { min: 5, max: 4 });
        assert_eq!(policy.default, Threshold::default());

        assert_eq!(
            policy.set_custom(Address::ZERO, Threshold::new(1, 0)),
            Err(TaskError::InvalidToken)
        );
    }

    #[test]
    fn test_validate_covers_overrides() {
        let mut policy = ThresholdPolicy::default();
        policy.custom.insert(TOKEN, Threshold::new(3, 2));
        assert!(policy.validate().is_err());
    }
}
