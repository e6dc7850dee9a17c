//! Failure taxonomy of task operations.
//!
//! Every variant maps to a stable machine code so callers can assert on
//! which gate rejected a call without matching on message text.

use thiserror::Error;

use crate::adapters::VaultError;
use crate::domain::{Address, Amount, Selector, Slippage};

/// Errors returned by [`Task`](super::Task) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Sender {caller} not allowed to invoke {what}")]
    Unauthorized { caller: Address, what: Selector },

    #[error("Token cannot be the zero address")]
    InvalidToken,

    #[error("Amount cannot be zero")]
    InvalidAmount,

    #[error("Amount {amount} of token {token} outside threshold [{min}, {max}]")]
    ThresholdNotMet {
        token: Address,
        amount: Amount,
        min: Amount,
        max: Amount,
    },

    #[error("Slippage {slippage} for token {token} above max {max}")]
    SlippageTooHigh {
        token: Address,
        slippage: Slippage,
        max: Slippage,
    },

    #[error("Vault execution failed: {0}")]
    VaultExecutionFailed(#[from] VaultError),

    #[error("Threshold min {min} above max {max}")]
    InvalidThreshold { min: Amount, max: Amount },

    #[error("Slippage {0} above one")]
    SlippageAboveOne(Slippage),

    #[error("Connector cannot be the zero address")]
    InvalidConnector,
}

impl TaskError {
    /// Stable machine-readable code for this failure
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "AUTH_SENDER_NOT_ALLOWED",
            Self::InvalidToken => "TASK_TOKEN_ZERO",
            Self::InvalidAmount => "TASK_AMOUNT_ZERO",
            Self::ThresholdNotMet { .. } => "TASK_TOKEN_THRESHOLD_NOT_MET",
            Self::SlippageTooHigh { .. } => "TASK_SLIPPAGE_TOO_HIGH",
            Self::VaultExecutionFailed(_) => "TASK_VAULT_EXECUTION_FAILED",
            Self::InvalidThreshold { .. } => "TASK_BAD_THRESHOLD_MIN_MAX",
            Self::SlippageAboveOne(_) => "TASK_SLIPPAGE_ABOVE_ONE",
            Self::InvalidConnector => "TASK_CONNECTOR_ZERO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            TaskError::Unauthorized {
                caller: Address::ZERO,
                what: Selector::from_signature("call(address,uint256,uint256)"),
            },
            TaskError::InvalidToken,
            TaskError::InvalidAmount,
            TaskError::ThresholdNotMet {
                token: Address::ZERO,
                amount: 1,
                min: 2,
                max: 0,
            },
            TaskError::SlippageTooHigh {
                token: Address::ZERO,
                slippage: Slippage::ONE,
                max: Slippage::ZERO,
            },
            TaskError::VaultExecutionFailed(VaultError::UnknownConnector(Address::ZERO)),
            TaskError::InvalidThreshold { min: 2, max: 1 },
            TaskError::SlippageAboveOne(Slippage::ONE),
            TaskError::InvalidConnector,
        ];

        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_vault_error_converts() {
        let err: TaskError = VaultError::ConnectorNotAllowed(Address::ZERO).into();
        assert_eq!(err.code(), "TASK_VAULT_EXECUTION_FAILED");
        assert!(err.to_string().contains("registry check"));
    }
}
