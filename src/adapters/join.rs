//! Reference connector for liquidity joins.
//!
//! Performs no pool math: it accepts `join` payloads, records what it was
//! asked to do, and reports that back as a receipt. Real pool adapters
//! implement [`Connector`] the same way.

use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Connector, ConnectorCall, ConnectorReceipt};
use crate::domain::Address;

/// Join connector that keeps a log of the joins it performed
pub struct JoinConnector {
    /// Identity the vault binds this connector under
    address: Address,

    /// Receipts in execution order
    receipts: Mutex<Vec<ConnectorReceipt>>,

    /// When set, every execution fails with this message
    failure: Mutex<Option<String>>,
}

impl JoinConnector {
    /// Create a connector bound to `address`
    pub fn new(address: Address) -> Self {
        Self {
            address,
            receipts: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    /// Make subsequent executions fail (`None` restores normal behavior)
    pub fn set_failure(&self, message: Option<String>) {
        *recover(&self.failure, "failure flag") = message;
    }

    /// Receipts of all joins performed so far
    pub fn receipts(&self) -> Vec<ConnectorReceipt> {
        recover(&self.receipts, "receipt log").clone()
    }
}

#[async_trait]
impl Connector for JoinConnector {
    fn name(&self) -> &str {
        "join"
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn execute(&self, call: &ConnectorCall) -> Result<ConnectorReceipt> {
        if let Some(message) = recover(&self.failure, "failure flag").clone() {
            anyhow::bail!("Join connector failed: {}", message);
        }

        let receipt = match call {
            ConnectorCall::Join {
                token_in,
                amount_in,
                slippage,
            } => ConnectorReceipt {
                connector: self.address,
                token_in: *token_in,
                amount_in: *amount_in,
                slippage: *slippage,
            },
        };

        debug!(connector = %self.address, token = %receipt.token_in, "Performing join");

        recover(&self.receipts, "receipt log").push(receipt.clone());

        info!(
            connector = %self.address,
            token = %receipt.token_in,
            amount = %receipt.amount_in,
            slippage = %receipt.slippage,
            "Join performed"
        );

        Ok(receipt)
    }
}

/// Lock `mutex`, recovering the value if a previous holder panicked
fn recover<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!(lock = what, "Join connector lock poisoned, recovering");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Slippage;

    #[tokio::test]
    async fn test_join_records_receipt() {
        let connector = JoinConnector::new(Address::from_low_u8(9));
        let call = ConnectorCall::join(Address::from_low_u8(1), 10, Slippage::ZERO);

        let receipt = connector.execute(&call).await.unwrap();
        assert_eq!(receipt.connector, Address::from_low_u8(9));
        assert_eq!(receipt.amount_in, 10);
        assert_eq!(connector.receipts(), vec![receipt]);
        assert_eq!(connector.name(), "join");
    }

    #[tokio::test]
    async fn test_join_failure_leaves_no_receipt() {
        let connector = JoinConnector::new(Address::from_low_u8(9));
        connector.set_failure(Some("pool paused".to_string()));

        let call = ConnectorCall::join(Address::from_low_u8(1), 10, Slippage::ZERO);
        let err = connector.execute(&call).await.unwrap_err();
        assert!(err.to_string().contains("pool paused"));
        assert!(connector.receipts().is_empty());

        connector.set_failure(None);
        assert!(connector.execute(&call).await.is_ok());
    }

    #[tokio::test]
    async fn test_failure_flag_survives_poisoned_lock() {
        let connector = JoinConnector::new(Address::from_low_u8(9));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = connector.failure.lock().unwrap();
            panic!("holder died");
        }));
        assert!(result.is_err());

        connector.set_failure(Some("pool paused".to_string()));
        let call = ConnectorCall::join(Address::from_low_u8(1), 10, Slippage::ZERO);
        assert!(connector.execute(&call).await.is_err());
        assert!(connector.receipts().is_empty());
    }
}
