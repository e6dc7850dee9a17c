//! Interfaces for the external collaborators a task drives.
//!
//! A task never performs a financial operation itself. It encodes a
//! [`ConnectorCall`] and hands it to a [`Vault`], which authorizes the
//! request and forwards it to the bound [`Connector`].

pub mod join;
pub mod vault;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Address, Amount, Selector, Slippage};

// Re-export the reference implementations
pub use join::JoinConnector;
pub use vault::{SmartVault, Vault, VaultError, VaultExecution};

/// Signature of the liquidity join operation
pub const JOIN_SIGNATURE: &str = "join(address,uint256,uint256)";

/// Operation payload dispatched to a connector, one variant per family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorCall {
    /// Join a liquidity pool with a single token
    Join {
        token_in: Address,
        amount_in: Amount,
        slippage: Slippage,
    },
}

impl ConnectorCall {
    pub fn join(token_in: Address, amount_in: Amount, slippage: Slippage) -> Self {
        Self::Join {
            token_in,
            amount_in,
            slippage,
        }
    }

    /// Operation signature for this payload
    pub fn signature(&self) -> &'static str {
        match self {
            Self::Join { .. } => JOIN_SIGNATURE,
        }
    }

    pub fn selector(&self) -> Selector {
        Selector::from_signature(self.signature())
    }

    /// Canonical encoding: `<selector>:<json body>`
    pub fn encode(&self) -> Result<String> {
        let body = serde_json::to_string(self)?;
        Ok(format!("{}:{}", self.selector(), body))
    }
}

/// What a connector actually did, as reported by the connector itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorReceipt {
    /// Connector that performed the operation
    pub connector: Address,

    /// Token consumed
    pub token_in: Address,

    /// Amount consumed
    pub amount_in: Amount,

    /// Slippage the operation was bounded by
    pub slippage: Slippage,
}

/// Trait for swappable execution adapters
#[async_trait]
pub trait Connector: Send + Sync {
    /// Human-readable connector name
    fn name(&self) -> &str;

    /// Identity the vault binds this connector under
    fn address(&self) -> Address;

    /// Perform the operation described by `call`
    async fn execute(&self, call: &ConnectorCall) -> Result<ConnectorReceipt>;
}
