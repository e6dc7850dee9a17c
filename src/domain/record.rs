//! Execution records emitted by tasks.
//!
//! A record is produced once per successful task call and never mutated
//! afterwards. Records are the task-side counterpart of the vault's own
//! `Executed` log entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::primitives::{Address, Amount, Selector, Slippage};

/// Completion record of a single dispatched connector call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique identifier for this record
    pub id: Uuid,

    /// When the call completed (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// Task that initiated the execution
    pub task: Address,

    /// Connector the vault invoked
    pub connector: Address,

    /// Operation selected on the connector
    pub selector: Selector,

    /// Encoded operation payload handed to the vault
    pub data: String,

    /// Token the operation was requested for
    pub token: Address,

    /// Amount requested
    pub amount: Amount,

    /// Slippage requested
    pub slippage: Slippage,
}

impl ExecutionRecord {
    /// Create a new record with the current timestamp
    pub fn new(
        task: Address,
        connector: Address,
        selector: Selector,
        data: String,
        token: Address,
        amount: Amount,
        slippage: Slippage,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            task,
            connector,
            selector,
            data,
            token,
            amount,
            slippage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization() {
        let record = ExecutionRecord::new(
            Address::from_low_u8(1),
            Address::from_low_u8(2),
            Selector::from_signature("join(address,uint256,uint256)"),
            "{}".to_string(),
            Address::from_low_u8(3),
            10,
            Slippage::from_fraction_str("0.01").unwrap(),
        );

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"0x0000000000000000000000000000000000000002\""));
        assert!(json.contains("\"0.01\""));

        let parsed: ExecutionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
