//! Guarded task executor.
//!
//! A task is bound to one connector and dispatches a single operation
//! through the vault once every gate passes. Gates run in a fixed order
//! and the first failure wins:
//!
//! 1. caller authorized for `call` with these arguments
//! 2. token is not the zero address
//! 3. amount is not zero
//! 4. amount inside the token's effective threshold
//! 5. slippage within the token's effective max
//! 6. vault accepts the task as caller of the bound connector
//!
//! The configuration lock is held from the first gate until the record is
//! persisted, so a call always observes one complete configuration, setters
//! never interleave with an in-flight call, and the record store lists
//! executions in the order the vault performed them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::authorizer::{AuthArg, Authorizer};
use super::error::TaskError;
use super::record_store::RecordStore;
use super::slippage::SlippagePolicy;
use super::threshold::ThresholdPolicy;
use crate::adapters::{ConnectorCall, Vault};
use crate::domain::{Address, Amount, ExecutionRecord, Selector, Slippage, Threshold};

pub const CALL_SIGNATURE: &str = "call(address,uint256,uint256)";
pub const SET_CONNECTOR_SIGNATURE: &str = "setConnector(address)";
pub const SET_DEFAULT_THRESHOLD_SIGNATURE: &str = "setDefaultThreshold(uint256,uint256)";
pub const SET_TOKEN_THRESHOLD_SIGNATURE: &str = "setTokenThreshold(address,uint256,uint256)";
pub const CLEAR_TOKEN_THRESHOLD_SIGNATURE: &str = "clearTokenThreshold(address)";
pub const SET_DEFAULT_MAX_SLIPPAGE_SIGNATURE: &str = "setDefaultMaxSlippage(uint256)";
pub const SET_TOKEN_MAX_SLIPPAGE_SIGNATURE: &str = "setTokenMaxSlippage(address,uint256)";
pub const CLEAR_TOKEN_MAX_SLIPPAGE_SIGNATURE: &str = "clearTokenMaxSlippage(address)";

/// Configuration of a task, as loaded from YAML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Connector every call is dispatched to
    pub connector: Address,

    /// Amount thresholds
    #[serde(default)]
    pub thresholds: ThresholdPolicy,

    /// Slippage limits
    #[serde(default)]
    pub slippage: SlippagePolicy,
}

impl TaskConfig {
    /// Config bound to `connector` with permissive defaults
    pub fn new(connector: Address) -> Self {
        Self {
            connector,
            thresholds: ThresholdPolicy::default(),
            slippage: SlippagePolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), TaskError> {
        if self.connector.is_zero() {
            return Err(TaskError::InvalidConnector);
        }
        self.thresholds.validate()?;
        self.slippage.validate()
    }
}

/// Authorization-gated executor bound to a single connector
pub struct Task {
    /// Identity the vault authorizes this task under
    address: Address,

    vault: Arc<dyn Vault>,
    authorizer: Arc<dyn Authorizer>,

    /// Optional persistent mirror of emitted records
    records: Option<RecordStore>,

    /// Held across the whole read-validate-execute sequence
    config: Mutex<TaskConfig>,
}

impl Task {
    /// Create a task; the configuration is validated up front
    pub fn new(
        address: Address,
        config: TaskConfig,
        vault: Arc<dyn Vault>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self, TaskError> {
        config.validate()?;
        Ok(Self {
            address,
            vault,
            authorizer,
            records: None,
            config: Mutex::new(config),
        })
    }

    /// Mirror emitted records into `store`
    pub fn with_record_store(mut self, store: RecordStore) -> Self {
        self.records = Some(store);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Vault this task dispatches through
    pub fn vault_address(&self) -> Address {
        self.vault.address()
    }

    pub fn record_store(&self) -> Option<&RecordStore> {
        self.records.as_ref()
    }

    /// Validate the request and dispatch a join through the vault
    #[instrument(skip(self), fields(task = %self.address))]
    pub async fn call(
        &self,
        caller: Address,
        token: Address,
        amount: Amount,
        slippage: Slippage,
    ) -> Result<ExecutionRecord, TaskError> {
        match self.dispatch(caller, token, amount, slippage).await {
            Ok(record) => {
                info!(record_id = %record.id, connector = %record.connector, "Task executed");
                Ok(record)
            }
            Err(e) => {
                warn!(%caller, code = e.code(), error = %e, "Task call rejected");
                Err(e)
            }
        }
    }

    async fn dispatch(
        &self,
        caller: Address,
        token: Address,
        amount: Amount,
        slippage: Slippage,
    ) -> Result<ExecutionRecord, TaskError> {
        let config = self.config.lock().await;

        self.authorize(
            caller,
            CALL_SIGNATURE,
            &[token.into(), amount.into(), AuthArg::Uint(slippage.raw())],
        )?;

        if token.is_zero() {
            return Err(TaskError::InvalidToken);
        }
        if amount == 0 {
            return Err(TaskError::InvalidAmount);
        }

        config.thresholds.check(token, amount)?;
        config.slippage.check(token, slippage)?;

        let call = ConnectorCall::join(token, amount, slippage);
        debug!(
            vault = %self.vault.address(),
            connector = %config.connector,
            selector = %call.selector(),
            "Dispatching to vault"
        );

        let execution = self
            .vault
            .execute(self.address, config.connector, &call)
            .await?;

        let record = ExecutionRecord::new(
            self.address,
            execution.connector,
            call.selector(),
            execution.data,
            token,
            amount,
            slippage,
        );

        // Still under the config lock
        self.mirror(&record).await;
        drop(config);

        Ok(record)
    }

    /// The vault execution already happened; a store failure must not turn
    /// a completed call into a reported failure
    async fn mirror(&self, record: &ExecutionRecord) {
        if let Some(store) = &self.records {
            if let Err(e) = store.append(record).await {
                error!(record_id = %record.id, error = %e, "Failed to persist execution record");
            }
        }
    }

    fn authorize(&self, caller: Address, signature: &str, how: &[AuthArg]) -> Result<(), TaskError> {
        let what = Selector::from_signature(signature);
        if self.authorizer.is_authorized(caller, self.address, what, how) {
            Ok(())
        } else {
            Err(TaskError::Unauthorized { caller, what })
        }
    }

    // ------------------------------------------------------------------
    // Configuration surface
    // ------------------------------------------------------------------

    /// Rebind the task to another connector
    pub async fn set_connector(&self, caller: Address, connector: Address) -> Result<(), TaskError> {
        let mut config = self.config.lock().await;
        self.authorize(caller, SET_CONNECTOR_SIGNATURE, &[connector.into()])?;
        if connector.is_zero() {
            return Err(TaskError::InvalidConnector);
        }
        debug!(task = %self.address, %connector, "Connector set");
        config.connector = connector;
        Ok(())
    }

    pub async fn set_default_threshold(&self, caller: Address, threshold: Threshold) -> Result<(), TaskError> {
        let mut config = self.config.lock().await;
        self.authorize(
            caller,
            SET_DEFAULT_THRESHOLD_SIGNATURE,
            &[threshold.min.into(), threshold.max.into()],
        )?;
        config.thresholds.set_default(threshold)?;
        debug!(task = %self.address, min = %threshold.min, max = %threshold.max, "Default threshold set");
        Ok(())
    }

    pub async fn set_token_threshold(
        &self,
        caller: Address,
        token: Address,
        threshold: Threshold,
    ) -> Result<(), TaskError> {
        let mut config = self.config.lock().await;
        self.authorize(
            caller,
            SET_TOKEN_THRESHOLD_SIGNATURE,
            &[token.into(), threshold.min.into(), threshold.max.into()],
        )?;
        config.thresholds.set_custom(token, threshold)?;
        debug!(task = %self.address, %token, min = %threshold.min, max = %threshold.max, "Token threshold set");
        Ok(())
    }

    pub async fn clear_token_threshold(&self, caller: Address, token: Address) -> Result<(), TaskError> {
        let mut config = self.config.lock().await;
        self.authorize(caller, CLEAR_TOKEN_THRESHOLD_SIGNATURE, &[token.into()])?;
        config.thresholds.clear_custom(token);
        debug!(task = %self.address, %token, "Token threshold cleared");
        Ok(())
    }

    pub async fn set_default_max_slippage(&self, caller: Address, max: Slippage) -> Result<(), TaskError> {
        let mut config = self.config.lock().await;
        self.authorize(caller, SET_DEFAULT_MAX_SLIPPAGE_SIGNATURE, &[AuthArg::Uint(max.raw())])?;
        config.slippage.set_default(max)?;
        debug!(task = %self.address, %max, "Default max slippage set");
        Ok(())
    }

    pub async fn set_token_max_slippage(
        &self,
        caller: Address,
        token: Address,
        max: Slippage,
    ) -> Result<(), TaskError> {
        let mut config = self.config.lock().await;
        self.authorize(
            caller,
            SET_TOKEN_MAX_SLIPPAGE_SIGNATURE,
            &[token.into(), AuthArg::Uint(max.raw())],
        )?;
        config.slippage.set_custom(token, max)?;
        debug!(task = %self.address, %token, %max, "Token max slippage set");
        Ok(())
    }

    pub async fn clear_token_max_slippage(&self, caller: Address, token: Address) -> Result<(), TaskError> {
        let mut config = self.config.lock().await;
        self.authorize(caller, CLEAR_TOKEN_MAX_SLIPPAGE_SIGNATURE, &[token.into()])?;
        config.slippage.clear_custom(token);
        debug!(task = %self.address, %token, "Token max slippage cleared");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    pub async fn connector(&self) -> Address {
        self.config.lock().await.connector
    }

    pub async fn default_threshold(&self) -> Threshold {
        self.config.lock().await.thresholds.default
    }

    pub async fn default_max_slippage(&self) -> Slippage {
        self.config.lock().await.slippage.default_max
    }

    /// Effective threshold for `token`
    pub async fn threshold_for(&self, token: Address) -> Threshold {
        self.config.lock().await.thresholds.effective(token)
    }

    /// Effective max slippage for `token`
    pub async fn max_slippage_for(&self, token: Address) -> Slippage {
        self.config.lock().await.slippage.effective(token)
    }

    /// Snapshot of the full configuration
    pub async fn config(&self) -> TaskConfig {
        self.config.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{JoinConnector, SmartVault};
    use crate::core::authorizer::InMemoryAuthorizer;

    const OWNER: Address = Address::from_low_u8(1);
    const TASK: Address = Address::from_low_u8(2);
    const VAULT: Address = Address::from_low_u8(3);
    const CONNECTOR: Address = Address::from_low_u8(4);

    fn task() -> (Task, Arc<InMemoryAuthorizer>) {
        let authorizer = Arc::new(InMemoryAuthorizer::new());
        let vault = Arc::new(SmartVault::new(VAULT, authorizer.clone()));
        vault.register_connector(Arc::new(JoinConnector::new(CONNECTOR)));
        let task = Task::new(TASK, TaskConfig::new(CONNECTOR), vault, authorizer.clone()).unwrap();
        (task, authorizer)
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(
            TaskConfig::new(Address::ZERO).validate(),
            Err(TaskError::InvalidConnector)
        );
        assert!(TaskConfig::new(CONNECTOR).validate().is_ok());
    }

    #[test]
    fn test_config_yaml() {
        let yaml = r#"
connector: "0x0000000000000000000000000000000000000004"
thresholds:
  default: { min: 10, max: 0 }
  custom:
    "0x00000000000000000000000000000000000000aa": { min: 11, max: 100 }
slippage:
  default_max: 0.01
"#;
        let config: TaskConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.connector, CONNECTOR);
        assert_eq!(config.thresholds.default, Threshold::new(10, 0));
        assert_eq!(
            config.thresholds.effective(Address::from_low_u8(0xaa)),
            Threshold::new(11, 100)
        );
        assert_eq!(config.slippage.default_max, Slippage::from_fraction_str("0.01").unwrap());
        assert!(config.slippage.custom.is_empty());
    }

    #[tokio::test]
    async fn test_setters_require_their_own_permission() {
        let (task, authorizer) = task();

        let err = task
            .set_default_threshold(OWNER, Threshold::new(10, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AUTH_SENDER_NOT_ALLOWED");

        authorizer.authorize(
            OWNER,
            TASK,
            Selector::from_signature(SET_DEFAULT_THRESHOLD_SIGNATURE),
            vec![],
        );
        task.set_default_threshold(OWNER, Threshold::new(10, 0)).await.unwrap();
        assert_eq!(task.default_threshold().await, Threshold::new(10, 0));

        // Granting one setter does not grant another
        let err = task
            .set_default_max_slippage(OWNER, Slippage::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_set_connector() {
        let (task, authorizer) = task();
        authorizer.authorize(OWNER, TASK, Selector::from_signature(SET_CONNECTOR_SIGNATURE), vec![]);
        assert_eq!(task.vault_address(), VAULT);

        assert_eq!(
            task.set_connector(OWNER, Address::ZERO).await,
            Err(TaskError::InvalidConnector)
        );
        assert_eq!(task.connector().await, CONNECTOR);

        task.set_connector(OWNER, Address::from_low_u8(5)).await.unwrap();
        assert_eq!(task.connector().await, Address::from_low_u8(5));
    }
}
