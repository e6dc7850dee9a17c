//! Vault interface and an in-process smart vault.
//!
//! The vault is the component that actually runs connector calls. It has
//! its own authorization gate keyed on `(caller, connector)` and keeps an
//! `Executed` log of every call it forwarded successfully.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::{Connector, ConnectorCall, ConnectorReceipt};
use crate::core::authorizer::{AuthArg, Authorizer};
use crate::domain::{Address, Selector};

/// Signature of the vault's execute entry point
pub const EXECUTE_SIGNATURE: &str = "execute(address,bytes)";

/// Failures raised by the vault layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("Vault sender {caller} not allowed to execute connector {connector}")]
    SenderNotAllowed { caller: Address, connector: Address },

    #[error("Connector {0} is not bound to the vault")]
    UnknownConnector(Address),

    #[error("Connector {0} failed the registry check")]
    ConnectorNotAllowed(Address),

    #[error("Connector execution failed: {0}")]
    Connector(String),

    #[error("Failed to encode connector payload: {0}")]
    Encoding(String),
}

/// Entry of the vault's execution log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultExecution {
    /// Connector that was invoked
    pub connector: Address,

    /// Encoded payload the connector received
    pub data: String,

    /// What the connector reported back
    pub receipt: ConnectorReceipt,
}

/// Custody component that executes connector calls on behalf of tasks
#[async_trait]
pub trait Vault: Send + Sync {
    /// Identity tasks must be authorized against
    fn address(&self) -> Address;

    /// Run `call` through `connector` on behalf of `caller`
    async fn execute(
        &self,
        caller: Address,
        connector: Address,
        call: &ConnectorCall,
    ) -> Result<VaultExecution, VaultError>;
}

/// Registry state of a bound connector
#[derive(Debug, Clone, Copy, Default)]
struct ConnectorStatus {
    /// Connector is active in the registry
    active: bool,

    /// Registry check bypassed for this connector
    check_overridden: bool,
}

/// In-process vault backed by an [`Authorizer`]
pub struct SmartVault {
    address: Address,
    authorizer: Arc<dyn Authorizer>,
    connectors: RwLock<HashMap<Address, (Arc<dyn Connector>, ConnectorStatus)>>,
    executed: Mutex<Vec<VaultExecution>>,
}

impl SmartVault {
    /// Create a vault with no connectors bound
    pub fn new(address: Address, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            address,
            authorizer,
            connectors: RwLock::new(HashMap::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Bind a connector as an active registry entry
    pub fn register_connector(&self, connector: Arc<dyn Connector>) {
        let status = ConnectorStatus {
            active: true,
            check_overridden: false,
        };
        self.bind(connector, status);
    }

    /// Bind a connector that is not in the registry; it stays unusable
    /// until its check is overridden
    pub fn bind_connector(&self, connector: Arc<dyn Connector>) {
        self.bind(connector, ConnectorStatus::default());
    }

    fn bind(&self, connector: Arc<dyn Connector>, status: ConnectorStatus) {
        let address = connector.address();
        debug!(connector = %address, name = connector.name(), active = status.active, "Binding connector");
        let mut connectors = self.connectors.write().unwrap_or_else(|poisoned| {
            warn!(connector = %address, "Connector table lock poisoned, recovering");
            poisoned.into_inner()
        });
        connectors.insert(address, (connector, status));
    }

    /// Mark a bound connector as active or deprecated in the registry
    pub fn set_registry_active(&self, connector: Address, active: bool) -> Result<(), VaultError> {
        self.update_status(connector, |status| status.active = active)
    }

    /// Bypass (or restore) the registry check for a bound connector
    pub fn override_connector_check(&self, connector: Address, ignore: bool) -> Result<(), VaultError> {
        self.update_status(connector, |status| status.check_overridden = ignore)
    }

    fn update_status(
        &self,
        connector: Address,
        update: impl FnOnce(&mut ConnectorStatus),
    ) -> Result<(), VaultError> {
        let mut connectors = self
            .connectors
            .write()
            .map_err(|_| VaultError::Connector("connector table poisoned".to_string()))?;
        let (_, status) = connectors
            .get_mut(&connector)
            .ok_or(VaultError::UnknownConnector(connector))?;
        update(status);
        Ok(())
    }

    /// Successful executions in order
    pub fn executed(&self) -> Vec<VaultExecution> {
        self.execution_log().clone()
    }

    // Entries are only ever pushed whole, so a poisoned log is recovered
    fn execution_log(&self) -> MutexGuard<'_, Vec<VaultExecution>> {
        self.executed.lock().unwrap_or_else(|poisoned| {
            warn!(vault = %self.address, "Execution log lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn resolve(&self, connector: Address) -> Result<Arc<dyn Connector>, VaultError> {
        let connectors = self
            .connectors
            .read()
            .map_err(|_| VaultError::Connector("connector table poisoned".to_string()))?;
        let (bound, status) = connectors
            .get(&connector)
            .ok_or(VaultError::UnknownConnector(connector))?;

        if !(status.active || status.check_overridden) {
            return Err(VaultError::ConnectorNotAllowed(connector));
        }
        Ok(Arc::clone(bound))
    }
}

#[async_trait]
impl Vault for SmartVault {
    fn address(&self) -> Address {
        self.address
    }

    #[instrument(skip(self, call), fields(vault = %self.address))]
    async fn execute(
        &self,
        caller: Address,
        connector: Address,
        call: &ConnectorCall,
    ) -> Result<VaultExecution, VaultError> {
        let what = Selector::from_signature(EXECUTE_SIGNATURE);
        if !self
            .authorizer
            .is_authorized(caller, self.address, what, &[AuthArg::Address(connector)])
        {
            warn!(%caller, %connector, "Vault execution not allowed");
            return Err(VaultError::SenderNotAllowed { caller, connector });
        }

        let bound = self.resolve(connector)?;
        let data = call
            .encode()
            .map_err(|e| VaultError::Encoding(e.to_string()))?;

        let receipt = bound
            .execute(call)
            .await
            .map_err(|e| VaultError::Connector(e.to_string()))?;

        let execution = VaultExecution {
            connector,
            data,
            receipt,
        };

        // The connector already ran; logging must not turn that into a failure
        self.execution_log().push(execution.clone());

        info!(%caller, %connector, "Executed");
        Ok(execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::JoinConnector;
    use crate::core::authorizer::{AuthParam, InMemoryAuthorizer, Op};
    use crate::domain::Slippage;

    const TASK: Address = Address::from_low_u8(1);
    const VAULT: Address = Address::from_low_u8(2);
    const CONNECTOR: Address = Address::from_low_u8(3);

    fn setup() -> (Arc<InMemoryAuthorizer>, SmartVault, Arc<JoinConnector>) {
        let authorizer = Arc::new(InMemoryAuthorizer::new());
        let vault = SmartVault::new(VAULT, authorizer.clone());
        let connector = Arc::new(JoinConnector::new(CONNECTOR));
        vault.bind_connector(connector.clone());
        (authorizer, vault, connector)
    }

    fn grant_execute(authorizer: &InMemoryAuthorizer) {
        authorizer.authorize(
            TASK,
            VAULT,
            Selector::from_signature(EXECUTE_SIGNATURE),
            vec![AuthParam::new(Op::Eq, CONNECTOR)],
        );
    }

    fn call() -> ConnectorCall {
        ConnectorCall::join(Address::from_low_u8(9), 10, Slippage::ZERO)
    }

    #[tokio::test]
    async fn test_unauthorized_caller_is_rejected() {
        let (_, vault, connector) = setup();
        vault.override_connector_check(CONNECTOR, true).unwrap();

        let err = vault.execute(TASK, CONNECTOR, &call()).await.unwrap_err();
        assert!(matches!(err, VaultError::SenderNotAllowed { .. }));
        assert!(connector.receipts().is_empty());
        assert!(vault.executed().is_empty());
    }

    #[tokio::test]
    async fn test_registry_check_requires_override() {
        let (authorizer, vault, _) = setup();
        grant_execute(&authorizer);

        let err = vault.execute(TASK, CONNECTOR, &call()).await.unwrap_err();
        assert_eq!(err, VaultError::ConnectorNotAllowed(CONNECTOR));

        vault.override_connector_check(CONNECTOR, true).unwrap();
        assert!(vault.execute(TASK, CONNECTOR, &call()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_connector() {
        let (authorizer, vault, _) = setup();
        let other = Address::from_low_u8(4);
        authorizer.authorize(TASK, VAULT, Selector::from_signature(EXECUTE_SIGNATURE), vec![]);

        let err = vault.execute(TASK, other, &call()).await.unwrap_err();
        assert_eq!(err, VaultError::UnknownConnector(other));
        assert!(vault.override_connector_check(other, true).is_err());
    }

    #[tokio::test]
    async fn test_execution_is_logged() {
        let (authorizer, vault, connector) = setup();
        grant_execute(&authorizer);
        vault.set_registry_active(CONNECTOR, true).unwrap();

        let execution = vault.execute(TASK, CONNECTOR, &call()).await.unwrap();
        assert_eq!(execution.connector, CONNECTOR);
        assert_eq!(execution.data, call().encode().unwrap());
        assert_eq!(vault.executed(), vec![execution]);
        assert_eq!(connector.receipts().len(), 1);
    }

    #[tokio::test]
    async fn test_connector_failure_is_not_logged() {
        let (authorizer, vault, connector) = setup();
        grant_execute(&authorizer);
        vault.override_connector_check(CONNECTOR, true).unwrap();
        connector.set_failure(Some("pool paused".to_string()));

        let err = vault.execute(TASK, CONNECTOR, &call()).await.unwrap_err();
        assert!(matches!(err, VaultError::Connector(ref msg) if msg.contains("pool paused")));
        assert!(vault.executed().is_empty());
    }

    #[tokio::test]
    async fn test_poisoned_log_does_not_fail_completed_execution() {
        let (authorizer, vault, connector) = setup();
        grant_execute(&authorizer);
        vault.override_connector_check(CONNECTOR, true).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = vault.executed.lock().unwrap();
            panic!("log writer died");
        }));
        assert!(result.is_err());

        let execution = vault.execute(TASK, CONNECTOR, &call()).await.unwrap();
        assert_eq!(connector.receipts().len(), 1);
        assert_eq!(vault.executed(), vec![execution]);
    }
}
