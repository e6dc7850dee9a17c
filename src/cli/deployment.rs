//! In-process wiring of a configured task.
//!
//! Builds the authorizer, vault and join connector described by the config
//! file so the CLI can drive a task end to end. Authorizer and vault state
//! live only for the duration of the process; execution records persist in
//! the task's record store.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::adapters::{JoinConnector, SmartVault};
use crate::config::{ResolvedConfig, TaskSection};
use crate::core::{InMemoryAuthorizer, RecordStore, Task};
use crate::domain::Selector;

/// A task plus the collaborators it was wired to
pub struct Deployment {
    pub task: Task,
    pub vault: Arc<SmartVault>,
    pub connector: Arc<JoinConnector>,
    pub authorizer: Arc<InMemoryAuthorizer>,
}

impl Deployment {
    /// Wire the task described by `config`, mirroring records into its store
    pub async fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let section = config
            .task
            .as_ref()
            .context("No task configured (add a `task:` section to .vault-tasks/config.yaml)")?;

        let store = RecordStore::open_in(&config.tasks_dir(), section.address).await?;
        let deployment = Self::wire(section, config)?;

        Ok(Self {
            task: deployment.task.with_record_store(store),
            ..deployment
        })
    }

    /// Wire without a record store
    pub fn wire(section: &TaskSection, config: &ResolvedConfig) -> Result<Self> {
        let authorizer = Arc::new(InMemoryAuthorizer::new());
        for grant in &config.grants {
            authorizer.authorize(
                grant.who,
                grant.target,
                Selector::from_signature(&grant.what),
                grant.params.clone(),
            );
        }
        debug!(grants = config.grants.len(), "Authorizer loaded");

        let vault = Arc::new(SmartVault::new(section.vault, authorizer.clone()));
        let connector = Arc::new(JoinConnector::new(section.config.connector));
        vault.register_connector(connector.clone());

        let task = Task::new(
            section.address,
            section.config.clone(),
            vault.clone(),
            authorizer.clone(),
        )
        .map_err(|e| anyhow::anyhow!("Invalid task configuration: {} ({})", e, e.code()))?;

        Ok(Self {
            task,
            vault,
            connector,
            authorizer,
        })
    }
}
