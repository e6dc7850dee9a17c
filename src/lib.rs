//! vault-tasks - Authorization-gated task executor
//!
//! A task validates a requested operation against an ordered set of gates
//! and, if all of them pass, asks a vault to run the operation through the
//! connector the task is bound to.
//!
//! # Architecture
//!
//! - Authorization is an injected port; the task only sees a decision
//! - Threshold and slippage policies resolve per-token overrides against a
//!   default in one place each
//! - The task never performs the operation itself, it dispatches a
//!   capability-typed payload to the vault
//! - Each successful call yields an immutable execution record
//!
//! # Modules
//!
//! - `adapters`: Vault and connector interfaces plus in-process implementations
//! - `core`: Authorizer, policies, task executor, record store
//! - `domain`: Addresses, amounts, slippage, selectors, records
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Join with 10 units of a token at 1% slippage
//! vault-tasks call --token 0x...aa --amount 10 --slippage 0.01
//!
//! # Inspect effective policies
//! vault-tasks policy --token 0x...aa
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{Connector, ConnectorCall, JoinConnector, SmartVault, Vault, VaultError};
pub use self::core::{Authorizer, InMemoryAuthorizer, Task, TaskConfig, TaskError};
pub use domain::{Address, Amount, ExecutionRecord, Selector, Slippage, Threshold};
