//! Core task logic.
//!
//! This module contains:
//! - Authorizer: the authorization port and an in-memory grant table
//! - Threshold / Slippage: per-token policies with a default fallback
//! - Task: the ordered-gate executor and its configuration surface
//! - RecordStore: append-only log of execution records

pub mod authorizer;
pub mod error;
pub mod record_store;
pub mod slippage;
pub mod task;
pub mod threshold;

// Re-export commonly used types
pub use authorizer::{AuthArg, AuthParam, Authorizer, InMemoryAuthorizer, Op, ANY_ADDRESS};
pub use error::TaskError;
pub use record_store::RecordStore;
pub use slippage::SlippagePolicy;
pub use task::{Task, TaskConfig};
pub use threshold::ThresholdPolicy;
