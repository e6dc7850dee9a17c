//! Domain types for vault tasks.
//!
//! This module contains the core data structures:
//! - Primitives: addresses, amounts, slippage, selectors, thresholds
//! - Record: immutable completion records of executed calls

pub mod primitives;
pub mod record;

// Re-export commonly used types
pub use primitives::{Address, Amount, ParseError, Selector, Slippage, Threshold};
pub use record::ExecutionRecord;
