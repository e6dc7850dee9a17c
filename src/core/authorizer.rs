//! Authorization port consumed by tasks and vaults.
//!
//! Policy storage and evaluation live behind the [`Authorizer`] trait so the
//! task core only ever sees a yes/no decision. Decisions are keyed on the
//! exact operation selector and may be narrowed by positional predicates
//! over the call arguments.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Address, Amount, ParseError, Selector};

/// Wildcard principal/target accepted by [`InMemoryAuthorizer`]
pub const ANY_ADDRESS: Address = Address::new([0xff; 20]);

/// A single call argument as seen by the authorizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AuthArg {
    Address(Address),
    Uint(Amount),
}

impl fmt::Display for AuthArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "{}", address),
            Self::Uint(value) => write!(f, "{}", value),
        }
    }
}

impl FromStr for AuthArg {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("0x") {
            return s.parse().map(Self::Address);
        }
        s.parse()
            .map(Self::Uint)
            .map_err(|_| ParseError::Argument(s.to_string()))
    }
}

impl TryFrom<String> for AuthArg {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AuthArg> for String {
    fn from(arg: AuthArg) -> Self {
        arg.to_string()
    }
}

impl From<Address> for AuthArg {
    fn from(address: Address) -> Self {
        Self::Address(address)
    }
}

impl From<Amount> for AuthArg {
    fn from(value: Amount) -> Self {
        Self::Uint(value)
    }
}

/// Comparison applied between a call argument and a grant's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Matches any argument
    #[default]
    None,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// Positional predicate over a call argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParam {
    #[serde(default)]
    pub op: Op,
    pub value: AuthArg,
}

impl AuthParam {
    pub fn new(op: Op, value: impl Into<AuthArg>) -> Self {
        Self {
            op,
            value: value.into(),
        }
    }

    /// Evaluate the predicate; arguments of a different kind never match
    pub fn matches(&self, arg: &AuthArg) -> bool {
        if self.op == Op::None {
            return true;
        }

        let ordering = match (arg, &self.value) {
            (AuthArg::Address(a), AuthArg::Address(b)) => a.cmp(b),
            (AuthArg::Uint(a), AuthArg::Uint(b)) => a.cmp(b),
            _ => return false,
        };

        match self.op {
            Op::None => true,
            Op::Eq => ordering.is_eq(),
            Op::Neq => ordering.is_ne(),
            Op::Lt => ordering.is_lt(),
            Op::Lte => ordering.is_le(),
            Op::Gt => ordering.is_gt(),
            Op::Gte => ordering.is_ge(),
        }
    }
}

/// Read-only policy decision: may `who` invoke `what` on `where_` with `how`?
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, who: Address, where_: Address, what: Selector, how: &[AuthArg]) -> bool;
}

type GrantTable = HashMap<(Address, Address, Selector), Vec<AuthParam>>;

/// Grant table keyed by (principal, target, selector)
#[derive(Debug, Default)]
pub struct InMemoryAuthorizer {
    grants: RwLock<GrantTable>,
}

impl InMemoryAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `who` permission to call `what` on `where_`, narrowed by `params`
    pub fn authorize(&self, who: Address, where_: Address, what: Selector, params: Vec<AuthParam>) {
        debug!(%who, target = %where_, %what, params = params.len(), "Granting permission");
        self.write_grants().insert((who, where_, what), params);
    }

    /// Revoke a previously granted permission
    pub fn unauthorize(&self, who: Address, where_: Address, what: Selector) {
        debug!(%who, target = %where_, %what, "Revoking permission");
        self.write_grants().remove(&(who, where_, what));
    }

    // Every critical section is a single map operation, so a poisoned
    // table is still consistent and is recovered rather than dropped.
    fn read_grants(&self) -> RwLockReadGuard<'_, GrantTable> {
        self.grants.read().unwrap_or_else(|poisoned| {
            warn!("Grant table lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_grants(&self) -> RwLockWriteGuard<'_, GrantTable> {
        self.grants.write().unwrap_or_else(|poisoned| {
            warn!("Grant table lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn grant_matches(params: &[AuthParam], how: &[AuthArg]) -> bool {
        if params.len() > how.len() {
            return false;
        }
        params.iter().zip(how).all(|(param, arg)| param.matches(arg))
    }
}

impl Authorizer for InMemoryAuthorizer {
    fn is_authorized(&self, who: Address, where_: Address, what: Selector, how: &[AuthArg]) -> bool {
        let grants = self.read_grants();

        [
            (who, where_),
            (ANY_ADDRESS, where_),
            (who, ANY_ADDRESS),
            (ANY_ADDRESS, ANY_ADDRESS),
        ]
        .iter()
        .filter_map(|(w, t)| grants.get(&(*w, *t, what)))
        .any(|params| Self::grant_matches(params, how))
    }
}
