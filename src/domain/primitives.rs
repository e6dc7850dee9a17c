//! Value types shared by tasks, vaults and connectors.
//!
//! Identities are 20-byte addresses rendered as `0x`-prefixed hex, amounts
//! are unsigned base units, and slippage is an 18-decimal fixed-point
//! fraction where `Slippage::ONE` is 100%.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Amount of a token in its base units
pub type Amount = u128;

/// Errors produced while parsing primitive values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Address must be 0x followed by 40 hex characters: {0}")]
    Address(String),

    #[error("Invalid slippage fraction: {0}")]
    Slippage(String),

    #[error("Selector must be 0x followed by 8 hex characters: {0}")]
    Selector(String),

    #[error("Argument must be an address or an unsigned integer: {0}")]
    Argument(String),
}

/// 20-byte identity of a principal, task, vault, connector or token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// The null identity
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Build an address whose last byte is `n` (handy for fixtures)
    pub const fn from_low_u8(n: u8) -> Self {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| ParseError::Address(s.to_string()))?;

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| ParseError::Address(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// Decimal places of the slippage fixed-point representation
pub const SLIPPAGE_DECIMALS: u32 = 18;

/// Fixed-point slippage fraction (18 decimals)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "SlippageRepr", into = "String")]
pub struct Slippage(u128);

impl Slippage {
    pub const ZERO: Slippage = Slippage(0);

    /// 100%
    pub const ONE: Slippage = Slippage(10u128.pow(SLIPPAGE_DECIMALS));

    /// Wrap a raw fixed-point value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Parse a decimal fraction such as `"0.01"` without going through floats
    pub fn from_fraction_str(s: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::Slippage(s.to_string());
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let (int_part, frac_part) = match trimmed.split_once('.') {
            Some((i, f)) => (i, f),
            None => (trimmed, ""),
        };

        let digits_ok = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if !digits_ok(int_part)
            || !digits_ok(frac_part)
            || (int_part.is_empty() && frac_part.is_empty())
            || frac_part.len() > SLIPPAGE_DECIMALS as usize
        {
            return Err(invalid());
        }

        let int_value: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };

        let mut frac_value: u128 = 0;
        if !frac_part.is_empty() {
            let padded = format!("{:0<width$}", frac_part, width = SLIPPAGE_DECIMALS as usize);
            frac_value = padded.parse().map_err(|_| invalid())?;
        }

        int_value
            .checked_mul(Self::ONE.0)
            .and_then(|v| v.checked_add(frac_value))
            .map(Self)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Slippage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int_part = self.0 / Self::ONE.0;
        let frac_part = self.0 % Self::ONE.0;
        if frac_part == 0 {
            return write!(f, "{}", int_part);
        }
        let frac = format!("{:0>width$}", frac_part, width = SLIPPAGE_DECIMALS as usize);
        write!(f, "{}.{}", int_part, frac.trim_end_matches('0'))
    }
}

impl FromStr for Slippage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fraction_str(s)
    }
}

impl From<Slippage> for String {
    fn from(slippage: Slippage) -> Self {
        slippage.to_string()
    }
}

/// YAML writes `0.01` as a float, JSON round-trips use strings
#[derive(Deserialize)]
#[serde(untagged)]
enum SlippageRepr {
    Text(String),
    Integer(u64),
    Float(f64),
}

impl TryFrom<SlippageRepr> for Slippage {
    type Error = ParseError;

    fn try_from(value: SlippageRepr) -> Result<Self, Self::Error> {
        match value {
            SlippageRepr::Text(s) => s.parse(),
            SlippageRepr::Integer(n) => Slippage::ONE
                .0
                .checked_mul(u128::from(n))
                .map(Slippage)
                .ok_or_else(|| ParseError::Slippage(n.to_string())),
            SlippageRepr::Float(f) => format!("{}", f).parse(),
        }
    }
}

/// 4-byte identity of an operation, derived from its signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector([u8; 4]);

impl Selector {
    /// First four bytes of the SHA-256 digest of the signature
    pub fn from_signature(signature: &str) -> Self {
        let digest = Sha256::digest(signature.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..4]);
        Self(bytes)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Selector {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| ParseError::Selector(s.to_string()))?;
        let mut bytes = [0u8; 4];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| ParseError::Selector(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Selector {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

/// Acceptable amount range for a token; `max == 0` means no upper bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Threshold {
    #[serde(default)]
    pub min: Amount,

    #[serde(default)]
    pub max: Amount,
}

impl Threshold {
    pub const fn new(min: Amount, max: Amount) -> Self {
        Self { min, max }
    }

    /// Whether the bounds are coherent (`min <= max` unless unbounded)
    pub fn is_valid(&self) -> bool {
        self.max == 0 || self.min <= self.max
    }

    /// The single place where "max of zero means unbounded" is interpreted
    pub fn contains(&self, amount: Amount) -> bool {
        amount >= self.min && (self.max == 0 || amount <= self.max)
    }
}
