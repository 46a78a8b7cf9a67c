use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DomainError;

/// A 20-byte account or contract address, rendered as lowercase `0x…` hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Reads an address out of a 32-byte ABI word (left-padded with zeros).
    pub fn from_word(word: &[u8]) -> Result<Self, DomainError> {
        if word.len() != 32 {
            return Err(DomainError::InvalidAddress(format!(
                "expected a 32-byte word, got {} bytes",
                word.len()
            )));
        }
        if word[..12].iter().any(|b| *b != 0) {
            return Err(DomainError::InvalidAddress(
                "address word has non-zero padding".to_string(),
            ));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| DomainError::InvalidAddress(format!("missing 0x prefix: {s}")))?;
        let raw = hex::decode(digits)
            .map_err(|err| DomainError::InvalidAddress(format!("invalid hex in {s}: {err}")))?;
        let bytes: [u8; 20] = raw
            .try_into()
            .map_err(|_| DomainError::InvalidAddress(format!("expected 20 bytes: {s}")))?;
        Ok(Self(bytes))
    }
}

/// A 32-byte transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| DomainError::InvalidHash(format!("missing 0x prefix: {s}")))?;
        let raw = hex::decode(digits)
            .map_err(|err| DomainError::InvalidHash(format!("invalid hex in {s}: {err}")))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| DomainError::InvalidHash(format!("expected 32 bytes: {s}")))?;
        Ok(Self(bytes))
    }
}

/// Identifier of the network the wallet is currently on, as reported by
/// `eth_chainId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl FromStr for ChainId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(parse_quantity(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockNumber(pub u64);

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl FromStr for BlockNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(parse_quantity(s)?))
    }
}

/// Parses a JSON-RPC quantity (`0x`-prefixed, no leading zeros required).
pub fn parse_quantity(s: &str) -> Result<u64, DomainError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| DomainError::InvalidQuantity(format!("missing 0x prefix: {s}")))?;
    if digits.is_empty() {
        return Err(DomainError::InvalidQuantity(format!("empty quantity: {s}")));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|err| DomainError::InvalidQuantity(format!("invalid quantity {s}: {err}")))
}

pub fn format_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

macro_rules! string_serde {
    ($name:ident) => {
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }
    };
}

string_serde!(Address);
string_serde!(TxHash);
string_serde!(ChainId);
string_serde!(BlockNumber);
