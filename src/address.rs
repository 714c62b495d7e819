use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// 20-byte account or asset identifier, rendered as `0x`-prefixed lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected 20 bytes, got {0}")]
    Length(usize),
}

impl Address {
    /// The null identifier. Never a valid asset, receiver or signer.
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub const fn repeat_byte(byte: u8) -> Self {
        Address([byte; 20])
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| AddressError::Length(bytes.len()))?;
        Ok(Address(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let stripped = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(stripped)?;
        Address::from_slice(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_and_without_prefix() {
        let a: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
        let b: Address = "00000000000000000000000000000000000000AA".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes()[19], 0xaa);
    }

    #[test]
    fn display_is_prefixed_lowercase() {
        assert_eq!(
            Address::repeat_byte(0xAB).to_string(),
            "0xabababababababababababababababababababab"
        );
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!(
            "0x1234".parse::<Address>().unwrap_err(),
            AddressError::Length(2)
        );
        assert_eq!(
            "0xzz".parse::<Address>().unwrap_err(),
            AddressError::Hex(hex::FromHexError::InvalidHexCharacter { c: 'z', index: 0 })
        );
    }

    #[test]
    fn zero_is_default() {
        assert!(Address::default().is_zero());
        assert!(!Address::repeat_byte(1).is_zero());
    }

    #[test]
    fn serde_uses_hex_string() {
        let addr = Address::repeat_byte(0x01);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x0101010101010101010101010101010101010101\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
