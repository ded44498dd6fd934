use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque caller identity on the ledger (hex string, case-insensitive).
///
/// Every account that can call into the system is identified by one of
/// these: the contract owner, airlines, passengers, oracles and the
/// rules engine itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Create a new address, normalizing to lowercase.
    pub fn new(addr: impl Into<String>) -> Self {
        Address(addr.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identity carries no characters at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Address::new(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address::new(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_normalization() {
        let addr = Address::new(" 0xABCDEF123456 ");
        assert_eq!(addr.as_str(), "0xabcdef123456");
        assert_eq!(addr, Address::from("0xabcdef123456"));
    }

    #[test]
    fn test_address_deserialization_normalizes() {
        let addr: Address = serde_json::from_str("\"0xDEAD\"").unwrap();
        assert_eq!(addr.as_str(), "0xdead");

        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0xdead\"");
    }

    #[test]
    fn test_empty_address() {
        assert!(Address::new("   ").is_empty());
        assert!(!Address::new("0x1").is_empty());
    }
}
