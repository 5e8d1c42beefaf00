// Account / contract addresses, transaction hashes and block explorer links

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84532;
pub const BASE_MAINNET_CHAIN_ID: u64 = 8453;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("'{0}' is not a 0x-prefixed 20-byte hex address")]
    InvalidAddress(String),
    #[error("'{0}' is not a 0x-prefixed 32-byte transaction hash")]
    InvalidHash(String),
}

fn is_hex_of_len(value: &str, len: usize) -> bool {
    value
        .strip_prefix("0x")
        .map(|hex| hex.len() == len && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// 20-byte account or contract address, normalized to lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Address(String);

impl Address {
    pub fn zero() -> Self {
        Address(format!("0x{}", "0".repeat(40)))
    }

    pub fn is_zero(&self) -> bool {
        self.0[2..].chars().all(|c| c == '0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x1234...abcd` with `chars` hex digits kept on each side
    pub fn shorten(&self, chars: usize) -> String {
        format!("{}...{}", &self.0[..chars + 2], &self.0[self.0.len() - chars..])
    }
}

pub fn is_valid_address(value: &str) -> bool {
    is_hex_of_len(value, 40)
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !is_valid_address(s) {
            return Err(AddressError::InvalidAddress(s.to_string()));
        }
        Ok(Address(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 32-byte transaction hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TxHash(String);

impl TxHash {
    /// Deterministic hash derived from a sequence number (sandbox and tests)
    pub fn from_sequence(seq: u64) -> Self {
        TxHash(format!("0x{:064x}", seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x12345678...9abcdef0`: first `length` chars, last 8
    pub fn shorten(&self, length: usize) -> String {
        let length = length.min(self.0.len());
        format!("{}...{}", &self.0[..length], &self.0[self.0.len() - 8..])
    }
}

impl FromStr for TxHash {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !is_hex_of_len(s, 64) {
            return Err(AddressError::InvalidHash(s.to_string()));
        }
        Ok(TxHash(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for TxHash {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TxHash> for String {
    fn from(value: TxHash) -> Self {
        value.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Block explorer for a chain; unknown chains fall back to Base Sepolia
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explorer {
    base_url: &'static str,
}

impl Explorer {
    pub fn for_chain(chain_id: u64) -> Self {
        let base_url = match chain_id {
            BASE_MAINNET_CHAIN_ID => "https://basescan.org",
            _ => "https://sepolia.basescan.org",
        };
        Self { base_url }
    }

    pub fn tx_url(&self, hash: &TxHash) -> String {
        format!("{}/tx/{}", self.base_url, hash)
    }

    pub fn address_url(&self, address: &Address) -> String {
        format!("{}/address/{}", self.base_url, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x77c4a1cD22005b67Eb9CcEaE7E9577188d7Bca82";

    #[test]
    fn address_validation_and_shortening() {
        let addr: Address = ADDR.parse().unwrap();
        assert_eq!(addr.as_str(), ADDR.to_ascii_lowercase());
        assert_eq!(addr.shorten(4), "0x77c4...ca82");
        assert!(!addr.is_zero());
        assert!(Address::zero().is_zero());

        assert!("0x123".parse::<Address>().is_err());
        assert!("77c4a1cD22005b67Eb9CcEaE7E9577188d7Bca82".parse::<Address>().is_err());
        assert!("0xZZc4a1cD22005b67Eb9CcEaE7E9577188d7Bca82".parse::<Address>().is_err());
    }

    #[test]
    fn tx_hash_shortening() {
        let hash = TxHash::from_sequence(0xdeadbeef);
        assert_eq!(hash.as_str().len(), 66);
        assert_eq!(hash.shorten(10), "0x00000000...deadbeef");
        assert!(hash.as_str().parse::<TxHash>().is_ok());
        assert!("0xabc".parse::<TxHash>().is_err());
    }

    #[test]
    fn explorer_urls_per_chain() {
        let hash = TxHash::from_sequence(1);
        let sepolia = Explorer::for_chain(BASE_SEPOLIA_CHAIN_ID);
        assert!(sepolia.tx_url(&hash).starts_with("https://sepolia.basescan.org/tx/0x"));

        let mainnet = Explorer::for_chain(BASE_MAINNET_CHAIN_ID);
        let addr: Address = ADDR.parse().unwrap();
        assert_eq!(
            mainnet.address_url(&addr),
            format!("https://basescan.org/address/{}", addr)
        );

        assert_eq!(Explorer::for_chain(1), sepolia);
    }
}
