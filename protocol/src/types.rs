//! # Core Chain Types
//!
//! [`Address`] and [`TxHash`] are thin newtypes over fixed byte arrays.
//! Keeping them as our own types (rather than raw `[u8; N]` or strings)
//! means comparisons are always byte-exact and every address that reaches
//! the wire has passed checksum validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Keccak-256 of arbitrary bytes. The EVM's one true hash.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while parsing addresses and hashes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseHexError {
    /// The string did not start with `0x`.
    #[error("missing 0x prefix")]
    MissingPrefix,

    /// Wrong number of hex digits after the prefix.
    #[error("expected {expected} hex digits, got {got}")]
    InvalidLength {
        /// Digits required.
        expected: usize,
        /// Digits supplied.
        got: usize,
    },

    /// A non-hex character was present.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Mixed-case input whose casing does not match its EIP-55 checksum.
    #[error("bad address checksum: {0}")]
    BadChecksum(String),
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseHexError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or(ParseHexError::MissingPrefix)?;
    if digits.len() != N * 2 {
        return Err(ParseHexError::InvalidLength {
            expected: N * 2,
            got: digits.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out)
        .map_err(|e| ParseHexError::InvalidHex(e.to_string()))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte EVM account or contract address.
///
/// Parsing follows the same rules wallets use: all-lowercase and
/// all-uppercase input is taken at face value, mixed-case input must carry
/// a valid EIP-55 checksum. `Display` always renders the checksummed form.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Wraps raw address bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 20 bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns `true` for the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Lowercase `0x`-prefixed hex, the form JSON-RPC endpoints expect.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// EIP-55 mixed-case checksum encoding.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Abbreviated form for tables: `0x1234...abcd`.
    pub fn short(&self) -> String {
        let full = self.to_checksum();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }

    /// Left-pads the address into a 32-byte ABI word.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// Extracts an address from a 32-byte ABI word.
    ///
    /// Returns `None` if any of the 12 padding bytes is non-zero, which
    /// means the word was not produced by an `address` encoder.
    pub fn from_word(word: &[u8; 32]) -> Option<Self> {
        if word[..12].iter().any(|b| *b != 0) {
            return None;
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Some(Self(bytes))
    }
}

impl FromStr for Address {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let address = Self(decode_fixed::<20>(s)?);

        let digits = &s[2..];
        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *digits {
            return Err(ParseHexError::BadChecksum(s.to_string()));
        }

        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// TxHash
// ---------------------------------------------------------------------------

/// A 32-byte transaction hash.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Wraps raw hash bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(decode_fixed::<32>(s.trim())?))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({}...)", &self.to_hex()[..14])
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference vectors from EIP-55.
    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn checksum_matches_reference_vectors() {
        for s in CHECKSUMMED {
            let addr: Address = s.to_lowercase().parse().unwrap();
            assert_eq!(addr.to_checksum(), s);
        }
    }

    #[test]
    fn mixed_case_with_valid_checksum_parses() {
        for s in CHECKSUMMED {
            assert!(s.parse::<Address>().is_ok(), "{s}");
        }
    }

    #[test]
    fn mixed_case_with_broken_checksum_rejected() {
        // Flip the case of one letter.
        let bad = "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
        assert!(matches!(
            bad.parse::<Address>(),
            Err(ParseHexError::BadChecksum(_))
        ));
    }

    #[test]
    fn uppercase_input_accepted() {
        let upper = "0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED";
        let addr: Address = upper.parse().unwrap();
        assert_eq!(addr.to_checksum(), CHECKSUMMED[0]);
    }

    #[test]
    fn bad_lengths_and_prefixes_rejected() {
        assert_eq!(
            "5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<Address>(),
            Err(ParseHexError::MissingPrefix)
        );
        assert!(matches!(
            "0x1234".parse::<Address>(),
            Err(ParseHexError::InvalidLength { expected: 40, got: 4 })
        ));
        assert!(matches!(
            "0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<Address>(),
            Err(ParseHexError::InvalidHex(_))
        ));
    }

    #[test]
    fn equality_ignores_input_case() {
        let a: Address = CHECKSUMMED[1].parse().unwrap();
        let b: Address = CHECKSUMMED[1].to_lowercase().parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn short_form() {
        let addr: Address = CHECKSUMMED[0].parse().unwrap();
        assert_eq!(addr.short(), "0x5aAe...eAed");
    }

    #[test]
    fn word_padding() {
        let addr: Address = CHECKSUMMED[2].parse().unwrap();
        let word = addr.to_word();
        assert!(word[..12].iter().all(|b| *b == 0));
        assert_eq!(Address::from_word(&word), Some(addr));

        let mut dirty = word;
        dirty[0] = 1;
        assert_eq!(Address::from_word(&dirty), None);
    }

    #[test]
    fn serde_uses_checksum_string() {
        let addr: Address = CHECKSUMMED[3].to_lowercase().parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", CHECKSUMMED[3]));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn tx_hash_hex() {
        let s = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";
        let hash: TxHash = s.parse().unwrap();
        assert_eq!(hash.to_string(), s);
        assert!("0x88df".parse::<TxHash>().is_err());
    }
}
