//! # Solidity ABI Codec
//!
//! A small ABI implementation: exactly the types the fund
//! contract and an ERC20 stablecoin put on the wire, and no more.
//!
//! ```text
//! mod.rs    : Token / ParamType, selectors, event topics, errors
//! encode.rs : head/tail encoding of call arguments
//! decode.rs : bounds-checked decoding of return data and log data
//! revert.rs : Error(string) / Panic(uint256) revert payloads
//! ```
//!
//! Supported types: `address`, `uintN`, `bool`, `string`, and dynamic
//! arrays `T[]` of any of those. Function returns with several outputs
//! (e.g. `members(address)`) decode as a flat list of tokens.

mod decode;
mod encode;
mod revert;

pub use decode::decode;
pub use encode::{encode, encode_call};
pub use revert::{decode_revert, panic_reason};

use primitive_types::U256;
use thiserror::Error;

use crate::types::{keccak256, Address};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while decoding ABI data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    /// A read past the end of the buffer, or an offset/length that cannot
    /// possibly fit in it.
    #[error("abi data out of bounds: need {needed} bytes at offset {offset}, have {available}")]
    OutOfBounds {
        /// Offset of the attempted read.
        offset: usize,
        /// Bytes the read needed.
        needed: usize,
        /// Total bytes in the buffer.
        available: usize,
    },

    /// A word that is not a canonical encoding of its declared type.
    #[error("invalid {ty} value: 0x{word}")]
    InvalidValue {
        /// Declared type name.
        ty: &'static str,
        /// The offending word, hex-encoded.
        word: String,
    },

    /// `string` data that is not UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// The decoded token did not have the type the caller expected.
    #[error("unexpected token: expected {expected}")]
    UnexpectedToken {
        /// What the caller wanted.
        expected: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Token / ParamType
// ---------------------------------------------------------------------------

/// A decoded (or to-be-encoded) ABI value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// `address`
    Address(Address),
    /// `uintN`, held at full width.
    Uint(U256),
    /// `bool`
    Bool(bool),
    /// `string`
    String(String),
    /// `T[]`
    Array(Vec<Token>),
}

impl Token {
    /// `true` for types encoded in the tail section.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Token::String(_) | Token::Array(_))
    }

    pub fn into_address(self) -> Option<Address> {
        match self {
            Token::Address(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_uint(self) -> Option<U256> {
        match self {
            Token::Uint(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_bool(self) -> Option<bool> {
        match self {
            Token::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Token::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Token>> {
        match self {
            Token::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// The declared type of an ABI value, used to drive decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// `address`
    Address,
    /// `uintN`; the width is enforced when decoding.
    Uint(usize),
    /// `bool`
    Bool,
    /// `string`
    String,
    /// `T[]`
    Array(Box<ParamType>),
}

impl ParamType {
    /// `true` for types encoded in the tail section.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ParamType::String | ParamType::Array(_))
    }
}

// ---------------------------------------------------------------------------
// Selectors & Topics
// ---------------------------------------------------------------------------

/// The 4-byte function selector for a canonical signature such as
/// `"deposit(uint256)"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// The `topic0` of an event with the given canonical signature.
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

/// Big-endian 32-byte encoding of a `U256`.
pub(crate) fn uint_word(value: &U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}
