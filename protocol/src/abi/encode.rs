//! Head/tail encoding.
//!
//! Static values occupy one 32-byte head slot each. Dynamic values put an
//! offset (relative to the start of the enclosing tuple) in their head slot
//! and their length-prefixed body in the tail.

use primitive_types::U256;

use super::{selector, uint_word, Token};

/// Encodes a tuple of tokens.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * 32;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            let offset = U256::from(head_len + tail.len());
            head.extend_from_slice(&uint_word(&offset));
            tail.extend_from_slice(&encode_tail(token));
        } else {
            head.extend_from_slice(&static_word(token));
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Encodes a function call: selector followed by the argument tuple.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&encode(args));
    data
}

fn static_word(token: &Token) -> [u8; 32] {
    match token {
        Token::Address(a) => a.to_word(),
        Token::Uint(v) => uint_word(v),
        Token::Bool(b) => uint_word(&U256::from(*b as u8)),
        Token::String(_) | Token::Array(_) => unreachable!("dynamic token in static slot"),
    }
}

fn encode_tail(token: &Token) -> Vec<u8> {
    match token {
        Token::String(s) => {
            let bytes = s.as_bytes();
            let mut out = uint_word(&U256::from(bytes.len())).to_vec();
            out.extend_from_slice(bytes);
            let padding = (32 - bytes.len() % 32) % 32;
            out.resize(out.len() + padding, 0);
            out
        }
        Token::Array(items) => {
            let mut out = uint_word(&U256::from(items.len())).to_vec();
            out.extend_from_slice(&encode(items));
            out
        }
        _ => static_word(token).to_vec(),
    }
}
