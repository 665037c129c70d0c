//! Revert payload decoding.
//!
//! When a call reverts, nodes return the revert data alongside the JSON-RPC
//! error. `require(cond, "message")` produces `Error(string)`; compiler
//! checks (overflow, division by zero, ...) produce `Panic(uint256)`.

use primitive_types::U256;

use super::{decode, ParamType, Token};

const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Extracts a human-readable reason from revert data.
///
/// Returns `None` for empty data, custom errors, or anything that fails to
/// decode.
pub fn decode_revert(data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }
    let (sel, body) = data.split_at(4);

    if sel == ERROR_STRING_SELECTOR {
        return decode(&[ParamType::String], body)
            .ok()?
            .pop()
            .and_then(Token::into_string);
    }

    if sel == PANIC_SELECTOR {
        let code = decode(&[ParamType::Uint(256)], body)
            .ok()?
            .pop()
            .and_then(Token::into_uint)?;
        return Some(format!("panic: {}", panic_reason(code)));
    }

    None
}

/// Describes a Solidity panic code.
pub fn panic_reason(code: U256) -> String {
    let text = match code.low_u64() {
        _ if code > U256::from(u64::MAX) => "unknown panic code",
        0x00 => "generic compiler panic",
        0x01 => "assertion failed",
        0x11 => "arithmetic overflow or underflow",
        0x12 => "division or modulo by zero",
        0x21 => "invalid enum value",
        0x22 => "corrupted storage byte array",
        0x31 => "pop on empty array",
        0x32 => "array index out of bounds",
        0x41 => "out of memory",
        0x51 => "call to zero-initialized function",
        _ => "unknown panic code",
    };
    format!("{} (0x{:x})", text, code)
}
