//! Bounds-checked decoding.
//!
//! Return data comes from a remote node we do not control, so every offset
//! and length is checked against the buffer before it is followed.

use primitive_types::U256;

use super::{AbiError, ParamType, Token};
use crate::types::Address;

/// Decodes a tuple of values with the given types.
///
/// # Errors
///
/// Returns [`AbiError`] if the data is truncated, an offset points outside
/// the buffer, or a value is not canonically encoded for its type.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    decode_tuple(types, data, 0)
}

fn decode_tuple(types: &[ParamType], data: &[u8], base: usize) -> Result<Vec<Token>, AbiError> {
    let mut tokens = Vec::with_capacity(types.len());

    for (i, ty) in types.iter().enumerate() {
        let slot = base + i * 32;
        let word = read_word(data, slot)?;
        let token = if ty.is_dynamic() {
            let offset = word_to_usize(&word, data.len())?;
            decode_dynamic(ty, data, base + offset)?
        } else {
            decode_static(ty, &word)?
        };
        tokens.push(token);
    }

    Ok(tokens)
}

fn decode_dynamic(ty: &ParamType, data: &[u8], pos: usize) -> Result<Token, AbiError> {
    let len = word_to_usize(&read_word(data, pos)?, data.len())?;
    let body = pos + 32;

    match ty {
        ParamType::String => {
            let bytes = read_slice(data, body, len)?;
            let s = std::str::from_utf8(bytes).map_err(|_| AbiError::InvalidUtf8)?;
            Ok(Token::String(s.to_string()))
        }
        ParamType::Array(inner) => {
            // Every element needs at least one head word.
            read_slice(data, body, len.saturating_mul(32))?;
            let types = vec![(**inner).clone(); len];
            Ok(Token::Array(decode_tuple(&types, data, body)?))
        }
        _ => unreachable!("static type in dynamic slot"),
    }
}

fn decode_static(ty: &ParamType, word: &[u8; 32]) -> Result<Token, AbiError> {
    match ty {
        ParamType::Address => Address::from_word(word)
            .map(Token::Address)
            .ok_or_else(|| invalid("address", word)),
        ParamType::Uint(bits) => {
            let value = U256::from_big_endian(word);
            if *bits < 256 && value.bits() > *bits {
                return Err(invalid("uint", word));
            }
            Ok(Token::Uint(value))
        }
        ParamType::Bool => match U256::from_big_endian(word) {
            v if v.is_zero() => Ok(Token::Bool(false)),
            v if v == U256::one() => Ok(Token::Bool(true)),
            _ => Err(invalid("bool", word)),
        },
        ParamType::String | ParamType::Array(_) => unreachable!("dynamic type in static slot"),
    }
}

fn invalid(ty: &'static str, word: &[u8; 32]) -> AbiError {
    AbiError::InvalidValue {
        ty,
        word: hex::encode(word),
    }
}

fn read_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], AbiError> {
    offset
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .map(|end| &data[offset..end])
        .ok_or(AbiError::OutOfBounds {
            offset,
            needed: len,
            available: data.len(),
        })
}

fn read_word(data: &[u8], offset: usize) -> Result<[u8; 32], AbiError> {
    let mut word = [0u8; 32];
    word.copy_from_slice(read_slice(data, offset, 32)?);
    Ok(word)
}

/// Interprets a word as an offset or length. Anything larger than the buffer
/// itself cannot be valid, which also keeps the `usize` conversion safe.
fn word_to_usize(word: &[u8; 32], available: usize) -> Result<usize, AbiError> {
    let value = U256::from_big_endian(word);
    if value > U256::from(available) {
        return Err(AbiError::OutOfBounds {
            offset: 0,
            needed: usize::MAX,
            available,
        });
    }
    Ok(value.low_u64() as usize)
}
