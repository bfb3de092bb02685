//! Subset of the Solidity ABI used by the fine contract.
//!
//! Head/tail encoding over 32-byte words. Unsigned integers are carried as
//! `u128`; a word whose upper 16 bytes are non-zero fails to decode.

use crate::errors::{MultaError, Result};
use crate::fine::LedgerAddress;
use sha3::{Digest, Keccak256};

const WORD: usize = 32;

/// Selector of the standard `Error(string)` revert payload.
pub const REVERT_ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Keccak-256 digest.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// First four bytes of the keccak digest of a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// ABI parameter type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// `uint8` .. `uint256`
    Uint,
    /// `address`
    Address,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// `T[]`
    Array(Box<ParamType>),
    /// `(T1, T2, ...)`
    Tuple(Vec<ParamType>),
}

impl ParamType {
    fn is_dynamic(&self) -> bool {
        match self {
            Self::String | Self::Array(_) => true,
            Self::Tuple(types) => types.iter().any(Self::is_dynamic),
            _ => false,
        }
    }

    fn head_len(&self) -> usize {
        match self {
            Self::Tuple(types) if !self.is_dynamic() => types.iter().map(Self::head_len).sum(),
            _ => WORD,
        }
    }
}

/// ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Unsigned integer
    Uint(u128),
    /// Account address
    Address(LedgerAddress),
    /// Boolean
    Bool(bool),
    /// UTF-8 string
    String(String),
    /// Dynamic array
    Array(Vec<Token>),
    /// Tuple / struct
    Tuple(Vec<Token>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        match self {
            Self::String(_) | Self::Array(_) => true,
            Self::Tuple(tokens) => tokens.iter().any(Self::is_dynamic),
            _ => false,
        }
    }

    fn head_len(&self) -> usize {
        match self {
            Self::Tuple(tokens) if !self.is_dynamic() => tokens.iter().map(Self::head_len).sum(),
            _ => WORD,
        }
    }

    /// Unwrap an unsigned integer.
    pub fn into_uint(self) -> Result<u128> {
        match self {
            Self::Uint(v) => Ok(v),
            other => Err(unexpected("uint", &other)),
        }
    }

    /// Unwrap an address.
    pub fn into_address(self) -> Result<LedgerAddress> {
        match self {
            Self::Address(a) => Ok(a),
            other => Err(unexpected("address", &other)),
        }
    }

    /// Unwrap a string.
    pub fn into_string(self) -> Result<String> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(unexpected("string", &other)),
        }
    }

    /// Unwrap an array.
    pub fn into_array(self) -> Result<Vec<Token>> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(unexpected("array", &other)),
        }
    }

    /// Unwrap a tuple.
    pub fn into_tuple(self) -> Result<Vec<Token>> {
        match self {
            Self::Tuple(items) => Ok(items),
            other => Err(unexpected("tuple", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &Token) -> MultaError {
    MultaError::serialization(format!("ABI: expected {expected}, got {got:?}"))
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn usize_word(value: usize) -> [u8; WORD] {
    uint_word(value as u128)
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

/// Encode a parameter list (an implicit tuple).
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let heads_len: usize = tokens.iter().map(Token::head_len).sum();
    let mut head = Vec::with_capacity(heads_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&usize_word(heads_len + tail.len()));
            encode_dynamic(token, &mut tail);
        } else {
            encode_static(token, &mut head);
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Encode a call: selector followed by the encoded arguments.
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&encode(tokens));
    data
}

fn encode_static(token: &Token, out: &mut Vec<u8>) {
    match token {
        Token::Uint(v) => out.extend_from_slice(&uint_word(*v)),
        Token::Bool(b) => out.extend_from_slice(&uint_word(u128::from(*b))),
        Token::Address(a) => {
            out.extend_from_slice(&[0u8; 12]);
            out.extend_from_slice(&a.0);
        }
        Token::Tuple(tokens) => tokens.iter().for_each(|t| encode_static(t, out)),
        Token::String(_) | Token::Array(_) => encode_dynamic(token, out),
    }
}

fn encode_dynamic(token: &Token, out: &mut Vec<u8>) {
    match token {
        Token::String(s) => {
            let bytes = s.as_bytes();
            out.extend_from_slice(&usize_word(bytes.len()));
            out.extend_from_slice(bytes);
            out.resize(out.len() + padded_len(bytes.len()) - bytes.len(), 0);
        }
        Token::Array(items) => {
            out.extend_from_slice(&usize_word(items.len()));
            out.extend_from_slice(&encode(items));
        }
        Token::Tuple(items) => out.extend_from_slice(&encode(items)),
        _ => encode_static(token, out),
    }
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8]> {
    data.get(at..at + WORD)
        .ok_or_else(|| MultaError::serialization(format!("ABI: data too short at offset {at}")))
}

fn read_uint(data: &[u8], at: usize) -> Result<u128> {
    let word = read_word(data, at)?;
    if word[..16].iter().any(|b| *b != 0) {
        return Err(MultaError::serialization(format!(
            "ABI: integer at offset {at} exceeds 128 bits"
        )));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

fn read_usize(data: &[u8], at: usize) -> Result<usize> {
    let value = read_uint(data, at)?;
    usize::try_from(value)
        .ok()
        .filter(|v| *v <= data.len())
        .ok_or_else(|| MultaError::serialization(format!("ABI: offset/length {value} out of range")))
}

/// Decode a parameter list (an implicit tuple).
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>> {
    decode_tuple(types, data, 0)
}

fn decode_tuple(types: &[ParamType], data: &[u8], base: usize) -> Result<Vec<Token>> {
    let mut offset = base;
    let mut tokens = Vec::with_capacity(types.len());

    for ty in types {
        if ty.is_dynamic() {
            let relative = read_usize(data, offset)?;
            tokens.push(decode_dynamic(ty, data, base + relative)?);
        } else {
            tokens.push(decode_static(ty, data, offset)?);
        }
        offset += ty.head_len();
    }

    Ok(tokens)
}

fn decode_static(ty: &ParamType, data: &[u8], at: usize) -> Result<Token> {
    match ty {
        ParamType::Uint => read_uint(data, at).map(Token::Uint),
        ParamType::Bool => Ok(Token::Bool(read_uint(data, at)? != 0)),
        ParamType::Address => {
            let word = read_word(data, at)?;
            let mut address = [0u8; 20];
            address.copy_from_slice(&word[12..]);
            Ok(Token::Address(LedgerAddress(address)))
        }
        ParamType::Tuple(types) => decode_tuple(types, data, at).map(Token::Tuple),
        ParamType::String | ParamType::Array(_) => decode_dynamic(ty, data, at),
    }
}

fn decode_dynamic(ty: &ParamType, data: &[u8], at: usize) -> Result<Token> {
    match ty {
        ParamType::String => {
            let len = read_usize(data, at)?;
            let bytes = data
                .get(at + WORD..at + WORD + len)
                .ok_or_else(|| MultaError::serialization("ABI: string runs past end of data"))?;
            String::from_utf8(bytes.to_vec())
                .map(Token::String)
                .map_err(|e| MultaError::serialization(format!("ABI: invalid UTF-8 string: {e}")))
        }
        ParamType::Array(inner) => {
            let len = read_usize(data, at)?;
            // each element needs at least one word
            if len > data.len() / WORD {
                return Err(MultaError::serialization(format!(
                    "ABI: array length {len} exceeds data"
                )));
            }
            let types = vec![(**inner).clone(); len];
            decode_tuple(&types, data, at + WORD).map(Token::Array)
        }
        ParamType::Tuple(types) => decode_tuple(types, data, at).map(Token::Tuple),
        _ => decode_static(ty, data, at),
    }
}

/// Extract the reason string from an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&REVERT_ERROR_SELECTOR[..])?;
    decode(&[ParamType::String], payload)
        .ok()?
        .pop()?
        .into_string()
        .ok()
}

/// Build an `Error(string)` revert payload.
pub fn encode_revert_reason(reason: &str) -> Vec<u8> {
    let mut data = REVERT_ERROR_SELECTOR.to_vec();
    data.extend_from_slice(&encode(&[Token::String(reason.to_string())]));
    data
}
