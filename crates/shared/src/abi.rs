//! Minimal ABI support for a fixed contract: function selectors, calldata for
//! the two call shapes the client uses (no arguments, or a single dynamic
//! string), and decoding of the mint event log.

use sha3::{Digest, Keccak256};

use crate::domain::{Address, TokenId};
use crate::error::DomainError;

const WORD: usize = 32;

fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Four-byte function selector for a canonical signature such as
/// `"mintDoodle(string)"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// The topic-0 hash identifying an event, e.g. `"DoodleMinted(address,uint256)"`.
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

/// Calldata for a call that takes no arguments.
pub fn encode_call(signature: &str) -> Vec<u8> {
    selector(signature).to_vec()
}

/// Calldata for a call whose single argument is a dynamic string: selector,
/// then the head word pointing at the tail, then length and right-padded
/// UTF-8 bytes.
pub fn encode_call_with_string(signature: &str, value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let padded_len = bytes.len().div_ceil(WORD) * WORD;
    let mut data = Vec::with_capacity(4 + WORD * 2 + padded_len);
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&uint_word(WORD as u64));
    data.extend_from_slice(&uint_word(bytes.len() as u64));
    data.extend_from_slice(bytes);
    data.resize(4 + WORD * 2 + padded_len, 0);
    data
}

fn uint_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Decodes a single 32-byte unsigned word into a `u64`, rejecting values that
/// would not fit.
pub fn decode_uint_word(word: &[u8]) -> Result<u64, DomainError> {
    if word.len() != WORD {
        return Err(DomainError::InvalidLog(format!(
            "expected a 32-byte word, got {} bytes",
            word.len()
        )));
    }
    if word[..24].iter().any(|b| *b != 0) {
        return Err(DomainError::ValueOutOfRange(format!(
            "uint256 word exceeds u64: 0x{}",
            hex::encode(word)
        )));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(tail))
}

/// Decodes a mint event log shaped `Event(address indexed minter, uint256
/// tokenId)`: the minter sits in topic 1, the token id is the single data
/// word.
pub fn decode_mint_log(topics: &[Vec<u8>], data: &[u8]) -> Result<(Address, TokenId), DomainError> {
    if topics.len() != 2 {
        return Err(DomainError::InvalidLog(format!(
            "expected 2 topics (signature + indexed minter), got {}",
            topics.len()
        )));
    }
    let minter = Address::from_word(&topics[1])?;
    let token_id = TokenId(decode_uint_word(data)?);
    Ok((minter, token_id))
}

/// `0x`-prefixed lowercase hex for a calldata or data payload.
pub fn to_hex_payload(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Parses a `0x`-prefixed hex payload, accepting the empty `0x` form some
/// nodes return for absent data.
pub fn from_hex_payload(payload: &str) -> Result<Vec<u8>, DomainError> {
    let digits = payload
        .strip_prefix("0x")
        .or_else(|| payload.strip_prefix("0X"))
        .ok_or_else(|| DomainError::InvalidLog(format!("missing 0x prefix: {payload}")))?;
    hex::decode(digits)
        .map_err(|err| DomainError::InvalidLog(format!("invalid hex payload {payload}: {err}")))
}
