//! Base58Check addresses.
//!
//! `address = base58(version || ripemd160(sha256(pubkey)) || checksum)` where
//! `checksum` is the first four bytes of `sha256(sha256(version || hash))`.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::{LedgerError, Result};

pub const ADDRESS_VERSION: u8 = 0x00;
pub const CHECKSUM_LEN: usize = 4;
pub const PUBKEY_HASH_LEN: usize = 20;

/// RIPEMD-160 of SHA-256 of a serialized public key.
pub type PubKeyHash = [u8; PUBKEY_HASH_LEN];

pub fn hash_pubkey(pubkey: &[u8]) -> PubKeyHash {
    let sha = Sha256::digest(pubkey);
    Ripemd160::digest(sha).into()
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let second = Sha256::digest(Sha256::digest(payload));
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

pub fn encode_address(pubkey_hash: &PubKeyHash) -> String {
    let mut payload = Vec::with_capacity(1 + PUBKEY_HASH_LEN + CHECKSUM_LEN);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(pubkey_hash);
    let sum = checksum(&payload);
    payload.extend_from_slice(&sum);
    bs58::encode(payload).into_string()
}

/// Decode an address back to its public-key hash, rejecting bad base58,
/// wrong length, unknown version and checksum mismatch.
pub fn decode_address(address: &str) -> Result<PubKeyHash> {
    let raw = bs58::decode(address)
        .into_vec()
        .map_err(|e| LedgerError::InvalidAddress(format!("{address:?}: {e}")))?;
    if raw.len() != 1 + PUBKEY_HASH_LEN + CHECKSUM_LEN {
        return Err(LedgerError::InvalidAddress(format!(
            "{address:?}: expected {} bytes, got {}",
            1 + PUBKEY_HASH_LEN + CHECKSUM_LEN,
            raw.len()
        )));
    }
    let (payload, sum) = raw.split_at(1 + PUBKEY_HASH_LEN);
    if payload[0] != ADDRESS_VERSION {
        return Err(LedgerError::InvalidAddress(format!(
            "{address:?}: unknown version {:#04x}",
            payload[0]
        )));
    }
    if checksum(payload) != sum {
        return Err(LedgerError::InvalidAddress(format!("{address:?}: checksum mismatch")));
    }
    let mut hash = [0u8; PUBKEY_HASH_LEN];
    hash.copy_from_slice(&payload[1..]);
    Ok(hash)
}

pub fn validate_address(address: &str) -> bool {
    decode_address(address).is_ok()
}
