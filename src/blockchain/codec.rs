//! Deterministic binary encodings used for hashing and storage.
//!
//! Everything goes through bincode's legacy (fixed-int, little-endian)
//! encoding: fields are written in declaration order, integers at their full
//! width and every sequence is prefixed by its `u64` length. The encoding is
//! therefore injective, and an empty transaction list is written as an
//! explicit zero length rather than being absent.
//!
//! Because the nonce is the last field of the block preimage, the preimage is
//! `content || nonce.to_le_bytes()`, which lets the miner encode the content
//! once and only rewrite the trailing eight bytes per attempt.

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{Block, Hash};
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;

#[derive(Serialize)]
struct BlockContent<'a> {
    prev_hash: &'a Hash,
    transactions: &'a [Transaction],
    timestamp: i64,
}

/// SHA-256 of `bytes`.
pub fn digest(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Encode the hashed fields of a block, excluding the nonce.
pub fn encode_block_content(
    prev_hash: &Hash,
    transactions: &[Transaction],
    timestamp: i64,
) -> Result<Vec<u8>> {
    let content = BlockContent {
        prev_hash,
        transactions,
        timestamp,
    };
    Ok(bincode::serialize(&content)?)
}

/// Append `nonce` to already-encoded block content.
pub fn block_preimage(content: &[u8], nonce: u64) -> Vec<u8> {
    let mut preimage = Vec::with_capacity(content.len() + 8);
    preimage.extend_from_slice(content);
    preimage.extend_from_slice(&nonce.to_le_bytes());
    preimage
}

/// `Digest(Encode(prev_hash, transactions, timestamp, nonce))`.
pub fn hash_block_fields(
    prev_hash: &Hash,
    transactions: &[Transaction],
    timestamp: i64,
    nonce: u64,
) -> Result<Hash> {
    let content = encode_block_content(prev_hash, transactions, timestamp)?;
    Ok(digest(&block_preimage(&content, nonce)))
}

/// Encoding of a transaction with every input's signature and public key
/// blanked. This is both the preimage of the transaction id and the data
/// each input signs, so it is identical before and after signing.
pub fn encode_signing(tx: &Transaction) -> Result<Vec<u8>> {
    let mut trimmed = tx.clone();
    trimmed.id = [0u8; 32];
    for input in &mut trimmed.inputs {
        input.signature.clear();
        input.pubkey.clear();
    }
    Ok(bincode::serialize(&trimmed)?)
}

/// Storage encoding of a full block (the value stored under its hash).
pub fn encode_block(block: &Block) -> Result<Vec<u8>> {
    Ok(bincode::serialize(block)?)
}

pub fn decode_block(bytes: &[u8]) -> Result<Block> {
    bincode::deserialize(bytes).map_err(|e| LedgerError::Encoding(format!("block: {e}")))
}
