use log::{debug, info};
use std::time::Instant;

use super::codec::{block_preimage, digest, encode_block_content};
use super::{Block, Hash};
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;

/// Largest nonce tried before the search is declared exhausted (2^63 - 1).
pub const MAX_NONCE: u64 = i64::MAX as u64;

/// Fixed-difficulty proof-of-work: a hash is valid when, read as a
/// big-endian 256-bit integer, it is below `2^(256 - difficulty_bits)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty_bits: u32,
    max_nonce: u64,
}

impl ProofOfWork {
    pub fn new(difficulty_bits: u32) -> Self {
        Self {
            difficulty_bits: difficulty_bits.min(256),
            max_nonce: MAX_NONCE,
        }
    }

    /// Same target with a smaller nonce space.
    pub fn with_max_nonce(mut self, max_nonce: u64) -> Self {
        self.max_nonce = max_nonce;
        self
    }

    pub fn difficulty_bits(&self) -> u32 {
        self.difficulty_bits
    }

    /// The target `2^(256 - difficulty_bits)` as big-endian bytes, or `None`
    /// when difficulty is 0 and the target (2^256) does not fit.
    pub fn target(&self) -> Option<Hash> {
        if self.difficulty_bits == 0 {
            return None;
        }
        let bit = 256 - self.difficulty_bits as usize;
        let mut target = [0u8; 32];
        target[31 - bit / 8] = 1 << (bit % 8);
        Some(target)
    }

    /// `hash < 2^(256 - bits)` holds exactly when the top `bits` bits are zero.
    pub fn meets_target(&self, hash: &Hash) -> bool {
        leading_zero_bits(hash) >= self.difficulty_bits
    }

    /// Search nonces from 0 upward for the first whose block hash meets the
    /// target.
    pub fn mine(
        &self,
        prev_hash: &Hash,
        transactions: &[Transaction],
        timestamp: i64,
    ) -> Result<(u64, Hash)> {
        let content = encode_block_content(prev_hash, transactions, timestamp)?;
        let started = Instant::now();
        debug!(
            "POW - mining {} txs on top of {} (bits={})",
            transactions.len(),
            hex::encode(prev_hash),
            self.difficulty_bits
        );

        let mut nonce = 0u64;
        loop {
            let hash = digest(&block_preimage(&content, nonce));
            if self.meets_target(&hash) {
                info!(
                    "POW - found nonce {} in {} ms (hash={})",
                    nonce,
                    started.elapsed().as_millis(),
                    hex::encode(hash)
                );
                return Ok((nonce, hash));
            }
            if nonce >= self.max_nonce {
                return Err(LedgerError::ProofOfWorkExhausted);
            }
            nonce += 1;
        }
    }

    /// Recompute the hash from the block's stored content and nonce and check
    /// it against both the cached hash and the target.
    pub fn validate(&self, block: &Block) -> bool {
        match block.compute_hash() {
            Ok(hash) => hash == block.hash && self.meets_target(&hash),
            Err(_) => false,
        }
    }
}

fn leading_zero_bits(hash: &Hash) -> u32 {
    let mut bits = 0;
    for byte in hash {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ZERO_HASH;

    #[test]
    fn target_comparison_matches_leading_bits() {
        let pow = ProofOfWork::new(12);
        let target = pow.target().unwrap();
        assert_eq!(target[1], 0x10);

        let mut below = [0u8; 32];
        below[1] = 0x0f;
        below[2] = 0xff;
        assert!(pow.meets_target(&below));
        assert!(below < target);

        let mut at = [0u8; 32];
        at[1] = 0x10;
        assert!(!pow.meets_target(&at));
        assert!(!(at < target));
    }

    #[test]
    fn zero_difficulty_accepts_everything() {
        let pow = ProofOfWork::new(0);
        assert!(pow.target().is_none());
        assert!(pow.meets_target(&[0xff; 32]));
    }

    #[test]
    fn mined_nonce_validates() {
        let pow = ProofOfWork::new(8);
        let (nonce, hash) = pow.mine(&ZERO_HASH, &[], 1_700_000_000).unwrap();
        assert_eq!(hash[0], 0);

        let block = Block {
            height: 0,
            timestamp: 1_700_000_000,
            prev_hash: ZERO_HASH,
            hash,
            nonce,
            transactions: Vec::new(),
        };
        assert!(pow.validate(&block));

        let mut tampered = block.clone();
        tampered.timestamp += 1;
        assert!(!pow.validate(&tampered));
    }

    #[test]
    fn exhausted_search_is_an_error() {
        // 64 leading zero bits within four nonces will not happen.
        let pow = ProofOfWork::new(64).with_max_nonce(3);
        let err = pow.mine(&ZERO_HASH, &[], 0).unwrap_err();
        assert!(matches!(err, LedgerError::ProofOfWorkExhausted));
    }
}
