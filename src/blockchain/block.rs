use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::codec::hash_block_fields;
use super::{Hash, ProofOfWork, ZERO_HASH};
use crate::error::Result;
use crate::transaction::Transaction;

/// A single block in the chain holding an ordered list of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub timestamp: i64, // Unix timestamp (UTC)
    pub prev_hash: Hash,
    pub hash: Hash,
    pub nonce: u64, // Proof-of-Work nonce
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a new block (not mined yet). Call `mine()` to perform PoW.
    pub fn new(height: u64, prev_hash: Hash, transactions: Vec<Transaction>) -> Result<Self> {
        Self::new_with_timestamp(height, prev_hash, transactions, Utc::now().timestamp())
    }

    pub fn new_with_timestamp(
        height: u64,
        prev_hash: Hash,
        transactions: Vec<Transaction>,
        timestamp: i64,
    ) -> Result<Self> {
        let mut block = Self {
            height,
            timestamp,
            prev_hash,
            hash: ZERO_HASH,
            nonce: 0,
            transactions,
        };
        block.hash = block.compute_hash()?;
        Ok(block)
    }

    /// Unmined genesis block holding the single reward transaction.
    pub fn genesis(coinbase: Transaction) -> Result<Self> {
        Self::new(0, ZERO_HASH, vec![coinbase])
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.prev_hash == ZERO_HASH
    }

    /// Hash of this block's content and nonce (the `hash` field excluded).
    pub fn compute_hash(&self) -> Result<Hash> {
        hash_block_fields(&self.prev_hash, &self.transactions, self.timestamp, self.nonce)
    }

    /// Perform Proof-of-Work, storing the winning nonce and hash.
    pub fn mine(&mut self, pow: &ProofOfWork) -> Result<()> {
        let (nonce, hash) = pow.mine(&self.prev_hash, &self.transactions, self.timestamp)?;
        self.nonce = nonce;
        self.hash = hash;
        Ok(())
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::Block;
    use crate::blockchain::{ProofOfWork, ZERO_HASH};
    use crate::transaction::{OutPoint, Transaction, TxInput, TxOutput};

    fn transfer(seed: u8) -> Transaction {
        Transaction::from_parts(
            vec![TxInput::unsigned(OutPoint::new([seed; 32], 0))],
            vec![TxOutput {
                value: 1,
                pubkey_hash: [seed; 20],
            }],
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn genesis_has_valid_hash() {
        let coinbase = Transaction::coinbase([1u8; 20], 10, b"genesis".to_vec()).unwrap();
        let b = Block::genesis(coinbase).unwrap();
        assert!(b.is_genesis());
        assert_eq!(b.hash, b.compute_hash().unwrap());
    }

    #[test]
    fn mining_produces_leading_zeros() {
        let pow = ProofOfWork::new(8);
        let mut b = Block::new(1, [5u8; 32], vec![transfer(1)]).unwrap();
        b.mine(&pow).unwrap();
        assert_eq!(b.hash[0], 0);
        assert_eq!(b.hash, b.compute_hash().unwrap());
        assert!(pow.validate(&b));
    }

    #[test]
    fn invalid_when_mutated() {
        let pow = ProofOfWork::new(8);
        let mut b = Block::new(2, ZERO_HASH, vec![transfer(1)]).unwrap();
        b.mine(&pow).unwrap();
        let old_hash = b.hash;

        // Tampering: append a transaction after mining.
        b.transactions.push(transfer(2));

        assert_ne!(old_hash, b.compute_hash().unwrap());
        assert!(!pow.validate(&b));
    }
}
