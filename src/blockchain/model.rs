//! Persisted chain store.
//!
//! One sled tree, `blocks`, holds every block under its 32-byte hash
//! (value: bincode `Block`) plus the reserved key `l` whose value is the
//! current tip hash. A block and the tip that points at it are written in a
//! single atomic batch, so a crash leaves either both or neither.

use chrono::Utc;
use log::{debug, info, warn};
use sled::{Batch, Db, Tree};

use super::codec::{decode_block, encode_block};
use super::{Block, GenesisPolicy, Hash, ProofOfWork, ZERO_HASH};
use crate::error::{LedgerError, Result};
use crate::transaction::{Transaction, UtxoSet, verify_block_transactions};

const BLOCKS_TREE: &str = "blocks";

/// Reserved key holding the tip hash.
pub const TIP_KEY: &[u8] = b"l";

/// Append-only, hash-linked block store with a single tip pointer.
#[derive(Debug, Clone)]
pub struct Blockchain {
    db: Db,
    blocks: Tree,
    tip: Hash,
    pow: ProofOfWork,
    genesis_policy: GenesisPolicy,
}

impl Blockchain {
    /// Whether `db` already holds a chain.
    pub fn exists(db: &Db) -> Result<bool> {
        Ok(db.open_tree(BLOCKS_TREE)?.contains_key(TIP_KEY)?)
    }

    /// Mine (or, under `GenesisPolicy::Exempt`, just hash) a genesis block
    /// holding `coinbase` and persist it as the tip. Fails if `db` already
    /// holds a chain.
    pub fn create(
        db: Db,
        coinbase: Transaction,
        pow: ProofOfWork,
        genesis_policy: GenesisPolicy,
    ) -> Result<Self> {
        if Self::exists(&db)? {
            return Err(LedgerError::LedgerExists);
        }
        let blocks = db.open_tree(BLOCKS_TREE)?;
        if !coinbase.is_coinbase() {
            return Err(LedgerError::InvalidTransaction(
                "genesis transaction must be a coinbase".into(),
            ));
        }

        let mut genesis = Block::genesis(coinbase)?;
        if genesis_policy == GenesisPolicy::Mined {
            genesis.mine(&pow)?;
        }

        let mut chain = Self {
            db,
            blocks,
            tip: ZERO_HASH,
            pow,
            genesis_policy,
        };
        chain.persist(&genesis)?;
        info!(
            "CHAIN - created genesis {} (policy={}, bits={})",
            genesis.hash_hex(),
            genesis_policy,
            pow.difficulty_bits()
        );
        Ok(chain)
    }

    /// Open an existing chain. The tip must name a stored block.
    pub fn open(db: Db, pow: ProofOfWork, genesis_policy: GenesisPolicy) -> Result<Self> {
        let blocks = db.open_tree(BLOCKS_TREE)?;
        let raw = blocks.get(TIP_KEY)?.ok_or(LedgerError::LedgerNotFound)?;
        let tip = <Hash>::try_from(&raw[..]).map_err(|_| {
            LedgerError::StoreCorrupt(format!("tip value has {} bytes, expected 32", raw.len()))
        })?;
        if !blocks.contains_key(tip)? {
            return Err(LedgerError::StoreCorrupt(format!(
                "tip {} is not in the store",
                hex::encode(tip)
            )));
        }
        debug!("CHAIN - opened at tip {}", hex::encode(tip));
        Ok(Self {
            db,
            blocks,
            tip,
            pow,
            genesis_policy,
        })
    }

    /// Point the tip at the highest stored block whose ancestry reaches
    /// genesis intact. Used to recover from `StoreCorrupt`.
    pub fn repair_tip(db: Db, pow: ProofOfWork, genesis_policy: GenesisPolicy) -> Result<Self> {
        let blocks = db.open_tree(BLOCKS_TREE)?;
        let mut candidates = Vec::new();
        for entry in blocks.iter() {
            let (key, value) = entry?;
            if key.len() != 32 {
                continue;
            }
            match decode_block(&value) {
                Ok(block) if block.hash[..] == key[..] => {
                    candidates.push((block.height, block.hash))
                }
                _ => warn!("CHAIN - skipping undecodable entry {}", hex::encode(&key)),
            }
        }
        candidates.sort_by(|a, b| b.cmp(a));

        for (height, hash) in candidates {
            let chain = Self {
                db: db.clone(),
                blocks: blocks.clone(),
                tip: hash,
                pow,
                genesis_policy,
            };
            if chain.iter().all(|b| b.is_ok()) {
                blocks.insert(TIP_KEY, hash.as_slice())?;
                db.flush()?;
                warn!(
                    "CHAIN - tip repaired to block #{} ({})",
                    height,
                    hex::encode(hash)
                );
                return Ok(chain);
            }
        }
        Err(LedgerError::StoreCorrupt(
            "no stored block links back to genesis".into(),
        ))
    }

    pub fn tip(&self) -> Hash {
        self.tip
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn get_block(&self, hash: &Hash) -> Result<Option<Block>> {
        load_block(&self.blocks, hash)
    }

    pub fn tip_block(&self) -> Result<Block> {
        self.get_block(&self.tip)?.ok_or_else(|| {
            LedgerError::StoreCorrupt(format!("tip {} is not in the store", hex::encode(self.tip)))
        })
    }

    /// Height of the tip block (genesis is 0).
    pub fn height(&self) -> Result<u64> {
        Ok(self.tip_block()?.height)
    }

    /// Lazy walk from the current tip back to genesis. Each call starts a
    /// fresh, independent walk.
    pub fn iter(&self) -> BlockIter {
        BlockIter {
            blocks: self.blocks.clone(),
            next: Some(self.tip),
            expected_height: None,
        }
    }

    pub fn find_transaction(&self, id: &Hash) -> Result<Option<Transaction>> {
        for block in self.iter() {
            if let Some(tx) = block?.transactions.into_iter().find(|tx| &tx.id == id) {
                return Ok(Some(tx));
            }
        }
        Ok(None)
    }

    /// Assemble an unmined block on top of the current tip. The timestamp
    /// never goes backwards relative to the tip.
    pub fn next_block(&self, transactions: Vec<Transaction>) -> Result<Block> {
        let tip = self.tip_block()?;
        let timestamp = Utc::now().timestamp().max(tip.timestamp);
        Block::new_with_timestamp(tip.height + 1, tip.hash, transactions, timestamp)
    }

    /// Proof-of-work check honouring the genesis policy.
    pub fn validate_pow(&self, block: &Block) -> bool {
        if block.is_genesis() && self.genesis_policy == GenesisPolicy::Exempt {
            return matches!(block.compute_hash(), Ok(hash) if hash == block.hash);
        }
        self.pow.validate(block)
    }

    /// Persist a mined block and advance the tip. The block must extend the
    /// current tip and satisfy the target.
    pub fn append(&mut self, block: &Block) -> Result<()> {
        if block.prev_hash != self.tip {
            return Err(LedgerError::InvalidBlock(format!(
                "prev_hash {} does not match tip {}",
                hex::encode(block.prev_hash),
                hex::encode(self.tip)
            )));
        }
        let expected_height = self.height()? + 1;
        if block.height != expected_height {
            return Err(LedgerError::InvalidBlock(format!(
                "height {} does not follow tip height {}",
                block.height,
                expected_height - 1
            )));
        }
        if !self.validate_pow(block) {
            return Err(LedgerError::InvalidBlock(format!(
                "hash {} fails proof-of-work",
                block.hash_hex()
            )));
        }
        self.persist(block)?;
        info!(
            "CHAIN - appended block #{} (hash={}, nonce={}, txs={})",
            block.height,
            block.hash_hex(),
            block.nonce,
            block.transactions.len()
        );
        Ok(())
    }

    /// Assemble, mine and append a block. Transactions are checked against
    /// a UTXO view rebuilt from this chain on every call.
    ///
    /// Store-level primitive for a single owner of this `Blockchain`; it does
    /// no locking of its own. Shared use goes through `Ledger::add_block`,
    /// which keeps an incremental UTXO view instead.
    pub fn add_block(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        let utxo = UtxoSet::reindex(self.iter())?;
        verify_block_transactions(&transactions, &utxo)?;
        let mut block = self.next_block(transactions)?;
        block.mine(&self.pow)?;
        self.append(&block)?;
        Ok(block)
    }

    /// Walk the whole chain checking hash integrity, proof-of-work, linkage
    /// and every transaction (replayed from genesis). Returns the number of
    /// blocks checked.
    pub fn validate_chain(&self) -> Result<u64> {
        let mut blocks = self.iter().collect::<Result<Vec<_>>>()?;
        blocks.reverse();

        let mut utxo = UtxoSet::new();
        for block in &blocks {
            if !self.validate_pow(block) {
                return Err(LedgerError::InvalidBlock(format!(
                    "block #{} ({}) fails hash or proof-of-work check",
                    block.height,
                    block.hash_hex()
                )));
            }
            verify_block_transactions(&block.transactions, &utxo)?;
            utxo.update(block)?;
        }
        Ok(blocks.len() as u64)
    }

    fn persist(&mut self, block: &Block) -> Result<()> {
        let mut batch = Batch::default();
        batch.insert(block.hash.as_slice(), encode_block(block)?);
        batch.insert(TIP_KEY, block.hash.as_slice());
        self.blocks.apply_batch(batch)?;
        // The batch is now visible to readers of the tree; the in-memory tip
        // must follow it even if the flush below fails.
        self.tip = block.hash;
        self.db.flush()?;
        Ok(())
    }
}

fn load_block(blocks: &Tree, hash: &Hash) -> Result<Option<Block>> {
    match blocks.get(hash)? {
        Some(bytes) => Ok(Some(decode_block(&bytes)?)),
        None => Ok(None),
    }
}

/// Tip-to-genesis block walk.
///
/// Heights must fall by exactly one per step, so a walk always terminates
/// (no cycles) and visits `tip height + 1` blocks. Any missing or
/// inconsistent block is yielded once as `StoreCorrupt` and ends the walk.
pub struct BlockIter {
    blocks: Tree,
    next: Option<Hash>,
    expected_height: Option<u64>,
}

impl Iterator for BlockIter {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        let block = match load_block(&self.blocks, &hash) {
            Ok(Some(block)) => block,
            Ok(None) => {
                return Some(Err(LedgerError::StoreCorrupt(format!(
                    "block {} is referenced but not stored",
                    hex::encode(hash)
                ))));
            }
            Err(e) => return Some(Err(e)),
        };

        if block.hash != hash {
            return Some(Err(LedgerError::StoreCorrupt(format!(
                "block stored under {} claims hash {}",
                hex::encode(hash),
                block.hash_hex()
            ))));
        }
        if let Some(expected) = self.expected_height {
            if block.height != expected {
                return Some(Err(LedgerError::StoreCorrupt(format!(
                    "block {} has height {}, expected {}",
                    block.hash_hex(),
                    block.height,
                    expected
                ))));
            }
        }

        match (block.prev_hash == ZERO_HASH, block.height) {
            (true, 0) => {}
            (false, h) if h > 0 => {
                self.next = Some(block.prev_hash);
                self.expected_height = Some(h - 1);
            }
            _ => {
                return Some(Err(LedgerError::StoreCorrupt(format!(
                    "block {} at height {} has inconsistent back-reference",
                    block.hash_hex(),
                    block.height
                ))));
            }
        }
        Some(Ok(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn temp_db() -> Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    fn new_chain(db: Db, owner: &Wallet, policy: GenesisPolicy) -> Blockchain {
        let cb = Transaction::coinbase(owner.pubkey_hash(), 10, Vec::new()).unwrap();
        Blockchain::create(db, cb, ProofOfWork::new(8), policy).unwrap()
    }

    fn reward(owner: &Wallet) -> Transaction {
        Transaction::coinbase(owner.pubkey_hash(), 1, Vec::new()).unwrap()
    }

    #[test]
    fn create_then_open() {
        let db = temp_db();
        let owner = Wallet::new();
        let chain = new_chain(db.clone(), &owner, GenesisPolicy::Mined);
        let genesis = chain.tip_block().unwrap();
        assert_eq!(genesis.height, 0);
        assert_eq!(genesis.prev_hash, ZERO_HASH);
        assert_eq!(genesis.hash[0], 0);

        let reopened = Blockchain::open(db, ProofOfWork::new(8), GenesisPolicy::Mined).unwrap();
        assert_eq!(reopened.tip(), chain.tip());
    }

    #[test]
    fn create_twice_fails() {
        let db = temp_db();
        let owner = Wallet::new();
        new_chain(db.clone(), &owner, GenesisPolicy::Mined);
        let cb = Transaction::coinbase(owner.pubkey_hash(), 10, Vec::new()).unwrap();
        let err =
            Blockchain::create(db, cb, ProofOfWork::new(8), GenesisPolicy::Mined).unwrap_err();
        assert!(matches!(err, LedgerError::LedgerExists));
    }

    #[test]
    fn stored_tip_follows_every_append() {
        let db = temp_db();
        let owner = Wallet::new();
        assert!(!Blockchain::exists(&db).unwrap());
        let mut chain = new_chain(db.clone(), &owner, GenesisPolicy::Mined);
        assert!(Blockchain::exists(&db).unwrap());

        let tree = db.open_tree(BLOCKS_TREE).unwrap();
        for _ in 0..2 {
            let block = chain.add_block(vec![reward(&owner)]).unwrap();
            let stored = tree.get(TIP_KEY).unwrap().unwrap();
            assert_eq!(&stored[..], &block.hash[..]);
            assert_eq!(chain.tip(), block.hash);
        }
    }

    #[test]
    fn open_missing_chain() {
        let err = Blockchain::open(temp_db(), ProofOfWork::new(8), GenesisPolicy::Mined)
            .unwrap_err();
        assert!(matches!(err, LedgerError::LedgerNotFound));
    }

    #[test]
    fn iteration_visits_height_plus_one_blocks() {
        let owner = Wallet::new();
        let mut chain = new_chain(temp_db(), &owner, GenesisPolicy::Mined);
        for _ in 0..3 {
            chain.add_block(vec![reward(&owner)]).unwrap();
        }
        assert_eq!(chain.height().unwrap(), 3);

        let first: Vec<Block> = chain.iter().collect::<Result<_>>().unwrap();
        let second: Vec<Block> = chain.iter().collect::<Result<_>>().unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
        let heights: Vec<u64> = first.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![3, 2, 1, 0]);
        assert_eq!(chain.validate_chain().unwrap(), 4);
    }

    #[test]
    fn append_rejects_stale_or_unmined_blocks() {
        let owner = Wallet::new();
        let mut chain = new_chain(temp_db(), &owner, GenesisPolicy::Mined);
        let tip_before = chain.tip();

        let mut stale = chain.next_block(vec![reward(&owner)]).unwrap();
        stale.mine(chain.pow()).unwrap();
        chain.add_block(vec![reward(&owner)]).unwrap();
        assert!(matches!(
            chain.append(&stale),
            Err(LedgerError::InvalidBlock(_))
        ));

        // Find a nonce that misses the target.
        let mut unmined = chain.next_block(vec![reward(&owner)]).unwrap();
        while chain.pow().meets_target(&unmined.hash) {
            unmined.nonce += 1;
            unmined.hash = unmined.compute_hash().unwrap();
        }
        let tip = chain.tip();
        assert!(matches!(
            chain.append(&unmined),
            Err(LedgerError::InvalidBlock(_))
        ));
        assert_eq!(chain.tip(), tip);
        assert_ne!(tip, tip_before);
    }

    #[test]
    fn exempt_genesis_is_not_mined() {
        let owner = Wallet::new();
        let chain = new_chain(temp_db(), &owner, GenesisPolicy::Exempt);
        let genesis = chain.tip_block().unwrap();
        assert_eq!(genesis.nonce, 0);
        assert!(chain.validate_pow(&genesis));
        assert_eq!(chain.validate_chain().unwrap(), 1);
    }

    #[test]
    fn find_transaction_by_id() {
        let owner = Wallet::new();
        let mut chain = new_chain(temp_db(), &owner, GenesisPolicy::Mined);
        let tx = reward(&owner);
        chain.add_block(vec![tx.clone()]).unwrap();
        assert_eq!(chain.find_transaction(&tx.id).unwrap(), Some(tx));
        assert_eq!(chain.find_transaction(&[0xaa; 32]).unwrap(), None);
    }

    #[test]
    fn dangling_tip_is_corrupt_and_repairable() {
        let db = temp_db();
        let owner = Wallet::new();
        let mut chain = new_chain(db.clone(), &owner, GenesisPolicy::Mined);
        let b1 = chain.add_block(vec![reward(&owner)]).unwrap();

        let tree = db.open_tree(BLOCKS_TREE).unwrap();
        tree.insert(TIP_KEY, [0x42u8; 32].as_slice()).unwrap();
        let err = Blockchain::open(db.clone(), ProofOfWork::new(8), GenesisPolicy::Mined)
            .unwrap_err();
        assert!(matches!(err, LedgerError::StoreCorrupt(_)));

        let repaired =
            Blockchain::repair_tip(db.clone(), ProofOfWork::new(8), GenesisPolicy::Mined).unwrap();
        assert_eq!(repaired.tip(), b1.hash);
        let reopened = Blockchain::open(db, ProofOfWork::new(8), GenesisPolicy::Mined).unwrap();
        assert_eq!(reopened.tip(), b1.hash);
    }

    #[test]
    fn missing_ancestor_ends_iteration_with_error() {
        let db = temp_db();
        let owner = Wallet::new();
        let mut chain = new_chain(db.clone(), &owner, GenesisPolicy::Mined);
        let genesis = chain.tip();
        chain.add_block(vec![reward(&owner)]).unwrap();

        db.open_tree(BLOCKS_TREE).unwrap().remove(genesis).unwrap();
        let items: Vec<Result<Block>> = chain.iter().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(LedgerError::StoreCorrupt(_))));
    }
}
