//! Shared ledger handle.
//!
//! `Ledger` pairs the persisted [`Blockchain`] with its derived [`UtxoSet`]
//! behind one `RwLock`, so readers always see a tip and a UTXO view that
//! belong together. Appends are serialized by a separate writer gate: the
//! long proof-of-work search runs while holding only the gate, and the
//! state lock is taken exclusively just to persist the block and swap in the
//! UTXO view computed for it.

use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use sled::Db;

use crate::blockchain::{Block, BlockIter, Blockchain, GenesisPolicy, Hash, ProofOfWork};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::transaction::{
    OutPoint, Transaction, TxOutput, UtxoSet, build_transfer, verify_block_transactions,
};
use crate::wallet::{Wallet, decode_address};

struct ChainState {
    chain: Blockchain,
    utxo: UtxoSet,
}

pub struct Ledger {
    state: RwLock<ChainState>,
    writer: Mutex<()>,
}

impl Ledger {
    /// Create a chain in `db` whose genesis coinbase pays `reward` to
    /// `address`.
    pub fn create(
        db: Db,
        address: &str,
        reward: u64,
        pow: ProofOfWork,
        genesis_policy: GenesisPolicy,
    ) -> Result<Self> {
        let to = decode_address(address)?;
        let coinbase = Transaction::coinbase(to, reward, Vec::new())?;
        let chain = Blockchain::create(db, coinbase, pow, genesis_policy)?;
        let utxo = UtxoSet::reindex(chain.iter())?;
        Ok(Self::from_parts(chain, utxo))
    }

    /// Open an existing chain and rebuild its UTXO view. A store whose tip
    /// is dangling gets one repair attempt before the error is surfaced.
    pub fn open(db: Db, pow: ProofOfWork, genesis_policy: GenesisPolicy) -> Result<Self> {
        let opened = Blockchain::open(db.clone(), pow, genesis_policy)
            .and_then(|chain| UtxoSet::reindex(chain.iter()).map(|utxo| (chain, utxo)));

        let (chain, utxo) = match opened {
            Err(LedgerError::StoreCorrupt(reason)) => {
                warn!("LEDGER - store corrupt ({}); attempting tip repair", reason);
                let chain = Blockchain::repair_tip(db, pow, genesis_policy)?;
                let utxo = UtxoSet::reindex(chain.iter())?;
                (chain, utxo)
            }
            other => other?,
        };
        info!(
            "LEDGER - opened at height {} ({} unspent outputs)",
            chain.height()?,
            utxo.len()
        );
        Ok(Self::from_parts(chain, utxo))
    }

    pub fn create_from_config(config: &LedgerConfig, address: &str) -> Result<Self> {
        let db = sled::open(&config.data_dir)?;
        Self::create(
            db,
            address,
            config.genesis_reward,
            ProofOfWork::new(config.difficulty_bits),
            config.genesis_policy,
        )
    }

    pub fn open_from_config(config: &LedgerConfig) -> Result<Self> {
        let db = sled::open(&config.data_dir)?;
        Self::open(
            db,
            ProofOfWork::new(config.difficulty_bits),
            config.genesis_policy,
        )
    }

    fn from_parts(chain: Blockchain, utxo: UtxoSet) -> Self {
        Self {
            state: RwLock::new(ChainState { chain, utxo }),
            writer: Mutex::new(()),
        }
    }

    pub fn tip(&self) -> Hash {
        self.state.read().chain.tip()
    }

    pub fn height(&self) -> Result<u64> {
        self.state.read().chain.height()
    }

    pub fn difficulty_bits(&self) -> u32 {
        self.state.read().chain.pow().difficulty_bits()
    }

    /// Blocks from the current tip back to genesis.
    pub fn blocks(&self) -> BlockIter {
        self.state.read().chain.iter()
    }

    pub fn get_block(&self, hash: &Hash) -> Result<Option<Block>> {
        self.state.read().chain.get_block(hash)
    }

    pub fn find_transaction(&self, id: &Hash) -> Result<Option<Transaction>> {
        self.state.read().chain.find_transaction(id)
    }

    pub fn balance(&self, address: &str) -> Result<u64> {
        let pubkey_hash = decode_address(address)?;
        Ok(self.state.read().utxo.balance(&pubkey_hash))
    }

    pub fn unspent_outputs(&self, address: &str) -> Result<Vec<(OutPoint, TxOutput)>> {
        let pubkey_hash = decode_address(address)?;
        Ok(self.state.read().utxo.find_unspent(&pubkey_hash))
    }

    /// Copy of the current UTXO view.
    pub fn utxo_snapshot(&self) -> UtxoSet {
        self.state.read().utxo.clone()
    }

    /// Transfer `amount` from `wallet` to `to` in a freshly mined block.
    /// Nothing is persisted when building, verification or mining fails.
    pub fn send(&self, wallet: &Wallet, to: &str, amount: u64) -> Result<Block> {
        let _gate = self.writer.lock();
        let tx = {
            let state = self.state.read();
            build_transfer(wallet, to, amount, &state.utxo)?
        };
        info!(
            "LEDGER - send {} from {} to {} (tx={})",
            amount,
            wallet.address(),
            to,
            tx.id_hex()
        );
        self.mine_and_append(vec![tx])
    }

    /// Verify, mine and append a block of `transactions`.
    pub fn add_block(&self, transactions: Vec<Transaction>) -> Result<Block> {
        let _gate = self.writer.lock();
        self.mine_and_append(transactions)
    }

    /// Caller must hold the writer gate.
    fn mine_and_append(&self, transactions: Vec<Transaction>) -> Result<Block> {
        let (mut block, mut next_utxo, pow) = {
            let state = self.state.read();
            verify_block_transactions(&transactions, &state.utxo)?;
            let block = state.chain.next_block(transactions)?;
            (block, state.utxo.clone(), *state.chain.pow())
        };

        block.mine(&pow)?;
        next_utxo.update(&block)?;

        let mut state = self.state.write();
        let appended = state.chain.append(&block);
        // A block that reached the store (even if the flush failed) moved the
        // tip, so the UTXO view has to move with it.
        if state.chain.tip() == block.hash {
            state.utxo = next_utxo;
        }
        appended?;
        Ok(block)
    }

    /// Rebuild the UTXO view from the chain. Returns the number of
    /// transactions that still have unspent outputs.
    pub fn reindex(&self) -> Result<usize> {
        let _gate = self.writer.lock();
        let utxo = {
            let state = self.state.read();
            UtxoSet::reindex(state.chain.iter())?
        };
        let count = utxo.count_transactions();
        self.state.write().utxo = utxo;
        info!("LEDGER - reindexed UTXO set ({} transactions)", count);
        Ok(count)
    }

    /// Full integrity check of the chain. Returns the number of blocks.
    pub fn validate_chain(&self) -> Result<u64> {
        let chain = self.state.read().chain.clone();
        chain.validate_chain()
    }
}
