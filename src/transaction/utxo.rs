use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::model::{Transaction, TxOutput};
use crate::blockchain::{Block, Hash};
use crate::error::{LedgerError, Result};
use crate::wallet::PubKeyHash;

/// Identifies a specific transaction output by its txid and index.
/// Ordered by txid, then index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, vout: u32) -> Self {
        Self { txid, vout }
    }
}

/// Unspent outputs grouped by transaction id.
///
/// This is a view derived from the chain: it can always be rebuilt with
/// [`UtxoSet::reindex`] and is never persisted on its own. Iteration is in
/// ascending (txid, vout) order so coin selection is repeatable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet {
    index: BTreeMap<Hash, BTreeMap<u32, TxOutput>>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the set from every block reachable from the tip.
    ///
    /// All outputs are collected, then every output referenced by any input
    /// is removed. Neither step depends on visiting order, so tip-to-genesis
    /// replay gives the same set as genesis-to-tip.
    pub fn reindex<I>(blocks: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<Block>>,
    {
        let mut set = Self::new();
        let mut spent: HashSet<OutPoint> = HashSet::new();
        let mut blocks_seen = 0usize;

        for block in blocks {
            let block = block?;
            blocks_seen += 1;
            for tx in &block.transactions {
                set.add_tx_outputs(tx);
                if !tx.is_coinbase() {
                    spent.extend(tx.inputs.iter().map(|i| i.outpoint));
                }
            }
        }
        for outpoint in &spent {
            set.spend(outpoint);
        }

        debug!(
            "UTXO reindexed: {} blocks, {} spent, {} unspent in {} txs",
            blocks_seen,
            spent.len(),
            set.len(),
            set.count_transactions()
        );
        Ok(set)
    }

    /// Insert a single output into the set.
    pub fn insert(&mut self, outpoint: OutPoint, output: TxOutput) {
        self.index
            .entry(outpoint.txid)
            .or_default()
            .insert(outpoint.vout, output);
    }

    /// Spend (remove) a single outpoint. Returns the removed output if it existed.
    pub fn spend(&mut self, outpoint: &OutPoint) -> Option<TxOutput> {
        let outputs = self.index.get_mut(&outpoint.txid)?;
        let removed = outputs.remove(&outpoint.vout);
        if outputs.is_empty() {
            self.index.remove(&outpoint.txid);
        }
        removed
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.index.get(&outpoint.txid)?.get(&outpoint.vout)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.get(outpoint).is_some()
    }

    /// Number of unspent outputs.
    pub fn len(&self) -> usize {
        self.index.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of transactions with at least one unspent output.
    pub fn count_transactions(&self) -> usize {
        self.index.len()
    }

    /// All entries in ascending (txid, vout) order.
    pub fn iter(&self) -> impl Iterator<Item = (OutPoint, &TxOutput)> {
        self.index.iter().flat_map(|(txid, outputs)| {
            outputs
                .iter()
                .map(move |(vout, out)| (OutPoint::new(*txid, *vout), out))
        })
    }

    /// Add all outputs of a tx.
    pub fn add_tx_outputs(&mut self, tx: &Transaction) {
        for (i, out) in tx.outputs.iter().enumerate() {
            self.insert(OutPoint::new(tx.id, i as u32), out.clone());
        }
    }

    /// Spend a transaction's inputs and add its outputs.
    ///
    /// On error the set may be partially updated; callers apply blocks to a
    /// copy and keep the original on failure.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<()> {
        if !tx.is_coinbase() {
            for input in &tx.inputs {
                if self.spend(&input.outpoint).is_none() {
                    return Err(LedgerError::DoubleSpend(format!(
                        "{}:{} is not unspent",
                        hex::encode(input.outpoint.txid),
                        input.outpoint.vout
                    )));
                }
            }
        }
        self.add_tx_outputs(tx);
        Ok(())
    }

    /// Incremental maintenance after `block` is appended: remove the
    /// outputs it consumes, add the ones it creates.
    pub fn update(&mut self, block: &Block) -> Result<()> {
        for tx in &block.transactions {
            self.apply_transaction(tx)?;
        }
        debug!(
            "UTXO applied block #{} ({} txs), utxo_size={}",
            block.height,
            block.transactions.len(),
            self.len()
        );
        Ok(())
    }

    /// Unspent outputs locked to `pubkey_hash`.
    pub fn find_unspent(&self, pubkey_hash: &PubKeyHash) -> Vec<(OutPoint, TxOutput)> {
        self.iter()
            .filter(|(_, out)| out.is_locked_with(pubkey_hash))
            .map(|(op, out)| (op, out.clone()))
            .collect()
    }

    /// Accumulate outputs locked to `pubkey_hash` until `amount` is covered
    /// or the set is exhausted. Returns (total found, selected outpoints).
    pub fn find_spendable_outputs(
        &self,
        pubkey_hash: &PubKeyHash,
        amount: u64,
    ) -> (u64, Vec<OutPoint>) {
        let mut total = 0u64;
        let mut selected = Vec::new();
        for (op, out) in self.iter() {
            if total >= amount {
                break;
            }
            if out.is_locked_with(pubkey_hash) {
                total = total.saturating_add(out.value);
                selected.push(op);
            }
        }
        (total, selected)
    }

    pub fn balance(&self, pubkey_hash: &PubKeyHash) -> u64 {
        self.iter()
            .filter(|(_, out)| out.is_locked_with(pubkey_hash))
            .fold(0u64, |acc, (_, out)| acc.saturating_add(out.value))
    }
}
