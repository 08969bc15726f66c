use log::warn;
use std::collections::HashSet;

use super::model::{Transaction, TxOutput};
use super::utxo::{OutPoint, UtxoSet};
use crate::error::{LedgerError, Result};
use crate::wallet::{hash_pubkey, verify_signature};

/// Check a single transaction against the outputs it spends.
///
/// `lookup` resolves an outpoint to the prior output it names, or `None`
/// when that output is unknown or already spent.
pub fn verify_transaction<F>(tx: &Transaction, lookup: F) -> Result<()>
where
    F: Fn(&OutPoint) -> Option<TxOutput>,
{
    if tx.compute_id()? != tx.id {
        return Err(LedgerError::InvalidTransaction(format!(
            "id {} does not match content",
            tx.id_hex()
        )));
    }
    if tx.outputs.is_empty() {
        return Err(LedgerError::InvalidTransaction(
            "transaction must have at least one output".into(),
        ));
    }
    let output_sum = tx.total_output_value().ok_or_else(|| {
        LedgerError::InvalidTransaction("output values overflow".into())
    })?;
    if tx.is_coinbase() {
        return Ok(());
    }

    let mut seen = HashSet::new();
    let mut input_sum = 0u64;
    for (i, input) in tx.inputs.iter().enumerate() {
        let op = &input.outpoint;
        if !seen.insert(*op) {
            return Err(LedgerError::DoubleSpend(format!(
                "input {i} repeats {}:{}",
                hex::encode(op.txid),
                op.vout
            )));
        }

        let prev = lookup(op).ok_or_else(|| {
            LedgerError::DoubleSpend(format!(
                "input {i} references {}:{} which is spent or unknown",
                hex::encode(op.txid),
                op.vout
            ))
        })?;

        // Ownership: hash of the presented pubkey must match the lock.
        if input.pubkey.is_empty() || !prev.is_locked_with(&hash_pubkey(&input.pubkey)) {
            return Err(LedgerError::InvalidSignature(format!(
                "input {i}: public key does not own the referenced output"
            )));
        }
        if !verify_signature(&input.pubkey, &input.signature, &tx.id) {
            return Err(LedgerError::InvalidSignature(format!(
                "input {i}: signature check failed"
            )));
        }

        input_sum = input_sum.checked_add(prev.value).ok_or_else(|| {
            LedgerError::InvalidTransaction("input values overflow".into())
        })?;
    }

    if input_sum < output_sum {
        return Err(LedgerError::InvalidTransaction(format!(
            "outputs ({output_sum}) exceed inputs ({input_sum})"
        )));
    }
    Ok(())
}

/// Validate the transactions of one candidate block, in order, against
/// `utxo`. A coinbase is only allowed at index 0, and an output consumed by
/// an earlier transaction of the same block is a double spend. Later
/// transactions may spend outputs created earlier in the block.
pub fn verify_block_transactions(transactions: &[Transaction], utxo: &UtxoSet) -> Result<()> {
    let mut working = utxo.clone();
    let mut consumed: HashSet<OutPoint> = HashSet::new();

    for (idx, tx) in transactions.iter().enumerate() {
        if tx.is_coinbase() && idx != 0 {
            return Err(LedgerError::InvalidTransaction(format!(
                "coinbase {} at position {idx}; only the first transaction may be a coinbase",
                tx.id_hex()
            )));
        }

        for input in &tx.inputs {
            if consumed.contains(&input.outpoint) {
                warn!("tx {} rejected: output spent twice in one block", tx.id_hex());
                return Err(LedgerError::DoubleSpend(format!(
                    "{}:{} already spent earlier in this block",
                    hex::encode(input.outpoint.txid),
                    input.outpoint.vout
                )));
            }
        }

        if let Err(e) = verify_transaction(tx, |op| working.get(op).cloned()) {
            warn!("tx {} rejected: {}", tx.id_hex(), e);
            return Err(e);
        }

        consumed.extend(tx.inputs.iter().map(|i| i.outpoint));
        working.apply_transaction(tx)?;
    }
    Ok(())
}
