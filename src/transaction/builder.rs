use log::debug;

use super::model::{Transaction, TxInput, TxOutput};
use super::utxo::UtxoSet;
use crate::error::{LedgerError, Result};
use crate::wallet::Wallet;

/// Build and sign a transfer of `amount` from `wallet`'s address to `to`.
///
/// One input per selected output; one output to `to` plus a change output
/// back to the sender when the selection overshoots.
pub fn build_transfer(wallet: &Wallet, to: &str, amount: u64, utxo: &UtxoSet) -> Result<Transaction> {
    if amount == 0 {
        return Err(LedgerError::InvalidTransaction("amount must be > 0".into()));
    }
    let payment = TxOutput::to_address(to, amount)?;
    let from_hash = wallet.pubkey_hash();

    let (found, outpoints) = utxo.find_spendable_outputs(&from_hash, amount);
    if found < amount {
        return Err(LedgerError::InsufficientFunds {
            requested: amount,
            available: found,
        });
    }

    let inputs = outpoints.into_iter().map(TxInput::unsigned).collect::<Vec<_>>();
    let mut outputs = vec![payment];
    let change = found - amount;
    if change > 0 {
        outputs.push(TxOutput {
            value: change,
            pubkey_hash: from_hash,
        });
    }

    let mut tx = Transaction::from_parts(inputs, outputs, Vec::new())?;
    tx.sign(wallet)?;
    debug!(
        "built tx {} ({} inputs, {} -> {} amount={} change={})",
        tx.id_hex(),
        tx.inputs.len(),
        wallet.address(),
        to,
        amount,
        change
    );
    Ok(tx)
}
