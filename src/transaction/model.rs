use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::utxo::OutPoint;
use crate::blockchain::Hash;
use crate::blockchain::codec::{digest, encode_signing};
use crate::error::{LedgerError, Result};
use crate::wallet::{PubKeyHash, Wallet, decode_address};

/// Length of the random payload given to coinbase transactions without data.
const COINBASE_DATA_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// References a previous unspent output (UTXO)
    pub outpoint: OutPoint,
    /// DER-encoded ECDSA signature over the transaction id
    pub signature: Vec<u8>,
    /// Compressed SEC1 public key of the spender (33 bytes)
    pub pubkey: Vec<u8>,
}

impl TxInput {
    pub fn unsigned(outpoint: OutPoint) -> Self {
        Self {
            outpoint,
            signature: Vec::new(),
            pubkey: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    /// Locking condition: hash of the owner's public key
    pub pubkey_hash: PubKeyHash,
}

impl TxOutput {
    /// Output paying `value` to a base58 address.
    pub fn to_address(address: &str, value: u64) -> Result<Self> {
        Ok(Self {
            value,
            pubkey_hash: decode_address(address)?,
        })
    }

    pub fn is_locked_with(&self, pubkey_hash: &PubKeyHash) -> bool {
        &self.pubkey_hash == pubkey_hash
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Digest of the signing encoding (signatures and pubkeys blanked).
    pub id: Hash,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Free-form payload; coinbase transactions use it to stay unique.
    pub data: Vec<u8>,
}

impl Transaction {
    /// Build a transaction and compute its id deterministically from its content.
    pub fn from_parts(inputs: Vec<TxInput>, outputs: Vec<TxOutput>, data: Vec<u8>) -> Result<Self> {
        let mut tx = Self {
            id: [0u8; 32],
            inputs,
            outputs,
            data,
        };
        tx.id = tx.compute_id()?;
        Ok(tx)
    }

    /// Zero-input reward transaction. Empty `data` is replaced by random
    /// bytes so two rewards of equal value to one address differ in id.
    pub fn coinbase(to: PubKeyHash, value: u64, mut data: Vec<u8>) -> Result<Self> {
        if data.is_empty() {
            data = vec![0u8; COINBASE_DATA_LEN];
            OsRng.fill_bytes(&mut data);
        }
        Self::from_parts(Vec::new(), vec![TxOutput { value, pubkey_hash: to }], data)
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn compute_id(&self) -> Result<Hash> {
        Ok(digest(&encode_signing(self)?))
    }

    /// Sum of all output values, `None` on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
    }

    /// Sign a single input with `wallet`. Inputs funded by different
    /// addresses are signed one by one with their own keys.
    pub fn sign_input(&mut self, index: usize, wallet: &Wallet) -> Result<()> {
        let id = self.id;
        let input = self.inputs.get_mut(index).ok_or_else(|| {
            LedgerError::InvalidTransaction(format!("no input at index {index}"))
        })?;
        input.pubkey = wallet.public_key_bytes();
        input.signature = wallet.sign(&id);
        Ok(())
    }

    /// Sign every input with the same wallet.
    pub fn sign(&mut self, wallet: &Wallet) -> Result<()> {
        for index in 0..self.inputs.len() {
            self.sign_input(index, wallet)?;
        }
        Ok(())
    }

    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }
}
