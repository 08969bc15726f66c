//! Error types for the ledger engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Stored or transported bytes could not be decoded (or encoded).
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("proof-of-work search exhausted the nonce space without a solution")]
    ProofOfWorkExhausted,

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("insufficient funds: requested {requested}, spendable {available}")]
    InsufficientFunds { requested: u64, available: u64 },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("double spend: {0}")]
    DoubleSpend(String),

    /// The tip (or a back-reference) names a block the store does not hold.
    #[error("store corrupt: {0}")]
    StoreCorrupt(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("a ledger already exists in this store")]
    LedgerExists,

    #[error("no ledger found; create one with `createblockchain` first")]
    LedgerNotFound,

    #[error("wallet not found for address {0}")]
    WalletNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::Encoding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
