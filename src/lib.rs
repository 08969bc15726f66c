//! Single-node proof-of-work ledger: hash-linked blocks persisted in sled,
//! a UTXO transaction model with secp256k1 signatures, and Base58Check
//! addresses.

pub mod blockchain;
pub mod config;
pub mod error;
pub mod ledger;
pub mod transaction;
pub mod wallet;

pub use blockchain::{Block, Blockchain, GenesisPolicy, ProofOfWork};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use ledger::Ledger;
pub use transaction::{Transaction, UtxoSet};
pub use wallet::{Wallet, Wallets};
