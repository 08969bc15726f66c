pub mod builder;
pub mod model;
pub mod utxo;
pub mod verify;

pub use builder::build_transfer;
pub use model::{Transaction, TxInput, TxOutput};
pub use utxo::{OutPoint, UtxoSet};
pub use verify::{verify_block_transactions, verify_transaction};
