pub mod block;
pub mod codec;
pub mod model;
pub mod pow;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use block::Block;
pub use model::{BlockIter, Blockchain};
pub use pow::ProofOfWork;

/// 32-byte SHA-256 digest used as block hash and transaction id.
pub type Hash = [u8; 32];

/// `prev_hash` of the genesis block.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Default Proof-of-Work difficulty (required leading zero bits).
pub const DEFAULT_DIFFICULTY_BITS: u32 = 16;

/// Reward paid by the genesis coinbase (dev value).
pub const DEFAULT_GENESIS_REWARD: u64 = 10;

/// Whether the genesis block must satisfy the proof-of-work target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenesisPolicy {
    /// Genesis is mined and validated like any other block.
    Mined,
    /// Genesis is stored with nonce 0 and skips the target check.
    Exempt,
}

impl FromStr for GenesisPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mined" => Ok(GenesisPolicy::Mined),
            "exempt" => Ok(GenesisPolicy::Exempt),
            other => Err(format!("unknown genesis policy {other:?} (expected mined|exempt)")),
        }
    }
}

impl fmt::Display for GenesisPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenesisPolicy::Mined => f.write_str("mined"),
            GenesisPolicy::Exempt => f.write_str("exempt"),
        }
    }
}
