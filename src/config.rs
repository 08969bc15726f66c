use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::blockchain::{DEFAULT_DIFFICULTY_BITS, DEFAULT_GENESIS_REWARD, GenesisPolicy};
use crate::error::{LedgerError, Result};

/// Runtime settings for a ledger process.
///
/// Values come from the environment (a `.env` file is loaded by the binary
/// before this is read). Every key has a default; a present but malformed
/// value is an error.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub data_dir: PathBuf,
    pub wallet_file: PathBuf,
    pub difficulty_bits: u32,
    pub genesis_reward: u64,
    pub genesis_policy: GenesisPolicy,
    pub host: String,
    pub port: u16,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/chain"),
            wallet_file: PathBuf::from("./data/wallets.json"),
            difficulty_bits: DEFAULT_DIFFICULTY_BITS,
            genesis_reward: DEFAULT_GENESIS_REWARD,
            genesis_policy: GenesisPolicy::Mined,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process environment
    /// in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            data_dir: lookup("LEDGER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            wallet_file: lookup("LEDGER_WALLET_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.wallet_file),
            difficulty_bits: parse_or(&lookup, "LEDGER_DIFFICULTY_BITS", defaults.difficulty_bits)?,
            genesis_reward: parse_or(&lookup, "LEDGER_GENESIS_REWARD", defaults.genesis_reward)?,
            genesis_policy: parse_or(&lookup, "LEDGER_GENESIS_POLICY", defaults.genesis_policy)?,
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
        };

        if config.difficulty_bits > 255 {
            return Err(LedgerError::Config(format!(
                "LEDGER_DIFFICULTY_BITS must be at most 255, got {}",
                config.difficulty_bits
            )));
        }
        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| LedgerError::Config(format!("{key}={raw:?}: {e}"))),
        None => Ok(default),
    }
}
