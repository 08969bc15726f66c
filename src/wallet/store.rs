use log::info;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::keys::Wallet;
use crate::error::{LedgerError, Result};

/// Keystore: wallets indexed by address, persisted as a JSON object of
/// `address -> secret key hex`.
#[derive(Debug, Default, Clone)]
pub struct Wallets {
    wallets: BTreeMap<String, Wallet>,
}

impl Wallets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the keystore at `path`; a missing file is an empty keystore.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let secrets: BTreeMap<String, String> = serde_json::from_str(&raw)
            .map_err(|e| LedgerError::Encoding(format!("{}: {e}", path.display())))?;

        let mut wallets = BTreeMap::new();
        for (address, secret) in secrets {
            let wallet = Wallet::from_secret_hex(&secret)?;
            if wallet.address() != address {
                return Err(LedgerError::Encoding(format!(
                    "{}: key stored under {address} derives a different address",
                    path.display()
                )));
            }
            wallets.insert(address, wallet);
        }
        Ok(Self { wallets })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let secrets: BTreeMap<&str, String> = self
            .wallets
            .iter()
            .map(|(address, wallet)| (address.as_str(), wallet.secret_hex()))
            .collect();
        let json = serde_json::to_string_pretty(&secrets)
            .map_err(|e| LedgerError::Encoding(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Generate a wallet, keep it, and return its address.
    pub fn create_wallet(&mut self) -> String {
        let wallet = Wallet::new();
        let address = wallet.address();
        self.wallets.insert(address.clone(), wallet);
        info!("WALLET - created {}", address);
        address
    }

    pub fn get(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn require(&self, address: &str) -> Result<&Wallet> {
        self.get(address)
            .ok_or_else(|| LedgerError::WalletNotFound(address.to_string()))
    }

    /// Addresses in ascending order.
    pub fn addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}
