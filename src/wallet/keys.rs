use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use std::fmt;

use super::address::{PubKeyHash, encode_address, hash_pubkey};
use crate::blockchain::Hash;
use crate::error::{LedgerError, Result};

/// A secp256k1 key pair. The address is derived on demand.
#[derive(Clone)]
pub struct Wallet {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Wallet {
    /// Generate a new secp256k1 keypair.
    pub fn new() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| LedgerError::Encoding(format!("secret key hex: {e}")))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| LedgerError::Encoding(format!("secret key: {e}")))?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Compressed public key (33 bytes).
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key.serialize().to_vec()
    }

    pub fn pubkey_hash(&self) -> PubKeyHash {
        hash_pubkey(&self.public_key.serialize())
    }

    pub fn address(&self) -> String {
        encode_address(&self.pubkey_hash())
    }

    /// DER-encoded ECDSA signature over a 32-byte digest.
    pub fn sign(&self, msg: &Hash) -> Vec<u8> {
        let secp = Secp256k1::signing_only();
        let msg = Message::from_digest(*msg);
        secp.sign_ecdsa(&msg, &self.secret_key)
            .serialize_der()
            .to_vec()
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Verify a DER signature against a serialized public key and a 32-byte
/// digest. Malformed keys or signatures verify as `false`.
pub fn verify_signature(pubkey: &[u8], signature: &[u8], msg: &Hash) -> bool {
    let Ok(pk) = PublicKey::from_slice(pubkey) else {
        return false;
    };
    let Ok(sig) = Signature::from_der(signature) else {
        return false;
    };
    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&Message::from_digest(*msg), &sig, &pk)
        .is_ok()
}
