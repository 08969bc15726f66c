pub mod address;
pub mod keys;
pub mod store;

pub use address::{
    ADDRESS_VERSION, CHECKSUM_LEN, PubKeyHash, decode_address, encode_address, hash_pubkey,
    validate_address,
};
pub use keys::{Wallet, verify_signature};
pub use store::Wallets;
