use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use pow_ledger::wallet::encode_address;
use pow_ledger::{Block, Ledger, LedgerError, Transaction, Wallets};

/// Shared application state: the ledger handle plus the keystore.
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub wallets: Mutex<Wallets>,
    pub wallet_file: PathBuf,
}

/* ---------- Errors ---------- */

#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    Blocking(String),
    BadRequest(String),
    NotFound(String),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        ApiError::Blocking(err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Ledger(e) => write!(f, "{e}"),
            ApiError::Blocking(e) => write!(f, "worker failed: {e}"),
            ApiError::BadRequest(e) => write!(f, "{e}"),
            ApiError::NotFound(e) => write!(f, "{e} not found"),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Ledger(
                LedgerError::InsufficientFunds { .. }
                | LedgerError::InvalidAddress(_)
                | LedgerError::InvalidTransaction(_)
                | LedgerError::InvalidSignature(_)
                | LedgerError::DoubleSpend(_),
            )
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(LedgerError::WalletNotFound(_)) | ApiError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize, Deserialize)]
pub struct InputView {
    pub txid: String,
    pub vout: u32,
}

#[derive(Serialize, Deserialize)]
pub struct OutputView {
    pub value: u64,
    pub address: String,
}

#[derive(Serialize, Deserialize)]
pub struct TxView {
    pub id: String,
    pub inputs: Vec<InputView>,
    pub outputs: Vec<OutputView>,
}

impl From<&Transaction> for TxView {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id_hex(),
            inputs: tx
                .inputs
                .iter()
                .map(|i| InputView {
                    txid: hex::encode(i.outpoint.txid),
                    vout: i.outpoint.vout,
                })
                .collect(),
            outputs: tx
                .outputs
                .iter()
                .map(|o| OutputView {
                    value: o.value,
                    address: encode_address(&o.pubkey_hash),
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct BlockView {
    pub height: u64,
    pub hash: String,
    pub prev_hash: String,
    pub timestamp: i64,
    pub nonce: u64,
    pub transactions: Vec<TxView>,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            height: block.height,
            hash: block.hash_hex(),
            prev_hash: hex::encode(block.prev_hash),
            timestamp: block.timestamp,
            nonce: block.nonce,
            transactions: block.transactions.iter().map(TxView::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct ChainResponse {
    pub height: u64,
    pub difficulty_bits: u32,
    /// Tip first.
    pub blocks: Vec<BlockView>,
}

#[derive(Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub blocks: Option<u64>,
    pub error: Option<String>,
}

/* ---------- TX API Models ---------- */

#[derive(Deserialize, Serialize)]
pub struct SendRequest {
    pub from: String,
    pub to: String,
    pub amount: u64,
}

#[derive(Serialize, Deserialize)]
pub struct SendResponse {
    pub height: u64,
    pub hash: String,
    pub txid: String,
}

/* ---------- Balance / Wallet API Models ---------- */

#[derive(Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
    pub utxos: usize,
}

#[derive(Serialize, Deserialize)]
pub struct NewWalletResponse {
    pub address: String,
}

#[derive(Serialize, Deserialize)]
pub struct WalletsResponse {
    pub addresses: Vec<String>,
}
