use actix_web::{HttpResponse, post, web};
use log::{debug, info, warn};
use std::time::Instant;

use super::models::{ApiError, AppState, SendRequest, SendResponse};

/// Build, sign and mine a transfer between two addresses. The sender's key
/// must be in the server's keystore.
#[post("/send/")]
pub async fn post_send(
    state: web::Data<AppState>,
    body: web::Json<SendRequest>,
) -> Result<HttpResponse, ApiError> {
    let t0 = Instant::now();
    let SendRequest { from, to, amount } = body.into_inner();
    debug!("POST /send/ - {} -> {} amount={}", from, to, amount);

    let wallet = state.wallets.lock().require(&from)?.clone();
    let ledger = state.ledger.clone();
    let block = match web::block(move || ledger.send(&wallet, &to, amount)).await? {
        Ok(block) => block,
        Err(e) => {
            warn!("POST /send/ - rejected: {}", e);
            return Err(e.into());
        }
    };

    // The transfer is the only transaction in the block.
    let txid = block
        .transactions
        .first()
        .map(|tx| tx.id_hex())
        .unwrap_or_default();
    info!(
        "POST /send/ - txid={} mined in block #{} ({} ms)",
        txid,
        block.height,
        t0.elapsed().as_millis()
    );

    Ok(HttpResponse::Ok().json(SendResponse {
        height: block.height,
        hash: block.hash_hex(),
        txid,
    }))
}
