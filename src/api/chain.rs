use actix_web::{HttpResponse, get, web};
use log::warn;

use pow_ledger::blockchain::Hash;

use super::models::{ApiError, AppState, BlockView, ChainResponse, ValidateResponse};

/// Get the full blockchain, tip first.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let ledger = state.ledger.clone();
    let resp = web::block(move || -> pow_ledger::Result<ChainResponse> {
        let blocks = ledger
            .blocks()
            .map(|b| b.map(|b| BlockView::from(&b)))
            .collect::<pow_ledger::Result<Vec<_>>>()?;
        Ok(ChainResponse {
            height: blocks.first().map(|b| b.height).unwrap_or(0),
            difficulty_bits: ledger.difficulty_bits(),
            blocks,
        })
    })
    .await??;
    Ok(HttpResponse::Ok().json(resp))
}

/// Look up one block by its hex hash.
#[get("/block/{hash}/")]
pub async fn get_block(
    state: web::Data<AppState>,
    path: web::Path<(String,)>,
) -> Result<HttpResponse, ApiError> {
    let (hash_hex,) = path.into_inner();
    let hash: Hash = hex::decode(&hash_hex)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("malformed block hash {hash_hex}")))?;

    let ledger = state.ledger.clone();
    match web::block(move || ledger.get_block(&hash)).await?? {
        Some(block) => Ok(HttpResponse::Ok().json(BlockView::from(&block))),
        None => Err(ApiError::NotFound(format!("block {hash_hex}"))),
    }
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let ledger = state.ledger.clone();
    let resp = match web::block(move || ledger.validate_chain()).await? {
        Ok(blocks) => ValidateResponse {
            valid: true,
            blocks: Some(blocks),
            error: None,
        },
        Err(e) => {
            warn!("GET /validate/ - chain invalid: {}", e);
            ValidateResponse {
                valid: false,
                blocks: None,
                error: Some(e.to_string()),
            }
        }
    };
    Ok(HttpResponse::Ok().json(resp))
}
