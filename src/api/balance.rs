use actix_web::{HttpResponse, get, web};

use super::models::{ApiError, AppState, BalanceResponse};

#[get("/balance/{address}/")]
pub async fn get_balance(
    state: web::Data<AppState>,
    path: web::Path<(String,)>,
) -> Result<HttpResponse, ApiError> {
    let address = path.into_inner().0;
    let outputs = state.ledger.unspent_outputs(&address)?;
    let balance = outputs
        .iter()
        .fold(0u64, |acc, (_, out)| acc.saturating_add(out.value));

    Ok(HttpResponse::Ok().json(BalanceResponse {
        address,
        balance,
        utxos: outputs.len(),
    }))
}
