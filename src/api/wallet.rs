use actix_web::{HttpResponse, get, post, web};

use super::models::{ApiError, AppState, NewWalletResponse, WalletsResponse};

#[post("/wallet/new/")]
pub async fn create_wallet(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let mut wallets = state.wallets.lock();
    let address = wallets.create_wallet();
    wallets.save(&state.wallet_file)?;
    Ok(HttpResponse::Ok().json(NewWalletResponse { address }))
}

#[get("/wallets/")]
pub async fn list_wallets(state: web::Data<AppState>) -> HttpResponse {
    let addresses = state.wallets.lock().addresses();
    HttpResponse::Ok().json(WalletsResponse { addresses })
}
