mod balance;
mod chain;
mod health;
pub mod models;
mod tx;
mod wallet;

use actix_web::web::{self, ServiceConfig};
use actix_web::{App, HttpServer};
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;

use pow_ledger::{Ledger, LedgerConfig, Wallets};

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::get_block)
            .service(chain::validate_chain)
            .service(balance::get_balance)
            .service(tx::post_send)
            .service(wallet::create_wallet)
            .service(wallet::list_wallets),
    );
}

/// Serve the JSON API until the server is stopped.
pub async fn serve(ledger: Ledger, config: LedgerConfig) -> std::io::Result<()> {
    let wallets = Wallets::load(&config.wallet_file)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let state = web::Data::new(AppState {
        ledger: Arc::new(ledger),
        wallets: Mutex::new(wallets),
        wallet_file: config.wallet_file.clone(),
    });

    info!(
        "Starting ledger API at http://{}:{}",
        config.host, config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(init_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::models::{
        BalanceResponse, BlockView, ChainResponse, SendRequest, SendResponse, ValidateResponse,
    };
    use super::*;
    use actix_web::{http::StatusCode, test};
    use pow_ledger::{GenesisPolicy, ProofOfWork};

    fn state_with_funded_wallet(dir: &std::path::Path) -> (web::Data<AppState>, String) {
        let mut wallets = Wallets::new();
        let owner = wallets.create_wallet();
        let db = sled::Config::new().temporary(true).open().unwrap();
        let ledger =
            Ledger::create(db, &owner, 10, ProofOfWork::new(8), GenesisPolicy::Mined).unwrap();
        let state = web::Data::new(AppState {
            ledger: Arc::new(ledger),
            wallets: Mutex::new(wallets),
            wallet_file: dir.join("wallets.json"),
        });
        (state, owner)
    }

    #[actix_web::test]
    async fn health_and_balance() {
        let dir = tempfile::tempdir().unwrap();
        let (state, owner) = state_with_funded_wallet(dir.path());
        let app = test::init_service(App::new().app_data(state).configure(init_routes)).await;

        let req = test::TestRequest::get().uri("/api/v1/health/").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/balance/{owner}/"))
            .to_request();
        let body: BalanceResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.balance, 10);
        assert_eq!(body.utxos, 1);

        let req = test::TestRequest::get()
            .uri("/api/v1/balance/not-an-address/")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn send_mines_a_block() {
        let dir = tempfile::tempdir().unwrap();
        let (state, owner) = state_with_funded_wallet(dir.path());
        let app = test::init_service(App::new().app_data(state).configure(init_routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/wallet/new/").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert!(dir.path().join("wallets.json").exists());
        let recipient = pow_ledger::Wallet::new().address();

        let req = test::TestRequest::post()
            .uri("/api/v1/send/")
            .set_json(SendRequest {
                from: owner.clone(),
                to: recipient.clone(),
                amount: 4,
            })
            .to_request();
        let sent: SendResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(sent.height, 1);

        let req = test::TestRequest::post()
            .uri("/api/v1/send/")
            .set_json(SendRequest {
                from: owner.clone(),
                to: recipient,
                amount: 100,
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/v1/chain/").to_request();
        let chain: ChainResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(chain.height, 1);
        assert_eq!(chain.blocks.len(), 2);
        assert_eq!(chain.blocks[0].transactions[0].id, sent.txid);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/block/{}/", sent.hash))
            .to_request();
        let block: BlockView = test::call_and_read_body_json(&app, req).await;
        assert_eq!(block.height, 1);
        assert_eq!(block.transactions[0].id, sent.txid);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/block/{}/", "ab".repeat(32)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/api/v1/block/zz/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/v1/validate/").to_request();
        let validity: ValidateResponse = test::call_and_read_body_json(&app, req).await;
        assert!(validity.valid);
        assert_eq!(validity.blocks, Some(2));
    }
}
