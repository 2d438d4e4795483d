#![allow(dead_code)]

use actix_http::Request;
use actix_web::body::BoxBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web, App};
use async_trait::async_trait;
use std::sync::Arc;

use wakq::chain::{ChainConfig, ChainError, ReceiptSigner, SettlementSource, TxSettlement};
use wakq::repo::inmem::InMemRepo;
use wakq::routes::{config, AppState};

/// Settlement source for tests that never touch the chain.
pub struct NullSettlement;

#[async_trait]
impl SettlementSource for NullSettlement {
    async fn settlement(&self, _tx_hash: &str) -> Result<Option<TxSettlement>, ChainError> {
        Ok(None)
    }
}

/// Ensure JWT secret present & unique temp data dir per test.
pub fn setup_env() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
    let tmp = tempfile::tempdir().unwrap();
    std::env::set_var("WAKQ_DATA_DIR", tmp.path().to_str().unwrap());
}

pub fn test_state() -> AppState {
    test_state_with(InMemRepo::new(), Arc::new(NullSettlement), None)
}

pub fn test_state_with(
    repo: InMemRepo,
    settlement: Arc<dyn SettlementSource>,
    signer: Option<Arc<ReceiptSigner>>,
) -> AppState {
    AppState {
        repo: Arc::new(repo),
        settlement,
        signer,
        chain: ChainConfig::from_env(),
        rate_limiter: None,
    }
}

pub async fn spawn_app(
) -> impl Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error> {
    setup_env();
    spawn_app_with(test_state()).await
}

pub async fn spawn_app_with(
    state: AppState,
) -> impl Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(config),
    )
    .await
}

pub async fn post_json<S>(
    app: &S,
    uri: &str,
    body: &serde_json::Value,
    token: Option<&str>,
) -> ServiceResponse<BoxBody>
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error>,
{
    let mut req = test::TestRequest::post().uri(uri).set_json(body);
    if let Some(t) = token {
        req = req.insert_header(("Authorization", format!("Bearer {t}")));
    }
    test::call_service(app, req.to_request()).await
}

pub async fn put_json<S>(
    app: &S,
    uri: &str,
    body: &serde_json::Value,
    token: Option<&str>,
) -> ServiceResponse<BoxBody>
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error>,
{
    let mut req = test::TestRequest::put().uri(uri).set_json(body);
    if let Some(t) = token {
        req = req.insert_header(("Authorization", format!("Bearer {t}")));
    }
    test::call_service(app, req.to_request()).await
}

pub async fn get<S>(app: &S, uri: &str, token: Option<&str>) -> ServiceResponse<BoxBody>
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error>,
{
    let mut req = test::TestRequest::get().uri(uri);
    if let Some(t) = token {
        req = req.insert_header(("Authorization", format!("Bearer {t}")));
    }
    test::call_service(app, req.to_request()).await
}

pub async fn delete<S>(app: &S, uri: &str, token: Option<&str>) -> ServiceResponse<BoxBody>
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error>,
{
    let mut req = test::TestRequest::delete().uri(uri);
    if let Some(t) = token {
        req = req.insert_header(("Authorization", format!("Bearer {t}")));
    }
    test::call_service(app, req.to_request()).await
}

pub async fn body_json(resp: ServiceResponse<BoxBody>) -> serde_json::Value {
    serde_json::from_slice(&test::read_body(resp).await).expect("json body")
}

pub const WALLET_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const WALLET_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

/// Signup + wallet connect + session token for a ready-to-post account.
pub async fn register_user<S>(app: &S, email: &str, name: &str, wallet: &str) -> String
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error>,
{
    let resp = post_json(
        app,
        "/api/v1/auth/signup",
        &serde_json::json!({"email": email, "password": "hunter2hunter2", "user_name": name}),
        None,
    )
    .await;
    assert_eq!(resp.status(), 201, "signup failed for {email}");
    let token = wakq::auth::create_session_jwt(email).expect("jwt");
    let resp = put_json(
        app,
        "/api/v1/auth/user",
        &serde_json::json!({"wallet_address": wallet}),
        Some(&token),
    )
    .await;
    assert_eq!(resp.status(), 200, "wallet connect failed for {email}");
    token
}

/// Credit `whole` WAK onto the account's internal balance.
pub async fn fund<S>(app: &S, token: &str, whole: u64)
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error>,
{
    let resp = put_json(
        app,
        "/api/v1/auth/token-balance",
        &serde_json::json!({"op": "credit", "amount": {"amount": whole.to_string(), "unit": "whole"}}),
        Some(token),
    )
    .await;
    assert_eq!(resp.status(), 200, "funding failed");
}
