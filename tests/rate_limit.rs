#![cfg(feature = "inmem-store")]

use serial_test::serial;
use std::sync::Arc;
use wakq::rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimiterFacade};
use wakq::repo::inmem::InMemRepo;
use wakq::routes::AppState;

mod common;
use common::WALLET_A;

fn limited_state(question_limit: usize) -> AppState {
    let cfg = RateLimitConfig {
        question_limit,
        question_window: std::time::Duration::from_secs(300),
        answer_limit: 100,
        answer_window: std::time::Duration::from_secs(60),
    };
    let mut state = common::test_state_with(
        InMemRepo::new(),
        Arc::new(common::NullSettlement),
        None,
    );
    state.rate_limiter = Some(RateLimiterFacade::new(InMemoryRateLimiter::new(true), cfg));
    state
}

#[actix_web::test]
#[serial]
async fn question_creation_is_rate_limited_per_ip() {
    common::setup_env();
    let app = common::spawn_app_with(limited_state(1)).await;
    let alice = common::register_user(&app, "alice@example.com", "alice", WALLET_A).await;
    common::fund(&app, &alice, 10).await;

    let question = |id: i64| {
        serde_json::json!({
            "id": id,
            "title": format!("q{id}"), "content": "C", "content_hash": "0x1",
            "reward": {"amount": "1", "unit": "whole"},
            "tags": []
        })
    };

    let resp = common::post_json(&app, "/api/v1/questions", &question(1), Some(&alice)).await;
    assert_eq!(resp.status(), 201);

    // Same client, same window: limited before any validation runs.
    let resp = common::post_json(&app, "/api/v1/questions", &question(2), Some(&alice)).await;
    assert_eq!(resp.status(), 429);
    let body = common::body_json(resp).await;
    assert_eq!(body["error"], "rate limited");
}
