#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use serial_test::serial;
use wakq::SecurityHeaders;

mod common;

#[actix_web::test]
#[serial]
async fn default_headers_are_applied() {
    common::setup_env();
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(web::Data::new(common::test_state()))
            .configure(wakq::config),
    )
    .await;

    let req = test::TestRequest::get().uri("/healthz").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let headers = resp.headers();
    assert_eq!(
        headers.get("content-security-policy").unwrap(),
        "default-src 'none'; frame-ancestors 'none'; base-uri 'none'"
    );
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    // HSTS stays off unless explicitly enabled.
    assert!(headers.get("strict-transport-security").is_none());
}

#[actix_web::test]
#[serial]
async fn hsts_is_opt_in() {
    common::setup_env();
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::default().with_hsts(true))
            .app_data(web::Data::new(common::test_state()))
            .configure(wakq::config),
    )
    .await;

    let req = test::TestRequest::get().uri("/healthz").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get("strict-transport-security").is_some());
}
