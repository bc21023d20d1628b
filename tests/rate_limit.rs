#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use movielog::config::ThrottleConfig;
use movielog::rate_limit::AuthThrottle;
use movielog::repo::inmem::InMemRepo;
use movielog::{config, AppState};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn throttled_state(limit: usize) -> AppState {
    let cfg = ThrottleConfig { enabled: true, limit, window: Duration::from_secs(300) };
    AppState::new(Arc::new(InMemRepo::new())).with_throttle(AuthThrottle::new(&cfg))
}

#[actix_web::test]
#[serial_test::serial]
async fn login_attempts_are_throttled_per_client() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
    let app = test::init_service(App::new().app_data(web::Data::new(throttled_state(2))).configure(config)).await;

    let attempt = |peer: &str| {
        test::TestRequest::post()
            .uri("/api/auth/login/")
            .peer_addr(peer.parse().unwrap())
            .set_json(json!({"email": "nobody@example.com", "password": "whatever-it-is"}))
            .to_request()
    };
    // unknown account, but the attempt still counts
    assert_eq!(test::call_service(&app, attempt("10.0.0.1:4000")).await.status(), 401);
    assert_eq!(test::call_service(&app, attempt("10.0.0.1:4000")).await.status(), 401);
    let resp = test::call_service(&app, attempt("10.0.0.1:4000")).await;
    assert_eq!(resp.status(), 429, "third attempt should be throttled");

    // another address has its own budget
    assert_eq!(test::call_service(&app, attempt("10.0.0.2:4000")).await.status(), 401);
}

#[actix_web::test]
#[serial_test::serial]
async fn registration_has_its_own_budget() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
    let app = test::init_service(App::new().app_data(web::Data::new(throttled_state(1))).configure(config)).await;

    let login = test::TestRequest::post()
        .uri("/api/auth/login/")
        .set_json(json!({"email": "nobody@example.com", "password": "whatever-it-is"}))
        .to_request();
    assert_eq!(test::call_service(&app, login).await.status(), 401);

    let register = |n: u8| {
        test::TestRequest::post()
            .uri("/api/auth/register/")
            .set_json(json!({"username": format!("user{n}"), "email": format!("user{n}@example.com"), "password": "long-enough-pw"}))
            .to_request()
    };
    assert_eq!(test::call_service(&app, register(1)).await.status(), 201);
    assert_eq!(test::call_service(&app, register(2)).await.status(), 429);
}

#[actix_web::test]
#[serial_test::serial]
async fn forwarded_headers_do_not_reset_the_budget() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
    let app = test::init_service(App::new().app_data(web::Data::new(throttled_state(1))).configure(config)).await;

    let attempt = |forwarded: &str| {
        test::TestRequest::post()
            .uri("/api/auth/login/")
            .peer_addr("10.0.0.9:4000".parse().unwrap())
            .insert_header(("X-Forwarded-For", forwarded.to_string()))
            .set_json(json!({"email": "nobody@example.com", "password": "whatever-it-is"}))
            .to_request()
    };
    assert_eq!(test::call_service(&app, attempt("192.0.2.1")).await.status(), 401);
    assert_eq!(test::call_service(&app, attempt("192.0.2.2")).await.status(), 429);
}
