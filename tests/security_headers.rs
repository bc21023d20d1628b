#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App, HttpResponse};
use movielog::repo::inmem::InMemRepo;
use movielog::{config, AppState, SecurityHeaders};
use std::sync::Arc;

fn state() -> web::Data<AppState> {
    web::Data::new(AppState::new(Arc::new(InMemRepo::new())))
}

#[actix_web::test]
#[serial_test::serial]
async fn test_security_headers_present() {
    std::env::remove_var("ENABLE_HSTS");
    let app = test::init_service(App::new().wrap(SecurityHeaders::from_env()).app_data(state()).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/movies/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let headers = resp.headers();
    assert!(headers.get("content-security-policy").unwrap().to_str().unwrap().contains("default-src 'none'"));
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert!(headers.get("strict-transport-security").is_none()); // not enabled
}

#[actix_web::test]
#[serial_test::serial]
async fn test_error_responses_carry_headers() {
    let app = test::init_service(App::new().wrap(SecurityHeaders::default()).app_data(state()).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/movies/12345/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
}

#[actix_web::test]
#[serial_test::serial]
async fn test_hsts_enabled_via_builder() {
    let sec = SecurityHeaders::from_env().with_hsts(true);
    let app = test::init_service(App::new().wrap(sec).app_data(state()).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/genres/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert!(resp.headers().get("strict-transport-security").is_some(), "HSTS header missing");
}

#[actix_web::test]
#[serial_test::serial]
async fn test_env_var_enables_hsts() {
    std::env::set_var("ENABLE_HSTS", "1");
    let app = test::init_service(App::new().wrap(SecurityHeaders::from_env()).app_data(state()).configure(config)).await;
    let req = test::TestRequest::get().uri("/api/movies/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get("strict-transport-security").is_some());
    std::env::remove_var("ENABLE_HSTS");
}

#[actix_web::test]
#[serial_test::serial]
async fn test_builder_can_disable_hsts_even_when_env_set() {
    std::env::set_var("ENABLE_HSTS", "true");
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env().with_hsts(false))
            .app_data(state())
            .configure(config),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/movies/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get("strict-transport-security").is_none());
    std::env::remove_var("ENABLE_HSTS");
}

#[actix_web::test]
#[serial_test::serial]
async fn test_existing_csp_is_preserved_and_docs_are_relaxed() {
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::default())
            .route(
                "/custom",
                web::get().to(|| async {
                    HttpResponse::Ok().insert_header(("Content-Security-Policy", "default-src 'self'")).finish()
                }),
            )
            .route("/docs/index.html", web::get().to(|| async { HttpResponse::Ok().body("<html></html>") })),
    )
    .await;
    let req = test::TestRequest::get().uri("/custom").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get("content-security-policy").unwrap(), "default-src 'self'");

    let req = test::TestRequest::get().uri("/docs/index.html").to_request();
    let resp = test::call_service(&app, req).await;
    let csp = resp.headers().get("content-security-policy").unwrap().to_str().unwrap().to_string();
    assert!(csp.contains("script-src 'self' 'unsafe-inline'"), "{csp}");
}
