use actix_web::{dev::Payload, test, FromRequest};
use chrono::Utc;
use movielog::auth::{decode_token, issue_token_pair, refresh_access_token, Auth, Role, TokenType};
use movielog::models::User;
use serial_test::serial;
use std::env;

// Helper that guarantees a sufficiently long secret for tests.
fn set_secret() {
    env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

fn critic() -> User {
    User {
        id: 42,
        username: "tester".into(),
        email: "tester@example.com".into(),
        first_name: String::new(),
        last_name: String::new(),
        role: Role::Critic,
        date_joined: Utc::now(),
    }
}

async fn extract(token: &str) -> actix_web::Result<Auth> {
    let req = test::TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_http_request();
    let mut pl = Payload::None;
    Auth::from_request(&req, &mut pl).await
}

#[actix_web::test]
#[serial]
async fn access_token_roundtrip_ok() {
    set_secret();
    let pair = issue_token_pair(&critic()).expect("tokens");
    // The Auth extractor is the public way to validate, so use it here.
    let auth = extract(&pair.access).await.expect("extract");
    assert_eq!(auth.0.user_id, 42);
    assert_eq!(auth.0.username, "tester");
    assert_eq!(auth.0.role, Role::Critic);
    assert_eq!(auth.actor().role, Role::Critic);
}

#[actix_web::test]
#[serial]
async fn extractor_rejects_invalid_and_refresh_tokens() {
    set_secret();
    assert!(extract("notatoken").await.is_err());
    let pair = issue_token_pair(&critic()).expect("tokens");
    assert!(extract(&pair.refresh).await.is_err());

    let req = test::TestRequest::default().to_http_request();
    let mut pl = Payload::None;
    assert!(Auth::from_request(&req, &mut pl).await.is_err());
}

#[actix_web::test]
#[serial]
async fn refresh_issues_a_new_access_token() {
    set_secret();
    let pair = issue_token_pair(&critic()).expect("tokens");
    let access = refresh_access_token(&pair.refresh).expect("refresh");
    let claims = decode_token(&access, TokenType::Access).expect("decode");
    assert_eq!(claims.user_id, 42);
    assert_eq!(claims.role, Role::Critic);
    // an access token cannot be used to refresh
    assert!(refresh_access_token(&pair.access).is_err());
}

#[actix_web::test]
#[serial]
async fn tokens_signed_with_another_secret_are_rejected() {
    env::set_var("JWT_SECRET", "another-secret-that-is-32-bytes-long");
    let pair = issue_token_pair(&critic()).expect("tokens");
    set_secret();
    assert!(extract(&pair.access).await.is_err());
}

#[cfg(feature = "inmem-store")]
mod http {
    use actix_web::{test, web, App};
    use movielog::repo::inmem::InMemRepo;
    use movielog::{config, AppState};
    use serde_json::{json, Value};
    use serial_test::serial;
    use std::sync::Arc;

    use super::set_secret;

    #[actix_web::test]
    #[serial]
    async fn register_login_and_refresh() {
        set_secret();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(Arc::new(InMemRepo::new()))))
                .configure(config),
        )
        .await;

        let register = |username: &str, email: &str| {
            test::TestRequest::post()
                .uri("/api/auth/register/")
                .set_json(json!({"username": username, "email": email, "password": "correct horse battery"}))
                .to_request()
        };
        let resp = test::call_service(&app, register("cinephile", "cine@example.com")).await;
        assert_eq!(resp.status(), 201);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "User registered successfully");
        assert_eq!(body["user"]["role"], "USER");
        assert!(!body.to_string().contains("correct horse"));

        let resp = test::call_service(&app, register("someone", "cine@EXAMPLE.com")).await;
        assert_eq!(resp.status(), 409);
        // the local part is kept exactly as given
        let resp = test::call_service(&app, register("othercase", "Cine@example.com")).await;
        assert_eq!(resp.status(), 201);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["user"]["email"], "Cine@example.com");
        let req = test::TestRequest::post()
            .uri("/api/auth/register/")
            .set_json(json!({"username": "brief", "email": "brief@example.com", "password": "short"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let err: Value = test::read_body_json(resp).await;
        assert_eq!(err["field"], "password");

        let login = |password: &str| {
            test::TestRequest::post()
                .uri("/api/auth/login/")
                .set_json(json!({"email": "cine@example.com", "password": password}))
                .to_request()
        };
        assert_eq!(test::call_service(&app, login("wrong password")).await.status(), 401);
        let tokens: Value = test::call_and_read_body_json(&app, login("correct horse battery")).await;
        let access = tokens["access"].as_str().unwrap();
        let refresh = tokens["refresh"].as_str().unwrap();

        let req = test::TestRequest::post()
            .uri("/api/auth/login/refresh/")
            .set_json(json!({ "refresh": refresh }))
            .to_request();
        let refreshed: Value = test::call_and_read_body_json(&app, req).await;
        assert!(refreshed["access"].is_string());

        let req = test::TestRequest::post()
            .uri("/api/auth/login/refresh/")
            .set_json(json!({ "refresh": access }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);

        let req = test::TestRequest::get()
            .uri("/api/auth/users/me/")
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_request();
        let me: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(me["username"], "cinephile");

        let req = test::TestRequest::get()
            .uri("/api/auth/users/")
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);
    }
}
