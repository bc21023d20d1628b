#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use chrono::NaiveDate;
use movielog::auth::{issue_token_pair, Role};
use movielog::bulk::{BulkDump, BulkMovie};
use movielog::models::*;
use movielog::repo::inmem::InMemRepo;
use movielog::repo::{BulkLoadRepo, UserRepo};
use movielog::{config, AppState, SecurityHeaders};
use serde_json::{json, Value};
use serial_test::serial;
use std::sync::Arc;

// Helper to ensure JWT secret present
fn setup_env() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

async fn seeded_repo() -> InMemRepo {
    let movie = |id: Id, title: &str, vote: f64| BulkMovie {
        id,
        fields: MovieFields {
            title: title.into(),
            original_title: title.into(),
            vote_average: Some(vote),
            release_date: NaiveDate::from_ymd_opt(2000, 1, 1),
            ..Default::default()
        },
    };
    let dump = BulkDump {
        genres: vec![Genre { tmdb_id: 18, name: "Drama".into() }, Genre { tmdb_id: 28, name: "Action".into() }],
        production_companies: vec![ProductionCompany {
            tmdb_id: 4,
            name: "Paramount".into(),
            origin_country: Some("US".into()),
            logo_path: None,
        }],
        movies: vec![movie(10, "Heat", 8.3), movie(11, "Ran", 9.1), movie(12, "Ikiru", 9.0)],
        movie_genres: vec![(10, 28), (11, 18)],
        ..Default::default()
    };
    let repo = InMemRepo::new();
    repo.bulk_load(&dump).await.unwrap();
    repo
}

/// Creates an account directly in the store and returns it with a fresh access token.
async fn account(repo: &InMemRepo, name: &str, role: Role) -> (User, String) {
    let mut user = repo
        .create_user(NewUser {
            username: name.into(),
            email: format!("{name}@example.com"),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "unused".into(),
            role: Role::User,
        })
        .await
        .unwrap();
    if role != Role::User {
        user = repo.set_role(user.id, role).await.unwrap().1;
    }
    let token = issue_token_pair(&user).unwrap().access;
    (user, token)
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

macro_rules! app {
    ($repo:expr) => {
        test::init_service(
            App::new()
                .wrap(SecurityHeaders::default())
                .app_data(web::Data::new(AppState::new(Arc::new($repo.clone()))))
                .configure(config),
        )
        .await
    };
}

#[actix_web::test]
#[serial]
async fn catalogue_is_public_but_admin_written() {
    setup_env();
    let repo = seeded_repo().await;
    let (_, admin) = account(&repo, "admin", Role::Admin).await;
    let (_, user) = account(&repo, "user", Role::User).await;
    let app = app!(repo);

    // min_rating filter
    let req = test::TestRequest::get().uri("/api/movies/?min_rating=9.0&ordering=title").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["count"], 2);
    let titles: Vec<&str> = page["results"].as_array().unwrap().iter().map(|m| m["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Ikiru", "Ran"]);

    // malformed filter values are ignored
    let req = test::TestRequest::get().uri("/api/movies/?year=abc&min_rating=x").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["count"], 3);

    let req = test::TestRequest::get().uri("/api/movies/?page=4294967295").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert!(page["results"].as_array().unwrap().is_empty());
    assert_eq!(page["next"], Value::Null);

    let body = json!({"title": "Thief", "original_title": "Thief", "runtime": 122, "genre_ids": [18, 28]});
    let req = test::TestRequest::post().uri("/api/movies/").set_json(&body).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
    let req = test::TestRequest::post().uri("/api/movies/").insert_header(bearer(&user)).set_json(&body).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::post().uri("/api/movies/").insert_header(bearer(&admin)).set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let created: Value = test::read_body_json(resp).await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["genres"].as_array().unwrap().len(), 2);

    // PUT replaces the relation set
    let req = test::TestRequest::put()
        .uri(&format!("/api/movies/{id}/"))
        .insert_header(bearer(&admin))
        .set_json(json!({"title": "Thief", "original_title": "Thief", "genre_ids": [28], "production_company_ids": [4]}))
        .to_request();
    let replaced: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(replaced["genres"], json!([{"tmdb_id": 28, "name": "Action"}]));
    assert_eq!(replaced["production_companies"][0]["name"], "Paramount");
    assert_eq!(replaced["runtime"], Value::Null);

    // unknown key rejects the write as a field error
    let req = test::TestRequest::patch()
        .uri(&format!("/api/movies/{id}/"))
        .insert_header(bearer(&admin))
        .set_json(json!({"genre_ids": [404]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["field"], "genre_ids");

    let req = test::TestRequest::patch()
        .uri(&format!("/api/movies/{id}/"))
        .insert_header(bearer(&admin))
        .set_json(json!({"vote_average": 10.5}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::get().uri(&format!("/api/movies/{id}/")).to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["genres"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get().uri("/api/movies/stats/").to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["total_movies"], 4);

    let req = test::TestRequest::get().uri("/api/genres/").to_request();
    let genres: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(genres[0]["name"], "Action");

    let req = test::TestRequest::delete().uri(&format!("/api/movies/{id}/")).insert_header(bearer(&admin)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
    let req = test::TestRequest::get().uri(&format!("/api/movies/{id}/")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
#[serial]
async fn bookmark_twice_updates_in_place() {
    setup_env();
    let repo = seeded_repo().await;
    let (_, alice) = account(&repo, "alice", Role::User).await;
    let (_, bob) = account(&repo, "bob", Role::User).await;
    let app = app!(repo);

    let req = test::TestRequest::post()
        .uri("/api/catalog/entries/bookmark/")
        .insert_header(bearer(&alice))
        .set_json(json!({"movie_id": 10, "notes": "first"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let first: Value = test::read_body_json(resp).await;
    assert_eq!(first["movie"]["title"], "Heat");

    let req = test::TestRequest::post()
        .uri("/api/catalog/entries/bookmark/")
        .insert_header(bearer(&alice))
        .set_json(json!({"movie_id": 10, "notes": "second"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let second: Value = test::read_body_json(resp).await;
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["notes"], "second");

    let req = test::TestRequest::get().uri("/api/catalog/entries/bookmarked/").insert_header(bearer(&alice)).to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    // entries are private to their owner
    let entry_uri = format!("/api/catalog/entries/{}/", first["id"]);
    let req = test::TestRequest::get().uri(&entry_uri).insert_header(bearer(&bob)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
    let req = test::TestRequest::get().uri("/api/catalog/entries/").insert_header(bearer(&bob)).to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    assert!(list.as_array().unwrap().is_empty());

    let req = test::TestRequest::post()
        .uri("/api/catalog/entries/mark_watched/")
        .insert_header(bearer(&alice))
        .set_json(json!({"movie_id": 10, "personal_rating": 11}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["field"], "personal_rating");

    let req = test::TestRequest::post()
        .uri("/api/catalog/entries/add_to_watchlist/")
        .insert_header(bearer(&alice))
        .set_json(json!({"movie_id": 999}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["field"], "movie_id");

    let req = test::TestRequest::get().uri("/api/catalog/entries/stats/").insert_header(bearer(&alice)).to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["bookmarked"], 1);

    let remove = |body: Value| {
        test::TestRequest::delete()
            .uri("/api/catalog/entries/remove/")
            .insert_header(bearer(&alice))
            .set_json(body)
            .to_request()
    };
    assert_eq!(test::call_service(&app, remove(json!({}))).await.status(), 400);
    assert_eq!(test::call_service(&app, remove(json!({"movie_id": 10}))).await.status(), 204);
    assert_eq!(test::call_service(&app, remove(json!({"movie_id": 10}))).await.status(), 404);
}

#[actix_web::test]
#[serial]
async fn review_votes_and_reports() {
    setup_env();
    let repo = seeded_repo().await;
    let (_, author) = account(&repo, "author", Role::Critic).await;
    let (_, reader) = account(&repo, "reader", Role::User).await;
    let app = app!(repo);

    let review_body = json!({"movie_id": 11, "title": "Lear on horseback", "content": "Kurosawa at full power.", "rating": 9.5});
    let req = test::TestRequest::post().uri("/api/reviews/").insert_header(bearer(&author)).set_json(&review_body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let review: Value = test::read_body_json(resp).await;
    assert_eq!(review["status"], "DRAFT");
    assert_eq!(review["can_edit"], true);
    let id = review["id"].as_i64().unwrap();

    // drafts are invisible to others
    let req = test::TestRequest::get().uri(&format!("/api/reviews/{id}/")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::post().uri("/api/reviews/").insert_header(bearer(&author)).set_json(&review_body).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 409);

    let publish = || {
        test::TestRequest::post()
            .uri(&format!("/api/reviews/{id}/publish/"))
            .insert_header(bearer(&author))
            .to_request()
    };
    assert_eq!(test::call_service(&app, publish()).await.status(), 200);
    let resp = test::call_service(&app, publish()).await;
    assert_eq!(resp.status(), 400);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["field"], "status");

    let vote = |token: &str, vote_type: &str| {
        test::TestRequest::post()
            .uri("/api/votes/")
            .insert_header(bearer(token))
            .set_json(json!({"review_id": id, "vote_type": vote_type}))
            .to_request()
    };
    assert_eq!(test::call_service(&app, vote(&reader, "HELPFUL")).await.status(), 201);
    let req = test::TestRequest::get().uri(&format!("/api/reviews/{id}/")).insert_header(bearer(&reader)).to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["helpful_count"], 1);
    assert_eq!(detail["user_vote"], "HELPFUL");
    assert_eq!(detail["can_edit"], false);

    assert_eq!(test::call_service(&app, vote(&reader, "NOT_HELPFUL")).await.status(), 200);
    let req = test::TestRequest::get().uri(&format!("/api/reviews/{id}/")).to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["helpful_count"], 0);

    let resp = test::call_service(&app, vote(&author, "HELPFUL")).await;
    assert_eq!(resp.status(), 400);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["field"], "review_id");

    let report = |token: &str| {
        test::TestRequest::post()
            .uri("/api/reports/")
            .insert_header(bearer(token))
            .set_json(json!({"review_id": id, "reason": "SPOILERS"}))
            .to_request()
    };
    assert_eq!(test::call_service(&app, report(&author)).await.status(), 400);
    assert_eq!(test::call_service(&app, report(&reader)).await.status(), 201);
    assert_eq!(test::call_service(&app, report(&reader)).await.status(), 409);

    let req = test::TestRequest::get().uri("/api/reviews/?ordering=helpful").to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list[0]["reported_count"], 1);
    assert_eq!(list[0]["moderation_notes"], "");

    // reporters only see their own reports and cannot resolve them
    let req = test::TestRequest::get().uri("/api/reports/").insert_header(bearer(&author)).to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    assert!(mine.as_array().unwrap().is_empty());
    let req = test::TestRequest::get().uri("/api/reports/pending/").insert_header(bearer(&reader)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
}

#[actix_web::test]
#[serial]
async fn hide_and_restore_preserve_published_at() {
    setup_env();
    let repo = seeded_repo().await;
    let (_, author) = account(&repo, "writer", Role::User).await;
    let (_, moderator) = account(&repo, "mod", Role::Moderator).await;
    let app = app!(repo);

    let req = test::TestRequest::post()
        .uri("/api/reviews/")
        .insert_header(bearer(&author))
        .set_json(json!({"movie_id": 12, "title": "Quiet", "content": "A civil servant's last months.", "rating": 9, "status": "PUBLISHED"}))
        .to_request();
    let review: Value = test::call_and_read_body_json(&app, req).await;
    let id = review["id"].as_i64().unwrap();
    let published_at = review["published_at"].clone();
    assert!(!published_at.is_null());

    let req = test::TestRequest::post()
        .uri(&format!("/api/moderation/{id}/hide/"))
        .insert_header(bearer(&author))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    // a body that does not parse is rejected, not read as "no notes"
    let req = test::TestRequest::post()
        .uri(&format!("/api/moderation/{id}/hide/"))
        .insert_header(bearer(&moderator))
        .insert_header(("content-type", "application/json"))
        .set_payload(r#"{"moderation_notes": "under review""#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["field"], "body");
    let req = test::TestRequest::get().uri(&format!("/api/reviews/{id}/")).to_request();
    let still: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(still["status"], "PUBLISHED");

    let req = test::TestRequest::post()
        .uri(&format!("/api/moderation/{id}/hide/"))
        .insert_header(bearer(&moderator))
        .set_json(json!({"moderation_notes": "under review"}))
        .to_request();
    let hidden: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(hidden["status"], "HIDDEN");
    assert_eq!(hidden["moderation_notes"], "under review");

    let req = test::TestRequest::get().uri("/api/reviews/").to_request();
    let public: Value = test::call_and_read_body_json(&app, req).await;
    assert!(public.as_array().unwrap().is_empty());
    let req = test::TestRequest::get().uri(&format!("/api/reviews/{id}/")).insert_header(bearer(&author)).to_request();
    let own: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(own["status"], "HIDDEN");
    assert_eq!(own["moderation_notes"], "");

    let req = test::TestRequest::get().uri("/api/moderation/pending/").insert_header(bearer(&moderator)).to_request();
    let queue: Value = test::call_and_read_body_json(&app, req).await;
    assert!(queue.as_array().unwrap().is_empty());

    let req = test::TestRequest::post()
        .uri(&format!("/api/moderation/{id}/restore/"))
        .insert_header(bearer(&moderator))
        .to_request();
    let restored: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(restored["status"], "PUBLISHED");
    assert_eq!(restored["published_at"], published_at);

    let req = test::TestRequest::post()
        .uri(&format!("/api/moderation/{id}/restore/"))
        .insert_header(bearer(&moderator))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::post()
        .uri(&format!("/api/moderation/{id}/feature/"))
        .insert_header(bearer(&moderator))
        .to_request();
    let featured: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(featured["is_featured"], true);
    let req = test::TestRequest::get().uri("/api/reviews/featured/").to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let req = test::TestRequest::post()
        .uri(&format!("/api/reviews/{id}/recount/"))
        .insert_header(bearer(&moderator))
        .to_request();
    let counters: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(counters, json!({"helpful_count": 0, "reported_count": 0}));
}

#[actix_web::test]
#[serial]
async fn collections_are_owner_scoped() {
    setup_env();
    let repo = seeded_repo().await;
    let (_, owner) = account(&repo, "owner", Role::User).await;
    let (_, other) = account(&repo, "other", Role::Admin).await;
    let app = app!(repo);

    let create = || {
        test::TestRequest::post()
            .uri("/api/catalog/collections/")
            .insert_header(bearer(&owner))
            .set_json(json!({"name": "Favorites"}))
            .to_request()
    };
    let resp = test::call_service(&app, create()).await;
    assert_eq!(resp.status(), 201);
    let c: Value = test::read_body_json(resp).await;
    let id = c["id"].as_i64().unwrap();
    assert_eq!(test::call_service(&app, create()).await.status(), 409);

    let add = |movie: Value| {
        test::TestRequest::post()
            .uri(&format!("/api/catalog/collections/{id}/add_movie/"))
            .insert_header(bearer(&owner))
            .set_json(json!({ "movie_id": movie }))
            .to_request()
    };
    assert_eq!(test::call_service(&app, add(json!(10))).await.status(), 201);
    assert_eq!(test::call_service(&app, add(json!(10))).await.status(), 409);
    assert_eq!(test::call_service(&app, add(Value::Null)).await.status(), 400);

    // private: even an admin gets 403
    let uri = format!("/api/catalog/collections/{id}/");
    let req = test::TestRequest::get().uri(&uri).insert_header(bearer(&other)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header(bearer(&owner))
        .set_json(json!({"is_public": true}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    let req = test::TestRequest::get().uri(&uri).insert_header(bearer(&other)).to_request();
    let view: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(view["movie_count"], 1);
    assert_eq!(view["movies"][0]["movie"]["title"], "Heat");

    let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(&other)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::get().uri("/api/catalog/collections/my_collections/").insert_header(bearer(&other)).to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    assert!(mine.as_array().unwrap().is_empty());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/catalog/collections/{id}/remove_movie/"))
        .insert_header(bearer(&owner))
        .set_json(json!({"movie_id": 10}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
}

#[actix_web::test]
#[serial]
async fn role_change_needs_fresh_login() {
    setup_env();
    let repo = seeded_repo().await;
    let (_, admin) = account(&repo, "root", Role::Admin).await;
    let app = app!(repo);

    let req = test::TestRequest::post()
        .uri("/api/auth/register/")
        .set_json(json!({"username": "newbie", "email": "newbie@Example.COM", "password": "hunter2hunter2"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let registered: Value = test::read_body_json(resp).await;
    assert!(registered.get("password").is_none());
    assert_eq!(registered["user"]["email"], "newbie@example.com");
    let user_id = registered["user"]["id"].as_i64().unwrap();

    let login = || {
        test::TestRequest::post()
            .uri("/api/auth/login/")
            .set_json(json!({"email": "newbie@EXAMPLE.com", "password": "hunter2hunter2"}))
            .to_request()
    };
    let tokens: Value = test::call_and_read_body_json(&app, login()).await;
    let stale = tokens["access"].as_str().unwrap().to_string();

    let role_uri = format!("/api/auth/users/{user_id}/role/");
    let req = test::TestRequest::patch()
        .uri(&role_uri)
        .insert_header(bearer(&stale))
        .set_json(json!({"role": "ADMIN"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::patch()
        .uri(&role_uri)
        .insert_header(bearer(&admin))
        .set_json(json!({"role": "overlord"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["field"], "role");

    let req = test::TestRequest::patch()
        .uri("/api/auth/users/424242/role/")
        .insert_header(bearer(&admin))
        .set_json(json!({"role": "CRITIC"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::patch()
        .uri(&role_uri)
        .insert_header(bearer(&admin))
        .set_json(json!({"role": "moderator"}))
        .to_request();
    let changed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(changed["old_role"], "USER");
    assert_eq!(changed["new_role"], "MODERATOR");

    // the old token still carries USER
    let req = test::TestRequest::get().uri("/api/moderation/").insert_header(bearer(&stale)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let tokens: Value = test::call_and_read_body_json(&app, login()).await;
    let fresh = tokens["access"].as_str().unwrap();
    let req = test::TestRequest::get().uri("/api/moderation/").insert_header(bearer(fresh)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    // profile self-update cannot touch the role
    let req = test::TestRequest::patch()
        .uri("/api/auth/users/me/")
        .insert_header(bearer(fresh))
        .set_json(json!({"first_name": "New", "role": "ADMIN"}))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["first_name"], "New");
    assert_eq!(me["role"], "MODERATOR");
}

#[actix_web::test]
#[serial]
async fn malformed_json_is_a_body_error() {
    setup_env();
    let repo = seeded_repo().await;
    let (_, user) = account(&repo, "sloppy", Role::User).await;
    let app = app!(repo);

    let req = test::TestRequest::post()
        .uri("/api/catalog/entries/bookmark/")
        .insert_header(bearer(&user))
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["field"], "body");
}
