#![cfg(feature = "postgres-store")]

//! Runs against `DATABASE_URL` when set; otherwise every test is skipped.

use movielog::auth::Role;
use movielog::models::*;
use movielog::repo::pg::PgRepo;
use movielog::repo::{CatalogRepo, CollectionRepo, MovieRepo, RepoError, ReportRepo, ReviewRepo, UserRepo, VoteRepo};
use sqlx::postgres::PgPoolOptions;

async fn pg_repo() -> Option<PgRepo> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await
        .ok()?;
    let repo = PgRepo::new(pool);
    repo.migrate().await.ok()?;
    Some(repo)
}

fn unique(prefix: &str) -> String {
    format!("{prefix}{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}

async fn user(repo: &PgRepo) -> User {
    let name = unique("u");
    repo.create_user(NewUser {
        username: name.clone(),
        email: format!("{name}@example.com"),
        first_name: String::new(),
        last_name: String::new(),
        password_hash: "x".into(),
        role: Role::User,
    })
    .await
    .unwrap()
}

async fn movie(repo: &PgRepo) -> Id {
    let title = unique("Movie ");
    let input = MovieInput {
        fields: MovieFields { title: title.clone(), original_title: title, vote_average: Some(7.0), ..Default::default() },
        relations: MovieRelations::default(),
    };
    repo.create_movie(input).await.unwrap().movie.id
}

#[tokio::test]
#[serial_test::serial]
async fn pg_catalog_upsert_and_stats() {
    let Some(repo) = pg_repo().await else { eprintln!("skip: no DATABASE_URL"); return; };
    let u = user(&repo).await;
    let m = movie(&repo).await;
    let entry = |notes: &str, rating: Option<f64>| NewCatalogEntry {
        user_id: u.id,
        movie_id: m,
        status: CatalogStatus::Watched,
        notes: notes.into(),
        personal_rating: rating,
    };
    let first = repo.upsert_catalog_entry(entry("one", Some(7.5))).await.unwrap();
    assert!(first.created);
    assert!(first.value.watched_at.is_some());
    let second = repo.upsert_catalog_entry(entry("two", None)).await.unwrap();
    assert!(!second.created);
    assert_eq!(second.value.id, first.value.id);
    assert_eq!(second.value.notes, "two");
    assert_eq!(second.value.personal_rating, Some(7.5));

    let stats = repo.catalog_stats(u.id).await.unwrap();
    assert_eq!((stats.total_movies, stats.watched, stats.total_rated), (1, 1, 1));

    assert_eq!(repo.remove_from_catalog(u.id, m).await.unwrap(), 1);
    assert!(matches!(repo.remove_from_catalog(u.id, m).await, Err(RepoError::NotFound)));
}

#[tokio::test]
#[serial_test::serial]
async fn pg_votes_and_reports_keep_counters() {
    let Some(repo) = pg_repo().await else { eprintln!("skip: no DATABASE_URL"); return; };
    let author = user(&repo).await;
    let reader = user(&repo).await;
    let m = movie(&repo).await;
    let review = repo
        .create_review(NewReview {
            user_id: author.id,
            movie_id: m,
            title: "Solid".into(),
            content: "Holds up.".into(),
            rating: 7.0,
            status: ReviewStatus::Published,
        })
        .await
        .unwrap();
    assert!(review.published_at.is_some());

    let vote = repo.upsert_vote(reader.id, review.id, VoteType::Helpful).await.unwrap();
    assert!(vote.created);
    assert_eq!(repo.get_review(review.id).await.unwrap().helpful_count, 1);
    let flipped = repo.upsert_vote(reader.id, review.id, VoteType::NotHelpful).await.unwrap();
    assert!(!flipped.created);
    assert_eq!(repo.get_review(review.id).await.unwrap().helpful_count, 0);
    assert!(matches!(
        repo.upsert_vote(author.id, review.id, VoteType::Helpful).await,
        Err(RepoError::Validation(_))
    ));

    let report = NewReport { user_id: reader.id, review_id: review.id, reason: ReportReason::Spam, description: String::new() };
    repo.create_report(report.clone()).await.unwrap();
    assert!(matches!(repo.create_report(report).await, Err(RepoError::Conflict(_))));
    let counters = repo.recount_review(review.id).await.unwrap();
    assert_eq!(counters, ReviewCounters { helpful_count: 0, reported_count: 1 });

    let hidden = repo.hide_review(review.id, author.id, "check".into()).await.unwrap();
    let restored = repo.restore_review(hidden.id, author.id).await.unwrap();
    assert_eq!(restored.status, ReviewStatus::Published);
    assert_eq!(restored.published_at, review.published_at);
}

#[tokio::test]
#[serial_test::serial]
async fn pg_restoring_a_hidden_draft_stamps_published_at() {
    let Some(repo) = pg_repo().await else { eprintln!("skip: no DATABASE_URL"); return; };
    let author = user(&repo).await;
    let m = movie(&repo).await;
    let review = repo
        .create_review(NewReview {
            user_id: author.id,
            movie_id: m,
            title: "Rough cut".into(),
            content: "Not finished.".into(),
            rating: 5.0,
            status: ReviewStatus::Draft,
        })
        .await
        .unwrap();
    assert_eq!(review.published_at, None);
    repo.hide_review(review.id, author.id, String::new()).await.unwrap();
    let restored = repo.restore_review(review.id, author.id).await.unwrap();
    assert_eq!(restored.status, ReviewStatus::Published);
    assert!(restored.published_at.is_some());
}

#[tokio::test]
#[serial_test::serial]
async fn pg_collection_items_follow_movie_deletion() {
    let Some(repo) = pg_repo().await else { eprintln!("skip: no DATABASE_URL"); return; };
    let owner = user(&repo).await;
    let keep = movie(&repo).await;
    let doomed = movie(&repo).await;
    let c = repo
        .create_collection(NewCollection { user_id: owner.id, name: "Shelf".into(), description: String::new(), is_public: false })
        .await
        .unwrap();
    repo.add_to_collection(c.collection.id, keep).await.unwrap();
    repo.add_to_collection(c.collection.id, doomed).await.unwrap();
    assert!(matches!(repo.add_to_collection(c.collection.id, keep).await, Err(RepoError::Conflict(_))));

    repo.delete_movie(doomed).await.unwrap();
    let record = repo.get_collection(c.collection.id).await.unwrap();
    assert_eq!(record.items.iter().map(|i| i.movie_id).collect::<Vec<_>>(), vec![keep]);
}
