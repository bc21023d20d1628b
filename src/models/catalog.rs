use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Id, MovieSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "catalog_status", rename_all = "snake_case")]
pub enum CatalogStatus {
    Bookmarked,
    Watched,
    WantToWatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CatalogEntry {
    pub id: Id,
    pub user_id: Id,
    pub movie_id: Id,
    pub status: CatalogStatus,
    pub notes: String,
    pub personal_rating: Option<f64>,
    pub added_at: DateTime<Utc>,
    pub watched_at: Option<DateTime<Utc>>,
}

/// Catalog entry with the movie it points at.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogEntryView {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    pub movie: Option<MovieSummary>,
}

/// Body of the quick actions (`bookmark`, `mark_watched`, `add_to_watchlist`).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CatalogAction {
    pub movie_id: Id,
    pub notes: Option<String>,
    pub personal_rating: Option<f64>,
}

/// Generic create body for `POST /catalog/entries/`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewCatalogEntryRequest {
    pub movie_id: Id,
    pub status: CatalogStatus,
    #[serde(default)]
    pub notes: String,
    pub personal_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCatalogEntry {
    pub user_id: Id,
    pub movie_id: Id,
    pub status: CatalogStatus,
    pub notes: String,
    pub personal_rating: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CatalogEntryUpdate {
    pub notes: Option<String>,
    pub personal_rating: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RemoveFromCatalog {
    pub movie_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CatalogStats {
    /// Distinct movies with at least one entry.
    pub total_movies: i64,
    pub bookmarked: i64,
    pub watched: i64,
    pub want_to_watch: i64,
    pub avg_personal_rating: Option<f64>,
    pub total_rated: i64,
}

/// Result of an idempotent upsert: `created` is false when the row already existed.
#[derive(Debug, Clone)]
pub struct Upserted<T> {
    pub value: T,
    pub created: bool,
}

// ────────────────────────────────────────
//  Collections
// ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Collection {
    pub id: Id,
    #[serde(rename = "owner_id")]
    pub user_id: Id,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CollectionItem {
    pub movie_id: Id,
    #[sqlx(rename = "position")]
    pub order: i32,
    pub added_at: DateTime<Utc>,
}

/// Collection row plus its items, as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRecord {
    pub collection: Collection,
    pub items: Vec<CollectionItem>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CollectionItemView {
    #[serde(flatten)]
    pub item: CollectionItem,
    pub movie: Option<MovieSummary>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CollectionView {
    #[serde(flatten)]
    pub collection: Collection,
    pub movie_count: i64,
    pub movies: Vec<CollectionItemView>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewCollectionRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCollection {
    pub user_id: Id,
    pub name: String,
    pub description: String,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CollectionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CollectionMovie {
    pub movie_id: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
