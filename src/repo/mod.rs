use async_trait::async_trait;

use crate::auth::Role;
use crate::bulk::{BulkDump, BulkLoadReport};
use crate::models::*;
use crate::validation::FieldError;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid {0}")]
    Validation(FieldError),
    #[error("storage: {0}")]
    Internal(String),
}

impl RepoError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        RepoError::Validation(FieldError::new(field, message))
    }
}

impl From<FieldError> for RepoError {
    fn from(e: FieldError) -> Self {
        RepoError::Validation(e)
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

pub(crate) const MSG_DUPLICATE_EMAIL: &str = "A user with this email already exists.";
pub(crate) const MSG_DUPLICATE_USERNAME: &str = "A user with this username already exists.";
pub(crate) const MSG_DUPLICATE_CATALOG_ENTRY: &str = "This movie already has that status in your catalog.";
pub(crate) const MSG_DUPLICATE_COLLECTION: &str = "A collection with this name already exists.";
pub(crate) const MSG_DUPLICATE_ITEM: &str = "Movie is already in this collection.";
pub(crate) const MSG_DUPLICATE_REVIEW: &str = "You have already reviewed this movie.";
pub(crate) const MSG_DUPLICATE_REPORT: &str = "You have already reported this review.";
pub(crate) const MSG_MOVIE_MISSING: &str = "Movie with this ID does not exist.";
pub(crate) const MSG_REVIEW_MISSING: &str = "Review not found.";
pub(crate) const MSG_OWN_VOTE: &str = "You cannot vote on your own review.";
pub(crate) const MSG_VOTE_UNPUBLISHED: &str = "You can only vote on published reviews.";
pub(crate) const MSG_OWN_REPORT: &str = "You cannot report your own review.";

fn live(review: Option<&Review>) -> RepoResult<&Review> {
    review
        .filter(|r| r.status != ReviewStatus::Deleted)
        .ok_or_else(|| RepoError::invalid("review_id", MSG_REVIEW_MISSING))
}

/// Voting needs a published review written by someone else.
pub(crate) fn check_votable(review: Option<&Review>, voter: Id) -> RepoResult<()> {
    let review = live(review)?;
    if review.user_id == voter {
        return Err(RepoError::invalid("review_id", MSG_OWN_VOTE));
    }
    if review.status != ReviewStatus::Published {
        return Err(RepoError::invalid("review_id", MSG_VOTE_UNPUBLISHED));
    }
    Ok(())
}

pub(crate) fn check_reportable(review: Option<&Review>, reporter: Id) -> RepoResult<()> {
    if live(review)?.user_id == reporter {
        return Err(RepoError::invalid("review_id", MSG_OWN_REPORT));
    }
    Ok(())
}

#[async_trait]
pub trait MovieRepo: Send + Sync {
    async fn list_movies(&self, query: &MovieQuery) -> RepoResult<Page<MovieSummary>>;
    async fn get_movie(&self, id: Id) -> RepoResult<MovieDetail>;
    /// Summaries for the given ids, in no particular order; unknown ids are skipped.
    async fn movie_summaries(&self, ids: &[Id]) -> RepoResult<Vec<MovieSummary>>;
    async fn create_movie(&self, input: MovieInput) -> RepoResult<MovieDetail>;
    async fn update_movie(&self, id: Id, change: MovieChange, relations: MovieRelations) -> RepoResult<MovieDetail>;
    async fn delete_movie(&self, id: Id) -> RepoResult<()>;
    async fn movie_stats(&self) -> RepoResult<MovieStats>;
}

#[async_trait]
pub trait LookupRepo: Send + Sync {
    async fn list_genres(&self) -> RepoResult<Vec<Genre>>;
    async fn list_spoken_languages(&self) -> RepoResult<Vec<SpokenLanguage>>;
    async fn list_origin_countries(&self) -> RepoResult<Vec<OriginCountry>>;
    async fn list_production_companies(&self) -> RepoResult<Vec<ProductionCompany>>;
    async fn list_production_countries(&self) -> RepoResult<Vec<ProductionCountry>>;
    async fn list_videos(&self) -> RepoResult<Vec<Video>>;
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn find_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>>;
    async fn get_user(&self, id: Id) -> RepoResult<User>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn update_profile(&self, id: Id, upd: ProfileUpdate) -> RepoResult<User>;
    /// Returns the previous role together with the updated user.
    async fn set_role(&self, id: Id, role: Role) -> RepoResult<(Role, User)>;
}

#[async_trait]
pub trait CatalogRepo: Send + Sync {
    /// Insert-or-update keyed on (user, movie, status). Notes are overwritten,
    /// the rating only when one is given, and `watched_at` is stamped for watched.
    async fn upsert_catalog_entry(&self, new: NewCatalogEntry) -> RepoResult<Upserted<CatalogEntry>>;
    async fn create_catalog_entry(&self, new: NewCatalogEntry) -> RepoResult<CatalogEntry>;
    async fn list_catalog_entries(&self, user_id: Id, status: Option<CatalogStatus>) -> RepoResult<Vec<CatalogEntry>>;
    async fn get_catalog_entry(&self, user_id: Id, id: Id) -> RepoResult<CatalogEntry>;
    async fn update_catalog_entry(&self, user_id: Id, id: Id, upd: CatalogEntryUpdate) -> RepoResult<CatalogEntry>;
    async fn delete_catalog_entry(&self, user_id: Id, id: Id) -> RepoResult<()>;
    /// Deletes every status row of the movie; `NotFound` when there was none.
    async fn remove_from_catalog(&self, user_id: Id, movie_id: Id) -> RepoResult<u64>;
    async fn catalog_stats(&self, user_id: Id) -> RepoResult<CatalogStats>;
}

#[async_trait]
pub trait CollectionRepo: Send + Sync {
    async fn create_collection(&self, new: NewCollection) -> RepoResult<CollectionRecord>;
    /// The viewer's own collections plus everyone's public ones, newest change first.
    async fn list_visible_collections(&self, viewer: Id) -> RepoResult<Vec<CollectionRecord>>;
    async fn list_own_collections(&self, owner: Id) -> RepoResult<Vec<CollectionRecord>>;
    async fn get_collection(&self, id: Id) -> RepoResult<CollectionRecord>;
    async fn update_collection(&self, id: Id, upd: CollectionUpdate) -> RepoResult<CollectionRecord>;
    async fn delete_collection(&self, id: Id) -> RepoResult<()>;
    async fn add_to_collection(&self, id: Id, movie_id: Id) -> RepoResult<CollectionItem>;
    async fn remove_from_collection(&self, id: Id, movie_id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait ReviewRepo: Send + Sync {
    async fn create_review(&self, new: NewReview) -> RepoResult<Review>;
    /// Any non-deleted review.
    async fn get_review(&self, id: Id) -> RepoResult<Review>;
    async fn list_reviews(&self, filter: &ReviewFilter) -> RepoResult<Vec<Review>>;
    /// Author edit; the status change is checked against the current status.
    async fn update_review(&self, id: Id, upd: ReviewUpdate) -> RepoResult<Review>;
    async fn publish_review(&self, id: Id) -> RepoResult<Review>;
    async fn hide_review(&self, id: Id, moderator: Id, notes: String) -> RepoResult<Review>;
    async fn restore_review(&self, id: Id, moderator: Id) -> RepoResult<Review>;
    async fn feature_review(&self, id: Id, moderator: Id, featured: bool) -> RepoResult<Review>;
    /// Soft delete.
    async fn delete_review(&self, id: Id) -> RepoResult<()>;
    /// Recompute both derived counters from the vote and report tables.
    async fn recount_review(&self, id: Id) -> RepoResult<ReviewCounters>;
}

#[async_trait]
pub trait VoteRepo: Send + Sync {
    async fn upsert_vote(&self, user_id: Id, review_id: Id, vote_type: VoteType) -> RepoResult<Upserted<ReviewVote>>;
    async fn list_votes(&self, user_id: Id) -> RepoResult<Vec<ReviewVote>>;
    async fn get_vote(&self, user_id: Id, id: Id) -> RepoResult<ReviewVote>;
    async fn update_vote(&self, user_id: Id, id: Id, vote_type: VoteType) -> RepoResult<ReviewVote>;
    async fn delete_vote(&self, user_id: Id, id: Id) -> RepoResult<()>;
    /// The user's votes on any of `review_ids`.
    async fn votes_on(&self, user_id: Id, review_ids: &[Id]) -> RepoResult<Vec<ReviewVote>>;
}

#[async_trait]
pub trait ReportRepo: Send + Sync {
    async fn create_report(&self, new: NewReport) -> RepoResult<ReviewReport>;
    /// `reporter = None` lists everyone's reports.
    async fn list_reports(&self, reporter: Option<Id>, unresolved_only: bool) -> RepoResult<Vec<ReviewReport>>;
    async fn get_report(&self, id: Id) -> RepoResult<ReviewReport>;
    async fn resolve_report(&self, id: Id, moderator: Id, req: ResolveRequest) -> RepoResult<ReviewReport>;
    async fn delete_report(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait BulkLoadRepo: Send + Sync {
    async fn movie_count(&self) -> RepoResult<i64>;
    /// Load a whole dump atomically; rows whose key already exists are skipped.
    async fn bulk_load(&self, dump: &BulkDump) -> RepoResult<BulkLoadReport>;
}

pub trait Repo: MovieRepo + LookupRepo + UserRepo + CatalogRepo + CollectionRepo + ReviewRepo + VoteRepo + ReportRepo + BulkLoadRepo {}

impl<T> Repo for T where
    T: MovieRepo + LookupRepo + UserRepo + CatalogRepo + CollectionRepo + ReviewRepo + VoteRepo + ReportRepo + BulkLoadRepo
{
}

#[cfg(feature = "inmem-store")]
pub mod inmem;

#[cfg(feature = "postgres-store")]
pub mod pg;
