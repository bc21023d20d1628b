use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Id;
use crate::auth::{Actor, Role};
use crate::validation::FieldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "review_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Draft,
    Published,
    Hidden,
    Deleted,
}

impl ReviewStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Some(Self::Draft),
            "PUBLISHED" => Some(Self::Published),
            "HIDDEN" => Some(Self::Hidden),
            "DELETED" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Status a new review may start in.
    pub fn check_initial(self) -> Result<Self, FieldError> {
        match self {
            Self::Draft | Self::Published => Ok(self),
            _ => Err(FieldError::new("status", "A new review must be DRAFT or PUBLISHED.")),
        }
    }

    /// Status change requested by the author through an update.
    ///
    /// Authors move freely between draft and published. Hiding and restoring
    /// belong to moderators, and removal goes through delete, so an author can
    /// never undo a moderation decision by editing the status field.
    pub fn check_author_transition(self, to: Self) -> Result<(), FieldError> {
        if self == to {
            return Ok(());
        }
        match (self, to) {
            (Self::Hidden, _) => Err(FieldError::new(
                "status",
                "A hidden review can only be restored by a moderator.",
            )),
            (_, Self::Hidden) => Err(FieldError::new("status", "Only moderators can hide reviews.")),
            (_, Self::Deleted) => Err(FieldError::new("status", "Delete the review to remove it.")),
            (Self::Draft | Self::Published, Self::Draft | Self::Published) => Ok(()),
            (Self::Deleted, _) => Err(FieldError::new("status", "Deleted reviews cannot change.")),
        }
    }

    pub fn check_publish(self) -> Result<(), FieldError> {
        match self {
            Self::Draft => Ok(()),
            _ => Err(FieldError::new("status", "Only draft reviews can be published.")),
        }
    }

    pub fn check_restore(self) -> Result<(), FieldError> {
        match self {
            Self::Hidden => Ok(()),
            _ => Err(FieldError::new("status", "Only hidden reviews can be restored.")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Review {
    pub id: Id,
    pub user_id: Id,
    pub movie_id: Id,
    pub title: String,
    pub content: String,
    pub rating: f64,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_featured: bool,
    pub moderated_by: Option<Id>,
    pub moderation_notes: String,
    pub helpful_count: i64,
    pub reported_count: i64,
}

/// Review as returned to a particular viewer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewDetail {
    #[serde(flatten)]
    pub review: Review,
    pub user_vote: Option<VoteType>,
    pub can_edit: bool,
    pub can_moderate: bool,
}

impl ReviewDetail {
    pub fn for_viewer(mut review: Review, viewer: Option<Actor>, user_vote: Option<VoteType>) -> Self {
        let can_edit = viewer.is_some_and(|a| a.id == review.user_id);
        let can_moderate = viewer.is_some_and(|a| matches!(a.role, Role::Moderator | Role::Admin));
        if !can_moderate {
            review.moderated_by = None;
            review.moderation_notes.clear();
        }
        Self { review, user_vote, can_edit, can_moderate }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewReviewRequest {
    pub movie_id: Id,
    pub title: String,
    pub content: String,
    pub rating: f64,
    pub status: Option<ReviewStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub user_id: Id,
    pub movie_id: Id,
    pub title: String,
    pub content: String,
    pub rating: f64,
    pub status: ReviewStatus,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReviewUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub rating: Option<f64>,
    pub status: Option<ReviewStatus>,
}

/// Full replacement body for `PUT /reviews/{id}/`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReviewReplace {
    pub title: String,
    pub content: String,
    pub rating: f64,
    pub status: Option<ReviewStatus>,
}

impl From<ReviewReplace> for ReviewUpdate {
    fn from(r: ReviewReplace) -> Self {
        Self { title: Some(r.title), content: Some(r.content), rating: Some(r.rating), status: r.status }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewScope {
    /// Published reviews only.
    Public,
    /// Published reviews plus every non-deleted review of this user.
    PublicAndOwn(Id),
    /// Every non-deleted review of this user.
    Own(Id),
    /// Every non-deleted review.
    Everything,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewOrdering {
    /// published_at desc, then created_at desc.
    #[default]
    Newest,
    /// helpful_count desc, then published_at desc.
    Helpful,
    /// rating desc, then published_at desc.
    Rating,
    /// reported_count desc, then created_at desc.
    MostReported,
}

impl ReviewOrdering {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "helpful" | "-helpful_count" => Self::Helpful,
            "rating" | "-rating" => Self::Rating,
            _ => Self::Newest,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewFilter {
    pub scope: ReviewScope,
    pub movie_id: Option<Id>,
    pub status: Option<ReviewStatus>,
    pub featured: Option<bool>,
    /// Moderation queue: reported at least once, or currently published.
    pub needs_attention: bool,
    pub ordering: ReviewOrdering,
}

impl ReviewFilter {
    pub fn new(scope: ReviewScope) -> Self {
        Self {
            scope,
            movie_id: None,
            status: None,
            featured: None,
            needs_attention: false,
            ordering: ReviewOrdering::default(),
        }
    }

    /// Whether a stored review passes this filter. Deleted reviews never do.
    pub fn matches(&self, r: &Review) -> bool {
        if r.status == ReviewStatus::Deleted {
            return false;
        }
        let in_scope = match self.scope {
            ReviewScope::Public => r.status == ReviewStatus::Published,
            ReviewScope::PublicAndOwn(uid) => r.status == ReviewStatus::Published || r.user_id == uid,
            ReviewScope::Own(uid) => r.user_id == uid,
            ReviewScope::Everything => true,
        };
        in_scope
            && self.movie_id.map_or(true, |m| r.movie_id == m)
            && self.status.map_or(true, |s| r.status == s)
            && self.featured.map_or(true, |f| r.is_featured == f)
            && (!self.needs_attention || r.reported_count > 0 || r.status == ReviewStatus::Published)
    }
}

/// Raw query string of review listings; malformed values are ignored.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReviewListParams {
    pub movie_id: Option<String>,
    pub status: Option<String>,
    /// `helpful`, `rating`, or anything else for newest first.
    pub ordering: Option<String>,
}

impl ReviewListParams {
    pub fn into_filter(self, scope: ReviewScope) -> ReviewFilter {
        ReviewFilter {
            movie_id: self.movie_id.as_deref().and_then(|m| m.trim().parse().ok()),
            status: self.status.as_deref().and_then(ReviewStatus::parse),
            ordering: self.ordering.as_deref().map(ReviewOrdering::parse).unwrap_or_default(),
            ..ReviewFilter::new(scope)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct HideRequest {
    #[serde(default)]
    pub moderation_notes: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FeatureRequest {
    #[serde(default = "default_true")]
    pub is_featured: bool,
}

impl Default for FeatureRequest {
    fn default() -> Self {
        Self { is_featured: true }
    }
}

// ────────────────────────────────────────
//  Votes & reports
// ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "vote_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteType {
    Helpful,
    NotHelpful,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ReviewVote {
    pub id: Id,
    pub user_id: Id,
    pub review_id: Id,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewVoteRequest {
    pub review_id: Id,
    pub vote_type: VoteType,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VoteUpdate {
    pub vote_type: VoteType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "report_reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportReason {
    Spam,
    Inappropriate,
    Spoilers,
    OffTopic,
    Harassment,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ReviewReport {
    pub id: Id,
    pub user_id: Id,
    pub review_id: Id,
    pub reason: ReportReason,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_by: Option<Id>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewReportRequest {
    pub review_id: Id,
    pub reason: ReportReason,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub user_id: Id,
    pub review_id: Id,
    pub reason: ReportReason,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResolveRequest {
    #[serde(default = "default_true")]
    pub resolved: bool,
    #[serde(default)]
    pub resolution_notes: String,
}

impl Default for ResolveRequest {
    fn default() -> Self {
        Self { resolved: true, resolution_notes: String::new() }
    }
}

/// Counters after a recount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ReviewCounters {
    pub helpful_count: i64,
    pub reported_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReviewStatus::*;

    #[test]
    fn author_transitions() {
        assert!(Draft.check_author_transition(Published).is_ok());
        assert!(Published.check_author_transition(Draft).is_ok());
        assert!(Published.check_author_transition(Hidden).is_err());
        assert!(Hidden.check_author_transition(Published).is_err());
        assert!(Draft.check_author_transition(Deleted).is_err());
        assert!(Hidden.check_author_transition(Hidden).is_ok());
    }

    #[test]
    fn authors_cannot_undo_moderation_through_status_edits() {
        // hidden is terminal for the author until a moderator restores it
        for to in [Draft, Published, Deleted] {
            assert_eq!(Hidden.check_author_transition(to).unwrap_err().field, "status");
        }
        // soft delete only happens through the delete endpoint
        for from in [Draft, Published] {
            assert!(from.check_author_transition(Deleted).is_err());
        }
        assert!(Deleted.check_author_transition(Published).is_err());
    }

    #[test]
    fn publish_and_restore_guards() {
        assert!(Draft.check_publish().is_ok());
        assert_eq!(Published.check_publish().unwrap_err().field, "status");
        assert!(Hidden.check_restore().is_ok());
        assert!(Published.check_restore().is_err());
        assert!(Hidden.check_initial().is_err());
    }

    #[test]
    fn moderation_fields_are_blanked_for_regular_viewers() {
        let now = Utc::now();
        let review = Review {
            id: 1,
            user_id: 7,
            movie_id: 3,
            title: "t".into(),
            content: "c".into(),
            rating: 8.0,
            status: Published,
            created_at: now,
            updated_at: now,
            published_at: Some(now),
            is_featured: false,
            moderated_by: Some(99),
            moderation_notes: "checked".into(),
            helpful_count: 0,
            reported_count: 0,
        };
        let author = Actor { id: 7, role: Role::User };
        let d = ReviewDetail::for_viewer(review.clone(), Some(author), None);
        assert!(d.can_edit && !d.can_moderate);
        assert!(d.review.moderation_notes.is_empty());
        let moderator = Actor { id: 99, role: Role::Moderator };
        let d = ReviewDetail::for_viewer(review, Some(moderator), None);
        assert_eq!(d.review.moderation_notes, "checked");
    }
}
