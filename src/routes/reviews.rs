use std::collections::HashMap;

use actix_web::{web, HttpResponse};

use crate::auth::{actor_of, Actor, Auth};
use crate::error::ApiError;
use crate::models::*;
use crate::policy::{allows, authorize, Action};
use crate::repo::Repo;
use crate::validation::{validate_rating, validate_required_text, FieldResult, MAX_TITLE_LEN};

use super::{optional_json, AppState};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/reviews/")
            .route(web::get().to(list_reviews))
            .route(web::post().to(create_review)),
    )
    .service(web::resource("/reviews/my_reviews/").route(web::get().to(my_reviews)))
    .service(web::resource("/reviews/featured/").route(web::get().to(featured_reviews)))
    .service(
        web::resource("/reviews/{id}/")
            .route(web::get().to(get_review))
            .route(web::put().to(replace_review))
            .route(web::patch().to(update_review))
            .route(web::delete().to(delete_review)),
    )
    .service(web::resource("/reviews/{id}/publish/").route(web::post().to(publish_review)))
    .service(web::resource("/reviews/{id}/recount/").route(web::post().to(recount_review)))
    .service(web::resource("/moderation/").route(web::get().to(moderation_list)))
    .service(web::resource("/moderation/pending/").route(web::get().to(moderation_pending)))
    .service(web::resource("/moderation/{id}/").route(web::get().to(moderation_detail)))
    .service(web::resource("/moderation/{id}/feature/").route(web::post().to(feature_review)))
    .service(web::resource("/moderation/{id}/hide/").route(web::post().to(hide_review)))
    .service(web::resource("/moderation/{id}/restore/").route(web::post().to(restore_review)))
    .service(
        web::resource("/votes/")
            .route(web::get().to(list_votes))
            .route(web::post().to(create_vote)),
    )
    .service(
        web::resource("/votes/{id}/")
            .route(web::get().to(get_vote))
            .route(web::patch().to(update_vote))
            .route(web::delete().to(delete_vote)),
    )
    .service(
        web::resource("/reports/")
            .route(web::get().to(list_reports))
            .route(web::post().to(create_report)),
    )
    .service(web::resource("/reports/pending/").route(web::get().to(pending_reports)))
    .service(
        web::resource("/reports/{id}/")
            .route(web::get().to(get_report))
            .route(web::delete().to(delete_report)),
    )
    .service(web::resource("/reports/{id}/resolve/").route(web::post().to(resolve_report)));
}

fn review_title(raw: &str) -> FieldResult<String> {
    validate_required_text("title", raw, Some(MAX_TITLE_LEN)).map(str::to_string)
}

fn check_update(upd: &mut ReviewUpdate) -> FieldResult<()> {
    upd.title = upd.title.as_deref().map(review_title).transpose()?;
    if let Some(content) = &upd.content {
        validate_required_text("content", content, None)?;
    }
    if let Some(rating) = upd.rating {
        validate_rating("rating", rating)?;
    }
    Ok(())
}

/// Attach the viewer's own vote and capability flags to each review.
async fn details(repo: &dyn Repo, viewer: Option<Actor>, reviews: Vec<Review>) -> Result<Vec<ReviewDetail>, ApiError> {
    let votes: HashMap<Id, VoteType> = match viewer {
        Some(actor) if !reviews.is_empty() => {
            let ids: Vec<Id> = reviews.iter().map(|r| r.id).collect();
            repo.votes_on(actor.id, &ids).await?.into_iter().map(|v| (v.review_id, v.vote_type)).collect()
        }
        _ => HashMap::new(),
    };
    Ok(reviews
        .into_iter()
        .map(|r| {
            let vote = votes.get(&r.id).copied();
            ReviewDetail::for_viewer(r, viewer, vote)
        })
        .collect())
}

async fn detail(repo: &dyn Repo, viewer: Option<Actor>, review: Review) -> Result<ReviewDetail, ApiError> {
    details(repo, viewer, vec![review]).await?.pop().ok_or(ApiError::Internal)
}

/// Loads a review and checks the caller wrote it.
async fn authored(auth: &Auth, repo: &dyn Repo, id: Id, action: Action) -> Result<Review, ApiError> {
    let review = repo.get_review(id).await?;
    authorize(Some(&auth.actor()), action, Some(review.user_id))?;
    Ok(review)
}

fn staff(auth: &Auth, action: Action) -> Result<Actor, ApiError> {
    let actor = auth.actor();
    authorize(Some(&actor), action, None)?;
    Ok(actor)
}

// ────────────────────────────────────────
//  Reviews
// ────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/api/reviews/",
    params(ReviewListParams),
    responses((status = 200, description = "Published reviews, plus the caller's own when signed in", body = [ReviewDetail]))
)]
pub async fn list_reviews(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    query: web::Query<ReviewListParams>,
) -> Result<HttpResponse, ApiError> {
    let viewer = actor_of(&auth);
    let scope = match viewer {
        Some(actor) => ReviewScope::PublicAndOwn(actor.id),
        None => ReviewScope::Public,
    };
    let reviews = data.repo.list_reviews(&query.into_inner().into_filter(scope)).await?;
    Ok(HttpResponse::Ok().json(details(data.repo.as_ref(), viewer, reviews).await?))
}

#[utoipa::path(
    post,
    path = "/api/reviews/",
    request_body = NewReviewRequest,
    responses(
        (status = 201, body = ReviewDetail),
        (status = 400, description = "Invalid field, unknown movie or bad initial status"),
        (status = 409, description = "Caller already reviewed this movie")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_review(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.actor();
    authorize(Some(&actor), Action::CreateReview, None)?;
    let req = payload.into_inner();
    let title = review_title(&req.title)?;
    validate_required_text("content", &req.content, None)?;
    validate_rating("rating", req.rating)?;
    let status = req.status.unwrap_or(ReviewStatus::Draft).check_initial()?;
    let review = data
        .repo
        .create_review(NewReview {
            user_id: actor.id,
            movie_id: req.movie_id,
            title,
            content: req.content,
            rating: req.rating,
            status,
        })
        .await?;
    tracing::info!(review_id = review.id, movie_id = review.movie_id, user_id = actor.id, "review created");
    Ok(HttpResponse::Created().json(detail(data.repo.as_ref(), Some(actor), review).await?))
}

#[utoipa::path(
    get,
    path = "/api/reviews/my_reviews/",
    params(ReviewListParams),
    responses((status = 200, body = [ReviewDetail])),
    security(("bearer_auth" = []))
)]
pub async fn my_reviews(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<ReviewListParams>,
) -> Result<HttpResponse, ApiError> {
    let actor = auth.actor();
    let reviews = data.repo.list_reviews(&query.into_inner().into_filter(ReviewScope::Own(actor.id))).await?;
    Ok(HttpResponse::Ok().json(details(data.repo.as_ref(), Some(actor), reviews).await?))
}

#[utoipa::path(
    get,
    path = "/api/reviews/featured/",
    responses((status = 200, description = "Published reviews marked as featured", body = [ReviewDetail]))
)]
pub async fn featured_reviews(auth: Option<Auth>, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let filter = ReviewFilter { featured: Some(true), ..ReviewFilter::new(ReviewScope::Public) };
    let reviews = data.repo.list_reviews(&filter).await?;
    Ok(HttpResponse::Ok().json(details(data.repo.as_ref(), actor_of(&auth), reviews).await?))
}

#[utoipa::path(
    get,
    path = "/api/reviews/{id}/",
    params(("id" = Id, Path, description = "Review id")),
    responses(
        (status = 200, body = ReviewDetail),
        (status = 404, description = "Missing, deleted, or not visible to the caller")
    )
)]
pub async fn get_review(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let viewer = actor_of(&auth);
    let review = data.repo.get_review(path.into_inner()).await?;
    if review.status != ReviewStatus::Published && !allows(viewer.as_ref(), Action::ViewHiddenReview, Some(review.user_id)) {
        return Err(ApiError::NotFound);
    }
    Ok(HttpResponse::Ok().json(detail(data.repo.as_ref(), viewer, review).await?))
}

async fn apply_update(auth: Auth, data: web::Data<AppState>, id: Id, mut upd: ReviewUpdate) -> Result<HttpResponse, ApiError> {
    authored(&auth, data.repo.as_ref(), id, Action::EditReview).await?;
    check_update(&mut upd)?;
    let review = data.repo.update_review(id, upd).await?;
    Ok(HttpResponse::Ok().json(detail(data.repo.as_ref(), Some(auth.actor()), review).await?))
}

#[utoipa::path(
    put,
    path = "/api/reviews/{id}/",
    params(("id" = Id, Path, description = "Review id")),
    request_body = ReviewReplace,
    responses(
        (status = 200, body = ReviewDetail),
        (status = 400, description = "Invalid field or status change"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Review not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn replace_review(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<ReviewReplace>,
) -> Result<HttpResponse, ApiError> {
    apply_update(auth, data, path.into_inner(), payload.into_inner().into()).await
}

#[utoipa::path(
    patch,
    path = "/api/reviews/{id}/",
    params(("id" = Id, Path, description = "Review id")),
    request_body = ReviewUpdate,
    responses(
        (status = 200, body = ReviewDetail),
        (status = 400, description = "Invalid field or status change"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Review not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_review(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<ReviewUpdate>,
) -> Result<HttpResponse, ApiError> {
    apply_update(auth, data, path.into_inner(), payload.into_inner()).await
}

#[utoipa::path(
    delete,
    path = "/api/reviews/{id}/",
    params(("id" = Id, Path, description = "Review id")),
    responses(
        (status = 204, description = "Review marked deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Review not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_review(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let review = authored(&auth, data.repo.as_ref(), path.into_inner(), Action::DeleteReview).await?;
    data.repo.delete_review(review.id).await?;
    tracing::info!(review_id = review.id, "review deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/reviews/{id}/publish/",
    params(("id" = Id, Path, description = "Review id")),
    responses(
        (status = 200, body = ReviewDetail),
        (status = 400, description = "Review is not a draft"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Review not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn publish_review(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let review = authored(&auth, data.repo.as_ref(), path.into_inner(), Action::PublishReview).await?;
    let review = data.repo.publish_review(review.id).await?;
    Ok(HttpResponse::Ok().json(detail(data.repo.as_ref(), Some(auth.actor()), review).await?))
}

#[utoipa::path(
    post,
    path = "/api/reviews/{id}/recount/",
    params(("id" = Id, Path, description = "Review id")),
    responses(
        (status = 200, description = "Counters recomputed from votes and reports", body = ReviewCounters),
        (status = 403, description = "Moderators and admins only"),
        (status = 404, description = "Review not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn recount_review(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    staff(&auth, Action::RecountReview)?;
    Ok(HttpResponse::Ok().json(data.repo.recount_review(path.into_inner()).await?))
}

// ────────────────────────────────────────
//  Moderation
// ────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/api/moderation/",
    params(ReviewListParams),
    responses((status = 200, description = "Every non-deleted review", body = [ReviewDetail])),
    security(("bearer_auth" = []))
)]
pub async fn moderation_list(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<ReviewListParams>,
) -> Result<HttpResponse, ApiError> {
    let actor = staff(&auth, Action::ModerateReview)?;
    let reviews = data.repo.list_reviews(&query.into_inner().into_filter(ReviewScope::Everything)).await?;
    Ok(HttpResponse::Ok().json(details(data.repo.as_ref(), Some(actor), reviews).await?))
}

#[utoipa::path(
    get,
    path = "/api/moderation/pending/",
    responses((status = 200, description = "Reported or published reviews, most reported first", body = [ReviewDetail])),
    security(("bearer_auth" = []))
)]
pub async fn moderation_pending(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let actor = staff(&auth, Action::ModerateReview)?;
    let filter = ReviewFilter {
        needs_attention: true,
        ordering: ReviewOrdering::MostReported,
        ..ReviewFilter::new(ReviewScope::Everything)
    };
    let reviews = data.repo.list_reviews(&filter).await?;
    Ok(HttpResponse::Ok().json(details(data.repo.as_ref(), Some(actor), reviews).await?))
}

#[utoipa::path(
    get,
    path = "/api/moderation/{id}/",
    params(("id" = Id, Path, description = "Review id")),
    responses((status = 200, body = ReviewDetail), (status = 404, description = "Review not found")),
    security(("bearer_auth" = []))
)]
pub async fn moderation_detail(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let actor = staff(&auth, Action::ModerateReview)?;
    let review = data.repo.get_review(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail(data.repo.as_ref(), Some(actor), review).await?))
}

#[utoipa::path(
    post,
    path = "/api/moderation/{id}/feature/",
    params(("id" = Id, Path, description = "Review id")),
    request_body = FeatureRequest,
    responses((status = 200, body = ReviewDetail), (status = 404, description = "Review not found")),
    security(("bearer_auth" = []))
)]
pub async fn feature_review(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let actor = staff(&auth, Action::ModerateReview)?;
    let req: FeatureRequest = optional_json(&body)?;
    let review = data.repo.feature_review(path.into_inner(), actor.id, req.is_featured).await?;
    Ok(HttpResponse::Ok().json(detail(data.repo.as_ref(), Some(actor), review).await?))
}

#[utoipa::path(
    post,
    path = "/api/moderation/{id}/hide/",
    params(("id" = Id, Path, description = "Review id")),
    request_body = HideRequest,
    responses((status = 200, body = ReviewDetail), (status = 404, description = "Review not found")),
    security(("bearer_auth" = []))
)]
pub async fn hide_review(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let actor = staff(&auth, Action::ModerateReview)?;
    let req: HideRequest = optional_json(&body)?;
    let review = data.repo.hide_review(path.into_inner(), actor.id, req.moderation_notes).await?;
    tracing::info!(review_id = review.id, moderator = actor.id, "review hidden");
    Ok(HttpResponse::Ok().json(detail(data.repo.as_ref(), Some(actor), review).await?))
}

#[utoipa::path(
    post,
    path = "/api/moderation/{id}/restore/",
    params(("id" = Id, Path, description = "Review id")),
    responses(
        (status = 200, body = ReviewDetail),
        (status = 400, description = "Review is not hidden"),
        (status = 404, description = "Review not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn restore_review(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let actor = staff(&auth, Action::ModerateReview)?;
    let review = data.repo.restore_review(path.into_inner(), actor.id).await?;
    tracing::info!(review_id = review.id, moderator = actor.id, "review restored");
    Ok(HttpResponse::Ok().json(detail(data.repo.as_ref(), Some(actor), review).await?))
}

// ────────────────────────────────────────
//  Votes
// ────────────────────────────────────────

#[utoipa::path(get, path = "/api/votes/", responses((status = 200, body = [ReviewVote])), security(("bearer_auth" = [])))]
pub async fn list_votes(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::Vote, None)?;
    Ok(HttpResponse::Ok().json(data.repo.list_votes(auth.0.user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/votes/",
    request_body = NewVoteRequest,
    responses(
        (status = 201, description = "Vote cast", body = ReviewVote),
        (status = 200, description = "Existing vote replaced", body = ReviewVote),
        (status = 400, description = "Own, unpublished or unknown review")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_vote(auth: Auth, data: web::Data<AppState>, payload: web::Json<NewVoteRequest>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::Vote, None)?;
    let req = payload.into_inner();
    let upserted = data.repo.upsert_vote(auth.0.user_id, req.review_id, req.vote_type).await?;
    Ok(if upserted.created {
        HttpResponse::Created().json(upserted.value)
    } else {
        HttpResponse::Ok().json(upserted.value)
    })
}

#[utoipa::path(
    get,
    path = "/api/votes/{id}/",
    params(("id" = Id, Path, description = "Vote id")),
    responses((status = 200, body = ReviewVote), (status = 404, description = "No such vote of the caller")),
    security(("bearer_auth" = []))
)]
pub async fn get_vote(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::Vote, None)?;
    Ok(HttpResponse::Ok().json(data.repo.get_vote(auth.0.user_id, path.into_inner()).await?))
}

#[utoipa::path(
    patch,
    path = "/api/votes/{id}/",
    params(("id" = Id, Path, description = "Vote id")),
    request_body = VoteUpdate,
    responses((status = 200, body = ReviewVote), (status = 404, description = "No such vote of the caller")),
    security(("bearer_auth" = []))
)]
pub async fn update_vote(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<VoteUpdate>,
) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::Vote, None)?;
    let vote = data.repo.update_vote(auth.0.user_id, path.into_inner(), payload.vote_type).await?;
    Ok(HttpResponse::Ok().json(vote))
}

#[utoipa::path(
    delete,
    path = "/api/votes/{id}/",
    params(("id" = Id, Path, description = "Vote id")),
    responses((status = 204, description = "Vote withdrawn"), (status = 404, description = "No such vote of the caller")),
    security(("bearer_auth" = []))
)]
pub async fn delete_vote(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::Vote, None)?;
    data.repo.delete_vote(auth.0.user_id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// ────────────────────────────────────────
//  Reports
// ────────────────────────────────────────

/// A report the caller may see: their own, or any for staff.
async fn visible_report(auth: &Auth, repo: &dyn Repo, id: Id) -> Result<ReviewReport, ApiError> {
    let report = repo.get_report(id).await?;
    let actor = auth.actor();
    if report.user_id != actor.id && !allows(Some(&actor), Action::ViewAllReports, None) {
        return Err(ApiError::NotFound);
    }
    Ok(report)
}

#[utoipa::path(
    get,
    path = "/api/reports/",
    responses((status = 200, description = "Own reports; staff see every report", body = [ReviewReport])),
    security(("bearer_auth" = []))
)]
pub async fn list_reports(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let actor = auth.actor();
    let reporter = (!allows(Some(&actor), Action::ViewAllReports, None)).then_some(actor.id);
    Ok(HttpResponse::Ok().json(data.repo.list_reports(reporter, false).await?))
}

#[utoipa::path(
    post,
    path = "/api/reports/",
    request_body = NewReportRequest,
    responses(
        (status = 201, body = ReviewReport),
        (status = 400, description = "Own or unknown review"),
        (status = 409, description = "Caller already reported this review")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_report(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewReportRequest>,
) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::Report, None)?;
    let req = payload.into_inner();
    let report = data
        .repo
        .create_report(NewReport {
            user_id: auth.0.user_id,
            review_id: req.review_id,
            reason: req.reason,
            description: req.description,
        })
        .await?;
    tracing::info!(report_id = report.id, review_id = report.review_id, reason = ?report.reason, "review reported");
    Ok(HttpResponse::Created().json(report))
}

#[utoipa::path(
    get,
    path = "/api/reports/pending/",
    responses((status = 200, description = "Unresolved reports", body = [ReviewReport])),
    security(("bearer_auth" = []))
)]
pub async fn pending_reports(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    staff(&auth, Action::ViewAllReports)?;
    Ok(HttpResponse::Ok().json(data.repo.list_reports(None, true).await?))
}

#[utoipa::path(
    get,
    path = "/api/reports/{id}/",
    params(("id" = Id, Path, description = "Report id")),
    responses((status = 200, body = ReviewReport), (status = 404, description = "Report not found")),
    security(("bearer_auth" = []))
)]
pub async fn get_report(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(visible_report(&auth, data.repo.as_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    delete,
    path = "/api/reports/{id}/",
    params(("id" = Id, Path, description = "Report id")),
    responses(
        (status = 204, description = "Report removed"),
        (status = 400, description = "Resolved reports cannot be withdrawn"),
        (status = 404, description = "Report not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_report(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let report = visible_report(&auth, data.repo.as_ref(), path.into_inner()).await?;
    let actor = auth.actor();
    if !allows(Some(&actor), Action::ResolveReport, None) {
        authorize(Some(&actor), Action::WithdrawReport, Some(report.user_id))?;
        if report.resolved {
            return Err(ApiError::validation("resolved", "Resolved reports cannot be withdrawn."));
        }
    }
    data.repo.delete_report(report.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/reports/{id}/resolve/",
    params(("id" = Id, Path, description = "Report id")),
    request_body = ResolveRequest,
    responses(
        (status = 200, body = ReviewReport),
        (status = 403, description = "Moderators and admins only"),
        (status = 404, description = "Report not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn resolve_report(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let actor = staff(&auth, Action::ResolveReport)?;
    let req: ResolveRequest = optional_json(&body)?;
    let report = data.repo.resolve_report(path.into_inner(), actor.id, req).await?;
    tracing::info!(report_id = report.id, moderator = actor.id, resolved = report.resolved, "report resolved");
    Ok(HttpResponse::Ok().json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_checks_only_present_fields() {
        let mut upd = ReviewUpdate { title: Some("  Solid  ".into()), ..Default::default() };
        assert!(check_update(&mut upd).is_ok());
        assert_eq!(upd.title.as_deref(), Some("Solid"));

        let mut upd = ReviewUpdate { rating: Some(11.0), ..Default::default() };
        assert_eq!(check_update(&mut upd).unwrap_err().field, "rating");

        let mut upd = ReviewUpdate { content: Some(" ".into()), ..Default::default() };
        assert_eq!(check_update(&mut upd).unwrap_err().field, "content");
    }
}
