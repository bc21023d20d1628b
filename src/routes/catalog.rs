use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::*;
use crate::policy::{authorize, Action};
use crate::repo::Repo;
use crate::validation::validate_optional_rating;

use super::{summaries, AppState};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/catalog/entries/")
            .route(web::get().to(list_entries))
            .route(web::post().to(create_entry)),
    )
    .service(web::resource("/catalog/entries/bookmark/").route(web::post().to(bookmark)))
    .service(web::resource("/catalog/entries/mark_watched/").route(web::post().to(mark_watched)))
    .service(web::resource("/catalog/entries/add_to_watchlist/").route(web::post().to(add_to_watchlist)))
    .service(web::resource("/catalog/entries/remove/").route(web::delete().to(remove_movie)))
    .service(web::resource("/catalog/entries/bookmarked/").route(web::get().to(bookmarked)))
    .service(web::resource("/catalog/entries/watched/").route(web::get().to(watched)))
    .service(web::resource("/catalog/entries/want_to_watch/").route(web::get().to(want_to_watch)))
    .service(web::resource("/catalog/entries/stats/").route(web::get().to(catalog_stats)))
    .service(
        web::resource("/catalog/entries/{id}/")
            .route(web::get().to(get_entry))
            .route(web::patch().to(update_entry))
            .route(web::delete().to(delete_entry)),
    );
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CatalogListParams {
    /// `bookmarked`, `watched` or `want_to_watch`; other values are ignored.
    pub status: Option<String>,
}

fn parse_status(raw: &str) -> Option<CatalogStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "bookmarked" => Some(CatalogStatus::Bookmarked),
        "watched" => Some(CatalogStatus::Watched),
        "want_to_watch" => Some(CatalogStatus::WantToWatch),
        _ => None,
    }
}

async fn entry_views(repo: &dyn Repo, entries: Vec<CatalogEntry>) -> Result<Vec<CatalogEntryView>, ApiError> {
    let movies = summaries(repo, entries.iter().map(|e| e.movie_id)).await?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            let movie = movies.get(&entry.movie_id).cloned();
            CatalogEntryView { entry, movie }
        })
        .collect())
}

async fn entry_view(repo: &dyn Repo, entry: CatalogEntry) -> Result<CatalogEntryView, ApiError> {
    let mut views = entry_views(repo, vec![entry]).await?;
    views.pop().ok_or(ApiError::Internal)
}

async fn list_with_status(auth: &Auth, data: &AppState, status: Option<CatalogStatus>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ManageCatalogEntries, None)?;
    let entries = data.repo.list_catalog_entries(auth.0.user_id, status).await?;
    Ok(HttpResponse::Ok().json(entry_views(data.repo.as_ref(), entries).await?))
}

#[utoipa::path(
    get,
    path = "/api/catalog/entries/",
    params(CatalogListParams),
    responses((status = 200, description = "Caller's catalog entries, newest first", body = [CatalogEntryView])),
    security(("bearer_auth" = []))
)]
pub async fn list_entries(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<CatalogListParams>,
) -> Result<HttpResponse, ApiError> {
    let status = query.status.as_deref().and_then(parse_status);
    list_with_status(&auth, &data, status).await
}

#[utoipa::path(
    post,
    path = "/api/catalog/entries/",
    request_body = NewCatalogEntryRequest,
    responses(
        (status = 201, description = "Entry created", body = CatalogEntryView),
        (status = 400, description = "Invalid rating or unknown movie"),
        (status = 409, description = "Movie already has that status")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_entry(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewCatalogEntryRequest>,
) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ManageCatalogEntries, None)?;
    let req = payload.into_inner();
    validate_optional_rating("personal_rating", req.personal_rating)?;
    let entry = data
        .repo
        .create_catalog_entry(NewCatalogEntry {
            user_id: auth.0.user_id,
            movie_id: req.movie_id,
            status: req.status,
            notes: req.notes,
            personal_rating: req.personal_rating,
        })
        .await?;
    Ok(HttpResponse::Created().json(entry_view(data.repo.as_ref(), entry).await?))
}

async fn quick_action(
    auth: Auth,
    data: web::Data<AppState>,
    action: CatalogAction,
    status: CatalogStatus,
) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ManageCatalogEntries, None)?;
    validate_optional_rating("personal_rating", action.personal_rating)?;
    let upserted = data
        .repo
        .upsert_catalog_entry(NewCatalogEntry {
            user_id: auth.0.user_id,
            movie_id: action.movie_id,
            status,
            notes: action.notes.unwrap_or_default(),
            personal_rating: action.personal_rating,
        })
        .await?;
    let view = entry_view(data.repo.as_ref(), upserted.value).await?;
    Ok(if upserted.created { HttpResponse::Created().json(view) } else { HttpResponse::Ok().json(view) })
}

#[utoipa::path(
    post,
    path = "/api/catalog/entries/bookmark/",
    request_body = CatalogAction,
    responses(
        (status = 201, description = "Bookmark created", body = CatalogEntryView),
        (status = 200, description = "Existing bookmark updated", body = CatalogEntryView),
        (status = 400, description = "Invalid rating or unknown movie")
    ),
    security(("bearer_auth" = []))
)]
pub async fn bookmark(auth: Auth, data: web::Data<AppState>, payload: web::Json<CatalogAction>) -> Result<HttpResponse, ApiError> {
    quick_action(auth, data, payload.into_inner(), CatalogStatus::Bookmarked).await
}

#[utoipa::path(
    post,
    path = "/api/catalog/entries/mark_watched/",
    request_body = CatalogAction,
    responses(
        (status = 201, description = "Watched entry created", body = CatalogEntryView),
        (status = 200, description = "Existing watched entry updated", body = CatalogEntryView),
        (status = 400, description = "Invalid rating or unknown movie")
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_watched(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<CatalogAction>,
) -> Result<HttpResponse, ApiError> {
    quick_action(auth, data, payload.into_inner(), CatalogStatus::Watched).await
}

#[utoipa::path(
    post,
    path = "/api/catalog/entries/add_to_watchlist/",
    request_body = CatalogAction,
    responses(
        (status = 201, description = "Watchlist entry created", body = CatalogEntryView),
        (status = 200, description = "Existing watchlist entry updated", body = CatalogEntryView),
        (status = 400, description = "Invalid rating or unknown movie")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_to_watchlist(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<CatalogAction>,
) -> Result<HttpResponse, ApiError> {
    quick_action(auth, data, payload.into_inner(), CatalogStatus::WantToWatch).await
}

#[utoipa::path(
    delete,
    path = "/api/catalog/entries/remove/",
    request_body = RemoveFromCatalog,
    responses(
        (status = 204, description = "Every status of the movie removed"),
        (status = 400, description = "movie_id missing"),
        (status = 404, description = "Movie not in catalog")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_movie(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<RemoveFromCatalog>,
) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ManageCatalogEntries, None)?;
    let movie_id = payload.movie_id.ok_or_else(|| ApiError::validation("movie_id", "movie_id is required"))?;
    let removed = data.repo.remove_from_catalog(auth.0.user_id, movie_id).await?;
    tracing::debug!(user_id = auth.0.user_id, movie_id, removed, "catalog entries removed");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(get, path = "/api/catalog/entries/bookmarked/", responses((status = 200, body = [CatalogEntryView])), security(("bearer_auth" = [])))]
pub async fn bookmarked(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    list_with_status(&auth, &data, Some(CatalogStatus::Bookmarked)).await
}

#[utoipa::path(get, path = "/api/catalog/entries/watched/", responses((status = 200, body = [CatalogEntryView])), security(("bearer_auth" = [])))]
pub async fn watched(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    list_with_status(&auth, &data, Some(CatalogStatus::Watched)).await
}

#[utoipa::path(get, path = "/api/catalog/entries/want_to_watch/", responses((status = 200, body = [CatalogEntryView])), security(("bearer_auth" = [])))]
pub async fn want_to_watch(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    list_with_status(&auth, &data, Some(CatalogStatus::WantToWatch)).await
}

#[utoipa::path(
    get,
    path = "/api/catalog/entries/stats/",
    responses((status = 200, description = "Per-status counts and average personal rating", body = CatalogStats)),
    security(("bearer_auth" = []))
)]
pub async fn catalog_stats(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ManageCatalogEntries, None)?;
    Ok(HttpResponse::Ok().json(data.repo.catalog_stats(auth.0.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/catalog/entries/{id}/",
    params(("id" = Id, Path, description = "Catalog entry id")),
    responses((status = 200, body = CatalogEntryView), (status = 404, description = "No such entry for this user")),
    security(("bearer_auth" = []))
)]
pub async fn get_entry(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ManageCatalogEntries, None)?;
    let entry = data.repo.get_catalog_entry(auth.0.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(entry_view(data.repo.as_ref(), entry).await?))
}

#[utoipa::path(
    patch,
    path = "/api/catalog/entries/{id}/",
    params(("id" = Id, Path, description = "Catalog entry id")),
    request_body = CatalogEntryUpdate,
    responses(
        (status = 200, body = CatalogEntryView),
        (status = 400, description = "Invalid rating"),
        (status = 404, description = "No such entry for this user")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_entry(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CatalogEntryUpdate>,
) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ManageCatalogEntries, None)?;
    let upd = payload.into_inner();
    validate_optional_rating("personal_rating", upd.personal_rating)?;
    let entry = data.repo.update_catalog_entry(auth.0.user_id, path.into_inner(), upd).await?;
    Ok(HttpResponse::Ok().json(entry_view(data.repo.as_ref(), entry).await?))
}

#[utoipa::path(
    delete,
    path = "/api/catalog/entries/{id}/",
    params(("id" = Id, Path, description = "Catalog entry id")),
    responses((status = 204, description = "Entry deleted"), (status = 404, description = "No such entry for this user")),
    security(("bearer_auth" = []))
)]
pub async fn delete_entry(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ManageCatalogEntries, None)?;
    data.repo.delete_catalog_entry(auth.0.user_id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_is_lenient() {
        assert_eq!(parse_status("Watched"), Some(CatalogStatus::Watched));
        assert_eq!(parse_status("want_to_watch"), Some(CatalogStatus::WantToWatch));
        assert_eq!(parse_status("seen"), None);
    }
}
