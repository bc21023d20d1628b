use actix_web::{web, HttpResponse};

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::*;
use crate::policy::{authorize, Action};
use crate::validation::{validate_required_text, validate_runtime, validate_vote_average, FieldResult, MAX_TITLE_LEN};

use super::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/movies/")
            .route(web::get().to(list_movies))
            .route(web::post().to(create_movie)),
    )
    .service(web::resource("/movies/stats/").route(web::get().to(movie_stats)))
    .service(
        web::resource("/movies/{id}/")
            .route(web::get().to(get_movie))
            .route(web::put().to(replace_movie))
            .route(web::patch().to(patch_movie))
            .route(web::delete().to(delete_movie)),
    )
    .service(web::resource("/genres/").route(web::get().to(list_genres)))
    .service(web::resource("/companies/").route(web::get().to(list_companies)))
    .service(web::resource("/languages/").route(web::get().to(list_languages)))
    .service(web::resource("/countriesISO/").route(web::get().to(list_origin_countries)))
    .service(web::resource("/countries/").route(web::get().to(list_production_countries)))
    .service(web::resource("/videos/").route(web::get().to(list_videos)));
}

fn validate_fields(f: &MovieFields) -> FieldResult<()> {
    validate_required_text("title", &f.title, Some(MAX_TITLE_LEN))?;
    validate_required_text("original_title", &f.original_title, Some(MAX_TITLE_LEN))?;
    validate_vote_average(f.vote_average)?;
    validate_runtime(f.runtime)?;
    Ok(())
}

fn validate_patch(p: &MoviePatch) -> FieldResult<()> {
    if let Some(title) = &p.title {
        validate_required_text("title", title, Some(MAX_TITLE_LEN))?;
    }
    if let Some(title) = &p.original_title {
        validate_required_text("original_title", title, Some(MAX_TITLE_LEN))?;
    }
    validate_vote_average(p.vote_average)?;
    validate_runtime(p.runtime)?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/movies/",
    params(MovieListParams),
    responses((status = 200, description = "One page of movie summaries", body = MoviePage))
)]
pub async fn list_movies(data: web::Data<AppState>, query: web::Query<MovieListParams>) -> Result<HttpResponse, ApiError> {
    let query = MovieQuery::from(query.into_inner());
    let page = data.repo.list_movies(&query).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/movies/stats/",
    responses((status = 200, description = "Catalogue aggregates", body = MovieStats))
)]
pub async fn movie_stats(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.movie_stats().await?))
}

#[utoipa::path(
    get,
    path = "/api/movies/{id}/",
    params(("id" = Id, Path, description = "Movie id")),
    responses(
        (status = 200, description = "Movie with related lookups", body = MovieDetail),
        (status = 404, description = "Movie not found")
    )
)]
pub async fn get_movie(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.get_movie(path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/movies/",
    request_body = MovieInput,
    responses(
        (status = 201, description = "Movie created", body = MovieDetail),
        (status = 400, description = "Invalid field or unknown lookup key"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Admins only")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_movie(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<MovieInput>,
) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::WriteCatalogue, None)?;
    let input = payload.into_inner();
    validate_fields(&input.fields)?;
    let movie = data.repo.create_movie(input).await?;
    tracing::info!(movie_id = movie.movie.id, by = auth.0.user_id, "movie created");
    Ok(HttpResponse::Created().json(movie))
}

#[utoipa::path(
    put,
    path = "/api/movies/{id}/",
    params(("id" = Id, Path, description = "Movie id")),
    request_body = MovieInput,
    responses(
        (status = 200, description = "Movie replaced", body = MovieDetail),
        (status = 400, description = "Invalid field or unknown lookup key"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Movie not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn replace_movie(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<MovieInput>,
) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::WriteCatalogue, None)?;
    let input = payload.into_inner();
    validate_fields(&input.fields)?;
    let movie = data
        .repo
        .update_movie(path.into_inner(), MovieChange::Replace(input.fields), input.relations)
        .await?;
    Ok(HttpResponse::Ok().json(movie))
}

#[utoipa::path(
    patch,
    path = "/api/movies/{id}/",
    params(("id" = Id, Path, description = "Movie id")),
    request_body = MoviePatch,
    responses(
        (status = 200, description = "Movie updated", body = MovieDetail),
        (status = 400, description = "Invalid field or unknown lookup key"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Movie not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn patch_movie(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<MoviePatch>,
) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::WriteCatalogue, None)?;
    let mut patch = payload.into_inner();
    validate_patch(&patch)?;
    let relations = std::mem::take(&mut patch.relations);
    let movie = data
        .repo
        .update_movie(path.into_inner(), MovieChange::Patch(Box::new(patch)), relations)
        .await?;
    Ok(HttpResponse::Ok().json(movie))
}

#[utoipa::path(
    delete,
    path = "/api/movies/{id}/",
    params(("id" = Id, Path, description = "Movie id")),
    responses(
        (status = 204, description = "Movie and everything referencing it deleted"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Movie not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_movie(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::WriteCatalogue, None)?;
    let id = path.into_inner();
    data.repo.delete_movie(id).await?;
    tracing::info!(movie_id = id, by = auth.0.user_id, "movie deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(get, path = "/api/genres/", responses((status = 200, body = [Genre])))]
pub async fn list_genres(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_genres().await?))
}

#[utoipa::path(get, path = "/api/companies/", responses((status = 200, body = [ProductionCompany])))]
pub async fn list_companies(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_production_companies().await?))
}

#[utoipa::path(get, path = "/api/languages/", responses((status = 200, body = [SpokenLanguage])))]
pub async fn list_languages(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_spoken_languages().await?))
}

#[utoipa::path(get, path = "/api/countriesISO/", responses((status = 200, body = [OriginCountry])))]
pub async fn list_origin_countries(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_origin_countries().await?))
}

#[utoipa::path(get, path = "/api/countries/", responses((status = 200, body = [ProductionCountry])))]
pub async fn list_production_countries(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_production_countries().await?))
}

#[utoipa::path(get, path = "/api/videos/", responses((status = 200, body = [Video])))]
pub async fn list_videos(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_videos().await?))
}
