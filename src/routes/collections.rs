use actix_web::{web, HttpResponse};

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::*;
use crate::policy::{authorize, Action};
use crate::repo::Repo;
use crate::validation::{validate_required_text, FieldResult, MAX_COLLECTION_NAME_LEN};

use super::{summaries, AppState};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/catalog/collections/")
            .route(web::get().to(list_collections))
            .route(web::post().to(create_collection)),
    )
    .service(web::resource("/catalog/collections/my_collections/").route(web::get().to(my_collections)))
    .service(
        web::resource("/catalog/collections/{id}/")
            .route(web::get().to(get_collection))
            .route(web::put().to(replace_collection))
            .route(web::patch().to(update_collection))
            .route(web::delete().to(delete_collection)),
    )
    .service(web::resource("/catalog/collections/{id}/add_movie/").route(web::post().to(add_movie)))
    .service(web::resource("/catalog/collections/{id}/remove_movie/").route(web::delete().to(remove_movie)));
}

fn collection_name(raw: &str) -> FieldResult<String> {
    validate_required_text("name", raw, Some(MAX_COLLECTION_NAME_LEN)).map(str::to_string)
}

async fn collection_views(repo: &dyn Repo, records: Vec<CollectionRecord>) -> Result<Vec<CollectionView>, ApiError> {
    let movies = summaries(repo, records.iter().flat_map(|r| r.items.iter().map(|i| i.movie_id))).await?;
    Ok(records
        .into_iter()
        .map(|record| CollectionView {
            movie_count: record.items.len() as i64,
            movies: record
                .items
                .into_iter()
                .map(|item| CollectionItemView { movie: movies.get(&item.movie_id).cloned(), item })
                .collect(),
            collection: record.collection,
        })
        .collect())
}

async fn collection_view(repo: &dyn Repo, record: CollectionRecord) -> Result<CollectionView, ApiError> {
    collection_views(repo, vec![record]).await?.pop().ok_or(ApiError::Internal)
}

/// Loads the collection and checks the caller owns it.
async fn owned(auth: &Auth, repo: &dyn Repo, id: Id) -> Result<CollectionRecord, ApiError> {
    let record = repo.get_collection(id).await?;
    authorize(Some(&auth.actor()), Action::WriteCollection, Some(record.collection.user_id))?;
    Ok(record)
}

#[utoipa::path(
    get,
    path = "/api/catalog/collections/",
    responses((status = 200, description = "Own collections plus every public one", body = [CollectionView])),
    security(("bearer_auth" = []))
)]
pub async fn list_collections(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ReadPublicCollection, None)?;
    let records = data.repo.list_visible_collections(auth.0.user_id).await?;
    Ok(HttpResponse::Ok().json(collection_views(data.repo.as_ref(), records).await?))
}

#[utoipa::path(
    get,
    path = "/api/catalog/collections/my_collections/",
    responses((status = 200, body = [CollectionView])),
    security(("bearer_auth" = []))
)]
pub async fn my_collections(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::CreateCollection, None)?;
    let records = data.repo.list_own_collections(auth.0.user_id).await?;
    Ok(HttpResponse::Ok().json(collection_views(data.repo.as_ref(), records).await?))
}

#[utoipa::path(
    post,
    path = "/api/catalog/collections/",
    request_body = NewCollectionRequest,
    responses(
        (status = 201, body = CollectionView),
        (status = 400, description = "Blank or overlong name"),
        (status = 409, description = "Caller already has a collection with this name")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_collection(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewCollectionRequest>,
) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::CreateCollection, None)?;
    let req = payload.into_inner();
    let record = data
        .repo
        .create_collection(NewCollection {
            user_id: auth.0.user_id,
            name: collection_name(&req.name)?,
            description: req.description,
            is_public: req.is_public,
        })
        .await?;
    Ok(HttpResponse::Created().json(collection_view(data.repo.as_ref(), record).await?))
}

#[utoipa::path(
    get,
    path = "/api/catalog/collections/{id}/",
    params(("id" = Id, Path, description = "Collection id")),
    responses(
        (status = 200, body = CollectionView),
        (status = 403, description = "Private collection of another user"),
        (status = 404, description = "Collection not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_collection(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let record = data.repo.get_collection(path.into_inner()).await?;
    if record.collection.is_public {
        authorize(Some(&auth.actor()), Action::ReadPublicCollection, None)?;
    } else {
        authorize(Some(&auth.actor()), Action::ReadCollection, Some(record.collection.user_id))?;
    }
    Ok(HttpResponse::Ok().json(collection_view(data.repo.as_ref(), record).await?))
}

#[utoipa::path(
    put,
    path = "/api/catalog/collections/{id}/",
    params(("id" = Id, Path, description = "Collection id")),
    request_body = NewCollectionRequest,
    responses(
        (status = 200, body = CollectionView),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Collection not found"),
        (status = 409, description = "Name already used")
    ),
    security(("bearer_auth" = []))
)]
pub async fn replace_collection(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<NewCollectionRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = owned(&auth, data.repo.as_ref(), path.into_inner()).await?.collection.id;
    let req = payload.into_inner();
    let upd = CollectionUpdate {
        name: Some(collection_name(&req.name)?),
        description: Some(req.description),
        is_public: Some(req.is_public),
    };
    let record = data.repo.update_collection(id, upd).await?;
    Ok(HttpResponse::Ok().json(collection_view(data.repo.as_ref(), record).await?))
}

#[utoipa::path(
    patch,
    path = "/api/catalog/collections/{id}/",
    params(("id" = Id, Path, description = "Collection id")),
    request_body = CollectionUpdate,
    responses(
        (status = 200, body = CollectionView),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Collection not found"),
        (status = 409, description = "Name already used")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_collection(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CollectionUpdate>,
) -> Result<HttpResponse, ApiError> {
    let id = owned(&auth, data.repo.as_ref(), path.into_inner()).await?.collection.id;
    let mut upd = payload.into_inner();
    upd.name = upd.name.as_deref().map(collection_name).transpose()?;
    let record = data.repo.update_collection(id, upd).await?;
    Ok(HttpResponse::Ok().json(collection_view(data.repo.as_ref(), record).await?))
}

#[utoipa::path(
    delete,
    path = "/api/catalog/collections/{id}/",
    params(("id" = Id, Path, description = "Collection id")),
    responses(
        (status = 204, description = "Collection and its items deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Collection not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_collection(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let id = owned(&auth, data.repo.as_ref(), path.into_inner()).await?.collection.id;
    data.repo.delete_collection(id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/catalog/collections/{id}/add_movie/",
    params(("id" = Id, Path, description = "Collection id")),
    request_body = CollectionMovie,
    responses(
        (status = 201, body = Message),
        (status = 400, description = "movie_id missing or unknown"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Collection not found"),
        (status = 409, description = "Movie already in the collection")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_movie(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CollectionMovie>,
) -> Result<HttpResponse, ApiError> {
    let id = owned(&auth, data.repo.as_ref(), path.into_inner()).await?.collection.id;
    let movie_id = payload.movie_id.ok_or_else(|| ApiError::validation("movie_id", "movie_id is required"))?;
    let item = data.repo.add_to_collection(id, movie_id).await?;
    tracing::debug!(collection_id = id, movie_id, order = item.order, "movie added to collection");
    Ok(HttpResponse::Created().json(Message::new("Movie added to list")))
}

#[utoipa::path(
    delete,
    path = "/api/catalog/collections/{id}/remove_movie/",
    params(("id" = Id, Path, description = "Collection id")),
    request_body = CollectionMovie,
    responses(
        (status = 204, description = "Movie removed"),
        (status = 400, description = "movie_id missing"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Collection not found or movie not in it")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_movie(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CollectionMovie>,
) -> Result<HttpResponse, ApiError> {
    let id = owned(&auth, data.repo.as_ref(), path.into_inner()).await?.collection.id;
    let movie_id = payload.movie_id.ok_or_else(|| ApiError::validation("movie_id", "movie_id is required"))?;
    data.repo.remove_from_collection(id, movie_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
