use actix_web::{web, HttpRequest, HttpResponse};

use crate::auth::{hash_password, issue_token_pair, refresh_access_token, verify_password, Auth, Role};
use crate::error::ApiError;
use crate::models::*;
use crate::policy::{authorize, Action};
use crate::validation::{normalize_email, validate_email, validate_password, validate_username};

use super::{client_ip, AppState};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/auth/register/").route(web::post().to(register)))
        .service(web::resource("/auth/login/").route(web::post().to(login)))
        .service(web::resource("/auth/login/refresh/").route(web::post().to(refresh)))
        .service(web::resource("/auth/users/").route(web::get().to(list_users)))
        .service(
            web::resource("/auth/users/me/")
                .route(web::get().to(me))
                .route(web::patch().to(update_me)),
        )
        .service(web::resource("/auth/users/{id}/role/").route(web::patch().to(update_role)));
}

#[utoipa::path(
    post,
    path = "/api/auth/register/",
    request_body = RegisterRequest,
    responses(
        (status = 201, body = RegisterResponse),
        (status = 400, description = "Invalid username, email or password"),
        (status = 409, description = "Email or username already taken"),
        (status = 429, description = "Too many attempts from this address")
    )
)]
pub async fn register(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let ip = client_ip(&req);
    if !data.throttle.allow_register(&ip) {
        tracing::warn!(%ip, "registration throttled");
        return Err(ApiError::TooManyRequests);
    }
    let body = payload.into_inner();
    let username = validate_username(&body.username)?.to_string();
    let email = normalize_email(validate_email(&body.email)?);
    validate_password(&body.password)?;
    let password_hash = hash_password(&body.password).await?;
    let user = data
        .repo
        .create_user(NewUser {
            username,
            email,
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            password_hash,
            role: Role::User,
        })
        .await?;
    tracing::info!(user_id = user.id, "user registered");
    Ok(HttpResponse::Created().json(RegisterResponse { user, message: "User registered successfully".into() }))
}

#[utoipa::path(
    post,
    path = "/api/auth/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, body = TokenPair),
        (status = 401, description = "Unknown email or wrong password"),
        (status = 429, description = "Too many attempts from this address")
    )
)]
pub async fn login(req: HttpRequest, data: web::Data<AppState>, payload: web::Json<LoginRequest>) -> Result<HttpResponse, ApiError> {
    let ip = client_ip(&req);
    if !data.throttle.allow_login(&ip) {
        tracing::warn!(%ip, "login throttled");
        return Err(ApiError::TooManyRequests);
    }
    let body = payload.into_inner();
    let email = normalize_email(&body.email);
    let Some(creds) = data.repo.find_credentials(&email).await? else {
        return Err(ApiError::Unauthorized);
    };
    if !verify_password(&body.password, &creds.password_hash).await? {
        tracing::debug!(user_id = creds.user.id, "wrong password");
        return Err(ApiError::Unauthorized);
    }
    Ok(HttpResponse::Ok().json(issue_token_pair(&creds.user)?))
}

#[utoipa::path(
    post,
    path = "/api/auth/login/refresh/",
    request_body = RefreshRequest,
    responses((status = 200, body = AccessToken), (status = 401, description = "Invalid or expired refresh token"))
)]
pub async fn refresh(payload: web::Json<RefreshRequest>) -> Result<HttpResponse, ApiError> {
    let access = refresh_access_token(&payload.refresh)?;
    Ok(HttpResponse::Ok().json(AccessToken { access }))
}

#[utoipa::path(
    get,
    path = "/api/auth/users/",
    responses((status = 200, body = [User]), (status = 403, description = "Admins only")),
    security(("bearer_auth" = []))
)]
pub async fn list_users(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ManageUsers, None)?;
    Ok(HttpResponse::Ok().json(data.repo.list_users().await?))
}

#[utoipa::path(get, path = "/api/auth/users/me/", responses((status = 200, body = User)), security(("bearer_auth" = [])))]
pub async fn me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ManageOwnProfile, None)?;
    Ok(HttpResponse::Ok().json(data.repo.get_user(auth.0.user_id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/auth/users/me/",
    request_body = ProfileUpdate,
    responses(
        (status = 200, body = User),
        (status = 400, description = "Invalid username"),
        (status = 409, description = "Username already taken")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_me(auth: Auth, data: web::Data<AppState>, payload: web::Json<ProfileUpdate>) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ManageOwnProfile, None)?;
    let mut upd = payload.into_inner();
    if let Some(name) = upd.username.as_deref() {
        upd.username = Some(validate_username(name)?.to_string());
    }
    upd.first_name = upd.first_name.map(|v| v.trim().to_string());
    upd.last_name = upd.last_name.map(|v| v.trim().to_string());
    Ok(HttpResponse::Ok().json(data.repo.update_profile(auth.0.user_id, upd).await?))
}

#[utoipa::path(
    patch,
    path = "/api/auth/users/{id}/role/",
    params(("id" = Id, Path, description = "User id")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, body = RoleUpdateResponse),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_role(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<RoleUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    authorize(Some(&auth.actor()), Action::ManageUsers, None)?;
    let role = Role::parse(&payload.role).ok_or_else(|| {
        let names: Vec<&str> = Role::ALL.iter().map(|r| r.as_str()).collect();
        ApiError::validation("role", format!("Invalid role. Must be one of: {}", names.join(", ")))
    })?;
    let (old_role, user) = data.repo.set_role(path.into_inner(), role).await?;
    tracing::info!(user_id = user.id, %old_role, new_role = %user.role, by = auth.0.user_id, "role changed");
    Ok(HttpResponse::Ok().json(RoleUpdateResponse {
        user_id: user.id,
        message: format!("User {} role updated from {} to {}", user.username, old_role, user.role),
        username: user.username,
        old_role,
        new_role: user.role,
    }))
}
