use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::{ready, Ready};
use utoipa::ToSchema;

use crate::config::TokenConfig;
use crate::error::ApiError;
use crate::models::{Id, TokenPair, User};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Critic,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Critic, Role::Moderator, Role::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Critic => "CRITIC",
            Role::Moderator => "MODERATOR",
            Role::Admin => "ADMIN",
        }
    }

    /// Case-insensitive parse of one of the four role names.
    pub fn parse(s: &str) -> Option<Role> {
        let wanted = s.trim();
        Role::ALL.into_iter().find(|r| r.as_str().eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Token payload. The role is a snapshot taken at login; changing a user's
/// role does not touch tokens that were already issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenType,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
    #[serde(rename = "sub")]
    pub user_id: Id,
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// The authenticated principal as seen by authorization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Id,
    pub role: Role,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("JWT_SECRET not set")]
    MissingSecret,
    #[error("token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("expected a {0:?} token")]
    WrongTokenType(TokenType),
    #[error("password hashing: {0}")]
    PasswordHash(String),
}

fn secret() -> Result<String, AuthError> {
    std::env::var("JWT_SECRET").map_err(|_| AuthError::MissingSecret)
}

/// Validate a JWT of the expected kind and return its claims.
pub fn decode_token(token: &str, expected: TokenType) -> Result<Claims, AuthError> {
    let secret = secret()?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    if data.claims.token_type != expected {
        return Err(AuthError::WrongTokenType(expected));
    }
    Ok(data.claims)
}

fn sign(claims: &Claims) -> Result<String, AuthError> {
    let secret = secret()?;
    Ok(encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}

fn stamp(ttl: chrono::Duration) -> (usize, usize, String) {
    let now = chrono::Utc::now();
    let exp = now + ttl;
    (now.timestamp() as usize, exp.timestamp() as usize, uuid::Uuid::new_v4().to_string())
}

fn claims_for(user: &User, token_type: TokenType, ttl: chrono::Duration) -> Claims {
    let (iat, exp, jti) = stamp(ttl);
    Claims {
        token_type,
        exp,
        iat,
        jti,
        user_id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        role: user.role,
    }
}

/// Issue an access/refresh pair carrying the user's current username, email and role.
pub fn issue_token_pair(user: &User) -> Result<TokenPair, AuthError> {
    let cfg = TokenConfig::from_env();
    let access = sign(&claims_for(user, TokenType::Access, cfg.access_ttl))?;
    let refresh = sign(&claims_for(user, TokenType::Refresh, cfg.refresh_ttl))?;
    Ok(TokenPair { access, refresh })
}

/// Mint a fresh access token from a refresh token. Identity claims are copied
/// from the refresh token as-is, so the role stays what it was at login.
pub fn refresh_access_token(refresh: &str) -> Result<String, AuthError> {
    let cfg = TokenConfig::from_env();
    let old = decode_token(refresh, TokenType::Refresh)?;
    let (iat, exp, jti) = stamp(cfg.access_ttl);
    sign(&Claims { token_type: TokenType::Access, iat, exp, jti, ..old })
}

/// Extractor yielding validated access-token `Claims`.
pub struct Auth(pub Claims);

impl Auth {
    pub fn actor(&self) -> Actor {
        Actor { id: self.0.user_id, role: self.0.role }
    }
}

impl FromRequest for Auth {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        // Delegate to BearerAuth to parse the header.
        if let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() {
            return match decode_token(bearer.token(), TokenType::Access) {
                Ok(claims) => ready(Ok(Auth(claims))),
                Err(e) => {
                    tracing::debug!("rejected bearer token: {e}");
                    ready(Err(ApiError::Unauthorized.into()))
                }
            };
        }
        ready(Err(ApiError::Unauthorized.into()))
    }
}

/// Maps an optional `Auth` extractor to the actor used by `policy::authorize`.
pub fn actor_of(auth: &Option<Auth>) -> Option<Actor> {
    auth.as_ref().map(Auth::actor)
}

/// Hash a password with Argon2id on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::PasswordHash(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::PasswordHash(format!("hashing task failed: {e}")))?
}

pub async fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    })
    .await
    .map_err(|e| AuthError::PasswordHash(format!("verification task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_closed() {
        assert_eq!(Role::parse("critic"), Some(Role::Critic));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::default(), Role::User);
    }

    #[tokio::test]
    async fn password_hash_roundtrip() {
        let hash = hash_password("correct horse").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("wrong horse", &hash).await.unwrap());
    }
}
