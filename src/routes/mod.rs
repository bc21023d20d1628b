use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{web, HttpRequest};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::models::{Id, MovieSummary};
use crate::rate_limit::AuthThrottle;
use crate::repo::Repo;

pub mod catalog;
pub mod collections;
pub mod movies;
pub mod reviews;
pub mod users;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub throttle: AuthThrottle,
}

impl AppState {
    /// State with credential throttling switched off.
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo, throttle: AuthThrottle::disabled() }
    }

    pub fn with_throttle(mut self, throttle: AuthThrottle) -> Self {
        self.throttle = throttle;
        self
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default().error_handler(|err, _req| ApiError::validation("body", err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default().error_handler(|err, _req| ApiError::validation("query", err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .configure(movies::config)
            .configure(catalog::config)
            .configure(collections::config)
            .configure(reviews::config)
            .configure(users::config),
    );
}

/// Client address used as the throttling key.
pub(crate) fn client_ip(req: &HttpRequest) -> String {
    // the socket peer; forwarded headers are client controlled
    req.peer_addr().map(|addr| addr.ip().to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// JSON body that may be omitted: an empty body yields the defaults, anything
/// else must parse.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::validation("body", e.to_string()))
}

/// Movie summaries for embedding, keyed by movie id.
pub(crate) async fn summaries(repo: &dyn Repo, ids: impl IntoIterator<Item = Id>) -> Result<HashMap<Id, MovieSummary>, ApiError> {
    let mut ids: Vec<Id> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(repo.movie_summaries(&ids).await?.into_iter().map(|m| (m.id, m)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HideRequest;

    #[test]
    fn optional_json_defaults_only_when_empty() {
        let empty: HideRequest = optional_json(b"").unwrap();
        assert_eq!(empty.moderation_notes, "");
        let blank: HideRequest = optional_json(b" \n").unwrap();
        assert_eq!(blank.moderation_notes, "");
        let given: HideRequest = optional_json(br#"{"moderation_notes": "spoilers"}"#).unwrap();
        assert_eq!(given.moderation_notes, "spoilers");
        let err = optional_json::<HideRequest>(br#"{"moderation_notes": "#).unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref fe) if fe.field == "body"), "{err:?}");
    }
}
