pub mod auth;
pub mod bulk;
pub mod config;
pub mod error;
pub mod models;
pub mod openapi;
pub mod policy;
pub mod rate_limit; // per-IP throttling of the credential endpoints
pub mod repo;
pub mod routes;
pub mod security;
pub mod validation;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
