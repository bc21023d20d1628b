//! Domain types and request/response payloads.

mod catalog;
mod movie;
mod review;
mod user;

pub use catalog::*;
pub use movie::*;
pub use review::*;
pub use user::*;

// Always Postgres-shaped: BIGSERIAL ids.
pub type Id = i64;
