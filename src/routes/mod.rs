pub mod auth;
pub mod factory;
pub mod health;
pub mod user;

use axum::extract::OriginalUri;

use crate::error::Error;

/// Catch-all for unknown paths and for methods a known path does not serve.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> Error {
    Error::NotFound(format!("Can't find {} on this server!", uri))
}
