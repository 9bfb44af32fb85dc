use axum::{
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Json},
};
use serde_json::json;
use tracing::error;

use crate::quicknotes::GIT_COMMIT_HASH;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service name, version and build", content_type = "application/json"),
    ),
    tag = "health"
)]
// axum handler for health
pub async fn health() -> impl IntoResponse {
    let body = Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "build": GIT_COMMIT_HASH,
    }));

    let short_hash = GIT_COMMIT_HASH
        .get(0..7)
        .filter(|_| GIT_COMMIT_HASH.len() > 7)
        .unwrap_or_default();

    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash
    )) {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => error!("Invalid X-App header: {err}"),
    }

    (headers, body)
}
