use crate::quicknotes::{session::current_user, state::AuthState, users::User};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Authenticated user", body = User),
        (status = 204, description = "No active session")
    ),
    tag = "session"
)]
pub async fn me(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> Response {
    let lookup = current_user(&headers, &state).await;

    let mut response_headers = HeaderMap::new();
    lookup.apply(&mut response_headers);

    match lookup.user {
        Some(user) => (StatusCode::OK, response_headers, Json(user)).into_response(),
        None => (StatusCode::NO_CONTENT, response_headers).into_response(),
    }
}
