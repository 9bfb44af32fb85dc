use super::{redirect_to, validate_redirect, RedirectQuery};
use crate::quicknotes::{session::deleted_cookie, state::AuthState};
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, instrument};

#[utoipa::path(
    get,
    path = "/logout",
    params(RedirectQuery),
    responses(
        (status = 302, description = "Session cookie replaced with the logged-out sentinel"),
        (status = 400, description = "Missing or invalid redirect", body = String),
    ),
    tag = "auth"
)]
#[instrument(skip(state))]
pub async fn logout(
    Query(query): Query<RedirectQuery>,
    state: Extension<Arc<AuthState>>,
) -> Response {
    let redirect = match validate_redirect(query.redirect.as_deref()) {
        Ok(redirect) => redirect,
        Err(err) => return err.into_response(),
    };

    match deleted_cookie(&state) {
        Ok(cookie) => redirect_to(StatusCode::FOUND, &redirect, Some(cookie)),
        Err(err) => {
            error!("Failed to build sentinel cookie: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to clear session".to_string(),
            )
                .into_response()
        }
    }
}
