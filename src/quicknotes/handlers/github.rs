//! OAuth 2.0 authorization-code login with GitHub, protected by a per-request
//! `state` and PKCE.

use super::{
    complete_login, redirect_home, redirect_to, too_many_logins, validate_redirect, RedirectQuery,
};
use crate::quicknotes::{
    provider::{
        github::{pkce_challenge, random_token},
        Provider,
    },
    state::AuthState,
    store::PendingLogin,
    users::StoredCredential,
};
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, instrument, warn};
use utoipa::IntoParams;

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Reported by GitHub instead of `code`, e.g. `access_denied`.
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[utoipa::path(
    get,
    path = "/logingithub",
    params(RedirectQuery),
    responses(
        (status = 307, description = "Redirect to GitHub for authorization"),
        (status = 400, description = "Missing or invalid redirect", body = String),
        (status = 503, description = "Too many logins in progress", body = String),
    ),
    tag = "auth"
)]
#[instrument(skip(state))]
pub async fn login(
    Query(query): Query<RedirectQuery>,
    state: Extension<Arc<AuthState>>,
) -> Response {
    let redirect = match validate_redirect(query.redirect.as_deref()) {
        Ok(redirect) => redirect,
        Err(err) => return err.into_response(),
    };

    let csrf_state = random_token();
    let verifier = random_token();
    let location = state
        .github()
        .authorization_url(&csrf_state, &pkce_challenge(&verifier));

    if let Err(err) = state.github_logins().put(
        csrf_state,
        PendingLogin {
            secret: verifier,
            redirect,
        },
    ) {
        return too_many_logins(&err);
    }

    redirect_to(StatusCode::TEMPORARY_REDIRECT, &location, None)
}

#[utoipa::path(
    get,
    path = "/logingithubcb",
    params(CallbackQuery),
    responses(
        (status = 307, description = "Logged in; session cookie set. Also used to send the browser home when GitHub reports an error"),
        (status = 500, description = "Unknown state or failed exchange", body = String),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn callback(
    Query(query): Query<CallbackQuery>,
    state: Extension<Arc<AuthState>>,
) -> Response {
    if let Some(error) = query.error.as_deref() {
        warn!(
            "GitHub authorization failed: {error} {}",
            query.error_description.as_deref().unwrap_or_default()
        );
        if let Some(csrf_state) = query.state.as_deref() {
            state.github_logins().delete(csrf_state);
        }
        return redirect_home(&state);
    }

    let Some(pending) = query
        .state
        .as_deref()
        .and_then(|csrf_state| state.github_logins().take(csrf_state))
    else {
        warn!("GitHub callback with unknown state");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Unknown or expired state.".to_string(),
        )
            .into_response();
    };

    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        error!("GitHub callback without code");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Missing code.".to_string()).into_response();
    };

    let access_token = match state.github().exchange_code(code, &pending.secret).await {
        Ok(token) => token,
        Err(err) => {
            error!("GitHub code exchange failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("GitHub code exchange failed: {err}"),
            )
                .into_response();
        }
    };

    let profile = match state.github().fetch_profile(&access_token).await {
        Ok(profile) => profile,
        Err(err) if err.is_missing_identity() => {
            error!("GitHub profile unusable: {err}");
            return redirect_home(&state);
        }
        Err(err) => {
            error!("Failed to fetch GitHub profile: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to fetch GitHub profile: {err}"),
            )
                .into_response();
        }
    };

    complete_login(
        &state,
        Provider::GitHub,
        profile,
        StoredCredential {
            provider: Provider::GitHub.as_str(),
            token: access_token,
            secret: None,
        },
        &pending.redirect,
    )
    .await
}
