//! Three-legged OAuth 1.0a login with Twitter.

use super::{
    complete_login, redirect_home, redirect_to, too_many_logins, validate_redirect, RedirectQuery,
};
use crate::quicknotes::{
    provider::{Credentials, Provider},
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
use tracing::{debug, error, info, instrument, warn};
use utoipa::IntoParams;

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
    /// Echo of the redirect target; the copy stored with the token wins.
    pub redirect: Option<String>,
    /// Set instead of `oauth_token` when the user declines.
    pub denied: Option<String>,
}

#[utoipa::path(
    get,
    path = "/logintwitter",
    params(RedirectQuery),
    responses(
        (status = 302, description = "Redirect to Twitter for authorization"),
        (status = 400, description = "Missing or invalid redirect", body = String),
        (status = 500, description = "Twitter did not issue a temporary credential", body = String),
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

    let callback_url = state.config().twitter_callback_url(&redirect);
    let temporary = match state
        .twitter()
        .request_temporary_credential(&callback_url)
        .await
    {
        Ok(temporary) => temporary,
        Err(err) => {
            error!("Failed to obtain Twitter request token: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Twitter login failed: {err}"),
            )
                .into_response();
        }
    };

    let location = state.twitter().authorization_url(&temporary);
    if let Err(err) = state.twitter_logins().put(
        temporary.token,
        PendingLogin {
            secret: temporary.secret,
            redirect,
        },
    ) {
        return too_many_logins(&err);
    }

    redirect_to(StatusCode::FOUND, &location, None)
}

#[utoipa::path(
    get,
    path = "/logintwittercb",
    params(CallbackQuery),
    responses(
        (status = 307, description = "Logged in; session cookie set. Also used to send the browser home when the profile cannot be resolved"),
        (status = 500, description = "Unknown oauth_token or failed exchange", body = String),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn callback(
    Query(query): Query<CallbackQuery>,
    state: Extension<Arc<AuthState>>,
) -> Response {
    if let Some(denied) = query.denied.as_deref() {
        info!("Twitter authorization denied");
        state.twitter_logins().delete(denied);
        return redirect_home(&state);
    }

    let Some(pending) = query
        .oauth_token
        .as_deref()
        .and_then(|token| state.twitter_logins().take(token))
    else {
        warn!("Twitter callback with unknown oauth_token");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Unknown oauth_token.".to_string(),
        )
            .into_response();
    };

    if query.redirect.as_deref().map(str::trim) != Some(pending.redirect.as_str()) {
        debug!("callback redirect differs from stored target, using stored");
    }

    let temporary = Credentials {
        token: query.oauth_token.unwrap_or_default(),
        secret: pending.secret,
    };
    let verifier = query.oauth_verifier.unwrap_or_default();

    let access = match state
        .twitter()
        .request_access_credential(&temporary, &verifier)
        .await
    {
        Ok(access) => access,
        Err(err) => {
            error!("Twitter token exchange failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Twitter token exchange failed: {err}"),
            )
                .into_response();
        }
    };

    let profile = match state.twitter().fetch_profile(&access).await {
        Ok(profile) => profile,
        Err(err) if err.is_missing_identity() => {
            error!("Twitter profile unusable: {err}");
            return redirect_home(&state);
        }
        Err(err) => {
            error!("Failed to fetch Twitter profile: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to fetch Twitter profile: {err}"),
            )
                .into_response();
        }
    };

    complete_login(
        &state,
        Provider::Twitter,
        profile,
        StoredCredential {
            provider: Provider::Twitter.as_str(),
            token: access.token,
            secret: Some(access.secret),
        },
        &pending.redirect,
    )
    .await
}
