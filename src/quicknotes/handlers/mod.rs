pub mod github;
pub mod health;
pub mod logout;
pub mod me;
pub mod twitter;

// common functions for the handlers
use crate::quicknotes::{
    provider::{Provider, ProviderProfile},
    session::{codec::SessionPayload, session_cookie},
    state::AuthState,
    store::StoreFull,
    users::StoredCredential,
};
use axum::{
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};
use utoipa::IntoParams;

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct RedirectQuery {
    /// Site-local path to land on afterwards, e.g. `/notes/42`.
    pub redirect: Option<String>,
}

/// Accept only non-empty site-local paths.
pub(crate) fn validate_redirect(redirect: Option<&str>) -> Result<String, (StatusCode, String)> {
    let redirect = redirect.map(str::trim).unwrap_or_default();
    if redirect.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Missing redirect".to_string()));
    }
    if !redirect.starts_with('/')
        || redirect.starts_with("//")
        || redirect.starts_with("/\\")
        || redirect.chars().any(char::is_control)
    {
        return Err((StatusCode::BAD_REQUEST, "Invalid redirect".to_string()));
    }
    Ok(redirect.to_string())
}

pub(crate) fn redirect_to(status: StatusCode, location: &str, cookie: Option<HeaderValue>) -> Response {
    let Ok(location) = HeaderValue::from_str(location) else {
        error!("Invalid redirect location: {location}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Invalid redirect location".to_string(),
        )
            .into_response();
    };

    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, location);
    if let Some(cookie) = cookie {
        headers.insert(SET_COOKIE, cookie);
    }
    (status, headers).into_response()
}

pub(crate) fn too_many_logins(err: &StoreFull) -> Response {
    warn!("Refusing login start: {err}");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "Too many logins in progress, try again later".to_string(),
    )
        .into_response()
}

pub(crate) fn redirect_home(state: &AuthState) -> Response {
    redirect_to(StatusCode::TEMPORARY_REDIRECT, state.config().home_path(), None)
}

/// Final leg shared by both providers: resolve the internal user, remember
/// the provider credential, issue the session cookie and redirect.
pub(crate) async fn complete_login(
    state: &AuthState,
    provider: Provider,
    profile: ProviderProfile,
    credential: StoredCredential,
    redirect: &str,
) -> Response {
    let handle = provider.user_handle(&profile.handle);
    let user = match state
        .users()
        .get_or_create_user_by_handle(&handle, &profile.display_name)
        .await
    {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to resolve user {handle}: {err}");
            return redirect_home(state);
        }
    };

    if let Err(err) = state
        .users()
        .save_provider_credential(user.id, credential)
        .await
    {
        warn!(
            "Failed to save {} credential for user {}: {err}",
            provider.as_str(),
            user.id
        );
    }

    let cookie = match state
        .codec()
        .encode(&SessionPayload { user_id: user.id })
        .map_err(|e| e.to_string())
        .and_then(|value| session_cookie(state, &value).map_err(|e| e.to_string()))
    {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create session".to_string(),
            )
                .into_response();
        }
    };

    info!("user {} logged in with {}", user.id, provider.as_str());
    redirect_to(StatusCode::TEMPORARY_REDIRECT, redirect, Some(cookie))
}
