//! Session cookie plumbing: building `Set-Cookie` values and resolving the
//! current user from an inbound request.

pub mod codec;

use crate::quicknotes::{state::AuthState, users::User};
use axum::http::{
    header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use tracing::{debug, error, warn};

use self::codec::{Decoded, DELETED_SENTINEL};

pub const SESSION_COOKIE_NAME: &str = "qnckie";

/// `Set-Cookie` value carrying an encoded session.
pub fn session_cookie(state: &AuthState, value: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = state.config().session_max_age().as_secs();
    build_cookie(state, value, max_age)
}

/// `Set-Cookie` value replacing the session with the logged-out sentinel.
pub fn deleted_cookie(state: &AuthState) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = state.config().sentinel_max_age_seconds();
    build_cookie(state, DELETED_SENTINEL, max_age)
}

fn build_cookie(
    state: &AuthState,
    value: &str,
    max_age: u64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let name = state.codec().name();
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if state.config().cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Raw value of cookie `name`, searching every `Cookie` header.
#[must_use]
pub fn extract_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim())
        })
}

/// Result of resolving the session on a request.
#[derive(Debug, Default)]
pub struct SessionLookup {
    pub user: Option<User>,
    /// Set when the request carried a cookie that failed verification; the
    /// response should overwrite it with the sentinel.
    pub clear_cookie: Option<HeaderValue>,
}

impl SessionLookup {
    /// Attach the sentinel cookie to `headers` if one is pending.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Some(cookie) = &self.clear_cookie {
            headers.append(SET_COOKIE, cookie.clone());
        }
    }
}

/// The authenticated user behind a request, if any.
///
/// Never fails: missing, logged-out, and tampered cookies all come back as
/// no user, as does a session whose user no longer exists.
pub async fn current_user(headers: &HeaderMap, state: &AuthState) -> SessionLookup {
    let raw = extract_cookie(headers, state.codec().name());
    match state.codec().decode(raw) {
        Decoded::Absent | Decoded::LoggedOut => SessionLookup::default(),
        Decoded::Invalid => SessionLookup {
            user: None,
            clear_cookie: match deleted_cookie(state) {
                Ok(cookie) => Some(cookie),
                Err(err) => {
                    error!("Failed to build sentinel cookie: {err}");
                    None
                }
            },
        },
        Decoded::Valid(payload) => match state.users().get_user_by_id(payload.user_id).await {
            Ok(user) => {
                debug!("session for user {}", user.id);
                SessionLookup {
                    user: Some(user),
                    clear_cookie: None,
                }
            }
            Err(err) => {
                warn!("session user {} unavailable: {err}", payload.user_id);
                SessionLookup::default()
            }
        },
    }
}
