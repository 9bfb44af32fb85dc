//! Identity provider clients.
//!
//! Twitter speaks OAuth 1.0a (three-legged, HMAC-SHA1 signed requests) and
//! GitHub speaks OAuth 2.0 (authorization code with PKCE). Both end in a
//! [`ProviderProfile`] the login flow turns into an internal user.

pub mod github;
pub mod oauth1;
pub mod twitter;

use crate::quicknotes::APP_USER_AGENT;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use std::{collections::HashMap, time::Duration};
use thiserror::Error;
use tracing::error;

pub use self::oauth1::Credentials;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
        body: String,
    },
    #[error("provider response is missing `{0}`")]
    MissingField(&'static str),
    #[error("invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("provider rejected the request: {0}")]
    Rejected(String),
}

impl ProviderError {
    /// Identity-resolution failures send the browser home instead of showing an error.
    #[must_use]
    pub fn is_missing_identity(&self) -> bool {
        matches!(self, Self::MissingField(_))
    }
}

/// The two fields the login flow needs out of a "who am I" response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub handle: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Twitter,
    GitHub,
}

impl Provider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::GitHub => "github",
        }
    }

    /// Internal user handle for a provider handle. Twitter handles are stored
    /// bare; GitHub logins are namespaced so the two never collide.
    #[must_use]
    pub fn user_handle(self, handle: &str) -> String {
        match self {
            Self::Twitter => handle.to_string(),
            Self::GitHub => format!("github:{handle}"),
        }
    }
}

#[async_trait]
pub trait Oauth1Provider: Send + Sync {
    /// Obtain a temporary credential bound to `callback_url`.
    async fn request_temporary_credential(
        &self,
        callback_url: &str,
    ) -> Result<Credentials, ProviderError>;

    /// Where to send the browser to approve `temporary`.
    fn authorization_url(&self, temporary: &Credentials) -> String;

    async fn request_access_credential(
        &self,
        temporary: &Credentials,
        verifier: &str,
    ) -> Result<Credentials, ProviderError>;

    async fn fetch_profile(&self, access: &Credentials) -> Result<ProviderProfile, ProviderError>;
}

#[async_trait]
pub trait Oauth2Provider: Send + Sync {
    /// Authorization URL carrying `state` and the S256 PKCE `code_challenge`.
    fn authorization_url(&self, state: &str, code_challenge: &str) -> String;

    /// Exchange an authorization code for an access token.
    async fn exchange_code(&self, code: &str, code_verifier: &str)
        -> Result<String, ProviderError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, ProviderError>;
}

/// Profile fields are only trusted when they are non-empty JSON strings;
/// anything else reads as absent.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

/// HTTP client shared by the provider clients: our user agent and a hard
/// deadline on every call.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(timeout)
        .build()?)
}

async fn checked_body(response: Response) -> Result<(String, String), ProviderError> {
    let url = response.url().to_string();
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        error!("{url} returned {status}: {body}");
        return Err(ProviderError::Status { url, status, body });
    }
    Ok((url, body))
}

/// Decode a JSON body, keeping the raw text on failure for the logs.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let (url, body) = checked_body(response).await?;
    serde_json::from_str(&body).map_err(|source| {
        error!("failed to decode response from {url}: {source}, body: {body}");
        ProviderError::Decode { url, source, body }
    })
}

/// Decode an `application/x-www-form-urlencoded` body.
pub(crate) async fn read_form(response: Response) -> Result<HashMap<String, String>, ProviderError> {
    let (_, body) = checked_body(response).await?;
    Ok(url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect())
}
