use super::{
    http_client, lenient_string, read_json, Oauth2Provider, ProviderError, ProviderProfile,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use reqwest::{
    header::{ACCEPT, AUTHORIZATION},
    Client,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const SCOPES: &str = "user:email read:user";

#[derive(Debug, Clone)]
pub struct GitHubEndpoints {
    pub authorize: Url,
    pub token: Url,
    pub user: Url,
}

impl GitHubEndpoints {
    /// GitHub's production endpoints.
    ///
    /// # Errors
    /// Never in practice; the URLs are constants.
    pub fn github() -> Result<Self, ProviderError> {
        Ok(Self {
            authorize: Url::parse("https://github.com/login/oauth/authorize")?,
            token: Url::parse("https://github.com/login/oauth/access_token")?,
            user: Url::parse("https://api.github.com/user")?,
        })
    }

    /// # Errors
    /// Returns an error if `base` cannot be joined with the endpoint paths.
    pub fn with_base(base: &Url) -> Result<Self, ProviderError> {
        Ok(Self {
            authorize: base.join("/login/oauth/authorize")?,
            token: base.join("/login/oauth/access_token")?,
            user: base.join("/user")?,
        })
    }
}

pub struct GitHubClient {
    client_id: String,
    client_secret: SecretString,
    redirect_url: String,
    endpoints: GitHubEndpoints,
    client: Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct GitHubUser {
    #[serde(default, deserialize_with = "lenient_string")]
    login: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
}

/// 32 random bytes, base64url encoded. Used for both `state` and the PKCE verifier.
#[must_use]
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 code challenge for a PKCE verifier.
#[must_use]
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

impl GitHubClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        redirect_url: String,
        endpoints: GitHubEndpoints,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client_id,
            client_secret,
            redirect_url,
            endpoints,
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl Oauth2Provider for GitHubClient {
    fn authorization_url(&self, state: &str, code_challenge: &str) -> String {
        let mut url = self.endpoints.authorize.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("scope", SCOPES)
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("response_type", "code");
        url.into()
    }

    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(self.endpoints.token.clone())
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("code", code),
                ("redirect_uri", self.redirect_url.as_str()),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await?;

        let token: TokenResponse = read_json(response).await?;
        if let Some(error) = token.error {
            let description = token.error_description.unwrap_or_default();
            return Err(ProviderError::Rejected(format!("{error}: {description}")));
        }

        debug!("authorization code exchanged");
        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(ProviderError::MissingField("access_token"))
    }

    #[instrument(skip_all)]
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, ProviderError> {
        let response = self
            .client
            .get(self.endpoints.user.clone())
            .header(ACCEPT, "application/vnd.github+json")
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await?;

        let user: GitHubUser = read_json(response).await?;
        let handle = user
            .login
            .ok_or(ProviderError::MissingField("login"))?;

        Ok(ProviderProfile {
            display_name: user.name.unwrap_or_else(|| handle.clone()),
            handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::{
        extract::Form,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Router,
    };
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    // RFC 7636 appendix B.
    #[test]
    fn pkce_challenge_matches_rfc_example() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-1mB92K27uhbUJU1p1r_wW1gFXjmXRk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGzSMW2jN4"
        );
    }

    #[test]
    fn random_tokens_are_unique_and_url_safe() {
        let token = random_token();
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, random_token());
    }

    async fn token(Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
        let verifier_ok = form
            .get("code_verifier")
            .is_some_and(|v| pkce_challenge(v) == pkce_challenge("verifier"));
        match form.get("code").map(String::as_str) {
            Some("good") if verifier_ok && form.get("client_secret").map(String::as_str) == Some("shh") => {
                r#"{"access_token":"gho_token","token_type":"bearer","scope":"read:user"}"#
            }
            Some("empty") => r#"{"token_type":"bearer"}"#,
            _ => r#"{"error":"bad_verification_code","error_description":"The code passed is incorrect or expired."}"#,
        }
    }

    async fn user(headers: HeaderMap) -> impl IntoResponse {
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some("Bearer gho_token") => (StatusCode::OK, r#"{"login":"octocat","name":"The Octocat"}"#),
            Some("Bearer anonymous") => (StatusCode::OK, r#"{"login":"octocat","name":null}"#),
            Some("Bearer nologin") => (StatusCode::OK, r#"{"id":1}"#),
            Some("Bearer numeric") => (StatusCode::OK, r#"{"login":42,"name":"The Octocat"}"#),
            Some("Bearer oddname") => (StatusCode::OK, r#"{"login":"octocat","name":["The","Octocat"]}"#),
            _ => (StatusCode::UNAUTHORIZED, r#"{"message":"Bad credentials"}"#),
        }
    }

    async fn spawn_github() -> Result<GitHubClient> {
        let app = Router::new()
            .route("/login/oauth/access_token", post(token))
            .route("/user", get(user));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base = Url::parse(&format!("http://{}", listener.local_addr()?))?;
        tokio::spawn(async move { axum::serve(listener, app).await });

        Ok(GitHubClient::new(
            "client-id".to_string(),
            SecretString::from("shh".to_string()),
            "http://localhost:8080/logingithubcb".to_string(),
            GitHubEndpoints::with_base(&base)?,
            Duration::from_secs(5),
        )?)
    }

    #[tokio::test]
    async fn authorization_url_carries_state_and_challenge() -> Result<()> {
        let github = spawn_github().await?;
        let url = Url::parse(&github.authorization_url("st4te", &pkce_challenge("verifier")))?;
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/login/oauth/authorize");
        assert_eq!(query.get("state").map(String::as_str), Some("st4te"));
        assert_eq!(query.get("client_id").map(String::as_str), Some("client-id"));
        assert_eq!(query.get("scope").map(String::as_str), Some("user:email read:user"));
        assert_eq!(query.get("code_challenge_method").map(String::as_str), Some("S256"));
        assert_eq!(
            query.get("redirect_uri").map(String::as_str),
            Some("http://localhost:8080/logingithubcb")
        );
        assert!(!url.as_str().contains("shh"));
        Ok(())
    }

    #[tokio::test]
    async fn code_exchange_and_profile() -> Result<()> {
        let github = spawn_github().await?;
        let token = github.exchange_code("good", "verifier").await?;
        assert_eq!(token, "gho_token");

        let profile = github.fetch_profile(&token).await?;
        assert_eq!(profile.handle, "octocat");
        assert_eq!(profile.display_name, "The Octocat");

        let profile = github.fetch_profile("anonymous").await?;
        assert_eq!(profile.display_name, "octocat");
        Ok(())
    }

    #[tokio::test]
    async fn exchange_errors() -> Result<()> {
        let github = spawn_github().await?;

        let rejected = github.exchange_code("bad", "verifier").await.err();
        assert!(
            matches!(rejected, Some(ProviderError::Rejected(ref msg)) if msg.starts_with("bad_verification_code"))
        );

        let wrong_verifier = github.exchange_code("good", "other").await.err();
        assert!(matches!(wrong_verifier, Some(ProviderError::Rejected(_))));

        let empty = github.exchange_code("empty", "verifier").await.err();
        assert!(matches!(
            empty,
            Some(ProviderError::MissingField("access_token"))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn profile_errors() -> Result<()> {
        let github = spawn_github().await?;

        let missing = github.fetch_profile("nologin").await.err();
        assert!(missing.is_some_and(|e| e.is_missing_identity()));

        let numeric = github.fetch_profile("numeric").await.err();
        assert!(matches!(numeric, Some(ProviderError::MissingField("login"))));

        let profile = github.fetch_profile("oddname").await?;
        assert_eq!(profile.display_name, "octocat");

        let unauthorized = github.fetch_profile("revoked").await.err();
        assert!(matches!(
            unauthorized,
            Some(ProviderError::Status { status, .. }) if status == StatusCode::UNAUTHORIZED
        ));
        Ok(())
    }
}
