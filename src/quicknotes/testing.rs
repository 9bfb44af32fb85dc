//! Stand-ins for the identity providers and user storage used by unit tests.

use crate::quicknotes::{
    provider::{
        github::pkce_challenge, Credentials, Oauth1Provider, Oauth2Provider, ProviderError,
        ProviderProfile,
    },
    session::codec::tests::codec,
    state::{AuthConfig, AuthState},
    users::{MemoryUserStore, StoredCredential, User, UserStore, UserStoreError},
};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use url::Url;

pub(crate) const VERIFIER: &str = "verifier";
pub(crate) const GOOD_CODE: &str = "good";

fn profile(handle: &str, name: &str) -> Option<ProviderProfile> {
    Some(ProviderProfile {
        handle: handle.to_string(),
        display_name: name.to_string(),
    })
}

pub(crate) struct StubTwitter {
    pub calls: AtomicUsize,
    pub fail_request_token: bool,
    pub profile: Option<ProviderProfile>,
}

impl Default for StubTwitter {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_request_token: false,
            profile: profile("kjk", "Krzysztof"),
        }
    }
}

impl StubTwitter {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oauth1Provider for StubTwitter {
    async fn request_temporary_credential(
        &self,
        callback_url: &str,
    ) -> Result<Credentials, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_request_token {
            return Err(ProviderError::Status {
                url: "https://api.twitter.com/oauth/request_token".to_string(),
                status: StatusCode::UNAUTHORIZED,
                body: "Could not authenticate you.".to_string(),
            });
        }
        assert!(callback_url.contains("/logintwittercb?redirect="));
        Ok(Credentials::new(format!("temp-{n}"), format!("secret-{n}")))
    }

    fn authorization_url(&self, temporary: &Credentials) -> String {
        format!(
            "https://api.twitter.com/oauth/authenticate?oauth_token={}",
            temporary.token
        )
    }

    async fn request_access_credential(
        &self,
        temporary: &Credentials,
        verifier: &str,
    ) -> Result<Credentials, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if verifier != VERIFIER || !temporary.secret.starts_with("secret-") {
            return Err(ProviderError::Status {
                url: "https://api.twitter.com/oauth/access_token".to_string(),
                status: StatusCode::UNAUTHORIZED,
                body: "Invalid oauth_verifier parameter".to_string(),
            });
        }
        Ok(Credentials::new("access-token", "access-secret"))
    }

    async fn fetch_profile(&self, _access: &Credentials) -> Result<ProviderProfile, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.profile
            .clone()
            .ok_or(ProviderError::MissingField("screen_name"))
    }
}

pub(crate) struct StubGitHub {
    pub calls: AtomicUsize,
    pub challenge: Mutex<Option<String>>,
    pub profile: Option<ProviderProfile>,
}

impl Default for StubGitHub {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            challenge: Mutex::new(None),
            profile: profile("octocat", "The Octocat"),
        }
    }
}

impl StubGitHub {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oauth2Provider for StubGitHub {
    fn authorization_url(&self, state: &str, code_challenge: &str) -> String {
        if let Ok(mut challenge) = self.challenge.lock() {
            *challenge = Some(code_challenge.to_string());
        }
        format!("https://github.com/login/oauth/authorize?state={state}&code_challenge={code_challenge}")
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let expected = self.challenge.lock().ok().and_then(|c| c.clone());
        if code != GOOD_CODE || expected != Some(pkce_challenge(code_verifier)) {
            return Err(ProviderError::Rejected(
                "bad_verification_code: The code passed is incorrect or expired.".to_string(),
            ));
        }
        Ok("gho_token".to_string())
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<ProviderProfile, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.profile
            .clone()
            .ok_or(ProviderError::MissingField("login"))
    }
}

/// User storage that always resolves to one fixed user, or always fails.
pub(crate) struct FixedUsers {
    pub user: Option<User>,
}

impl FixedUsers {
    pub(crate) fn with_id(id: i64) -> Self {
        Self {
            user: Some(User {
                id,
                handle: "kjk".to_string(),
                full_name: "Krzysztof".to_string(),
            }),
        }
    }

    fn user(&self) -> Result<User, UserStoreError> {
        self.user
            .clone()
            .ok_or_else(|| UserStoreError::Backend("database unavailable".to_string()))
    }
}

#[async_trait]
impl UserStore for FixedUsers {
    async fn get_or_create_user_by_handle(
        &self,
        _handle: &str,
        _full_name: &str,
    ) -> Result<User, UserStoreError> {
        self.user()
    }

    async fn get_user_by_id(&self, id: i64) -> Result<User, UserStoreError> {
        self.user()
            .and_then(|u| if u.id == id { Ok(u) } else { Err(UserStoreError::NotFound(id)) })
    }

    async fn save_provider_credential(
        &self,
        _user_id: i64,
        _credential: StoredCredential,
    ) -> Result<(), UserStoreError> {
        self.user().map(|_| ())
    }
}

pub(crate) fn config(base_url: &str) -> AuthConfig {
    AuthConfig::new(Url::parse(base_url).unwrap_or_else(|e| panic!("bad test url: {e}")))
}

pub(crate) fn state_with(
    config: AuthConfig,
    twitter: Arc<StubTwitter>,
    github: Arc<StubGitHub>,
    users: Arc<dyn UserStore>,
) -> AuthState {
    AuthState::new(config, codec(), twitter, github, users)
}

/// Default stubs backed by a fresh in-memory user store.
pub(crate) fn memory_state() -> (AuthState, Arc<MemoryUserStore>) {
    let users = Arc::new(MemoryUserStore::new());
    let state = state_with(
        config("http://localhost:8080"),
        Arc::new(StubTwitter::default()),
        Arc::new(StubGitHub::default()),
        users.clone(),
    );
    (state, users)
}

pub(crate) fn secure_state() -> AuthState {
    state_with(
        config("https://quicknotes.io"),
        Arc::new(StubTwitter::default()),
        Arc::new(StubGitHub::default()),
        Arc::new(MemoryUserStore::new()),
    )
}
