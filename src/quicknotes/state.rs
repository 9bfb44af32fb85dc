//! Configuration and shared state for the login and session handlers.

use crate::quicknotes::{
    provider::{Oauth1Provider, Oauth2Provider},
    session::codec::CookieCodec,
    store::{MemoryPendingStore, PendingLoginStore, DEFAULT_MAX_ENTRIES},
    users::UserStore,
};
use std::{sync::Arc, time::Duration};
use url::Url;

pub const TWITTER_CALLBACK_PATH: &str = "/logintwittercb";
pub const GITHUB_CALLBACK_PATH: &str = "/logingithubcb";

const DAY_SECONDS: u64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: Url,
    home_path: String,
    session_max_age_seconds: u64,
    sentinel_max_age_seconds: u64,
    login_ttl_seconds: u64,
    max_pending_logins: usize,
    provider_timeout_seconds: u64,
}

impl AuthConfig {
    /// `base_url` is the public origin browsers and providers reach us on.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            home_path: "/".to_string(),
            session_max_age_seconds: 30 * DAY_SECONDS,
            sentinel_max_age_seconds: 7 * DAY_SECONDS,
            login_ttl_seconds: 600,
            max_pending_logins: DEFAULT_MAX_ENTRIES,
            provider_timeout_seconds: 10,
        }
    }

    #[must_use]
    pub fn with_home_path(mut self, path: String) -> Self {
        self.home_path = path;
        self
    }

    #[must_use]
    pub fn with_session_max_age_seconds(mut self, seconds: u64) -> Self {
        self.session_max_age_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_sentinel_max_age_seconds(mut self, seconds: u64) -> Self {
        self.sentinel_max_age_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_login_ttl_seconds(mut self, seconds: u64) -> Self {
        self.login_ttl_seconds = seconds;
        self
    }

    /// Per provider; further login starts get 503 until entries are consumed or expire.
    #[must_use]
    pub fn with_max_pending_logins(mut self, max: usize) -> Self {
        self.max_pending_logins = max;
        self
    }

    #[must_use]
    pub fn with_provider_timeout_seconds(mut self, seconds: u64) -> Self {
        self.provider_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    #[must_use]
    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_seconds)
    }

    #[must_use]
    pub fn sentinel_max_age_seconds(&self) -> u64 {
        self.sentinel_max_age_seconds
    }

    #[must_use]
    pub fn login_ttl(&self) -> Duration {
        Duration::from_secs(self.login_ttl_seconds)
    }

    #[must_use]
    pub fn max_pending_logins(&self) -> usize {
        self.max_pending_logins
    }

    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_seconds)
    }

    /// Cookies are only marked `Secure` when we are served over HTTPS.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }

    /// OAuth1 callback; the redirect target rides along as a query parameter.
    #[must_use]
    pub fn twitter_callback_url(&self, redirect: &str) -> String {
        let mut url = self.base_url.clone();
        url.set_path(TWITTER_CALLBACK_PATH);
        url.set_query(None);
        url.query_pairs_mut().append_pair("redirect", redirect);
        url.into()
    }

    #[must_use]
    pub fn github_callback_url(&self) -> String {
        let mut url = self.base_url.clone();
        url.set_path(GITHUB_CALLBACK_PATH);
        url.set_query(None);
        url.into()
    }
}

/// Everything the handlers share. Only the pending-login stores are mutable.
pub struct AuthState {
    config: AuthConfig,
    codec: CookieCodec,
    twitter: Arc<dyn Oauth1Provider>,
    github: Arc<dyn Oauth2Provider>,
    twitter_logins: Arc<dyn PendingLoginStore>,
    github_logins: Arc<dyn PendingLoginStore>,
    users: Arc<dyn UserStore>,
}

impl AuthState {
    /// Pending logins are kept in memory with the configured TTL.
    #[must_use]
    pub fn new(
        config: AuthConfig,
        codec: CookieCodec,
        twitter: Arc<dyn Oauth1Provider>,
        github: Arc<dyn Oauth2Provider>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        let pending = || {
            Arc::new(
                MemoryPendingStore::new(config.login_ttl())
                    .with_max_entries(config.max_pending_logins()),
            )
        };
        let twitter_logins = pending();
        let github_logins = pending();
        Self {
            config,
            codec,
            twitter,
            github,
            twitter_logins,
            github_logins,
            users,
        }
    }

    #[must_use]
    pub fn with_twitter_logins(mut self, store: Arc<dyn PendingLoginStore>) -> Self {
        self.twitter_logins = store;
        self
    }

    #[must_use]
    pub fn with_github_logins(mut self, store: Arc<dyn PendingLoginStore>) -> Self {
        self.github_logins = store;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &CookieCodec {
        &self.codec
    }

    #[must_use]
    pub fn twitter(&self) -> &dyn Oauth1Provider {
        self.twitter.as_ref()
    }

    #[must_use]
    pub fn github(&self) -> &dyn Oauth2Provider {
        self.github.as_ref()
    }

    #[must_use]
    pub fn twitter_logins(&self) -> &dyn PendingLoginStore {
        self.twitter_logins.as_ref()
    }

    #[must_use]
    pub fn github_logins(&self) -> &dyn PendingLoginStore {
        self.github_logins.as_ref()
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }
}
