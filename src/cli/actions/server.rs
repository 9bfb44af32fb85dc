use crate::cli::globals::GlobalArgs;
use crate::quicknotes::{
    self,
    provider::{
        github::{GitHubClient, GitHubEndpoints},
        oauth1::Credentials,
        twitter::{TwitterClient, TwitterEndpoints},
    },
    session::{codec::CookieCodec, SESSION_COOKIE_NAME},
    state::{AuthConfig, AuthState},
    users::MemoryUserStore,
};
use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub base_url: Url,
    pub login_ttl_seconds: u64,
    pub max_pending_logins: usize,
    pub provider_timeout_seconds: u64,
}

/// Wire the cookie codec, provider clients and user store together.
///
/// # Errors
/// Returns an error if the cookie keys fail the codec self-test or a
/// provider client cannot be built.
pub fn build_state(args: &Args, globals: &GlobalArgs) -> Result<AuthState> {
    let config = AuthConfig::new(args.base_url.clone())
        .with_login_ttl_seconds(args.login_ttl_seconds)
        .with_max_pending_logins(args.max_pending_logins)
        .with_provider_timeout_seconds(args.provider_timeout_seconds);

    let codec = CookieCodec::new(
        SESSION_COOKIE_NAME,
        globals.cookie_auth_key.expose_secret(),
        globals.cookie_encr_key.expose_secret(),
        config.session_max_age(),
    )
    .context("Cookie keys are unusable")?;

    let twitter = TwitterClient::new(
        Credentials::new(
            globals.twitter_consumer_key.clone(),
            globals.twitter_consumer_secret.expose_secret(),
        ),
        TwitterEndpoints::twitter()?,
        config.provider_timeout(),
    )
    .context("Failed to build Twitter client")?;

    let github = GitHubClient::new(
        globals.github_client_id.clone(),
        globals.github_client_secret.clone(),
        config.github_callback_url(),
        GitHubEndpoints::github()?,
        config.provider_timeout(),
    )
    .context("Failed to build GitHub client")?;

    Ok(AuthState::new(
        config,
        codec,
        Arc::new(twitter),
        Arc::new(github),
        Arc::new(MemoryUserStore::new()),
    ))
}

/// Handle the server action
///
/// # Errors
/// Returns an error if the state cannot be built or the server fails.
pub async fn handle(args: Args, globals: &GlobalArgs) -> Result<()> {
    let state = build_state(&args, globals)?;

    info!(
        base_url = %args.base_url,
        secure_cookies = state.config().cookie_secure(),
        "Login service configured"
    );

    let result = quicknotes::new(args.port, Arc::new(state)).await;

    crate::cli::telemetry::shutdown_tracer();

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quicknotes::session::codec::tests::{AUTH_KEY, ENCR_KEY};
    use secrecy::SecretString;

    fn args() -> Args {
        Args {
            port: 8080,
            base_url: Url::parse("https://quicknotes.io").expect("valid url"),
            login_ttl_seconds: 60,
            max_pending_logins: 50,
            provider_timeout_seconds: 2,
        }
    }

    fn globals(auth_key: &str) -> GlobalArgs {
        GlobalArgs {
            cookie_auth_key: SecretString::from(auth_key.to_string()),
            cookie_encr_key: SecretString::from(ENCR_KEY.to_string()),
            twitter_consumer_key: "consumer-key".to_string(),
            twitter_consumer_secret: SecretString::from("consumer-secret".to_string()),
            github_client_id: "client-id".to_string(),
            github_client_secret: SecretString::from("client-secret".to_string()),
        }
    }

    #[test]
    fn builds_state_with_valid_keys() {
        let state = build_state(&args(), &globals(AUTH_KEY)).expect("state");
        assert!(state.config().cookie_secure());
        assert_eq!(state.codec().name(), SESSION_COOKIE_NAME);
        assert_eq!(state.config().login_ttl().as_secs(), 60);
        assert_eq!(state.config().max_pending_logins(), 50);
    }

    #[test]
    fn bad_cookie_key_is_fatal() {
        let Err(err) = build_state(&args(), &globals("not-hex")) else {
            panic!("short key accepted");
        };
        assert!(err.to_string().contains("Cookie keys are unusable"));
    }
}
