//! Map validated CLI matches to an action plus the secrets it needs.

use crate::cli::{
    actions::{server::Args, Action},
    commands::{
        providers::{
            ARG_GITHUB_CLIENT_ID, ARG_GITHUB_CLIENT_SECRET, ARG_PROVIDER_TIMEOUT,
            ARG_TWITTER_CONSUMER_KEY, ARG_TWITTER_CONSUMER_SECRET,
        },
        session::{
            ARG_COOKIE_AUTH_KEY, ARG_COOKIE_ENCR_KEY, ARG_LOGIN_TTL, ARG_MAX_PENDING_LOGINS,
        },
        ARG_BASE_URL, ARG_PORT,
    },
    globals::GlobalArgs,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use url::Url;

fn required(matches: &clap::ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}

/// # Errors
/// Returns an error if a required argument is missing or the base URL is invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<(Action, GlobalArgs)> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let base_url = required(matches, ARG_BASE_URL)?;
    let base_url =
        Url::parse(&base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
    if !matches!(base_url.scheme(), "http" | "https") || base_url.host_str().is_none() {
        anyhow::bail!("Base URL must be an http(s) URL with a host: {base_url}");
    }

    let login_ttl_seconds = matches
        .get_one::<u64>(ARG_LOGIN_TTL)
        .copied()
        .unwrap_or(600);
    let max_pending_logins = matches
        .get_one::<usize>(ARG_MAX_PENDING_LOGINS)
        .copied()
        .unwrap_or(10_000);
    let provider_timeout_seconds = matches
        .get_one::<u64>(ARG_PROVIDER_TIMEOUT)
        .copied()
        .unwrap_or(10);

    let globals = GlobalArgs {
        cookie_auth_key: SecretString::from(required(matches, ARG_COOKIE_AUTH_KEY)?),
        cookie_encr_key: SecretString::from(required(matches, ARG_COOKIE_ENCR_KEY)?),
        twitter_consumer_key: required(matches, ARG_TWITTER_CONSUMER_KEY)?,
        twitter_consumer_secret: SecretString::from(required(
            matches,
            ARG_TWITTER_CONSUMER_SECRET,
        )?),
        github_client_id: required(matches, ARG_GITHUB_CLIENT_ID)?,
        github_client_secret: SecretString::from(required(matches, ARG_GITHUB_CLIENT_SECRET)?),
    };

    Ok((
        Action::Server(Args {
            port,
            base_url,
            login_ttl_seconds,
            max_pending_logins,
            provider_timeout_seconds,
        }),
        globals,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::{self, tests::REQUIRED_ENV};
    use secrecy::ExposeSecret;

    #[test]
    fn builds_server_action() {
        let mut vars = REQUIRED_ENV.to_vec();
        vars.extend([
            ("QUICKNOTES_PORT", Some("9000")),
            ("QUICKNOTES_BASE_URL", Some("https://quicknotes.io")),
            ("QUICKNOTES_LOGIN_TTL", Some("60")),
            ("QUICKNOTES_MAX_PENDING_LOGINS", Some("250")),
            ("QUICKNOTES_PROVIDER_TIMEOUT", Some("2")),
        ]);
        temp_env::with_vars(vars, || {
            let matches = commands::new().get_matches_from(vec!["quicknotes"]);
            let (action, globals) = handler(&matches).expect("valid configuration");

            let Action::Server(args) = action;
            assert_eq!(args.port, 9000);
            assert_eq!(args.base_url.as_str(), "https://quicknotes.io/");
            assert_eq!(args.login_ttl_seconds, 60);
            assert_eq!(args.max_pending_logins, 250);
            assert_eq!(args.provider_timeout_seconds, 2);
            assert_eq!(globals.twitter_consumer_key, "consumer-key");
            assert_eq!(globals.github_client_secret.expose_secret(), "client-secret");
        });
    }

    #[test]
    fn rejects_unusable_base_url() {
        for base_url in ["not a url", "ftp://quicknotes.io", "mailto:me@quicknotes.io"] {
            let mut vars = REQUIRED_ENV.to_vec();
            vars.push(("QUICKNOTES_BASE_URL", Some(base_url)));
            temp_env::with_vars(vars, || {
                let matches = commands::new().get_matches_from(vec!["quicknotes"]);
                let result = handler(&matches);
                assert!(result.is_err(), "{base_url} was accepted");
            });
        }
    }
}
