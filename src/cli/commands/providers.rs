use clap::{Arg, Command};

pub const ARG_TWITTER_CONSUMER_KEY: &str = "twitter-consumer-key";
pub const ARG_TWITTER_CONSUMER_SECRET: &str = "twitter-consumer-secret";
pub const ARG_GITHUB_CLIENT_ID: &str = "github-client-id";
pub const ARG_GITHUB_CLIENT_SECRET: &str = "github-client-secret";
pub const ARG_PROVIDER_TIMEOUT: &str = "provider-timeout";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TWITTER_CONSUMER_KEY)
                .long(ARG_TWITTER_CONSUMER_KEY)
                .help("Twitter OAuth1 consumer key")
                .env("QUICKNOTES_TWITTER_CONSUMER_KEY")
                .required(true),
        )
        .arg(
            Arg::new(ARG_TWITTER_CONSUMER_SECRET)
                .long(ARG_TWITTER_CONSUMER_SECRET)
                .help("Twitter OAuth1 consumer secret")
                .env("QUICKNOTES_TWITTER_CONSUMER_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_GITHUB_CLIENT_ID)
                .long(ARG_GITHUB_CLIENT_ID)
                .help("GitHub OAuth2 client id")
                .env("QUICKNOTES_GITHUB_CLIENT_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_GITHUB_CLIENT_SECRET)
                .long(ARG_GITHUB_CLIENT_SECRET)
                .help("GitHub OAuth2 client secret")
                .env("QUICKNOTES_GITHUB_CLIENT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_PROVIDER_TIMEOUT)
                .long(ARG_PROVIDER_TIMEOUT)
                .help("Timeout in seconds for every call to Twitter or GitHub")
                .env("QUICKNOTES_PROVIDER_TIMEOUT")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
