use clap::{Arg, Command};

pub const ARG_COOKIE_AUTH_KEY: &str = "cookie-auth-key";
pub const ARG_COOKIE_ENCR_KEY: &str = "cookie-encr-key";
pub const ARG_LOGIN_TTL: &str = "login-ttl";
pub const ARG_MAX_PENDING_LOGINS: &str = "max-pending-logins";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_COOKIE_AUTH_KEY)
                .long(ARG_COOKIE_AUTH_KEY)
                .help("Session cookie authentication key, 64 hex characters")
                .env("QUICKNOTES_COOKIE_AUTH_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_COOKIE_ENCR_KEY)
                .long(ARG_COOKIE_ENCR_KEY)
                .help("Session cookie encryption key, 64 hex characters")
                .env("QUICKNOTES_COOKIE_ENCR_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_LOGIN_TTL)
                .long(ARG_LOGIN_TTL)
                .help("Seconds a started login may wait for the provider callback")
                .env("QUICKNOTES_LOGIN_TTL")
                .default_value("600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_MAX_PENDING_LOGINS)
                .long(ARG_MAX_PENDING_LOGINS)
                .help("Started logins held per provider before new ones are refused")
                .env("QUICKNOTES_MAX_PENDING_LOGINS")
                .default_value("10000")
                .value_parser(clap::value_parser!(usize)),
        )
}
