use secrecy::SecretString;

/// Process-wide secrets, only exposed when the codec and provider clients are built.
#[derive(Clone)]
pub struct GlobalArgs {
    pub cookie_auth_key: SecretString,
    pub cookie_encr_key: SecretString,
    pub twitter_consumer_key: String,
    pub twitter_consumer_secret: SecretString,
    pub github_client_id: String,
    pub github_client_secret: SecretString,
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("cookie_auth_key", &"***")
            .field("cookie_encr_key", &"***")
            .field("twitter_consumer_key", &self.twitter_consumer_key)
            .field("twitter_consumer_secret", &"***")
            .field("github_client_id", &self.github_client_id)
            .field("github_client_secret", &"***")
            .finish()
    }
}
