use super::{
    http_client, lenient_string, oauth1::RequestSigner, read_form, read_json, Credentials,
    Oauth1Provider, ProviderError, ProviderProfile,
};
use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, Method};
use serde::Deserialize;
use std::{collections::HashMap, time::Duration};
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Clone)]
pub struct TwitterEndpoints {
    pub request_token: Url,
    pub authenticate: Url,
    pub access_token: Url,
    pub verify_credentials: Url,
}

impl TwitterEndpoints {
    /// Twitter's production endpoints.
    ///
    /// # Errors
    /// Never in practice; the URLs are constants.
    pub fn twitter() -> Result<Self, ProviderError> {
        Ok(Self {
            request_token: Url::parse("https://api.twitter.com/oauth/request_token")?,
            authenticate: Url::parse("https://api.twitter.com/oauth/authenticate")?,
            access_token: Url::parse("https://api.twitter.com/oauth/access_token")?,
            verify_credentials: Url::parse(
                "https://api.twitter.com/1.1/account/verify_credentials.json",
            )?,
        })
    }

    /// Same paths rooted somewhere else, e.g. a local stand-in server.
    ///
    /// # Errors
    /// Returns an error if `base` cannot be joined with the endpoint paths.
    pub fn with_base(base: &Url) -> Result<Self, ProviderError> {
        Ok(Self {
            request_token: base.join("/oauth/request_token")?,
            authenticate: base.join("/oauth/authenticate")?,
            access_token: base.join("/oauth/access_token")?,
            verify_credentials: base.join("/1.1/account/verify_credentials.json")?,
        })
    }
}

#[derive(Deserialize)]
struct TwitterAccount {
    #[serde(default, deserialize_with = "lenient_string")]
    screen_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
}

pub struct TwitterClient {
    consumer: Credentials,
    endpoints: TwitterEndpoints,
    client: Client,
}

impl TwitterClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        consumer: Credentials,
        endpoints: TwitterEndpoints,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            consumer,
            endpoints,
            client: http_client(timeout)?,
        })
    }

    fn signer<'a>(&'a self, token: Option<&'a Credentials>) -> RequestSigner<'a> {
        RequestSigner::new(&self.consumer, token)
    }

    async fn post_form(
        &self,
        url: &Url,
        token: Option<&Credentials>,
        oauth_params: &[(&str, &str)],
    ) -> Result<HashMap<String, String>, ProviderError> {
        let authorization = self
            .signer(token)
            .authorization(&Method::POST, url, oauth_params, &[]);
        let response = self
            .client
            .post(url.clone())
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;
        read_form(response).await
    }
}

fn credentials_from(mut form: HashMap<String, String>) -> Result<Credentials, ProviderError> {
    let token = form
        .remove("oauth_token")
        .filter(|t| !t.is_empty())
        .ok_or(ProviderError::MissingField("oauth_token"))?;
    let secret = form
        .remove("oauth_token_secret")
        .ok_or(ProviderError::MissingField("oauth_token_secret"))?;
    Ok(Credentials { token, secret })
}

#[async_trait]
impl Oauth1Provider for TwitterClient {
    #[instrument(skip(self))]
    async fn request_temporary_credential(
        &self,
        callback_url: &str,
    ) -> Result<Credentials, ProviderError> {
        let form = self
            .post_form(
                &self.endpoints.request_token,
                None,
                &[("oauth_callback", callback_url)],
            )
            .await?;

        if form.get("oauth_callback_confirmed").map(String::as_str) != Some("true") {
            return Err(ProviderError::Rejected(
                "oauth_callback_confirmed was not true".to_string(),
            ));
        }

        let temporary = credentials_from(form)?;
        debug!("temporary credential issued: {}", temporary.token);
        Ok(temporary)
    }

    fn authorization_url(&self, temporary: &Credentials) -> String {
        let mut url = self.endpoints.authenticate.clone();
        url.query_pairs_mut()
            .append_pair("oauth_token", &temporary.token);
        url.into()
    }

    #[instrument(skip(self, temporary, verifier), fields(token = %temporary.token))]
    async fn request_access_credential(
        &self,
        temporary: &Credentials,
        verifier: &str,
    ) -> Result<Credentials, ProviderError> {
        let form = self
            .post_form(
                &self.endpoints.access_token,
                Some(temporary),
                &[("oauth_verifier", verifier)],
            )
            .await?;
        credentials_from(form)
    }

    #[instrument(skip(self, access))]
    async fn fetch_profile(&self, access: &Credentials) -> Result<ProviderProfile, ProviderError> {
        let url = &self.endpoints.verify_credentials;
        let authorization = self
            .signer(Some(access))
            .authorization(&Method::GET, url, &[], &[]);
        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;

        let account: TwitterAccount = read_json(response).await?;
        let handle = account
            .screen_name
            .ok_or(ProviderError::MissingField("screen_name"))?;

        Ok(ProviderProfile {
            display_name: account.name.unwrap_or_else(|| handle.clone()),
            handle,
        })
    }
}
