//! OAuth 1.0a request signing (RFC 5849, HMAC-SHA1).

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::Method;
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters are the only ones left unencoded.
const STRICT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const NONCE_LEN: usize = 32;

/// A token/secret pair: consumer credentials, a temporary credential, or an
/// access credential depending on where it came from.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub secret: String,
}

impl Credentials {
    #[must_use]
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token)
            .field("secret", &"***")
            .finish()
    }
}

pub(crate) fn encode(value: &str) -> String {
    utf8_percent_encode(value, STRICT_ENCODE_SET).to_string()
}

/// Signs requests on behalf of a consumer, optionally with a token.
pub struct RequestSigner<'a> {
    consumer: &'a Credentials,
    token: Option<&'a Credentials>,
}

impl<'a> RequestSigner<'a> {
    #[must_use]
    pub fn new(consumer: &'a Credentials, token: Option<&'a Credentials>) -> Self {
        Self { consumer, token }
    }

    /// Build the `Authorization` header value for a request.
    ///
    /// `oauth_params` are protocol parameters that travel in the header
    /// (`oauth_callback`, `oauth_verifier`); `body_params` are form fields
    /// sent in the request body. Query parameters are read from `url`.
    #[must_use]
    pub fn authorization(
        &self,
        method: &Method,
        url: &Url,
        oauth_params: &[(&str, &str)],
        body_params: &[(&str, &str)],
    ) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        self.authorization_with(
            method,
            url,
            oauth_params,
            body_params,
            &nonce(),
            &timestamp.to_string(),
        )
    }

    fn authorization_with(
        &self,
        method: &Method,
        url: &Url,
        oauth_params: &[(&str, &str)],
        body_params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let mut protocol: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.consumer.token.clone()),
            ("oauth_nonce".into(), nonce.into()),
            ("oauth_signature_method".into(), "HMAC-SHA1".into()),
            ("oauth_timestamp".into(), timestamp.into()),
            ("oauth_version".into(), "1.0".into()),
        ];
        if let Some(token) = self.token {
            protocol.push(("oauth_token".into(), token.token.clone()));
        }
        protocol.extend(
            oauth_params
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string())),
        );

        let signature = self.signature(method, url, &protocol, body_params);
        protocol.push(("oauth_signature".into(), signature));
        protocol.sort();

        let fields = protocol
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {fields}")
    }

    fn signature(
        &self,
        method: &Method,
        url: &Url,
        protocol: &[(String, String)],
        body_params: &[(&str, &str)],
    ) -> String {
        let base = signature_base_string(method, url, protocol, body_params);
        let key = format!(
            "{}&{}",
            encode(&self.consumer.secret),
            encode(self.token.map_or("", |t| t.secret.as_str()))
        );

        // HMAC accepts keys of any length, so this cannot fail.
        let Ok(mut mac) = HmacSha1::new_from_slice(key.as_bytes()) else {
            return String::new();
        };
        mac.update(base.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

fn signature_base_string(
    method: &Method,
    url: &Url,
    protocol: &[(String, String)],
    body_params: &[(&str, &str)],
) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .chain(protocol.iter().map(|(k, v)| (encode(k), encode(v))))
        .chain(body_params.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    params.sort();

    let normalized = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base_url = format!("{}{}", url.origin().ascii_serialization(), url.path());

    format!(
        "{}&{}&{}",
        method.as_str().to_ascii_uppercase(),
        encode(&base_url),
        encode(&normalized)
    )
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}
