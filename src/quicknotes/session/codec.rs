//! Authenticated and encrypted session cookie values.
//!
//! Wire format of an encoded value:
//!
//! ```text
//! base64url( issued_at "|" sealed "|" mac )
//! sealed = base64url( nonce || AES-256-GCM(json(payload), aad = cookie name) )
//! mac    = HMAC-SHA256(auth_key, cookie name "|" issued_at "|" sealed)
//! ```
//!
//! The MAC is checked before anything is decrypted. The literal `deleted` is
//! reserved as the logged-out sentinel and never reaches the crypto path.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Both keys are 32 bytes (64 hex characters).
pub const KEY_LEN: usize = 32;

/// Cookie value written on logout and after a rejected cookie.
pub const DELETED_SENTINEL: &str = "deleted";

const NONCE_LEN: usize = 12;
const CLOCK_SKEW_SECONDS: u64 = 60;

/// The only state a session cookie carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub user_id: i64,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid {name} key: {reason}")]
    InvalidKey { name: &'static str, reason: String },
    #[error("codec self-test failed: {0}")]
    SelfTest(String),
    #[error("failed to encrypt session payload")]
    Encryption,
    #[error("malformed cookie value")]
    Decoding,
    #[error("cookie authentication failed")]
    Authentication,
    #[error("cookie expired")]
    Expired,
    #[error("cookie decryption failed")]
    Decryption,
    #[error("invalid session payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of reading the session cookie from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// No cookie on the request.
    Absent,
    /// The cookie holds the `deleted` sentinel.
    LoggedOut,
    /// The cookie is present but forged, corrupt, or expired.
    Invalid,
    Valid(SessionPayload),
}

pub struct CookieCodec {
    name: String,
    auth_key: [u8; KEY_LEN],
    cipher: Aes256Gcm,
    max_age: Duration,
}

impl std::fmt::Debug for CookieCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieCodec")
            .field("name", &self.name)
            .field("auth_key", &"***")
            .field("cipher", &"***")
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl CookieCodec {
    /// Build a codec from hex-encoded keys and run the encode/decode self-test.
    ///
    /// # Errors
    /// Returns an error if either key is not 64 hex characters or the
    /// round-trip check fails. Callers treat this as fatal.
    pub fn new(
        name: &str,
        auth_key_hex: &str,
        encr_key_hex: &str,
        max_age: Duration,
    ) -> Result<Self, CodecError> {
        let auth_key = decode_key("authentication", auth_key_hex)?;
        let encr_key = decode_key("encryption", encr_key_hex)?;
        let cipher = Aes256Gcm::new_from_slice(&encr_key).map_err(|e| CodecError::InvalidKey {
            name: "encryption",
            reason: e.to_string(),
        })?;

        let codec = Self {
            name: name.to_string(),
            auth_key,
            cipher,
            max_age,
        };
        codec.self_test()?;

        Ok(codec)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn self_test(&self) -> Result<(), CodecError> {
        let probe = SessionPayload { user_id: 42 };
        let encoded = self
            .encode(&probe)
            .map_err(|e| CodecError::SelfTest(e.to_string()))?;
        let decoded = self
            .open(&encoded)
            .map_err(|e| CodecError::SelfTest(e.to_string()))?;
        if decoded != probe {
            return Err(CodecError::SelfTest(format!(
                "round trip returned {decoded:?}, expected {probe:?}"
            )));
        }
        debug!("cookie codec self-test passed");
        Ok(())
    }

    /// Encode a payload into a cookie value.
    ///
    /// # Errors
    /// Returns an error if serialization or encryption fails.
    pub fn encode(&self, payload: &SessionPayload) -> Result<String, CodecError> {
        self.encode_at(payload, unix_now())
    }

    fn encode_at(&self, payload: &SessionPayload, issued_at: u64) -> Result<String, CodecError> {
        let plaintext = serde_json::to_vec(payload)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &plaintext,
                    aad: self.name.as_bytes(),
                },
            )
            .map_err(|_| CodecError::Encryption)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        let sealed = URL_SAFE_NO_PAD.encode(sealed);
        let issued_at = issued_at.to_string();

        let mac = self.mac(issued_at.as_bytes(), sealed.as_bytes())?;

        let mut envelope = Vec::with_capacity(issued_at.len() + sealed.len() + mac.len() + 2);
        envelope.extend_from_slice(issued_at.as_bytes());
        envelope.push(b'|');
        envelope.extend_from_slice(sealed.as_bytes());
        envelope.push(b'|');
        envelope.extend_from_slice(&mac);

        Ok(URL_SAFE_NO_PAD.encode(envelope))
    }

    /// Classify the raw cookie value found on a request.
    ///
    /// Never fails: anything that does not verify is reported as
    /// [`Decoded::Invalid`] and logged.
    #[must_use]
    pub fn decode(&self, value: Option<&str>) -> Decoded {
        match value {
            None => Decoded::Absent,
            Some(DELETED_SENTINEL) => Decoded::LoggedOut,
            Some(value) => match self.open(value) {
                Ok(payload) => Decoded::Valid(payload),
                Err(err) => {
                    warn!("session cookie rejected: {err}");
                    Decoded::Invalid
                }
            },
        }
    }

    /// Verify and decrypt a cookie value.
    ///
    /// # Errors
    /// Returns the first check that failed.
    pub fn open(&self, value: &str) -> Result<SessionPayload, CodecError> {
        self.open_at(value, unix_now())
    }

    fn open_at(&self, value: &str, now: u64) -> Result<SessionPayload, CodecError> {
        let envelope = URL_SAFE_NO_PAD
            .decode(value.trim())
            .map_err(|_| CodecError::Decoding)?;

        let mut parts = envelope.splitn(3, |b| *b == b'|');
        let (Some(issued_at), Some(sealed), Some(mac)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CodecError::Decoding);
        };

        self.verify_mac(issued_at, sealed, mac)?;

        let issued_at = std::str::from_utf8(issued_at)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or(CodecError::Decoding)?;
        if issued_at > now.saturating_add(CLOCK_SKEW_SECONDS)
            || now.saturating_sub(issued_at) > self.max_age.as_secs()
        {
            return Err(CodecError::Expired);
        }

        let sealed = URL_SAFE_NO_PAD
            .decode(sealed)
            .map_err(|_| CodecError::Decoding)?;
        if sealed.len() <= NONCE_LEN {
            return Err(CodecError::Decoding);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: self.name.as_bytes(),
                },
            )
            .map_err(|_| CodecError::Decryption)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }

    fn mac(&self, issued_at: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(self.keyed_mac(issued_at, sealed)?.finalize().into_bytes().to_vec())
    }

    fn verify_mac(&self, issued_at: &[u8], sealed: &[u8], tag: &[u8]) -> Result<(), CodecError> {
        self.keyed_mac(issued_at, sealed)?
            .verify_slice(tag)
            .map_err(|_| CodecError::Authentication)
    }

    fn keyed_mac(&self, issued_at: &[u8], sealed: &[u8]) -> Result<HmacSha256, CodecError> {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&self.auth_key).map_err(|e| CodecError::InvalidKey {
                name: "authentication",
                reason: e.to_string(),
            })?;
        mac.update(self.name.as_bytes());
        mac.update(b"|");
        mac.update(issued_at);
        mac.update(b"|");
        mac.update(sealed);
        Ok(mac)
    }
}

fn decode_key(name: &'static str, hex_key: &str) -> Result<[u8; KEY_LEN], CodecError> {
    let bytes = hex::decode(hex_key.trim()).map_err(|e| CodecError::InvalidKey {
        name,
        reason: e.to_string(),
    })?;
    <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| CodecError::InvalidKey {
        name,
        reason: format!(
            "expected {} hex characters ({KEY_LEN} bytes), got {} bytes",
            KEY_LEN * 2,
            bytes.len()
        ),
    })
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
