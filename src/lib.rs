//! # Quicknotes (login and session service)
//!
//! Users sign in with Twitter (OAuth 1.0a) or GitHub (OAuth 2.0 with PKCE).
//! A successful login resolves the provider handle to a local user and issues
//! an encrypted, authenticated session cookie carrying that user's id.
//!
//! ## Session cookie
//!
//! The cookie value is sealed with AES-256-GCM and signed with HMAC-SHA256
//! over the cookie name, a timestamp and the ciphertext. Logging out replaces
//! it with the `deleted` sentinel, which is recognised and never decoded.
//!
//! ## Pending logins
//!
//! Temporary provider credentials live in memory for a bounded time and are
//! consumed exactly once by the matching callback.

pub mod cli;
pub mod quicknotes;
