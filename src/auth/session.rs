//! Token, nonce and challenge-message generation.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;

/// Generate a cryptographically random session token.
///
/// Returns a base64-encoded string (44 characters) from 32 random bytes.
pub fn generate_session_token() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    general_purpose::STANDARD.encode(bytes)
}

/// Generate a cryptographically random challenge nonce.
///
/// Returns a hex-encoded string (32 characters) from 16 random bytes.
pub fn generate_challenge_nonce() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

/// Compose the text the wallet is asked to sign.
///
/// The timestamp is informational only; expiry is tracked on the stored challenge.
pub fn challenge_message(nonce: &str, issued_at: DateTime<Utc>) -> String {
    format!(
        "Sign this message to authenticate: {} at {}",
        nonce,
        issued_at.to_rfc3339_opts(SecondsFormat::Micros, true)
    )
}
