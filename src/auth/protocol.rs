//! Challenge-response wallet authentication.
//!
//! Per address the challenge moves `NoChallenge -> Pending -> {Consumed | Expired}`:
//!
//! - [`AuthProtocol::issue_challenge`] validates the address before touching
//!   the store, then writes a fresh challenge (replacing any pending one).
//! - [`AuthProtocol::verify`] reads the challenge, checks expiry against the
//!   stored `expires_at`, recovers the signer and compares it to the claimed
//!   address. Only success and detected expiry remove the challenge; a bad or
//!   mismatched signature leaves it in place so the client can retry.
//!
//! Removal goes through `delete_if_nonce`, so a verification racing with a
//! re-issue for the same address cannot consume the newer challenge. Every
//! store call is bounded by `store_timeout`.

use crate::auth::address::{Address, AddressError};
use crate::auth::session::{challenge_message, generate_challenge_nonce};
use crate::auth::verify::{decode_signature_hex, SignatureError, SignatureVerifier};
use crate::models::Challenge;
use crate::storage::{bounded, ChallengeStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Default lifetime of an issued challenge.
pub const DEFAULT_CHALLENGE_TTL_SECS: i64 = 300;

/// Machine-readable failure tag sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthErrorKind {
    InvalidAddress,
    NoChallengeFound,
    ChallengeExpired,
    MalformedSignature,
    SignatureMismatch,
    StoreUnavailable,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidAddress(AddressError),

    // Same message whether or not the address was ever seen
    #[error("No challenge found for this address")]
    NoChallengeFound,

    #[error("Challenge has expired")]
    ChallengeExpired,

    #[error("Malformed signature: {0}")]
    MalformedSignature(SignatureError),

    #[error("Signature does not match the address")]
    SignatureMismatch,

    #[error("Challenge store unavailable: {0}")]
    StoreUnavailable(StoreError),

    #[error("Challenge expiry out of range: {0} + {1}")]
    ExpiryOutOfRange(DateTime<Utc>, Duration),
}

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::InvalidAddress(_) => AuthErrorKind::InvalidAddress,
            AuthError::NoChallengeFound => AuthErrorKind::NoChallengeFound,
            AuthError::ChallengeExpired => AuthErrorKind::ChallengeExpired,
            AuthError::MalformedSignature(_) => AuthErrorKind::MalformedSignature,
            AuthError::SignatureMismatch => AuthErrorKind::SignatureMismatch,
            AuthError::StoreUnavailable(_) => AuthErrorKind::StoreUnavailable,
            AuthError::ExpiryOutOfRange(..) => AuthErrorKind::Internal,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::StoreUnavailable(err)
    }
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResult {
    pub identity: Address,
    pub verified: bool,
}

pub struct AuthProtocol {
    challenges: Arc<dyn ChallengeStore>,
    verifier: Arc<dyn SignatureVerifier>,
    ttl: Duration,
    store_timeout: std::time::Duration,
}

impl AuthProtocol {
    pub fn new(
        challenges: Arc<dyn ChallengeStore>,
        verifier: Arc<dyn SignatureVerifier>,
        ttl: Duration,
        store_timeout: std::time::Duration,
    ) -> Self {
        AuthProtocol {
            challenges,
            verifier,
            ttl,
            store_timeout,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a challenge for `claimed_address` and return the message to sign.
    pub async fn issue_challenge(&self, claimed_address: &str) -> Result<String, AuthError> {
        self.issue_challenge_at(claimed_address, Utc::now()).await
    }

    pub async fn issue_challenge_at(
        &self,
        claimed_address: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let address = Address::parse(claimed_address).map_err(AuthError::InvalidAddress)?;

        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(AuthError::ExpiryOutOfRange(now, self.ttl))?;

        let nonce = generate_challenge_nonce();
        let challenge = Challenge {
            message: challenge_message(&nonce, now),
            nonce,
            issued_at: now,
            expires_at,
        };

        bounded(self.store_timeout, self.challenges.put(&address, &challenge)).await?;

        tracing::debug!(address = %address, expires_at = %challenge.expires_at, "Challenge issued");
        Ok(challenge.message)
    }

    /// Verify a signature over the pending challenge for `claimed_address`.
    pub async fn verify(
        &self,
        claimed_address: &str,
        signature: &str,
    ) -> Result<AuthResult, AuthError> {
        self.verify_at(claimed_address, signature, Utc::now()).await
    }

    pub async fn verify_at(
        &self,
        claimed_address: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthResult, AuthError> {
        let address = Address::parse(claimed_address).map_err(AuthError::InvalidAddress)?;

        let challenge = bounded(self.store_timeout, self.challenges.get(&address))
            .await?
            .ok_or(AuthError::NoChallengeFound)?;

        // Authoritative expiry check, regardless of any store-side TTL
        if challenge.is_expired(now) {
            bounded(
                self.store_timeout,
                self.challenges.delete_if_nonce(&address, &challenge.nonce),
            )
            .await?;
            tracing::debug!(address = %address, "Expired challenge purged");
            return Err(AuthError::ChallengeExpired);
        }

        let signature_bytes =
            decode_signature_hex(signature).map_err(AuthError::MalformedSignature)?;
        let recovered = self
            .verifier
            .recover(&challenge.message, &signature_bytes)
            .map_err(AuthError::MalformedSignature)?;

        if recovered != address {
            return Err(AuthError::SignatureMismatch);
        }

        // Single use. Losing the compare-and-delete means the challenge was
        // replaced or consumed concurrently.
        let consumed = bounded(
            self.store_timeout,
            self.challenges.delete_if_nonce(&address, &challenge.nonce),
        )
        .await?;
        if !consumed {
            return Err(AuthError::NoChallengeFound);
        }

        Ok(AuthResult {
            identity: address,
            verified: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify::{sign_message, PersonalSignVerifier};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const TEST_ADDRESS: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";
    const OTHER_KEY: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

    fn protocol(store: Arc<dyn ChallengeStore>) -> AuthProtocol {
        AuthProtocol::new(
            store,
            Arc::new(PersonalSignVerifier),
            Duration::seconds(DEFAULT_CHALLENGE_TTL_SECS),
            std::time::Duration::from_millis(200),
        )
    }

    /// Store whose every call fails.
    struct DownStore;

    #[async_trait]
    impl ChallengeStore for DownStore {
        async fn put(&self, _: &Address, _: &Challenge) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn get(&self, _: &Address) -> Result<Option<Challenge>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn delete(&self, _: &Address) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn delete_if_nonce(&self, _: &Address, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
    }

    /// Store whose every call hangs.
    struct HungStore;

    #[async_trait]
    impl ChallengeStore for HungStore {
        async fn put(&self, _: &Address, _: &Challenge) -> Result<(), StoreError> {
            std::future::pending().await
        }
        async fn get(&self, _: &Address) -> Result<Option<Challenge>, StoreError> {
            std::future::pending().await
        }
        async fn delete(&self, _: &Address) -> Result<(), StoreError> {
            std::future::pending().await
        }
        async fn delete_if_nonce(&self, _: &Address, _: &str) -> Result<bool, StoreError> {
            std::future::pending().await
        }
    }

    /// Replaces the challenge right after it is read, as a concurrent
    /// re-issue for the same address would.
    struct ReissuingStore {
        inner: MemoryStore,
        replacement: Mutex<Option<Challenge>>,
    }

    #[async_trait]
    impl ChallengeStore for ReissuingStore {
        async fn put(&self, address: &Address, challenge: &Challenge) -> Result<(), StoreError> {
            self.inner.put(address, challenge).await
        }
        async fn get(&self, address: &Address) -> Result<Option<Challenge>, StoreError> {
            let current = self.inner.get(address).await?;
            let replacement = self.replacement.lock().unwrap().take();
            if let Some(replacement) = replacement {
                self.inner.put(address, &replacement).await?;
            }
            Ok(current)
        }
        async fn delete(&self, address: &Address) -> Result<(), StoreError> {
            self.inner.delete(address).await
        }
        async fn delete_if_nonce(&self, address: &Address, nonce: &str) -> Result<bool, StoreError> {
            self.inner.delete_if_nonce(address, nonce).await
        }
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let store = Arc::new(MemoryStore::new());
        let auth = protocol(store.clone());

        let message = auth.issue_challenge(TEST_ADDRESS).await.unwrap();
        assert!(message.starts_with("Sign this message to authenticate: "));
        assert_eq!(store.challenge_count(), 1);

        let signature = sign_message(TEST_KEY, &message).unwrap();
        let result = auth.verify(TEST_ADDRESS, &signature).await.unwrap();
        assert!(result.verified);
        assert_eq!(result.identity, Address::parse(TEST_ADDRESS).unwrap());
        assert_eq!(store.challenge_count(), 0);
    }

    #[tokio::test]
    async fn test_single_use() {
        let auth = protocol(Arc::new(MemoryStore::new()));
        let message = auth.issue_challenge(TEST_ADDRESS).await.unwrap();
        let signature = sign_message(TEST_KEY, &message).unwrap();

        auth.verify(TEST_ADDRESS, &signature).await.unwrap();
        let replay = auth.verify(TEST_ADDRESS, &signature).await.unwrap_err();
        assert_eq!(replay.kind(), AuthErrorKind::NoChallengeFound);
    }

    #[tokio::test]
    async fn test_expired_challenge_is_purged() {
        let store = Arc::new(MemoryStore::new());
        let auth = protocol(store.clone());
        let t0 = Utc::now();

        let message = auth.issue_challenge_at(TEST_ADDRESS, t0).await.unwrap();
        let signature = sign_message(TEST_KEY, &message).unwrap();
        let late = t0 + auth.ttl() + Duration::milliseconds(1);

        let err = auth.verify_at(TEST_ADDRESS, &signature, late).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::ChallengeExpired);
        assert_eq!(store.challenge_count(), 0);

        let err = auth.verify_at(TEST_ADDRESS, &signature, t0).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::NoChallengeFound);
    }

    #[tokio::test]
    async fn test_verify_at_exact_expiry_succeeds() {
        let auth = protocol(Arc::new(MemoryStore::new()));
        let t0 = Utc::now();
        let message = auth.issue_challenge_at(TEST_ADDRESS, t0).await.unwrap();
        let signature = sign_message(TEST_KEY, &message).unwrap();

        let result = auth
            .verify_at(TEST_ADDRESS, &signature, t0 + auth.ttl())
            .await
            .unwrap();
        assert!(result.verified);
    }

    #[tokio::test]
    async fn test_retry_after_bad_signature() {
        let store = Arc::new(MemoryStore::new());
        let auth = protocol(store.clone());
        let message = auth.issue_challenge(TEST_ADDRESS).await.unwrap();

        let err = auth.verify(TEST_ADDRESS, "0xnothex").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::MalformedSignature);

        let err = auth.verify(TEST_ADDRESS, "0xdeadbeef").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::MalformedSignature);

        let wrong = sign_message(OTHER_KEY, &message).unwrap();
        let err = auth.verify(TEST_ADDRESS, &wrong).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::SignatureMismatch);
        assert_eq!(store.challenge_count(), 1);

        let right = sign_message(TEST_KEY, &message).unwrap();
        assert!(auth.verify(TEST_ADDRESS, &right).await.unwrap().verified);
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_challenge() {
        let auth = protocol(Arc::new(MemoryStore::new()));

        let first = auth.issue_challenge(TEST_ADDRESS).await.unwrap();
        let second = auth.issue_challenge(TEST_ADDRESS).await.unwrap();
        assert_ne!(first, second);

        let stale = sign_message(TEST_KEY, &first).unwrap();
        let err = auth.verify(TEST_ADDRESS, &stale).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::SignatureMismatch);

        let fresh = sign_message(TEST_KEY, &second).unwrap();
        assert!(auth.verify(TEST_ADDRESS, &fresh).await.unwrap().verified);
    }

    #[tokio::test]
    async fn test_address_case_is_irrelevant() {
        let auth = protocol(Arc::new(MemoryStore::new()));
        let lower = TEST_ADDRESS.to_lowercase();
        let upper = format!("0x{}", TEST_ADDRESS[2..].to_uppercase());

        let message = auth.issue_challenge(&lower).await.unwrap();
        let signature = sign_message(TEST_KEY, &message).unwrap();
        let result = auth.verify(&upper, &signature).await.unwrap();
        assert_eq!(result.identity.to_string(), TEST_ADDRESS);
    }

    #[tokio::test]
    async fn test_invalid_address_creates_no_state() {
        let store = Arc::new(MemoryStore::new());
        let auth = protocol(store.clone());

        for bad in ["", "0x123", "not an address", "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"] {
            let err = auth.issue_challenge(bad).await.unwrap_err();
            assert_eq!(err.kind(), AuthErrorKind::InvalidAddress);
        }
        assert_eq!(store.challenge_count(), 0);

        let err = auth.verify("0x123", "0x00").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::InvalidAddress);
    }

    #[tokio::test]
    async fn test_expiry_overflow_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let auth = AuthProtocol::new(
            store.clone(),
            Arc::new(PersonalSignVerifier),
            Duration::seconds(10_000_000_000_000),
            std::time::Duration::from_millis(200),
        );

        let err = auth.issue_challenge(TEST_ADDRESS).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::Internal);

        assert_eq!(store.challenge_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_challenge() {
        let auth = protocol(Arc::new(MemoryStore::new()));
        let err = auth.verify(TEST_ADDRESS, "0x00").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::NoChallengeFound);
        assert_eq!(err.to_string(), "No challenge found for this address");
    }

    #[tokio::test]
    async fn test_store_failure_is_not_missing_challenge() {
        let auth = protocol(Arc::new(DownStore));

        let err = auth.issue_challenge(TEST_ADDRESS).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::StoreUnavailable);

        let err = auth.verify(TEST_ADDRESS, "0x00").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::StoreUnavailable);
    }

    #[tokio::test]
    async fn test_store_timeout_is_unavailable() {
        let auth = protocol(Arc::new(HungStore));

        let err = auth.issue_challenge(TEST_ADDRESS).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::StoreUnavailable(StoreError::Timeout(_))
        ));

        let err = auth.verify(TEST_ADDRESS, "0x00").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::StoreUnavailable);
    }

    #[tokio::test]
    async fn test_concurrent_reissue_wins_over_verify() {
        let store = Arc::new(ReissuingStore {
            inner: MemoryStore::new(),
            replacement: Mutex::new(None),
        });
        let auth = protocol(store.clone());
        let t0 = Utc::now();

        let message = auth.issue_challenge_at(TEST_ADDRESS, t0).await.unwrap();
        let signature = sign_message(TEST_KEY, &message).unwrap();

        let replacement = Challenge {
            nonce: "ffffffffffffffffffffffffffffffff".to_string(),
            message: challenge_message("ffffffffffffffffffffffffffffffff", t0),
            issued_at: t0,
            expires_at: t0 + auth.ttl(),
        };
        *store.replacement.lock().unwrap() = Some(replacement.clone());

        let err = auth.verify_at(TEST_ADDRESS, &signature, t0).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::NoChallengeFound);

        // The newer challenge survives
        let address = Address::parse(TEST_ADDRESS).unwrap();
        assert_eq!(store.inner.get(&address).await.unwrap(), Some(replacement));
    }

    #[tokio::test]
    async fn test_concurrent_verifies_consume_once() {
        let auth = Arc::new(protocol(Arc::new(MemoryStore::new())));
        let message = auth.issue_challenge(TEST_ADDRESS).await.unwrap();
        let signature = sign_message(TEST_KEY, &message).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let auth = auth.clone();
            let signature = signature.clone();
            handles.push(tokio::spawn(async move {
                auth.verify(TEST_ADDRESS, &signature).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert_eq!(e.kind(), AuthErrorKind::NoChallengeFound),
            }
        }
        assert_eq!(successes, 1);
    }

    #[test]
    fn test_error_kind_serializes_as_name() {
        assert_eq!(
            serde_json::to_string(&AuthErrorKind::StoreUnavailable).unwrap(),
            "\"StoreUnavailable\""
        );
    }
}
