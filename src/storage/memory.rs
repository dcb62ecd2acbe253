//! In-process challenge and session storage.
//!
//! Backed by `DashMap`, whose sharded locking keeps operations on different
//! addresses from contending with each other while every single-key operation
//! stays atomic. Expired entries are dropped by [`MemoryStore::sweep_expired`],
//! which the cleanup loop calls periodically.

use super::{ChallengeStore, SessionStore, StoreError};
use crate::auth::address::Address;
use crate::models::{Challenge, StoredSession};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
struct SessionEntry {
    session: StoredSession,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    challenges: DashMap<Address, Challenge>,
    sessions: DashMap<String, SessionEntry>,
}

/// Number of entries removed by one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub challenges: usize,
    pub sessions: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every challenge and session whose expiry is before `now`.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> SweepStats {
        let challenges_before = self.challenges.len();
        self.challenges.retain(|_, c| !c.is_expired(now));

        let sessions_before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);

        SweepStats {
            challenges: challenges_before.saturating_sub(self.challenges.len()),
            sessions: sessions_before.saturating_sub(self.sessions.len()),
        }
    }

    pub fn challenge_count(&self) -> usize {
        self.challenges.len()
    }
}

#[async_trait]
impl ChallengeStore for MemoryStore {
    async fn put(&self, address: &Address, challenge: &Challenge) -> Result<(), StoreError> {
        self.challenges.insert(*address, challenge.clone());
        Ok(())
    }

    async fn get(&self, address: &Address) -> Result<Option<Challenge>, StoreError> {
        Ok(self.challenges.get(address).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, address: &Address) -> Result<(), StoreError> {
        self.challenges.remove(address);
        Ok(())
    }

    async fn delete_if_nonce(&self, address: &Address, nonce: &str) -> Result<bool, StoreError> {
        Ok(self
            .challenges
            .remove_if(address, |_, c| c.nonce == nonce)
            .is_some())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put_session(&self, session: &StoredSession, ttl: Duration) -> Result<(), StoreError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Backend(format!("Invalid session TTL: {}", e)))?;
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| StoreError::Backend("Session expiry out of range".to_string()))?;
        self.sessions.insert(
            session.token.clone(),
            SessionEntry {
                session: session.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<StoredSession>, StoreError> {
        let now = Utc::now();
        // Clone out before any removal: holding a shard guard while removing deadlocks.
        let found = self.sessions.get(token).map(|entry| entry.value().clone());

        match found {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.session)),
            Some(_) => {
                self.sessions.remove_if(token, |_, s| s.expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete_session(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.remove(token).is_some())
    }
}
