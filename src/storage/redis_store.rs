//! Redis-backed challenge and session storage.
//!
//! Redis key patterns:
//! - `challenge:{checksum address}`: pending challenge (JSON), expires with the challenge TTL
//! - `session:{token}`: session data (JSON), expires with the session TTL
//!
//! Redis expiry only garbage-collects; the auth protocol still compares
//! `expires_at` itself on every verification.
//!
//! Session JSON read back from Redis is wrapped in `Zeroizing` so the copy
//! holding the bearer token is cleared from this process once decoded.

use super::{ttl_secs, ChallengeStore, SessionStore, StoreError};
use crate::auth::address::Address;
use crate::models::{Challenge, StoredSession};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use zeroize::Zeroizing;

/// Atomic GET + compare nonce + DEL.
const DELETE_IF_NONCE_SCRIPT: &str = r"
local val = redis.call('GET', KEYS[1])
if val and cjson.decode(val).nonce == ARGV[1] then
    redis.call('DEL', KEYS[1])
    return 1
end
return 0
";

#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        Ok(RedisStore { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Round-trip a PING, used at startup to fail fast on a bad URL.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut con).await?;
        Ok(())
    }
}

fn challenge_key(address: &Address) -> String {
    format!("challenge:{}", address)
}

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

#[async_trait]
impl ChallengeStore for RedisStore {
    async fn put(&self, address: &Address, challenge: &Challenge) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let json = serde_json::to_string(challenge)?;
        let ttl = ttl_secs(challenge.expires_at - challenge.issued_at);

        // SET overwrites any previous challenge for the address
        con.set_ex::<_, _, ()>(challenge_key(address), json, ttl)
            .await?;
        Ok(())
    }

    async fn get(&self, address: &Address) -> Result<Option<Challenge>, StoreError> {
        let mut con = self.connection().await?;
        let json: Option<String> = con.get(challenge_key(address)).await?;

        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, address: &Address) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        con.del::<_, ()>(challenge_key(address)).await?;
        Ok(())
    }

    async fn delete_if_nonce(&self, address: &Address, nonce: &str) -> Result<bool, StoreError> {
        let mut con = self.connection().await?;
        let script = redis::Script::new(DELETE_IF_NONCE_SCRIPT);

        let deleted: i32 = script
            .key(challenge_key(address))
            .arg(nonce)
            .invoke_async(&mut con)
            .await?;
        Ok(deleted == 1)
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn put_session(&self, session: &StoredSession, ttl: Duration) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let json = Zeroizing::new(serde_json::to_string(session)?);

        con.set_ex::<_, _, ()>(session_key(&session.token), json.as_str(), ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<StoredSession>, StoreError> {
        let mut con = self.connection().await?;
        let json: Option<String> = con.get(session_key(token)).await?;

        match json {
            Some(data) => {
                let zeroizing_data = Zeroizing::new(data);
                Ok(Some(serde_json::from_str(&zeroizing_data)?))
            }
            None => Ok(None),
        }
    }

    async fn delete_session(&self, token: &str) -> Result<bool, StoreError> {
        let mut con = self.connection().await?;
        let deleted: i32 = con.del(session_key(token)).await?;
        Ok(deleted > 0)
    }
}
