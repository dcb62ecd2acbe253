//! Background sweep of the in-process challenge and session stores.
//!
//! Redis expires keys on its own; the in-memory backend needs this loop
//! to keep abandoned challenges and sessions from accumulating. The expiry
//! check in verification does not depend on it.

use crate::storage::memory::SweepStats;
use crate::storage::MemoryStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Run the sweep loop, removing expired entries every `interval`.
pub async fn run_sweep_loop(store: Arc<MemoryStore>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        sweep_once(&store);
    }
}

fn sweep_once(store: &MemoryStore) -> SweepStats {
    let stats = store.sweep_expired(Utc::now());

    if stats.challenges > 0 || stats.sessions > 0 {
        tracing::info!(
            challenges = stats.challenges,
            sessions = stats.sessions,
            "Expired entries swept"
        );
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::address::Address;
    use crate::models::Challenge;
    use crate::storage::ChallengeStore;
    use chrono::Duration as ChronoDuration;

    fn expired_challenge() -> Challenge {
        let issued_at = Utc::now() - ChronoDuration::minutes(10);
        Challenge {
            nonce: "aa".to_string(),
            message: "m".to_string(),
            issued_at,
            expires_at: issued_at + ChronoDuration::minutes(5),
        }
    }

    #[tokio::test]
    async fn test_sweep_once() {
        let store = MemoryStore::new();
        store
            .put(&Address::from_bytes([1; 20]), &expired_challenge())
            .await
            .unwrap();

        let stats = sweep_once(&store);
        assert_eq!(stats.challenges, 1);
        assert_eq!(store.challenge_count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_loop_runs() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(&Address::from_bytes([2; 20]), &expired_challenge())
            .await
            .unwrap();

        let handle = tokio::spawn(run_sweep_loop(store.clone(), Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(store.challenge_count(), 0);
    }
}
