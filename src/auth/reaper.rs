//! Background reclamation of expired session rows.
//!
//! Expiry is computed at read time, so this sweep is storage hygiene only.
//! The store's delete predicate re-checks `lastupdate`, which is what makes
//! it safe to run next to concurrent validations.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::auth::keys::now_unix;
use crate::auth::store::AuthStore;

/// Spawn the periodic expired-session sweep.
pub fn spawn_session_reaper(
    store: Arc<dyn AuthStore>,
    ttl_seconds: i64,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;

            match store.reap_expired_sessions(now_unix(), ttl_seconds).await {
                Ok(0) => {}
                Ok(reaped) => debug!(reaped, "expired sessions reclaimed"),
                Err(err) => error!("session reaper sweep failed: {err}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::UserId;
    use crate::auth::keys::hash_session_key;
    use crate::auth::store::{MemoryStore, SessionRecord};
    use uuid::Uuid;

    #[tokio::test]
    async fn reaper_reclaims_stale_rows() {
        let store: Arc<dyn AuthStore> = Arc::new(MemoryStore::new());
        store
            .insert_session(&SessionRecord {
                session_id: Uuid::new_v4(),
                key_hash: hash_session_key("stale"),
                owner: UserId::new("alice", "org1"),
                startdate: 0,
                lastupdate: 0,
            })
            .await
            .expect("insert");

        let handle = spawn_session_reaper(store.clone(), 60, Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.abort();

        let remaining = store
            .sessions_for_owner(&UserId::new("alice", "org1"), now_unix(), i64::MAX / 2)
            .await
            .expect("list");
        assert!(remaining.is_empty());
    }
}
