//! End-to-end engine tests over the in-memory store.

use std::sync::{Arc, Mutex};

use janua::auth::{
    config::AuthConfig,
    error::AuthError,
    identity::{SessionSelector, UserId},
    reset::ResetNotifier,
    store::{AuthStore, MemoryStore},
    AuthEngine,
};
use uuid::Uuid;

const HASH: &str = "d74ff0ee8da3b9806b18c877dbf29bbde50b5bd8e4dad7a3a725000feb82e8f1";
const NEW_HASH: &str = "c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00";

/// Test notifier that records every delivered reset id.
#[derive(Clone, Default)]
struct CapturingNotifier {
    delivered: Arc<Mutex<Vec<(UserId, Uuid)>>>,
}

impl ResetNotifier for CapturingNotifier {
    fn deliver(&self, user: &UserId, _email: &str, reset_id: Uuid) -> anyhow::Result<()> {
        self.delivered
            .lock()
            .expect("notifier lock")
            .push((user.clone(), reset_id));
        Ok(())
    }
}

async fn engine_with_alice(config: AuthConfig) -> (Arc<AuthEngine>, CapturingNotifier) {
    let store: Arc<dyn AuthStore> = Arc::new(MemoryStore::new());
    let notifier = CapturingNotifier::default();
    let engine = Arc::new(AuthEngine::new(
        store.clone(),
        config,
        Arc::new(notifier.clone()),
    ));

    store
        .set_registration_open("org1", true)
        .await
        .expect("open org");
    engine
        .directory()
        .provision(
            janua::auth::directory::NewUser {
                id: UserId::new("alice", "org1"),
                email: "alice@mail.test".to_string(),
                parent: None,
                password_hash: Some(HASH.to_string()),
            },
            None,
        )
        .await
        .expect("provision alice");

    (engine, notifier)
}

fn alice() -> UserId {
    UserId::new("alice", "org1")
}

#[tokio::test]
async fn login_list_delete_scenario() {
    let (engine, _notifier) = engine_with_alice(AuthConfig::new()).await;

    // Open a session with the correct hash.
    let created = engine.sessions().open(&alice(), HASH).await.expect("open");
    assert_eq!(created.session.owner, alice());

    // Listing through the guard shows exactly that session.
    let requester = engine
        .guard()
        .authorize_self_access(&created.key, &alice())
        .await
        .expect("authorize");
    let sessions = engine.sessions().list_for(&alice()).await.expect("list");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, created.session.session_id);

    // Deleting by explicit id succeeds, after which the key is dead.
    engine
        .sessions()
        .delete(&requester, SessionSelector::Id(created.session.session_id))
        .await
        .expect("delete");
    assert!(matches!(
        engine.sessions().validate(&created.key).await,
        Err(AuthError::KeyInvalid)
    ));
}

#[tokio::test]
async fn current_resolves_to_the_presented_key() {
    let (engine, _notifier) = engine_with_alice(AuthConfig::new()).await;

    let created = engine.sessions().open(&alice(), HASH).await.expect("open");
    let requester = engine
        .guard()
        .authorize_self_access(&created.key, &alice())
        .await
        .expect("authorize");

    let current = engine
        .sessions()
        .get(&requester, SessionSelector::Current)
        .await
        .expect("current");
    let by_id = engine
        .sessions()
        .get(&requester, SessionSelector::Id(created.session.session_id))
        .await
        .expect("by id");

    assert_eq!(current.session_id, by_id.session_id);
    assert_eq!(current.session_id, created.session.session_id);
}

#[tokio::test]
async fn multi_device_sessions_coexist() {
    let (engine, _notifier) = engine_with_alice(AuthConfig::new()).await;

    let first = engine.sessions().open(&alice(), HASH).await.expect("open");
    let second = engine.sessions().open(&alice(), HASH).await.expect("open");
    assert_ne!(first.key, second.key);
    assert_ne!(first.session.session_id, second.session.session_id);

    let sessions = engine.sessions().list_for(&alice()).await.expect("list");
    assert_eq!(sessions.len(), 2);

    // Deleting one leaves the other usable.
    let requester = engine
        .guard()
        .authorize_self_access(&first.key, &alice())
        .await
        .expect("authorize");
    engine
        .sessions()
        .delete(&requester, SessionSelector::Current)
        .await
        .expect("delete");
    engine
        .sessions()
        .validate(&second.key)
        .await
        .expect("second still valid");
}

#[tokio::test]
async fn reset_flow_replaces_credential_and_revokes_sessions() {
    let (engine, notifier) = engine_with_alice(AuthConfig::new()).await;

    let session = engine.sessions().open(&alice(), HASH).await.expect("open");

    let issued = engine.resets().request(&alice()).await.expect("request");
    engine
        .notifier()
        .deliver(&alice(), &issued.email, issued.reset_id)
        .expect("deliver");
    {
        let delivered = notifier.delivered.lock().expect("lock");
        assert_eq!(delivered.last(), Some(&(alice(), issued.reset_id)));
    }

    engine
        .resets()
        .complete(&alice(), issued.reset_id, NEW_HASH)
        .await
        .expect("complete");

    // Old credential gone, old session revoked, new credential works.
    assert!(matches!(
        engine.sessions().open(&alice(), HASH).await,
        Err(AuthError::InvalidCredential)
    ));
    assert!(matches!(
        engine.sessions().validate(&session.key).await,
        Err(AuthError::KeyInvalid)
    ));
    engine
        .sessions()
        .open(&alice(), NEW_HASH)
        .await
        .expect("open with new credential");
}

#[tokio::test]
async fn concurrent_reset_completion_has_exactly_one_winner() {
    let (engine, _notifier) = engine_with_alice(AuthConfig::new()).await;
    let issued = engine.resets().request(&alice()).await.expect("request");

    let first = {
        let engine = engine.clone();
        let reset_id = issued.reset_id;
        tokio::spawn(async move {
            engine
                .resets()
                .complete(&UserId::new("alice", "org1"), reset_id, NEW_HASH)
                .await
        })
    };
    let second = {
        let engine = engine.clone();
        let reset_id = issued.reset_id;
        tokio::spawn(async move {
            engine
                .resets()
                .complete(&UserId::new("alice", "org1"), reset_id, NEW_HASH)
                .await
        })
    };

    let results = [
        first.await.expect("join"),
        second.await.expect("join"),
    ];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let invalid = results
        .iter()
        .filter(|r| matches!(r, Err(AuthError::InvalidRequest)))
        .count();

    assert_eq!(successes, 1, "exactly one completion may succeed");
    assert_eq!(invalid, 1, "the loser must see an invalid request");
}

#[tokio::test]
async fn reset_completion_for_the_wrong_user_does_not_burn_the_token() {
    let (engine, _notifier) = engine_with_alice(AuthConfig::new()).await;
    let issued = engine.resets().request(&alice()).await.expect("request");

    // Provision a second user who tries to redeem alice's token.
    engine
        .directory()
        .provision(
            janua::auth::directory::NewUser {
                id: UserId::new("mallory", "org1"),
                email: "mallory@mail.test".to_string(),
                parent: None,
                password_hash: None,
            },
            None,
        )
        .await
        .expect("provision mallory");

    assert!(matches!(
        engine
            .resets()
            .complete(&UserId::new("mallory", "org1"), issued.reset_id, NEW_HASH)
            .await,
        Err(AuthError::InvalidRequest)
    ));

    // The rightful owner can still redeem it afterwards.
    engine
        .resets()
        .complete(&alice(), issued.reset_id, NEW_HASH)
        .await
        .expect("owner completion");
}

#[tokio::test]
async fn sliding_expiration_window() {
    let config = AuthConfig::new()
        .with_session_ttl_seconds(1)
        .with_reaper_interval_seconds(0);
    let (engine, _notifier) = engine_with_alice(config).await;

    let created = engine.sessions().open(&alice(), HASH).await.expect("open");

    // Validations spaced inside the TTL keep the session alive.
    for _ in 0..3 {
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        engine
            .sessions()
            .validate(&created.key)
            .await
            .expect("alive inside the window");
    }

    // A gap longer than the TTL kills it.
    tokio::time::sleep(std::time::Duration::from_millis(2_100)).await;
    assert!(matches!(
        engine.sessions().validate(&created.key).await,
        Err(AuthError::KeyExpired)
    ));
}

#[tokio::test]
async fn hierarchical_provisioning_end_to_end() {
    let (engine, _notifier) = engine_with_alice(AuthConfig::new()).await;

    let parent = alice();
    let child = UserId::new("charlie", "org1");

    // Without a key: authentication failure.
    let request = || janua::auth::directory::NewUser {
        id: child.clone(),
        email: "charlie@mail.test".to_string(),
        parent: Some(parent.clone()),
        password_hash: None,
    };
    assert!(matches!(
        engine.directory().provision(request(), None).await,
        Err(AuthError::MissingKey)
    ));

    // With the parent's live key: success, and the record carries the link.
    let session = engine.sessions().open(&parent, HASH).await.expect("open");
    engine
        .directory()
        .provision(request(), Some(&session.key))
        .await
        .expect("provision child");

    let record = engine.directory().get(&child).await.expect("get child");
    assert_eq!(record.parent, Some(parent));
}
