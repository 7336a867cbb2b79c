use super::*;
use crate::backend::{MemoryBackend, MockKvBackend};

fn config() -> StoreConfig {
    StoreConfig::default().with_key_prefix("test")
}

#[tokio::test]
async fn test_starts_unavailable_without_connect() {
    let backend = Arc::new(MemoryBackend::new());
    let store = BackingStore::new(backend.clone(), &config());

    assert!(!store.is_available());
    let err = store.get("test:key").await.unwrap_err();
    assert!(matches!(err, BackendError::Unavailable));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_connect_marks_available() {
    let store = BackingStore::connect(Arc::new(MemoryBackend::new()), &config()).await;
    assert!(store.is_available());

    store.set("test:key", "value").await.unwrap();
    assert_eq!(store.get("test:key").await.unwrap().as_deref(), Some("value"));
}

#[tokio::test]
async fn test_degraded_store_issues_no_backend_calls() {
    // No expectations: any call on the mock panics
    let store = BackingStore::new(Arc::new(MockKvBackend::new()), &config());

    assert!(matches!(store.get("k").await, Err(BackendError::Unavailable)));
    assert!(matches!(store.set("k", "v").await, Err(BackendError::Unavailable)));
    assert!(matches!(store.touch("k").await, Err(BackendError::Unavailable)));
    assert!(matches!(store.scan("*").await, Err(BackendError::Unavailable)));
    assert!(matches!(
        store.add_member("s", "m").await,
        Err(BackendError::Unavailable)
    ));
    assert!(matches!(store.members("s").await, Err(BackendError::Unavailable)));
}

#[tokio::test(start_paused = true)]
async fn test_connect_gives_up_after_max_attempts() {
    let mut mock = MockKvBackend::new();
    mock.expect_connect()
        .times(3)
        .returning(|| Err(BackendError::Connection("refused".to_string())));

    let store = BackingStore::connect(Arc::new(mock), &config()).await;
    assert!(!store.is_available());
}

#[tokio::test(start_paused = true)]
async fn test_connect_succeeds_after_retry() {
    let mut mock = MockKvBackend::new();
    let mut attempts = 0;
    mock.expect_connect().times(2).returning(move || {
        attempts += 1;
        if attempts == 1 {
            Err(BackendError::Connection("refused".to_string()))
        } else {
            Ok(())
        }
    });

    let store = BackingStore::connect(Arc::new(mock), &config()).await;
    assert!(store.is_available());
}

#[tokio::test]
async fn test_connectivity_error_flips_flag() {
    let backend = Arc::new(MemoryBackend::new());
    let store = BackingStore::connect(backend.clone(), &config()).await;
    assert!(store.is_available());

    backend.set_unreachable(true);
    let err = store.get("test:key").await.unwrap_err();
    assert!(matches!(err, BackendError::Connection(_)));
    assert!(!store.is_available());

    // Subsequent calls short-circuit before reaching the backend
    let calls = backend.call_count();
    assert!(matches!(
        store.set("test:key", "v").await,
        Err(BackendError::Unavailable)
    ));
    assert_eq!(backend.call_count(), calls);
}

#[tokio::test]
async fn test_command_error_keeps_flag() {
    let store = BackingStore::connect(Arc::new(MemoryBackend::new()), &config()).await;
    store.add_member("test:set", "a").await.unwrap();

    let err = store.get("test:set").await.unwrap_err();
    assert!(matches!(err, BackendError::Command { .. }));
    assert!(store.is_available());
}

#[tokio::test]
async fn test_probe_recovers_after_outage() {
    let backend = Arc::new(MemoryBackend::new());
    let store = BackingStore::connect(backend.clone(), &config()).await;

    backend.set_unreachable(true);
    assert!(!store.probe().await);
    assert!(!store.is_available());

    backend.set_unreachable(false);
    assert!(store.probe().await);
    assert!(store.is_available());
}

#[tokio::test]
async fn test_probe_treats_unexpected_reply_as_unreachable() {
    let mut mock = MockKvBackend::new();
    mock.expect_connect().returning(|| Ok(()));
    mock.expect_ping().returning(|| Ok("LOADING".to_string()));

    let store = BackingStore::connect(Arc::new(mock), &config()).await;
    assert!(store.is_available());

    assert!(!store.probe().await);
    assert!(!store.is_available());
}

#[tokio::test(start_paused = true)]
async fn test_background_probe_restores_availability() {
    let backend = Arc::new(MemoryBackend::new());
    backend.set_unreachable(true);
    let store = BackingStore::connect(backend.clone(), &config()).await;
    assert!(!store.is_available());

    let handle = store.spawn_health_probe(Duration::from_secs(30));
    backend.set_unreachable(false);
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert!(store.is_available());
    handle.abort();
}

#[tokio::test]
async fn test_availability_shared_between_clones() {
    let store = BackingStore::connect(Arc::new(MemoryBackend::new()), &config()).await;
    let clone = store.clone();

    store.availability().mark_error("test");
    assert!(!clone.is_available());

    clone.availability().mark_connected();
    assert!(store.is_available());
}

#[tokio::test]
async fn test_set_applies_sliding_ttl() {
    let backend = Arc::new(MemoryBackend::new());
    let store = BackingStore::connect(backend.clone(), &config().with_ttl_seconds(120)).await;

    store.set("test:key", "v").await.unwrap();
    let ttl = backend.ttl("test:key").await.unwrap();
    assert!(ttl <= Duration::from_secs(120));
    assert!(ttl > Duration::from_secs(60));
}

#[test]
fn test_backoff_delays() {
    let backoff = ConnectBackoff::default();
    assert_eq!(backoff.delay_for(1), Duration::from_millis(200));
    assert_eq!(backoff.delay_for(2), Duration::from_millis(400));
    assert_eq!(backoff.delay_for(3), Duration::from_millis(800));
    assert_eq!(backoff.delay_for(10), Duration::from_secs(2));
}

#[test]
fn test_backoff_from_config() {
    let mut config = StoreConfig::default();
    config.connect_max_attempts = 0;
    config.connect_initial_delay_ms = 50;
    let backoff = ConnectBackoff::from_config(&config);
    assert_eq!(backoff.max_attempts, 1);
    assert_eq!(backoff.delay_for(1), Duration::from_millis(50));
}
