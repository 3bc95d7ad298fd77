//! Session persistence across simulated reloads.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::storage::SettingsStore;
use bridge_traits::time::Clock;
use chrono::{DateTime, TimeZone, Utc};
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use core_session::{SessionConfig, SessionError, SessionRecord, SessionStateStore};
use mockall::mock;
use parking_lot::Mutex;

#[derive(Default)]
struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.values.lock().keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.values.lock().clear();
        Ok(())
    }
}

/// Clock the test moves by hand.
struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()),
        })
    }

    fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

const HOUR: Duration = Duration::from_secs(3600);

fn open(store: &Arc<MemoryStore>, clock: &Arc<ManualClock>) -> SessionStateStore {
    SessionStateStore::new(store.clone(), clock.clone(), SessionConfig::default())
}

#[tokio::test]
async fn fresh_session_survives_reload() {
    let store = Arc::new(MemoryStore::default());
    let clock = ManualClock::new();

    let first = open(&store, &clock);
    first.activate("stream-42", "Friday night").await.unwrap();
    assert!(first.is_streaming());

    clock.advance(HOUR);

    let reloaded = open(&store, &clock);
    let restored = reloaded.initialize().await.unwrap();
    assert_eq!(restored.map(|r| r.id), Some("stream-42".to_string()));
    assert_eq!(reloaded.stream_id().as_deref(), Some("stream-42"));
}

#[tokio::test]
async fn stale_session_is_purged_on_reload() {
    let store = Arc::new(MemoryStore::default());
    let clock = ManualClock::new();
    let bus = EventBus::new(8);
    let mut rx = bus.subscribe();

    open(&store, &clock).activate("stream-42", "").await.unwrap();
    clock.advance(7 * HOUR);

    let reloaded = open(&store, &clock).with_event_bus(bus);
    assert_eq!(reloaded.initialize().await.unwrap(), None);
    assert!(!reloaded.is_streaming());
    assert!(store.values.lock().get("live_session").is_none());
    assert_eq!(
        rx.try_recv().unwrap(),
        CoreEvent::Session(SessionEvent::Expired {
            id: Some("stream-42".into())
        })
    );
}

#[tokio::test]
async fn corrupt_record_is_purged() {
    let store = Arc::new(MemoryStore::default());
    store
        .set_string("live_session", "{\"id\":")
        .await
        .unwrap();
    let clock = ManualClock::new();

    let session = open(&store, &clock);
    assert_eq!(session.initialize().await.unwrap(), None);
    assert!(store.values.lock().is_empty());
}

#[tokio::test]
async fn deactivate_clears_storage_and_memory() {
    let store = Arc::new(MemoryStore::default());
    let clock = ManualClock::new();
    let session = open(&store, &clock);
    let mut changes = session.subscribe();

    session.activate("s1", "t").await.unwrap();
    assert!(changes.has_changed().unwrap());
    assert_eq!(changes.borrow_and_update().as_ref().map(|r| r.id.as_str()), Some("s1"));

    session.deactivate().await.unwrap();
    assert!(session.current().is_none());
    assert!(store.values.lock().is_empty());
    assert!(changes.borrow_and_update().is_none());

    let reloaded = open(&store, &clock);
    assert_eq!(reloaded.initialize().await.unwrap(), None);
}

#[tokio::test]
async fn record_ages_out_while_loaded() {
    let store = Arc::new(MemoryStore::default());
    let clock = ManualClock::new();
    let bus = EventBus::new(8);
    let session = open(&store, &clock).with_event_bus(bus.clone());

    session.activate("s1", "t").await.unwrap();
    let mut rx = bus.subscribe();
    clock.advance(6 * HOUR + Duration::from_secs(1));
    assert!(!session.is_streaming());
    assert!(session.subscribe().borrow().is_none());

    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert!(store.values.lock().is_empty());
    assert_eq!(
        rx.try_recv().unwrap(),
        CoreEvent::Session(SessionEvent::Expired {
            id: Some("s1".into())
        })
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn aged_out_purge_spares_a_newer_record() {
    let store = Arc::new(MemoryStore::default());
    let clock = ManualClock::new();
    let session = open(&store, &clock);

    session.activate("old", "t").await.unwrap();
    clock.advance(7 * HOUR);
    assert!(session.current().is_none());
    session.activate("new", "t").await.unwrap();

    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_eq!(session.stream_id().as_deref(), Some("new"));
    let raw = store.values.lock().get("live_session").cloned().unwrap();
    assert!(raw.contains("\"new\""));
}

#[tokio::test]
async fn persisted_format_is_stable() {
    let store = Arc::new(MemoryStore::default());
    let clock = ManualClock::new();
    let session = open(&store, &clock);

    let record = session.activate("s1", "Evening").await.unwrap();
    let raw = store.get_string("live_session").await.unwrap().unwrap();
    let parsed: SessionRecord = serde_json::from_str(&raw).unwrap();

    assert_eq!(parsed, record);
    assert_eq!(record.started_at_epoch_millis, clock.unix_timestamp_millis());
    assert!(raw.contains("startedAtEpochMillis"));
}

#[tokio::test]
async fn blank_id_is_rejected() {
    let store = Arc::new(MemoryStore::default());
    let session = open(&store, &ManualClock::new());
    assert!(matches!(
        session.activate("  ", "t").await,
        Err(SessionError::InvalidSession(_))
    ));
    assert!(store.values.lock().is_empty());
}

#[tokio::test]
async fn custom_window_and_key() {
    let store = Arc::new(MemoryStore::default());
    let clock = ManualClock::new();
    let config = SessionConfig::default()
        .with_storage_key("broadcast")
        .with_staleness(Duration::from_secs(60));

    let session = SessionStateStore::new(store.clone(), clock.clone(), config.clone());
    session.activate("s1", "t").await.unwrap();
    assert!(store.values.lock().contains_key("broadcast"));

    clock.advance(Duration::from_secs(61));
    let reloaded = SessionStateStore::new(store.clone(), clock.clone(), config);
    assert_eq!(reloaded.initialize().await.unwrap(), None);
}

mock! {
    Settings {}

    #[async_trait]
    impl SettingsStore for Settings {
        async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()>;
        async fn get_string(&self, key: &str) -> BridgeResult<Option<String>>;
        async fn delete(&self, key: &str) -> BridgeResult<()>;
        async fn list_keys(&self) -> BridgeResult<Vec<String>>;
        async fn clear_all(&self) -> BridgeResult<()>;
    }
}

#[tokio::test]
async fn failed_write_leaves_state_untouched() {
    let mut settings = MockSettings::new();
    settings
        .expect_set_string()
        .returning(|_, _| Err(BridgeError::Storage("disk full".into())));

    let session = SessionStateStore::new(
        Arc::new(settings),
        ManualClock::new(),
        SessionConfig::default(),
    );

    let err = session.activate("s1", "t").await.unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)));
    assert!(!session.is_streaming());
}

#[tokio::test]
async fn storage_read_errors_start_inactive() {
    let mut settings = MockSettings::new();
    settings
        .expect_get_string()
        .returning(|_| Err(BridgeError::Storage("locked".into())));
    settings.expect_delete().never();

    let session = SessionStateStore::new(
        Arc::new(settings),
        ManualClock::new(),
        SessionConfig::default(),
    );
    assert_eq!(session.initialize().await.unwrap(), None);
    assert!(!session.is_streaming());
}

#[tokio::test]
async fn failed_purge_still_clears_memory() {
    let clock = ManualClock::new();
    let started = clock.unix_timestamp_millis() - 7 * 3_600_000;
    let stale = format!(
        r#"{{"id":"s1","title":"t","startedAtEpochMillis":{}}}"#,
        started
    );

    let mut settings = MockSettings::new();
    settings
        .expect_get_string()
        .returning(move |_| Ok(Some(stale.clone())));
    settings
        .expect_delete()
        .times(1)
        .returning(|_| Err(BridgeError::Storage("quota".into())));

    let bus = EventBus::new(8);
    let mut rx = bus.subscribe();
    let session =
        SessionStateStore::new(Arc::new(settings), clock, SessionConfig::default())
            .with_event_bus(bus);

    assert_eq!(session.initialize().await.unwrap(), None);
    assert!(!session.is_streaming());
    assert!(matches!(
        rx.try_recv().unwrap(),
        CoreEvent::Session(SessionEvent::Expired { .. })
    ));
}
