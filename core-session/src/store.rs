//! # Session State Store
//!
//! Remembers that the user is currently broadcasting so the "live" badge
//! survives a reload. The record lives under one settings key as JSON:
//!
//! ```json
//! {"id":"stream-42","title":"Friday night","startedAtEpochMillis":1718000000000}
//! ```
//!
//! A stream that was never stopped cleanly (tab closed, crash) would
//! otherwise show as live forever, so a record older than the staleness
//! window is treated as absent and deleted the next time it is read: at
//! load, or when [`SessionStateStore::current`] notices it aged out.
//! Unreadable records are purged the same way.
//!
//! Storage failures never take the indicator down with them. A failed read
//! starts the store inactive and a failed purge still clears memory.

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{storage::SettingsStore, time::Clock};
use core_async::sync::{watch, Mutex};
use core_async::task::spawn_abortable;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub title: String,
    pub started_at_epoch_millis: i64,
}

impl SessionRecord {
    /// Age at `now_millis`. Timestamps in the future count as zero age.
    pub fn age(&self, now_millis: i64) -> Duration {
        let elapsed = now_millis.saturating_sub(self.started_at_epoch_millis);
        Duration::from_millis(u64::try_from(elapsed).unwrap_or(0))
    }

    pub fn is_stale(&self, now_millis: i64, window: Duration) -> bool {
        self.age(now_millis) > window
    }
}

pub struct SessionStateStore {
    store: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    events: Option<EventBus>,
    current: watch::Sender<Option<SessionRecord>>,
    // Serializes writes to the storage key, including deferred purges.
    writes: Arc<Mutex<()>>,
}

impl SessionStateStore {
    pub fn new(store: Arc<dyn SettingsStore>, clock: Arc<dyn Clock>, config: SessionConfig) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            store,
            clock,
            config,
            events: None,
            current,
            writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Restores the persisted session, purging it if stale or unreadable.
    ///
    /// A storage read failure is logged and the store starts inactive.
    #[instrument(skip(self), fields(key = %self.config.storage_key))]
    pub async fn initialize(&self) -> Result<Option<SessionRecord>> {
        let raw = match self.store.get_string(&self.config.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No persisted session");
                self.current.send_replace(None);
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "Session storage unreadable, starting inactive");
                self.current.send_replace(None);
                return Ok(None);
            }
        };

        let record = match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Persisted session is unreadable, purging");
                self.purge(None).await;
                return Ok(None);
            }
        };

        let now = self.clock.unix_timestamp_millis();
        if record.is_stale(now, self.config.staleness) {
            info!(
                id = %record.id,
                age_secs = record.age(now).as_secs(),
                "Persisted session is stale, purging"
            );
            self.purge(Some(record.id)).await;
            return Ok(None);
        }

        info!(id = %record.id, "Restored live session");
        self.current.send_replace(Some(record.clone()));
        Ok(Some(record))
    }

    /// Marks a stream as live. The record is written before memory is
    /// updated, so a failed write leaves the previous state in place.
    #[instrument(skip(self, title))]
    pub async fn activate(&self, id: &str, title: &str) -> Result<SessionRecord> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SessionError::InvalidSession(
                "session id cannot be empty".to_string(),
            ));
        }

        let record = SessionRecord {
            id: id.to_string(),
            title: title.to_string(),
            started_at_epoch_millis: self.clock.unix_timestamp_millis(),
        };
        let json = serde_json::to_string(&record)?;
        {
            let _writes = self.writes.lock().await;
            self.store
                .set_string(&self.config.storage_key, &json)
                .await?;
            self.current.send_replace(Some(record.clone()));
        }

        info!("Live session activated");
        self.publish(SessionEvent::Activated {
            id: record.id.clone(),
            title: record.title.clone(),
        });
        Ok(record)
    }

    /// Ends the live session. Deactivating with no session is a no-op apart
    /// from clearing storage.
    #[instrument(skip(self))]
    pub async fn deactivate(&self) -> Result<()> {
        let previous = {
            let _writes = self.writes.lock().await;
            self.store.delete(&self.config.storage_key).await?;
            self.current.send_replace(None)
        };
        if previous.is_some() {
            info!("Live session deactivated");
            self.publish(SessionEvent::Deactivated);
        }
        Ok(())
    }

    /// The active session, if any.
    ///
    /// A record that has aged past the window since it was loaded is
    /// cleared from memory here and its durable copy deleted in the
    /// background. Outside an async runtime the durable copy is left for the
    /// next [`initialize`](Self::initialize).
    pub fn current(&self) -> Option<SessionRecord> {
        let now = self.clock.unix_timestamp_millis();
        let window = self.config.staleness;
        let mut expired = None;
        self.current.send_if_modified(|slot| match slot {
            Some(record) if record.is_stale(now, window) => {
                expired = slot.take();
                true
            }
            _ => false,
        });

        if let Some(record) = expired {
            info!(id = %record.id, "Live session aged out");
            self.publish(SessionEvent::Expired {
                id: Some(record.id.clone()),
            });
            self.schedule_purge(record);
        }
        self.current.borrow().clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.current().is_some()
    }

    pub fn stream_id(&self) -> Option<String> {
        self.current().map(|record| record.id)
    }

    /// Observes activation and deactivation.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionRecord>> {
        self.current.subscribe()
    }

    async fn purge(&self, id: Option<String>) {
        {
            let _writes = self.writes.lock().await;
            if let Err(e) = self.store.delete(&self.config.storage_key).await {
                warn!(error = %e, "Failed to delete expired session record");
            }
            self.current.send_replace(None);
        }
        self.publish(SessionEvent::Expired { id });
    }

    /// Deletes `stale` from storage unless it has been replaced meanwhile.
    fn schedule_purge(&self, stale: SessionRecord) {
        if !can_spawn() {
            debug!("No async runtime, stale record is purged at next load");
            return;
        }
        let store = Arc::clone(&self.store);
        let writes = Arc::clone(&self.writes);
        let key = self.config.storage_key.clone();
        spawn_abortable(async move {
            let _writes = writes.lock().await;
            let persisted = match store.get_string(&key).await {
                Ok(raw) => raw.and_then(|raw| serde_json::from_str::<SessionRecord>(&raw).ok()),
                Err(e) => {
                    warn!(error = %e, "Failed to read session record for purge");
                    return;
                }
            };
            if persisted.as_ref() != Some(&stale) {
                return;
            }
            if let Err(e) = store.delete(&key).await {
                warn!(error = %e, "Failed to delete expired session record");
            }
        });
    }

    fn publish(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            events.publish(CoreEvent::Session(event));
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn can_spawn() -> bool {
    core_async::runtime::in_runtime()
}

#[cfg(target_arch = "wasm32")]
fn can_spawn() -> bool {
    true
}
