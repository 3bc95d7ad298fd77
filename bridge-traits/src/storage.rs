//! Durable key-value storage.
//!
//! The core persists a handful of small JSON documents (the live session
//! record among them) under string keys. Hosts back this with whatever
//! survives a restart: SQLite on desktop, `localStorage` in the browser.

use crate::{error::Result, platform::PlatformSendSync};

/// Persistent string key-value store.
///
/// Writes must be durable once the returned future resolves; a reload of the
/// host immediately afterwards must observe them.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember(store: &dyn SettingsStore) -> bridge_traits::error::Result<()> {
///     store.set_string("last_stream", "42").await?;
///     assert_eq!(store.get_string("last_stream").await?, Some("42".into()));
///     Ok(())
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait SettingsStore: PlatformSendSync {
    /// Store a string value, replacing any previous value.
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check whether a key is present.
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List every key owned by this store.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Remove every key owned by this store.
    async fn clear_all(&self) -> Result<()>;
}
