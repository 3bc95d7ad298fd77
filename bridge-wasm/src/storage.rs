//! `localStorage`-backed settings.
//!
//! Keys are prefixed with a namespace so several hosts on one origin keep
//! separate buckets. Values are stored as plain strings; nothing the core
//! persists here is sensitive.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    storage::SettingsStore,
};

use crate::error::{js_error, window};

const SETTINGS_KIND: &str = "settings";

fn local_storage() -> BridgeResult<web_sys::Storage> {
    window()?
        .local_storage()
        .map_err(|err| js_error("localStorage", err))?
        .ok_or_else(|| BridgeError::NotAvailable("localStorage".into()))
}

/// Settings store on `window.localStorage`.
#[derive(Clone)]
pub struct LocalStorageSettingsStore {
    storage: web_sys::Storage,
    prefix: String,
}

impl LocalStorageSettingsStore {
    /// Store scoped to `namespace`.
    pub fn new(namespace: impl AsRef<str>) -> BridgeResult<Self> {
        Ok(Self {
            storage: local_storage()?,
            prefix: format!("{}::{}::", namespace.as_ref(), SETTINGS_KIND),
        })
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait(?Send)]
impl SettingsStore for LocalStorageSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        // Quota errors surface here.
        self.storage
            .set_item(&self.key_for(key), value)
            .map_err(|err| BridgeError::Storage(crate::error::js_message(&err)))
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        self.storage
            .get_item(&self.key_for(key))
            .map_err(|err| js_error("get setting", err))
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.storage
            .remove_item(&self.key_for(key))
            .map_err(|err| js_error("remove setting", err))
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        let len = self
            .storage
            .length()
            .map_err(|err| js_error("storage length", err))?;

        let mut keys = Vec::new();
        for idx in 0..len {
            let entry = self
                .storage
                .key(idx)
                .map_err(|err| js_error("storage key", err))?;
            if let Some(key) = entry.as_deref().and_then(|e| e.strip_prefix(&self.prefix)) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        // Collect first: removing while indexing shifts the key positions.
        for key in self.list_keys().await? {
            self.delete(&key).await?;
        }
        Ok(())
    }
}
