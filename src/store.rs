use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::Error;

/// Host-provided key-value storage.
///
/// Two scopes are used: the page's session scope (where the application
/// persists `persist:user` / `persist:auth`) and an operator scope that
/// survives reloads (admin token cache, panel position).
///
/// # Example
///
/// ```rust,ignore
/// impl KeyValueStore for LocalStorage {
///     fn get(&self, key: &str) -> Option<String> {
///         self.inner.get_item(key).ok().flatten()
///     }
///
///     fn set(&self, key: &str, value: String) -> Result<(), Error> {
///         self.inner
///             .set_item(key, &value)
///             .map_err(|e| Error::Store(format!("{e:?}")))
///     }
///
///     fn remove(&self, key: &str) {
///         let _ = self.inner.remove_item(key);
///     }
/// }
/// ```
pub trait KeyValueStore: Send + Sync + 'static {
    /// Current raw value under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Replace the value under `key`.
    fn set(&self, key: &str, value: String) -> Result<(), Error>;

    /// Drop `key`. Missing keys are ignored.
    fn remove(&self, key: &str);
}

/// In-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value, chaining.
    #[must_use]
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        self
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), Error> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
