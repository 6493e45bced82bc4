//! Session-scoped cache of fetched page data.
//!
//! Entries are JSON values stamped with their fetch time. Everything is
//! dropped when the session is cleared, so data fetched for one user is never
//! shown to the next.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

/// Entries older than this are refetched on next access.
const STALE_AFTER_SECS: i64 = 30;

#[derive(Debug, Clone)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.cached_at
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age().num_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age().num_seconds() > STALE_AFTER_SECS
    }
}

#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<String, CachedData<serde_json::Value>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Serialize>(&self, key: &str, data: &T) -> serde_json::Result<()> {
        let value = serde_json::to_value(data)?;
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), CachedData::new(value));
        Ok(())
    }

    /// Cached entry for `key`, stale or not. `None` if absent or if it no
    /// longer decodes as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let cached = entries.get(key)?;
        match serde_json::from_value(cached.data.clone()) {
            Ok(data) => Some(CachedData {
                data,
                cached_at: cached.cached_at,
            }),
            Err(e) => {
                debug!(key, error = %e, "Cached query no longer decodes");
                None
            }
        }
    }

    /// Fresh entry for `key`, ignoring stale ones
    pub fn get_fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .filter(|cached| !cached.is_stale())
            .map(|cached| cached.data)
    }

    pub fn invalidate(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if !entries.is_empty() {
            debug!(count = entries.len(), "Clearing query cache");
        }
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
