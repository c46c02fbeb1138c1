use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Event;

pub const TAXONOMY_CACHE_KEY: &str = "taxonomy_cache";
pub const RATINGS_KEY: &str = "event_ratings";
pub const DEFAULT_TTL_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("encode error: {0}")]
    Encode(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Storage(err.to_string())
    }
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
    fn remove(&self, key: &str) -> Result<(), CacheError>;
    fn clear(&self) -> Result<(), CacheError>;
}

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, CacheError> {
        self.data
            .lock()
            .map_err(|_| CacheError::Storage("memory store mutex poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.lock()?.clear();
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    stored_at: DateTime<Utc>,
    value: serde_json::Value,
}

/// Time-invalidated cache on top of a [`KeyValueStore`]. Entries are never
/// evicted explicitly; a stale entry is just ignored and later overwritten.
#[derive(Clone)]
pub struct TtlCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, "cache read failed: {err}");
                return None;
            }
        };
        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(key, "discarding unreadable cache entry: {err}");
                return None;
            }
        };
        let age = now.signed_duration_since(envelope.stored_at);
        if age > self.ttl || age < Duration::zero() {
            debug!(key, age_secs = age.num_seconds(), "cache entry expired");
            return None;
        }
        match serde_json::from_value(envelope.value) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, "cache entry has unexpected shape: {err}");
                None
            }
        }
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        self.put_at(key, value, Utc::now())
    }

    pub fn put_at<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let envelope = Envelope {
            stored_at: now,
            value: serde_json::to_value(value).map_err(|err| CacheError::Encode(err.to_string()))?,
        };
        let raw =
            serde_json::to_string(&envelope).map_err(|err| CacheError::Encode(err.to_string()))?;
        self.store.set(key, &raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Liked,
    Disliked,
}

/// Swipe decisions keyed by event id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingBook {
    ratings: BTreeMap<String, Rating>,
}

impl RatingBook {
    /// Reads the stored ratings; missing or corrupted data yields an empty book.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let raw = match store.get(RATINGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::default(),
            Err(err) => {
                warn!("rating storage unreadable: {err}");
                return Self::default();
            }
        };
        match serde_json::from_str::<BTreeMap<String, Rating>>(&raw) {
            Ok(ratings) => Self { ratings },
            Err(err) => {
                warn!("rating storage corrupted, starting empty: {err}");
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), CacheError> {
        let raw = serde_json::to_string(&self.ratings)
            .map_err(|err| CacheError::Encode(err.to_string()))?;
        store.set(RATINGS_KEY, &raw)
    }

    pub fn rate(&mut self, event_id: &str, rating: Rating) {
        self.ratings.insert(event_id.to_string(), rating);
    }

    pub fn get(&self, event_id: &str) -> Option<Rating> {
        self.ratings.get(event_id).copied()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn liked_ids(&self) -> impl Iterator<Item = &str> {
        self.ratings
            .iter()
            .filter(|(_, rating)| **rating == Rating::Liked)
            .map(|(id, _)| id.as_str())
    }

    /// Events the user has not swiped yet, in input order.
    pub fn unrated<'a>(&self, events: &'a [Event]) -> Vec<&'a Event> {
        events
            .iter()
            .filter(|event| !self.ratings.contains_key(&event.id))
            .collect()
    }
}
