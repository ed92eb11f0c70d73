//! Short-lived server-side store for setup submissions awaiting the master
//! selection. The client only ever sees an opaque key.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::request::SetupRequest;

struct Pending {
    channel_id: String,
    setup: SetupRequest,
    created: Instant,
}

pub struct SessionStore {
    ttl: Duration,
    pending: Mutex<HashMap<String, Pending>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the map, recovering from poison; entries are plain values.
    fn pending(&self) -> MutexGuard<'_, HashMap<String, Pending>> {
        self.pending.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("⚠️ Setup session lock was poisoned; recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Park a setup for `channel_id`; returns its key.
    pub fn insert(&self, channel_id: &str, setup: SetupRequest) -> String {
        let key = uuid::Uuid::new_v4().to_string();
        let mut pending = self.pending();
        let ttl = self.ttl;
        pending.retain(|_, p| p.created.elapsed() < ttl);
        pending.insert(
            key.clone(),
            Pending {
                channel_id: channel_id.to_string(),
                setup,
                created: Instant::now(),
            },
        );
        key
    }

    /// The setup parked under `key`, if it is still fresh and belongs to
    /// `channel_id`.
    pub fn get(&self, key: &str, channel_id: &str) -> Option<SetupRequest> {
        self.pending()
            .get(key)
            .filter(|p| p.channel_id == channel_id && p.created.elapsed() < self.ttl)
            .map(|p| p.setup.clone())
    }

    pub fn remove(&self, key: &str) {
        self.pending().remove(key);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending().len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrumbot_core::types::DaySet;
    use std::sync::Arc;

    fn setup() -> SetupRequest {
        SetupRequest {
            timezone_name: "UTC".into(),
            hour: 9,
            minute: 0,
            days_of_week: DaySet::Weekday,
        }
    }

    #[test]
    fn test_insert_get_remove() {
        let store = SessionStore::new(Duration::from_secs(60));
        let key = store.insert("c1", setup());
        assert_eq!(store.get(&key, "c1"), Some(setup()));
        // Keys are bound to their channel.
        assert_eq!(store.get(&key, "c2"), None);
        store.remove(&key);
        assert!(store.get(&key, "c1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_expired_sessions_are_invisible_and_evicted() {
        let store = SessionStore::new(Duration::ZERO);
        let key = store.insert("c1", setup());
        assert!(store.get(&key, "c1").is_none());
        store.insert("c1", setup());
        // The first one was evicted on the second insert.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sessions_survive_a_poisoned_lock() {
        let store = Arc::new(SessionStore::new(Duration::from_secs(60)));
        let before = store.insert("c1", setup());

        let holder = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.pending.lock().unwrap();
            panic!("panic while holding the session lock");
        })
        .join();
        assert!(store.pending.is_poisoned());

        // Existing and new keys both resolve.
        assert_eq!(store.get(&before, "c1"), Some(setup()));
        let after = store.insert("c1", setup());
        assert_eq!(store.get(&after, "c1"), Some(setup()));
        assert_eq!(store.len(), 2);
    }
}
