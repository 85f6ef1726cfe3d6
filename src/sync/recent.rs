//! Recently-inspected-player lists for admin tooling.
//!
//! Each admin gets an independent, bounded, most-recent-first list of the
//! players they last looked at. Re-viewing a player moves the entry to the
//! front instead of duplicating it; the tail is evicted past the bound.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use uuid::Uuid;

/// Maximum entries retained per admin.
pub const RECENT_LOOKUP_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentLookupEntry {
    pub target: Uuid,
    pub target_name: String,
    /// Online status at record time, not kept current.
    pub online: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Process-lifetime cache of per-admin lookup history. Shared across
/// concurrent callers; mutation is atomic per record call.
#[derive(Debug, Default)]
pub struct RecentLookupCache {
    inner: RwLock<HashMap<Uuid, VecDeque<RecentLookupEntry>>>,
}

impl RecentLookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move-or-insert `target` at the front of `admin`'s list.
    pub fn record(&self, admin: Uuid, target: Uuid, target_name: &str, online: bool) {
        let mut map = self.inner.write().expect("recent lookup lock poisoned");
        let list = map.entry(admin).or_default();
        if let Some(pos) = list.iter().position(|e| e.target == target) {
            let _ = list.remove(pos);
        }
        list.push_front(RecentLookupEntry {
            target,
            target_name: target_name.to_string(),
            online,
            recorded_at: Utc::now(),
        });
        list.truncate(RECENT_LOOKUP_LIMIT);
    }

    /// Most-recent-first history for one admin.
    pub fn list(&self, admin: Uuid) -> Vec<RecentLookupEntry> {
        let map = self.inner.read().expect("recent lookup lock poisoned");
        map.get(&admin)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eleven_distinct_targets_leave_ten_entries() {
        let cache = RecentLookupCache::new();
        let admin = Uuid::new_v4();
        let targets: Vec<Uuid> = (0..11).map(|_| Uuid::new_v4()).collect();
        for (i, t) in targets.iter().enumerate() {
            cache.record(admin, *t, &format!("player{}", i), true);
        }

        let list = cache.list(admin);
        assert_eq!(list.len(), RECENT_LOOKUP_LIMIT);
        // most recent first, oldest (index 0) evicted
        assert_eq!(list[0].target, targets[10]);
        assert!(list.iter().all(|e| e.target != targets[0]));
    }

    #[test]
    fn repeat_lookup_moves_to_front_without_duplicating() {
        let cache = RecentLookupCache::new();
        let admin = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        cache.record(admin, a, "alice", true);
        cache.record(admin, b, "bob", false);
        cache.record(admin, a, "alice", false);

        let list = cache.list(admin);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].target, a);
        assert_eq!(list[1].target, b);
        // the re-record refreshed the stored status
        assert!(!list[0].online);
    }

    #[test]
    fn admin_lists_are_independent() {
        let cache = RecentLookupCache::new();
        let admin1 = Uuid::new_v4();
        let admin2 = Uuid::new_v4();
        let target = Uuid::new_v4();

        cache.record(admin1, target, "carol", true);
        assert_eq!(cache.list(admin1).len(), 1);
        assert!(cache.list(admin2).is_empty());
    }

    #[test]
    fn concurrent_records_for_one_admin_lose_nothing() {
        use std::sync::Arc;

        let cache = Arc::new(RecentLookupCache::new());
        let admin = Uuid::new_v4();
        let targets: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();

        let handles: Vec<_> = targets
            .iter()
            .map(|t| {
                let cache = Arc::clone(&cache);
                let target = *t;
                std::thread::spawn(move || {
                    cache.record(admin, target, "worker", true);
                })
            })
            .collect();
        for h in handles {
            h.join().expect("join");
        }

        let list = cache.list(admin);
        assert_eq!(list.len(), targets.len());
        for t in targets {
            assert!(list.iter().any(|e| e.target == t));
        }
    }
}
