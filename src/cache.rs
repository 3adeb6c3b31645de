use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

use crate::analytics::TrendMode;
use crate::insights::{Candidate, DashboardPayload};

/// Map whose entries expire `ttl` after insertion.
///
/// Time is passed in by the caller. Expired entries are evicted on read.
#[derive(Debug)]
pub struct TtlMap<K, V> {
    ttl: Duration,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash, V: Clone> TtlMap<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Live value for `key`. An entry read exactly `ttl` after insertion is still live.
    pub fn get(&mut self, key: &K, now: Instant) -> Option<V> {
        let (stored_at, value) = self.entries.get(key)?;
        if now.saturating_duration_since(*stored_at) > self.ttl {
            self.entries.remove(key);
            return None;
        }
        Some(value.clone())
    }

    pub fn insert(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(key, (now, value));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub mode: TrendMode,
    pub window_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DashboardKey {
    pub project_id: String,
    pub mode: TrendMode,
    pub window_days: u32,
    pub include_network: bool,
}

struct Tiers {
    search: TtlMap<SearchKey, Arc<Vec<Candidate>>>,
    dashboard: TtlMap<DashboardKey, Arc<DashboardPayload>>,
}

type Clock = Box<dyn Fn() -> Instant + Send + Sync>;

/// Short-lived cache for search candidates and finished dashboard payloads.
///
/// Both tiers share one lock, held only for the duration of a map operation.
pub struct DashboardCache {
    tiers: Mutex<Tiers>,
    clock: Clock,
}

impl DashboardCache {
    pub fn new(search_ttl: Duration, dashboard_ttl: Duration) -> Self {
        Self::with_clock(search_ttl, dashboard_ttl, Instant::now)
    }

    pub fn with_clock(
        search_ttl: Duration,
        dashboard_ttl: Duration,
        clock: impl Fn() -> Instant + Send + Sync + 'static,
    ) -> Self {
        Self {
            tiers: Mutex::new(Tiers {
                search: TtlMap::new(search_ttl),
                dashboard: TtlMap::new(dashboard_ttl),
            }),
            clock: Box::new(clock),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tiers> {
        self.tiers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_search(&self, key: &SearchKey) -> Option<Arc<Vec<Candidate>>> {
        let now = (self.clock)();
        let hit = self.lock().search.get(key, now);
        if hit.is_some() {
            debug!("Search cache hit for {} / {}d", key.mode, key.window_days);
        }
        hit
    }

    pub fn put_search(&self, key: SearchKey, candidates: Arc<Vec<Candidate>>) {
        let now = (self.clock)();
        self.lock().search.insert(key, candidates, now);
    }

    pub fn get_dashboard(&self, key: &DashboardKey) -> Option<Arc<DashboardPayload>> {
        let now = (self.clock)();
        let hit = self.lock().dashboard.get(key, now);
        if hit.is_some() {
            debug!(
                "Dashboard cache hit for {} / {} / {}d / network={}",
                key.project_id, key.mode, key.window_days, key.include_network
            );
        }
        hit
    }

    pub fn put_dashboard(&self, key: DashboardKey, payload: Arc<DashboardPayload>) {
        let now = (self.clock)();
        self.lock().dashboard.insert(key, payload, now);
    }

    pub fn clear(&self) {
        let mut tiers = self.lock();
        tiers.search.clear();
        tiers.dashboard.clear();
    }

    /// Entry counts as `(search, dashboard)`.
    pub fn len(&self) -> (usize, usize) {
        let tiers = self.lock();
        (tiers.search.len(), tiers.dashboard.len())
    }
}
