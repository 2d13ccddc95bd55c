//! In-memory rate limit store for tests and single-process deployments.
//!
//! Per-key state sits behind its own mutex inside a sharded map, so checks
//! on different keys never contend. State is lost on restart and is not
//! shared between processes.
//!
//! Keys idle for longer than their algorithm's `idle_ttl` are swept every
//! `sweep_every` new keys, mirroring the expiry the Redis store sets.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::adapters::clock::SystemClock;
use crate::domain::rate_limit::{QuotaDecision, QuotaState, RateLimitAlgorithm};
use crate::ports::{Clock, RateLimitStore, StoreError};

/// Process-local `RateLimitStore`.
///
/// Time is measured in seconds since the store was created, so fixed
/// windows are aligned to the store's start rather than the Unix epoch.
#[derive(Debug)]
pub struct InMemoryRateLimitStore {
    entries: DashMap<String, Arc<Mutex<Entry>>>,
    clock: Arc<dyn Clock>,
    origin: Instant,
    inserted: AtomicU64,
    sweep_every: u64,
}

#[derive(Debug)]
struct Entry {
    state: QuotaState,
    /// Store seconds of the last update.
    touched: f64,
    idle_ttl: f64,
}

impl Entry {
    fn is_idle(&self, now: f64) -> bool {
        now - self.touched >= self.idle_ttl
    }
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub const DEFAULT_SWEEP_EVERY: u64 = 1024;

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let origin = clock.now();
        Self {
            entries: DashMap::new(),
            clock,
            origin,
            inserted: AtomicU64::new(0),
            sweep_every: Self::DEFAULT_SWEEP_EVERY,
        }
    }

    /// Runs the idle sweep after every `n` new keys. Zero disables it.
    pub fn with_sweep_every(mut self, n: u64) -> Self {
        self.sweep_every = n;
        self
    }

    /// Drops keys whose quota has been idle past its ttl.
    ///
    /// Keys locked by an in-flight check are kept. Returns how many keys
    /// were removed.
    pub fn evict_idle(&self) -> usize {
        let now = self.now_secs();
        let before = self.entries.len();
        self.entries.retain(|_, entry| match entry.try_lock() {
            Ok(entry) => !entry.is_idle(now),
            Err(_) => true,
        });
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.entries.len(), "Evicted idle rate limit keys");
        }
        evicted
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every key.
    pub fn clear_all(&self) {
        self.entries.clear();
    }

    fn now_secs(&self) -> f64 {
        self.clock
            .now()
            .saturating_duration_since(self.origin)
            .as_secs_f64()
    }

    fn entry(&self, key: &str, algorithm: &RateLimitAlgorithm, now: f64) -> Arc<Mutex<Entry>> {
        if let Some(existing) = self.entries.get(key) {
            return existing.clone();
        }
        let mut created = false;
        // Clone the Arc out so the shard lock is released before locking the key.
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(Mutex::new(Entry {
                    state: QuotaState::fresh(algorithm, now),
                    touched: now,
                    idle_ttl: algorithm.idle_ttl().as_secs_f64(),
                }))
            })
            .clone();
        if created && self.sweep_every > 0 {
            let inserted = self.inserted.fetch_add(1, Ordering::Relaxed) + 1;
            if inserted % self.sweep_every == 0 {
                self.evict_idle();
            }
        }
        entry
    }
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn get_and_update(
        &self,
        key: &str,
        algorithm: &RateLimitAlgorithm,
        cost: u32,
    ) -> Result<QuotaDecision, StoreError> {
        let now = self.now_secs();
        let entry = self.entry(key, algorithm, now);
        let mut entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        entry.touched = now;
        entry.idle_ttl = algorithm.idle_ttl().as_secs_f64();
        Ok(algorithm.evaluate(&mut entry.state, now, cost))
    }

    async fn peek(
        &self,
        key: &str,
        algorithm: &RateLimitAlgorithm,
    ) -> Result<QuotaDecision, StoreError> {
        let now = self.now_secs();
        let decision = match self.entries.get(key).map(|entry| entry.clone()) {
            Some(entry) => {
                let entry = entry.lock().unwrap_or_else(|e| e.into_inner());
                algorithm.peek(&entry.state, now)
            }
            None => algorithm.peek(&QuotaState::fresh(algorithm, now), now),
        };
        Ok(decision)
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
