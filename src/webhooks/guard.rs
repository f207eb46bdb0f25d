//! Webhook delivery deduplication
//!
//! Best-effort and process-local: a crash or a second instance can both
//! reprocess a delivery, so every handler downstream must stay naturally
//! idempotent. The trait boundary lets a shared TTL store replace the
//! in-memory map for multi-instance deployments without touching call sites.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// TTL-bounded dedup of webhook delivery identifiers.
pub trait IdempotencyGuard: Send + Sync {
    /// True only if the delivery id was marked within the TTL window.
    fn seen(&self, delivery_id: &str) -> bool;
    fn mark_seen(&self, delivery_id: &str);
}

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// In-process implementation backed by a mutex-guarded map of delivery id to
/// receipt instant.
pub struct InMemoryGuard {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, Instant>>,
}

impl InMemoryGuard {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for InMemoryGuard {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}

impl IdempotencyGuard for InMemoryGuard {
    fn seen(&self, delivery_id: &str) -> bool {
        let mut entries = self.lock();
        match entries.get(delivery_id) {
            Some(received_at) if received_at.elapsed() < self.ttl => true,
            Some(_) => {
                // Expired entries count as unseen and may be reprocessed.
                entries.remove(delivery_id);
                false
            }
            None => false,
        }
    }

    fn mark_seen(&self, delivery_id: &str) {
        let mut entries = self.lock();
        if entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, received_at| received_at.elapsed() < ttl);
        }
        entries.insert(delivery_id.to_string(), Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_then_seen() {
        let guard = InMemoryGuard::default();
        assert!(!guard.seen("delivery-1"));
        guard.mark_seen("delivery-1");
        assert!(guard.seen("delivery-1"));
        assert!(!guard.seen("delivery-2"));
    }

    #[test]
    fn test_expired_entries_count_as_unseen() {
        let guard = InMemoryGuard::new(Duration::from_millis(10), 100);
        guard.mark_seen("delivery-1");
        std::thread::sleep(Duration::from_millis(20));
        assert!(!guard.seen("delivery-1"));
    }

    #[test]
    fn test_compaction_drops_expired_entries() {
        let guard = InMemoryGuard::new(Duration::from_millis(20), 4);
        for i in 0..4 {
            guard.mark_seen(&format!("delivery-{i}"));
        }
        std::thread::sleep(Duration::from_millis(30));
        // Exceeding the threshold compacts everything past the TTL.
        guard.mark_seen("delivery-fresh");
        assert_eq!(guard.lock().len(), 1);
        assert!(guard.seen("delivery-fresh"));
    }

    #[test]
    fn test_fresh_entries_survive_compaction() {
        let guard = InMemoryGuard::new(Duration::from_secs(60), 2);
        guard.mark_seen("delivery-1");
        guard.mark_seen("delivery-2");
        guard.mark_seen("delivery-3");
        assert!(guard.seen("delivery-1"));
        assert!(guard.seen("delivery-3"));
    }
}
