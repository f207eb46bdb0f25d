//! Metadata synchronization engine
//!
//! The write-through updater handles operator edits; the reconciliation jobs
//! repair drift in bulk, one direction at a time.

pub mod reconcile;
pub mod updater;

use serde::{Deserialize, Serialize};

pub use reconcile::{pull, push};
pub use updater::{apply_edit, UpdateOutcome, UpdatedRow};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Push: cache rows out to the authoritative store.
    ToExternal,
    /// Pull: authoritative attributes back into the cache.
    FromExternal,
}

/// Aggregate result of one reconciliation pass. Transient; returned straight
/// to the caller, never persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReconciliationOutcome {
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

impl ReconciliationOutcome {
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    /// Error strings are `"<kind> <productId>: <message>"` so a caller can
    /// pick out the failed subset for a follow-up pass.
    pub fn record_failure(&mut self, kind: &str, product_id: &str, message: impl AsRef<str>) {
        self.failed += 1;
        self.errors
            .push(format!("{kind} {product_id}: {}", message.as_ref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_deserializes_from_query_values() {
        let d: SyncDirection = serde_json::from_str("\"to_external\"").unwrap();
        assert_eq!(d, SyncDirection::ToExternal);
        let d: SyncDirection = serde_json::from_str("\"from_external\"").unwrap();
        assert_eq!(d, SyncDirection::FromExternal);
    }

    #[test]
    fn test_failure_formatting() {
        let mut outcome = ReconciliationOutcome::default();
        outcome.record_failure("stone", "gid://shopify/Product/9", "boom");
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.errors, vec!["stone gid://shopify/Product/9: boom"]);
    }
}
