/// Replay protection for proof tokens
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Remembers consumed token ids until they could no longer pass the
/// freshness check. Created empty at server start; nothing is persisted.
#[derive(Debug)]
pub struct ReplayGuard {
    window_secs: i64,
    seen: Mutex<HashMap<String, i64>>,
}

impl ReplayGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window_secs: i64::try_from(window.as_secs()).unwrap_or(i64::MAX),
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record `unique_id` as consumed. Returns false if it was already seen.
    ///
    /// The existence check and the insertion happen under one lock, so two
    /// sessions racing on the same id cannot both win. Expired records are
    /// purged on every call.
    pub fn check_and_insert(&self, unique_id: &str, issued_at: i64, now: i64) -> bool {
        // A poisoned map is still a valid map.
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());

        seen.retain(|_, expiry| *expiry >= now);

        if seen.contains_key(unique_id) {
            return false;
        }

        let expiry = issued_at.saturating_add(self.window_secs).max(now);
        seen.insert(unique_id.to_string(), expiry);
        true
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
