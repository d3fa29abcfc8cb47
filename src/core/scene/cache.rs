/// One tracked backgrounded-or-recently-foreground app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreezeEntry {
    pub package: String,
    /// When the app most recently became foreground (or was unfrozen).
    pub start_time_ms: u64,
    /// When the app left foreground; `None` while it is foreground.
    pub leave_time_ms: Option<u64>,
}

/// Insertion-ordered cache of apps pending freeze.
///
/// Every touch (entering or leaving foreground) moves the entry to the
/// tail, so eviction order is FIFO on most-recent transition: an app that
/// briefly surfaced and left again outlives one sitting untouched at the
/// head. Bookkeeping only; the engine turns returned evictions into freeze
/// jobs.
#[derive(Debug, Default)]
pub struct FreezeCache {
    entries: Vec<FreezeEntry>,
}

impl FreezeCache {
    /// The app became foreground: fresh start time, no leave time. A
    /// foreground entry is exempt from time-based eviction.
    pub fn record_foreground(&mut self, package: &str, now_ms: u64) {
        self.remove(package);
        self.entries.push(FreezeEntry {
            package: package.to_string(),
            start_time_ms: now_ms,
            leave_time_ms: None,
        });
    }

    /// The app left foreground: stamp the leave time, keep the start time
    /// it entered with.
    pub fn record_background(&mut self, package: &str, now_ms: u64) {
        let start = self
            .remove(package)
            .map(|e| e.start_time_ms)
            .unwrap_or_default();
        self.entries.push(FreezeEntry {
            package: package.to_string(),
            start_time_ms: start,
            leave_time_ms: Some(now_ms),
        });
    }

    /// Pop oldest-touched entries until the cache fits the limit.
    /// A limit <= 0 disables the bound.
    pub fn enforce_count_limit(&mut self, limit: i32) -> Vec<FreezeEntry> {
        let mut evicted = Vec::new();
        if limit <= 0 {
            return evicted;
        }
        while self.entries.len() > limit as usize {
            evicted.push(self.entries.remove(0));
        }
        evicted
    }

    /// Evict every entry whose leave time is older than the TTL, except the
    /// currently-foreground package. A TTL <= 0 disables the policy.
    pub fn enforce_time_limit(
        &mut self,
        now_ms: u64,
        ttl_ms: i64,
        foreground: &str,
    ) -> Vec<FreezeEntry> {
        let mut evicted = Vec::new();
        if ttl_ms <= 0 {
            return evicted;
        }
        let ttl = ttl_ms as u64;
        self.entries.retain(|e| {
            let expired = e
                .leave_time_ms
                .is_some_and(|left| now_ms.saturating_sub(left) > ttl)
                && e.package != foreground;
            if expired {
                evicted.push(e.clone());
            }
            !expired
        });
        evicted
    }

    pub fn remove(&mut self, package: &str) -> Option<FreezeEntry> {
        let idx = self.entries.iter().position(|e| e.package == package)?;
        Some(self.entries.remove(idx))
    }

    pub fn drain_all(&mut self) -> Vec<FreezeEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn packages(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.package.clone()).collect()
    }
}
