//! Hub configuration

/// Broadcast hub options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Events each subscriber may have queued before the oldest is dropped
    pub queue_capacity: usize,

    /// Seed new subscribers with the cached frame set
    pub snapshot_on_subscribe: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            snapshot_on_subscribe: true,
        }
    }
}

impl HubConfig {
    /// Set per-subscriber queue capacity (minimum 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Enable or disable the late-join snapshot
    pub fn snapshot_on_subscribe(mut self, enabled: bool) -> Self {
        self.snapshot_on_subscribe = enabled;
        self
    }
}
