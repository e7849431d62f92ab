use std::sync::Arc;

use progbuf_events::EventBus;
use progbuf_storage::{CacheFactory, MemoryCacheFactory};

/// Configuration for the progressive buffering element.
///
/// Used with `ProgressiveBuffer::new(config, downstream, upstream)`.
#[derive(Clone, Debug)]
pub struct ProgressiveConfig {
    /// Percent of the segment that must arrive between two buffering-progress
    /// messages.
    pub threshold: f64,
    /// Seconds of estimated bandwidth to accumulate past a pull request
    /// before declaring the range ready.
    pub prebuffer_time: f64,
    /// Seconds of estimated bandwidth a seek target may lie beyond the
    /// downloaded data and still be served from the cache.
    pub wait_tolerance: f64,
    /// Issue upstream seeks for pull requests outside the reachable window.
    pub speculative_seek: bool,
    /// Event bus channel capacity (used when `bus` is not provided).
    pub event_channel_capacity: usize,
    /// Event bus (optional - if not provided, one is created internally).
    pub bus: Option<EventBus>,
    /// Allocator for the segment cache.
    pub cache: Arc<dyn CacheFactory>,
}

impl Default for ProgressiveConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            prebuffer_time: 2.0,
            wait_tolerance: 2.0,
            speculative_seek: true,
            event_channel_capacity: 64,
            bus: None,
            cache: Arc::new(MemoryCacheFactory::default()),
        }
    }
}

impl ProgressiveConfig {
    #[must_use]
    pub fn with_threshold(mut self, percent: f64) -> Self {
        self.threshold = percent.clamp(0.0, 100.0);
        self
    }

    #[must_use]
    pub fn with_prebuffer_time(mut self, secs: f64) -> Self {
        self.prebuffer_time = secs.max(0.0);
        self
    }

    #[must_use]
    pub fn with_wait_tolerance(mut self, secs: f64) -> Self {
        self.wait_tolerance = secs.max(0.0);
        self
    }

    #[must_use]
    pub fn with_speculative_seek(mut self, enabled: bool) -> Self {
        self.speculative_seek = enabled;
        self
    }

    /// Set the event bus shared with the player controller.
    #[must_use]
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Set the cache allocator.
    #[must_use]
    pub fn with_cache<F: CacheFactory + 'static>(mut self, factory: F) -> Self {
        self.cache = Arc::new(factory);
        self
    }
}
