use std::sync::Arc;

use progbuf_events::EventBus;
use progbuf_storage::{CacheFactory, MemoryCacheFactory};

use crate::SEGMENT_SLOTS;

/// Configuration for the HLS buffering element.
#[derive(Clone, Debug)]
pub struct HlsConfig {
    /// Fragment slots in the ring. At least two, so one fragment can fill
    /// while another drains.
    pub slots: usize,
    /// Event bus channel capacity (used when `bus` is not provided).
    pub event_channel_capacity: usize,
    /// Event bus (optional - if not provided, one is created internally).
    pub bus: Option<EventBus>,
    /// Allocator for the fragment caches.
    pub cache: Arc<dyn CacheFactory>,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            slots: SEGMENT_SLOTS,
            event_channel_capacity: 64,
            bus: None,
            cache: Arc::new(MemoryCacheFactory::default()),
        }
    }
}

impl HlsConfig {
    #[must_use]
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots.max(2);
        self
    }

    /// Set the event bus shared with the fragment fetcher.
    #[must_use]
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Set the cache allocator.
    #[must_use]
    pub fn with_cache<F: CacheFactory + 'static>(mut self, factory: F) -> Self {
        self.cache = Arc::new(factory);
        self
    }
}
