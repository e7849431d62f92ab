#![forbid(unsafe_code)]

//! # progbuf
//!
//! Facade crate for the progressive-download and HLS buffering elements.
//!
//! ## Quick start
//!
//! ```ignore
//! use progbuf::prelude::*;
//!
//! let buffer = ProgressiveBuffer::new(ProgressiveConfig::default(), demuxer, http_source);
//! let mut messages = buffer.bus().subscribe();
//! buffer.activate_push()?;
//!
//! buffer.sink_event(StreamEvent::NewSegment(SegmentEvent::bytes(0, Some(total))));
//! buffer.chain(Buffer::new(chunk))?;
//! ```

// ── Re-export sub-crates ────────────────────────────────────────────────

pub mod events {
    pub use progbuf_events::*;
}

pub mod pipeline {
    pub use progbuf_pipeline::*;
}

pub mod storage {
    pub use progbuf_storage::*;
}

#[cfg(feature = "progressive")]
pub mod progressive {
    pub use progbuf_progressive::*;
}

#[cfg(feature = "hls")]
pub mod hls {
    pub use progbuf_hls::*;
}

// ── Prelude ─────────────────────────────────────────────────────────────

pub mod prelude {
    pub use progbuf_events::{BufferEvent, Event, EventBus, HlsEvent};
    #[cfg(feature = "hls")]
    pub use progbuf_hls::{HlsBuffer, HlsConfig};
    pub use progbuf_pipeline::{
        Buffer, Downstream, ElementError, FlowError, FlowResult, RangeOutcome, SeekEvent,
        SegmentEvent, StreamEvent, Upstream,
    };
    #[cfg(feature = "progressive")]
    pub use progbuf_progressive::{ProgressiveBuffer, ProgressiveConfig};
    pub use progbuf_storage::{
        ByteCache, CacheFactory, CacheOptions, FileCacheFactory, MemoryCacheFactory,
    };
}
