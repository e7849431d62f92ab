#![forbid(unsafe_code)]

//! HLS buffering element.
//!
//! HLS delivers media as a sequence of bounded fragments, each addressed
//! from byte 0. [`HlsBuffer`] keeps a small ring of fragment caches
//! ([`SegmentCacheSet`]) so the player can drain one fragment while the
//! fetcher downloads the next ones. Backpressure is per fragment: starting
//! a fragment blocks while every slot is still busy.
//!
//! Status messages on the bus:
//! - [`HlsEvent::CacheFull`](progbuf_events::HlsEvent::CacheFull) when the fetcher has to wait
//! - [`HlsEvent::Resume`](progbuf_events::HlsEvent::Resume) when a fragment got its slot
//! - [`HlsEvent::CacheNotFull`](progbuf_events::HlsEvent::CacheNotFull) when a slot drained
//! - [`HlsEvent::EndOfStream`](progbuf_events::HlsEvent::EndOfStream) on EOS

mod config;
mod delivery;
mod element;
mod slots;
mod state;

pub use config::HlsConfig;
pub use element::HlsBuffer;
pub use slots::{CacheSlot, SEGMENT_SLOTS, SegmentCacheSet};
