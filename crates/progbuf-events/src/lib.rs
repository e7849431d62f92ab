#![forbid(unsafe_code)]

//! Status message bus for the progbuf buffering elements.
//!
//! Elements post backpressure, underrun and progress messages here; an
//! application-level player controller subscribes and reacts.

mod buffer;
mod bus;
mod event;
mod hls;

pub use buffer::BufferEvent;
pub use bus::EventBus;
pub use event::Event;
pub use hls::HlsEvent;
