#![forbid(unsafe_code)]

use crate::{BufferEvent, HlsEvent};

/// Unified bus message.
///
/// Hierarchical: each element family has its own variant with a sub-enum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Message shared by both buffering elements.
    Buffer(BufferEvent),
    /// HLS slot-ring message.
    Hls(HlsEvent),
}

impl From<BufferEvent> for Event {
    fn from(e: BufferEvent) -> Self {
        Self::Buffer(e)
    }
}

impl From<HlsEvent> for Event {
    fn from(e: HlsEvent) -> Self {
        Self::Hls(e)
    }
}
