#![forbid(unsafe_code)]

use crate::Format;

/// How a seek boundary is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekType {
    /// Boundary not set.
    None,
    /// Absolute position.
    Set,
    /// Relative to the end of the stream.
    End,
}

/// Announces the range of the data that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentEvent {
    /// Continuation of the current segment rather than a new one.
    pub update: bool,
    pub format: Format,
    pub start: u64,
    pub stop: Option<u64>,
    pub position: u64,
}

impl SegmentEvent {
    /// Byte segment `[start, stop)`.
    pub fn bytes(start: u64, stop: Option<u64>) -> Self {
        Self {
            update: false,
            format: Format::Bytes,
            start,
            stop,
            position: start,
        }
    }

    #[must_use]
    pub fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}

/// Seek request travelling upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekEvent {
    pub format: Format,
    /// Flush the pipeline before seeking.
    pub flush: bool,
    pub start_type: SeekType,
    pub start: u64,
    pub stop_type: SeekType,
    pub stop: u64,
}

impl SeekEvent {
    /// Flushing absolute byte seek with no stop.
    pub fn bytes(start: u64) -> Self {
        Self {
            format: Format::Bytes,
            flush: true,
            start_type: SeekType::Set,
            start,
            stop_type: SeekType::None,
            stop: 0,
        }
    }

    #[must_use]
    pub fn with_flush(mut self, flush: bool) -> Self {
        self.flush = flush;
        self
    }

    #[must_use]
    pub fn with_stop(mut self, stop_type: SeekType, stop: u64) -> Self {
        self.stop_type = stop_type;
        self.stop = stop;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}

/// Events flowing alongside data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    NewSegment(SegmentEvent),
    Eos,
    FlushStart,
    FlushStop,
    Seek(SeekEvent),
    /// Anything the buffering elements don't interpret (tags, QoS, ...).
    Custom(String),
}
