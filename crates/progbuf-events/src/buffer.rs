#![forbid(unsafe_code)]

/// Messages shared by the progressive and HLS buffering elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent {
    /// Download progress inside the current byte segment.
    ///
    /// `position` is the high-water mark of written bytes. `stop` is `None`
    /// while the stream length is unknown. Once `eos` is set no more progress
    /// messages follow for this segment.
    BufferingProgress {
        start: u64,
        position: u64,
        stop: Option<u64>,
        eos: bool,
    },
    /// A consumer asked for data that has not arrived yet.
    Underrun,
    /// An outstanding pull range is now buffered; the consumer may retry.
    RangeReady { start: u64, stop: u64 },
    /// Element-level error. `recoverable` errors are warnings.
    Error { error: String, recoverable: bool },
}
