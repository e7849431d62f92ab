#![forbid(unsafe_code)]

use progbuf_events::BufferEvent;
use progbuf_storage::StorageError;
use thiserror::Error;

use crate::Format;

/// Element-level errors posted on the bus.
///
/// Protocol violations reject the offending event; fatal ones additionally
/// stop dataflow with [`FlowError::Error`](crate::FlowError::Error).
#[derive(Debug, Error)]
pub enum ElementError {
    #[error("segment format {0:?} is not bytes")]
    NonByteSegment(Format),

    #[error("empty segment: start {start}, stop {stop}")]
    EmptySegment { start: u64, stop: u64 },

    #[error("fragment segment has no stop")]
    UnboundedSegment,

    #[error("seek format {0:?} is not bytes")]
    NonByteSeek(Format),

    #[error("seeking to a stop position is not supported")]
    SeekStopUnsupported,

    #[error("only absolute seeks are supported")]
    RelativeSeek,

    #[error("data received before any segment")]
    DataBeforeSegment,

    #[error("cache error: {0}")]
    Cache(#[from] StorageError),

    #[error("failed to spawn {name} task: {source}")]
    TaskSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl ElementError {
    /// Whether the error stops dataflow (as opposed to a warning).
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::NonByteSeek(_) | Self::SeekStopUnsupported | Self::RelativeSeek
        )
    }

    /// Bus message describing this error.
    pub fn to_event(&self) -> BufferEvent {
        BufferEvent::Error {
            error: self.to_string(),
            recoverable: !self.is_fatal(),
        }
    }
}
