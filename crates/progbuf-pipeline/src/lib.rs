#![forbid(unsafe_code)]

//! `progbuf-pipeline`
//!
//! The slice of a streaming media pipeline the buffering elements talk to:
//! - [`Buffer`] payloads and serialized [`StreamEvent`]s (new segment, EOS, flush, seek)
//! - [`FlowError`] / [`FlowResult`] — the flow-return contract between pads
//! - [`Downstream`] / [`Upstream`] pad traits
//! - [`Task`] — a pausable delivery thread

mod buffer;
mod error;
mod event;
mod flow;
mod pad;
mod segment;
mod task;

pub use buffer::Buffer;
pub use error::ElementError;
pub use event::{SeekEvent, SeekType, SegmentEvent, StreamEvent};
pub use flow::{FlowError, FlowResult, RangeOutcome};
pub use pad::{Downstream, Upstream};
pub use segment::{Format, Segment};
pub use task::{Task, TaskControl, TaskState};
