#![forbid(unsafe_code)]

use crate::{Buffer, FlowResult, StreamEvent};

/// The consumer side an element pushes into (demuxer/decoder sink pad).
pub trait Downstream: Send + Sync {
    /// Push one buffer. Any `Err` stops normal dataflow on the element side.
    fn push(&self, buffer: Buffer) -> FlowResult;

    /// Deliver an event. Returns whether it was handled.
    fn push_event(&self, event: StreamEvent) -> bool;

    /// Called once when the element first has data to offer.
    ///
    /// Elements don't expose their source pad until something was written.
    fn expose(&self) {}
}

/// The producer side an element sends requests to (network source).
pub trait Upstream: Send + Sync {
    /// Deliver an upstream event (seek). Returns whether it was handled.
    fn push_event(&self, event: StreamEvent) -> bool;
}
