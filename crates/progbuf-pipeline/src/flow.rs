#![forbid(unsafe_code)]

use thiserror::Error;

use crate::Buffer;

/// Non-`Ok` flow returns.
///
/// Anything other than `Ok(())` means "stop the delivery task and propagate".
/// `Flushing` is cancellation, not a failure, and is never reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("flushing")]
    Flushing,

    #[error("not linked")]
    NotLinked,

    #[error("end of stream")]
    Eos,

    #[error("element error")]
    Error,
}

/// Flow return between pads.
pub type FlowResult<T = ()> = Result<T, FlowError>;

/// Successful outcome of a pull-mode range request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeOutcome {
    /// The requested bytes.
    Data(Buffer),
    /// Not buffered yet; the caller must retry later.
    Retry,
}
