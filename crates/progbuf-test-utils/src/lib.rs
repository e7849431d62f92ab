#![forbid(unsafe_code)]

//! Shared test utilities for the progbuf workspace.

pub mod bus;
pub mod fixtures;
pub mod pads;

pub use bus::BusProbe;
pub use fixtures::*;
pub use pads::{RecordingSink, RecordingSource};
