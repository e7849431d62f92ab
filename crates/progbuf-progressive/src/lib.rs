#![forbid(unsafe_code)]

//! Progressive-download buffering element.
//!
//! Sits between a network source and a demuxer. Downloaded bytes land in one
//! growing cache per segment; the element either pushes them downstream from
//! its own delivery task or serves random-access reads in pull mode, and
//! posts buffering progress, underrun and range-ready messages on the bus.
//!
//! Seeks that land inside (or just past) the downloaded data are served from
//! the cache without touching the network.

mod bandwidth;
mod config;
mod delivery;
mod element;
mod range;
mod state;

pub use bandwidth::BandwidthMeter;
pub use config::ProgressiveConfig;
pub use element::ProgressiveBuffer;
pub use range::RangeRequest;
pub use state::{Activation, DeliveryMode};
