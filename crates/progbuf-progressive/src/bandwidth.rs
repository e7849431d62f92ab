#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

/// Windowed download-rate estimate in bytes per second.
///
/// Bytes are accumulated into a sample until more than [`Self::WINDOW`] has
/// elapsed, then the sample rate is averaged into the running estimate. The
/// estimate trails reality and is only meant for the seek/prebuffer
/// heuristics.
#[derive(Debug, Clone, Default)]
pub struct BandwidthMeter {
    subtotal_bytes: u64,
    timer_start: Option<Instant>,
    bandwidth: f64,
}

impl BandwidthMeter {
    pub const WINDOW: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        Self::default()
    }

    /// Current estimate, `0.0` until the first window completes.
    pub fn estimate(&self) -> f64 {
        self.bandwidth
    }

    pub fn record(&mut self, bytes: u64) {
        self.record_at(bytes, Instant::now());
    }

    pub fn record_at(&mut self, bytes: u64, now: Instant) {
        let start = *self.timer_start.get_or_insert(now);
        self.subtotal_bytes = self.subtotal_bytes.saturating_add(bytes);

        let elapsed = now.saturating_duration_since(start);
        if elapsed < Self::WINDOW {
            return;
        }

        let sample = self.subtotal_bytes as f64 / elapsed.as_secs_f64();
        self.bandwidth = if self.bandwidth > 0.0 {
            (self.bandwidth + sample) / 2.0
        } else {
            sample
        };
        self.subtotal_bytes = 0;
        self.timer_start = Some(now);
    }

    /// Restart the sampling window, keeping the estimate.
    ///
    /// Used when the download restarts at another offset so the idle gap
    /// doesn't drag the next sample down.
    pub fn restart_window(&mut self) {
        self.subtotal_bytes = 0;
        self.timer_start = None;
    }

    /// Bytes expected to arrive within `secs` seconds.
    pub fn bytes_within(&self, secs: f64) -> u64 {
        (self.bandwidth * secs.max(0.0)) as u64
    }
}
