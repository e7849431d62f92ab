#![forbid(unsafe_code)]

use crate::SegmentEvent;

/// Unit in which segment and seek positions are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Bytes,
    Time,
    Default,
}

/// A contiguous byte range of the logical stream being buffered.
///
/// `last_stop` is the high-water mark of bytes actually written. Invariant:
/// `start <= last_stop <= stop` whenever `stop` is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub stop: Option<u64>,
    pub last_stop: u64,
}

impl Segment {
    pub fn new(start: u64, stop: Option<u64>) -> Self {
        Self {
            start,
            stop,
            last_stop: start,
        }
    }

    pub fn from_event(event: &SegmentEvent) -> Self {
        Self::new(event.start, event.stop)
    }

    /// Declared length, if the stop is known.
    pub fn len(&self) -> Option<u64> {
        self.stop.map(|stop| stop.saturating_sub(self.start))
    }

    /// Whether `[offset, offset + len)` is already written.
    pub fn is_buffered(&self, offset: u64, len: u64) -> bool {
        offset >= self.start && offset.saturating_add(len) <= self.last_stop
    }

    /// Whether `offset` lies at or beyond the declared stop.
    pub fn is_past_stop(&self, offset: u64) -> bool {
        self.stop.is_some_and(|stop| offset >= stop)
    }

    /// Whether `offset` is inside `[start, last_stop]`.
    pub fn covers(&self, offset: u64) -> bool {
        offset >= self.start && offset <= self.last_stop
    }

    /// Cache-relative position of an absolute stream offset.
    pub fn cache_position(&self, offset: u64) -> u64 {
        offset.saturating_sub(self.start)
    }

    /// Record `len` more written bytes.
    ///
    /// Returns `true` if the write ran past the declared stop, in which case
    /// the stop is moved up to keep the invariant.
    pub fn advance(&mut self, len: u64) -> bool {
        self.last_stop += len;
        match self.stop {
            Some(stop) if stop < self.last_stop => {
                self.stop = Some(self.last_stop);
                true
            }
            _ => false,
        }
    }

    /// Shrink (or fix) the stop to what actually arrived.
    pub fn clamp_to_last_stop(&mut self) {
        if self.stop.is_none_or(|stop| stop > self.last_stop) {
            self.stop = Some(self.last_stop);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stop.is_some_and(|stop| self.last_stop >= stop)
    }
}
