#![forbid(unsafe_code)]

/// Union of the byte extents of all outstanding pull requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeRequest {
    pub range_start: Option<u64>,
    pub range_stop: Option<u64>,
}

impl RangeRequest {
    /// Grow the request to also cover `[start, stop)`.
    pub fn extend(&mut self, start: u64, stop: u64) {
        self.range_start = Some(self.range_start.map_or(start, |s| s.min(start)));
        self.range_stop = Some(self.range_stop.map_or(stop, |s| s.max(stop)));
    }

    pub fn bounds(&self) -> Option<(u64, u64)> {
        self.range_start.zip(self.range_stop)
    }

    pub fn is_pending(&self) -> bool {
        self.bounds().is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
