#![forbid(unsafe_code)]

/// Slot-ring backpressure messages emitted by the HLS buffering element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HlsEvent {
    /// Every segment slot is still being drained; the fragment fetcher is
    /// blocked until one frees up.
    CacheFull,
    /// A slot finished draining.
    CacheNotFull,
    /// A slot was assigned to the next fragment; the fetcher may push it.
    Resume,
    /// The fragment being delivered ran out of data before its declared
    /// size. Posted once per starvation episode.
    Stall,
    /// End of stream observed on the producer side.
    EndOfStream,
}
