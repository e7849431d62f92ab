#![forbid(unsafe_code)]

use std::{fmt, ops::Range};

use bytes::Bytes;
use rangemap::RangeSet;

use crate::{StorageError, StorageResult};

/// Sizing policy shared by every cache implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheOptions {
    /// Unread bytes required before [`ByteCache::has_enough_data`] reports `true`.
    pub min_read: usize,
    /// Largest unit returned by [`ByteCache::read_next`].
    pub max_read: usize,
    /// Hard limit on the write cursor. `None` means unbounded.
    pub capacity: Option<u64>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            min_read: 4096,
            max_read: 64 * 1024,
            capacity: None,
        }
    }
}

impl CacheOptions {
    #[must_use]
    pub fn with_min_read(mut self, min_read: usize) -> Self {
        self.min_read = min_read;
        self
    }

    #[must_use]
    pub fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read.max(1);
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// Append/read byte store with independent write and read cursors.
///
/// Positions are cache-relative (the first byte ever written sits at 0 unless
/// the write cursor was moved). A cache is owned by exactly one element and is
/// only touched while that element's lock is held, so methods take `&mut self`
/// and implementations need no interior synchronization.
pub trait ByteCache: Send + fmt::Debug {
    /// Append `data` at the write cursor and advance it.
    fn write(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Read the next unit starting at the read cursor and advance it.
    ///
    /// Returns the bytes together with the new read position. When nothing is
    /// unread the returned bytes are empty.
    fn read_next(&mut self) -> StorageResult<(Bytes, u64)>;

    /// Move the read cursor to `position` and read exactly `len` bytes.
    ///
    /// Fails with [`StorageError::Unavailable`] when any part of the range was
    /// never written.
    fn read_at(&mut self, position: u64, len: usize) -> StorageResult<Bytes>;

    fn set_write_position(&mut self, position: u64);

    fn set_read_position(&mut self, position: u64);

    /// Whether enough unread data is buffered to hand out a unit without
    /// starving downstream with tiny reads.
    fn has_enough_data(&self) -> bool;

    fn write_position(&self) -> u64;

    fn read_position(&self) -> u64;

    /// Bytes between the read and the write cursor.
    fn unread(&self) -> u64 {
        self.write_position().saturating_sub(self.read_position())
    }
}

/// Allocates fresh caches for elements.
///
/// Called whenever an element starts a new logical segment. Allocation may
/// fail (e.g. no temp directory); elements treat that as fatal.
pub trait CacheFactory: Send + Sync + fmt::Debug {
    fn create(&self) -> StorageResult<Box<dyn ByteCache>>;
}

/// Cursor and written-region bookkeeping shared by the concrete caches.
#[derive(Debug, Clone)]
pub(crate) struct Cursors {
    pub(crate) available: RangeSet<u64>,
    pub(crate) write_pos: u64,
    pub(crate) read_pos: u64,
    pub(crate) options: CacheOptions,
}

impl Cursors {
    pub(crate) fn new(options: CacheOptions) -> Self {
        Self {
            available: RangeSet::new(),
            write_pos: 0,
            read_pos: 0,
            options,
        }
    }

    /// Range a write of `len` bytes would cover, checked against capacity.
    pub(crate) fn plan_write(&self, len: usize) -> StorageResult<Range<u64>> {
        let start = self.write_pos;
        let end = start
            .checked_add(len as u64)
            .ok_or(StorageError::InvalidRange {
                start,
                end: u64::MAX,
            })?;
        match self.options.capacity {
            Some(capacity) if end > capacity => Err(StorageError::CapacityExceeded { capacity }),
            _ => Ok(start..end),
        }
    }

    pub(crate) fn commit_write(&mut self, range: Range<u64>) {
        if !range.is_empty() {
            self.available.insert(range.clone());
        }
        self.write_pos = range.end;
    }

    /// Range the next `read_next` call should return.
    pub(crate) fn plan_next(&self) -> Range<u64> {
        let unread = self.write_pos.saturating_sub(self.read_pos);
        let len = unread.min(self.options.max_read as u64);
        self.read_pos..self.read_pos + len
    }

    pub(crate) fn check_available(&self, position: u64, len: usize) -> StorageResult<Range<u64>> {
        let end = position
            .checked_add(len as u64)
            .ok_or(StorageError::InvalidRange {
                start: position,
                end: u64::MAX,
            })?;
        let range = position..end;
        if !range.is_empty() && self.available.gaps(&range).next().is_some() {
            return Err(StorageError::Unavailable {
                start: position,
                end,
            });
        }
        Ok(range)
    }

    pub(crate) fn has_enough_data(&self) -> bool {
        self.write_pos.saturating_sub(self.read_pos) >= self.options.min_read.max(1) as u64
    }
}
