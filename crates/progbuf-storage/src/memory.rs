#![forbid(unsafe_code)]

//! In-memory byte cache.
//!
//! `MemoryCache` keeps the whole segment in a growable `Vec<u8>` and tracks
//! written regions with a `RangeSet<u64>`, so random-access reads of bytes
//! that never arrived fail instead of returning zeros.

use bytes::Bytes;
use tracing::trace;

use crate::{
    ByteCache, CacheFactory, CacheOptions, StorageResult,
    cache::Cursors,
};

/// Vec-backed [`ByteCache`].
#[derive(Debug, Clone)]
pub struct MemoryCache {
    buf: Vec<u8>,
    cursors: Cursors,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CacheOptions::default())
    }
}

impl MemoryCache {
    /// Create a new empty cache.
    #[must_use]
    pub fn new(options: CacheOptions) -> Self {
        Self {
            buf: Vec::new(),
            cursors: Cursors::new(options),
        }
    }

    fn slice(&self, start: u64, end: u64) -> Bytes {
        Bytes::copy_from_slice(&self.buf[start as usize..end as usize])
    }
}

impl ByteCache for MemoryCache {
    fn write(&mut self, data: &[u8]) -> StorageResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let range = self.cursors.plan_write(data.len())?;
        let end = range.end as usize;
        if self.buf.len() < end {
            self.buf.resize(end, 0);
        }
        self.buf[range.start as usize..end].copy_from_slice(data);
        self.cursors.commit_write(range);
        Ok(())
    }

    fn read_next(&mut self) -> StorageResult<(Bytes, u64)> {
        let range = self.cursors.plan_next();
        if range.is_empty() {
            return Ok((Bytes::new(), self.cursors.read_pos));
        }
        let bytes = self.slice(range.start, range.end);
        self.cursors.read_pos = range.end;
        trace!(len = bytes.len(), read_pos = range.end, "memory cache read_next");
        Ok((bytes, range.end))
    }

    fn read_at(&mut self, position: u64, len: usize) -> StorageResult<Bytes> {
        let range = self.cursors.check_available(position, len)?;
        self.cursors.read_pos = range.end;
        if range.is_empty() {
            return Ok(Bytes::new());
        }
        Ok(self.slice(range.start, range.end))
    }

    fn set_write_position(&mut self, position: u64) {
        self.cursors.write_pos = position;
    }

    fn set_read_position(&mut self, position: u64) {
        self.cursors.read_pos = position;
    }

    fn has_enough_data(&self) -> bool {
        self.cursors.has_enough_data()
    }

    fn write_position(&self) -> u64 {
        self.cursors.write_pos
    }

    fn read_position(&self) -> u64 {
        self.cursors.read_pos
    }
}

/// Factory producing [`MemoryCache`] instances.
#[derive(Clone, Debug, Default)]
pub struct MemoryCacheFactory {
    options: CacheOptions,
}

impl MemoryCacheFactory {
    #[must_use]
    pub fn new(options: CacheOptions) -> Self {
        Self { options }
    }
}

impl CacheFactory for MemoryCacheFactory {
    fn create(&self) -> StorageResult<Box<dyn ByteCache>> {
        Ok(Box::new(MemoryCache::new(self.options)))
    }
}
