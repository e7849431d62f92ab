#![forbid(unsafe_code)]

//! Temp-file backed byte cache.
//!
//! Progressive downloads can be far larger than what should live in memory.
//! `FileCache` spills everything to an anonymous temporary file that the OS
//! removes once the handle is dropped.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    path::PathBuf,
};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::{ByteCache, CacheFactory, CacheOptions, StorageResult, cache::Cursors};

/// File-backed [`ByteCache`].
#[derive(Debug)]
pub struct FileCache {
    file: File,
    cursors: Cursors,
}

impl FileCache {
    /// Create a cache in the system temp directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn new(options: CacheOptions) -> StorageResult<Self> {
        Ok(Self {
            file: tempfile::tempfile()?,
            cursors: Cursors::new(options),
        })
    }

    /// Create a cache inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn new_in(dir: &std::path::Path, options: CacheOptions) -> StorageResult<Self> {
        Ok(Self {
            file: tempfile::tempfile_in(dir)?,
            cursors: Cursors::new(options),
        })
    }

    fn read_range(&mut self, start: u64, end: u64) -> StorageResult<Bytes> {
        let mut buf = BytesMut::zeroed((end - start) as usize);
        self.file.seek(SeekFrom::Start(start))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf.freeze())
    }
}

impl ByteCache for FileCache {
    fn write(&mut self, data: &[u8]) -> StorageResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let range = self.cursors.plan_write(data.len())?;
        self.file.seek(SeekFrom::Start(range.start))?;
        self.file.write_all(data)?;
        self.cursors.commit_write(range);
        Ok(())
    }

    fn read_next(&mut self) -> StorageResult<(Bytes, u64)> {
        let range = self.cursors.plan_next();
        if range.is_empty() {
            return Ok((Bytes::new(), self.cursors.read_pos));
        }
        let bytes = self.read_range(range.start, range.end)?;
        self.cursors.read_pos = range.end;
        trace!(len = bytes.len(), read_pos = range.end, "file cache read_next");
        Ok((bytes, range.end))
    }

    fn read_at(&mut self, position: u64, len: usize) -> StorageResult<Bytes> {
        let range = self.cursors.check_available(position, len)?;
        let bytes = if range.is_empty() {
            Bytes::new()
        } else {
            self.read_range(range.start, range.end)?
        };
        self.cursors.read_pos = range.end;
        Ok(bytes)
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

/// Factory producing [`FileCache`] instances.
#[derive(Clone, Debug, Default)]
pub struct FileCacheFactory {
    dir: Option<PathBuf>,
    options: CacheOptions,
}

impl FileCacheFactory {
    #[must_use]
    pub fn new(options: CacheOptions) -> Self {
        Self { dir: None, options }
    }

    /// Place temp files in `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }
}

impl CacheFactory for FileCacheFactory {
    fn create(&self) -> StorageResult<Box<dyn ByteCache>> {
        let cache = match self.dir {
            Some(ref dir) => FileCache::new_in(dir, self.options)?,
            None => FileCache::new(self.options)?,
        };
        debug!(dir = ?self.dir, "file cache allocated");
        Ok(Box::new(cache))
    }
}
