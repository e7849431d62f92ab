#![forbid(unsafe_code)]

//! `progbuf-storage`
//!
//! Byte caches for the progbuf elements.
//!
//! Provides the [`ByteCache`] contract consumed by the buffering elements:
//! - Append via `write` at an explicit write cursor
//! - Sequential `read_next` plus random-access `read_at`
//! - `has_enough_data` gate so consumers don't starve downstream with tiny reads
//!
//! Two implementations ship: [`MemoryCache`] and [`FileCache`] (temp file).

mod cache;
mod error;
mod file;
mod memory;

pub use cache::{ByteCache, CacheFactory, CacheOptions};
pub use error::{StorageError, StorageResult};
pub use file::{FileCache, FileCacheFactory};
pub use memory::{MemoryCache, MemoryCacheFactory};
