#![forbid(unsafe_code)]

//! Ring of per-fragment caches.
//!
//! One fragment is drained from the read slot while later fragments fill
//! the slots after it. Busy slots always form a contiguous run starting at
//! the read index, so draining in slot order is draining in fragment order.

use bytes::Bytes;
use progbuf_storage::{ByteCache, CacheFactory, StorageResult};

/// Number of fragment slots an [`HlsBuffer`](crate::HlsBuffer) cycles through.
pub const SEGMENT_SLOTS: usize = 3;

/// One fragment's cache.
#[derive(Debug)]
pub struct CacheSlot {
    cache: Box<dyn ByteCache>,
    size: u64,
    write_ready: bool,
}

impl CacheSlot {
    fn new(cache: Box<dyn ByteCache>) -> Self {
        Self {
            cache,
            size: 0,
            write_ready: true,
        }
    }

    /// Declared fragment size.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Slot is free to take the next fragment.
    pub fn is_write_ready(&self) -> bool {
        self.write_ready
    }

    pub fn written(&self) -> u64 {
        self.cache.write_position()
    }

    pub fn unread(&self) -> u64 {
        self.cache.unread()
    }

    /// The whole declared fragment arrived.
    pub fn is_complete(&self) -> bool {
        self.written() >= self.size
    }

    /// Every declared byte was handed out.
    pub fn is_drained(&self) -> bool {
        self.cache.read_position() >= self.size
    }

    pub(crate) fn has_enough_data(&self) -> bool {
        self.cache.has_enough_data()
    }

    fn assign(&mut self, size: u64) {
        self.cache.set_write_position(0);
        self.cache.set_read_position(0);
        self.size = size;
        self.write_ready = false;
    }

    fn release(&mut self) {
        self.cache.set_write_position(0);
        self.cache.set_read_position(0);
        self.size = 0;
        self.write_ready = true;
    }

    /// Append fragment data; returns whether the declared size grew.
    pub(crate) fn write(&mut self, data: &[u8]) -> StorageResult<bool> {
        self.cache.write(data)?;
        let written = self.written();
        if written > self.size {
            self.size = written;
            return Ok(true);
        }
        Ok(false)
    }

    pub(crate) fn read_next(&mut self) -> StorageResult<Bytes> {
        self.cache.read_next().map(|(data, _)| data)
    }
}

/// Fixed ring of [`CacheSlot`]s with separate write and read cursors.
#[derive(Debug)]
pub struct SegmentCacheSet {
    slots: Vec<CacheSlot>,
    /// Slot receiving the current fragment; `None` before the first one.
    write_index: Option<usize>,
    read_index: usize,
}

impl SegmentCacheSet {
    /// Allocate `count` slots through `factory`.
    ///
    /// # Errors
    ///
    /// Returns the first allocation failure.
    pub fn new(factory: &dyn CacheFactory, count: usize) -> StorageResult<Self> {
        let slots = (0..count.max(1))
            .map(|_| factory.create().map(CacheSlot::new))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(Self {
            slots,
            write_index: None,
            read_index: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn write_index(&self) -> Option<usize> {
        self.write_index
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    pub fn slot(&self, index: usize) -> Option<&CacheSlot> {
        self.slots.get(index)
    }

    fn next_write_index(&self) -> usize {
        self.write_index.map_or(0, |index| (index + 1) % self.slots.len())
    }

    /// The slot the next fragment would go to is free.
    pub fn is_next_free(&self) -> bool {
        self.slots[self.next_write_index()].write_ready
    }

    /// Bind the next slot to a fragment of `size` bytes.
    ///
    /// Callers must have checked [`is_next_free`](Self::is_next_free).
    pub(crate) fn claim_next(&mut self, size: u64) -> usize {
        let index = self.next_write_index();
        debug_assert!(self.slots[index].write_ready, "slot {index} still busy");
        self.slots[index].assign(size);
        self.write_index = Some(index);
        index
    }

    /// Slot receiving `chain()` data, if it is still bound to a fragment.
    pub(crate) fn writing_mut(&mut self) -> Option<&mut CacheSlot> {
        let index = self.write_index?;
        let slot = &mut self.slots[index];
        (!slot.write_ready).then_some(slot)
    }

    /// Slot being drained, if it holds a fragment.
    pub(crate) fn reading_mut(&mut self) -> Option<&mut CacheSlot> {
        let slot = &mut self.slots[self.read_index];
        (!slot.write_ready).then_some(slot)
    }

    /// Free the read slot and move on to the next one.
    pub(crate) fn finish_read(&mut self) -> usize {
        let index = self.read_index;
        self.slots[index].release();
        self.read_index = (index + 1) % self.slots.len();
        index
    }

    /// Free every slot and rewind both cursors.
    pub(crate) fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.release();
        }
        self.write_index = None;
        self.read_index = 0;
    }
}
