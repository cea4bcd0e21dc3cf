use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use page_constants::PAGE_SIZE;

pub type PageId = i32;

pub const INVALID_PAGE_ID: PageId = -1;

pub mod page_constants {
    pub const PAGE_SIZE: usize = 1024 * 4;
}

/// In-memory image of one disk page plus the bookkeeping the buffer pool
/// needs: identity, pin count, dirty flag and the page latch.
///
/// One `Page` is allocated per frame when the pool is built and lives as
/// long as the pool; the slot is reassigned to many page ids over time.
/// Metadata is mutated under the pool latch; the byte buffer is governed
/// by the page's own read-write latch.
pub struct Page {
    pub(crate) page_id: AtomicI32,
    pub(crate) pin_count: AtomicI32,
    pub(crate) is_dirty: AtomicBool,
    pub(crate) data: Arc<RwLock<[u8; PAGE_SIZE]>>,
}

impl Page {
    pub(crate) fn new() -> Self {
        Page {
            page_id: AtomicI32::new(INVALID_PAGE_ID),
            pin_count: AtomicI32::new(0),
            is_dirty: AtomicBool::new(false),
            data: Arc::new(RwLock::new([0; PAGE_SIZE])),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id.load(Ordering::Relaxed)
    }

    pub fn pin_count(&self) -> i32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Relaxed)
    }

    /// Shared latch over the page bytes.
    pub fn read(&self) -> RwLockReadGuard<'_, [u8; PAGE_SIZE]> {
        self.data.read()
    }

    /// Exclusive latch over the page bytes. Latching alone does not mark
    /// the page dirty; that happens at unpin time.
    pub fn write(&self) -> RwLockWriteGuard<'_, [u8; PAGE_SIZE]> {
        self.data.write()
    }

    pub(crate) fn reset_memory(&self) {
        *self.data.write() = [0; PAGE_SIZE];
    }

    /// Clears all metadata and the buffer. Only valid for an unpinned
    /// frame returning to the free list.
    pub(crate) fn reset(&self) {
        self.page_id.store(INVALID_PAGE_ID, Ordering::Relaxed);
        self.pin_count.store(0, Ordering::Relaxed);
        self.is_dirty.store(false, Ordering::Relaxed);
        self.reset_memory();
    }
}
