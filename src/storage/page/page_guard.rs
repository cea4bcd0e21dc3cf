use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::storage::page::page::{page_constants::PAGE_SIZE, Page, PageId};
use crate::utils::replacer::AccessType;

type PageLatchRead = ArcRwLockReadGuard<RawRwLock, [u8; PAGE_SIZE]>;
type PageLatchWrite = ArcRwLockWriteGuard<RawRwLock, [u8; PAGE_SIZE]>;

/// Scoped pin on a page, holding no latch. Dropping it unpins with the
/// sticky dirty flag accumulated through `write()` / `set_dirty()`.
///
/// Guards are move-only; a moved-from or upgraded guard is empty and its
/// release is a no-op.
pub struct BasicPageGuard {
    bpm: Option<Arc<BufferPoolManager>>,
    page: Option<Arc<Page>>,
    is_dirty: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page: Arc<Page>) -> Self {
        BasicPageGuard {
            bpm: Some(bpm),
            page: Some(page),
            is_dirty: false,
        }
    }

    pub fn page(&self) -> &Arc<Page> {
        self.page.as_ref().expect("guard is empty")
    }

    pub fn page_id(&self) -> PageId {
        self.page().page_id()
    }

    /// Transient shared latch over the page bytes.
    pub fn read(&self) -> RwLockReadGuard<'_, [u8; PAGE_SIZE]> {
        self.page().read()
    }

    /// Transient exclusive latch over the page bytes; taking it marks the
    /// guard dirty.
    pub fn write(&mut self) -> RwLockWriteGuard<'_, [u8; PAGE_SIZE]> {
        self.is_dirty = true;
        self.page.as_ref().expect("guard is empty").write()
    }

    pub fn set_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Trades the bare pin for a pin plus shared latch. The source guard
    /// is emptied before the latch is taken, so no lock is held together
    /// with the pool latch.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        let bpm = self.bpm.take().expect("guard is empty");
        let page = self.page.take().expect("guard is empty");
        let latch = page.data.read_arc();
        ReadPageGuard {
            guard: BasicPageGuard {
                bpm: Some(bpm),
                page: Some(page),
                is_dirty: self.is_dirty,
            },
            latch: Some(latch),
        }
    }

    /// Trades the bare pin for a pin plus exclusive latch.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        let bpm = self.bpm.take().expect("guard is empty");
        let page = self.page.take().expect("guard is empty");
        let latch = page.data.write_arc();
        WritePageGuard {
            guard: BasicPageGuard {
                bpm: Some(bpm),
                page: Some(page),
                is_dirty: true,
            },
            latch: Some(latch),
        }
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        if let (Some(bpm), Some(page)) = (self.bpm.take(), self.page.take()) {
            bpm.unpin_page(page.page_id(), self.is_dirty, AccessType::Unknown);
        }
    }
}

/// Pin plus shared latch. Destruction releases the latch first, then the
/// pin; the page stays clean.
pub struct ReadPageGuard {
    guard: BasicPageGuard,
    latch: Option<PageLatchRead>,
}

impl ReadPageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        self.latch.as_ref().expect("guard is empty")
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Latch before pin; the inner guard unpins as it drops.
        self.latch.take();
    }
}

/// Pin plus exclusive latch. Destruction marks the page dirty, releases
/// the latch, then the pin.
pub struct WritePageGuard {
    guard: BasicPageGuard,
    latch: Option<PageLatchWrite>,
}

impl WritePageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        self.latch.as_ref().expect("guard is empty")
    }

    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        self.guard.is_dirty = true;
        self.latch.as_mut().expect("guard is empty")
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.guard.is_dirty = true;
        self.latch.take();
    }
}
