use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use futures::executor::block_on;
use hashlink::LinkedHashMap;
use log::debug;
use parking_lot::Mutex;

use crate::storage::disk::manager::{DiskManager, LogManager};
use crate::storage::disk::scheduler::{DiskData, DiskRequest, DiskScheduler, IoFuture};
use crate::storage::page::page::{Page, PageId, INVALID_PAGE_ID};
use crate::storage::page::page_guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};
use crate::utils::replacer::{AccessType, FrameId, LRUKReplacer, Replacer};

pub const DEFAULT_REPLACER_K: usize = 10;

// Bookkeeping guarded by the pool latch.
struct PoolInner {
    // page_id -> frame holding it; an entry exists iff the page is resident.
    page_table: LinkedHashMap<PageId, FrameId>,
    // Frames holding no page. A frame is here xor in the page table.
    free_list: VecDeque<FrameId>,
    next_page_id: PageId,
}

/// Caches fixed-size disk pages in a fixed array of frames and hands them
/// to upper layers pinned. Misses take a frame from the free list or evict
/// an LRU-K victim, writing it back first when dirty.
///
/// One coarse mutex guards all pool metadata and is deliberately held
/// across disk futures; the pool serializes on I/O by construction.
pub struct BufferPoolManager {
    pool_size: usize,
    frames: Box<[Arc<Page>]>,
    inner: Mutex<PoolInner>,
    replacer: Mutex<LRUKReplacer>,
    disk_scheduler: DiskScheduler,
    log_manager: Option<Arc<LogManager>>,
}

impl BufferPoolManager {
    pub fn new(
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
        replacer_k: usize,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        let frames = (0..pool_size).map(|_| Arc::new(Page::new())).collect();
        let free_list = (0..pool_size as FrameId).collect();

        BufferPoolManager {
            pool_size,
            frames,
            inner: Mutex::new(PoolInner {
                page_table: LinkedHashMap::new(),
                free_list,
                next_page_id: 0,
            }),
            replacer: Mutex::new(LRUKReplacer::new(pool_size, replacer_k)),
            disk_scheduler: DiskScheduler::new(disk_manager),
            log_manager,
        }
    }

    /// Pool with the default LRU-K history window.
    pub fn with_defaults(
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        Self::new(pool_size, disk_manager, DEFAULT_REPLACER_K, log_manager)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn log_manager(&self) -> Option<&Arc<LogManager>> {
        self.log_manager.as_ref()
    }

    /// Creates a brand-new page in a free or evicted frame and returns it
    /// pinned. `None` when every frame is pinned.
    pub fn new_page(&self) -> Option<Arc<Page>> {
        let mut inner = self.inner.lock();
        let frame_id = self.acquire_frame(&mut inner)?;
        let page_id = allocate_page(&mut inner);

        let page = &self.frames[frame_id as usize];
        page.reset_memory();
        page.page_id.store(page_id, Ordering::Relaxed);
        page.pin_count.store(1, Ordering::Relaxed);
        page.is_dirty.store(false, Ordering::Relaxed);
        inner.page_table.insert(page_id, frame_id);

        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);

        Some(Arc::clone(page))
    }

    /// Returns the requested page pinned, reading it from disk on a miss.
    /// `None` when the page is absent and every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId, _access_type: AccessType) -> Option<Arc<Page>> {
        if page_id == INVALID_PAGE_ID {
            return None;
        }
        let mut inner = self.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let page = &self.frames[frame_id as usize];
            page.pin_count.fetch_add(1, Ordering::Relaxed);
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
            return Some(Arc::clone(page));
        }

        let frame_id = self.acquire_frame(&mut inner)?;
        let page = &self.frames[frame_id as usize];
        self.read_from_disk(page_id, page);

        page.page_id.store(page_id, Ordering::Relaxed);
        page.pin_count.store(1, Ordering::Relaxed);
        page.is_dirty.store(false, Ordering::Relaxed);
        inner.page_table.insert(page_id, frame_id);

        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);

        Some(Arc::clone(page))
    }

    /// Drops one pin. The dirty flag is sticky: once any unpinner reported
    /// dirty, only a flush clears it. `false` for an unknown page or a pin
    /// count already at zero.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool, _access_type: AccessType) -> bool {
        let inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };
        let page = &self.frames[frame_id as usize];
        if page.pin_count() <= 0 {
            return false;
        }

        page.is_dirty.fetch_or(is_dirty, Ordering::Relaxed);
        let remaining = page.pin_count.fetch_sub(1, Ordering::Relaxed) - 1;
        if remaining == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
        true
    }

    /// Writes the page out unconditionally, clean or not, and clears the
    /// dirty flag. `false` for a page not in the pool.
    pub fn flush_page(&self, page_id: PageId) -> bool {
        let inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };
        let page = &self.frames[frame_id as usize];
        self.write_back(page_id, page);
        page.is_dirty.store(false, Ordering::Relaxed);
        true
    }

    /// Flushes every resident page: all writes are issued first, then
    /// awaited, so the worker sees them back to back.
    pub fn flush_all_pages(&self) {
        let inner = self.inner.lock();
        let mut pending: Vec<(FrameId, PageId, IoFuture)> =
            Vec::with_capacity(inner.page_table.len());

        for (&page_id, &frame_id) in inner.page_table.iter() {
            let page = &self.frames[frame_id as usize];
            let future = self.disk_scheduler.create_future();
            self.disk_scheduler.schedule(DiskRequest {
                is_write: true,
                data: DiskData::Write(Bytes::copy_from_slice(&page.read()[..])),
                page_id,
                done_flag: Arc::clone(&future.flag),
                waker: Arc::clone(&future.waker),
            });
            pending.push((frame_id, page_id, future));
        }

        for (frame_id, page_id, future) in pending {
            assert!(block_on(future), "flush of page {} failed", page_id);
            self.frames[frame_id as usize]
                .is_dirty
                .store(false, Ordering::Relaxed);
        }
    }

    /// Removes a page from the pool, returning its frame to the free list.
    /// An absent page is a success; a pinned one is refused.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return true;
        };
        let page = &self.frames[frame_id as usize];
        if page.pin_count() > 0 {
            return false;
        }

        if page.is_dirty() {
            self.write_back(page_id, page);
        }
        inner.page_table.remove(&page_id);
        self.replacer.lock().remove(frame_id);
        page.reset();
        inner.free_list.push_back(frame_id);
        deallocate_page(page_id);
        true
    }

    pub fn new_page_guarded(self: &Arc<Self>) -> Option<BasicPageGuard> {
        let page = self.new_page()?;
        Some(BasicPageGuard::new(Arc::clone(self), page))
    }

    pub fn fetch_page_basic(self: &Arc<Self>, page_id: PageId) -> Option<BasicPageGuard> {
        let page = self.fetch_page(page_id, AccessType::Unknown)?;
        Some(BasicPageGuard::new(Arc::clone(self), page))
    }

    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> Option<ReadPageGuard> {
        self.fetch_page_basic(page_id)
            .map(BasicPageGuard::upgrade_read)
    }

    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> Option<WritePageGuard> {
        self.fetch_page_basic(page_id)
            .map(BasicPageGuard::upgrade_write)
    }

    /// Pin count of a resident page, mostly for tests and introspection.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<i32> {
        let inner = self.inner.lock();
        let &frame_id = inner.page_table.get(&page_id)?;
        Some(self.frames[frame_id as usize].pin_count())
    }

    /// Picks a frame for a new resident page: free list first, then an
    /// eviction victim, whose dirty contents are written back before the
    /// frame is handed out. `None` when everything is pinned.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Option<FrameId> {
        let frame_id = match inner.free_list.pop_front() {
            Some(frame_id) => frame_id,
            None => {
                let victim = self.replacer.lock().evict()?;
                let old_page_id = self.frames[victim as usize].page_id();
                debug!("evicting page {} from frame {}", old_page_id, victim);
                inner.page_table.remove(&old_page_id);
                victim
            }
        };

        let page = &self.frames[frame_id as usize];
        if page.page_id() != INVALID_PAGE_ID && page.is_dirty() {
            self.write_back(page.page_id(), page);
            page.reset_memory();
            page.is_dirty.store(false, Ordering::Relaxed);
        }
        Some(frame_id)
    }

    fn write_back(&self, page_id: PageId, page: &Page) {
        let future = self.disk_scheduler.create_future();
        self.disk_scheduler.schedule(DiskRequest {
            is_write: true,
            data: DiskData::Write(Bytes::copy_from_slice(&page.read()[..])),
            page_id,
            done_flag: Arc::clone(&future.flag),
            waker: Arc::clone(&future.waker),
        });
        // Awaited with the pool latch held; the pool serializes on I/O.
        assert!(block_on(future), "write-back of page {} failed", page_id);
    }

    fn read_from_disk(&self, page_id: PageId, page: &Page) {
        let future = self.disk_scheduler.create_future();
        self.disk_scheduler.schedule(DiskRequest {
            is_write: false,
            data: DiskData::Read(Arc::clone(&page.data)),
            page_id,
            done_flag: Arc::clone(&future.flag),
            waker: Arc::clone(&future.waker),
        });
        assert!(block_on(future), "read of page {} failed", page_id);
    }
}

fn allocate_page(inner: &mut PoolInner) -> PageId {
    let page_id = inner.next_page_id;
    inner.next_page_id += 1;
    page_id
}

// Free-space bookkeeping hook; ids are not reused within a run.
fn deallocate_page(_page_id: PageId) {}
