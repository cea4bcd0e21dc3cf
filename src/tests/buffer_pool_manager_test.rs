use std::sync::Arc;

use tempfile::TempDir;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::storage::disk::manager::DiskManager;
use crate::storage::page::page::{page_constants::PAGE_SIZE, INVALID_PAGE_ID};
use crate::utils::replacer::AccessType;

fn new_pool(pool_size: usize, replacer_k: usize) -> (TempDir, Arc<DiskManager>, Arc<BufferPoolManager>) {
    let dir = TempDir::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(
        pool_size,
        Arc::clone(&disk_manager),
        replacer_k,
        None,
    ));
    (dir, disk_manager, bpm)
}

#[test]
fn page_ids_are_monotonic() {
    let dir = TempDir::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
    let bpm = BufferPoolManager::with_defaults(3, disk_manager, None);
    for expected in 0..3 {
        let page = bpm.new_page().unwrap();
        assert_eq!(page.page_id(), expected);
    }
}

#[test]
fn fill_and_evict() {
    let (_dir, disk_manager, bpm) = new_pool(3, 2);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let page = bpm.new_page().unwrap();
        ids.push(page.page_id());
    }
    for &id in &ids {
        assert!(bpm.unpin_page(id, false, AccessType::Unknown));
    }

    let page4 = bpm.new_page().unwrap();
    assert_ne!(page4.page_id(), INVALID_PAGE_ID);

    // Exactly one of the first three left the pool.
    let gone: Vec<_> = ids
        .iter()
        .copied()
        .filter(|&id| bpm.get_pin_count(id).is_none())
        .collect();
    assert_eq!(gone.len(), 1);

    // Fetching the evicted page must go to disk.
    let reads_before = disk_manager.num_reads();
    let refetched = bpm.fetch_page(gone[0], AccessType::Unknown).unwrap();
    assert_eq!(refetched.page_id(), gone[0]);
    assert!(disk_manager.num_reads() > reads_before);
}

#[test]
fn pinned_pool_is_exhausted() {
    let (_dir, _disk, bpm) = new_pool(3, 2);

    for _ in 0..3 {
        bpm.new_page().unwrap();
    }
    assert!(bpm.new_page().is_none());
    assert!(bpm.fetch_page(99, AccessType::Unknown).is_none());
}

#[test]
fn fetch_hit_increments_pin_count() {
    let (_dir, _disk, bpm) = new_pool(2, 2);

    let page = bpm.new_page().unwrap();
    let id = page.page_id();
    assert_eq!(bpm.get_pin_count(id), Some(1));

    let again = bpm.fetch_page(id, AccessType::Unknown).unwrap();
    assert_eq!(again.page_id(), id);
    assert_eq!(bpm.get_pin_count(id), Some(2));

    assert!(bpm.unpin_page(id, false, AccessType::Unknown));
    assert_eq!(bpm.get_pin_count(id), Some(1));
    assert!(bpm.unpin_page(id, false, AccessType::Unknown));
    assert_eq!(bpm.get_pin_count(id), Some(0));

    // Already unpinned.
    assert!(!bpm.unpin_page(id, false, AccessType::Unknown));
}

#[test]
fn unpin_and_flush_unknown_page_fail() {
    let (_dir, _disk, bpm) = new_pool(2, 2);
    assert!(!bpm.unpin_page(42, false, AccessType::Unknown));
    assert!(!bpm.flush_page(42));
    assert!(bpm.fetch_page(INVALID_PAGE_ID, AccessType::Unknown).is_none());
}

#[test]
fn sticky_dirty_survives_clean_unpin() {
    let (_dir, disk_manager, bpm) = new_pool(1, 2);

    let page = bpm.new_page().unwrap();
    let id = page.page_id();
    page.write()[0] = 0xAB;
    assert!(bpm.unpin_page(id, true, AccessType::Unknown));

    // A later clean unpin must not launder the dirty bit.
    let page = bpm.fetch_page(id, AccessType::Unknown).unwrap();
    assert!(bpm.unpin_page(id, false, AccessType::Unknown));
    drop(page);

    let writes_before = disk_manager.num_writes();
    let other = bpm.new_page().unwrap();
    assert!(
        disk_manager.num_writes() > writes_before,
        "evicting a dirty page must schedule a write"
    );

    assert!(bpm.unpin_page(other.page_id(), false, AccessType::Unknown));
    let page = bpm.fetch_page(id, AccessType::Unknown).unwrap();
    assert_eq!(page.read()[0], 0xAB);
}

#[test]
fn clean_eviction_skips_write_back() {
    let (_dir, disk_manager, bpm) = new_pool(1, 2);

    let page = bpm.new_page().unwrap();
    let id = page.page_id();
    assert!(bpm.unpin_page(id, false, AccessType::Unknown));

    let writes_before = disk_manager.num_writes();
    bpm.new_page().unwrap();
    assert_eq!(disk_manager.num_writes(), writes_before);
}

#[test]
fn flush_page_persists_and_keeps_frame_bytes() {
    let (_dir, disk_manager, bpm) = new_pool(2, 2);

    let page = bpm.new_page().unwrap();
    let id = page.page_id();
    page.write()[..4].copy_from_slice(b"crab");
    assert!(bpm.unpin_page(id, true, AccessType::Unknown));
    assert!(page.is_dirty());

    assert!(bpm.flush_page(id));
    assert!(!page.is_dirty());

    // Frame bytes survive the flush and match the disk copy.
    assert_eq!(&page.read()[..4], b"crab");
    let mut disk_buf = [0u8; PAGE_SIZE];
    disk_manager.read_page(id, &mut disk_buf).unwrap();
    assert_eq!(&disk_buf[..], &page.read()[..]);
}

#[test]
fn flush_all_pages_clears_every_dirty_bit() {
    let (_dir, disk_manager, bpm) = new_pool(3, 2);

    let mut ids = Vec::new();
    for fill in 1u8..=3 {
        let page = bpm.new_page().unwrap();
        page.write()[0] = fill;
        ids.push(page.page_id());
        assert!(bpm.unpin_page(page.page_id(), true, AccessType::Unknown));
    }

    bpm.flush_all_pages();

    for (index, &id) in ids.iter().enumerate() {
        let page = bpm.fetch_page(id, AccessType::Unknown).unwrap();
        assert!(!page.is_dirty());
        assert!(bpm.unpin_page(id, false, AccessType::Unknown));

        let mut disk_buf = [0u8; PAGE_SIZE];
        disk_manager.read_page(id, &mut disk_buf).unwrap();
        assert_eq!(disk_buf[0], index as u8 + 1);
    }
}

#[test]
fn delete_pinned_page_is_refused() {
    let (_dir, _disk, bpm) = new_pool(2, 2);

    let page = bpm.new_page().unwrap();
    let id = page.page_id();

    assert!(!bpm.delete_page(id));
    assert_eq!(bpm.get_pin_count(id), Some(1), "page must stay resident");

    assert!(bpm.unpin_page(id, false, AccessType::Unknown));
    assert!(bpm.delete_page(id));
    assert!(bpm.get_pin_count(id).is_none());

    // Deleting a page that is already gone succeeds.
    assert!(bpm.delete_page(id));
}

#[test]
fn delete_returns_frame_to_free_list() {
    let (_dir, _disk, bpm) = new_pool(1, 2);

    let page = bpm.new_page().unwrap();
    let id = page.page_id();
    assert!(bpm.unpin_page(id, false, AccessType::Unknown));
    assert!(bpm.delete_page(id));

    // The single frame is free again; no eviction is needed.
    let page = bpm.new_page().unwrap();
    assert_ne!(page.page_id(), id, "page ids are never reused");
}

#[test]
fn evicted_page_round_trips_through_disk() {
    let (_dir, _disk, bpm) = new_pool(1, 2);

    let page = bpm.new_page().unwrap();
    let id = page.page_id();
    page.write()[100] = 0x42;
    assert!(bpm.unpin_page(id, true, AccessType::Unknown));

    // Churn the only frame through several other pages.
    for _ in 0..3 {
        let other = bpm.new_page().unwrap();
        assert!(bpm.unpin_page(other.page_id(), false, AccessType::Unknown));
    }

    let page = bpm.fetch_page(id, AccessType::Unknown).unwrap();
    assert_eq!(page.read()[100], 0x42);
}
