use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tempfile::TempDir;

use crate::storage::disk::manager::DiskManager;
use crate::storage::disk::scheduler::{DiskData, DiskRequest, DiskScheduler};
use crate::storage::page::page::page_constants::PAGE_SIZE;

#[tokio::test]
async fn schedule_write_then_read() {
    let dir = TempDir::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
    let scheduler = DiskScheduler::new(Arc::clone(&disk_manager));

    let data = [7u8; PAGE_SIZE];
    let write_future = scheduler.create_future();
    scheduler.schedule(DiskRequest {
        is_write: true,
        data: DiskData::Write(Bytes::copy_from_slice(&data)),
        page_id: 0,
        done_flag: Arc::clone(&write_future.flag),
        waker: Arc::clone(&write_future.waker),
    });

    let buffer = Arc::new(RwLock::new([0u8; PAGE_SIZE]));
    let read_future = scheduler.create_future();
    scheduler.schedule(DiskRequest {
        is_write: false,
        data: DiskData::Read(Arc::clone(&buffer)),
        page_id: 0,
        done_flag: Arc::clone(&read_future.flag),
        waker: Arc::clone(&read_future.waker),
    });

    assert!(write_future.await);
    assert!(read_future.await);
    assert_eq!(&buffer.read()[..], &data[..], "page read mismatch");
}

#[tokio::test]
async fn requests_complete_in_fifo_order() {
    let dir = TempDir::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
    let scheduler = DiskScheduler::new(disk_manager);

    // Two writes to the same page; the later one must win.
    let mut futures = Vec::new();
    for fill in [1u8, 2u8] {
        let future = scheduler.create_future();
        scheduler.schedule(DiskRequest {
            is_write: true,
            data: DiskData::Write(Bytes::from(vec![fill; PAGE_SIZE])),
            page_id: 0,
            done_flag: Arc::clone(&future.flag),
            waker: Arc::clone(&future.waker),
        });
        futures.push(future);
    }

    let buffer = Arc::new(RwLock::new([0u8; PAGE_SIZE]));
    let read_future = scheduler.create_future();
    scheduler.schedule(DiskRequest {
        is_write: false,
        data: DiskData::Read(Arc::clone(&buffer)),
        page_id: 0,
        done_flag: Arc::clone(&read_future.flag),
        waker: Arc::clone(&read_future.waker),
    });

    for future in futures {
        assert!(future.await);
    }
    assert!(read_future.await);
    assert_eq!(&buffer.read()[..], &[2u8; PAGE_SIZE][..]);
}

#[test]
fn drop_drains_queued_requests() {
    let dir = TempDir::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());

    {
        let scheduler = DiskScheduler::new(Arc::clone(&disk_manager));
        for page_id in 0..8 {
            let future = scheduler.create_future();
            scheduler.schedule(DiskRequest {
                is_write: true,
                data: DiskData::Write(Bytes::from(vec![page_id as u8; PAGE_SIZE])),
                page_id,
                done_flag: Arc::clone(&future.flag),
                waker: Arc::clone(&future.waker),
            });
        }
        // Dropping the scheduler joins the worker after the queue drains.
    }

    assert_eq!(disk_manager.num_writes(), 8);
    let mut buffer = [0u8; PAGE_SIZE];
    disk_manager.read_page(3, &mut buffer).unwrap();
    assert_eq!(buffer, [3u8; PAGE_SIZE]);
}
