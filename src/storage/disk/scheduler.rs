use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::JoinHandle;

use bytes::Bytes;
use log::error;
use parking_lot::{Mutex, RwLock};

use super::manager::DiskManager;
use crate::storage::page::page::{page_constants::PAGE_SIZE, PageId};

// States of a scheduled I/O operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoStatus {
    Pending = 0,
    Success = 1,
    WriteError = 2,
    ReadError = 3,
}

impl IoStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => IoStatus::Success,
            2 => IoStatus::WriteError,
            3 => IoStatus::ReadError,
            _ => IoStatus::Pending,
        }
    }
}

/// Future half of a scheduled request. Resolves to `true` once the worker
/// completed the operation successfully.
pub struct IoFuture {
    pub flag: Arc<AtomicU8>,
    pub waker: Arc<Mutex<Option<Waker>>>,
}

impl Future for IoFuture {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match IoStatus::from_u8(self.flag.load(Ordering::Acquire)) {
            IoStatus::Success => Poll::Ready(true),
            IoStatus::WriteError | IoStatus::ReadError => Poll::Ready(false),
            IoStatus::Pending => {
                *self.waker.lock() = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

pub enum DiskData {
    /// Snapshot of the bytes to persist; owned by the worker once scheduled.
    Write(Bytes),
    /// Destination frame buffer, shared with the issuer. The issuer must
    /// leave it alone until the future resolves; the worker fills it under
    /// the buffer's write latch.
    Read(Arc<RwLock<[u8; PAGE_SIZE]>>),
}

/// A request to perform disk I/O, paired with the promise half of the
/// issuer's future.
pub struct DiskRequest {
    pub is_write: bool,
    pub data: DiskData,
    pub page_id: PageId,
    pub done_flag: Arc<AtomicU8>,
    pub waker: Arc<Mutex<Option<Waker>>>,
}

/// Serializes page I/O onto a single background worker. Requests are
/// consumed FIFO; dropping the scheduler closes the queue, drains what is
/// left and joins the worker.
pub struct DiskScheduler {
    request_queue: Mutex<Option<Sender<DiskRequest>>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker = std::thread::spawn(move || Self::worker_loop(rx, disk_manager));

        DiskScheduler {
            request_queue: Mutex::new(Some(tx)),
            worker: Some(worker),
        }
    }

    fn worker_loop(rx: Receiver<DiskRequest>, disk_manager: Arc<DiskManager>) {
        while let Ok(request) = rx.recv() {
            // A failed operation updates the flag; the worker itself never dies.
            let status = match &request.data {
                DiskData::Write(data) => match disk_manager.write_page(request.page_id, &data[..]) {
                    Ok(()) => IoStatus::Success,
                    Err(err) => {
                        error!("write of page {} failed: {:#}", request.page_id, err);
                        IoStatus::WriteError
                    }
                },
                DiskData::Read(buffer) => {
                    let mut buffer = buffer.write();
                    match disk_manager.read_page(request.page_id, &mut buffer[..]) {
                        Ok(()) => IoStatus::Success,
                        Err(err) => {
                            error!("read of page {} failed: {:#}", request.page_id, err);
                            IoStatus::ReadError
                        }
                    }
                }
            };

            request.done_flag.store(status as u8, Ordering::Release);
            if let Some(waker) = request.waker.lock().take() {
                waker.wake();
            }
        }
    }

    /// Fresh promise/future pair for the next request.
    pub fn create_future(&self) -> IoFuture {
        IoFuture {
            flag: Arc::new(AtomicU8::new(IoStatus::Pending as u8)),
            waker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn schedule(&self, request: DiskRequest) {
        self.request_queue
            .lock()
            .as_ref()
            .expect("scheduler already shut down")
            .send(request)
            .expect("disk worker exited");
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish queued requests and exit.
        drop(self.request_queue.lock().take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
