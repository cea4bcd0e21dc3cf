use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};
use log::debug;
use parking_lot::Mutex;

use crate::storage::page::page::{page_constants::PAGE_SIZE, PageId};

/// Synchronous page-granular access to the database file. Pages live at
/// `page_id * PAGE_SIZE`; the file grows on demand. The disk scheduler's
/// worker thread is the only caller on the hot path.
pub struct DiskManager {
    db_io: Mutex<File>,
    db_path: PathBuf,
    num_writes: AtomicU32,
    num_reads: AtomicU32,
}

impl DiskManager {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let db_io = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&db_path)
            .with_context(|| format!("opening database file {}", db_path.display()))?;

        Ok(DiskManager {
            db_io: Mutex::new(db_io),
            db_path,
            num_writes: AtomicU32::new(0),
            num_reads: AtomicU32::new(0),
        })
    }

    pub fn write_page(&self, page_id: PageId, page_data: &[u8]) -> Result<()> {
        assert_eq!(page_data.len(), PAGE_SIZE, "write must cover a whole page");
        let offset = page_offset(page_id);

        let mut db_io = self.db_io.lock();
        db_io
            .seek(SeekFrom::Start(offset))
            .with_context(|| format!("seeking to page {}", page_id))?;
        db_io
            .write_all(page_data)
            .with_context(|| format!("writing page {}", page_id))?;
        db_io
            .flush()
            .with_context(|| format!("flushing page {}", page_id))?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn read_page(&self, page_id: PageId, page_data: &mut [u8]) -> Result<()> {
        assert_eq!(page_data.len(), PAGE_SIZE, "read must cover a whole page");
        let offset = page_offset(page_id);

        let mut db_io = self.db_io.lock();
        db_io
            .seek(SeekFrom::Start(offset))
            .with_context(|| format!("seeking to page {}", page_id))?;

        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = db_io
                .read(&mut page_data[filled..])
                .with_context(|| format!("reading page {}", page_id))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < PAGE_SIZE {
            // Allocated-but-never-flushed pages live past the end of file.
            debug!("short read of page {} ({} bytes), zero-filling", page_id, filled);
            page_data[filled..].fill(0);
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }
}

fn page_offset(page_id: PageId) -> u64 {
    assert!(page_id >= 0, "I/O on invalid page id {}", page_id);
    page_id as u64 * PAGE_SIZE as u64
}

/// Recovery hook handle. The buffer pool carries one and forwards nothing
/// to it yet; eviction/flush integration comes with the log format.
pub struct LogManager {
    log_io: Mutex<File>,
    log_path: PathBuf,
}

impl LogManager {
    pub fn new(log_path: impl AsRef<Path>) -> Result<Self> {
        let log_path = log_path.as_ref().to_path_buf();
        let log_io = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&log_path)
            .with_context(|| format!("opening log file {}", log_path.display()))?;

        Ok(LogManager {
            log_io: Mutex::new(log_io),
            log_path,
        })
    }

    pub fn append(&self, record: &[u8]) -> Result<()> {
        self.log_io
            .lock()
            .write_all(record)
            .with_context(|| format!("appending to log {}", self.log_path.display()))
    }

    pub fn flush(&self) -> Result<()> {
        self.log_io
            .lock()
            .flush()
            .with_context(|| format!("flushing log {}", self.log_path.display()))
    }
}
