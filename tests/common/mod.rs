#![allow(dead_code)]

use std::cell::Cell;

use oakdb::storage::block::{BlockDevice, MemDevice};
use oakdb::{PageId, Result};

/// Wraps a device and counts every call going through it, recording the
/// shape of the most recent write and allocation.
pub struct CountingDevice<D> {
    inner: D,
    pub reads: Cell<usize>,
    pub writes: Cell<usize>,
    pub allocs: Cell<usize>,
    pub frees: Cell<usize>,
    pub last_write: Cell<Option<(u32, usize)>>,
    pub last_alloc_size: Cell<u32>,
}

impl<D> CountingDevice<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            reads: Cell::new(0),
            writes: Cell::new(0),
            allocs: Cell::new(0),
            frees: Cell::new(0),
            last_write: Cell::new(None),
            last_alloc_size: Cell::new(0),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn io_calls(&self) -> usize {
        self.reads.get() + self.writes.get() + self.allocs.get() + self.frees.get()
    }
}

impl<D: BlockDevice> BlockDevice for CountingDevice<D> {
    fn read_page(&self, page: PageId, buf: &mut [u8]) -> Result<()> {
        self.reads.set(self.reads.get() + 1);
        self.inner.read_page(page, buf)
    }

    fn write_page(&self, page: PageId, buf: &[u8]) -> Result<()> {
        self.writes.set(self.writes.get() + 1);
        self.last_write.set(Some((page.as_u32(), buf.len())));
        self.inner.write_page(page, buf)
    }

    fn allocate_page(&self, page_size: u32) -> Result<PageId> {
        self.allocs.set(self.allocs.get() + 1);
        self.last_alloc_size.set(page_size);
        self.inner.allocate_page(page_size)
    }

    fn free_page(&self, page: PageId, page_size: u32) -> Result<()> {
        self.frees.set(self.frees.get() + 1);
        self.inner.free_page(page, page_size)
    }
}

/// Counting wrapper around a fresh in-memory device.
pub fn counting_mem() -> CountingDevice<MemDevice> {
    CountingDevice::new(MemDevice::new())
}
