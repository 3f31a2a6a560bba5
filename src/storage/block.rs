use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Result, StoreError};

/// The four operations a page manager needs from its backing store.
///
/// The device is supplied at manager construction and fixed for the
/// manager's lifetime. Every read and write transfers exactly one page
/// through the given buffer; `allocate_page` hands out a fresh non-zero
/// page id and `free_page` returns one.
pub trait BlockDevice {
    /// Reads the page's bytes into `buf` (one full page).
    fn read_page(&self, page: PageId, buf: &mut [u8]) -> Result<()>;

    /// Writes `buf` (one full page) to the page.
    fn write_page(&self, page: PageId, buf: &[u8]) -> Result<()>;

    /// Allocates a new page of `page_size` bytes and returns its id.
    fn allocate_page(&self, page_size: u32) -> Result<PageId>;

    /// Releases a previously allocated page.
    fn free_page(&self, page: PageId, page_size: u32) -> Result<()>;
}

impl<D: BlockDevice + ?Sized> BlockDevice for &D {
    fn read_page(&self, page: PageId, buf: &mut [u8]) -> Result<()> {
        (**self).read_page(page, buf)
    }

    fn write_page(&self, page: PageId, buf: &[u8]) -> Result<()> {
        (**self).write_page(page, buf)
    }

    fn allocate_page(&self, page_size: u32) -> Result<PageId> {
        (**self).allocate_page(page_size)
    }

    fn free_page(&self, page: PageId, page_size: u32) -> Result<()> {
        (**self).free_page(page, page_size)
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for Rc<D> {
    fn read_page(&self, page: PageId, buf: &mut [u8]) -> Result<()> {
        (**self).read_page(page, buf)
    }

    fn write_page(&self, page: PageId, buf: &[u8]) -> Result<()> {
        (**self).write_page(page, buf)
    }

    fn allocate_page(&self, page_size: u32) -> Result<PageId> {
        (**self).allocate_page(page_size)
    }

    fn free_page(&self, page: PageId, page_size: u32) -> Result<()> {
        (**self).free_page(page, page_size)
    }
}

/// In-memory block device backed by a page map.
///
/// Reads of pages that were never written yield zeroes, like a sparse
/// file. Useful for embedding without a filesystem and for tests.
pub struct MemDevice {
    pages: RefCell<HashMap<PageId, Box<[u8]>>>,
    free: RefCell<Vec<PageId>>,
    next: Cell<u32>,
    max_pages: Option<usize>,
}

impl MemDevice {
    pub fn new() -> Self {
        Self {
            pages: RefCell::new(HashMap::new()),
            free: RefCell::new(Vec::new()),
            next: Cell::new(1),
            max_pages: None,
        }
    }

    /// A device that refuses allocation beyond `max_pages` live pages.
    pub fn with_capacity(max_pages: usize) -> Self {
        Self {
            max_pages: Some(max_pages),
            ..Self::new()
        }
    }

    /// Number of pages that have been written at least once.
    pub fn page_count(&self) -> usize {
        self.pages.borrow().len()
    }
}

impl Default for MemDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDevice for MemDevice {
    fn read_page(&self, page: PageId, buf: &mut [u8]) -> Result<()> {
        if !page.is_valid() {
            return Err(StoreError::InvalidPageId(page));
        }
        match self.pages.borrow().get(&page) {
            Some(data) => {
                let n = buf.len().min(data.len());
                buf[..n].copy_from_slice(&data[..n]);
                buf[n..].fill(0);
            }
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page: PageId, buf: &[u8]) -> Result<()> {
        if !page.is_valid() {
            return Err(StoreError::InvalidPageId(page));
        }
        self.pages
            .borrow_mut()
            .insert(page, buf.to_vec().into_boxed_slice());
        Ok(())
    }

    fn allocate_page(&self, _page_size: u32) -> Result<PageId> {
        if let Some(page) = self.free.borrow_mut().pop() {
            return Ok(page);
        }
        let next = self.next.get();
        if let Some(max) = self.max_pages {
            let live = (next - 1) as usize - self.free.borrow().len();
            if live >= max {
                return Err(StoreError::OutOfPages);
            }
        }
        self.next.set(next + 1);
        Ok(PageId::new(next))
    }

    fn free_page(&self, page: PageId, _page_size: u32) -> Result<()> {
        if !page.is_valid() {
            return Err(StoreError::InvalidPageId(page));
        }
        self.pages.borrow_mut().remove(&page);
        self.free.borrow_mut().push(page);
        Ok(())
    }
}

/// Single-file block device.
///
/// Page id `n` lives at byte offset `(n - 1) * page_size`; id zero stays
/// reserved. Allocation hands out ascending ids and recycles freed ones.
/// Reads past the end of the file are zero-filled, so a freshly allocated
/// page can be read before it is ever written.
pub struct FileDevice {
    file: Mutex<File>,
    page_size: u32,
    next_page: AtomicU32,
    free: Mutex<Vec<PageId>>,
}

impl FileDevice {
    /// Opens (or creates) the backing file and resumes allocation after
    /// any pages it already contains.
    pub fn open<P: AsRef<Path>>(path: P, page_size: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let existing = (file.metadata()?.len() / page_size as u64) as u32;

        Ok(Self {
            file: Mutex::new(file),
            page_size,
            next_page: AtomicU32::new(existing + 1),
            free: Mutex::new(Vec::new()),
        })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn offset_of(&self, page: PageId) -> u64 {
        (page.as_u32() as u64 - 1) * self.page_size as u64
    }
}

impl BlockDevice for FileDevice {
    fn read_page(&self, page: PageId, buf: &mut [u8]) -> Result<()> {
        if !page.is_valid() {
            return Err(StoreError::InvalidPageId(page));
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset_of(page)))?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf[filled..].fill(0);
        Ok(())
    }

    fn write_page(&self, page: PageId, buf: &[u8]) -> Result<()> {
        if !page.is_valid() {
            return Err(StoreError::InvalidPageId(page));
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset_of(page)))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn allocate_page(&self, page_size: u32) -> Result<PageId> {
        debug_assert_eq!(page_size, self.page_size);
        if let Some(page) = self.free.lock().pop() {
            return Ok(page);
        }
        Ok(PageId::new(self.next_page.fetch_add(1, Ordering::SeqCst)))
    }

    fn free_page(&self, page: PageId, _page_size: u32) -> Result<()> {
        if !page.is_valid() {
            return Err(StoreError::InvalidPageId(page));
        }
        self.free.lock().push(page);
        Ok(())
    }
}
