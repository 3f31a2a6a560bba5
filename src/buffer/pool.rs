use std::cell::RefCell;
use std::rc::Rc;

use crate::common::{PageId, Result, StoreError, DEFAULT_PAGE_SIZE, DEFAULT_POOL_SIZE};
use crate::storage::block::BlockDevice;
use crate::storage::page::slotted::{PageFooter, FOOTER_SIZE, SLOT_SIZE};

use super::pinned::PinnedPage;

/// A buffer frame: the backing bytes for one pool slot. Frames never move;
/// directory entries address them by pool index.
pub(crate) struct Frame {
    pub(crate) data: RefCell<Box<[u8]>>,
}

/// Bookkeeping for one frame. The directory holds exactly `pool_size`
/// entries for the manager's whole life; `pool_index` is assigned at
/// construction and never changes, while the entries themselves are
/// reordered to track recency.
#[derive(Debug, Clone)]
pub(crate) struct DirEntry {
    pub(crate) dirty: bool,
    pub(crate) page: PageId,
    pub(crate) pool_index: usize,
    pub(crate) pin_count: usize,
}

/// The frame directory, shared between the manager and its pinned handles.
pub(crate) struct Directory {
    pub(crate) entries: RefCell<Vec<DirEntry>>,
}

/// PageManager caches pages from a block device in a fixed pool of frames.
///
/// Pages are pinned to obtain a [`PinnedPage`] handle over the raw bytes;
/// pinned frames are never evicted. Eviction keeps no access stamps:
/// whenever a frame is (re)filled its entry rotates to the directory tail,
/// so a left-to-right scan finds the least recently admitted unpinned
/// frame first. Dirty frames are written back before reuse, on flush, and
/// on teardown.
pub struct PageManager<D: BlockDevice> {
    page_size: u32,
    frames: Vec<Rc<Frame>>,
    directory: Rc<Directory>,
    device: D,
}

impl<D: BlockDevice> PageManager<D> {
    /// Creates a manager with `pool_size` frames of `page_size` bytes over
    /// the given device. Fails if a page could not hold even the footer
    /// plus a single record slot.
    pub fn new(pool_size: usize, page_size: u32, device: D) -> Result<Self> {
        if page_size <= FOOTER_SIZE + SLOT_SIZE {
            return Err(StoreError::PageTooSmall {
                page_size,
                minimum: FOOTER_SIZE + SLOT_SIZE + 1,
            });
        }

        let frames = (0..pool_size)
            .map(|_| {
                Rc::new(Frame {
                    data: RefCell::new(vec![0u8; page_size as usize].into_boxed_slice()),
                })
            })
            .collect();

        let entries = (0..pool_size)
            .map(|i| DirEntry {
                dirty: false,
                page: PageId::INVALID,
                pool_index: i,
                pin_count: 0,
            })
            .collect();

        Ok(Self {
            page_size,
            frames,
            directory: Rc::new(Directory {
                entries: RefCell::new(entries),
            }),
            device,
        })
    }

    /// Creates a manager with the default pool and page size.
    pub fn with_defaults(device: D) -> Result<Self> {
        Self::new(DEFAULT_POOL_SIZE, DEFAULT_PAGE_SIZE, device)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Usable bytes on a page once the footer is accounted for.
    pub fn page_data_size(&self) -> u32 {
        self.page_size - FOOTER_SIZE
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Pins `page`, loading it from the device if it is not resident.
    /// Every frame holding the page stays in place until the returned
    /// handle (and any others for the same page) is dropped.
    pub fn pin_page(&self, page: PageId) -> Result<PinnedPage> {
        if !page.is_valid() {
            return Err(StoreError::InvalidPageId(page));
        }

        let hit = {
            let mut entries = self.directory.entries.borrow_mut();
            entries.iter_mut().find(|e| e.page == page).map(|entry| {
                entry.pin_count += 1;
                entry.pool_index
            })
        };
        if let Some(pool_index) = hit {
            return Ok(self.handle(page, pool_index));
        }

        self.load_page(page)
    }

    /// Allocates a page on the device and pins it. The frame is zeroed and
    /// a fresh footer written, so the page is immediately usable for
    /// records. The returned handle is already dirty.
    pub fn new_pinned_page(&self) -> Result<PinnedPage> {
        let slot = self.make_dir_entry()?;

        let page = match self.device.allocate_page(self.page_size) {
            Ok(page) => page,
            Err(e) => {
                // Give the reservation back; nothing was loaded.
                self.directory.entries.borrow_mut()[slot].pin_count = 0;
                return Err(e);
            }
        };

        let pool_index = {
            let mut entries = self.directory.entries.borrow_mut();
            let entry = &mut entries[slot];
            entry.page = page;
            entry.pin_count = 1;
            entry.dirty = true;
            entry.pool_index
        };

        {
            let mut data = self.frames[pool_index].data.borrow_mut();
            data.fill(0);
            PageFooter::fresh(self.page_size).write_to(&mut data);
        }

        self.rotate_to_tail(slot);

        let mut pin = self.handle(page, pool_index);
        pin.mark_dirty();
        Ok(pin)
    }

    /// Writes `page` back iff it occupies an unpinned dirty frame, clearing
    /// the dirty flag on success. Flushing a pinned, clean, or unknown page
    /// is an error and performs no I/O.
    pub fn flush_page(&self, page: PageId) -> Result<()> {
        if !page.is_valid() {
            return Err(StoreError::InvalidPageId(page));
        }

        let found = {
            let entries = self.directory.entries.borrow();
            entries
                .iter()
                .find(|e| e.page == page && e.pin_count == 0 && e.dirty)
                .map(|e| e.pool_index)
        };
        let pool_index = match found {
            Some(pool_index) => pool_index,
            None => return Err(StoreError::NothingToFlush(page)),
        };

        {
            let data = self.frames[pool_index].data.borrow();
            self.device.write_page(page, &data)?;
        }

        let mut entries = self.directory.entries.borrow_mut();
        if let Some(entry) = entries.iter_mut().find(|e| e.page == page) {
            entry.dirty = false;
        }
        Ok(())
    }

    /// Writes back every unpinned dirty frame, stopping at the first
    /// device error.
    pub fn flush_free_pages(&self) -> Result<()> {
        let candidates: Vec<(PageId, usize)> = {
            let entries = self.directory.entries.borrow();
            entries
                .iter()
                .filter(|e| e.pin_count == 0 && e.dirty)
                .map(|e| (e.page, e.pool_index))
                .collect()
        };

        for (page, pool_index) in candidates {
            {
                let data = self.frames[pool_index].data.borrow();
                self.device.write_page(page, &data)?;
            }
            let mut entries = self.directory.entries.borrow_mut();
            if let Some(entry) = entries.iter_mut().find(|e| e.page == page) {
                entry.dirty = false;
            }
        }
        Ok(())
    }

    /// Pin count currently recorded for `page`, if it occupies a frame.
    pub fn pin_count(&self, page: PageId) -> Option<usize> {
        self.directory
            .entries
            .borrow()
            .iter()
            .find(|e| e.page == page)
            .map(|e| e.pin_count)
    }

    fn handle(&self, page: PageId, pool_index: usize) -> PinnedPage {
        PinnedPage::new(
            Rc::clone(&self.directory),
            Rc::clone(&self.frames[pool_index]),
            page,
            self.page_size as usize,
        )
    }

    /// Loads a non-resident page into a reserved frame and pins it.
    fn load_page(&self, page: PageId) -> Result<PinnedPage> {
        let slot = self.make_dir_entry()?;

        let pool_index = {
            let mut entries = self.directory.entries.borrow_mut();
            let entry = &mut entries[slot];
            entry.page = page;
            entry.pin_count = 1;
            entry.pool_index
        };

        let read = {
            let mut data = self.frames[pool_index].data.borrow_mut();
            self.device.read_page(page, &mut data)
        };
        if let Err(e) = read {
            // Release the reservation so the frame stays reusable.
            let mut entries = self.directory.entries.borrow_mut();
            let entry = &mut entries[slot];
            entry.page = PageId::INVALID;
            entry.pin_count = 0;
            return Err(e);
        }

        self.rotate_to_tail(slot);
        Ok(self.handle(page, pool_index))
    }

    /// Reserves the leftmost unpinned directory entry, writing its old
    /// contents back first when dirty. The reservation holds a pin count
    /// of one so a nested reservation cannot steal the frame.
    fn make_dir_entry(&self) -> Result<usize> {
        let (slot, write_back) = {
            let entries = self.directory.entries.borrow();
            match entries.iter().position(|e| e.pin_count == 0) {
                Some(slot) => (slot, entries[slot].dirty),
                None => return Err(StoreError::PoolExhausted),
            }
        };

        if write_back {
            let (page, pool_index) = {
                let entries = self.directory.entries.borrow();
                (entries[slot].page, entries[slot].pool_index)
            };
            let data = self.frames[pool_index].data.borrow();
            self.device.write_page(page, &data)?;
        }

        let mut entries = self.directory.entries.borrow_mut();
        let entry = &mut entries[slot];
        entry.dirty = false;
        entry.pin_count = 1;
        Ok(slot)
    }

    /// Moves the entry at `slot` to the directory tail, so recently
    /// admitted frames are the last eviction candidates.
    fn rotate_to_tail(&self, slot: usize) {
        let mut entries = self.directory.entries.borrow_mut();
        let entry = entries.remove(slot);
        entries.push(entry);
    }
}

impl<D: BlockDevice> Drop for PageManager<D> {
    fn drop(&mut self) {
        // Best-effort write-back; there is no channel left to report errors.
        let entries = self.directory.entries.borrow();
        for entry in entries.iter() {
            if entry.dirty {
                let data = self.frames[entry.pool_index].data.borrow();
                let _ = self.device.write_page(entry.page, &data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::block::MemDevice;

    #[test]
    fn test_page_size_floor() {
        let minimum = FOOTER_SIZE + SLOT_SIZE;
        assert!(matches!(
            PageManager::new(1, minimum, MemDevice::new()),
            Err(StoreError::PageTooSmall { .. })
        ));
        assert!(PageManager::new(1, minimum + 1, MemDevice::new()).is_ok());
    }

    #[test]
    fn test_with_defaults() {
        let mgr = PageManager::with_defaults(MemDevice::new()).unwrap();
        assert_eq!(mgr.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(mgr.pool_size(), DEFAULT_POOL_SIZE);
        assert_eq!(mgr.page_data_size(), DEFAULT_PAGE_SIZE - FOOTER_SIZE);
    }

    #[test]
    fn test_pin_counts() {
        let mgr = PageManager::new(2, 64, MemDevice::new()).unwrap();

        let p1 = mgr.pin_page(PageId::new(1)).unwrap();
        assert_eq!(mgr.pin_count(PageId::new(1)), Some(1));

        let p2 = mgr.pin_page(PageId::new(1)).unwrap();
        assert_eq!(mgr.pin_count(PageId::new(1)), Some(2));

        drop(p2);
        assert_eq!(mgr.pin_count(PageId::new(1)), Some(1));
        drop(p1);
        assert_eq!(mgr.pin_count(PageId::new(1)), Some(0));
    }

    #[test]
    fn test_pin_invalid_page() {
        let mgr = PageManager::new(1, 64, MemDevice::new()).unwrap();
        assert!(matches!(
            mgr.pin_page(PageId::INVALID),
            Err(StoreError::InvalidPageId(_))
        ));
    }

    #[test]
    fn test_oldest_unpinned_frame_is_evicted() {
        let mgr = PageManager::new(2, 64, MemDevice::new()).unwrap();

        mgr.pin_page(PageId::new(1)).unwrap();
        mgr.pin_page(PageId::new(2)).unwrap();

        // Page 1 was admitted first, so it is the eviction victim.
        mgr.pin_page(PageId::new(3)).unwrap();
        assert_eq!(mgr.pin_count(PageId::new(1)), None);
        assert_eq!(mgr.pin_count(PageId::new(2)), Some(0));
        assert_eq!(mgr.pin_count(PageId::new(3)), Some(0));
    }

    #[test]
    fn test_new_pinned_page_is_dirty() {
        let mgr = PageManager::new(1, 64, MemDevice::new()).unwrap();
        let pin = mgr.new_pinned_page().unwrap();

        assert!(pin.dirty());
        assert_eq!(pin.size(), 64);
        let footer = PageFooter::read_from(&pin.data());
        assert_eq!(footer, PageFooter::fresh(64));
    }

    #[test]
    fn test_shared_handles_share_the_frame() {
        let mgr = PageManager::new(1, 64, MemDevice::new()).unwrap();
        let page = {
            let pin = mgr.new_pinned_page().unwrap();
            pin.id()
        };

        let mut writer = mgr.pin_page(page).unwrap();
        let reader = mgr.pin_page(page).unwrap();

        writer.data_mut()[0] = 0xAB;
        assert_eq!(reader.data()[0], 0xAB);
    }
}
