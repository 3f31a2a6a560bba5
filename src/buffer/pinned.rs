use std::cell::{Ref, RefMut};
use std::rc::Rc;

use crate::common::PageId;

use super::pool::{Directory, Frame};

/// Scoped handle to a pinned page frame.
///
/// While a handle is alive its directory entry keeps a non-zero pin count,
/// so the frame cannot be evicted or reused. Several handles may pin the
/// same page at once; they share the frame. Dropping the handle releases
/// the pin and, if the handle was marked dirty, marks the directory entry
/// dirty so the page is written back before eviction.
pub struct PinnedPage {
    directory: Rc<Directory>,
    frame: Rc<Frame>,
    page_id: PageId,
    size: usize,
    dirty: bool,
}

impl PinnedPage {
    pub(crate) fn new(
        directory: Rc<Directory>,
        frame: Rc<Frame>,
        page_id: PageId,
        size: usize,
    ) -> Self {
        Self {
            directory,
            frame,
            page_id,
            size,
            dirty: false,
        }
    }

    /// The pinned page's id.
    pub fn id(&self) -> PageId {
        self.page_id
    }

    /// The page size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this handle has been marked dirty.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the handle dirty; the page will be written back on flush,
    /// eviction, or manager teardown.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Read access to the page bytes.
    pub fn data(&self) -> Ref<'_, [u8]> {
        Ref::map(self.frame.data.borrow(), |data| &data[..])
    }

    /// Write access to the page bytes. Marks the handle dirty.
    pub fn data_mut(&mut self) -> RefMut<'_, [u8]> {
        self.dirty = true;
        RefMut::map(self.frame.data.borrow_mut(), |data| &mut data[..])
    }
}

impl Drop for PinnedPage {
    fn drop(&mut self) {
        if !self.page_id.is_valid() {
            return;
        }
        let mut entries = self.directory.entries.borrow_mut();
        if let Some(entry) = entries.iter_mut().find(|e| e.page == self.page_id) {
            if self.dirty {
                entry.dirty = true;
            }
            if entry.pin_count > 0 {
                entry.pin_count -= 1;
            }
        }
    }
}
