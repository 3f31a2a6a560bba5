//! OakDB - the storage core of an embeddable ordered key/value database
//! engine.
//!
//! Two independent subsystems make up the core. The page manager caches
//! fixed-size pages from a caller-supplied block device in a bounded pool
//! of frames, with pin/dirty tracking, write-back on flush and teardown,
//! and a slotted record format on top. The ordered index is an in-memory
//! B+-tree whose leaves form a doubly-linked list, giving range scans in
//! both directions with inclusive or exclusive endpoints.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): block devices and the on-page format
//!   - `BlockDevice`: the four operations a manager needs from its store
//!   - `FileDevice` / `MemDevice`: file-backed and in-memory devices
//!   - `slotted`: page footer, slot array, and record/field indices
//!   - `record`: add/read records and walk their fields across page chains
//!
//! - **Buffer Pool** (`buffer`): memory management for pages
//!   - `PageManager`: pins pages into a fixed pool of frames
//!   - `PinnedPage`: scoped handle that releases its pin on drop
//!
//! - **Index** (`index`): ordered in-memory structures
//!   - `BPlusTree`: fanout-bounded tree with linked leaves
//!   - `RangeIter`: double-ended iterator over a key range
//!
//! # Example
//!
//! ```rust
//! use oakdb::buffer::PageManager;
//! use oakdb::index::BPlusTree;
//! use oakdb::storage::block::MemDevice;
//! use oakdb::storage::record::{add_record, read_record_slot};
//!
//! // Pin pages from a fixed pool over an in-memory device.
//! let mgr = PageManager::new(8, 256, MemDevice::new()).unwrap();
//! let first = {
//!     let page = mgr.new_pinned_page().unwrap();
//!     page.id()
//! };
//!
//! let index = add_record(&mgr, first, b"hello").unwrap();
//! let page = mgr.pin_page(index.page_id).unwrap();
//! let mut buf = [0u8; 5];
//! read_record_slot(&page, 0, &mut buf).unwrap();
//! assert_eq!(&buf, b"hello");
//!
//! // Separately, an in-memory ordered index.
//! let mut tree: BPlusTree<u32, &str, 4, 8> = BPlusTree::new();
//! tree.add(2, "two");
//! tree.add(1, "one");
//! let keys: Vec<u32> = tree.search_range(..).map(|(k, _)| *k).collect();
//! assert_eq!(keys, [1, 2]);
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{PageId, Result, StoreError};
pub use storage::page::{FieldIndex, RecordIndex};
