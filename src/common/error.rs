use thiserror::Error;

use super::types::PageId;

/// Storage error types
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("page size {page_size} too small, a page must hold at least {minimum} bytes")]
    PageTooSmall { page_size: u32, minimum: u32 },

    #[error("buffer pool is full, no unpinned frames available")]
    PoolExhausted,

    #[error("page {0} has no unpinned dirty frame to flush")]
    NothingToFlush(PageId),

    #[error("record of {record_size} bytes exceeds page capacity of {available}")]
    RecordTooLarge { record_size: u32, available: u32 },

    #[error("invalid slot index: {0}")]
    InvalidSlot(u32),

    #[error("invalid field index: {0}")]
    InvalidField(u32),

    #[error("record belongs to page {expected}, not {actual}")]
    WrongPage { expected: PageId, actual: PageId },

    #[error("device has no pages left to allocate")]
    OutOfPages,
}

pub type Result<T> = std::result::Result<T, StoreError>;
