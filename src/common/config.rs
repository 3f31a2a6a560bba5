/// Default size of a page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: u32 = 4096;

/// Default buffer pool size (number of frames)
pub const DEFAULT_POOL_SIZE: usize = 10;
