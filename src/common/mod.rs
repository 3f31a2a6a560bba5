pub mod config;
pub mod error;
pub mod types;

pub use config::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_SIZE};
pub use error::{Result, StoreError};
pub use types::PageId;
