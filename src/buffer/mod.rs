mod pinned;
mod pool;

pub use pinned::PinnedPage;
pub use pool::PageManager;
