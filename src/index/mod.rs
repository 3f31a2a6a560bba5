pub mod btree;
pub mod iter;

pub use btree::BPlusTree;
pub use iter::RangeIter;
