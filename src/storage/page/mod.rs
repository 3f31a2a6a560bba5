pub mod slotted;

pub use slotted::{FieldIndex, PageFooter, RecordIndex, FOOTER_SIZE, SLOT_SIZE};
