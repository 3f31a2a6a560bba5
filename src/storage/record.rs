//! Record and field access over slotted pages.
//!
//! Records are variable-length byte strings appended to a page chain: when
//! the starting page has no room left, the chain is followed (or extended
//! with a freshly allocated page) until the record fits. Each record gets a
//! slot holding its size; payload offsets are recovered by summing the
//! sizes of the slots before it.

use crate::buffer::{PageManager, PinnedPage};
use crate::common::{PageId, Result, StoreError};
use crate::storage::block::BlockDevice;
use crate::storage::page::slotted::{
    read_slot, read_u32, write_slot, FieldIndex, PageFooter, RecordIndex, FOOTER_SIZE, SLOT_SIZE,
};

/// Appends `record` to the page chain starting at `page`.
///
/// Rejects records that could not fit even on a fresh page, before any
/// device I/O. Otherwise walks the `next_page` chain until a page with
/// room is found, allocating and linking a new page at the tail when
/// necessary, and returns the index of the stored record.
pub fn add_record<D: BlockDevice>(
    mgr: &PageManager<D>,
    page: PageId,
    record: &[u8],
) -> Result<RecordIndex> {
    let record_size = record.len() as u32;
    let available = mgr.page_data_size() - SLOT_SIZE;
    if available < record_size {
        return Err(StoreError::RecordTooLarge {
            record_size,
            available,
        });
    }

    let mut page_id = page;
    let mut pin = mgr.pin_page(page_id)?;

    loop {
        let footer = PageFooter::read_from(&pin.data());

        if footer.free_space >= record_size + SLOT_SIZE {
            let slot_index = footer.records;
            let slots_base = pin.size()
                - FOOTER_SIZE as usize
                - footer.records as usize * SLOT_SIZE as usize;
            let offset = slots_base - footer.free_space as usize;

            let mut data = pin.data_mut();
            data[offset..offset + record.len()].copy_from_slice(record);
            write_slot(&mut data, slot_index, record_size);
            PageFooter {
                records: footer.records + 1,
                free_space: footer.free_space - (record_size + SLOT_SIZE),
                ..footer
            }
            .write_to(&mut data);
            drop(data);

            return Ok(RecordIndex {
                page_id,
                slot_index,
                offset: offset as u32,
                size: record_size,
            });
        }

        if footer.next_page.is_valid() {
            // Move to the next page in the chain.
            page_id = footer.next_page;
            pin = mgr.pin_page(page_id)?;
        } else {
            // Extend the chain with a fresh page.
            let next = mgr.new_pinned_page()?;
            {
                let mut data = pin.data_mut();
                PageFooter {
                    next_page: next.id(),
                    ..footer
                }
                .write_to(&mut data);
            }
            page_id = next.id();
            pin = next;
        }
    }
}

/// Recovers the [`RecordIndex`] for slot `index` on the pinned page.
pub fn get_record(page: &PinnedPage, index: u32) -> Result<RecordIndex> {
    let data = page.data();
    let footer = PageFooter::read_from(&data);

    if index >= footer.records {
        return Err(StoreError::InvalidSlot(index));
    }

    let mut offset = 0;
    for slot in 0..index {
        offset += read_slot(&data, slot);
    }
    let size = read_slot(&data, index);

    Ok(RecordIndex {
        page_id: page.id(),
        slot_index: index,
        offset,
        size,
    })
}

/// Copies the record's payload into `buf`, truncating to the shorter of
/// the two. The index must name the pinned page.
pub fn read_record(page: &PinnedPage, record: &RecordIndex, buf: &mut [u8]) -> Result<()> {
    if record.page_id != page.id() {
        return Err(StoreError::WrongPage {
            expected: record.page_id,
            actual: page.id(),
        });
    }

    let data = page.data();
    let n = buf.len().min(record.size as usize);
    let start = record.offset as usize;
    buf[..n].copy_from_slice(&data[start..start + n]);
    Ok(())
}

/// Recovers the record index for `slot` and copies its (truncated)
/// payload into `buf` in one step.
pub fn read_record_slot(page: &PinnedPage, slot: u32, buf: &mut [u8]) -> Result<RecordIndex> {
    let record = get_record(page, slot)?;

    let data = page.data();
    let n = buf.len().min(record.size as usize);
    let start = record.offset as usize;
    buf[..n].copy_from_slice(&data[start..start + n]);
    Ok(record)
}

/// Locates field `field` of a record whose payload starts with
/// `FIELD_COUNT` little-endian u32 field lengths followed by the
/// concatenated field bytes. The returned offset is relative to the field
/// data region (after the length prefix).
pub fn get_field<const FIELD_COUNT: u32>(
    page: &PinnedPage,
    record: &RecordIndex,
    field: u32,
) -> Result<FieldIndex> {
    if field >= FIELD_COUNT {
        return Err(StoreError::InvalidField(field));
    }

    let data = page.data();
    let base = record.offset as usize;

    let mut offset = 0;
    for i in 0..field {
        offset += read_u32(&data, base + i as usize * SLOT_SIZE as usize);
    }
    let size = read_u32(&data, base + field as usize * SLOT_SIZE as usize);

    Ok(FieldIndex {
        page_id: page.id(),
        slot_index: record.slot_index,
        field_index: field,
        offset,
        size,
    })
}
