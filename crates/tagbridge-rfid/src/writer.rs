//! Page-by-page tag writer.

use crate::{Result, WriteError};
use tagbridge_core::constants::write_page_command;
use tagbridge_hardware::TagSession;
use tracing::{debug, info, trace};

/// Summary of a completed paged write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagedWriteReport {
    pub first_page: u8,
    pub pages_written: usize,
    pub bytes_written: usize,
}

/// Write `buffer` to consecutive pages starting at `start_page`.
///
/// One write command is sent per page, in ascending order. The first
/// failure stops the loop; pages already written stay written.
///
/// # Errors
///
/// - [`WriteError::MisalignedBuffer`] if `buffer` is not a whole number of pages
/// - [`WriteError::PageOutOfRange`] if the last page does not fit in a byte
/// - [`WriteError::PageWriteFailed`] on a non-`90 00` answer
/// - [`WriteError::Transport`] if the exchange itself fails
pub fn write_pages<S: TagSession>(
    session: &mut S,
    buffer: &[u8],
    start_page: u8,
    page_size: usize,
) -> Result<PagedWriteReport> {
    if page_size == 0 || buffer.len() % page_size != 0 {
        return Err(WriteError::MisalignedBuffer {
            len: buffer.len(),
            page_size,
        });
    }

    let page_count = buffer.len() / page_size;
    let last_page = start_page as usize + page_count;
    if page_count > 0 && last_page - 1 > u8::MAX as usize {
        return Err(WriteError::PageOutOfRange { page: last_page - 1 });
    }

    for (offset, chunk) in buffer.chunks(page_size).enumerate() {
        let page = start_page + offset as u8;
        trace!(page, "Sending page");

        let response = session
            .transmit(&write_page_command(page, chunk))
            .map_err(|source| WriteError::Transport { page, source })?;

        if !response.is_success() {
            return Err(WriteError::PageWriteFailed {
                page,
                sw1: response.sw1,
                sw2: response.sw2,
            });
        }
        info!(page, data = %hex(chunk), "Page written");
    }

    debug!(start_page, pages = page_count, "Paged write complete");
    Ok(PagedWriteReport {
        first_page: start_page,
        pages_written: page_count,
        bytes_written: buffer.len(),
    })
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
