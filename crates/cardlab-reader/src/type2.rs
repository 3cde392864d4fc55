//! Type-2 tag memory acquisition.
//!
//! The page count comes from the GET_VERSION size code. Memory is then read
//! four pages at a time with bounded retries. A block whose retries run out
//! is zero-filled and still marked valid so later pages keep their
//! position; a link loss stops acquisition and keeps what was read.

use std::thread;
use std::time::Duration;

use cardlab_core::{
    CardContext, Dump,
    constants::{
        CMD_GET_VERSION, CMD_READ, T2T_DEFAULT_PAGE_COUNT, T2T_PAGE_SIZE, T2T_PAGES_PER_READ,
        T2T_READ_RESPONSE_LEN, T2T_VERSION_LEN, T2T_VERSION_SIZE_INDEX,
    },
};
use cardlab_hardware::Transceiver;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::tlv;

/// Page count of an NTAG21x storage size code.
pub fn page_count_for_size_code(code: u8) -> Option<usize> {
    match code {
        0x0F => Some(45),
        0x11 => Some(135),
        0x13 => Some(231),
        _ => None,
    }
}

/// Retry and sizing parameters of one acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireParams {
    /// Attempts per GET_VERSION.
    pub version_attempts: u32,
    /// Attempts per 4-page READ.
    pub block_retries: u32,
    /// Pause between READ attempts of the same block.
    pub retry_delay: Duration,
    /// Frame wait time per exchange.
    pub frame_wait_time: Duration,
    /// Page count used when GET_VERSION gives no usable size code.
    pub fallback_page_count: usize,
}

impl Default for AcquireParams {
    fn default() -> Self {
        Self {
            version_attempts: 2,
            block_retries: 3,
            retry_delay: Duration::from_millis(5),
            frame_wait_time: Duration::from_millis(5),
            fallback_page_count: T2T_DEFAULT_PAGE_COUNT,
        }
    }
}

/// Outcome of [`acquire_type2_image`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionReport {
    /// Page count of the image.
    pub pages_total: usize,
    /// Pages read from the card.
    pub pages_read: usize,
    /// Pages zero-filled after a block exhausted its retries.
    pub pages_zero_filled: usize,
    pub aborted_on_link_loss: bool,
    /// Length of the NDEF message found, if any.
    pub ndef_len: Option<usize>,
}

/// GET_VERSION with bounded attempts. An all-zero reply counts as a
/// failed attempt.
pub fn read_version<R>(radio: &mut R, params: &AcquireParams) -> Option<[u8; T2T_VERSION_LEN]>
where
    R: Transceiver + ?Sized,
{
    for attempt in 1..=params.version_attempts {
        match radio.transceive_blocking(&[CMD_GET_VERSION], params.frame_wait_time) {
            Ok(rx) if rx.len() >= T2T_VERSION_LEN && rx.iter().any(|&b| b != 0) => {
                let mut version = [0u8; T2T_VERSION_LEN];
                version.copy_from_slice(&rx[..T2T_VERSION_LEN]);
                return Some(version);
            }
            Ok(rx) => debug!(attempt, len = rx.len(), "Discarding empty GET_VERSION reply"),
            Err(e) if e.is_link_loss() => return None,
            Err(e) => debug!(attempt, error = %e, "GET_VERSION failed"),
        }
    }
    None
}

enum BlockOutcome {
    Read(Vec<u8>),
    Exhausted,
    LinkLoss,
}

fn read_block<R>(radio: &mut R, page: usize, params: &AcquireParams) -> BlockOutcome
where
    R: Transceiver + ?Sized,
{
    // Page numbers are a single byte on the air.
    let Ok(page_byte) = u8::try_from(page) else {
        return BlockOutcome::Exhausted;
    };
    for attempt in 1..=params.block_retries {
        match radio.transceive_blocking(&[CMD_READ, page_byte], params.frame_wait_time) {
            Ok(rx) if rx.len() >= T2T_READ_RESPONSE_LEN => return BlockOutcome::Read(rx),
            Ok(rx) => warn!(page, attempt, len = rx.len(), "Short READ reply"),
            Err(e) if e.is_link_loss() => return BlockOutcome::LinkLoss,
            Err(e) => warn!(page, attempt, error = %e, "READ failed"),
        }
        if attempt < params.block_retries && !params.retry_delay.is_zero() {
            thread::sleep(params.retry_delay);
        }
    }
    BlockOutcome::Exhausted
}

/// Write one page into the configured dump. Returns `false` if the page
/// falls outside it, which means the dump was sized wrong.
fn store_page(dump: &mut Dump, index: usize, page: &[u8]) -> bool {
    match dump.write_unit(index, page) {
        Ok(()) => true,
        Err(e) => {
            warn!(page = index, error = %e, "Page outside acquisition dump");
            false
        }
    }
}

/// Read the full memory image of the activated Type-2 tag into `ctx`.
///
/// The context's dump is reconfigured to 4-byte pages, registered, and the
/// cached version and NDEF message are updated. The page count is capped to
/// the dump capacity.
pub fn acquire_type2_image<R>(
    radio: &mut R,
    ctx: &mut CardContext,
    params: &AcquireParams,
) -> AcquisitionReport
where
    R: Transceiver + ?Sized,
{
    let version = read_version(radio, params);
    let wanted = version
        .and_then(|v| page_count_for_size_code(v[T2T_VERSION_SIZE_INDEX]))
        .unwrap_or(params.fallback_page_count);
    let pages_total = wanted.min(ctx.dump().max_units(T2T_PAGE_SIZE));
    ctx.set_version(version);

    let mut report = AcquisitionReport {
        pages_total,
        ..AcquisitionReport::default()
    };
    let dump = ctx.dump_mut();
    if let Err(e) = dump.configure(T2T_PAGE_SIZE, pages_total) {
        warn!(error = %e, "Cannot size dump for acquisition");
        return report;
    }
    debug!(pages_total, has_version = version.is_some(), "Acquiring Type-2 image");

    for first in (0..pages_total).step_by(T2T_PAGES_PER_READ) {
        let pages = T2T_PAGES_PER_READ.min(pages_total - first);
        match read_block(radio, first, params) {
            BlockOutcome::Read(rx) => {
                report.pages_read += rx
                    .chunks_exact(T2T_PAGE_SIZE)
                    .take(pages)
                    .enumerate()
                    .filter(|(offset, page)| store_page(dump, first + offset, page))
                    .count();
            }
            BlockOutcome::Exhausted => {
                warn!(page = first, "Block retries exhausted, zero-filling");
                report.pages_zero_filled += (first..first + pages)
                    .filter(|&index| store_page(dump, index, &[0; T2T_PAGE_SIZE]))
                    .count();
            }
            BlockOutcome::LinkLoss => {
                info!(page = first, "Card left the field during acquisition");
                report.aborted_on_link_loss = true;
                break;
            }
        }
    }
    dump.set_has_dump(true);

    let ndef = tlv::find_ndef(ctx.dump().as_bytes()).map(<[u8]>::to_vec);
    report.ndef_len = ndef.as_ref().map(Vec::len);
    ctx.set_ndef(ndef);
    ctx.refresh_summary();

    info!(
        pages_total = report.pages_total,
        pages_read = report.pages_read,
        zero_filled = report.pages_zero_filled,
        aborted = report.aborted_on_link_loss,
        "Type-2 acquisition finished"
    );
    report
}
