//! Dump file serialization.
//!
//! # Format
//!
//! ```text
//! Filetype: M1 NFC device
//! Version: 4
//! Device type: Ultralight/NTAG
//! UID: 04 11 22 33 44 55 66
//! ATQA: 44 00
//! SAK: 00
//! Version info: 00 04 04 02 01 00 11 03
//! Pages: 135
//! Page 000: 04 11 22 B7
//! ...
//! ```
//!
//! Lines end in CRLF. Only valid units are written, so a partially read card
//! produces a sparse body.

use std::io::Write;
use std::path::{Path, PathBuf};

use cardlab_core::{
    CardContext, Family, Technology, Uid,
    constants::{CLASSIC_BLOCK_SIZE, DUMP_EXTENSION, FILE_TYPE, FILE_VERSION, LINE_ENDING, T2T_PAGE_SIZE},
    hex::format_spaced,
};
use cardlab_hardware::Storage;
use tracing::{debug, info};

use crate::{DeviceType, DumpError, Result};

/// Write `ctx` to `out` in dump file format.
///
/// # Errors
/// - [`DumpError::NoCard`] if the context has no UID
/// - [`DumpError::Io`] on write failure
pub fn write_dump<W: Write + ?Sized>(out: &mut W, ctx: &CardContext) -> Result<()> {
    let uid = ctx.uid().ok_or(DumpError::NoCard)?;
    let nfca = ctx.nfca();
    let device_type = DeviceType::for_card(ctx.technology(), ctx.family(), nfca.has_ats());

    line(out, format_args!("Filetype: {FILE_TYPE}"))?;
    line(out, format_args!("Version: {FILE_VERSION}"))?;
    line(out, format_args!("Device type: {device_type}"))?;
    line(out, format_args!("UID: {uid}"))?;

    if ctx.technology() == Technology::A {
        if let Some(atqa) = nfca.atqa {
            line(out, format_args!("ATQA: {}", format_spaced(&atqa)))?;
        }
        if let Some(sak) = nfca.sak {
            line(out, format_args!("SAK: {sak:02X}"))?;
        }
        if let Some(ats) = nfca.ats.as_deref().filter(|ats| !ats.is_empty()) {
            line(out, format_args!("ATS: {}", format_spaced(ats)))?;
        }
    }

    if let Some(version) = ctx.version() {
        line(out, format_args!("Version info: {}", format_spaced(version)))?;
    }

    let dump = ctx.dump();
    if dump.has_dump() {
        match ctx.family() {
            Family::Ultralight if dump.unit_size() == T2T_PAGE_SIZE => {
                line(out, format_args!("Pages: {}", dump.unit_count()))?;
                for (index, page) in dump.valid_units() {
                    line(out, format_args!("Page {index:03}: {}", format_spaced(page)))?;
                }
            }
            Family::Classic(_) if dump.unit_size() == CLASSIC_BLOCK_SIZE => {
                line(out, format_args!("Blocks: {}", dump.unit_count()))?;
                for (index, block) in dump.valid_units() {
                    line(out, format_args!("Block {index}: {}", format_spaced(block)))?;
                }
            }
            family => debug!(%family, "No body for this family"),
        }
    }

    out.flush()?;
    Ok(())
}

/// Save `ctx` to `path`, creating or overwriting the file.
///
/// A failure partway through leaves a truncated file behind.
///
/// # Errors
/// Same as [`write_dump`], plus [`DumpError::Io`] if the file cannot be
/// created.
pub fn save(storage: &mut dyn Storage, path: &Path, ctx: &CardContext) -> Result<()> {
    if !ctx.is_loaded() {
        return Err(DumpError::NoCard);
    }
    let mut file = storage.open_new(path)?;
    write_dump(&mut file, ctx)?;
    info!(
        path = %path.display(),
        pages = ctx.dump().valid_count(),
        "Saved card dump"
    );
    Ok(())
}

/// Archive location of a card: `<dir>/<UIDHEX>.nfc`.
pub fn archive_path(dir: &Path, uid: &Uid) -> PathBuf {
    dir.join(format!("{}.{DUMP_EXTENSION}", uid.to_hex_compact()))
}

fn line<W: Write + ?Sized>(out: &mut W, args: std::fmt::Arguments<'_>) -> Result<()> {
    out.write_fmt(args)?;
    out.write_all(LINE_ENDING.as_bytes())?;
    Ok(())
}
