//! Dump file deserialization.
//!
//! Loading runs in two phases. The header phase collects `Key: value` lines
//! up to the first `Page ` or `Block ` line and validates them; the body
//! phase decodes memory units into the context's dump. Blank lines, `#`
//! comments and unrecognized lines are skipped in both phases.

use std::collections::HashMap;
use std::io::{BufRead, ErrorKind};
use std::path::Path;

use cardlab_core::{
    CardContext, Family, NfcAParams, Source, Technology, Uid,
    constants::{FILE_TYPE, FILE_VERSION, MAX_ATS_LENGTH, MAX_UID_LENGTH, T2T_MAX_PAGES, T2T_VERSION_LEN},
    hex::{decode_hex, parse_hex},
};
use cardlab_hardware::Storage;
use tracing::{debug, info, warn};

use crate::{DeviceType, DumpError, Result};

const PAGE_PREFIX: &str = "Page ";
const BLOCK_PREFIX: &str = "Block ";

/// Header values keyed by name, with the line they came from.
struct Header {
    fields: HashMap<String, (usize, String)>,
}

impl Header {
    fn get(&self, key: &str) -> Option<(usize, &str)> {
        self.fields
            .get(key)
            .map(|(line, value)| (*line, value.as_str()))
    }

    fn require(&self, key: &str) -> Result<(usize, &str)> {
        self.get(key)
            .ok_or_else(|| DumpError::format(0, format!("missing {key}")))
    }

    /// Optional hex field of exactly `len` bytes; anything else is absent.
    fn exact_hex(&self, key: &str, len: usize) -> Option<Vec<u8>> {
        let (_, value) = self.get(key)?;
        decode_hex(value, len).ok().filter(|bytes| bytes.len() == len)
    }
}

/// Line source that tracks line numbers and maps stream failures to
/// [`DumpError::Io`].
struct Lines<R> {
    input: R,
    number: usize,
    buf: String,
}

impl<R: BufRead> Lines<R> {
    fn new(input: R) -> Self {
        Self {
            input,
            number: 0,
            buf: String::new(),
        }
    }

    /// Next line without its terminator, `None` at end of stream.
    fn next_line(&mut self) -> Result<Option<(usize, &str)>> {
        self.buf.clear();
        let read = self.input.read_line(&mut self.buf).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => DumpError::format(self.number + 1, "line is not valid UTF-8"),
            _ => DumpError::Io(e),
        })?;
        if read == 0 {
            return Ok(None);
        }
        self.number += 1;
        Ok(Some((self.number, self.buf.trim_end_matches(['\r', '\n']))))
    }
}

fn is_skipped(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

fn is_body(line: &str) -> bool {
    line.starts_with(PAGE_PREFIX) || line.starts_with(BLOCK_PREFIX)
}

/// Decode a dump from `input` into `ctx`.
///
/// The context is reset first. On failure it is reset again, so a caller
/// never sees a half-loaded card.
///
/// # Errors
/// - [`DumpError::NoBuffer`] if the context's dump has zero capacity
/// - [`DumpError::Format`] for a bad `Filetype`/`Version`, a missing or
///   malformed `UID`, or malformed body lines
/// - [`DumpError::UnsupportedDevice`] for an unknown `Device type`
/// - [`DumpError::Io`] on stream failure
pub fn read_dump<R: BufRead>(input: R, ctx: &mut CardContext) -> Result<()> {
    ctx.reset();
    if ctx.dump().capacity() == 0 {
        return Err(DumpError::NoBuffer);
    }

    let result = decode(Lines::new(input), ctx);
    if result.is_err() {
        ctx.reset();
    }
    result
}

/// Load the dump at `path` into `ctx`, recording the path as its source.
///
/// # Errors
/// Same as [`read_dump`], plus [`DumpError::Io`] if the file cannot be opened.
pub fn load(storage: &mut dyn Storage, path: &Path, ctx: &mut CardContext) -> Result<()> {
    if ctx.dump().capacity() == 0 {
        ctx.reset();
        return Err(DumpError::NoBuffer);
    }
    let file = storage.open_read(path)?;
    match read_dump(file, ctx) {
        Ok(()) => {
            ctx.set_source(Source::LoadFile {
                path: path.to_path_buf(),
            });
            info!(
                path = %path.display(),
                summary = %ctx.summary().title,
                units = ctx.dump().valid_count(),
                "Loaded card dump"
            );
            Ok(())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load card dump");
            Err(e)
        }
    }
}

fn decode<R: BufRead>(mut lines: Lines<R>, ctx: &mut CardContext) -> Result<()> {
    // Header phase
    let mut fields = HashMap::new();
    let mut first_body: Option<(usize, String)> = None;
    while let Some((number, line)) = lines.next_line()? {
        if is_skipped(line) {
            continue;
        }
        if is_body(line) {
            first_body = Some((number, line.to_string()));
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            fields
                .entry(key.trim().to_string())
                .or_insert_with(|| (number, value.trim().to_string()));
        }
    }
    let header = Header { fields };
    apply_header(&header, ctx)?;

    // Body phase
    let pages_declared = header
        .get("Pages")
        .and_then(|(_, value)| value.parse::<usize>().ok());
    size_dump(ctx, pages_declared)?;

    if let Some((number, line)) = first_body {
        body_line(number, &line, ctx)?;
    }
    while let Some((number, line)) = lines.next_line()? {
        if is_skipped(line) || !is_body(line) {
            continue;
        }
        body_line(number, line, ctx)?;
    }

    finish_dump(ctx, pages_declared);
    ctx.refresh_summary();
    Ok(())
}

fn apply_header(header: &Header, ctx: &mut CardContext) -> Result<()> {
    let (line, filetype) = header.require("Filetype")?;
    if filetype != FILE_TYPE {
        return Err(DumpError::format(line, format!("unexpected Filetype {filetype:?}")));
    }
    let (line, version) = header.require("Version")?;
    if version != FILE_VERSION {
        return Err(DumpError::format(line, format!("unexpected Version {version:?}")));
    }

    let (_, device) = header.require("Device type")?;
    let device: DeviceType = device.parse()?;

    let (line, uid_hex) = header.require("UID")?;
    let uid_bytes = decode_hex(uid_hex, MAX_UID_LENGTH)
        .map_err(|e| DumpError::format(line, format!("UID: {e}")))?;
    let uid = Uid::new(&uid_bytes).map_err(|e| DumpError::format(line, e.to_string()))?;

    let technology = device.technology();
    ctx.set_technology(technology);
    ctx.set_family(device.family());
    ctx.set_uid(uid);

    if technology == Technology::A {
        let ats = header
            .get("ATS")
            .and_then(|(_, value)| decode_hex(value, MAX_ATS_LENGTH).ok())
            .filter(|ats| !ats.is_empty());
        ctx.set_nfca(NfcAParams {
            atqa: header
                .exact_hex("ATQA", 2)
                .map(|bytes| [bytes[0], bytes[1]]),
            sak: header.exact_hex("SAK", 1).map(|bytes| bytes[0]),
            ats,
        });
    }

    let version = header
        .exact_hex("Version info", T2T_VERSION_LEN)
        .and_then(|bytes| <[u8; T2T_VERSION_LEN]>::try_from(bytes).ok());
    ctx.set_version(version);

    debug!(%device, uid = %ctx.summary().subtitle, "Dump header accepted");
    Ok(())
}

/// Size the dump for the family, capped to the buffer capacity.
fn size_dump(ctx: &mut CardContext, pages_declared: Option<usize>) -> Result<()> {
    let family = ctx.family();
    let unit_size = family.unit_size();
    let wanted = match family {
        Family::Classic(kind) => kind.block_count(),
        _ => pages_declared.unwrap_or(T2T_MAX_PAGES),
    };
    let dump = ctx.dump_mut();
    let count = wanted.min(dump.max_units(unit_size));
    if count < wanted {
        debug!(wanted, count, "Dump capped to buffer capacity");
    }
    dump.configure(unit_size, count)
        .map_err(|e| DumpError::format(0, e.to_string()))
}

fn body_line(number: usize, line: &str, ctx: &mut CardContext) -> Result<()> {
    let rest = line
        .strip_prefix(PAGE_PREFIX)
        .or_else(|| line.strip_prefix(BLOCK_PREFIX))
        .unwrap_or(line);
    let (index, payload) = rest
        .split_once(':')
        .ok_or_else(|| DumpError::format(number, "missing ':' after unit index"))?;
    let index: usize = index
        .trim()
        .parse()
        .map_err(|_| DumpError::format(number, format!("bad unit index {:?}", index.trim())))?;

    let dump = ctx.dump_mut();
    let mut unit = vec![0u8; dump.unit_size()];
    let len = parse_hex(payload, &mut unit).map_err(|e| DumpError::format(number, e.to_string()))?;

    if index >= dump.unit_count() {
        debug!(index, count = dump.unit_count(), "Dropping out-of-range unit");
        return Ok(());
    }
    dump.write_unit(index, &unit[..len])
        .map_err(|e| DumpError::format(number, e.to_string()))
}

fn finish_dump(ctx: &mut CardContext, pages_declared: Option<usize>) {
    let family = ctx.family();
    let dump = ctx.dump_mut();
    if !family.is_classic() && pages_declared.is_none() {
        dump.truncate(dump.max_seen_unit().map_or(0, |max| max + 1));
    }
    if matches!(family, Family::Ultralight | Family::Classic(_)) || dump.valid_count() > 0 {
        dump.set_has_dump(true);
    }
}
