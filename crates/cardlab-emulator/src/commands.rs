//! Type-2 tag command set served in listen mode.
//!
//! [`Command::parse`] decodes a reader frame and [`dispatch`] computes the
//! reply against the card context. Neither touches the radio; the listener
//! owns the one blocking transmit.

use cardlab_core::{
    CardContext, PageStore,
    constants::{
        CMD_COMPAT_53, CMD_COMPAT_57, CMD_FAST_READ, CMD_GET_VERSION, CMD_PWD_AUTH, CMD_RATS,
        CMD_READ, CMD_READ_CNT, CMD_REQA, CMD_SECTOR_SELECT, CMD_WRITE, CMD_WUPA, T2T_ACK,
        T2T_PAGE_SIZE, T2T_PAGES_PER_READ,
    },
};
use tracing::trace;

/// A decoded reader frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Read { page: u8 },
    FastRead { start: u8, end: u8 },
    GetVersion,
    Write { page: u8, data: [u8; T2T_PAGE_SIZE] },
    /// Authentication or compatibility query answered with a fixed payload.
    Compat { code: u8 },
    /// REQA or WUPA: the reader restarted activation.
    Reactivate,
    Unknown { code: u8 },
}

impl Command {
    /// Decode a frame. Empty frames and truncated arguments yield `None`.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let (&code, args) = frame.split_first()?;
        let command = match code {
            CMD_REQA | CMD_WUPA if args.is_empty() => Command::Reactivate,
            CMD_READ => Command::Read { page: *args.first()? },
            CMD_FAST_READ => Command::FastRead {
                start: *args.first()?,
                end: *args.get(1)?,
            },
            CMD_GET_VERSION => Command::GetVersion,
            CMD_WRITE => {
                let (&page, data) = args.split_first()?;
                Command::Write {
                    page,
                    data: data.get(..T2T_PAGE_SIZE)?.try_into().ok()?,
                }
            }
            CMD_SECTOR_SELECT | CMD_PWD_AUTH | CMD_READ_CNT | CMD_COMPAT_53 | CMD_COMPAT_57
            | CMD_RATS => Command::Compat { code },
            _ => Command::Unknown { code },
        };
        Some(command)
    }

    /// Whether serving the command may modify the dump.
    pub fn is_write(&self) -> bool {
        matches!(self, Command::Write { .. })
    }
}

/// What the listener does after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Transmit these bytes, then re-arm receive.
    Transmit(Vec<u8>),
    /// Unhandled: re-arm receive without transmitting.
    Ignore,
}

/// Fixed reply to a compatibility command.
pub fn compat_reply(code: u8) -> Vec<u8> {
    match code {
        CMD_PWD_AUTH | CMD_READ_CNT => vec![0; 3],
        CMD_RATS => vec![0; 32],
        _ => vec![T2T_ACK],
    }
}

/// Compute the reply to `command`.
///
/// `tx_capacity` bounds FAST_READ replies. WRITE modifies `ctx` in place.
pub fn dispatch(command: &Command, ctx: &mut CardContext, tx_capacity: usize) -> Reply {
    let page_count = ctx.page_count();
    let reply = match *command {
        Command::Read { page } => Reply::Transmit(read_pages(ctx, page as usize, T2T_PAGES_PER_READ)),
        Command::FastRead { start, end } => {
            let (start, end) = (start as usize, end as usize);
            let max_pages = tx_capacity / T2T_PAGE_SIZE;
            if start > end || start >= page_count || max_pages == 0 {
                Reply::Ignore
            } else {
                let pages = (end.min(page_count - 1) - start + 1).min(max_pages);
                Reply::Transmit(read_pages(ctx, start, pages))
            }
        }
        Command::GetVersion => match ctx.version() {
            Some(version) => Reply::Transmit(version.to_vec()),
            None => Reply::Ignore,
        },
        Command::Write { page, data } => {
            let page = page as usize;
            if page < page_count && ctx.dump_mut().set_page(page, data).is_ok() {
                Reply::Transmit(vec![T2T_ACK])
            } else {
                Reply::Ignore
            }
        }
        Command::Compat { code } => Reply::Transmit(compat_reply(code)),
        Command::Reactivate | Command::Unknown { .. } => Reply::Ignore,
    };
    trace!(?command, ?reply, "Dispatched");
    reply
}

/// `count` pages from `start`; pages past the image or never written read
/// as zeros.
fn read_pages(ctx: &CardContext, start: usize, count: usize) -> Vec<u8> {
    let dump = ctx.dump();
    let page_count = ctx.page_count();
    (start..start + count)
        .flat_map(|index| {
            let page = if index < page_count { dump.page(index) } else { None };
            page.unwrap_or([0; T2T_PAGE_SIZE])
        })
        .collect()
}
