//! Collaborator trait definitions.
//!
//! These traits are the seams between the card engines and the platform:
//! the radio transceiver, the file store and the UI refresh hook. The
//! engines are cooperative state machines driven by a scheduler tick, so
//! every method here is synchronous and must not block longer than one
//! frame exchange.
//!
//! Mock implementations live in [`crate::mock`]; a filesystem store lives
//! in [`crate::fs`].

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

use cardlab_core::CardSummary;

use crate::error::{RadioError, Result};
use crate::types::{ActiveDevice, DeactivateMode, DiscoveryParams, ExchangeStatus, LinkState};

/// Upper bound on worker iterations a blocking transceive spins through
/// before reporting a timeout.
pub const MAX_WORKER_SPINS: usize = 64;

/// Radio front end.
///
/// Discovery and exchanges are non-blocking: a caller starts an operation
/// and then alternates [`worker`](Transceiver::worker) with a status query.
/// [`transceive_blocking`](Transceiver::transceive_blocking) wraps that loop
/// for pollers that may block for one exchange.
///
/// # Examples
///
/// ```
/// use cardlab_hardware::mock::{MockRadio, MockTag};
/// use cardlab_hardware::traits::Transceiver;
/// use cardlab_hardware::types::{DiscoveryParams, LinkState};
/// use std::time::Duration;
///
/// let (mut radio, handle) = MockRadio::new();
/// handle.present_tag(MockTag::ntag(vec![0x04, 1, 2, 3, 4, 5, 6], 45));
///
/// radio.initialize().unwrap();
/// radio.configure_discovery(&DiscoveryParams::reader(1000)).unwrap();
/// radio.discover().unwrap();
/// radio.worker();
/// assert_eq!(radio.state(), LinkState::Activated);
///
/// let page0 = radio.transceive_blocking(&[0x30, 0x00], Duration::from_millis(5)).unwrap();
/// assert_eq!(page0.len(), 16);
/// ```
pub trait Transceiver {
    /// Bring the radio up. Idempotent.
    fn initialize(&mut self) -> Result<()>;

    /// Set technologies, role, round length and listen identity.
    fn configure_discovery(&mut self, params: &DiscoveryParams) -> Result<()>;

    /// Start a discovery round.
    fn discover(&mut self) -> Result<()>;

    /// Advance the radio's internal state machine.
    fn worker(&mut self);

    fn state(&self) -> LinkState;

    /// Peer found by the last discovery, if activated.
    fn active_device(&self) -> Option<ActiveDevice>;

    fn deactivate(&mut self, mode: DeactivateMode) -> Result<()>;

    /// Transmit `tx` and arm reception. An empty `tx` only arms reception.
    fn exchange_start(&mut self, tx: &[u8]) -> Result<()>;

    /// Poll the exchange started last.
    fn exchange_status(&mut self) -> ExchangeStatus;

    /// Transmit without waiting for a reply, blocking until the frame is out
    /// or `fwt` elapses.
    fn transmit_blocking(&mut self, tx: &[u8], fwt: Duration) -> Result<()>;

    /// Transmit `tx` and wait for the reply.
    fn transceive_blocking(&mut self, tx: &[u8], fwt: Duration) -> Result<Vec<u8>> {
        self.exchange_start(tx)?;
        for _ in 0..MAX_WORKER_SPINS {
            self.worker();
            match self.exchange_status() {
                ExchangeStatus::Pending => continue,
                ExchangeStatus::Received(rx) => return Ok(rx),
                ExchangeStatus::Failed(error) => return Err(error),
            }
        }
        Err(RadioError::timeout(
            u64::try_from(fwt.as_micros()).unwrap_or(u64::MAX),
        ))
    }
}

/// Line-oriented file store for dump files.
///
/// Readers and writers borrow the store; dropping them closes the file.
pub trait Storage {
    /// Open an existing file for buffered reading.
    fn open_read(&mut self, path: &Path) -> io::Result<Box<dyn BufRead + '_>>;

    /// Create (or truncate) a file for writing.
    fn open_new(&mut self, path: &Path) -> io::Result<Box<dyn Write + '_>>;

    fn exists(&self, path: &Path) -> bool;
}

/// UI refresh hook, called when the current card changes.
pub trait Notifier {
    fn card_updated(&mut self, summary: &CardSummary);
}

/// Notifier that drops every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn card_updated(&mut self, _summary: &CardSummary) {}
}
