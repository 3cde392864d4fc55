//! Mock radio transceiver for testing and development.
//!
//! [`MockRadio`] simulates both sides of an NFC link. In poller role it
//! answers READ and GET_VERSION from the memory of a [`MockTag`] placed in
//! the field; in listener role it delivers frames queued by a simulated
//! reader and records every frame the engine transmits.
//!
//! The radio and its [`MockRadioHandle`] share state, so a test keeps the
//! handle to drive the field while the engine owns the radio.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cardlab_core::constants::{
    CMD_GET_VERSION, CMD_READ, T2T_PAGE_SIZE, T2T_READ_RESPONSE_LEN, T2T_VERSION_LEN,
};
use tracing::trace;

use crate::{
    RadioError, Result,
    traits::Transceiver,
    types::{ActiveDevice, DeactivateMode, DiscoveryParams, ExchangeStatus, LinkState, NfcaType, Role},
};

/// Frame wait time reported by simulated timeouts.
const MOCK_FWT_US: u64 = 5_000;

/// Simulated card placed in the field of a [`MockRadio`] in poller role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTag {
    device: ActiveDevice,
    memory: Vec<u8>,
    version: Option<[u8; T2T_VERSION_LEN]>,
    /// GET_VERSION attempts answered with an all-zero blob.
    zero_versions: usize,
    /// Remaining failures per READ start page.
    read_faults: HashMap<u8, usize>,
    /// READ start page at which the card leaves the field.
    link_loss_at: Option<u8>,
}

impl MockTag {
    /// NTAG21x with `pages` pages of zeroed memory.
    ///
    /// The GET_VERSION size code is derived from the page count (45, 135 or
    /// 231 pages); other counts report an unknown size code.
    pub fn ntag(uid: Vec<u8>, pages: usize) -> Self {
        let size_code = match pages {
            45 => 0x0F,
            135 => 0x11,
            231 => 0x13,
            _ => 0x00,
        };
        let mut memory = vec![0u8; pages * T2T_PAGE_SIZE];
        for (dst, src) in memory.iter_mut().zip(uid.iter()) {
            *dst = *src;
        }

        Self {
            device: ActiveDevice::nfca(uid, NfcaType::T2t, [0x44, 0x00], 0x00),
            memory,
            version: Some([0x00, 0x04, 0x04, 0x02, 0x01, 0x00, size_code, 0x03]),
            zero_versions: 0,
            read_faults: HashMap::new(),
            link_loss_at: None,
        }
    }

    /// Any activated device without readable Type-2 memory.
    pub fn device(device: ActiveDevice) -> Self {
        Self {
            device,
            memory: Vec::new(),
            version: None,
            zero_versions: 0,
            read_faults: HashMap::new(),
            link_loss_at: None,
        }
    }

    /// Overwrite memory starting at page 0.
    pub fn with_memory(mut self, bytes: &[u8]) -> Self {
        let len = bytes.len().min(self.memory.len());
        self.memory[..len].copy_from_slice(&bytes[..len]);
        self
    }

    pub fn with_page(mut self, page: usize, data: [u8; 4]) -> Self {
        let start = page * T2T_PAGE_SIZE;
        if start + T2T_PAGE_SIZE <= self.memory.len() {
            self.memory[start..start + T2T_PAGE_SIZE].copy_from_slice(&data);
        }
        self
    }

    /// Do not answer GET_VERSION.
    pub fn without_version(mut self) -> Self {
        self.version = None;
        self
    }

    /// Answer the first `count` GET_VERSION commands with zeros.
    pub fn zero_versions(mut self, count: usize) -> Self {
        self.zero_versions = count;
        self
    }

    /// Time out the first `times` READs starting at `page`.
    pub fn failing_read(mut self, page: u8, times: usize) -> Self {
        self.read_faults.insert(page, times);
        self
    }

    /// Leave the field on the READ starting at `page`.
    pub fn link_loss_at(mut self, page: u8) -> Self {
        self.link_loss_at = Some(page);
        self
    }

    pub fn active_device(&self) -> &ActiveDevice {
        &self.device
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Outcome of one command, and whether the tag stays in the field.
    fn respond(&mut self, tx: &[u8]) -> (ExchangeStatus, bool) {
        match tx {
            [CMD_GET_VERSION] => {
                if self.zero_versions > 0 {
                    self.zero_versions -= 1;
                    return (ExchangeStatus::Received(vec![0; T2T_VERSION_LEN]), true);
                }
                match self.version {
                    Some(version) => (ExchangeStatus::Received(version.to_vec()), true),
                    None => (ExchangeStatus::Failed(RadioError::timeout(MOCK_FWT_US)), true),
                }
            }
            [CMD_READ, page] => {
                if self.link_loss_at == Some(*page) {
                    return (ExchangeStatus::Failed(RadioError::LinkLoss), false);
                }
                if let Some(remaining) = self.read_faults.get_mut(page)
                    && *remaining > 0
                {
                    *remaining -= 1;
                    return (ExchangeStatus::Failed(RadioError::timeout(MOCK_FWT_US)), true);
                }
                let start = *page as usize * T2T_PAGE_SIZE;
                if start >= self.memory.len() {
                    return (
                        ExchangeStatus::Failed(RadioError::communication("NAK")),
                        true,
                    );
                }
                // Reads past the last page roll over to page 0.
                let rx = (0..T2T_READ_RESPONSE_LEN)
                    .map(|i| self.memory[(start + i) % self.memory.len()])
                    .collect();
                (ExchangeStatus::Received(rx), true)
            }
            _ => (ExchangeStatus::Failed(RadioError::timeout(MOCK_FWT_US)), true),
        }
    }
}

/// Event produced by the simulated reader in listener role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    Frame(Vec<u8>),
    Error(RadioError),
    /// The reader switched its field off.
    FieldOff,
}

#[derive(Debug)]
struct MockState {
    initialized: bool,
    params: Option<DiscoveryParams>,
    link: LinkState,
    discover_calls: usize,

    // Poller role
    tag: Option<MockTag>,
    /// The tag was put to sleep and ignores discovery until re-presented.
    halted: bool,
    commands: Vec<Vec<u8>>,

    // Listener role
    field: bool,
    events: VecDeque<ReaderEvent>,
    armed: bool,
    transmitted: Vec<Vec<u8>>,
    transmit_failure: Option<RadioError>,

    pending: Option<ExchangeStatus>,
    deactivations: Vec<DeactivateMode>,
}

impl MockState {
    fn new() -> Self {
        Self {
            initialized: false,
            params: None,
            link: LinkState::NotInitialized,
            discover_calls: 0,
            tag: None,
            halted: false,
            commands: Vec::new(),
            field: false,
            events: VecDeque::new(),
            armed: false,
            transmitted: Vec::new(),
            transmit_failure: None,
            pending: None,
            deactivations: Vec::new(),
        }
    }

    fn role(&self) -> Option<Role> {
        self.params.as_ref().map(|p| p.role)
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock radio transceiver.
///
/// # Examples
///
/// ```
/// use cardlab_hardware::mock::MockRadio;
/// use cardlab_hardware::traits::Transceiver;
/// use cardlab_hardware::types::{DiscoveryParams, ExchangeStatus, ListenIdentity};
///
/// let (mut radio, handle) = MockRadio::new();
/// let identity = ListenIdentity { uid: vec![0x04, 1, 2, 3, 4, 5, 6], atqa: [0x44, 0x00], sak: 0 };
///
/// radio.initialize().unwrap();
/// radio.configure_discovery(&DiscoveryParams::listener(identity, 1000)).unwrap();
/// radio.discover().unwrap();
///
/// handle.reader_enters_field();
/// handle.reader_sends(vec![0x30, 0x04]);
/// radio.worker();
/// radio.exchange_start(&[]).unwrap();
/// radio.worker();
/// assert_eq!(radio.exchange_status(), ExchangeStatus::Received(vec![0x30, 0x04]));
/// ```
#[derive(Debug)]
pub struct MockRadio {
    state: Arc<Mutex<MockState>>,
}

impl MockRadio {
    /// Create a mock radio and the handle controlling its field.
    pub fn new() -> (Self, MockRadioHandle) {
        let state = Arc::new(Mutex::new(MockState::new()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockRadioHandle { state },
        )
    }
}

impl Transceiver for MockRadio {
    fn initialize(&mut self) -> Result<()> {
        let mut s = lock(&self.state);
        s.initialized = true;
        if s.link == LinkState::NotInitialized {
            s.link = LinkState::Idle;
        }
        Ok(())
    }

    fn configure_discovery(&mut self, params: &DiscoveryParams) -> Result<()> {
        let mut s = lock(&self.state);
        if !s.initialized {
            return Err(RadioError::NotInitialized);
        }
        if params.role == Role::Listener && params.identity.is_none() {
            return Err(RadioError::invalid_parameter("listener role needs an identity"));
        }
        s.params = Some(params.clone());
        Ok(())
    }

    fn discover(&mut self) -> Result<()> {
        let mut s = lock(&self.state);
        if !s.initialized {
            return Err(RadioError::NotInitialized);
        }
        if s.params.is_none() {
            return Err(RadioError::invalid_parameter("discovery not configured"));
        }
        // An activated link must be deactivated first.
        if s.link == LinkState::Activated {
            return Err(RadioError::Busy);
        }
        s.discover_calls += 1;
        s.link = LinkState::Discovering;
        s.armed = false;
        s.pending = None;
        Ok(())
    }

    fn worker(&mut self) {
        let mut s = lock(&self.state);
        match (s.link, s.role()) {
            (LinkState::Discovering, Some(Role::Poller)) if s.tag.is_some() && !s.halted => {
                trace!("Mock tag activated");
                s.link = LinkState::Activated;
            }
            (LinkState::Discovering, Some(Role::Listener)) if s.field => {
                trace!("Mock reader selected us");
                s.link = LinkState::Activated;
            }
            (LinkState::Activated, Some(Role::Listener)) if s.armed && s.pending.is_none() => {
                match s.events.pop_front() {
                    Some(ReaderEvent::Frame(frame)) => {
                        s.pending = Some(ExchangeStatus::Received(frame));
                    }
                    Some(ReaderEvent::Error(error)) => {
                        s.pending = Some(ExchangeStatus::Failed(error));
                    }
                    Some(ReaderEvent::FieldOff) => {
                        s.field = false;
                        s.link = LinkState::Idle;
                        s.pending = Some(ExchangeStatus::Failed(RadioError::LinkLoss));
                    }
                    None => {}
                }
            }
            _ => {}
        }
    }

    fn state(&self) -> LinkState {
        lock(&self.state).link
    }

    fn active_device(&self) -> Option<ActiveDevice> {
        let s = lock(&self.state);
        match (s.link, s.role()) {
            (LinkState::Activated, Some(Role::Poller)) => {
                s.tag.as_ref().map(|tag| tag.device.clone())
            }
            _ => None,
        }
    }

    fn deactivate(&mut self, mode: DeactivateMode) -> Result<()> {
        let mut s = lock(&self.state);
        s.deactivations.push(mode);
        if mode == DeactivateMode::Sleep && s.link == LinkState::Activated && s.tag.is_some() {
            s.halted = true;
        }
        s.armed = false;
        s.pending = None;
        if s.initialized {
            s.link = match mode {
                DeactivateMode::Idle => LinkState::Idle,
                DeactivateMode::Sleep | DeactivateMode::Discovery => LinkState::Discovering,
            };
        }
        Ok(())
    }

    fn exchange_start(&mut self, tx: &[u8]) -> Result<()> {
        let mut s = lock(&self.state);
        if !s.initialized {
            return Err(RadioError::NotInitialized);
        }
        if s.link != LinkState::Activated {
            return Err(RadioError::LinkLoss);
        }

        match s.role() {
            Some(Role::Poller) => {
                s.commands.push(tx.to_vec());
                let (status, present) = match s.tag.as_mut() {
                    Some(tag) => tag.respond(tx),
                    None => (ExchangeStatus::Failed(RadioError::LinkLoss), false),
                };
                if !present {
                    s.tag = None;
                    s.link = LinkState::Idle;
                }
                s.pending = Some(status);
            }
            _ => {
                if !tx.is_empty() {
                    s.transmitted.push(tx.to_vec());
                }
                s.armed = true;
                s.pending = None;
            }
        }
        Ok(())
    }

    fn exchange_status(&mut self) -> ExchangeStatus {
        let mut s = lock(&self.state);
        match s.pending.take() {
            Some(status) => {
                s.armed = false;
                status
            }
            None => ExchangeStatus::Pending,
        }
    }

    fn transmit_blocking(&mut self, tx: &[u8], _fwt: Duration) -> Result<()> {
        let mut s = lock(&self.state);
        if let Some(error) = s.transmit_failure.take() {
            return Err(error);
        }
        if s.link != LinkState::Activated {
            return Err(RadioError::LinkLoss);
        }
        s.transmitted.push(tx.to_vec());
        Ok(())
    }
}

/// Control handle for a [`MockRadio`].
#[derive(Debug, Clone)]
pub struct MockRadioHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockRadioHandle {
    /// Place a tag in the field. It activates on the next discovery worker
    /// step in poller role.
    pub fn present_tag(&self, tag: MockTag) {
        let mut s = lock(&self.state);
        s.tag = Some(tag);
        s.halted = false;
    }

    /// Pull the tag out of the field. The next exchange reports link loss.
    pub fn remove_tag(&self) {
        let mut s = lock(&self.state);
        s.tag = None;
        s.halted = false;
    }

    /// Current memory of the tag in the field.
    pub fn tag(&self) -> Option<MockTag> {
        lock(&self.state).tag.clone()
    }

    /// A reader switches its field on.
    pub fn reader_enters_field(&self) {
        lock(&self.state).field = true;
    }

    /// Queue a frame from the reader.
    pub fn reader_sends(&self, frame: Vec<u8>) {
        lock(&self.state).events.push_back(ReaderEvent::Frame(frame));
    }

    /// Queue a reception error.
    pub fn reader_error(&self, error: RadioError) {
        lock(&self.state).events.push_back(ReaderEvent::Error(error));
    }

    /// Queue a field-off event.
    pub fn reader_leaves_field(&self) {
        lock(&self.state).events.push_back(ReaderEvent::FieldOff);
    }

    /// Fail the next blocking transmit with `error`.
    pub fn fail_next_transmit(&self, error: RadioError) {
        lock(&self.state).transmit_failure = Some(error);
    }

    /// Frames transmitted in listener role, oldest first.
    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        lock(&self.state).transmitted.clone()
    }

    /// Drain the transmitted-frame log.
    pub fn take_transmitted(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut lock(&self.state).transmitted)
    }

    /// Commands sent to the tag in poller role, oldest first.
    pub fn commands(&self) -> Vec<Vec<u8>> {
        lock(&self.state).commands.clone()
    }

    pub fn deactivations(&self) -> Vec<DeactivateMode> {
        lock(&self.state).deactivations.clone()
    }

    pub fn discovery_params(&self) -> Option<DiscoveryParams> {
        lock(&self.state).params.clone()
    }

    pub fn discover_calls(&self) -> usize {
        lock(&self.state).discover_calls
    }

    pub fn link_state(&self) -> LinkState {
        lock(&self.state).link
    }

    /// Events not yet consumed by the radio.
    pub fn pending_events(&self) -> usize {
        lock(&self.state).events.len()
    }
}
