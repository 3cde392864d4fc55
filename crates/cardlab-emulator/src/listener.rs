//! Listen-mode engine.
//!
//! The listener presents the persona inferred from the card context and
//! serves Type-2 commands against its dump. Like the poller it is stepped
//! once per scheduler tick after the radio worker. Every reply goes out as
//! one blocking transmit bounded by the frame wait time; that call is the
//! only point where a tick may block.

use std::time::Duration;

use cardlab_core::CardContext;
use cardlab_hardware::{
    DeactivateMode, DiscoveryParams, ExchangeStatus, LinkState, Notifier, RadioError, Transceiver,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::commands::{Command, Reply, dispatch};
use crate::error::Result;
use crate::persona::{Persona, infer_persona};
use crate::state_machine::{ExchangePhase, ListenerState, StateMachine, StateTransition};

/// Transitions logged with a failed exchange.
const RECENT_TRANSITIONS: usize = 4;

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Length of one discovery round.
    pub discovery_duration_ms: u32,
    /// Bound on each reply transmit.
    pub frame_wait_time_us: u64,
    /// Receive re-arms allowed after a transient error.
    pub rx_retries: u32,
    /// Largest reply frame in bytes.
    pub tx_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            discovery_duration_ms: 1000,
            frame_wait_time_us: 600,
            rx_retries: 1,
            tx_capacity: 256,
        }
    }
}

impl ListenerConfig {
    pub fn frame_wait_time(&self) -> Duration {
        Duration::from_micros(self.frame_wait_time_us)
    }
}

/// Counters of one listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerStats {
    /// Reader selections.
    pub sessions: u64,
    pub frames_received: u64,
    pub replies_sent: u64,
    pub unhandled: u64,
    /// Pages written by readers.
    pub writes: u64,
    /// Receive re-arms after transient errors.
    pub retries: u64,
}

/// Card-emulation engine over borrowed collaborators.
pub struct Listener<'a, R: Transceiver + ?Sized> {
    radio: &'a mut R,
    ctx: &'a mut CardContext,
    notifier: &'a mut dyn Notifier,
    config: ListenerConfig,
    machine: StateMachine,
    persona: Option<Persona>,
    rx_retries_left: u32,
    stop_requested: bool,
    stats: ListenerStats,
}

impl<'a, R: Transceiver + ?Sized> Listener<'a, R> {
    pub fn new(
        radio: &'a mut R,
        ctx: &'a mut CardContext,
        notifier: &'a mut dyn Notifier,
        config: ListenerConfig,
    ) -> Self {
        Self {
            radio,
            ctx,
            notifier,
            config,
            machine: StateMachine::new(),
            persona: None,
            rx_retries_left: 0,
            stop_requested: false,
            stats: ListenerStats::default(),
        }
    }

    pub fn state(&self) -> ListenerState {
        self.machine.current_state()
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn stats(&self) -> ListenerStats {
        self.stats
    }

    /// Persona chosen at initialization.
    pub fn persona(&self) -> Option<&Persona> {
        self.persona.as_ref()
    }

    pub fn context(&self) -> &CardContext {
        &*self.ctx
    }

    pub fn history(&self) -> Vec<StateTransition> {
        self.machine.history().iter().cloned().collect()
    }

    /// Infer the persona and configure the radio for listen mode.
    ///
    /// # Errors
    /// Propagates radio failures; the listener stays uninitialized.
    pub fn initialize(&mut self) -> Result<&Persona> {
        let persona = infer_persona(&*self.ctx);
        self.radio.initialize()?;
        self.radio.configure_discovery(&DiscoveryParams::listener(
            persona.identity(),
            self.config.discovery_duration_ms,
        ))?;

        if self.state() == ListenerState::NotInitialized {
            self.machine.transition_to(ListenerState::Idle)?;
        }
        if self.state() == ListenerState::Idle {
            self.machine.transition_to(ListenerState::StartDiscovery)?;
        }
        info!(
            persona = %persona.kind,
            rule = persona.rule,
            atqa = ?persona.atqa,
            sak = persona.sak,
            "Listener initialized"
        );
        Ok(self.persona.insert(persona))
    }

    /// Resume discovery after a stop.
    ///
    /// # Errors
    /// Fails unless the listener is idle.
    pub fn start(&mut self) -> Result<()> {
        self.machine.transition_to(ListenerState::StartDiscovery)?;
        Ok(())
    }

    /// Ask the listener to stop. Takes effect at the next [`cycle`](Self::cycle).
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Deactivate the radio and go idle now.
    pub fn halt(&mut self) {
        self.stop_requested = false;
        if self.state() == ListenerState::NotInitialized {
            return;
        }
        if self.state().is_exchanging() {
            debug!("Stopping during an active session");
        }
        if let Err(e) = self.radio.deactivate(DeactivateMode::Idle) {
            debug!(error = %e, "Deactivate on stop failed");
        }
        let transition = self.machine.reset();
        info!(from = %transition.from, stats = ?self.stats, "Listener stopped");
    }

    /// Advance the radio's own state machine. Called once per tick before
    /// [`cycle`](Self::cycle).
    pub fn service_radio(&mut self) {
        self.radio.worker();
    }

    /// One scheduler tick: radio worker, then engine step.
    pub fn tick(&mut self) {
        self.service_radio();
        self.cycle();
    }

    /// Step the state machine once.
    pub fn cycle(&mut self) {
        if self.stop_requested {
            self.halt();
            return;
        }

        match self.state() {
            ListenerState::NotInitialized | ListenerState::Idle => {}
            ListenerState::StartDiscovery => match self.radio.discover() {
                Ok(()) => self.enter(ListenerState::Discovery),
                Err(e) => warn!(error = %e, "Listen discovery request failed"),
            },
            ListenerState::Discovery => {
                if self.radio.state() == LinkState::Activated {
                    self.stats.sessions += 1;
                    debug!(
                        session = self.stats.sessions,
                        waited = ?self.machine.time_in_current_state(),
                        "Selected by reader"
                    );
                    self.enter(ListenerState::DataExchange(ExchangePhase::Idle));
                }
            }
            ListenerState::DataExchange(ExchangePhase::Idle) => {
                self.rx_retries_left = self.config.rx_retries;
                self.arm_receive();
            }
            ListenerState::DataExchange(ExchangePhase::WaitRx) => self.poll_receive(),
            ListenerState::DataExchange(ExchangePhase::WaitTxDone) => self.arm_receive(),
        }
    }

    fn enter(&mut self, state: ListenerState) {
        match self.machine.transition_to(state) {
            Ok(transition) => trace!(from = %transition.from, to = %transition.to, "Listener transition"),
            Err(e) => warn!(error = %e, "Listener transition rejected"),
        }
    }

    /// Arm reception of the next reader frame.
    fn arm_receive(&mut self) {
        match self.radio.exchange_start(&[]) {
            Ok(()) => self.enter(ListenerState::DataExchange(ExchangePhase::WaitRx)),
            Err(e) => self.end_session(&e),
        }
    }

    fn poll_receive(&mut self) {
        match self.radio.exchange_status() {
            ExchangeStatus::Pending => {}
            ExchangeStatus::Received(frame) => {
                self.rx_retries_left = self.config.rx_retries;
                self.handle_frame(&frame);
            }
            ExchangeStatus::Failed(e) if e.is_transient() && self.rx_retries_left > 0 => {
                self.rx_retries_left -= 1;
                self.stats.retries += 1;
                debug!(error = %e, "Transient receive error, re-arming");
                self.arm_receive();
            }
            ExchangeStatus::Failed(e) => self.end_session(&e),
        }
    }

    fn handle_frame(&mut self, frame: &[u8]) {
        self.stats.frames_received += 1;
        let Some(command) = Command::parse(frame) else {
            self.stats.unhandled += 1;
            trace!(len = frame.len(), "Malformed frame");
            self.arm_receive();
            return;
        };

        if command == Command::Reactivate {
            debug!("Reader restarted activation");
            self.restart_discovery();
            return;
        }

        match dispatch(&command, &mut *self.ctx, self.config.tx_capacity) {
            Reply::Transmit(tx) => {
                if let Err(e) = self
                    .radio
                    .transmit_blocking(&tx, self.config.frame_wait_time())
                {
                    self.end_session(&e);
                    return;
                }
                self.stats.replies_sent += 1;
                self.enter(ListenerState::DataExchange(ExchangePhase::WaitTxDone));
                if command.is_write() {
                    self.stats.writes += 1;
                    self.ctx.refresh_summary();
                    self.notifier.card_updated(self.ctx.summary());
                }
                self.arm_receive();
            }
            Reply::Ignore => {
                self.stats.unhandled += 1;
                self.arm_receive();
            }
        }
    }

    /// Return to discovery after a deactivation or a hard exchange error.
    fn end_session(&mut self, error: &RadioError) {
        if error.is_link_loss() {
            debug!("Reader left the field");
        } else {
            let recent: Vec<String> = self
                .machine
                .last_transitions(RECENT_TRANSITIONS)
                .iter()
                .map(|t| format!("{} -> {} ({:?} ago)", t.from, t.to, t.elapsed()))
                .collect();
            warn!(error = %error, ?recent, "Exchange failed, restarting discovery");
        }
        self.restart_discovery();
    }

    /// Drop the current link and go back to discovery.
    fn restart_discovery(&mut self) {
        if let Err(e) = self.radio.deactivate(DeactivateMode::Idle) {
            warn!(error = %e, "Deactivate before rediscovery failed");
        }
        self.enter(ListenerState::StartDiscovery);
    }
}
