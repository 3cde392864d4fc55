//! Listener state machine.
//!
//! # States
//!
//! - `NotInitialized`: radio not configured
//! - `Idle`: configured but stopped
//! - `StartDiscovery`: a discovery round must be started
//! - `Discovery`: waiting for a reader to select us
//! - `DataExchange(phase)`: selected by a reader, servicing frames
//!
//! # Valid Transitions
//!
//! - NotInitialized → Idle → StartDiscovery → Discovery → DataExchange(Idle)
//! - DataExchange(Idle) → DataExchange(WaitRx) → DataExchange(WaitTxDone) → DataExchange(WaitRx)
//! - DataExchange(WaitRx) → DataExchange(WaitRx) (receive re-armed)
//! - Discovery / DataExchange(_) → StartDiscovery (deactivation)
//! - any initialized state → Idle (stop)
//!
//! # Examples
//!
//! ```
//! use cardlab_emulator::state_machine::{ExchangePhase, ListenerState, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! machine.transition_to(ListenerState::Idle).unwrap();
//! machine.transition_to(ListenerState::StartDiscovery).unwrap();
//! assert!(machine.transition_to(ListenerState::DataExchange(ExchangePhase::WaitRx)).is_err());
//! assert_eq!(machine.current_state(), ListenerState::StartDiscovery);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{EmulatorError, Result};

/// Maximum number of state transitions to keep in history.
///
/// A serviced frame costs two transitions (WaitRx → WaitTxDone → WaitRx), so
/// the history covers roughly the last fifty frames of a session.
pub const MAX_HISTORY_SIZE: usize = 100;

/// Sub-phase of [`ListenerState::DataExchange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangePhase {
    /// Selected, receive not armed yet.
    Idle,
    /// Receive armed, waiting for a reader frame.
    WaitRx,
    /// Reply transmitted, receive must be re-armed.
    WaitTxDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    NotInitialized,
    Idle,
    StartDiscovery,
    Discovery,
    DataExchange(ExchangePhase),
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerState::NotInitialized => write!(f, "NotInitialized"),
            ListenerState::Idle => write!(f, "Idle"),
            ListenerState::StartDiscovery => write!(f, "StartDiscovery"),
            ListenerState::Discovery => write!(f, "Discovery"),
            ListenerState::DataExchange(phase) => write!(f, "DataExchange({phase:?})"),
        }
    }
}

impl ListenerState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use cardlab_emulator::state_machine::{ExchangePhase, ListenerState};
    ///
    /// assert!(ListenerState::Discovery.can_transition_to(&ListenerState::DataExchange(ExchangePhase::Idle)));
    /// assert!(!ListenerState::NotInitialized.can_transition_to(&ListenerState::Discovery));
    /// ```
    pub fn can_transition_to(&self, target: &ListenerState) -> bool {
        use ExchangePhase as P;
        use ListenerState as S;

        matches!(
            (self, target),
            (S::NotInitialized, S::Idle)
                | (S::Idle, S::StartDiscovery)
                | (S::StartDiscovery, S::Discovery)
                | (S::Discovery, S::DataExchange(P::Idle))
                | (S::DataExchange(P::Idle), S::DataExchange(P::WaitRx))
                | (S::DataExchange(P::WaitRx), S::DataExchange(P::WaitRx | P::WaitTxDone))
                | (S::DataExchange(P::WaitTxDone), S::DataExchange(P::WaitRx))
                // Deactivation
                | (S::Discovery | S::DataExchange(_), S::StartDiscovery)
                // Stop
                | (S::Idle | S::StartDiscovery | S::Discovery | S::DataExchange(_), S::Idle)
        )
    }

    /// Whether a reader currently has us selected.
    pub fn is_exchanging(&self) -> bool {
        matches!(self, ListenerState::DataExchange(_))
    }
}

/// A single state transition with timestamp.
///
/// The `timestamp` is not serialized; deserialized records carry the time
/// of deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ListenerState,
    pub to: ListenerState,
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: ListenerState, to: ListenerState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Validated listener state with a bounded transition history.
#[derive(Debug)]
pub struct StateMachine {
    current_state: ListenerState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a machine in `NotInitialized`.
    pub fn new() -> Self {
        Self {
            current_state: ListenerState::NotInitialized,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> ListenerState {
        self.current_state
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// The last `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Transition to a new state, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::InvalidStateTransition`] if the transition is
    /// not valid from the current state. The state is left unchanged.
    pub fn transition_to(&mut self, new_state: ListenerState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(EmulatorError::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);
        self.perform_state_change(new_state, transition.clone());
        Ok(transition)
    }

    /// Force the machine into `Idle` regardless of the current state.
    pub fn reset(&mut self) -> StateTransition {
        let transition = StateTransition::new(self.current_state, ListenerState::Idle);
        self.perform_state_change(ListenerState::Idle, transition.clone());
        transition
    }

    fn perform_state_change(&mut self, new_state: ListenerState, transition: StateTransition) {
        self.current_state = new_state;
        self.state_entered_at = Instant::now();

        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
