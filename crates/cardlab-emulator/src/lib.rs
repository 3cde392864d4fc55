//! Listen-mode engine: Type-2 tag emulation from the card context.
//!
//! The listener infers a persona from the loaded card, waits for a reader
//! to select it, then serves READ, FAST_READ, GET_VERSION and WRITE against
//! the dump.

pub mod commands;
pub mod error;
pub mod listener;
pub mod persona;
pub mod state_machine;

pub use commands::{Command, Reply, dispatch};
pub use error::{EmulatorError, Result};
pub use listener::{Listener, ListenerConfig, ListenerStats};
pub use persona::{Persona, PersonaKind, infer_persona};
pub use state_machine::{ExchangePhase, ListenerState, StateMachine, StateTransition};
