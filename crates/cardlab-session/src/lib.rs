//! Scheduler glue for the card engines.
//!
//! [`Session`] owns the current card and hands out either the reader or the
//! emulator; [`Scheduler`] drives whichever is active on a fixed tick until a
//! stop signal arrives.

pub mod config;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod telemetry;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use scheduler::{Engine, RunReport, Scheduler};
pub use session::Session;
pub use telemetry::{init_from_config, init_tracing};
