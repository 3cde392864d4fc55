//! Error types for radio transceiver operations.
//!
//! This module defines the failures the radio abstraction reports while
//! discovering, exchanging frames and deactivating. Timeouts and framing
//! faults are transient and worth a retry; a link loss means the peer left
//! the field and ends the session normally.

use std::fmt;

/// Result type alias for radio operations.
pub type Result<T> = std::result::Result<T, RadioError>;

/// Kind of a framing-level reception fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingKind {
    /// Malformed frame (bit timing, incomplete byte).
    Framing,
    /// CRC mismatch.
    Crc,
    /// Parity bit mismatch.
    Parity,
}

impl fmt::Display for FramingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framing => write!(f, "framing"),
            Self::Crc => write!(f, "CRC"),
            Self::Parity => write!(f, "parity"),
        }
    }
}

/// Errors that can occur during radio transceiver operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RadioError {
    /// No frame arrived within the frame wait time.
    #[error("Protocol timeout after {duration_us}us")]
    Timeout { duration_us: u64 },

    /// A frame arrived but was corrupted.
    #[error("Protocol {kind} error")]
    Framing { kind: FramingKind },

    /// The peer left the field.
    #[error("Link lost")]
    LinkLoss,

    /// The transceiver has not been initialized.
    #[error("Transceiver not initialized")]
    NotInitialized,

    /// Another operation is still in flight.
    #[error("Transceiver busy")]
    Busy,

    /// The request was rejected before reaching the air.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// The peer answered with an error (e.g. a NAK).
    #[error("Communication error: {message}")]
    Communication { message: String },
}

impl RadioError {
    /// Create a new timeout error.
    pub fn timeout(duration_us: u64) -> Self {
        Self::Timeout { duration_us }
    }

    /// Create a new framing error.
    pub fn framing(kind: FramingKind) -> Self {
        Self::Framing { kind }
    }

    /// Create a new invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// Timeouts and framing/CRC/parity faults: retrying may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Framing { .. })
    }

    /// The peer is gone.
    pub fn is_link_loss(&self) -> bool {
        matches!(self, Self::LinkLoss)
    }
}
