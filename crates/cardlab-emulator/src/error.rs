use cardlab_hardware::RadioError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmulatorError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),
}

pub type Result<T> = std::result::Result<T, EmulatorError>;
