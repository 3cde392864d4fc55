use std::path::PathBuf;

use cardlab_dump::DumpError;
use cardlab_emulator::EmulatorError;
use cardlab_hardware::RadioError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Dump error: {0}")]
    Dump(#[from] DumpError),

    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),

    #[error("Emulator error: {0}")]
    Emulator(#[from] EmulatorError),

    // Configuration errors
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
