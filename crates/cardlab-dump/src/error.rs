use thiserror::Error;

use crate::device_type::DeviceType;

/// Errors raised while saving or loading a dump file.
#[derive(Error, Debug)]
pub enum DumpError {
    /// File open or stream failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Header or body grammar violation, including malformed hex.
    #[error("Invalid dump format at line {line}: {message}")]
    Format { line: usize, message: String },

    /// Device type string that names a card this codec does not handle.
    #[error("Unsupported device type: {0}")]
    UnsupportedDevice(String),

    /// The destination context has no dump buffer.
    #[error("No dump buffer")]
    NoBuffer,

    /// Nothing to save: the context holds no card.
    #[error("No card loaded")]
    NoCard,
}

impl DumpError {
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            line,
            message: message.into(),
        }
    }

    /// Short text for the "cannot open file" notification.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnsupportedDevice(name) if DeviceType::is_known_unsupported(name) => {
                "Card type not supported"
            }
            Self::UnsupportedDevice(_) => "Unsupported file",
            Self::Io(_) | Self::Format { .. } | Self::NoBuffer | Self::NoCard => "Invalid file",
        }
    }
}

pub type Result<T> = std::result::Result<T, DumpError>;
