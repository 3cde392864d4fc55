pub mod constants;
pub mod context;
pub mod dump;
pub mod error;
pub mod hex;
pub mod types;

pub use context::{CardContext, CardSummary, Source};
pub use dump::{Dump, PageStore};
pub use error::{Error, Result};
pub use hex::HexError;
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
