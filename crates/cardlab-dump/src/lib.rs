//! Text serialization of card images.
//!
//! [`save`] writes a [`CardContext`](cardlab_core::CardContext) as a
//! line-oriented `Key: value` file; [`load`] restores it. Both go through a
//! [`Storage`](cardlab_hardware::Storage) so the codec never touches the
//! filesystem directly.

pub mod device_type;
pub mod error;
pub mod reader;
pub mod writer;

pub use device_type::DeviceType;
pub use error::{DumpError, Result};
pub use reader::{load, read_dump};
pub use writer::{archive_path, save, write_dump};
