use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Identity errors
    #[error("Invalid UID length: {len} (must be {min}-{max})")]
    InvalidUid { len: usize, min: usize, max: usize },

    #[error("Invalid ATS length: {0}")]
    InvalidAts(usize),

    // Dump buffer errors
    #[error("Buffer too small: requested {requested} bytes, capacity {capacity}")]
    Buffer { requested: usize, capacity: usize },

    #[error("Unit {index} out of range (unit count {count})")]
    UnitOutOfRange { index: usize, count: usize },

    #[error("Invalid unit size: {0}")]
    InvalidUnitSize(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
