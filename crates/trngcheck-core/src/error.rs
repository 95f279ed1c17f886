//! Error taxonomy for the reset-boundary check.
//!
//! Every variant except [`TrngError::Config`] is fatal to the running case and
//! is never retried: it is either a platform defect or the randomness weakness
//! the check is built to surface.

use thiserror::Error;

/// Fatal conditions raised while running a protocol phase.
#[derive(Debug, Error)]
pub enum TrngError {
    /// The RNG driver reported a nonzero status.
    #[error("trng read error: {0}")]
    Driver(#[from] DriverError),

    /// The buffer compressed to fit within the threshold.
    #[error(
        "compression of trng buffer succeeded - test fail! \
         ({len} bytes compressed to {compressed}, capacity {capacity})"
    )]
    OracleFailure {
        len: usize,
        compressed: usize,
        capacity: usize,
    },

    /// The persisted buffer could not be read back intact.
    #[error("persisted buffer mismatch: {0}")]
    PersistenceMismatch(String),

    /// Control came back from a reset request.
    #[error("device reset did not restart the device as expected")]
    ResetNonReturn,

    /// The device took a path the protocol does not allow at this point.
    #[error("unexpected protocol flow: {0}")]
    Protocol(String),

    /// The device ended the suite with a failing verdict.
    #[error("device reported a failed suite: {0}")]
    SuiteFailed(String),

    /// The host gave up waiting for the device.
    #[error("suite did not finish within {0} s, device killed")]
    SuiteTimeout(u64),

    #[error("cannot launch device: {0}")]
    Launch(#[source] std::io::Error),

    #[error("durable store: {0}")]
    Store(#[from] StoreError),

    #[error("message channel: {0}")]
    Channel(#[from] std::io::Error),

    #[error("compression routine: {0}")]
    Compression(#[from] flate2::CompressError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Nonzero status from an RNG driver read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("driver status {status}: {reason}")]
pub struct DriverError {
    pub status: i32,
    pub reason: String,
}

impl DriverError {
    pub fn new(status: i32, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }
}

/// Durable store failures. The numeric status mirrors what a flash-backed
/// store would report.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key {0} not found")]
    NotFound(u16),

    #[error("key {key} holds {actual} bytes, buffer has room for {capacity}")]
    BufferTooSmall {
        key: u16,
        actual: usize,
        capacity: usize,
    },

    #[error("store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrngError>;
