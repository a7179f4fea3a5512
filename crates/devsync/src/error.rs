//! Error types for devsync.

use crate::runtime::Status;

/// Result type alias using devsync's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the device and sync layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A checked runtime call returned a non-success status.
    #[error("{call} failed with status {code}: {description}")]
    Runtime {
        code: Status,
        call: &'static str,
        description: String,
    },

    /// `device_count_ensure_non_zero` saw zero devices.
    #[error("no GPU devices are available")]
    NoDevices,

    /// A synchronizing call was rejected because the sync warning level is `Error`.
    #[error("called a synchronizing GPU operation ({call}) while sync debug mode is 'error'")]
    SyncEscalated { call: &'static str },

    /// The runtime reported an active device that does not fit in a `DeviceIndex`.
    #[error("device index {0} is out of range for DeviceIndex")]
    DeviceIndexOutOfRange(i32),

    #[error("invalid sync debug mode '{0}' (expected disabled, warn or error)")]
    InvalidSyncLevel(String),

    #[error("invalid backend '{0}' (expected auto, cuda, hip or simulated)")]
    InvalidBackend(String),
}

impl Error {
    /// Native status code, if this error came from a runtime call.
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::Runtime { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this error is a runtime-call failure (as opposed to policy or usage errors).
    pub fn is_runtime(&self) -> bool {
        matches!(self, Error::Runtime { .. })
    }
}
