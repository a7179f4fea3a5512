//! Runtime selection and initial sync debug mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::warning::SyncWarningLevel;

/// Environment variable selecting the backend (`auto`, `cuda`, `hip`, `simulated`).
pub const BACKEND_ENV: &str = "DEVSYNC_BACKEND";

/// Environment variable holding the initial sync debug mode (`disabled`, `warn`, `error`).
pub const SYNC_DEBUG_ENV: &str = "DEVSYNC_SYNC_DEBUG";

/// Which GPU runtime library to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// CUDA if `libcudart` loads, else HIP, else no runtime.
    #[default]
    Auto,
    Cuda,
    Hip,
    /// In-process runtime with no devices.
    Simulated,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Auto => "auto",
            Backend::Cuda => "cuda",
            Backend::Hip => "hip",
            Backend::Simulated => "simulated",
        })
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Backend::Auto),
            "cuda" => Ok(Backend::Cuda),
            "hip" | "rocm" => Ok(Backend::Hip),
            "simulated" | "sim" => Ok(Backend::Simulated),
            _ => Err(Error::InvalidBackend(s.to_string())),
        }
    }
}

/// Configuration for the process-wide default context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub sync_debug_mode: SyncWarningLevel,
}

impl Config {
    /// Read [`BACKEND_ENV`] and [`SYNC_DEBUG_ENV`].
    ///
    /// Unset variables keep their defaults. Invalid values are logged and ignored; reading
    /// configuration never fails.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(raw) = lookup(BACKEND_ENV) {
            match raw.parse() {
                Ok(backend) => config.backend = backend,
                Err(e) => tracing::warn!("ignoring {}: {}", BACKEND_ENV, e),
            }
        }

        if let Some(raw) = lookup(SYNC_DEBUG_ENV) {
            match raw.parse() {
                Ok(level) => config.sync_debug_mode = level,
                Err(e) => tracing::warn!("ignoring {}: {}", SYNC_DEBUG_ENV, e),
            }
        }

        config
    }
}
