//! Sync debug mode: what to do when a monitored synchronizing call happens.
//!
//! Implicit synchronization inside otherwise asynchronous GPU code is a classic hidden
//! performance bug. Raising the level to `Warn` logs every monitored sync; `Error` rejects
//! them before the runtime is called.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Escalation level for monitored synchronizing calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SyncWarningLevel {
    #[default]
    #[serde(alias = "default")]
    Disabled = 0,
    Warn = 1,
    Error = 2,
}

impl SyncWarningLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncWarningLevel::Disabled => "disabled",
            SyncWarningLevel::Warn => "warn",
            SyncWarningLevel::Error => "error",
        }
    }

    #[inline]
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => SyncWarningLevel::Disabled,
            1 => SyncWarningLevel::Warn,
            _ => SyncWarningLevel::Error,
        }
    }
}

impl fmt::Display for SyncWarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SyncWarningLevel> for u8 {
    fn from(level: SyncWarningLevel) -> u8 {
        level as u8
    }
}

impl TryFrom<u8> for SyncWarningLevel {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0..=2 => Ok(Self::from_raw(raw)),
            _ => Err(Error::InvalidSyncLevel(raw.to_string())),
        }
    }
}

impl FromStr for SyncWarningLevel {
    type Err = Error;

    /// Accepts `disabled`/`default`/`0`, `warn`/`1`, `error`/`2`, ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "default" | "0" => Ok(SyncWarningLevel::Disabled),
            "warn" | "1" => Ok(SyncWarningLevel::Warn),
            "error" | "2" => Ok(SyncWarningLevel::Error),
            _ => Err(Error::InvalidSyncLevel(s.to_string())),
        }
    }
}

/// Shared holder of the current [`SyncWarningLevel`].
///
/// Reads and writes are single relaxed atomic operations. A level change racing with an
/// in-flight check may or may not be observed by that check.
#[derive(Debug, Default)]
pub struct WarningState {
    level: AtomicU8,
    escalations: AtomicU64,
}

impl WarningState {
    pub const fn new() -> Self {
        Self {
            level: AtomicU8::new(SyncWarningLevel::Disabled as u8),
            escalations: AtomicU64::new(0),
        }
    }

    pub fn with_level(level: SyncWarningLevel) -> Self {
        let state = Self::new();
        state.set_sync_warning_level(level);
        state
    }

    #[inline]
    pub fn sync_warning_level(&self) -> SyncWarningLevel {
        SyncWarningLevel::from_raw(self.level.load(Ordering::Relaxed))
    }

    pub fn set_sync_warning_level(&self, level: SyncWarningLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Fast-path check: true when monitored syncs need escalation handling.
    #[inline(always)]
    pub fn is_enabled(&self) -> bool {
        self.level.load(Ordering::Relaxed) != SyncWarningLevel::Disabled as u8
    }

    /// Number of times [`WarningState::warn_or_error_on_sync`] has run.
    pub fn escalation_count(&self) -> u64 {
        self.escalations.load(Ordering::Relaxed)
    }

    /// Apply the configured action for a synchronizing call named `call`.
    ///
    /// `Warn` logs and returns `Ok`; `Error` returns [`Error::SyncEscalated`].
    #[cold]
    #[inline(never)]
    pub fn warn_or_error_on_sync(&self, call: &'static str) -> Result<()> {
        self.escalations.fetch_add(1, Ordering::Relaxed);
        match self.sync_warning_level() {
            SyncWarningLevel::Disabled => Ok(()),
            SyncWarningLevel::Warn => {
                tracing::warn!(call, "called a synchronizing GPU operation");
                Ok(())
            }
            SyncWarningLevel::Error => Err(Error::SyncEscalated { call }),
        }
    }
}

static WARNING_STATE: OnceLock<Arc<WarningState>> = OnceLock::new();

/// The process-wide warning state, created on first access.
pub fn warning_state() -> &'static Arc<WarningState> {
    WARNING_STATE.get_or_init(|| Arc::new(WarningState::new()))
}
