//! # devsync
//!
//! Checked wrappers around a GPU runtime's device and stream management.
//!
//! Provides:
//! - Status-code checking: every runtime call either succeeds or returns an [`Error`]
//!   carrying the native code and its description
//! - Device registry: memoized device count that never fails, current device get/set,
//!   device-wide synchronize
//! - Sync debug mode: a process-wide [`SyncWarningLevel`] that can log (`Warn`) or reject
//!   (`Error`) monitored synchronizing calls
//! - [`copy_and_sync`] and [`stream_synchronize`], which honor the sync debug mode
//! - CUDA and HIP backends loaded at runtime, plus a [`SimulatedRuntime`] for tests
//!
//! The free functions below act on the process-wide [`default_context`]. Build a
//! [`GpuContext`] directly to inject a runtime or isolate warning state.
//!
//! ```no_run
//! use devsync::{Stream, SyncWarningLevel};
//!
//! fn main() -> devsync::Result<()> {
//!     if !devsync::is_available() {
//!         return Ok(());
//!     }
//!     devsync::set_device(0)?;
//!     devsync::set_sync_warning_level(SyncWarningLevel::Warn);
//!     devsync::stream_synchronize(Stream::DEFAULT)?; // logs a warning
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
mod device;
pub mod error;
pub mod runtime;
pub mod status;
mod sync;
pub mod warning;

use std::ffi::c_void;

pub use config::{Backend, Config};
pub use context::{default_context, install_runtime, DeviceIndex, GpuContext};
pub use error::{Error, Result};
pub use runtime::{GpuRuntime, MemcpyKind, SimulatedRuntime, Status, Stream};
pub use status::check_status;
pub use warning::{warning_state, SyncWarningLevel, WarningState};

/// Number of devices on the default context. Never fails; zero when no driver works.
pub fn device_count() -> DeviceIndex {
    default_context().device_count()
}

/// Number of devices, or [`Error::NoDevices`] when there are none.
pub fn device_count_ensure_non_zero() -> Result<DeviceIndex> {
    default_context().device_count_ensure_non_zero()
}

pub fn is_available() -> bool {
    default_context().is_available()
}

pub fn current_device() -> Result<DeviceIndex> {
    default_context().current_device()
}

pub fn set_device(device: DeviceIndex) -> Result<()> {
    default_context().set_device(device)
}

pub fn device_synchronize() -> Result<()> {
    default_context().device_synchronize()
}

pub fn sync_warning_level() -> SyncWarningLevel {
    default_context().sync_warning_level()
}

pub fn set_sync_warning_level(level: SyncWarningLevel) {
    default_context().set_sync_warning_level(level);
}

/// Name of the backend behind the default context (`"cuda"`, `"hip"`, ...).
pub fn backend_name() -> &'static str {
    default_context().backend_name()
}

/// See [`GpuContext::copy_and_sync`].
///
/// # Safety
///
/// `dst` and `src` must be valid for `nbytes` bytes in the memory spaces `kind`
/// describes until this call returns.
#[inline]
pub unsafe fn copy_and_sync(
    dst: *mut c_void,
    src: *const c_void,
    nbytes: usize,
    kind: MemcpyKind,
    stream: Stream,
) -> Result<()> {
    default_context().copy_and_sync(dst, src, nbytes, kind, stream)
}

#[inline]
pub fn stream_synchronize(stream: Stream) -> Result<()> {
    default_context().stream_synchronize(stream)
}
