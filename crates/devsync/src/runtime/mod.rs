//! GPU runtime abstraction.
//!
//! `GpuRuntime` is the raw capability surface this crate wraps: every method mirrors one
//! runtime API entry point and returns the native status code untouched. Checking those codes
//! is the job of [`crate::status`], never of the backend.
//!
//! Backends:
//! - [`cuda::CudaRuntimeApi`]: `libcudart` loaded at runtime
//! - [`hip::HipRuntimeApi`]: `libamdhip64` loaded at runtime
//! - [`simulated::SimulatedRuntime`]: in-process fake with call counters
//! - [`UnavailableRuntime`]: stand-in when no library could be loaded

pub mod cuda;
pub mod hip;
pub mod simulated;

use std::ffi::{c_int, c_void};
use std::fmt;
use std::sync::Arc;

use crate::config::Backend;

pub use simulated::SimulatedRuntime;

/// Native runtime status code. Zero is success for both CUDA and HIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Status(pub c_int);

impl Status {
    pub const SUCCESS: Status = Status(0);

    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse meaning of a status code, as far as device enumeration cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// Driver is present but reports no devices.
    NoDevice,
    /// Driver missing or too old for the runtime.
    InsufficientDriver,
    Other,
}

/// Direction of a memory copy. Values match `cudaMemcpyKind` / `hipMemcpyKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MemcpyKind {
    HostToHost = 0,
    HostToDevice = 1,
    DeviceToHost = 2,
    DeviceToDevice = 3,
    /// Direction inferred from the pointers (unified addressing).
    Default = 4,
}

impl MemcpyKind {
    #[inline]
    pub fn as_raw(self) -> c_int {
        self as c_int
    }
}

/// Opaque runtime stream handle.
///
/// `Stream::DEFAULT` is the null (legacy default) stream. The handle is only an identifier;
/// ownership of the underlying stream stays with whoever created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stream(*mut c_void);

// Stream handles are plain identifiers; CUDA and HIP accept them from any host thread.
unsafe impl Send for Stream {}
unsafe impl Sync for Stream {}

impl Stream {
    pub const DEFAULT: Stream = Stream(std::ptr::null_mut());

    /// Wrap a raw `cudaStream_t` / `hipStream_t`.
    pub const fn from_raw(raw: *mut c_void) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> *mut c_void {
        self.0
    }

    pub fn is_default(self) -> bool {
        self.0.is_null()
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Raw device/stream capabilities of a GPU runtime.
///
/// Implementations return whatever status the runtime produced; they must not retry or
/// translate failures.
pub trait GpuRuntime: Send + Sync {
    /// Short backend name, e.g. `"cuda"`.
    fn name(&self) -> &'static str;

    fn get_device_count(&self, count: &mut c_int) -> Status;

    fn get_device(&self, device: &mut c_int) -> Status;

    fn set_device(&self, device: c_int) -> Status;

    fn device_synchronize(&self) -> Status;

    fn stream_synchronize(&self, stream: Stream) -> Status;

    /// Enqueue a copy on `stream` without waiting for it.
    ///
    /// # Safety
    ///
    /// `dst` and `src` must be valid for `nbytes` bytes in the address spaces implied by
    /// `kind` until the copy completes.
    unsafe fn memcpy_async(
        &self,
        dst: *mut c_void,
        src: *const c_void,
        nbytes: usize,
        kind: MemcpyKind,
        stream: Stream,
    ) -> Status;

    /// Copy and wait for `stream` in a single runtime call, if the runtime has one.
    ///
    /// Returns `None` when unsupported; callers then fall back to
    /// `memcpy_async` + `stream_synchronize`.
    ///
    /// # Safety
    ///
    /// Same contract as [`GpuRuntime::memcpy_async`].
    unsafe fn memcpy_with_stream(
        &self,
        _dst: *mut c_void,
        _src: *const c_void,
        _nbytes: usize,
        _kind: MemcpyKind,
        _stream: Stream,
    ) -> Option<Status> {
        None
    }

    /// Human-readable description of a status code.
    fn error_string(&self, status: Status) -> String;

    fn classify(&self, status: Status) -> StatusClass {
        if status.is_success() {
            StatusClass::Success
        } else {
            StatusClass::Other
        }
    }
}

macro_rules! forward_gpu_runtime {
    ($($ptr:ident),*) => {$(
        impl<R: GpuRuntime + ?Sized> GpuRuntime for $ptr<R> {
            fn name(&self) -> &'static str {
                (**self).name()
            }

            fn get_device_count(&self, count: &mut c_int) -> Status {
                (**self).get_device_count(count)
            }

            fn get_device(&self, device: &mut c_int) -> Status {
                (**self).get_device(device)
            }

            fn set_device(&self, device: c_int) -> Status {
                (**self).set_device(device)
            }

            fn device_synchronize(&self) -> Status {
                (**self).device_synchronize()
            }

            fn stream_synchronize(&self, stream: Stream) -> Status {
                (**self).stream_synchronize(stream)
            }

            unsafe fn memcpy_async(
                &self,
                dst: *mut c_void,
                src: *const c_void,
                nbytes: usize,
                kind: MemcpyKind,
                stream: Stream,
            ) -> Status {
                (**self).memcpy_async(dst, src, nbytes, kind, stream)
            }

            unsafe fn memcpy_with_stream(
                &self,
                dst: *mut c_void,
                src: *const c_void,
                nbytes: usize,
                kind: MemcpyKind,
                stream: Stream,
            ) -> Option<Status> {
                (**self).memcpy_with_stream(dst, src, nbytes, kind, stream)
            }

            fn error_string(&self, status: Status) -> String {
                (**self).error_string(status)
            }

            fn classify(&self, status: Status) -> StatusClass {
                (**self).classify(status)
            }
        }
    )*};
}

forward_gpu_runtime!(Box, Arc);

/// Status every call of [`UnavailableRuntime`] returns (`cudaErrorInsufficientDriver`).
const UNAVAILABLE_STATUS: Status = Status(35);

/// Runtime used when no GPU runtime library could be loaded.
///
/// Every call fails, so `device_count()` degrades to zero and everything else reports a
/// runtime error naming the missing library.
#[derive(Debug, Clone)]
pub struct UnavailableRuntime {
    reason: String,
}

impl UnavailableRuntime {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl GpuRuntime for UnavailableRuntime {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn get_device_count(&self, _count: &mut c_int) -> Status {
        UNAVAILABLE_STATUS
    }

    fn get_device(&self, _device: &mut c_int) -> Status {
        UNAVAILABLE_STATUS
    }

    fn set_device(&self, _device: c_int) -> Status {
        UNAVAILABLE_STATUS
    }

    fn device_synchronize(&self) -> Status {
        UNAVAILABLE_STATUS
    }

    fn stream_synchronize(&self, _stream: Stream) -> Status {
        UNAVAILABLE_STATUS
    }

    unsafe fn memcpy_async(
        &self,
        _dst: *mut c_void,
        _src: *const c_void,
        _nbytes: usize,
        _kind: MemcpyKind,
        _stream: Stream,
    ) -> Status {
        UNAVAILABLE_STATUS
    }

    fn error_string(&self, _status: Status) -> String {
        format!("no GPU runtime available: {}", self.reason)
    }

    fn classify(&self, status: Status) -> StatusClass {
        if status.is_success() {
            StatusClass::Success
        } else {
            StatusClass::InsufficientDriver
        }
    }
}

/// Resolve a runtime for the requested backend.
///
/// Never fails: a missing library yields an [`UnavailableRuntime`].
pub fn load(backend: Backend) -> Box<dyn GpuRuntime> {
    match backend {
        Backend::Cuda => match cuda::CudaRuntimeApi::load() {
            Some(api) => Box::new(api),
            None => Box::new(UnavailableRuntime::new("libcudart could not be loaded")),
        },
        Backend::Hip => match hip::HipRuntimeApi::load() {
            Some(api) => Box::new(api),
            None => Box::new(UnavailableRuntime::new("libamdhip64 could not be loaded")),
        },
        Backend::Simulated => Box::new(SimulatedRuntime::default()),
        Backend::Auto => {
            if let Some(api) = cuda::CudaRuntimeApi::load() {
                Box::new(api)
            } else if let Some(api) = hip::HipRuntimeApi::load() {
                Box::new(api)
            } else {
                Box::new(UnavailableRuntime::new(
                    "neither libcudart nor libamdhip64 could be loaded",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_success() {
        assert!(Status::SUCCESS.is_success());
        assert!(!Status(100).is_success());
        assert_eq!(Status(101).to_string(), "101");
    }

    #[test]
    fn test_memcpy_kind_values() {
        assert_eq!(MemcpyKind::HostToHost.as_raw(), 0);
        assert_eq!(MemcpyKind::HostToDevice.as_raw(), 1);
        assert_eq!(MemcpyKind::DeviceToHost.as_raw(), 2);
        assert_eq!(MemcpyKind::DeviceToDevice.as_raw(), 3);
        assert_eq!(MemcpyKind::Default.as_raw(), 4);
    }

    #[test]
    fn test_default_stream() {
        assert!(Stream::DEFAULT.is_default());
        assert!(Stream::default().is_default());
        assert!(!Stream::from_raw(8 as *mut c_void).is_default());
    }

    #[test]
    fn test_unavailable_runtime_fails_everything() {
        let rt = UnavailableRuntime::new("test");
        let mut count = -1;
        let status = rt.get_device_count(&mut count);
        assert!(!status.is_success());
        assert_eq!(rt.classify(status), StatusClass::InsufficientDriver);
        assert!(!rt.device_synchronize().is_success());
        assert!(rt.error_string(status).contains("test"));
    }

    #[test]
    fn test_simulated_backend_has_no_devices() {
        let rt = load(Backend::Simulated);
        assert_eq!(rt.name(), "simulated");
        let mut count = -1;
        let status = rt.get_device_count(&mut count);
        assert_eq!(rt.classify(status), StatusClass::NoDevice);
        assert_eq!(count, 0);
        assert!(!rt.stream_synchronize(Stream::DEFAULT).is_success());
    }

    #[test]
    fn test_simulated_backend_keeps_no_journal() {
        let rt = SimulatedRuntime::default();
        for _ in 0..64 {
            let mut count = 0;
            let _ = rt.get_device_count(&mut count);
            let _ = rt.device_synchronize();
            let _ = rt.stream_synchronize(Stream::DEFAULT);
        }
        assert!(rt.calls().is_empty());
        assert_eq!(rt.enumerations(), 64);
    }
}
