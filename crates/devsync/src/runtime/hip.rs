//! Runtime-loaded HIP runtime API (`libamdhip64`) via dlopen.
//!
//! Parallel to `cuda.rs`. HIP additionally exports `hipMemcpyWithStream`, a combined
//! copy-and-wait; it is resolved optionally since older ROCm releases lack it.

use std::ffi::{c_char, c_int, c_void, CStr};

use libloading::Library;

use super::{GpuRuntime, MemcpyKind, Status, StatusClass, Stream};

// ---------------------------------------------------------------------------
// hipError_t values we classify
// ---------------------------------------------------------------------------

pub const HIP_SUCCESS: c_int = 0;
pub const HIP_ERROR_INSUFFICIENT_DRIVER: c_int = 35;
pub const HIP_ERROR_NO_DEVICE: c_int = 100;
pub const HIP_ERROR_INVALID_DEVICE: c_int = 101;

const LIBRARY_NAMES: &[&str] = &[
    "libamdhip64.so",
    "libamdhip64.so.6",
    "libamdhip64.so.5",
    "amdhip64.dll",
];

// ---------------------------------------------------------------------------
// HIP runtime API function signatures
// ---------------------------------------------------------------------------

type HipStream = *mut c_void;

type FnHipGetDeviceCount = unsafe extern "C" fn(*mut c_int) -> c_int;
type FnHipGetDevice = unsafe extern "C" fn(*mut c_int) -> c_int;
type FnHipSetDevice = unsafe extern "C" fn(c_int) -> c_int;
type FnHipDeviceSynchronize = unsafe extern "C" fn() -> c_int;
type FnHipStreamSynchronize = unsafe extern "C" fn(HipStream) -> c_int;
type FnHipMemcpyAsync = unsafe extern "C" fn(
    *mut c_void, *const c_void, usize, c_int, HipStream,
) -> c_int;
type FnHipMemcpyWithStream = unsafe extern "C" fn(
    *mut c_void, *const c_void, usize, c_int, HipStream,
) -> c_int;
type FnHipGetErrorString = unsafe extern "C" fn(c_int) -> *const c_char;

/// Function table resolved from `libamdhip64`.
pub struct HipRuntimeApi {
    _lib: Library,
    hip_get_device_count: FnHipGetDeviceCount,
    hip_get_device: FnHipGetDevice,
    hip_set_device: FnHipSetDevice,
    hip_device_synchronize: FnHipDeviceSynchronize,
    hip_stream_synchronize: FnHipStreamSynchronize,
    hip_memcpy_async: FnHipMemcpyAsync,
    hip_memcpy_with_stream: Option<FnHipMemcpyWithStream>,
    hip_get_error_string: FnHipGetErrorString,
}

// Safety: The loaded function pointers are process-global and thread-safe
// (HIP runtime is internally synchronized).
unsafe impl Send for HipRuntimeApi {}
unsafe impl Sync for HipRuntimeApi {}

impl std::fmt::Debug for HipRuntimeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HipRuntimeApi")
            .field("memcpy_with_stream", &self.hip_memcpy_with_stream.is_some())
            .finish_non_exhaustive()
    }
}

impl HipRuntimeApi {
    /// Load `libamdhip64`. Returns `None` if the library or a required symbol is missing.
    pub fn load() -> Option<Self> {
        LIBRARY_NAMES.iter().find_map(|name| {
            let lib = unsafe { Library::new(*name) }.ok()?;
            let api = Self::from_library(lib)?;
            tracing::debug!(
                "loaded HIP runtime from {} (hipMemcpyWithStream: {})",
                name,
                api.hip_memcpy_with_stream.is_some()
            );
            Some(api)
        })
    }

    fn from_library(lib: Library) -> Option<Self> {
        unsafe {
            let hip_memcpy_with_stream = lib
                .get::<FnHipMemcpyWithStream>(b"hipMemcpyWithStream\0")
                .ok()
                .map(|sym| *sym);
            Some(HipRuntimeApi {
                hip_get_device_count: *lib.get::<FnHipGetDeviceCount>(b"hipGetDeviceCount\0").ok()?,
                hip_get_device: *lib.get::<FnHipGetDevice>(b"hipGetDevice\0").ok()?,
                hip_set_device: *lib.get::<FnHipSetDevice>(b"hipSetDevice\0").ok()?,
                hip_device_synchronize: *lib
                    .get::<FnHipDeviceSynchronize>(b"hipDeviceSynchronize\0")
                    .ok()?,
                hip_stream_synchronize: *lib
                    .get::<FnHipStreamSynchronize>(b"hipStreamSynchronize\0")
                    .ok()?,
                hip_memcpy_async: *lib.get::<FnHipMemcpyAsync>(b"hipMemcpyAsync\0").ok()?,
                hip_memcpy_with_stream,
                hip_get_error_string: *lib.get::<FnHipGetErrorString>(b"hipGetErrorString\0").ok()?,
                _lib: lib,
            })
        }
    }
}

impl GpuRuntime for HipRuntimeApi {
    fn name(&self) -> &'static str {
        "hip"
    }

    fn get_device_count(&self, count: &mut c_int) -> Status {
        Status(unsafe { (self.hip_get_device_count)(count) })
    }

    fn get_device(&self, device: &mut c_int) -> Status {
        Status(unsafe { (self.hip_get_device)(device) })
    }

    fn set_device(&self, device: c_int) -> Status {
        Status(unsafe { (self.hip_set_device)(device) })
    }

    fn device_synchronize(&self) -> Status {
        Status(unsafe { (self.hip_device_synchronize)() })
    }

    fn stream_synchronize(&self, stream: Stream) -> Status {
        Status(unsafe { (self.hip_stream_synchronize)(stream.as_raw()) })
    }

    unsafe fn memcpy_async(
        &self,
        dst: *mut c_void,
        src: *const c_void,
        nbytes: usize,
        kind: MemcpyKind,
        stream: Stream,
    ) -> Status {
        Status((self.hip_memcpy_async)(dst, src, nbytes, kind.as_raw(), stream.as_raw()))
    }

    unsafe fn memcpy_with_stream(
        &self,
        dst: *mut c_void,
        src: *const c_void,
        nbytes: usize,
        kind: MemcpyKind,
        stream: Stream,
    ) -> Option<Status> {
        let f = self.hip_memcpy_with_stream?;
        Some(Status(f(dst, src, nbytes, kind.as_raw(), stream.as_raw())))
    }

    fn error_string(&self, status: Status) -> String {
        let ptr = unsafe { (self.hip_get_error_string)(status.0) };
        if ptr.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    fn classify(&self, status: Status) -> StatusClass {
        match status.0 {
            HIP_SUCCESS => StatusClass::Success,
            HIP_ERROR_NO_DEVICE => StatusClass::NoDevice,
            HIP_ERROR_INSUFFICIENT_DRIVER => StatusClass::InsufficientDriver,
            _ => StatusClass::Other,
        }
    }
}
