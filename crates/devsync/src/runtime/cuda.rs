//! Runtime-loaded CUDA runtime API (`libcudart`) via dlopen.
//!
//! Avoids a build-time CUDA toolkit dependency and works with whichever `libcudart`
//! the host has installed.

use std::ffi::{c_char, c_int, c_void, CStr};

use libloading::Library;

use super::{GpuRuntime, MemcpyKind, Status, StatusClass, Stream};

// ---------------------------------------------------------------------------
// cudaError_t values we classify
// ---------------------------------------------------------------------------

pub const CUDA_SUCCESS: c_int = 0;
pub const CUDA_ERROR_INSUFFICIENT_DRIVER: c_int = 35;
pub const CUDA_ERROR_NO_DEVICE: c_int = 100;
pub const CUDA_ERROR_INVALID_DEVICE: c_int = 101;

/// Library names tried in order.
const LIBRARY_NAMES: &[&str] = &[
    "libcudart.so",
    "libcudart.so.12",
    "libcudart.so.11.0",
    "cudart64_12.dll",
    "cudart64_110.dll",
];

// ---------------------------------------------------------------------------
// CUDA runtime API function signatures
// ---------------------------------------------------------------------------

type CudaStreamT = *mut c_void;

type FnCudaGetDeviceCount = unsafe extern "C" fn(*mut c_int) -> c_int;
type FnCudaGetDevice = unsafe extern "C" fn(*mut c_int) -> c_int;
type FnCudaSetDevice = unsafe extern "C" fn(c_int) -> c_int;
type FnCudaDeviceSynchronize = unsafe extern "C" fn() -> c_int;
type FnCudaStreamSynchronize = unsafe extern "C" fn(CudaStreamT) -> c_int;
type FnCudaMemcpyAsync = unsafe extern "C" fn(
    *mut c_void, *const c_void, usize, c_int, CudaStreamT,
) -> c_int;
type FnCudaGetErrorString = unsafe extern "C" fn(c_int) -> *const c_char;

/// Function table resolved from `libcudart`.
pub struct CudaRuntimeApi {
    _lib: Library,
    cuda_get_device_count: FnCudaGetDeviceCount,
    cuda_get_device: FnCudaGetDevice,
    cuda_set_device: FnCudaSetDevice,
    cuda_device_synchronize: FnCudaDeviceSynchronize,
    cuda_stream_synchronize: FnCudaStreamSynchronize,
    cuda_memcpy_async: FnCudaMemcpyAsync,
    cuda_get_error_string: FnCudaGetErrorString,
}

// Safety: the function pointers are process-global and the CUDA runtime is internally
// synchronized.
unsafe impl Send for CudaRuntimeApi {}
unsafe impl Sync for CudaRuntimeApi {}

impl std::fmt::Debug for CudaRuntimeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaRuntimeApi").finish_non_exhaustive()
    }
}

impl CudaRuntimeApi {
    /// Load `libcudart`. Returns `None` if no candidate library or symbol is found.
    pub fn load() -> Option<Self> {
        LIBRARY_NAMES.iter().find_map(|name| {
            let lib = unsafe { Library::new(*name) }.ok()?;
            let api = Self::from_library(lib);
            if api.is_some() {
                tracing::debug!("loaded CUDA runtime from {}", name);
            }
            api
        })
    }

    fn from_library(lib: Library) -> Option<Self> {
        unsafe {
            Some(CudaRuntimeApi {
                cuda_get_device_count: *lib
                    .get::<FnCudaGetDeviceCount>(b"cudaGetDeviceCount\0")
                    .ok()?,
                cuda_get_device: *lib.get::<FnCudaGetDevice>(b"cudaGetDevice\0").ok()?,
                cuda_set_device: *lib.get::<FnCudaSetDevice>(b"cudaSetDevice\0").ok()?,
                cuda_device_synchronize: *lib
                    .get::<FnCudaDeviceSynchronize>(b"cudaDeviceSynchronize\0")
                    .ok()?,
                cuda_stream_synchronize: *lib
                    .get::<FnCudaStreamSynchronize>(b"cudaStreamSynchronize\0")
                    .ok()?,
                cuda_memcpy_async: *lib.get::<FnCudaMemcpyAsync>(b"cudaMemcpyAsync\0").ok()?,
                cuda_get_error_string: *lib
                    .get::<FnCudaGetErrorString>(b"cudaGetErrorString\0")
                    .ok()?,
                _lib: lib,
            })
        }
    }
}

impl GpuRuntime for CudaRuntimeApi {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn get_device_count(&self, count: &mut c_int) -> Status {
        Status(unsafe { (self.cuda_get_device_count)(count) })
    }

    fn get_device(&self, device: &mut c_int) -> Status {
        Status(unsafe { (self.cuda_get_device)(device) })
    }

    fn set_device(&self, device: c_int) -> Status {
        Status(unsafe { (self.cuda_set_device)(device) })
    }

    fn device_synchronize(&self) -> Status {
        Status(unsafe { (self.cuda_device_synchronize)() })
    }

    fn stream_synchronize(&self, stream: Stream) -> Status {
        Status(unsafe { (self.cuda_stream_synchronize)(stream.as_raw()) })
    }

    unsafe fn memcpy_async(
        &self,
        dst: *mut c_void,
        src: *const c_void,
        nbytes: usize,
        kind: MemcpyKind,
        stream: Stream,
    ) -> Status {
        Status((self.cuda_memcpy_async)(dst, src, nbytes, kind.as_raw(), stream.as_raw()))
    }

    fn error_string(&self, status: Status) -> String {
        let ptr = unsafe { (self.cuda_get_error_string)(status.0) };
        if ptr.is_null() {
            return String::new();
        }
        // cudaGetErrorString returns a static, NUL-terminated string.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    fn classify(&self, status: Status) -> StatusClass {
        classify_cuda(status)
    }
}

fn classify_cuda(status: Status) -> StatusClass {
    match status.0 {
        CUDA_SUCCESS => StatusClass::Success,
        CUDA_ERROR_NO_DEVICE => StatusClass::NoDevice,
        CUDA_ERROR_INSUFFICIENT_DRIVER => StatusClass::InsufficientDriver,
        _ => StatusClass::Other,
    }
}
