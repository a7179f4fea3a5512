//! In-process GPU runtime for tests and device-less hosts.
//!
//! Uses CUDA's status numbering. Memory is ordinary host memory, so copies of any
//! `MemcpyKind` are performed with a plain byte copy. Every call is journaled and counted.

use std::ffi::{c_int, c_void};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::cuda::{
    CUDA_ERROR_INSUFFICIENT_DRIVER, CUDA_ERROR_INVALID_DEVICE, CUDA_ERROR_NO_DEVICE,
    CUDA_SUCCESS,
};
use super::{GpuRuntime, MemcpyKind, Status, StatusClass, Stream};

/// Status of a simulated failed kernel (`cudaErrorIllegalAddress`).
pub const SIM_ERROR_ILLEGAL_ADDRESS: c_int = 700;

/// One recorded runtime call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    GetDeviceCount,
    GetDevice,
    SetDevice(c_int),
    DeviceSynchronize,
    StreamSynchronize(Stream),
    MemcpyAsync { nbytes: usize, kind: MemcpyKind, stream: Stream },
    MemcpyWithStream { nbytes: usize, kind: MemcpyKind, stream: Stream },
}

#[derive(Debug, Default)]
struct Faults {
    device_count: Option<Status>,
    device_synchronize: Option<Status>,
    stream_synchronize: Option<Status>,
    memcpy: Option<Status>,
}

/// Fake runtime with a fixed device topology.
#[derive(Debug)]
pub struct SimulatedRuntime {
    device_count: c_int,
    active_device: AtomicI32,
    memcpy_with_stream: bool,
    faults: Mutex<Faults>,
    journal_enabled: bool,
    journal: Mutex<Vec<SimCall>>,
    enumerations: AtomicUsize,
    device_syncs: AtomicUsize,
    stream_syncs: AtomicUsize,
    copies: AtomicUsize,
}

impl SimulatedRuntime {
    /// Runtime reporting `device_count` devices with device 0 active.
    ///
    /// Only the counters are kept; call [`with_journal`](Self::with_journal) to also record
    /// every call.
    pub fn new(device_count: c_int) -> Self {
        Self {
            device_count,
            active_device: AtomicI32::new(0),
            memcpy_with_stream: false,
            faults: Mutex::new(Faults::default()),
            journal_enabled: false,
            journal: Mutex::new(Vec::new()),
            enumerations: AtomicUsize::new(0),
            device_syncs: AtomicUsize::new(0),
            stream_syncs: AtomicUsize::new(0),
            copies: AtomicUsize::new(0),
        }
    }

    /// Advertise a combined copy-and-wait primitive, like HIP's `hipMemcpyWithStream`.
    pub fn with_memcpy_with_stream(mut self, enabled: bool) -> Self {
        self.memcpy_with_stream = enabled;
        self
    }

    /// Record every call for [`calls`](Self::calls). The journal is never trimmed, so leave
    /// it off for long-lived runtimes.
    pub fn with_journal(mut self, enabled: bool) -> Self {
        self.journal_enabled = enabled;
        self
    }

    /// Make device enumeration return `status` (or succeed again with `None`).
    pub fn fail_device_count(&self, status: Option<Status>) {
        self.faults.lock().device_count = status;
    }

    pub fn fail_device_synchronize(&self, status: Option<Status>) {
        self.faults.lock().device_synchronize = status;
    }

    pub fn fail_stream_synchronize(&self, status: Option<Status>) {
        self.faults.lock().stream_synchronize = status;
    }

    pub fn fail_memcpy(&self, status: Option<Status>) {
        self.faults.lock().memcpy = status;
    }

    /// Number of device enumeration calls made so far.
    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }

    pub fn device_syncs(&self) -> usize {
        self.device_syncs.load(Ordering::SeqCst)
    }

    /// Stream waits, including the implicit one inside a combined copy.
    pub fn stream_syncs(&self) -> usize {
        self.stream_syncs.load(Ordering::SeqCst)
    }

    pub fn copies(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }

    /// Snapshot of every call made so far, in order. Empty unless journaling is enabled.
    pub fn calls(&self) -> Vec<SimCall> {
        self.journal.lock().clone()
    }

    fn record(&self, call: SimCall) {
        if self.journal_enabled {
            self.journal.lock().push(call);
        }
    }

    fn no_device(&self) -> Option<Status> {
        (self.device_count == 0).then_some(Status(CUDA_ERROR_NO_DEVICE))
    }

    unsafe fn copy_bytes(&self, dst: *mut c_void, src: *const c_void, nbytes: usize) -> Status {
        if let Some(status) = self.faults.lock().memcpy {
            return status;
        }
        if nbytes > 0 {
            std::ptr::copy(src as *const u8, dst as *mut u8, nbytes);
        }
        self.copies.fetch_add(1, Ordering::SeqCst);
        Status::SUCCESS
    }
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new(0)
    }
}

impl GpuRuntime for SimulatedRuntime {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn get_device_count(&self, count: &mut c_int) -> Status {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        self.record(SimCall::GetDeviceCount);
        if let Some(status) = self.faults.lock().device_count {
            return status;
        }
        if self.device_count == 0 {
            *count = 0;
            return Status(CUDA_ERROR_NO_DEVICE);
        }
        *count = self.device_count;
        Status::SUCCESS
    }

    fn get_device(&self, device: &mut c_int) -> Status {
        self.record(SimCall::GetDevice);
        if let Some(status) = self.no_device() {
            return status;
        }
        *device = self.active_device.load(Ordering::SeqCst);
        Status::SUCCESS
    }

    fn set_device(&self, device: c_int) -> Status {
        self.record(SimCall::SetDevice(device));
        if let Some(status) = self.no_device() {
            return status;
        }
        if device < 0 || device >= self.device_count {
            return Status(CUDA_ERROR_INVALID_DEVICE);
        }
        self.active_device.store(device, Ordering::SeqCst);
        Status::SUCCESS
    }

    fn device_synchronize(&self) -> Status {
        self.record(SimCall::DeviceSynchronize);
        if let Some(status) = self.no_device() {
            return status;
        }
        self.device_syncs.fetch_add(1, Ordering::SeqCst);
        self.faults.lock().device_synchronize.unwrap_or(Status::SUCCESS)
    }

    fn stream_synchronize(&self, stream: Stream) -> Status {
        self.record(SimCall::StreamSynchronize(stream));
        if let Some(status) = self.no_device() {
            return status;
        }
        self.stream_syncs.fetch_add(1, Ordering::SeqCst);
        self.faults.lock().stream_synchronize.unwrap_or(Status::SUCCESS)
    }

    unsafe fn memcpy_async(
        &self,
        dst: *mut c_void,
        src: *const c_void,
        nbytes: usize,
        kind: MemcpyKind,
        stream: Stream,
    ) -> Status {
        self.record(SimCall::MemcpyAsync { nbytes, kind, stream });
        if let Some(status) = self.no_device() {
            return status;
        }
        self.copy_bytes(dst, src, nbytes)
    }

    unsafe fn memcpy_with_stream(
        &self,
        dst: *mut c_void,
        src: *const c_void,
        nbytes: usize,
        kind: MemcpyKind,
        stream: Stream,
    ) -> Option<Status> {
        if !self.memcpy_with_stream {
            return None;
        }
        self.record(SimCall::MemcpyWithStream { nbytes, kind, stream });
        if let Some(status) = self.no_device() {
            return Some(status);
        }
        let status = self.copy_bytes(dst, src, nbytes);
        if status.is_success() {
            self.stream_syncs.fetch_add(1, Ordering::SeqCst);
        }
        Some(status)
    }

    /// Known codes get CUDA's wording; anything else has no description.
    fn error_string(&self, status: Status) -> String {
        match status.0 {
            CUDA_SUCCESS => "no error",
            CUDA_ERROR_INSUFFICIENT_DRIVER => {
                "CUDA driver version is insufficient for CUDA runtime version"
            }
            CUDA_ERROR_NO_DEVICE => "no CUDA-capable device is detected",
            CUDA_ERROR_INVALID_DEVICE => "invalid device ordinal",
            SIM_ERROR_ILLEGAL_ADDRESS => "an illegal memory access was encountered",
            _ => "",
        }
        .to_string()
    }

    fn classify(&self, status: Status) -> StatusClass {
        match status.0 {
            CUDA_SUCCESS => StatusClass::Success,
            CUDA_ERROR_NO_DEVICE => StatusClass::NoDevice,
            CUDA_ERROR_INSUFFICIENT_DRIVER => StatusClass::InsufficientDriver,
            _ => StatusClass::Other,
        }
    }
}
