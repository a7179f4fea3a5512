//! Device registry: memoized device count and checked active-device control.

use std::ffi::c_int;

use crate::context::{DeviceIndex, GpuContext};
use crate::error::{Error, Result};
use crate::runtime::{GpuRuntime, StatusClass};
use crate::status::check_status;

impl<R: GpuRuntime> GpuContext<R> {
    /// Number of devices, queried once and cached for the life of the context.
    ///
    /// Never fails. A broken or missing driver is reported as zero devices, with a single
    /// warning logged when the query runs.
    pub fn device_count(&self) -> DeviceIndex {
        *self
            .device_count
            .get_or_init(|| query_device_count(&self.runtime))
    }

    /// Like [`GpuContext::device_count`], but zero devices is an error.
    pub fn device_count_ensure_non_zero(&self) -> Result<DeviceIndex> {
        match self.device_count() {
            0 => Err(Error::NoDevices),
            n => Ok(n),
        }
    }

    pub fn is_available(&self) -> bool {
        self.device_count() > 0
    }

    /// The runtime's active device for the calling thread.
    pub fn current_device(&self) -> Result<DeviceIndex> {
        let mut device: c_int = 0;
        check_status(&self.runtime, self.runtime.get_device(&mut device), "get_device")?;
        DeviceIndex::try_from(device)
            .ok()
            .filter(|d| *d >= 0)
            .ok_or(Error::DeviceIndexOutOfRange(device))
    }

    /// Make `device` the active device. Range checking is left to the runtime.
    pub fn set_device(&self, device: DeviceIndex) -> Result<()> {
        check_status(
            &self.runtime,
            self.runtime.set_device(c_int::from(device)),
            "set_device",
        )
    }

    /// Block until all work on the current device has finished.
    ///
    /// An explicit, deliberate sync: the sync debug mode does not apply.
    pub fn device_synchronize(&self) -> Result<()> {
        check_status(
            &self.runtime,
            self.runtime.device_synchronize(),
            "device_synchronize",
        )
    }
}

fn query_device_count<R: GpuRuntime + ?Sized>(runtime: &R) -> DeviceIndex {
    let mut count: c_int = 0;
    let status = runtime.get_device_count(&mut count);

    match runtime.classify(status) {
        StatusClass::Success => {}
        StatusClass::NoDevice => {
            tracing::debug!(backend = runtime.name(), "runtime reports no GPU devices");
            return 0;
        }
        StatusClass::InsufficientDriver | StatusClass::Other => {
            if let Err(e) = check_status(runtime, status, "get_device_count") {
                tracing::warn!(
                    backend = runtime.name(),
                    "GPU initialization: {}. Reporting 0 devices.",
                    e
                );
            }
            return 0;
        }
    }

    match DeviceIndex::try_from(count) {
        Ok(n) if n >= 0 => n,
        _ => {
            tracing::warn!(
                backend = runtime.name(),
                "GPU initialization: runtime reported {} devices, which DeviceIndex cannot hold. \
                 Reporting 0 devices.",
                count
            );
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{SimulatedRuntime, Status};
    use crate::warning::WarningState;
    use std::sync::Arc;

    fn context(rt: &Arc<SimulatedRuntime>) -> GpuContext<Arc<SimulatedRuntime>> {
        GpuContext::with_warning_state(Arc::clone(rt), Arc::new(WarningState::new()))
    }

    #[test]
    fn test_device_count_memoized() {
        let rt = Arc::new(SimulatedRuntime::new(4));
        let ctx = context(&rt);
        for _ in 0..10 {
            assert_eq!(ctx.device_count(), 4);
        }
        assert_eq!(rt.enumerations(), 1);
    }

    #[test]
    fn test_device_count_failure_is_zero() {
        let rt = Arc::new(SimulatedRuntime::new(2));
        rt.fail_device_count(Some(Status(35)));
        let ctx = context(&rt);
        assert_eq!(ctx.device_count(), 0);
        assert!(!ctx.is_available());

        // Stale by design: the cached zero survives the driver recovering.
        rt.fail_device_count(None);
        assert_eq!(ctx.device_count(), 0);
        assert_eq!(rt.enumerations(), 1);
    }

    #[test]
    fn test_device_count_unknown_error_is_zero() {
        let rt = Arc::new(SimulatedRuntime::new(2));
        rt.fail_device_count(Some(Status(999)));
        assert_eq!(context(&rt).device_count(), 0);
    }

    #[test]
    fn test_device_count_overflow_is_zero() {
        let rt = Arc::new(SimulatedRuntime::new(300));
        assert_eq!(context(&rt).device_count(), 0);
    }

    #[test]
    fn test_ensure_non_zero() {
        let none = Arc::new(SimulatedRuntime::new(0));
        assert_eq!(context(&none).device_count_ensure_non_zero(), Err(Error::NoDevices));

        let two = Arc::new(SimulatedRuntime::new(2));
        assert_eq!(context(&two).device_count_ensure_non_zero(), Ok(2));
    }

    #[test]
    fn test_set_and_current_device() {
        let rt = Arc::new(SimulatedRuntime::new(2));
        let ctx = context(&rt);
        assert_eq!(ctx.current_device().unwrap(), 0);
        ctx.set_device(1).unwrap();
        assert_eq!(ctx.current_device().unwrap(), 1);

        let err = ctx.set_device(5).unwrap_err();
        assert_eq!(err.status(), Some(Status(101)));
        assert_eq!(ctx.current_device().unwrap(), 1);
    }

    #[test]
    fn test_current_device_without_devices_is_runtime_error() {
        let rt = Arc::new(SimulatedRuntime::new(0));
        let err = context(&rt).current_device().unwrap_err();
        assert!(err.is_runtime());
    }

    #[test]
    fn test_device_synchronize_bypasses_policy() {
        let rt = Arc::new(SimulatedRuntime::new(1));
        let ctx = context(&rt);
        ctx.set_sync_warning_level(crate::SyncWarningLevel::Error);
        ctx.device_synchronize().unwrap();
        assert_eq!(rt.device_syncs(), 1);
        assert_eq!(ctx.warning_state().escalation_count(), 0);
    }

    #[test]
    fn test_device_synchronize_failure_translated() {
        let rt = Arc::new(SimulatedRuntime::new(1));
        rt.fail_device_synchronize(Some(Status(700)));
        let err = context(&rt).device_synchronize().unwrap_err();
        match err {
            Error::Runtime { code, call, description } => {
                assert_eq!(code, Status(700));
                assert_eq!(call, "device_synchronize");
                assert_eq!(description, "an illegal memory access was encountered");
            }
            other => panic!("expected Runtime error, got {:?}", other),
        }
    }
}
