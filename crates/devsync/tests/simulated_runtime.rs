//! End-to-end behavior of the device registry and sync wrappers on a simulated runtime.

use std::ffi::c_void;
use std::sync::Arc;

use devsync::runtime::simulated::SimCall;
use devsync::{
    Error, GpuContext, MemcpyKind, SimulatedRuntime, Status, Stream, SyncWarningLevel,
    WarningState,
};

fn context(rt: &Arc<SimulatedRuntime>) -> GpuContext<Arc<SimulatedRuntime>> {
    GpuContext::with_warning_state(Arc::clone(rt), Arc::new(WarningState::new()))
}

// ============================================================================
// Device registry
// ============================================================================

#[test]
fn test_two_device_scenario() {
    let rt = Arc::new(SimulatedRuntime::new(2).with_journal(true));
    let ctx = context(&rt);

    assert_eq!(ctx.device_count(), 2);
    assert_eq!(ctx.current_device().unwrap(), 0);

    ctx.set_device(1).unwrap();
    assert_eq!(ctx.current_device().unwrap(), 1);

    let err = ctx.set_device(5).unwrap_err();
    assert!(err.is_runtime(), "expected runtime error, got {:?}", err);

    ctx.set_sync_warning_level(SyncWarningLevel::Error);
    let stream = Stream::from_raw(0x1 as *mut c_void);
    let err = ctx.stream_synchronize(stream).unwrap_err();
    assert_eq!(err, Error::SyncEscalated { call: "stream_synchronize" });
    assert_eq!(rt.stream_syncs(), 0);
    assert!(!rt.calls().contains(&SimCall::StreamSynchronize(stream)));
}

#[test]
fn test_device_count_queried_once_under_contention() {
    let rt = Arc::new(SimulatedRuntime::new(3));
    let ctx = context(&rt);

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..100 {
                    assert_eq!(ctx.device_count(), 3);
                }
            });
        }
    });

    assert_eq!(rt.enumerations(), 1);
}

#[test]
fn test_broken_driver_degrades_to_zero() {
    let rt = Arc::new(SimulatedRuntime::new(2));
    rt.fail_device_count(Some(Status(35)));
    let ctx = context(&rt);

    assert_eq!(ctx.device_count(), 0);
    assert_eq!(ctx.device_count(), 0);
    assert_eq!(ctx.device_count_ensure_non_zero(), Err(Error::NoDevices));
    assert_eq!(rt.enumerations(), 1);
}

#[test]
fn test_ensure_non_zero_returns_count_unchanged() {
    let rt = Arc::new(SimulatedRuntime::new(7));
    assert_eq!(context(&rt).device_count_ensure_non_zero(), Ok(7));
}

// ============================================================================
// Sync debug mode
// ============================================================================

#[test]
fn test_levels_across_contexts_sharing_state() {
    let state = Arc::new(WarningState::new());
    let a = GpuContext::with_warning_state(SimulatedRuntime::new(1), Arc::clone(&state));
    let b = GpuContext::with_warning_state(SimulatedRuntime::new(1), Arc::clone(&state));

    a.set_sync_warning_level(SyncWarningLevel::Warn);
    assert_eq!(b.sync_warning_level(), SyncWarningLevel::Warn);

    b.stream_synchronize(Stream::DEFAULT).unwrap();
    assert_eq!(state.escalation_count(), 1);

    a.set_sync_warning_level(SyncWarningLevel::Disabled);
    b.stream_synchronize(Stream::DEFAULT).unwrap();
    assert_eq!(state.escalation_count(), 1);
}

#[test]
fn test_warn_level_copy_completes() {
    let rt = Arc::new(SimulatedRuntime::new(1).with_memcpy_with_stream(true));
    let ctx = context(&rt);
    ctx.set_sync_warning_level(SyncWarningLevel::Warn);

    let src: Vec<u8> = (0..64).collect();
    let mut dst = vec![0u8; 64];
    unsafe {
        ctx.copy_and_sync(
            dst.as_mut_ptr() as *mut c_void,
            src.as_ptr() as *const c_void,
            src.len(),
            MemcpyKind::Default,
            Stream::DEFAULT,
        )
    }
    .unwrap();

    assert_eq!(dst, src);
    assert_eq!(rt.copies(), 1);
    assert_eq!(ctx.warning_state().escalation_count(), 1);
}

#[test]
fn test_device_synchronize_ignores_error_level() {
    let rt = Arc::new(SimulatedRuntime::new(1));
    let ctx = context(&rt);
    ctx.set_sync_warning_level(SyncWarningLevel::Error);
    ctx.device_synchronize().unwrap();
    assert_eq!(rt.device_syncs(), 1);
}

// ============================================================================
// Error translation
// ============================================================================

#[test]
fn test_runtime_errors_name_the_call() {
    let rt = Arc::new(SimulatedRuntime::new(2));
    let ctx = context(&rt);

    match ctx.set_device(-3).unwrap_err() {
        Error::Runtime { code, call, description } => {
            assert_eq!(code, Status(101));
            assert_eq!(call, "set_device");
            assert_eq!(description, "invalid device ordinal");
        }
        other => panic!("expected Runtime error, got {:?}", other),
    }

    rt.fail_stream_synchronize(Some(Status(12345)));
    let err = ctx.stream_synchronize(Stream::DEFAULT).unwrap_err();
    assert_eq!(
        err.to_string(),
        "stream_synchronize failed with status 12345: unrecognized status code 12345"
    );
}
