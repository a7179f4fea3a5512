//! How `install_runtime` interacts with a sync debug mode set through the environment.
//!
//! Mutates the environment and the process-wide context, so it has its own binary and a
//! single test.

use devsync::config::SYNC_DEBUG_ENV;
use devsync::{SimulatedRuntime, SyncWarningLevel};

#[test]
fn test_rejected_install_keeps_host_sync_level() {
    std::env::set_var(SYNC_DEBUG_ENV, "warn");

    assert!(devsync::install_runtime(Box::new(SimulatedRuntime::new(2))).is_ok());
    assert_eq!(devsync::sync_warning_level(), SyncWarningLevel::Warn);

    devsync::set_sync_warning_level(SyncWarningLevel::Error);

    assert!(devsync::install_runtime(Box::new(SimulatedRuntime::new(1))).is_err());
    assert_eq!(devsync::sync_warning_level(), SyncWarningLevel::Error);
    assert_eq!(devsync::device_count(), 2);

    devsync::set_sync_warning_level(SyncWarningLevel::Disabled);
    std::env::remove_var(SYNC_DEBUG_ENV);
}
