//! `GpuContext`: a runtime plus the state the wrappers share.
//!
//! Most code uses the process-wide default context through the crate-level free functions.
//! Tests and embedders that want isolation build their own with [`GpuContext::new`] or
//! [`GpuContext::with_warning_state`].

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::config::{Config, SYNC_DEBUG_ENV};
use crate::runtime::{self, GpuRuntime};
use crate::warning::{self, SyncWarningLevel, WarningState};

/// Index of a GPU device. Valid resolved indices are `0..device_count()`.
pub type DeviceIndex = i8;

/// A GPU runtime with its memoized device count and sync warning state.
pub struct GpuContext<R = Box<dyn GpuRuntime>> {
    pub(crate) runtime: R,
    pub(crate) device_count: OnceLock<DeviceIndex>,
    pub(crate) warning: Arc<WarningState>,
}

impl<R: GpuRuntime> GpuContext<R> {
    /// Context sharing the process-wide [`warning::warning_state`].
    pub fn new(runtime: R) -> Self {
        Self::with_warning_state(runtime, Arc::clone(warning::warning_state()))
    }

    /// Context with its own warning state.
    pub fn with_warning_state(runtime: R, warning: Arc<WarningState>) -> Self {
        Self {
            runtime,
            device_count: OnceLock::new(),
            warning,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn backend_name(&self) -> &'static str {
        self.runtime.name()
    }

    pub fn warning_state(&self) -> &Arc<WarningState> {
        &self.warning
    }

    pub fn sync_warning_level(&self) -> SyncWarningLevel {
        self.warning.sync_warning_level()
    }

    pub fn set_sync_warning_level(&self, level: SyncWarningLevel) {
        self.warning.set_sync_warning_level(level);
    }
}

impl<R: GpuRuntime> fmt::Debug for GpuContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuContext")
            .field("backend", &self.runtime.name())
            .field("device_count", &self.device_count.get())
            .field("sync_warning_level", &self.warning.sync_warning_level())
            .finish()
    }
}

static DEFAULT_CONTEXT: OnceLock<GpuContext> = OnceLock::new();

/// The process-wide context, resolved on first use.
///
/// Unless [`install_runtime`] ran first, the runtime is chosen from [`Config::from_env`].
/// A sync debug mode set through the environment is applied to the process-wide warning
/// state at that point.
pub fn default_context() -> &'static GpuContext {
    DEFAULT_CONTEXT.get_or_init(|| {
        let config = Config::from_env();
        let ctx = GpuContext::new(runtime::load(config.backend));
        apply_env_sync_level(&ctx, config);
        tracing::debug!(
            backend = ctx.backend_name(),
            requested = %config.backend,
            "resolved default GPU context"
        );
        ctx
    })
}

/// Use `runtime` for the process-wide context.
///
/// Must run before anything touches the default context; otherwise the runtime is handed
/// back unchanged and no shared state is modified.
pub fn install_runtime(
    runtime: Box<dyn GpuRuntime>,
) -> std::result::Result<(), Box<dyn GpuRuntime>> {
    DEFAULT_CONTEXT
        .set(GpuContext::new(runtime))
        .map_err(|ctx| ctx.runtime)?;
    if let Some(ctx) = DEFAULT_CONTEXT.get() {
        apply_env_sync_level(ctx, Config::from_env());
    }
    Ok(())
}

/// Apply the environment's sync debug mode to a freshly resolved default context.
fn apply_env_sync_level(ctx: &GpuContext, config: Config) {
    // An unset variable must not clobber a level the host already chose.
    if std::env::var_os(SYNC_DEBUG_ENV).is_some() {
        ctx.set_sync_warning_level(config.sync_debug_mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SimulatedRuntime;

    #[test]
    fn test_context_owns_isolated_warning_state() {
        let state = Arc::new(WarningState::new());
        let ctx = GpuContext::with_warning_state(SimulatedRuntime::new(1), Arc::clone(&state));
        ctx.set_sync_warning_level(SyncWarningLevel::Warn);
        assert_eq!(state.sync_warning_level(), SyncWarningLevel::Warn);
        assert_eq!(ctx.backend_name(), "simulated");
    }

    #[test]
    fn test_new_shares_global_warning_state() {
        let ctx = GpuContext::new(SimulatedRuntime::new(1));
        assert!(Arc::ptr_eq(ctx.warning_state(), warning::warning_state()));
    }

    #[test]
    fn test_debug_does_not_query_runtime() {
        let rt = Arc::new(SimulatedRuntime::new(3));
        let ctx = GpuContext::with_warning_state(Arc::clone(&rt), Arc::new(WarningState::new()));
        let text = format!("{:?}", ctx);
        assert!(text.contains("simulated"));
        assert_eq!(rt.enumerations(), 0);
    }
}
