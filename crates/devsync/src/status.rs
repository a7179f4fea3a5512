//! Status-code checking: the single gate every runtime call result passes through.

use crate::error::{Error, Result};
use crate::runtime::{GpuRuntime, Status};

/// Turn a runtime status into `Ok(())` or an [`Error::Runtime`].
///
/// `call` names the runtime entry point for the error message. The description comes from
/// the runtime; an empty one is replaced so the error always explains itself.
#[inline]
pub fn check_status<R: GpuRuntime + ?Sized>(
    runtime: &R,
    status: Status,
    call: &'static str,
) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(runtime_error(runtime, status, call))
    }
}

#[cold]
#[inline(never)]
fn runtime_error<R: GpuRuntime + ?Sized>(runtime: &R, status: Status, call: &'static str) -> Error {
    let mut description = runtime.error_string(status);
    if description.trim().is_empty() {
        description = format!("unrecognized status code {}", status);
    }
    Error::Runtime {
        code: status,
        call,
        description,
    }
}
