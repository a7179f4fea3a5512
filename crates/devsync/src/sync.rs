//! Monitored synchronizing operations.
//!
//! Both calls check the sync debug mode before touching the runtime. With the mode
//! disabled that check is one relaxed atomic load and a branch.

use std::ffi::c_void;

use crate::context::GpuContext;
use crate::error::Result;
use crate::runtime::{GpuRuntime, MemcpyKind, Stream};
use crate::status::check_status;

impl<R: GpuRuntime> GpuContext<R> {
    #[inline(always)]
    fn check_sync_policy(&self, call: &'static str) -> Result<()> {
        if self.warning.is_enabled() {
            self.warning.warn_or_error_on_sync(call)?;
        }
        Ok(())
    }

    /// Copy `nbytes` from `src` to `dst` on `stream`, then wait for the stream to drain.
    ///
    /// Uses the runtime's combined copy-and-wait when it has one, otherwise an async copy
    /// followed by a stream sync. Under sync debug mode `error` nothing is copied.
    ///
    /// # Safety
    ///
    /// `dst` and `src` must be valid for `nbytes` bytes in the memory spaces `kind`
    /// describes, and must not be freed before this call returns.
    #[inline]
    pub unsafe fn copy_and_sync(
        &self,
        dst: *mut c_void,
        src: *const c_void,
        nbytes: usize,
        kind: MemcpyKind,
        stream: Stream,
    ) -> Result<()> {
        self.check_sync_policy("copy_and_sync")?;

        if let Some(status) = self.runtime.memcpy_with_stream(dst, src, nbytes, kind, stream) {
            return check_status(&self.runtime, status, "memcpy_with_stream");
        }

        check_status(
            &self.runtime,
            self.runtime.memcpy_async(dst, src, nbytes, kind, stream),
            "memcpy_async",
        )?;
        check_status(
            &self.runtime,
            self.runtime.stream_synchronize(stream),
            "stream_synchronize",
        )
    }

    /// Block until everything enqueued on `stream` so far has finished.
    #[inline]
    pub fn stream_synchronize(&self, stream: Stream) -> Result<()> {
        self.check_sync_policy("stream_synchronize")?;
        check_status(
            &self.runtime,
            self.runtime.stream_synchronize(stream),
            "stream_synchronize",
        )
    }
}
