//! Page-cache invalidation for the status file
//!
//! The device rewrites its status file underneath the host's file cache. The
//! kernel assumes files only change through its own write path, so without
//! help it keeps serving the first buffered copy forever. Before each read
//! the status channel asks the kernel to drop the cached pages for the file.
//!
//! Whether that is possible depends on the platform. [`select_invalidator`]
//! picks the strategy once at startup; callers never branch per read.

use std::fs::File;
use std::io;

/// Strategy for discarding cached pages of an open file
pub trait CacheInvalidator: Send + Sync + std::fmt::Debug {
    /// Drop cached pages for `file` so the next read goes to the medium
    fn invalidate(&self, file: &File) -> io::Result<()>;

    /// Whether [`invalidate`](Self::invalidate) actually does anything
    fn is_supported(&self) -> bool;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// `posix_fadvise(POSIX_FADV_DONTNEED)` over the whole file
#[cfg(any(target_os = "linux", target_os = "android"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct FadviseInvalidator;

#[cfg(any(target_os = "linux", target_os = "android"))]
impl CacheInvalidator for FadviseInvalidator {
    fn invalidate(&self, file: &File) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        // offset 0, len 0: the whole file
        let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_DONTNEED) };
        if rc != 0 {
            // posix_fadvise returns the error number rather than setting errno
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(())
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "posix_fadvise"
    }
}

/// Degraded fallback: reads may return the same stale content every time
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInvalidator;

impl CacheInvalidator for NoopInvalidator {
    fn invalidate(&self, _file: &File) -> io::Result<()> {
        Ok(())
    }

    fn is_supported(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Pick the invalidation strategy for the running platform
pub fn select_invalidator() -> Box<dyn CacheInvalidator> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        Box::new(FadviseInvalidator)
    }
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        tracing::warn!(
            "No page-cache invalidation on this platform; status reads may repeat the last known value"
        );
        Box::new(NoopInvalidator)
    }
}
