//! Memory hardening for key material
//!
//! Two measures:
//!
//! 1. **Core dump prevention**: [`disable_core_dumps`] sets `RLIMIT_CORE` to zero
//!    so a crash never writes seed material to disk.
//!
//! 2. **Locked, self-wiping buffers**: [`SecretBuffer`] `mlock`s its backing
//!    allocation and zeroes it on drop, on every exit path.
//!
//! Both are best-effort. Containers and unprivileged users often cannot lock
//! memory; failures are logged and the buffer still zeroes itself.

use std::sync::atomic::{AtomicBool, Ordering};
use zeroize::Zeroize;

static CORE_DUMPS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Disable core dumps for the current process.
///
/// Returns `true` once core dumps are off (including on repeated calls).
pub fn disable_core_dumps() -> bool {
    if CORE_DUMPS_DISABLED.swap(true, Ordering::SeqCst) {
        return true;
    }

    #[cfg(unix)]
    {
        let disabled = unix::set_core_limit_zero();
        if !disabled {
            CORE_DUMPS_DISABLED.store(false, Ordering::SeqCst);
        }
        disabled
    }

    #[cfg(not(unix))]
    {
        log::warn!("core dump prevention is not supported on this platform");
        CORE_DUMPS_DISABLED.store(false, Ordering::SeqCst);
        false
    }
}

/// Fixed-size heap buffer for secrets.
///
/// The allocation never grows, so the locked pages stay the only copy.
pub struct SecretBuffer {
    data: Box<[u8]>,
    locked: bool,
}

impl SecretBuffer {
    /// Allocate a zero-filled buffer of `len` bytes and try to lock it.
    pub fn zeroed(len: usize) -> Self {
        let data = vec![0u8; len].into_boxed_slice();
        let locked = lock_region(&data);
        Self { data, locked }
    }

    /// Copy `bytes` into a fresh locked buffer.
    ///
    /// The caller still owns `bytes` and must wipe it.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = Self::zeroed(bytes.len());
        buf.data.copy_from_slice(bytes);
        buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `mlock` succeeded for this buffer.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        self.data.zeroize();
        if self.locked {
            unlock_region(&self.data);
        }
    }
}

impl std::fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBuffer")
            .field("len", &self.data.len())
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}

fn lock_region(data: &[u8]) -> bool {
    if data.is_empty() {
        return true;
    }

    #[cfg(unix)]
    {
        let locked = unix::mlock(data);
        if !locked {
            log::warn!(
                "failed to mlock {} bytes of key material, it may be swapped to disk",
                data.len()
            );
        }
        locked
    }

    #[cfg(not(unix))]
    {
        log::warn!("mlock is not supported on this platform");
        false
    }
}

fn unlock_region(data: &[u8]) {
    if data.is_empty() {
        return;
    }

    #[cfg(unix)]
    unix::munlock(data);
}

#[cfg(unix)]
mod unix {
    pub fn set_core_limit_zero() -> bool {
        let rlim = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: plain POSIX call on a stack-allocated rlimit.
        let result = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &rlim) };
        if result != 0 {
            log::warn!(
                "failed to disable core dumps: {}",
                std::io::Error::last_os_error()
            );
            return false;
        }
        true
    }

    pub fn mlock(data: &[u8]) -> bool {
        // SAFETY: the slice is a live allocation of exactly `data.len()` bytes.
        unsafe { libc::mlock(data.as_ptr() as *const libc::c_void, data.len()) == 0 }
    }

    pub fn munlock(data: &[u8]) {
        // SAFETY: same region that was passed to `mlock`.
        unsafe {
            libc::munlock(data.as_ptr() as *const libc::c_void, data.len());
        }
    }
}
