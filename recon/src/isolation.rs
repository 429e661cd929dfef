//! Suppressed standard streams for the duration of a scan
//!
//! Some engines read stdin or print to stdout as a side effect. While a
//! [`SuppressedIo`] guard is alive, fds 0 and 1 point at /dev/null; dropping
//! the guard puts the original descriptors back, on every exit path
//! including unwinding. Only one guard exists at a time process-wide.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::sync::OnceLock;

use tokio::sync::{Mutex, MutexGuard};
use tracing::error;

const STDIN_FD: RawFd = 0;
const STDOUT_FD: RawFd = 1;

fn redirect_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Keeps fds 0 and 1 on /dev/null until dropped
pub struct SuppressedIo {
    saved_stdin: OwnedFd,
    saved_stdout: OwnedFd,
    _lock: MutexGuard<'static, ()>,
}

impl SuppressedIo {
    /// Wait for any other suppression to end, then redirect both streams
    pub async fn acquire() -> io::Result<Self> {
        let lock = redirect_lock().lock().await;

        let saved_stdin = io::stdin().as_fd().try_clone_to_owned()?;
        let saved_stdout = io::stdout().as_fd().try_clone_to_owned()?;
        let null_in = File::open("/dev/null")?;
        let null_out = OpenOptions::new().write(true).open("/dev/null")?;

        // Flush anything already buffered for the real stdout
        let _ = io::Write::flush(&mut io::stdout());

        redirect(null_in.as_raw_fd(), STDIN_FD)?;
        if let Err(e) = redirect(null_out.as_raw_fd(), STDOUT_FD) {
            let _ = redirect(saved_stdin.as_raw_fd(), STDIN_FD);
            return Err(e);
        }

        Ok(Self {
            saved_stdin,
            saved_stdout,
            _lock: lock,
        })
    }
}

impl Drop for SuppressedIo {
    fn drop(&mut self) {
        let _ = io::Write::flush(&mut io::stdout());
        if let Err(e) = redirect(self.saved_stdout.as_raw_fd(), STDOUT_FD) {
            error!("failed to restore stdout: {e}");
        }
        if let Err(e) = redirect(self.saved_stdin.as_raw_fd(), STDIN_FD) {
            error!("failed to restore stdin: {e}");
        }
    }
}

fn redirect(from: RawFd, to: RawFd) -> io::Result<()> {
    // SAFETY: both descriptors are open for the duration of the call; dup2
    // atomically replaces `to` and leaves `from` untouched.
    let rc = unsafe { libc::dup2(from, to) };
    if rc == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for tests that inspect the real fds 0 and 1

    use super::*;
    use std::os::unix::fs::MetadataExt;

    pub const STDIN: RawFd = STDIN_FD;
    pub const STDOUT: RawFd = STDOUT_FD;

    /// (device, inode) of whatever a descriptor currently points at
    pub fn identity(fd: RawFd) -> (u64, u64) {
        // SAFETY: fd 0/1 stay open for the whole test process
        let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) };
        let file = File::from(borrowed.try_clone_to_owned().unwrap());
        let meta = file.metadata().unwrap();
        (meta.dev(), meta.ino())
    }

    pub fn dev_null() -> (u64, u64) {
        let meta = std::fs::metadata("/dev/null").unwrap();
        (meta.dev(), meta.ino())
    }

    /// Held by every test that checks fd identities, so their checks never
    /// observe another test's redirection
    pub async fn fd_test_lock() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(())).lock().await
    }
}
