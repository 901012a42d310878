use anyhow::{bail, Context, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Advisory exclusive lock on a file, released on drop.
pub(crate) struct FileLock {
    file: File,
    path: PathBuf,
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLock").field("path", &self.path).finish()
    }
}

impl FileLock {
    /// Try to take the lock `attempts` times, sleeping `sleep` between
    /// tries. Never blocks indefinitely.
    pub(crate) fn acquire(path: &Path, attempts: u32, sleep: Duration) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        for attempt in 1..=attempts {
            if try_lock_exclusive(&file)? {
                return Ok(Self { file, path: path.to_path_buf() });
            }
            debug!("Lock {} busy (attempt {}/{})", path.display(), attempt, attempts);
            if attempt < attempts {
                thread::sleep(sleep);
            }
        }
        bail!("Failed to acquire lock {} after {} attempts", path.display(), attempts)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

/// Non-blocking `flock(LOCK_EX)`. `Ok(false)` when another holder has it.
#[cfg(unix)]
#[allow(unsafe_code)]
fn try_lock_exclusive(file: &File) -> Result<bool> {
    use std::os::unix::io::AsRawFd;

    let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if ret == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    bail!("flock failed: {}", err)
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

/// Fallback for non-unix platforms: the cache is used without locking.
#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> Result<bool> {
    tracing::warn!("File locking is not supported on this platform");
    Ok(true)
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}
