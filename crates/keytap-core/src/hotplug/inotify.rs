// Keytap Hotplug Layer - inotify Watch
// Non-blocking IN_CREATE watch on the input device directory

use super::{HotplugError, WatchSource};
use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;

/// inotify instance watching one directory for creations only
#[derive(Debug)]
pub struct InotifyWatch {
    fd: OwnedFd,
}

impl InotifyWatch {
    /// Start watching `dir` for newly created entries.
    pub fn new(dir: &Path) -> Result<Self, HotplugError> {
        let setup_error = |source| HotplugError::Setup {
            dir: dir.to_path_buf(),
            source,
        };

        // SAFETY: takes only flags; a negative result is handled below
        let raw = unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) };
        if raw < 0 {
            return Err(setup_error(io::Error::last_os_error()));
        }
        // SAFETY: inotify_init1 returned a fresh descriptor we now own
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let c_dir = CString::new(dir.as_os_str().as_bytes())
            .map_err(|e| setup_error(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        // SAFETY: fd is a live inotify descriptor and c_dir a NUL-terminated path
        let watch = unsafe { libc::inotify_add_watch(fd.as_raw_fd(), c_dir.as_ptr(), libc::IN_CREATE) };
        if watch < 0 {
            return Err(setup_error(io::Error::last_os_error()));
        }

        log::debug!("Watching {} for new devices", dir.display());
        Ok(Self { fd })
    }
}

impl WatchSource for InotifyWatch {
    fn read_batch(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: buf is valid for writes of buf.len() bytes for the whole call
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }
}

impl AsRawFd for InotifyWatch {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
