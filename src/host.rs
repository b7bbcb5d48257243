//! Host implementations of the environment traits.
//!
//! [`HostNodeOps`] publishes nodes on the real filesystem using `mknod(2)`,
//! `chown(2)` and `symlink(2)`; [`IoEventSource`] adapts any
//! [`std::io::Read`] (typically the opened control device) into a
//! [`DeviceEventSource`].

use std::ffi::CString;
use std::fs;
use std::io::{self, Read};
use std::os::unix::fs as unix_fs;
use std::path::Path;
use std::vec::Vec;

use axerrno::{AxError, AxResult, ax_err};

use crate::device::{DeviceNodeType, MajorNumber, MinorNumber};
use crate::ops::{DeviceEventSource, DeviceNodeOps};

/// Initial buffer size for `getgrnam_r`.
const GROUP_BUFFER_SIZE: usize = 1024;
/// Upper bound the group buffer may grow to on `ERANGE`.
const GROUP_BUFFER_LIMIT: usize = 1 << 20;

/// Maps an I/O error onto the closest [`AxError`].
pub fn io_error_to_ax(err: &io::Error) -> AxError {
    match err.kind() {
        io::ErrorKind::NotFound => AxError::NotFound,
        io::ErrorKind::PermissionDenied => AxError::PermissionDenied,
        io::ErrorKind::AlreadyExists => AxError::AlreadyExists,
        io::ErrorKind::InvalidInput => AxError::InvalidInput,
        io::ErrorKind::UnexpectedEof => AxError::UnexpectedEof,
        _ => AxError::Io,
    }
}

fn map_io(what: &str, path: &str, err: io::Error) -> AxError {
    warn!("{} {}: {}", what, path, err);
    io_error_to_ax(&err)
}

fn c_string(value: &str) -> AxResult<CString> {
    match CString::new(value) {
        Ok(value) => Ok(value),
        Err(_) => ax_err!(InvalidInput, "path or name contains a NUL byte"),
    }
}

/// Clears the process file-creation mask until dropped.
///
/// The previous mask is restored on every exit path.
pub struct UmaskGuard {
    previous: libc::mode_t,
}

impl UmaskGuard {
    /// Sets the mask to zero, remembering the previous value.
    pub fn clear() -> Self {
        // SAFETY: umask only swaps the calling process's mask.
        let previous = unsafe { libc::umask(0) };
        Self { previous }
    }
}

impl Drop for UmaskGuard {
    fn drop(&mut self) {
        // SAFETY: see `clear`.
        unsafe {
            libc::umask(self.previous);
        }
    }
}

/// Publishes device nodes on the host filesystem.
#[derive(Debug, Default)]
pub struct HostNodeOps;

impl HostNodeOps {
    /// Creates the backend.
    pub fn new() -> Self {
        Self
    }
}

impl DeviceNodeOps for HostNodeOps {
    fn create_node(
        &mut self,
        kind: DeviceNodeType,
        path: &str,
        mode: u32,
        major: MajorNumber,
        minor: MinorNumber,
    ) -> AxResult {
        let c_path = c_string(path)?;
        let file_type = match kind {
            DeviceNodeType::Block => libc::S_IFBLK,
            DeviceNodeType::Character => libc::S_IFCHR,
        };
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent).map_err(|e| map_io("create_dir_all", path, e))?;
        }

        let _umask = UmaskGuard::clear();
        // SAFETY: `c_path` is a valid NUL-terminated string for the call.
        let rc = unsafe {
            let dev = libc::makedev(major.value(), minor.value());
            libc::mknod(c_path.as_ptr(), file_type | mode as libc::mode_t, dev)
        };
        if rc != 0 {
            return Err(map_io("mknod", path, io::Error::last_os_error()));
        }
        Ok(())
    }

    fn resolve_group(&mut self, name: &str) -> AxResult<Option<u32>> {
        let c_name = c_string(name)?;
        let mut buffer: Vec<libc::c_char> = alloc::vec![0; GROUP_BUFFER_SIZE];
        loop {
            // SAFETY: all-zero is a valid `group` value to be filled in.
            let mut group: libc::group = unsafe { core::mem::zeroed() };
            let mut result: *mut libc::group = core::ptr::null_mut();
            // SAFETY: every pointer refers to live storage sized as passed.
            let rc = unsafe {
                libc::getgrnam_r(
                    c_name.as_ptr(),
                    &mut group,
                    buffer.as_mut_ptr(),
                    buffer.len(),
                    &mut result,
                )
            };
            match rc {
                0 if result.is_null() => return Ok(None),
                0 => return Ok(Some(group.gr_gid)),
                libc::ERANGE if buffer.len() < GROUP_BUFFER_LIMIT => {
                    let grown = buffer.len() * 2;
                    buffer.resize(grown, 0);
                }
                errno => {
                    return Err(map_io(
                        "getgrnam_r",
                        name,
                        io::Error::from_raw_os_error(errno),
                    ));
                }
            }
        }
    }

    fn chown(&mut self, path: &str, uid: u32, gid: u32) -> AxResult {
        unix_fs::chown(path, Some(uid), Some(gid)).map_err(|e| map_io("chown", path, e))
    }

    fn symlink(&mut self, target: &str, link: &str) -> AxResult {
        if let Some(parent) = Path::new(link).parent() {
            fs::create_dir_all(parent).map_err(|e| map_io("create_dir_all", link, e))?;
        }
        unix_fs::symlink(target, link).map_err(|e| map_io("symlink", link, e))
    }

    fn unlink(&mut self, path: &str) -> AxResult {
        fs::remove_file(path).map_err(|e| map_io("unlink", path, e))
    }
}

/// Adapts a byte stream into a [`DeviceEventSource`].
#[derive(Debug)]
pub struct IoEventSource<R> {
    inner: R,
}

impl<R: Read> IoEventSource<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Unwraps the stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> DeviceEventSource for IoEventSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> AxResult<usize> {
        loop {
            match self.inner.read(buf) {
                Ok(count) => return Ok(count),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io("read", "control channel", e)),
            }
        }
    }
}
