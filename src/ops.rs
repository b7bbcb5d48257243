//! Traits connecting the event loop to its environment.
//!
//! The loop never touches the filesystem or the control channel directly:
//! - [`DeviceNodeOps`] performs node creation, ownership, symlinks and unlinks.
//! - [`DeviceEventSource`] yields raw event records.
//!
//! The host implementations live in `host` (feature `std`); tests
//! substitute recording mocks.

use axerrno::AxResult;

use crate::device::{DeviceNodeType, MajorNumber, MinorNumber};

/// Filesystem mutations needed to publish device nodes.
///
/// Every call completes or fails before the loop proceeds; no call is
/// retried.
pub trait DeviceNodeOps {
    /// Creates a block or character special file at `path`.
    ///
    /// The node must end up with exactly `mode`, independent of any
    /// process-wide creation mask.
    fn create_node(
        &mut self,
        kind: DeviceNodeType,
        path: &str,
        mode: u32,
        major: MajorNumber,
        minor: MinorNumber,
    ) -> AxResult;

    /// Resolves a group name to its id, `None` if no such group exists.
    fn resolve_group(&mut self, name: &str) -> AxResult<Option<u32>>;

    /// Sets the owner and group of `path`.
    fn chown(&mut self, path: &str, uid: u32, gid: u32) -> AxResult;

    /// Creates a symlink at `link` pointing to `target`.
    fn symlink(&mut self, target: &str, link: &str) -> AxResult;

    /// Removes the file or symlink at `path`.
    fn unlink(&mut self, path: &str) -> AxResult;
}

/// The control channel.
pub trait DeviceEventSource {
    /// Reads once into `buf`, returning the number of bytes read.
    ///
    /// `Ok(0)` means the channel is closed.
    fn read(&mut self, buf: &mut [u8]) -> AxResult<usize>;
}

impl<T: DeviceNodeOps + ?Sized> DeviceNodeOps for &mut T {
    fn create_node(
        &mut self,
        kind: DeviceNodeType,
        path: &str,
        mode: u32,
        major: MajorNumber,
        minor: MinorNumber,
    ) -> AxResult {
        (**self).create_node(kind, path, mode, major, minor)
    }

    fn resolve_group(&mut self, name: &str) -> AxResult<Option<u32>> {
        (**self).resolve_group(name)
    }

    fn chown(&mut self, path: &str, uid: u32, gid: u32) -> AxResult {
        (**self).chown(path, uid, gid)
    }

    fn symlink(&mut self, target: &str, link: &str) -> AxResult {
        (**self).symlink(target, link)
    }

    fn unlink(&mut self, path: &str) -> AxResult {
        (**self).unlink(path)
    }
}

/// Reads records from an in-memory buffer, one `read` per call.
impl DeviceEventSource for &[u8] {
    fn read(&mut self, buf: &mut [u8]) -> AxResult<usize> {
        let count = buf.len().min(self.len());
        let (head, tail) = self.split_at(count);
        buf[..count].copy_from_slice(head);
        *self = tail;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_source() {
        let data = [1u8, 2, 3, 4, 5];
        let mut source: &[u8] = &data;
        let mut buf = [0u8; 4];

        assert_eq!(source.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(source.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5);
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }
}
