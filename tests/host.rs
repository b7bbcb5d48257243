#![cfg(all(feature = "std", unix))]

use axdevmap::{
    DeviceEvent, DeviceEventSource, DeviceEventState, DeviceIdentity, DeviceNodeOps, HostNodeOps,
    IoEventSource, read_event,
};
use axerrno::AxError;
use std::io::{self, Cursor, Read};

#[test]
fn test_symlink_creates_parents_and_unlinks() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("hda");
    std::fs::write(&target, b"").unwrap();
    let link = dir.path().join("nodes/block/3/0");

    let mut ops = HostNodeOps::new();
    ops.symlink(target.to_str().unwrap(), link.to_str().unwrap())
        .unwrap();
    assert_eq!(std::fs::read_link(&link).unwrap(), target);

    ops.unlink(link.to_str().unwrap()).unwrap();
    assert!(std::fs::symlink_metadata(&link).is_err());
    assert!(target.exists());
}

#[test]
fn test_unlink_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing");

    let mut ops = HostNodeOps::new();
    assert_eq!(
        ops.unlink(path.to_str().unwrap()).unwrap_err(),
        AxError::NotFound
    );
}

#[test]
fn test_resolve_groups() {
    let mut ops = HostNodeOps::new();
    assert_eq!(ops.resolve_group("root").unwrap(), Some(0));
    assert_eq!(ops.resolve_group("no-such-group-axdevmap").unwrap(), None);
}

/// Reader that fails with `EINTR` once before every chunk.
struct Interrupting {
    inner: Cursor<Vec<u8>>,
    interrupt: bool,
}

impl Read for Interrupting {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.interrupt = !self.interrupt;
        if self.interrupt {
            return Err(io::ErrorKind::Interrupted.into());
        }
        self.inner.read(buf)
    }
}

#[test]
fn test_io_source_retries_interrupts() {
    let event = DeviceEvent::new(
        DeviceIdentity::character(28, 4),
        DeviceEventState::Removed,
    );
    let mut source = IoEventSource::new(Interrupting {
        inner: Cursor::new(event.to_bytes().to_vec()),
        interrupt: false,
    });

    let decoded = read_event(&mut source).unwrap();
    assert_eq!(decoded, event);

    let mut buf = [0u8; 16];
    assert_eq!(source.read(&mut buf).unwrap(), 0);
}
