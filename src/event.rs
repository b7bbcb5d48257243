//! Fixed-size device event records read from the control channel.
//!
//! Layout: four native-endian `u32` fields.
//!
//! | offset | field             |
//! |--------|-------------------|
//! | 0      | major number      |
//! | 4      | minor number      |
//! | 8      | is block device   |
//! | 12     | state             |

use axerrno::{AxResult, ax_err, ax_err_type};

use crate::device::{DeviceIdentity, DeviceNodeType, MajorNumber, MinorNumber};
use crate::ops::DeviceEventSource;

/// Size of one record on the wire.
pub const DEVICE_EVENT_SIZE: usize = 16;

/// What happened to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DeviceEventState {
    /// The device appeared.
    Inserted = 1,
    /// The device went away.
    Removed = 2,
}

impl DeviceEventState {
    /// Decodes a raw state, `None` for values this loop does not handle.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Inserted),
            2 => Some(Self::Removed),
            _ => None,
        }
    }
}

/// One record as read from the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEvent {
    /// Major number.
    pub major_number: u32,
    /// Minor number.
    pub minor_number: u32,
    /// 1 for block devices, 0 for character devices.
    pub is_block_device: u32,
    /// Raw state, see [`DeviceEventState`].
    pub state: u32,
}

impl DeviceEvent {
    /// Builds a record from typed parts.
    pub const fn new(identity: DeviceIdentity, state: DeviceEventState) -> Self {
        Self {
            major_number: identity.major.0,
            minor_number: identity.minor.0,
            is_block_device: match identity.kind {
                DeviceNodeType::Block => 1,
                DeviceNodeType::Character => 0,
            },
            state: state as u32,
        }
    }

    /// Decodes a record.
    pub fn from_bytes(bytes: &[u8; DEVICE_EVENT_SIZE]) -> Self {
        let field = |at: usize| u32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Self {
            major_number: field(0),
            minor_number: field(4),
            is_block_device: field(8),
            state: field(12),
        }
    }

    /// Encodes the record.
    pub fn to_bytes(&self) -> [u8; DEVICE_EVENT_SIZE] {
        let mut bytes = [0u8; DEVICE_EVENT_SIZE];
        bytes[0..4].copy_from_slice(&self.major_number.to_ne_bytes());
        bytes[4..8].copy_from_slice(&self.minor_number.to_ne_bytes());
        bytes[8..12].copy_from_slice(&self.is_block_device.to_ne_bytes());
        bytes[12..16].copy_from_slice(&self.state.to_ne_bytes());
        bytes
    }

    /// Decoded state, `None` if unrecognized.
    #[inline]
    pub fn state(&self) -> Option<DeviceEventState> {
        DeviceEventState::from_raw(self.state)
    }

    /// Node type of the device.
    ///
    /// # Errors
    ///
    /// `InvalidData` if the block flag is neither 0 nor 1.
    pub fn node_type(&self) -> AxResult<DeviceNodeType> {
        match self.is_block_device {
            0 => Ok(DeviceNodeType::Character),
            1 => Ok(DeviceNodeType::Block),
            _ => ax_err!(InvalidData, "device event block flag is not 0/1"),
        }
    }

    /// Full identity of the device.
    pub fn identity(&self) -> AxResult<DeviceIdentity> {
        Ok(DeviceIdentity {
            kind: self.node_type()?,
            major: MajorNumber(self.major_number),
            minor: MinorNumber(self.minor_number),
        })
    }
}

/// Reads exactly one record from `source`.
///
/// # Errors
///
/// `UnexpectedEof` if the read returns fewer bytes than a record, which
/// means record boundaries can no longer be trusted.
pub fn read_event<S: DeviceEventSource + ?Sized>(source: &mut S) -> AxResult<DeviceEvent> {
    let mut buf = [0u8; DEVICE_EVENT_SIZE];
    let count = source.read(&mut buf)?;
    if count != DEVICE_EVENT_SIZE {
        error!(
            "control channel returned {} of {} bytes, framing is broken",
            count, DEVICE_EVENT_SIZE
        );
        return Err(ax_err_type!(
            UnexpectedEof,
            "incomplete device event record"
        ));
    }
    let event = DeviceEvent::from_bytes(&buf);
    trace!("device event {:?}", event);
    Ok(event)
}
