#![no_std]

//! # Device Node Map
//!
//! This crate maintains a device node tree (typically `/dev`) from the
//! stream of device insertion and removal records a kernel publishes on its
//! device control channel.
//! It is designed for `no_std` environments and uses the `alloc` crate for dynamic memory allocation;
//! the host filesystem backend is available with the `std` feature.
//!
//! ## Architecture
//!
//! The crate is organized into multiple layers:
//!
//! ### Naming
//! - [`DeviceNodeMatch`]: A naming rule mapping a (kind, major) pair to a path pattern
//! - [`NamingRules`]: Ordered rule table, first match wins
//! - [`numeric_suffix`] / [`letter_suffix`]: Suffix encoders for `%d` and `%c` patterns
//!
//! ### Bookkeeping
//! - [`AllocationMap`]: Fixed-capacity suffix bitmap with reserve/commit/rollback
//! - [`DeviceNodeFamily`]: All nodes sharing one naming rule
//! - [`FamilyRegistry`]: Families created on demand, looked up by (kind, major)
//!
//! ### Event Loop
//! - [`DeviceEvent`] / [`read_event`]: One 16-byte record from the control channel
//! - [`DeviceEventLoop`]: Registers, unregisters and creates pluggable-once nodes
//! - [`DeviceNodeOps`] / [`DeviceEventSource`]: The filesystem and channel seams
//! - `HostNodeOps` / `IoEventSource`: Host implementations (feature `std`, unix only)
//!
//! ## Node Layout
//!
//! | Path                                         | Content                        |
//! |----------------------------------------------|--------------------------------|
//! | `<device root>/<rendered pattern>`           | The device special file        |
//! | `<lookup root>/<block\|char>/<major>/<minor>` | Symlink to the device node     |
//!
//! ## Examples
//!
//! ```rust,ignore
//! use axdevmap::{DevMapConfig, DeviceEventLoop, HostNodeOps, IoEventSource};
//!
//! let config = DevMapConfig::default();
//! let mut devmap = DeviceEventLoop::new(config, HostNodeOps::new())?;
//!
//! let channel = std::fs::File::open("/dev/devctl")?;
//! let mut source = IoEventSource::new(channel);
//!
//! // Returns only when the control channel breaks.
//! let err = devmap.run(&mut source).unwrap_err();
//! log::error!("device control channel failed: {:?}", err);
//! ```

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;
#[macro_use]
extern crate log;

mod allocation;
mod config;
mod device;
mod event;
mod event_loop;
mod family;
mod naming;
mod ops;
mod pluggable;
mod registry;
mod suffix;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "std", unix))] {
        mod host;
        pub use host::{HostNodeOps, IoEventSource, UmaskGuard, io_error_to_ax};
    }
}

pub use allocation::{AllocationMap, DEFAULT_SUFFIX_CAPACITY, SuffixReservation};
pub use config::{
    DEFAULT_CONTROL_IDENTITY, DEFAULT_DEVICE_ROOT, DEFAULT_LOOKUP_ROOT, DEFAULT_NODE_OWNER_UID,
    DevMapConfig,
};
pub use device::{
    DeviceIdentity, DeviceNodeType, MajorNumber, MinorNumber, join_path, lookup_link_path,
};
pub use event::{DEVICE_EVENT_SIZE, DeviceEvent, DeviceEventState, read_event};
pub use event_loop::{DeviceEventLoop, EventLoopStats, EventOutcome};
pub use family::{DeviceNodeFamily, RegisteredDeviceNode};
pub use naming::{
    DEFAULT_NAMING_RULES, DIGIT_PLACEHOLDER, DeviceNodeMatch, LETTER_PLACEHOLDER, NamingRules,
    SuffixStyle,
};
pub use ops::{DeviceEventSource, DeviceNodeOps};
pub use pluggable::{
    DEFAULT_PLUGGABLE_ONCE, PluggableOnceCharacterDeviceNodeMatch, find_pluggable_once,
};
pub use registry::FamilyRegistry;
pub use suffix::{SUFFIX_MAX_LEN, Suffix, letter_suffix, numeric_suffix};
