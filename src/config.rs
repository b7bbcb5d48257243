//! Configuration of the device event loop.
//!
//! [`DevMapConfig::default`] reproduces the stock layout: nodes under `/dev/`,
//! lookup links under `/tmp/system/devicemap/nodes/`, 1024 suffixes per
//! family and the built-in naming and pluggable-once tables. Tests and
//! embedders override single fields with the `with_*` builders.

use alloc::string::String;
use alloc::vec::Vec;

use axerrno::{AxResult, ax_err};

use crate::allocation::DEFAULT_SUFFIX_CAPACITY;
use crate::device::DeviceIdentity;
use crate::naming::{DeviceNodeMatch, NamingRules};
use crate::pluggable::{DEFAULT_PLUGGABLE_ONCE, PluggableOnceCharacterDeviceNodeMatch};

/// Default directory device nodes are created under.
pub const DEFAULT_DEVICE_ROOT: &str = "/dev/";
/// Default root of the `<kind>/<major>/<minor>` symlink tree.
pub const DEFAULT_LOOKUP_ROOT: &str = "/tmp/system/devicemap/nodes/";
/// The control channel's own node (`devctl`), never mapped.
pub const DEFAULT_CONTROL_IDENTITY: DeviceIdentity = DeviceIdentity::character(2, 10);
/// Owner applied together with a rule's permission group.
pub const DEFAULT_NODE_OWNER_UID: u32 = 0;

/// Configuration of a device event loop.
#[derive(Debug, Clone)]
pub struct DevMapConfig {
    /// Directory device nodes are created under.
    pub device_root: String,
    /// Root of the reverse-lookup symlink tree.
    pub lookup_root: String,
    /// Suffix slots per family.
    pub suffix_capacity: usize,
    /// Naming rule table.
    pub naming_rules: NamingRules,
    /// Pluggable-once devices.
    pub pluggable_once: Vec<PluggableOnceCharacterDeviceNodeMatch>,
    /// Identity of the control channel, whose events are dropped.
    pub control_identity: DeviceIdentity,
    /// Owning user set when a rule names a permission group.
    pub node_owner_uid: u32,
}

/// The implementation for DevMapConfig
impl DevMapConfig {
    /// Configuration with the built-in tables and default paths.
    pub fn new() -> Self {
        Self {
            device_root: String::from(DEFAULT_DEVICE_ROOT),
            lookup_root: String::from(DEFAULT_LOOKUP_ROOT),
            suffix_capacity: DEFAULT_SUFFIX_CAPACITY,
            naming_rules: NamingRules::default(),
            pluggable_once: DEFAULT_PLUGGABLE_ONCE.to_vec(),
            control_identity: DEFAULT_CONTROL_IDENTITY,
            node_owner_uid: DEFAULT_NODE_OWNER_UID,
        }
    }

    /// Sets the device root.
    pub fn with_device_root(mut self, root: impl Into<String>) -> Self {
        self.device_root = root.into();
        self
    }

    /// Sets the reverse-lookup root.
    pub fn with_lookup_root(mut self, root: impl Into<String>) -> Self {
        self.lookup_root = root.into();
        self
    }

    /// Sets the number of suffix slots per family.
    pub fn with_suffix_capacity(mut self, capacity: usize) -> Self {
        self.suffix_capacity = capacity;
        self
    }

    /// Replaces the naming rule table.
    pub fn with_naming_rules(mut self, rules: Vec<DeviceNodeMatch>) -> Self {
        self.naming_rules = NamingRules::new(rules);
        self
    }

    /// Replaces the pluggable-once table.
    pub fn with_pluggable_once(mut self, table: Vec<PluggableOnceCharacterDeviceNodeMatch>) -> Self {
        self.pluggable_once = table;
        self
    }

    /// Sets the control channel identity.
    pub fn with_control_identity(mut self, identity: DeviceIdentity) -> Self {
        self.control_identity = identity;
        self
    }

    /// Sets the owning user applied with permission groups.
    pub fn with_node_owner_uid(mut self, uid: u32) -> Self {
        self.node_owner_uid = uid;
        self
    }

    /// Checks the configuration before use.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a zero suffix capacity or a rule pattern without
    /// exactly one placeholder kind.
    pub fn validate(&self) -> AxResult {
        if self.suffix_capacity == 0 {
            return ax_err!(InvalidInput, "suffix capacity must be non-zero");
        }
        self.naming_rules.validate()
    }
}

impl Default for DevMapConfig {
    fn default() -> Self {
        Self::new()
    }
}
