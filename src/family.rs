//! Device node families: all nodes sharing one (kind, major) pair.

use alloc::collections::BTreeMap;
use alloc::string::String;

use axerrno::{AxResult, ax_err};

use crate::allocation::{AllocationMap, SuffixReservation};
use crate::device::{DeviceNodeType, MajorNumber, MinorNumber};

/// A node created for one live device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredDeviceNode {
    device_path: String,
    minor_number: MinorNumber,
    suffix_index: usize,
}

impl RegisteredDeviceNode {
    /// Creates an entry.
    pub fn new(device_path: String, minor_number: MinorNumber, suffix_index: usize) -> Self {
        Self {
            device_path,
            minor_number,
            suffix_index,
        }
    }

    /// Absolute path of the device node.
    #[inline]
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Minor number of the device.
    #[inline]
    pub fn minor_number(&self) -> MinorNumber {
        self.minor_number
    }

    /// Suffix index the path was rendered from.
    #[inline]
    pub fn suffix_index(&self) -> usize {
        self.suffix_index
    }
}

/// State kept for one (kind, major) pair.
///
/// Invariant: a bit of the allocation map is set if and only if a registered
/// node carries that suffix index. Families are never dropped once created.
pub struct DeviceNodeFamily {
    family_type_literal: &'static str,
    device_node_type: DeviceNodeType,
    major_number: MajorNumber,
    allocation_map: AllocationMap,
    /// Registered nodes, unique by minor number.
    registered_nodes: BTreeMap<MinorNumber, RegisteredDeviceNode>,
}

impl DeviceNodeFamily {
    /// Creates an empty family with `capacity` suffix slots.
    pub fn new(
        family_type_literal: &'static str,
        device_node_type: DeviceNodeType,
        major_number: MajorNumber,
        capacity: usize,
    ) -> Self {
        Self {
            family_type_literal,
            device_node_type,
            major_number,
            allocation_map: AllocationMap::new(capacity),
            registered_nodes: BTreeMap::new(),
        }
    }

    /// Family name from the naming rule.
    #[inline]
    pub fn family_type_literal(&self) -> &'static str {
        self.family_type_literal
    }

    /// Block or character.
    #[inline]
    pub fn device_node_type(&self) -> DeviceNodeType {
        self.device_node_type
    }

    /// Major number shared by the family.
    #[inline]
    pub fn major_number(&self) -> MajorNumber {
        self.major_number
    }

    /// Returns `true` if this is the family of `kind`/`major`.
    #[inline]
    pub fn is(&self, kind: DeviceNodeType, major: MajorNumber) -> bool {
        self.device_node_type == kind && self.major_number == major
    }

    /// The suffix allocation map.
    #[inline]
    pub fn allocation_map(&self) -> &AllocationMap {
        &self.allocation_map
    }

    /// Registered nodes in minor-number order.
    pub fn nodes(&self) -> impl Iterator<Item = &RegisteredDeviceNode> {
        self.registered_nodes.values()
    }

    /// Node registered for `minor`, if any.
    pub fn node(&self, minor: MinorNumber) -> Option<&RegisteredDeviceNode> {
        self.registered_nodes.get(&minor)
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.registered_nodes.len()
    }

    /// Reserves the lowest free suffix index.
    pub fn reserve_suffix(&mut self) -> AxResult<SuffixReservation> {
        self.allocation_map.reserve()
    }

    /// Abandons a reservation.
    pub fn rollback_suffix(&mut self, reservation: SuffixReservation) {
        self.allocation_map.rollback(reservation);
    }

    /// Records a node created from `reservation` and commits the suffix.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if a node with the same minor is registered; the
    /// reservation is rolled back and the existing entry is kept.
    pub fn commit_node(
        &mut self,
        reservation: SuffixReservation,
        device_path: String,
        minor: MinorNumber,
    ) -> AxResult {
        if self.registered_nodes.contains_key(&minor) {
            self.allocation_map.rollback(reservation);
            return ax_err!(AlreadyExists, "minor number already registered in family");
        }
        let index = reservation.index();
        self.registered_nodes
            .insert(minor, RegisteredDeviceNode::new(device_path, minor, index));
        self.allocation_map.commit(reservation);
        Ok(())
    }

    /// Removes the node for `minor` and releases its suffix.
    ///
    /// Returns `None` if no node is registered for `minor`.
    pub fn remove_node(&mut self, minor: MinorNumber) -> Option<RegisteredDeviceNode> {
        let node = self.registered_nodes.remove(&minor)?;
        if !self.allocation_map.release(node.suffix_index()) {
            warn!(
                "{}: suffix {} of {} was not marked in use",
                self.family_type_literal,
                node.suffix_index(),
                node.device_path()
            );
        }
        Some(node)
    }
}

impl core::fmt::Debug for DeviceNodeFamily {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceNodeFamily")
            .field("family", &self.family_type_literal)
            .field("type", &self.device_node_type)
            .field("major", &self.major_number)
            .field("allocation_map", &self.allocation_map)
            .field("nodes", &self.registered_nodes.len())
            .finish()
    }
}
