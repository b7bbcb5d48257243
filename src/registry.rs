//! Registry of device node families.
//!
//! One [`DeviceNodeFamily`] exists per (kind, major) pair that has matched a
//! naming rule at least once. Lookup is a linear search, which is fine for
//! the handful of families a system exposes.
//!
//! # Lifecycle
//!
//! Families are created lazily by `get_or_create()` and live as long as the
//! registry: a family whose nodes are all gone is still a valid target for
//! the next device with the same (kind, major) pair.

use alloc::vec::Vec;

use crate::device::{DeviceNodeType, MajorNumber};
use crate::family::DeviceNodeFamily;
use crate::naming::DeviceNodeMatch;

/// All families seen so far.
pub struct FamilyRegistry {
    /// Families in creation order.
    families: Vec<DeviceNodeFamily>,
    /// Suffix slots given to each new family.
    suffix_capacity: usize,
}

impl FamilyRegistry {
    /// Creates an empty registry whose families get `suffix_capacity` slots.
    pub fn new(suffix_capacity: usize) -> Self {
        Self {
            families: Vec::new(),
            suffix_capacity,
        }
    }

    /// Suffix slots per family.
    #[inline]
    pub fn suffix_capacity(&self) -> usize {
        self.suffix_capacity
    }

    fn position(&self, kind: DeviceNodeType, major: MajorNumber) -> Option<usize> {
        self.families
            .iter()
            .position(|family| family.is(kind, major))
    }

    /// Finds the family of `kind`/`major`.
    pub fn find(&self, kind: DeviceNodeType, major: MajorNumber) -> Option<&DeviceNodeFamily> {
        self.families.iter().find(|family| family.is(kind, major))
    }

    /// Finds the family of `kind`/`major` for modification.
    pub fn find_mut(
        &mut self,
        kind: DeviceNodeType,
        major: MajorNumber,
    ) -> Option<&mut DeviceNodeFamily> {
        self.families.iter_mut().find(|family| family.is(kind, major))
    }

    /// Returns the family named by `rule`, creating it on first use.
    pub fn get_or_create(&mut self, rule: &DeviceNodeMatch) -> &mut DeviceNodeFamily {
        let kind = rule.device_node_type;
        let major = rule.major_number;
        let position = match self.position(kind, major) {
            Some(position) => position,
            None => {
                debug!(
                    "new device node family {:?} ({:?} major {}, {} slots)",
                    rule.family_type_literal, kind, major, self.suffix_capacity
                );
                self.families.push(DeviceNodeFamily::new(
                    rule.family_type_literal,
                    kind,
                    major,
                    self.suffix_capacity,
                ));
                self.families.len() - 1
            }
        };
        &mut self.families[position]
    }

    /// All families in creation order.
    pub fn families(&self) -> &[DeviceNodeFamily] {
        &self.families
    }

    /// Number of families.
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Returns true if no family was created yet.
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::DEFAULT_NAMING_RULES;

    #[test]
    fn test_registry_get_or_create() {
        let mut registry = FamilyRegistry::new(32);
        assert!(registry.is_empty());

        let render = &DEFAULT_NAMING_RULES[1];
        let family = registry.get_or_create(render);
        assert_eq!(family.family_type_literal(), "render");
        assert_eq!(family.allocation_map().capacity(), 32);
        assert_eq!(registry.len(), 1);

        // Second lookup returns the same family
        registry.get_or_create(render);
        assert_eq!(registry.len(), 1);

        let storage = &DEFAULT_NAMING_RULES[6];
        registry.get_or_create(storage);
        assert_eq!(registry.len(), 2);

        assert!(registry.find(DeviceNodeType::Block, MajorNumber(3)).is_some());
        assert!(registry.find(DeviceNodeType::Character, MajorNumber(3)).is_none());
    }

    #[test]
    fn test_registry_same_major_different_kind() {
        let mut registry = FamilyRegistry::new(8);
        let chr = DeviceNodeMatch::new(None, "c", "c%d", DeviceNodeType::Character, 9, 0o600);
        let blk = DeviceNodeMatch::new(None, "b", "b%c", DeviceNodeType::Block, 9, 0o600);

        registry.get_or_create(&chr);
        registry.get_or_create(&blk);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry
                .find_mut(DeviceNodeType::Block, MajorNumber(9))
                .unwrap()
                .family_type_literal(),
            "b"
        );
    }
}
