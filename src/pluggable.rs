//! Devices that hotplug at most once per OS session.
//!
//! Such nodes are created blindly at a fixed path and never tracked: no
//! family, no suffix, no reverse-lookup link, and no removal path.

use crate::device::{MajorNumber, MinorNumber};

/// A character device with a fixed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluggableOnceCharacterDeviceNodeMatch {
    /// Path relative to the device root.
    pub path: &'static str,
    /// Permission bits applied at creation.
    pub mode: u32,
    /// Major number.
    pub major: MajorNumber,
    /// Minor number.
    pub minor: MinorNumber,
}

impl PluggableOnceCharacterDeviceNodeMatch {
    /// Creates an entry.
    pub const fn new(path: &'static str, mode: u32, major: u32, minor: u32) -> Self {
        Self {
            path,
            mode,
            major: MajorNumber(major),
            minor: MinorNumber(minor),
        }
    }

    /// Returns `true` for the exact `major`/`minor` pair.
    #[inline]
    pub fn matches(&self, major: MajorNumber, minor: MinorNumber) -> bool {
        self.major == major && self.minor == minor
    }
}

/// Built-in pluggable-once devices.
pub const DEFAULT_PLUGGABLE_ONCE: &[PluggableOnceCharacterDeviceNodeMatch] =
    &[PluggableOnceCharacterDeviceNodeMatch::new("beep", 0o666, 1, 10)];

/// Finds the entry for a character device `major`/`minor`.
pub fn find_pluggable_once(
    table: &[PluggableOnceCharacterDeviceNodeMatch],
    major: MajorNumber,
    minor: MinorNumber,
) -> Option<&PluggableOnceCharacterDeviceNodeMatch> {
    table.iter().find(|entry| entry.matches(major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_beep() {
        let beep = find_pluggable_once(DEFAULT_PLUGGABLE_ONCE, MajorNumber(1), MinorNumber(10))
            .unwrap();
        assert_eq!(beep.path, "beep");
        assert_eq!(beep.mode, 0o666);

        assert!(find_pluggable_once(DEFAULT_PLUGGABLE_ONCE, MajorNumber(1), MinorNumber(11)).is_none());
        assert!(find_pluggable_once(DEFAULT_PLUGGABLE_ONCE, MajorNumber(10), MinorNumber(1)).is_none());
    }
}
