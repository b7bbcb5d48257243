//! Kernel device identities and the path helpers shared by the node tree and
//! the reverse-lookup tree.

use alloc::format;
use alloc::string::String;
use core::fmt;

/// Kind of special file backing a device node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceNodeType {
    /// Block special file.
    Block,
    /// Character special file.
    Character,
}

impl DeviceNodeType {
    /// Maps the wire-level `is_block_device` flag to a node type.
    #[inline]
    pub const fn from_block_flag(is_block: bool) -> Self {
        if is_block { Self::Block } else { Self::Character }
    }

    /// Subdirectory of the reverse-lookup root holding nodes of this kind.
    #[inline]
    pub const fn lookup_dir(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Character => "char",
        }
    }
}

/// Kernel major number; identifies a driver / device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MajorNumber(pub u32);

/// Kernel minor number; identifies one instance within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinorNumber(pub u32);

impl MajorNumber {
    /// Returns the raw number.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl MinorNumber {
    /// Returns the raw number.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for MajorNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MinorNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Full kernel identity of one device: kind plus major/minor pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceIdentity {
    /// Block or character.
    pub kind: DeviceNodeType,
    /// Major number.
    pub major: MajorNumber,
    /// Minor number.
    pub minor: MinorNumber,
}

impl DeviceIdentity {
    /// Creates a new identity.
    pub const fn new(kind: DeviceNodeType, major: u32, minor: u32) -> Self {
        Self {
            kind,
            major: MajorNumber(major),
            minor: MinorNumber(minor),
        }
    }

    /// Character device identity, the common case for static tables.
    pub const fn character(major: u32, minor: u32) -> Self {
        Self::new(DeviceNodeType::Character, major, minor)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.kind.lookup_dir(), self.major, self.minor)
    }
}

/// Joins `relative` under `base`, collapsing the slash between them.
pub fn join_path(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    format!("{}/{}", base, relative)
}

/// Path of the reverse-lookup symlink for `identity`:
/// `<root>/<block|char>/<major>/<minor>`.
pub fn lookup_link_path(root: &str, identity: &DeviceIdentity) -> String {
    join_path(
        root,
        &format!(
            "{}/{}/{}",
            identity.kind.lookup_dir(),
            identity.major,
            identity.minor
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path_slashes() {
        assert_eq!(join_path("/dev/", "gpu/render0"), "/dev/gpu/render0");
        assert_eq!(join_path("/dev", "/beep"), "/dev/beep");
        assert_eq!(join_path("/dev", "hda"), "/dev/hda");
    }

    #[test]
    fn test_lookup_link_path() {
        let root = "/tmp/system/devicemap/nodes/";
        assert_eq!(
            lookup_link_path(root, &DeviceIdentity::new(DeviceNodeType::Block, 3, 0)),
            "/tmp/system/devicemap/nodes/block/3/0"
        );
        assert_eq!(
            lookup_link_path(root, &DeviceIdentity::character(28, 7)),
            "/tmp/system/devicemap/nodes/char/28/7"
        );
    }

    #[test]
    fn test_block_flag_mapping() {
        assert_eq!(DeviceNodeType::from_block_flag(true), DeviceNodeType::Block);
        assert_eq!(
            DeviceNodeType::from_block_flag(false),
            DeviceNodeType::Character
        );
    }
}
