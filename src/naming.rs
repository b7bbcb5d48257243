//! Naming rules: which (kind, major) pairs become named nodes, and how.

use alloc::string::String;
use alloc::vec::Vec;

use axerrno::{AxResult, ax_err};

use crate::device::{DeviceNodeType, MajorNumber};
use crate::suffix::{Suffix, letter_suffix, numeric_suffix};

/// Placeholder replaced by a decimal suffix.
pub const DIGIT_PLACEHOLDER: &str = "%d";
/// Placeholder replaced by a bijective base-26 letter suffix.
pub const LETTER_PLACEHOLDER: &str = "%c";

/// Alphabet used to render a family's suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixStyle {
    /// `0`, `1`, `2`, ...
    Numeric,
    /// `a`, `b`, ..., `z`, `aa`, ...
    Letters,
}

impl SuffixStyle {
    /// Determines the style of a path pattern.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the pattern carries no placeholder, or both kinds.
    pub fn of_pattern(pattern: &str) -> AxResult<Self> {
        match (
            pattern.contains(DIGIT_PLACEHOLDER),
            pattern.contains(LETTER_PLACEHOLDER),
        ) {
            (true, false) => Ok(Self::Numeric),
            (false, true) => Ok(Self::Letters),
            (false, false) => ax_err!(InvalidInput, "path pattern has no suffix placeholder"),
            (true, true) => ax_err!(InvalidInput, "path pattern mixes suffix placeholders"),
        }
    }

    /// Placeholder text for this style.
    pub const fn placeholder(&self) -> &'static str {
        match self {
            Self::Numeric => DIGIT_PLACEHOLDER,
            Self::Letters => LETTER_PLACEHOLDER,
        }
    }

    /// Encodes `index` with this style.
    pub fn encode(&self, index: usize) -> Suffix {
        match self {
            Self::Numeric => numeric_suffix(index),
            Self::Letters => letter_suffix(index),
        }
    }
}

/// One naming rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceNodeMatch {
    /// Group owning the created nodes, if any.
    pub permission_group: Option<&'static str>,
    /// Human name of the family, used in logs.
    pub family_type_literal: &'static str,
    /// Path relative to the device root, with one placeholder kind.
    pub path_pattern: &'static str,
    /// Block or character.
    pub device_node_type: DeviceNodeType,
    /// Major number the rule applies to.
    pub major_number: MajorNumber,
    /// Permission bits applied at creation.
    pub create_mode: u32,
}

impl DeviceNodeMatch {
    /// Creates a rule.
    pub const fn new(
        permission_group: Option<&'static str>,
        family_type_literal: &'static str,
        path_pattern: &'static str,
        device_node_type: DeviceNodeType,
        major_number: u32,
        create_mode: u32,
    ) -> Self {
        Self {
            permission_group,
            family_type_literal,
            path_pattern,
            device_node_type,
            major_number: MajorNumber(major_number),
            create_mode,
        }
    }

    /// Returns `true` if this rule names devices of `kind`/`major`.
    #[inline]
    pub fn matches(&self, kind: DeviceNodeType, major: MajorNumber) -> bool {
        self.device_node_type == kind && self.major_number == major
    }

    /// Suffix style of this rule's path pattern.
    pub fn suffix_style(&self) -> AxResult<SuffixStyle> {
        SuffixStyle::of_pattern(self.path_pattern)
    }

    /// Renders the node path (relative to the device root) for `index`.
    ///
    /// Every occurrence of the placeholder is substituted.
    pub fn render_path(&self, index: usize) -> AxResult<String> {
        let style = self.suffix_style()?;
        let suffix = style.encode(index);
        Ok(self.path_pattern.replace(style.placeholder(), &suffix))
    }
}

/// Built-in naming rules.
pub const DEFAULT_NAMING_RULES: &[DeviceNodeMatch] = &[
    DeviceNodeMatch::new(Some("audio"), "audio", "audio/%d", DeviceNodeType::Character, 116, 0o220),
    DeviceNodeMatch::new(None, "render", "gpu/render%d", DeviceNodeType::Character, 28, 0o666),
    DeviceNodeMatch::new(Some("window"), "gpu-connector", "gpu/connector%d", DeviceNodeType::Character, 226, 0o660),
    DeviceNodeMatch::new(None, "virtio-console", "hvc0p%d", DeviceNodeType::Character, 229, 0o666),
    DeviceNodeMatch::new(Some("phys"), "hid-mouse", "input/mouse/%d", DeviceNodeType::Character, 10, 0o666),
    DeviceNodeMatch::new(Some("phys"), "hid-keyboard", "input/keyboard/%d", DeviceNodeType::Character, 85, 0o666),
    DeviceNodeMatch::new(None, "storage", "hd%c", DeviceNodeType::Block, 3, 0o600),
    DeviceNodeMatch::new(Some("tty"), "console", "tty%d", DeviceNodeType::Character, 35, 0o620),
    DeviceNodeMatch::new(Some("tty"), "console", "ttyS%d", DeviceNodeType::Character, 4, 0o620),
];

/// Ordered rule table. Lookup is a linear scan; the first match wins.
#[derive(Debug, Clone)]
pub struct NamingRules {
    rules: Vec<DeviceNodeMatch>,
}

impl NamingRules {
    /// Creates a table from `rules`, keeping their order.
    pub fn new(rules: Vec<DeviceNodeMatch>) -> Self {
        Self { rules }
    }

    /// Finds the rule for `kind`/`major`.
    ///
    /// `None` means the device exists in the kernel but is not surfaced as a
    /// named node.
    pub fn find(&self, kind: DeviceNodeType, major: MajorNumber) -> Option<&DeviceNodeMatch> {
        self.rules.iter().find(|rule| rule.matches(kind, major))
    }

    /// All rules in lookup order.
    pub fn rules(&self) -> &[DeviceNodeMatch] {
        &self.rules
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Checks every pattern and reports rules shadowed by an earlier one.
    ///
    /// Shadowed rules are only logged; lookups keep returning the first.
    pub fn validate(&self) -> AxResult {
        for (position, rule) in self.rules.iter().enumerate() {
            rule.suffix_style()?;
            if let Some(earlier) = self.rules[..position]
                .iter()
                .find(|earlier| earlier.matches(rule.device_node_type, rule.major_number))
            {
                warn!(
                    "naming rule {:?} ({}) is shadowed by {:?} for {:?} major {}",
                    rule.family_type_literal,
                    rule.path_pattern,
                    earlier.family_type_literal,
                    rule.device_node_type,
                    rule.major_number
                );
            }
        }
        Ok(())
    }
}

impl Default for NamingRules {
    fn default() -> Self {
        Self::new(DEFAULT_NAMING_RULES.to_vec())
    }
}
