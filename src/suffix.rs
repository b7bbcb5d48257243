//! Rendering of allocation indices into node name suffixes.
//!
//! Two alphabets are supported:
//! - numeric: `0`, `1`, `2`, ...
//! - letters: bijective base-26 over `a`..=`z`, most significant first:
//!   `a`..`z`, `aa`, `ab`, ..., `az`, `ba`, ...
//!
//! Both encoders write into a fixed-capacity [`ArrayString`], so rendering a
//! suffix never allocates.

use arrayvec::ArrayString;
use core::fmt::Write;

/// Capacity of a rendered suffix.
///
/// `usize::MAX` needs 20 decimal digits and 14 letters on 64-bit targets.
pub const SUFFIX_MAX_LEN: usize = 20;

/// A rendered suffix.
pub type Suffix = ArrayString<SUFFIX_MAX_LEN>;

const ALPHABET_LEN: usize = 26;

/// Renders `index` as a decimal string.
pub fn numeric_suffix(index: usize) -> Suffix {
    let mut suffix = Suffix::new();
    // Cannot overflow, see SUFFIX_MAX_LEN.
    let _ = write!(suffix, "{}", index);
    suffix
}

/// Renders `index` in bijective base-26 using lowercase letters.
///
/// `0 -> "a"`, `25 -> "z"`, `26 -> "aa"`, `27 -> "ab"`, `52 -> "ba"`.
pub fn letter_suffix(mut index: usize) -> Suffix {
    let mut digits = [0u8; SUFFIX_MAX_LEN];
    let mut start = digits.len();
    loop {
        start -= 1;
        digits[start] = b'a' + (index % ALPHABET_LEN) as u8;
        index /= ALPHABET_LEN;
        if index == 0 {
            break;
        }
        index -= 1;
    }

    let mut suffix = Suffix::new();
    for &digit in &digits[start..] {
        suffix.push(digit as char);
    }
    suffix
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeSet;
    use alloc::string::{String, ToString};

    #[test]
    fn test_numeric_suffix_parses_back() {
        for index in [0usize, 1, 9, 10, 1023, 65_535, usize::MAX] {
            let suffix = numeric_suffix(index);
            assert_eq!(suffix.parse::<usize>().unwrap(), index);
        }
    }

    #[test]
    fn test_letter_suffix_known_values() {
        assert_eq!(letter_suffix(0).as_str(), "a");
        assert_eq!(letter_suffix(25).as_str(), "z");
        assert_eq!(letter_suffix(26).as_str(), "aa");
        assert_eq!(letter_suffix(27).as_str(), "ab");
        assert_eq!(letter_suffix(51).as_str(), "az");
        assert_eq!(letter_suffix(52).as_str(), "ba");
        assert_eq!(letter_suffix(701).as_str(), "zz");
        assert_eq!(letter_suffix(702).as_str(), "aaa");
    }

    #[test]
    fn test_letter_suffix_is_injective() {
        let mut seen = BTreeSet::new();
        for index in 0..20_000 {
            let suffix = letter_suffix(index);
            assert!(!suffix.is_empty());
            assert!(suffix.bytes().all(|b| b.is_ascii_lowercase()));
            assert!(seen.insert(suffix.to_string()), "duplicate at {}", index);
        }
    }

    #[test]
    fn test_letter_suffix_ordering_within_length() {
        // Same-length suffixes sort like their indices.
        let a: String = letter_suffix(30).to_string();
        let b: String = letter_suffix(31).to_string();
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    #[test]
    fn test_letter_suffix_max_fits() {
        let suffix = letter_suffix(usize::MAX);
        assert!(suffix.len() <= SUFFIX_MAX_LEN);
    }
}
