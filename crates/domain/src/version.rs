//! Dotted-triple version ordering for configuration documents.
//!
//! Versions are compared component-wise as integers, never as strings:
//! `1.10.0` is newer than `1.9.0`. Parsing is lenient because documents may
//! come from untrusted remote sources and must not break the loader.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Numeric `major.minor.patch` version.
///
/// Field order matters: the derived `Ord` compares major, then minor, then patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
}

impl Version {
    /// Build a version from explicit components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string. Never fails.
    ///
    /// Missing components default to 0. Each component uses its leading
    /// digits only, so `"2-beta"` reads as 2 and `"x"` reads as 0. Anything
    /// after the third component is ignored.
    #[must_use]
    pub fn parse_lenient(input: &str) -> Self {
        let mut parts = input.trim().split('.').map(parse_component);
        let major = parts.next().unwrap_or(0);
        let minor = parts.next().unwrap_or(0);
        let patch = parts.next().unwrap_or(0);
        Self::new(major, minor, patch)
    }

    /// Major component.
    #[must_use]
    pub const fn major(&self) -> u64 {
        self.major
    }

    /// Minor component.
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.minor
    }

    /// Patch component.
    #[must_use]
    pub const fn patch(&self) -> u64 {
        self.patch
    }
}

impl fmt::Display for Version {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn parse_component(raw: &str) -> u64 {
    let digits_end = raw
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(raw.len(), |(index, _)| index);
    raw.get(..digits_end)
        .and_then(|digits| digits.parse::<u64>().ok())
        .unwrap_or(0)
}

/// Compare two version strings numerically.
#[must_use]
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    Version::parse_lenient(left).cmp(&Version::parse_lenient(right))
}

/// Returns true when `candidate` is strictly newer than `incumbent`.
///
/// Equal versions are never newer in either direction.
#[must_use]
pub fn is_newer(candidate: &str, incumbent: &str) -> bool {
    compare_versions(candidate, incumbent) == Ordering::Greater
}

/// Returns true when an app at `running` satisfies a document's `min_app_version`.
#[must_use]
pub fn is_compatible(running: &str, min_app_version: &str) -> bool {
    compare_versions(running, min_app_version) != Ordering::Less
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn components_compare_numerically() {
        assert!(is_newer("1.10.0", "1.9.0"));
        assert!(!is_newer("1.9.0", "1.10.0"));
        assert!(is_newer("10.0.0", "9.99.99"));
        assert!(is_newer("1.0.10", "1.0.2"));
    }

    #[test]
    fn equal_versions_are_not_newer_either_way() {
        assert!(!is_newer("1.2.3", "1.2.3"));
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert!(!is_newer("1.2", "1.2.0"));
        assert!(!is_newer("1.2.0", "1.2"));
    }

    #[test]
    fn missing_and_garbage_components_default_to_zero() {
        assert_eq!(Version::parse_lenient("2"), Version::new(2, 0, 0));
        assert_eq!(Version::parse_lenient(""), Version::new(0, 0, 0));
        assert_eq!(Version::parse_lenient("1.x.3"), Version::new(1, 0, 3));
        assert_eq!(Version::parse_lenient("2-beta.1"), Version::new(2, 1, 0));
        assert_eq!(Version::parse_lenient(" 3.4.5.6 "), Version::new(3, 4, 5));
    }

    #[test]
    fn compatibility_gate_is_inclusive() {
        assert!(is_compatible("1.4.0", "1.4.0"));
        assert!(is_compatible("1.10.0", "1.9.5"));
        assert!(!is_compatible("1.4.0", "1.5.0"));
        assert!(!is_compatible("1.9.0", "1.10.0"));
    }

    #[test]
    fn display_is_canonical_triple() {
        assert_eq!(Version::parse_lenient("7.1").to_string(), "7.1.0");
    }

    proptest! {
        #[test]
        fn ordering_matches_integer_tuples(
            a in (0u64..1000, 0u64..1000, 0u64..1000),
            b in (0u64..1000, 0u64..1000, 0u64..1000),
        ) {
            let left = format!("{}.{}.{}", a.0, a.1, a.2);
            let right = format!("{}.{}.{}", b.0, b.1, b.2);
            prop_assert_eq!(compare_versions(&left, &right), a.cmp(&b));
        }

        #[test]
        fn newer_is_antisymmetric(
            a in (0u64..50, 0u64..50, 0u64..50),
            b in (0u64..50, 0u64..50, 0u64..50),
        ) {
            let left = format!("{}.{}.{}", a.0, a.1, a.2);
            let right = format!("{}.{}.{}", b.0, b.1, b.2);
            prop_assert!(!(is_newer(&left, &right) && is_newer(&right, &left)));
        }
    }
}
