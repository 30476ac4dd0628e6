// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::fmt::{self, Display};

/// A release of the Perl 5 interpreter, e.g. `5.006` or `5.013010`.
///
/// Ordering is by (minor, patch), which matches the decimal notation:
/// `5.009005 < 5.013002 < 5.013010`.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct PerlVersion {
    pub minor: u16,
    pub patch: u16,
}

impl PerlVersion {
    pub const fn new(minor: u16, patch: u16) -> Self {
        Self { minor, patch }
    }
}

impl Display for PerlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "5.{:03}", self.minor)
        } else {
            write!(f, "5.{:03}{:03}", self.minor, self.patch)
        }
    }
}

// The releases in which the constructs recognized by this crate first
// appeared (or disappeared). Constructs not tied to one of these are
// taken to be as old as Perl 5 itself.
pub const V5_000: PerlVersion = PerlVersion::new(0, 0);
pub const V5_004: PerlVersion = PerlVersion::new(4, 0);
pub const V5_005: PerlVersion = PerlVersion::new(5, 0);
pub const V5_006: PerlVersion = PerlVersion::new(6, 0);
pub const V5_009005: PerlVersion = PerlVersion::new(9, 5);
pub const V5_011: PerlVersion = PerlVersion::new(11, 0);
pub const V5_013002: PerlVersion = PerlVersion::new(13, 2);
pub const V5_013003: PerlVersion = PerlVersion::new(13, 3);
pub const V5_013006: PerlVersion = PerlVersion::new(13, 6);
pub const V5_013010: PerlVersion = PerlVersion::new(13, 10);
pub const V5_015008: PerlVersion = PerlVersion::new(15, 8);
pub const V5_017008: PerlVersion = PerlVersion::new(17, 8);
pub const V5_019005: PerlVersion = PerlVersion::new(19, 5);
pub const V5_021008: PerlVersion = PerlVersion::new(21, 8);
pub const V5_021009: PerlVersion = PerlVersion::new(21, 9);
pub const V5_023000: PerlVersion = PerlVersion::new(23, 0);
pub const V5_023008: PerlVersion = PerlVersion::new(23, 8);

/// The interpreter releases a construct is valid for: present from
/// `introduced`, gone again at `removed` when that is set.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct VersionRange {
    pub introduced: PerlVersion,
    pub removed: Option<PerlVersion>,
}

impl VersionRange {
    /// Valid in every release.
    pub const BASE: VersionRange = VersionRange {
        introduced: V5_000,
        removed: None,
    };

    pub const fn new(introduced: PerlVersion, removed: Option<PerlVersion>) -> Self {
        Self {
            introduced,
            removed,
        }
    }

    /// Valid from `introduced` onwards.
    pub const fn since(introduced: PerlVersion) -> Self {
        Self::new(introduced, None)
    }

    /// Intersect two ranges: a construct made of several parts needs the
    /// newest of the floors and loses support at the earliest removal.
    pub fn join(self, other: VersionRange) -> VersionRange {
        let introduced = self.introduced.max(other.introduced);
        let removed = match (self.removed, other.removed) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
        VersionRange::new(introduced, removed)
    }

    /// Whether the given release falls inside this range. The removal
    /// release itself no longer accepts the construct.
    pub fn accepts(&self, version: PerlVersion) -> bool {
        version >= self.introduced
            && match self.removed {
                Some(removed) => version < removed,
                None => true,
            }
    }
}

impl Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.removed {
            Some(removed) => write!(f, "{} .. {}", self.introduced, removed),
            None => write!(f, "{} ..", self.introduced),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{PerlVersion, VersionRange, V5_005, V5_006, V5_009005, V5_013010, V5_023000};

    #[test]
    fn test_version_ordering() {
        assert!(V5_005 < V5_006);
        assert!(V5_006 < V5_009005);
        assert!(V5_009005 < V5_013010);
        assert!(PerlVersion::new(13, 2) < PerlVersion::new(13, 10));
        assert_eq!(PerlVersion::new(9, 5), V5_009005);
    }

    #[test]
    fn test_version_display() {
        assert_eq!(PerlVersion::new(0, 0).to_string(), "5.000");
        assert_eq!(PerlVersion::new(6, 0).to_string(), "5.006");
        assert_eq!(PerlVersion::new(9, 5).to_string(), "5.009005");
        assert_eq!(PerlVersion::new(13, 10).to_string(), "5.013010");
        assert_eq!(PerlVersion::new(23, 0).to_string(), "5.023");
    }

    #[test]
    fn test_range_join() {
        let named = VersionRange::since(V5_009005);
        let old_code = VersionRange::new(V5_005, Some(V5_009005));

        assert_eq!(
            VersionRange::BASE.join(named),
            VersionRange::since(V5_009005)
        );

        // The join keeps the newest floor and the earliest removal even
        // when that leaves an empty range.
        assert_eq!(
            named.join(old_code),
            VersionRange::new(V5_009005, Some(V5_009005))
        );
    }

    #[test]
    fn test_range_accepts() {
        let range = VersionRange::new(V5_005, Some(V5_023000));

        assert!(!range.accepts(PerlVersion::new(4, 0)));
        assert!(range.accepts(V5_005));
        assert!(range.accepts(PerlVersion::new(13, 10)));
        // Removed at 5.023: that release itself rejects.
        assert!(!range.accepts(V5_023000));
        assert!(!range.accepts(PerlVersion::new(30, 0)));

        // An empty range accepts nothing.
        let empty = VersionRange::new(V5_009005, Some(V5_009005));
        assert!(!empty.accepts(V5_009005));
    }
}
