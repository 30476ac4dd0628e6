// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::ops::{Add, BitOr, Mul};

/// The upper end of a width: a character count or unbounded.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Bound {
    Finite(u64),
    Infinite,
}

impl Add for Bound {
    type Output = Bound;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Bound::Finite(v0), Bound::Finite(v1)) => Bound::Finite(v0.saturating_add(v1)),
            _ => Bound::Infinite,
        }
    }
}

impl Mul for Bound {
    type Output = Bound;

    fn mul(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            // Zero repetitions of anything consume nothing, even of an
            // unbounded construct.
            (Bound::Finite(0), _) | (_, Bound::Finite(0)) => Bound::Finite(0),
            (Bound::Finite(v0), Bound::Finite(v1)) => Bound::Finite(v0.saturating_mul(v1)),
            _ => Bound::Infinite,
        }
    }
}

/// How many characters a construct can consume. `None` on either side
/// means the bound cannot be determined statically (backreferences,
/// interpolations, embedded code).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Width {
    pub min: Option<u64>,
    pub max: Option<Bound>,
}

impl Width {
    pub const ZERO: Width = Width::fixed(0);

    pub const fn fixed(count: u64) -> Self {
        Self {
            min: Some(count),
            max: Some(Bound::Finite(count)),
        }
    }

    pub const fn range(min: u64, max: u64) -> Self {
        Self {
            min: Some(min),
            max: Some(Bound::Finite(max)),
        }
    }

    pub const fn at_least(min: u64) -> Self {
        Self {
            min: Some(min),
            max: Some(Bound::Infinite),
        }
    }

    pub const fn unknown() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Sequencing: an undetermined part makes the whole run undetermined.
impl Add for Width {
    type Output = Width;

    fn add(self, rhs: Self) -> Self::Output {
        Width {
            min: match (self.min, rhs.min) {
                (Some(v0), Some(v1)) => Some(v0.saturating_add(v1)),
                _ => None,
            },
            max: match (self.max, rhs.max) {
                (Some(v0), Some(v1)) => Some(v0 + v1),
                _ => None,
            },
        }
    }
}

/// Repetition: the left side is the construct, the right side the repeat
/// counts of its quantifier.
impl Mul for Width {
    type Output = Width;

    fn mul(self, rhs: Self) -> Self::Output {
        Width {
            min: match (self.min, rhs.min) {
                (Some(v0), Some(v1)) => Some(v0.saturating_mul(v1)),
                _ => None,
            },
            max: match (self.max, rhs.max) {
                (Some(v0), Some(v1)) => Some(v0 * v1),
                _ => None,
            },
        }
    }
}

/// Alternation: the shortest minimum and the longest maximum over the
/// branches. A branch with an undetermined side drops out of that
/// side's reduction; only when every branch is undetermined does the
/// alternation stay undetermined.
impl BitOr for Width {
    type Output = Width;

    fn bitor(self, rhs: Self) -> Self::Output {
        Width {
            min: match (self.min, rhs.min) {
                (Some(v0), Some(v1)) => Some(v0.min(v1)),
                (Some(v0), None) => Some(v0),
                (None, v1) => v1,
            },
            max: match (self.max, rhs.max) {
                (Some(v0), Some(v1)) => Some(v0.max(v1)),
                (Some(v0), None) => Some(v0),
                (None, v1) => v1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Bound, Width};

    #[test]
    fn test_sequencing() {
        assert_eq!(Width::fixed(1) + Width::fixed(2), Width::fixed(3));
        assert_eq!(
            Width::range(1, 2) + Width::fixed(3),
            Width::range(4, 5)
        );
        assert_eq!(
            Width::at_least(1) + Width::fixed(2),
            Width::at_least(3)
        );

        // An undetermined part poisons the sum.
        assert_eq!(
            Width::fixed(5) + Width::unknown(),
            Width::unknown()
        );
    }

    #[test]
    fn test_repetition() {
        // `a{2,5}`
        assert_eq!(
            Width::fixed(1) * Width::range(2, 5),
            Width::range(2, 5)
        );

        // `(ab){3}`
        assert_eq!(
            Width::fixed(2) * Width::fixed(3),
            Width::fixed(6)
        );

        // `a*`: zero repetitions of an unbounded count is still zero.
        assert_eq!(
            Width::fixed(1)
                * Width {
                    min: Some(0),
                    max: Some(Bound::Infinite),
                },
            Width {
                min: Some(0),
                max: Some(Bound::Infinite),
            }
        );

        // Zero repetitions collapse a determined width but not an
        // undetermined one.
        assert_eq!(Width::unknown() * Width::fixed(0), Width::unknown());
        assert_eq!(
            Width::at_least(1) * Width::fixed(0),
            Width::fixed(0)
        );
    }

    #[test]
    fn test_alternation() {
        // `ab|c`
        assert_eq!(Width::fixed(2) | Width::fixed(1), Width::range(1, 2));

        // `a+|b`
        assert_eq!(
            Width::at_least(1) | Width::fixed(1),
            Width::at_least(1)
        );

        // A branch of undetermined width is left out of the reduction.
        assert_eq!(Width::fixed(3) | Width::unknown(), Width::fixed(3));
        assert_eq!(Width::unknown() | Width::range(1, 2), Width::range(1, 2));

        // All branches undetermined: nothing to reduce.
        assert_eq!(Width::unknown() | Width::unknown(), Width::unknown());
    }

    #[test]
    fn test_bound_ordering() {
        assert!(Bound::Finite(u64::MAX) < Bound::Infinite);
        assert!(Bound::Finite(1) < Bound::Finite(2));
    }
}
