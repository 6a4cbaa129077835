// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compactly encoded size constraints for measure passes.
//!
//! [`SizeConstraints`] packs a min/max range per axis into a single `u64`.
//! Each axis uses 32 bits: the low [`MIN_BITS`] bits hold the minimum and
//! the high [`MAX_BITS`] bits hold the maximum, with an all-ones sentinel
//! meaning *unbounded*. Bounded values round-trip exactly up to
//! [`SizeConstraints::MAX_DIMENSION`] (for maximums) and
//! [`SizeConstraints::MAX_MIN_DIMENSION`] (for minimums); larger values are
//! a construction error, never silently truncated.
//!
//! [`MeasureSpec`] is the measure-spec-style view of one axis. An unbounded
//! maximum always becomes [`MeasureSpec::Unspecified`], never a numeric size
//! that could be mistaken for "exactly 0".

use core::fmt;

/// Bits per axis used for the minimum dimension.
pub const MIN_BITS: u32 = 14;
/// Bits per axis used for the maximum dimension.
pub const MAX_BITS: u32 = 18;

const MIN_MASK: u32 = (1 << MIN_BITS) - 1;
const MAX_MASK: u32 = (1 << MAX_BITS) - 1;

/// Sentinel for an unbounded dimension, usable for both min and max inputs.
pub const INFINITY: u32 = u32::MAX;

/// Measure-spec-style description of one axis of a measure request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeasureSpec {
    /// The axis must be exactly this size.
    Exact(u32),
    /// The axis may be anything up to this size.
    AtMost(u32),
    /// The axis is unbounded.
    Unspecified,
}

/// Min/max width and height for a layout pass, packed into 64 bits.
///
/// Equality is bit equality, so re-measuring with identical constraints can
/// be short-circuited with a single integer compare.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeConstraints(u64);

impl SizeConstraints {
    /// Largest encodable bounded maximum dimension.
    pub const MAX_DIMENSION: u32 = MAX_MASK - 1;
    /// Largest encodable bounded minimum dimension.
    pub const MAX_MIN_DIMENSION: u32 = MIN_MASK - 1;

    /// Creates constraints from per-axis min/max values.
    ///
    /// Pass [`INFINITY`] for an unbounded dimension.
    ///
    /// # Panics
    ///
    /// Panics if a bounded minimum exceeds [`Self::MAX_MIN_DIMENSION`], a
    /// bounded maximum exceeds [`Self::MAX_DIMENSION`], or a bounded minimum
    /// exceeds its bounded maximum.
    #[must_use]
    pub fn new(min_width: u32, max_width: u32, min_height: u32, max_height: u32) -> Self {
        let w = encode_axis(min_width, max_width, "width");
        let h = encode_axis(min_height, max_height, "height");
        Self((u64::from(h) << 32) | u64::from(w))
    }

    /// Constraints that require exactly `width` × `height`.
    #[must_use]
    pub fn exact(width: u32, height: u32) -> Self {
        Self::new(width, width, height, height)
    }

    /// Fully unbounded constraints.
    #[must_use]
    pub const fn unbounded() -> Self {
        // Both axes: min 0, max sentinel.
        let axis = (MAX_MASK << MIN_BITS) as u64;
        Self((axis << 32) | axis)
    }

    /// The minimum width.
    #[must_use]
    pub fn min_width(self) -> u32 {
        decode_min((self.0 & 0xFFFF_FFFF) as u32)
    }

    /// The maximum width, or [`INFINITY`] if unbounded.
    #[must_use]
    pub fn max_width(self) -> u32 {
        decode_max((self.0 & 0xFFFF_FFFF) as u32)
    }

    /// The minimum height.
    #[must_use]
    pub fn min_height(self) -> u32 {
        decode_min((self.0 >> 32) as u32)
    }

    /// The maximum height, or [`INFINITY`] if unbounded.
    #[must_use]
    pub fn max_height(self) -> u32 {
        decode_max((self.0 >> 32) as u32)
    }

    /// Whether the width is bounded.
    #[must_use]
    pub fn has_bounded_width(self) -> bool {
        self.max_width() != INFINITY
    }

    /// Whether the height is bounded.
    #[must_use]
    pub fn has_bounded_height(self) -> bool {
        self.max_height() != INFINITY
    }

    /// The measure-spec view of the width axis.
    #[must_use]
    pub fn to_width_spec(self) -> MeasureSpec {
        to_spec(self.min_width(), self.max_width())
    }

    /// The measure-spec view of the height axis.
    #[must_use]
    pub fn to_height_spec(self) -> MeasureSpec {
        to_spec(self.min_height(), self.max_height())
    }

    /// The raw 64-bit encoding.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Reconstructs constraints from [`bits`](Self::bits).
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl Default for SizeConstraints {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for SizeConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim = |v: u32, f: &mut fmt::Formatter<'_>| {
            if v == INFINITY {
                write!(f, "∞")
            } else {
                write!(f, "{v}")
            }
        };
        write!(f, "SizeConstraints(w: {}..", self.min_width())?;
        dim(self.max_width(), f)?;
        write!(f, ", h: {}..", self.min_height())?;
        dim(self.max_height(), f)?;
        write!(f, ")")
    }
}

fn encode_axis(min: u32, max: u32, axis: &str) -> u32 {
    let min_enc = if min == INFINITY {
        // An unbounded minimum degenerates to zero.
        0
    } else {
        assert!(
            min <= SizeConstraints::MAX_MIN_DIMENSION,
            "min {axis} {min} exceeds encodable maximum {}",
            SizeConstraints::MAX_MIN_DIMENSION
        );
        min
    };
    let max_enc = if max == INFINITY {
        MAX_MASK
    } else {
        assert!(
            max <= SizeConstraints::MAX_DIMENSION,
            "max {axis} {max} exceeds encodable maximum {}",
            SizeConstraints::MAX_DIMENSION
        );
        assert!(
            min_enc <= max,
            "min {axis} {min_enc} exceeds max {axis} {max}"
        );
        max
    };
    (max_enc << MIN_BITS) | min_enc
}

fn decode_min(axis: u32) -> u32 {
    axis & MIN_MASK
}

fn decode_max(axis: u32) -> u32 {
    let raw = (axis >> MIN_BITS) & MAX_MASK;
    if raw == MAX_MASK { INFINITY } else { raw }
}

fn to_spec(min: u32, max: u32) -> MeasureSpec {
    if max == INFINITY {
        MeasureSpec::Unspecified
    } else if min == max {
        MeasureSpec::Exact(max)
    } else {
        MeasureSpec::AtMost(max)
    }
}
