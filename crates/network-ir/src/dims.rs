// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-sample tensor dimensions.
//!
//! Networks use an implicit batch dimension: every [`Dims`] describes a
//! single sample (`[C, H, W]` for feature maps, `[N]` after flattening) and
//! the batch ceiling is applied by the plan builder.

use std::fmt;

/// Dimensions of one sample of a tensor, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Dims {
    dims: Vec<usize>,
}

impl Dims {
    /// Creates dimensions from an explicit list.
    ///
    /// # Examples
    /// ```
    /// use network_ir::Dims;
    /// let d = Dims::new(vec![3, 224, 224]);
    /// assert_eq!(d.rank(), 3);
    /// assert_eq!(d.volume(), Some(3 * 224 * 224));
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Creates a `[C, H, W]` feature-map shape.
    pub fn chw(c: usize, h: usize, w: usize) -> Self {
        Self { dims: vec![c, h, w] }
    }

    /// Returns the number of dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the number of elements in one sample, or `None` if it does
    /// not fit in `usize`.
    ///
    /// Rank-0 dims describe a scalar and have a volume of 1.
    pub fn volume(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the size of a specific dimension, or `None` if out of bounds.
    pub fn dim(&self, index: usize) -> Option<usize> {
        self.dims.get(index).copied()
    }

    /// Returns the channel count (the outermost per-sample dimension).
    pub fn channels(&self) -> usize {
        self.dims.first().copied().unwrap_or(1)
    }

    /// Returns `(H, W)` for a rank-3 feature map.
    pub fn spatial(&self) -> Option<(usize, usize)> {
        match self.dims.as_slice() {
            [_, h, w] => Some((*h, *w)),
            _ => None,
        }
    }

    /// Byte footprint of one sample for the given element type, or `None`
    /// on overflow.
    pub fn size_bytes(&self, dtype: crate::DType) -> Option<usize> {
        self.volume()?.checked_mul(dtype.size_bytes())
    }

    /// Compares two shapes after stripping leading unit dimensions.
    ///
    /// Weight files frequently pad blob shapes with leading 1s (legacy
    /// `num/channels/height/width` blobs), so `[1, 1, 10, 20]` and `[10, 20]`
    /// describe the same blob.
    pub fn matches_ignoring_leading_ones(&self, other: &Dims) -> bool {
        fn trim(d: &[usize]) -> &[usize] {
            let first = d.iter().position(|&x| x != 1).unwrap_or(d.len());
            &d[first..]
        }
        trim(&self.dims) == trim(&other.dims)
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Dims {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for Dims {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DType;

    #[test]
    fn test_chw() {
        let d = Dims::chw(3, 32, 16);
        assert_eq!(d.rank(), 3);
        assert_eq!(d.volume(), Some(3 * 32 * 16));
        assert_eq!(d.channels(), 3);
        assert_eq!(d.spatial(), Some((32, 16)));
        assert_eq!(d.size_bytes(DType::F16), Some(3 * 32 * 16 * 2));
    }

    #[test]
    fn test_volume_overflow() {
        let huge = Dims::chw(u32::MAX as usize, u32::MAX as usize, u32::MAX as usize);
        assert_eq!(huge.volume(), None);
        assert_eq!(Dims::new(vec![usize::MAX / 2]).size_bytes(DType::F32), None);
        assert_eq!(Dims::new(vec![]).volume(), Some(1));
    }

    #[test]
    fn test_spatial_requires_rank_three() {
        assert_eq!(Dims::new(vec![10]).spatial(), None);
    }

    #[test]
    fn test_leading_ones() {
        let a = Dims::new(vec![1, 1, 10, 20]);
        let b = Dims::new(vec![10, 20]);
        assert!(a.matches_ignoring_leading_ones(&b));
        assert!(!a.matches_ignoring_leading_ones(&Dims::new(vec![20, 10])));
        assert!(Dims::new(vec![1]).matches_ignoring_leading_ones(&Dims::new(vec![])));
    }

    #[test]
    fn test_display() {
        assert_eq!(Dims::chw(1, 2, 3).to_string(), "[1, 2, 3]");
    }
}
