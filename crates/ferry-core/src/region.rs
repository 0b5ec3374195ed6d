//! Axis-aligned integer regions.
//!
//! A [`Region`] is an inclusive box `[lo, hi]` in index space. A region
//! with `hi < lo` on any axis is empty: it has zero points and intersects
//! nothing. Binary operations require both operands to have the same
//! dimensionality.

use std::fmt;

use crate::error::RegionError;
use crate::id::Coord;

/// An inclusive axis-aligned box in integer index space.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    lo: Coord,
    hi: Coord,
}

impl Region {
    /// Build a region from its low and high corners (both inclusive).
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::DimensionMismatch`] if the corners differ in
    /// length, or [`RegionError::ZeroDimensional`] if they are empty.
    pub fn new(lo: &[i32], hi: &[i32]) -> Result<Self, RegionError> {
        if lo.len() != hi.len() {
            return Err(RegionError::DimensionMismatch {
                lo: lo.len(),
                hi: hi.len(),
            });
        }
        if lo.is_empty() {
            return Err(RegionError::ZeroDimensional);
        }
        Ok(Self {
            lo: Coord::from_slice(lo),
            hi: Coord::from_slice(hi),
        })
    }

    /// Number of axes.
    pub fn dim(&self) -> usize {
        self.lo.len()
    }

    /// Low corner (inclusive).
    pub fn lo(&self) -> &[i32] {
        &self.lo
    }

    /// High corner (inclusive).
    pub fn hi(&self) -> &[i32] {
        &self.hi
    }

    /// Whether the region contains no points.
    pub fn is_empty(&self) -> bool {
        self.lo.iter().zip(&self.hi).any(|(l, h)| h < l)
    }

    /// Extent along each axis; all zeros for an empty region.
    pub fn shape(&self) -> Coord {
        if self.is_empty() {
            return Coord::from_elem(0, self.dim());
        }
        self.lo.iter().zip(&self.hi).map(|(l, h)| h - l + 1).collect()
    }

    /// Number of points in the region.
    pub fn num_pts(&self) -> usize {
        self.shape().iter().map(|&n| n as usize).product()
    }

    /// Whether `self` and `other` have the same extent on every axis.
    pub fn same_shape(&self, other: &Region) -> bool {
        self.shape() == other.shape()
    }

    /// Whether the two regions share at least one point.
    ///
    /// # Panics
    ///
    /// Panics if the regions differ in dimensionality.
    pub fn intersects(&self, other: &Region) -> bool {
        self.check_dim(other);
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (0..self.dim()).all(|d| self.lo[d] <= other.hi[d] && other.lo[d] <= self.hi[d])
    }

    /// The overlap of the two regions, or `None` if they are disjoint.
    ///
    /// # Panics
    ///
    /// Panics if the regions differ in dimensionality.
    pub fn intersection(&self, other: &Region) -> Option<Region> {
        if !self.intersects(other) {
            return None;
        }
        let lo = (0..self.dim()).map(|d| self.lo[d].max(other.lo[d])).collect();
        let hi = (0..self.dim()).map(|d| self.hi[d].min(other.hi[d])).collect();
        Some(Region { lo, hi })
    }

    /// Whether `point` lies inside the region.
    pub fn contains(&self, point: &[i32]) -> bool {
        point.len() == self.dim()
            && (0..self.dim()).all(|d| self.lo[d] <= point[d] && point[d] <= self.hi[d])
    }

    /// Whether every point of `other` lies inside `self`.
    ///
    /// An empty `other` is contained in anything of the same dimension.
    pub fn contains_region(&self, other: &Region) -> bool {
        self.check_dim(other);
        if other.is_empty() {
            return true;
        }
        self.contains(&other.lo) && self.contains(&other.hi)
    }

    /// The region translated by `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` has the wrong number of axes.
    pub fn shift(&self, offset: &[i32]) -> Region {
        assert_eq!(offset.len(), self.dim(), "shift offset dimension mismatch");
        Region {
            lo: self.lo.iter().zip(offset).map(|(l, o)| l + o).collect(),
            hi: self.hi.iter().zip(offset).map(|(h, o)| h + o).collect(),
        }
    }

    /// The region grown by `n` cells on every face (`n < 0` shrinks).
    pub fn grow(&self, n: i32) -> Region {
        Region {
            lo: self.lo.iter().map(|l| l - n).collect(),
            hi: self.hi.iter().map(|h| h + n).collect(),
        }
    }

    /// Linear offset of `point` within the region, first axis fastest.
    ///
    /// Returns `None` if the point lies outside.
    pub fn offset_of(&self, point: &[i32]) -> Option<usize> {
        if !self.contains(point) {
            return None;
        }
        let mut offset = 0usize;
        let mut stride = 1usize;
        for d in 0..self.dim() {
            offset += (point[d] - self.lo[d]) as usize * stride;
            stride *= (self.hi[d] - self.lo[d] + 1) as usize;
        }
        Some(offset)
    }

    /// Iterate over every point, first axis fastest.
    pub fn points(&self) -> Points<'_> {
        Points {
            region: self,
            next: if self.is_empty() {
                None
            } else {
                Some(self.lo.clone())
            },
        }
    }

    fn check_dim(&self, other: &Region) {
        assert_eq!(
            self.dim(),
            other.dim(),
            "region dimension mismatch: {self} vs {other}"
        );
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |c: &Coord| {
            c.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        write!(f, "[({})-({})]", join(&self.lo), join(&self.hi))
    }
}

/// Iterator over the points of a [`Region`], first axis fastest.
pub struct Points<'a> {
    region: &'a Region,
    next: Option<Coord>,
}

impl Iterator for Points<'_> {
    type Item = Coord;

    fn next(&mut self) -> Option<Coord> {
        let current = self.next.take()?;
        let mut following = current.clone();
        for d in 0..following.len() {
            if following[d] < self.region.hi[d] {
                following[d] += 1;
                self.next = Some(following);
                return Some(current);
            }
            following[d] = self.region.lo[d];
        }
        Some(current)
    }
}
