//! Overlap-based dependency derivation.
//!
//! Every copy-family task declares a [`Footprint`]: the `(array, grid,
//! region)` triples it reads or writes. Two footprints conflict when any
//! access of one and any access of the other name the same array identity
//! and the same grid, and their regions intersect. Reads are not
//! distinguished from writes, so a conflict covers the src↔src, src↔dst,
//! dst↔src and dst↔dst pairings alike. The serialization this yields is
//! conservative: a spurious conflict only costs ordering, never data.
//!
//! Arrays are compared by [`ArrayId`]; two distinct arrays that happen to
//! share storage are not detected.

use smallvec::SmallVec;

use ferry_core::{ArrayId, GridIndex, Region};

/// One region of one grid of one array touched by a task, read or
/// written.
#[derive(Clone, Copy, Debug)]
pub struct Access<'a> {
    /// Identity of the array.
    pub array: ArrayId,
    /// Grid within the array.
    pub grid: GridIndex,
    /// Region within the grid.
    pub region: &'a Region,
}

impl Access<'_> {
    /// Whether the two accesses touch a common point of the same grid of
    /// the same array.
    pub fn overlaps(&self, other: &Access<'_>) -> bool {
        self.array == other.array
            && self.grid == other.grid
            && self.region.dim() == other.region.dim()
            && self.region.intersects(other.region)
    }
}

/// All accesses of one task.
pub type Footprint<'a> = SmallVec<[Access<'a>; 2]>;

/// Whether any access in `a` overlaps any access in `b`.
pub fn conflicts(a: &[Access<'_>], b: &[Access<'_>]) -> bool {
    a.iter().any(|x| b.iter().any(|y| x.overlaps(y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(lo: &[i32], hi: &[i32]) -> Region {
        Region::new(lo, hi).unwrap()
    }

    #[test]
    fn same_array_same_grid_overlap_conflicts() {
        let a = ArrayId::next();
        let r1 = r(&[0, 0], &[3, 3]);
        let r2 = r(&[3, 3], &[5, 5]);
        let x = Access { array: a, grid: GridIndex(0), region: &r1 };
        let y = Access { array: a, grid: GridIndex(0), region: &r2 };
        assert!(x.overlaps(&y));
        assert!(conflicts(&[x], &[y]));
    }

    #[test]
    fn different_grid_or_array_never_conflicts() {
        let a = ArrayId::next();
        let b = ArrayId::next();
        let r1 = r(&[0, 0], &[3, 3]);
        let x = Access { array: a, grid: GridIndex(0), region: &r1 };
        let other_grid = Access { array: a, grid: GridIndex(1), region: &r1 };
        let other_array = Access { array: b, grid: GridIndex(0), region: &r1 };
        assert!(!x.overlaps(&other_grid));
        assert!(!x.overlaps(&other_array));
    }

    #[test]
    fn disjoint_regions_do_not_conflict() {
        let a = ArrayId::next();
        let r1 = r(&[0, 0], &[3, 3]);
        let r2 = r(&[4, 0], &[7, 3]);
        let x = Access { array: a, grid: GridIndex(0), region: &r1 };
        let y = Access { array: a, grid: GridIndex(0), region: &r2 };
        assert!(!conflicts(&[x], &[y]));
    }
}
