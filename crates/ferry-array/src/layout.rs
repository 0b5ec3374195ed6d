//! Grid layouts: which region each grid covers and which rank owns it.

use ferry_core::{GridIndex, Rank, Region};

use crate::error::ArrayError;

/// Partition of index space into grids, each owned by one rank.
///
/// Layouts are immutable once built and are shared between arrays via
/// `Arc`, so every rank can hold an identical copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoxLayout {
    grids: Vec<Region>,
    owners: Vec<Rank>,
}

impl BoxLayout {
    /// Build a layout from explicit grid regions and owners.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the lists are empty or differ in length, or if a
    /// grid is empty or has a different dimensionality from grid 0.
    pub fn new(grids: Vec<Region>, owners: Vec<Rank>) -> Result<Self, ArrayError> {
        if grids.is_empty() {
            return Err(ArrayError::EmptyLayout);
        }
        if grids.len() != owners.len() {
            return Err(ArrayError::OwnerCountMismatch {
                grids: grids.len(),
                owners: owners.len(),
            });
        }
        let expected = grids[0].dim();
        for (grid, region) in grids.iter().enumerate() {
            if region.dim() != expected {
                return Err(ArrayError::MixedDimensions {
                    grid,
                    expected,
                    found: region.dim(),
                });
            }
            if region.is_empty() {
                return Err(ArrayError::EmptyGrid { grid });
            }
        }
        Ok(Self { grids, owners })
    }

    /// Build a layout assigning grid `i` to rank `i % n_ranks`.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new), plus [`ArrayError::NoRanks`] for zero ranks.
    pub fn round_robin(grids: Vec<Region>, n_ranks: usize) -> Result<Self, ArrayError> {
        if n_ranks == 0 {
            return Err(ArrayError::NoRanks);
        }
        let owners = (0..grids.len()).map(|i| Rank(i % n_ranks)).collect();
        Self::new(grids, owners)
    }

    /// Number of grids.
    pub fn n_grids(&self) -> usize {
        self.grids.len()
    }

    /// Number of axes shared by every grid.
    pub fn dim(&self) -> usize {
        self.grids[0].dim()
    }

    /// Region covered by `grid` (without ghost cells).
    ///
    /// # Panics
    ///
    /// Panics if `grid` is out of range.
    pub fn grid(&self, grid: GridIndex) -> &Region {
        &self.grids[grid.0]
    }

    /// Rank owning `grid`.
    ///
    /// # Panics
    ///
    /// Panics if `grid` is out of range.
    pub fn owner(&self, grid: GridIndex) -> Rank {
        self.owners[grid.0]
    }

    /// Grids owned by `rank`, in index order.
    pub fn owned_by(&self, rank: Rank) -> impl Iterator<Item = GridIndex> + '_ {
        self.owners
            .iter()
            .enumerate()
            .filter(move |(_, owner)| **owner == rank)
            .map(|(i, _)| GridIndex(i))
    }

    /// Grids whose region intersects `region`, in index order.
    pub fn intersecting<'a>(&'a self, region: &'a Region) -> impl Iterator<Item = GridIndex> + 'a {
        self.grids
            .iter()
            .enumerate()
            .filter(move |(_, g)| g.intersects(region))
            .map(|(i, _)| GridIndex(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn r(lo: &[i32], hi: &[i32]) -> Region {
        Region::new(lo, hi).unwrap()
    }

    #[test]
    fn round_robin_assigns_owners() {
        let layout = BoxLayout::round_robin(
            vec![r(&[0], &[3]), r(&[4], &[7]), r(&[8], &[11])],
            2,
        )
        .unwrap();
        assert_eq!(layout.owner(GridIndex(0)), Rank(0));
        assert_eq!(layout.owner(GridIndex(1)), Rank(1));
        assert_eq!(layout.owner(GridIndex(2)), Rank(0));
        let owned: Vec<_> = layout.owned_by(Rank(0)).collect();
        assert_eq!(owned, vec![GridIndex(0), GridIndex(2)]);
    }

    #[test]
    fn rejects_malformed_layouts() {
        assert_eq!(BoxLayout::new(vec![], vec![]), Err(ArrayError::EmptyLayout));
        assert_eq!(
            BoxLayout::new(vec![r(&[0], &[1])], vec![]),
            Err(ArrayError::OwnerCountMismatch { grids: 1, owners: 0 })
        );
        assert_eq!(
            BoxLayout::new(vec![r(&[0], &[1]), r(&[0, 0], &[1, 1])], vec![Rank(0), Rank(0)]),
            Err(ArrayError::MixedDimensions {
                grid: 1,
                expected: 1,
                found: 2
            })
        );
        assert_eq!(
            BoxLayout::new(vec![r(&[2], &[1])], vec![Rank(0)]),
            Err(ArrayError::EmptyGrid { grid: 0 })
        );
        assert_eq!(
            BoxLayout::round_robin(vec![r(&[0], &[1])], 0),
            Err(ArrayError::NoRanks)
        );
    }

    #[test]
    fn intersecting_finds_overlaps() {
        let layout =
            BoxLayout::round_robin(vec![r(&[0], &[3]), r(&[4], &[7]), r(&[8], &[11])], 1).unwrap();
        let hits: Vec<_> = layout.intersecting(&r(&[3], &[8])).collect();
        assert_eq!(hits, vec![GridIndex(0), GridIndex(1), GridIndex(2)]);
        let hits: Vec<_> = layout.intersecting(&r(&[5], &[6])).collect();
        assert_eq!(hits, vec![GridIndex(1)]);
    }

    fn arb_box() -> impl Strategy<Value = Region> {
        (-6i32..6, -6i32..6, 0i32..4, 0i32..4)
            .prop_map(|(x, y, w, h)| r(&[x, y], &[x + w, y + h]))
    }

    proptest! {
        #[test]
        fn intersecting_matches_point_scan(
            grids in prop::collection::vec(arb_box(), 1..8),
            query in arb_box(),
        ) {
            let expected: Vec<GridIndex> = grids
                .iter()
                .enumerate()
                .filter(|(_, g)| g.points().any(|p| query.contains(&p)))
                .map(|(i, _)| GridIndex(i))
                .collect();
            let layout = BoxLayout::round_robin(grids, 3).unwrap();
            let hits: Vec<GridIndex> = layout.intersecting(&query).collect();
            prop_assert_eq!(hits, expected);
        }
    }
}
