//! Array construction errors.

use thiserror::Error;

/// Errors detected while building a [`BoxLayout`](crate::BoxLayout) or
/// [`MultiFab`](crate::MultiFab).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArrayError {
    /// The layout has no grids.
    #[error("layout has no grids")]
    EmptyLayout,
    /// Grid and owner lists differ in length.
    #[error("{grids} grids but {owners} owners")]
    OwnerCountMismatch {
        /// Number of grid regions supplied.
        grids: usize,
        /// Number of owner ranks supplied.
        owners: usize,
    },
    /// A grid's dimensionality differs from grid 0.
    #[error("grid {grid} has {found} axes, expected {expected}")]
    MixedDimensions {
        /// Index of the offending grid.
        grid: usize,
        /// Axes of grid 0.
        expected: usize,
        /// Axes of the offending grid.
        found: usize,
    },
    /// A grid region is empty.
    #[error("grid {grid} is empty")]
    EmptyGrid {
        /// Index of the offending grid.
        grid: usize,
    },
    /// Round-robin assignment over zero ranks.
    #[error("cannot distribute grids over zero ranks")]
    NoRanks,
    /// An array needs at least one component.
    #[error("component count must be at least 1")]
    ZeroComponents,
}
