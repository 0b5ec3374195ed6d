//! The [`MultiFab`] distributed array.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use ferry_core::{ArrayId, Fab, GridIndex, Ownership, Rank, Region};

use crate::error::ArrayError;
use crate::layout::BoxLayout;

/// Shared handle to a [`MultiFab`].
///
/// Tasks keep an `ArrayRef` to each array they read or write. Every clone
/// refers to the same storage and reports the same [`ArrayId`].
pub type ArrayRef = Rc<MultiFab>;

/// A distributed array: one buffer per grid, stored only on the owner.
///
/// Each local grid's buffer covers the grid region grown by `n_grow` ghost
/// cells. Buffers sit behind a `RefCell` so that tasks holding shared
/// [`ArrayRef`]s can write into them; a task list is driven by a single
/// thread, so borrows never overlap across tasks.
pub struct MultiFab {
    id: ArrayId,
    layout: Arc<BoxLayout>,
    rank: Rank,
    n_comp: usize,
    n_grow: i32,
    fabs: Vec<Option<RefCell<Fab>>>,
}

impl MultiFab {
    /// Allocate zero-filled buffers for every grid `rank` owns.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayError::ZeroComponents`] if `n_comp` is zero.
    pub fn new(
        layout: Arc<BoxLayout>,
        rank: Rank,
        n_comp: usize,
        n_grow: u32,
    ) -> Result<Self, ArrayError> {
        if n_comp == 0 {
            return Err(ArrayError::ZeroComponents);
        }
        let n_grow = n_grow as i32;
        let fabs = (0..layout.n_grids())
            .map(GridIndex)
            .map(|g| {
                (layout.owner(g) == rank)
                    .then(|| RefCell::new(Fab::new(layout.grid(g).grow(n_grow), n_comp)))
            })
            .collect();
        Ok(Self {
            id: ArrayId::next(),
            layout,
            rank,
            n_comp,
            n_grow,
            fabs,
        })
    }

    /// Allocate and wrap in a shared [`ArrayRef`].
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new).
    pub fn shared(
        layout: Arc<BoxLayout>,
        rank: Rank,
        n_comp: usize,
        n_grow: u32,
    ) -> Result<ArrayRef, ArrayError> {
        Self::new(layout, rank, n_comp, n_grow).map(Rc::new)
    }

    /// Identity used for hazard detection.
    pub fn id(&self) -> ArrayId {
        self.id
    }

    /// The grid layout.
    pub fn layout(&self) -> &Arc<BoxLayout> {
        &self.layout
    }

    /// Rank this array instance lives on.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Components per point.
    pub fn n_comp(&self) -> usize {
        self.n_comp
    }

    /// Ghost cells on each face of every grid.
    pub fn n_grow(&self) -> u32 {
        self.n_grow as u32
    }

    /// Region of `grid`'s buffer, including ghost cells.
    pub fn fab_region(&self, grid: GridIndex) -> Region {
        self.layout.grid(grid).grow(self.n_grow)
    }

    /// Borrow the buffer of a local grid.
    ///
    /// # Panics
    ///
    /// Panics if `grid` is not owned by this rank, or is already mutably
    /// borrowed.
    pub fn fab(&self, grid: GridIndex) -> Ref<'_, Fab> {
        self.cell(grid).borrow()
    }

    /// Mutably borrow the buffer of a local grid.
    ///
    /// # Panics
    ///
    /// Panics if `grid` is not owned by this rank, or is already borrowed.
    pub fn fab_mut(&self, grid: GridIndex) -> RefMut<'_, Fab> {
        self.cell(grid).borrow_mut()
    }

    /// Set every local value from `f(grid, point, comp)`, ghost cells included.
    pub fn fill_with(&self, mut f: impl FnMut(GridIndex, &[i32], usize) -> f64) {
        for (i, cell) in self.fabs.iter().enumerate() {
            let Some(cell) = cell else { continue };
            let mut fab = cell.borrow_mut();
            let region = fab.region().clone();
            for comp in 0..self.n_comp {
                for p in region.points() {
                    fab.set(&p, comp, f(GridIndex(i), &p, comp));
                }
            }
        }
    }

    /// Set every local value to `value`.
    pub fn set_val(&self, value: f64) {
        for cell in self.fabs.iter().flatten() {
            cell.borrow_mut().fill(value);
        }
    }

    fn cell(&self, grid: GridIndex) -> &RefCell<Fab> {
        self.fabs[grid.0].as_ref().unwrap_or_else(|| {
            panic!(
                "grid {grid} of array {} is owned by rank {}, not {}",
                self.id,
                self.layout.owner(grid),
                self.rank
            )
        })
    }
}

impl Ownership for MultiFab {
    fn n_grids(&self) -> usize {
        self.layout.n_grids()
    }

    fn owner(&self, grid: GridIndex) -> Rank {
        self.layout.owner(grid)
    }

    fn is_local(&self, grid: GridIndex) -> bool {
        self.layout.owner(grid) == self.rank
    }
}

impl fmt::Debug for MultiFab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiFab")
            .field("id", &self.id)
            .field("rank", &self.rank)
            .field("n_grids", &self.layout.n_grids())
            .field("n_comp", &self.n_comp)
            .field("n_grow", &self.n_grow)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Arc<BoxLayout> {
        let grids = vec![
            Region::new(&[0, 0], &[3, 3]).unwrap(),
            Region::new(&[4, 0], &[7, 3]).unwrap(),
        ];
        Arc::new(BoxLayout::round_robin(grids, 2).unwrap())
    }

    #[test]
    fn allocates_only_local_grids() {
        let mf = MultiFab::new(layout(), Rank(1), 2, 1).unwrap();
        assert!(!mf.is_local(GridIndex(0)));
        assert!(mf.is_local(GridIndex(1)));
        assert_eq!(mf.owner(GridIndex(0)), Rank(0));
        let fab = mf.fab(GridIndex(1));
        assert_eq!(fab.region(), &Region::new(&[3, -1], &[8, 4]).unwrap());
        assert_eq!(fab.n_comp(), 2);
    }

    #[test]
    #[should_panic(expected = "owned by rank 0")]
    fn remote_fab_access_panics() {
        let mf = MultiFab::new(layout(), Rank(1), 1, 0).unwrap();
        let _ = mf.fab(GridIndex(0));
    }

    #[test]
    fn shared_clones_keep_identity() {
        let a = MultiFab::shared(layout(), Rank(0), 1, 0).unwrap();
        let b = Rc::clone(&a);
        let c = MultiFab::shared(layout(), Rank(0), 1, 0).unwrap();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn fill_with_covers_ghost_cells() {
        let mf = MultiFab::new(layout(), Rank(0), 1, 1).unwrap();
        mf.fill_with(|g, p, _| (g.0 * 100) as f64 + p[0] as f64);
        assert_eq!(mf.fab(GridIndex(0)).get(&[-1, -1], 0), -1.0);
        mf.set_val(3.0);
        assert_eq!(mf.fab(GridIndex(0)).get(&[4, 4], 0), 3.0);
    }

    #[test]
    fn zero_components_rejected() {
        assert_eq!(
            MultiFab::new(layout(), Rank(0), 0, 0).unwrap_err(),
            ArrayError::ZeroComponents
        );
    }
}
