//! Workload builders for benchmarking the Ferry scheduler.
//!
//! - [`halo_strip`]: a single-rank strip of grids with one ghost layer
//! - [`queue_halo_exchange`]: ghost-column copies between neighbouring grids
//! - [`queue_overlapping_copies`]: a chain of copies whose footprints overlap,
//!   so every submission pays for hazard derivation

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use ferry_array::{ArrayRef, BoxLayout, MultiFab};
use ferry_core::{GridIndex, Rank, Region, Transport};
use ferry_engine::TaskList;

/// Build a single-rank array of `n_grids` grids, each `width`×`height`,
/// laid side by side along the first axis with one ghost layer.
///
/// Interior points hold their flat index along the strip; ghost points
/// hold `-1.0` until an exchange fills them.
pub fn halo_strip(n_grids: usize, width: i32, height: i32) -> ArrayRef {
    let grids: Vec<Region> = (0..n_grids as i32)
        .map(|i| Region::new(&[i * width, 0], &[(i + 1) * width - 1, height - 1]).unwrap())
        .collect();
    let layout = Arc::new(BoxLayout::round_robin(grids, 1).unwrap());
    let array = MultiFab::shared(Arc::clone(&layout), Rank(0), 1, 1).unwrap();
    array.fill_with(|g, p, _| {
        if layout.grid(g).contains(p) {
            f64::from(p[1] * width * n_grids as i32 + p[0])
        } else {
            -1.0
        }
    });
    array
}

/// Queue the east and west ghost-column copies between every pair of
/// neighbouring grids of a [`halo_strip`]. Returns the number of copies.
pub fn queue_halo_exchange<T: Transport>(list: &mut TaskList<T>, array: &ArrayRef) -> usize {
    let layout = Arc::clone(array.layout());
    let mut queued = 0;
    for i in 1..layout.n_grids() {
        let (west, east) = (GridIndex(i - 1), GridIndex(i));
        let boundary = layout.grid(east).lo()[0];
        let height = layout.grid(east).hi()[1];
        let east_ghost = Region::new(&[boundary, 0], &[boundary, height]).unwrap();
        let west_ghost = Region::new(&[boundary - 1, 0], &[boundary - 1, height]).unwrap();
        list.add_copy(array.clone(), west, east_ghost.clone(), array.clone(), east, east_ghost);
        list.add_copy(array.clone(), east, west_ghost.clone(), array.clone(), west, west_ghost);
        queued += 2;
    }
    queued
}

/// Queue `n` copies cycling through `arrays`, each moving a `window`-wide
/// square one point along the diagonal. Consecutive copies share an
/// array and overlap, so each one depends on its predecessor.
///
/// All arrays must be single-grid, single-component and at least
/// `window + 1` points on a side.
pub fn queue_overlapping_copies<T: Transport>(
    list: &mut TaskList<T>,
    arrays: &[ArrayRef],
    n: usize,
    window: i32,
) {
    let g = GridIndex(0);
    let src = Region::new(&[0, 0], &[window - 1, window - 1]).unwrap();
    let dst = src.shift(&[1, 1]);
    for k in 0..n {
        let from = &arrays[k % arrays.len()];
        let to = &arrays[(k + 1) % arrays.len()];
        list.add_copy(to.clone(), g, dst.clone(), from.clone(), g, src.clone());
    }
}
