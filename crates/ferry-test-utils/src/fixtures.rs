//! Layout and array fixtures.
//!
//! Arrays are filled with [`coord_value`], a function of the array tag, the
//! point and the component only. Any rank can therefore compute what a
//! remote grid holds without communicating.

use std::sync::Arc;

use ferry_array::{ArrayRef, BoxLayout, MultiFab};
use ferry_core::{Rank, Region};

/// Shorthand for a region that is known to be valid.
pub fn region(lo: &[i32], hi: &[i32]) -> Region {
    Region::new(lo, hi).unwrap_or_else(|e| panic!("bad fixture region: {e}"))
}

/// `n` grids of `width`×`height` points laid side by side along the first
/// axis: grid `i` covers `[i*width, (i+1)*width - 1] × [0, height - 1]`.
pub fn strip(n: usize, width: i32, height: i32) -> Vec<Region> {
    (0..n as i32)
        .map(|i| region(&[i * width, 0], &[(i + 1) * width - 1, height - 1]))
        .collect()
}

/// Round-robin layout of `grids` over `n_ranks`.
pub fn layout(grids: Vec<Region>, n_ranks: usize) -> Arc<BoxLayout> {
    Arc::new(
        BoxLayout::round_robin(grids, n_ranks)
            .unwrap_or_else(|e| panic!("bad fixture layout: {e}")),
    )
}

/// A zero-filled array on `rank`.
pub fn array(layout: &Arc<BoxLayout>, rank: Rank, n_comp: usize, n_grow: u32) -> ArrayRef {
    MultiFab::shared(Arc::clone(layout), rank, n_comp, n_grow)
        .unwrap_or_else(|e| panic!("bad fixture array: {e}"))
}

/// A single-rank array with one `size`×`size` grid at the origin.
pub fn square(size: i32, n_comp: usize) -> ArrayRef {
    let layout = layout(vec![region(&[0, 0], &[size - 1, size - 1])], 1);
    array(&layout, Rank(0), n_comp, 0)
}

/// Deterministic value for `point` and `comp` of the array tagged `tag`.
pub fn coord_value(tag: u32, point: &[i32], comp: usize) -> f64 {
    let mut v = f64::from(tag) * 1.0e6 + comp as f64 * 1.0e4;
    let mut scale = 1.0;
    for &x in point {
        v += f64::from(x) * scale;
        scale *= 100.0;
    }
    v
}

/// Fill every local grid of `array` (ghost cells included) with
/// [`coord_value`] for `tag`.
pub fn fill_coords(array: &ArrayRef, tag: u32) {
    array.fill_with(|_, p, c| coord_value(tag, p, c));
}
