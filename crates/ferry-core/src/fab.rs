//! Dense multi-component buffers over a [`Region`].
//!
//! A [`Fab`] stores `n_comp` values for every point of its region. Data
//! is laid out component-major: all points of component 0 (first axis
//! fastest), then component 1, and so on. The layout is also the wire
//! format used when a buffer is handed to a [`Transport`](crate::Transport).

use crate::region::Region;

/// A dense, multi-component array of `f64` covering one region.
#[derive(Clone, Debug, PartialEq)]
pub struct Fab {
    region: Region,
    n_comp: usize,
    data: Vec<f64>,
}

impl Fab {
    /// Allocate a zero-filled buffer.
    ///
    /// # Panics
    ///
    /// Panics if `n_comp` is zero.
    pub fn new(region: Region, n_comp: usize) -> Self {
        assert!(n_comp > 0, "a Fab needs at least one component");
        let len = region.num_pts() * n_comp;
        Self {
            region,
            n_comp,
            data: vec![0.0; len],
        }
    }

    /// Allocate a buffer whose values are produced by `f(point, comp)`.
    pub fn from_fn(region: Region, n_comp: usize, mut f: impl FnMut(&[i32], usize) -> f64) -> Self {
        let mut fab = Self::new(region, n_comp);
        let npts = fab.region.num_pts();
        for comp in 0..n_comp {
            for (i, p) in fab.region.points().enumerate() {
                fab.data[comp * npts + i] = f(&p, comp);
            }
        }
        fab
    }

    /// The region covered by this buffer.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Number of components per point.
    pub fn n_comp(&self) -> usize {
        self.n_comp
    }

    /// Total number of stored values (`num_pts * n_comp`).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer stores no values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw values in component-major order.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable raw values in component-major order.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Value at `point` for component `comp`.
    ///
    /// # Panics
    ///
    /// Panics if the point lies outside the region or `comp` is out of range.
    pub fn get(&self, point: &[i32], comp: usize) -> f64 {
        self.data[self.index(point, comp)]
    }

    /// Store `value` at `point` for component `comp`.
    ///
    /// # Panics
    ///
    /// Panics if the point lies outside the region or `comp` is out of range.
    pub fn set(&mut self, point: &[i32], comp: usize, value: f64) {
        let i = self.index(point, comp);
        self.data[i] = value;
    }

    /// Set every value to `value`.
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Copy all components of `src` over `src_region` into `dst_region` of
    /// `self`. The two regions must have the same shape; they may differ by
    /// an offset.
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ, the component counts differ, or either
    /// region is not contained in its buffer.
    pub fn copy_from(&mut self, src: &Fab, src_region: &Region, dst_region: &Region) {
        assert!(
            src_region.same_shape(dst_region),
            "copy shape mismatch: {src_region} ({} points) vs {dst_region} ({} points)",
            src_region.num_pts(),
            dst_region.num_pts(),
        );
        assert_eq!(self.n_comp, src.n_comp, "copy component count mismatch");
        assert!(
            src.region.contains_region(src_region),
            "source region {src_region} outside buffer {}",
            src.region
        );
        assert!(
            self.region.contains_region(dst_region),
            "destination region {dst_region} outside buffer {}",
            self.region
        );
        let src_npts = src.region.num_pts();
        let dst_npts = self.region.num_pts();
        for (sp, dp) in src_region.points().zip(dst_region.points()) {
            let (Some(si), Some(di)) = (src.region.offset_of(&sp), self.region.offset_of(&dp))
            else {
                unreachable!("points of a contained region lie inside the buffer");
            };
            for comp in 0..self.n_comp {
                self.data[comp * dst_npts + di] = src.data[comp * src_npts + si];
            }
        }
    }

    /// A fresh buffer holding a copy of `region` of this buffer.
    ///
    /// # Panics
    ///
    /// Panics if `region` is not contained in this buffer.
    pub fn extract(&self, region: &Region) -> Fab {
        self.extract_components(region, self.n_comp)
    }

    /// A fresh buffer holding components `0..n_comp` of `region`.
    ///
    /// # Panics
    ///
    /// Panics if `region` is not contained in this buffer, or `n_comp` is
    /// zero or exceeds the stored component count.
    pub fn extract_components(&self, region: &Region, n_comp: usize) -> Fab {
        assert!(
            n_comp <= self.n_comp,
            "requested {n_comp} components from a buffer holding {}",
            self.n_comp
        );
        assert!(
            self.region.contains_region(region),
            "source region {region} outside buffer {}",
            self.region
        );
        let mut out = Fab::new(region.clone(), n_comp);
        let src_npts = self.region.num_pts();
        let out_npts = region.num_pts();
        for (i, p) in region.points().enumerate() {
            let Some(si) = self.region.offset_of(&p) else {
                unreachable!("points of a contained region lie inside the buffer");
            };
            for comp in 0..n_comp {
                out.data[comp * out_npts + i] = self.data[comp * src_npts + si];
            }
        }
        out
    }

    fn index(&self, point: &[i32], comp: usize) -> usize {
        assert!(comp < self.n_comp, "component {comp} out of range");
        let offset = self
            .region
            .offset_of(point)
            .unwrap_or_else(|| panic!("point {point:?} outside {}", self.region));
        comp * self.region.num_pts() + offset
    }
}
