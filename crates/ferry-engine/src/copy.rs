//! Region copies between distributed arrays and into private buffers.
//!
//! Both copy kinds classify themselves at `startup` by which endpoints the
//! calling rank owns:
//!
//! | dst local | src local | action                                          |
//! |-----------|-----------|-------------------------------------------------|
//! | yes       | yes       | memory copy, performed at the first `ready`     |
//! | yes       | no        | receive from the source owner into a staging buffer |
//! | no        | yes       | stage the source data and send to the destination |
//! | no        | no        | nothing; `startup` declines                     |
//!
//! Messages are tagged with the task's sequence number. Every rank builds
//! the same task list in the same order, so sender and receiver agree on
//! the tag without negotiation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use smallvec::smallvec;

use ferry_array::ArrayRef;
use ferry_core::{Fab, GridIndex, Ownership, Rank, Region, Request, SeqNo, Transport};

use crate::error::ExecError;
use crate::hazard::{Access, Footprint};
use crate::task::{check_completion, Locality};

/// A private buffer shared between a [`RegionCopyToLocal`] and the caller
/// that reads the result.
pub type LocalBuffer = Rc<RefCell<Fab>>;

/// Progress of a copy-family task.
pub(crate) enum Transfer {
    Idle,
    Local,
    Receiving { request: Request, buf: Fab },
    Sending { request: Request, count: usize },
    Done,
}

// ── RegionCopy ──────────────────────────────────────────────────

/// Copy `src_region` of a source grid into `dst_region` of a destination
/// grid. The regions have the same shape and may differ by an offset.
pub struct RegionCopy {
    dst: ArrayRef,
    dst_grid: GridIndex,
    dst_region: Region,
    src: ArrayRef,
    src_grid: GridIndex,
    src_region: Region,
    state: Transfer,
}

impl RegionCopy {
    /// Describe a copy. Nothing moves until the task list runs it.
    ///
    /// # Panics
    ///
    /// Panics if the regions differ in shape, the arrays differ in
    /// component count, or either region lies outside its grid's buffer
    /// (ghost cells included).
    pub fn new(
        dst: ArrayRef,
        dst_grid: GridIndex,
        dst_region: Region,
        src: ArrayRef,
        src_grid: GridIndex,
        src_region: Region,
    ) -> Self {
        assert!(
            dst_region.same_shape(&src_region),
            "copy shape mismatch: dst {dst_region} ({} points) vs src {src_region} ({} points)",
            dst_region.num_pts(),
            src_region.num_pts()
        );
        assert_eq!(
            dst.n_comp(),
            src.n_comp(),
            "copy between arrays with different component counts"
        );
        check_inside(&dst, dst_grid, &dst_region);
        check_inside(&src, src_grid, &src_region);
        Self {
            dst,
            dst_grid,
            dst_region,
            src,
            src_grid,
            src_region,
            state: Transfer::Idle,
        }
    }

    /// Copy `region` between two grids without an offset.
    ///
    /// # Panics
    ///
    /// As [`new`](Self::new).
    pub fn same_region(
        dst: ArrayRef,
        dst_grid: GridIndex,
        src: ArrayRef,
        src_grid: GridIndex,
        region: Region,
    ) -> Self {
        Self::new(dst, dst_grid, region.clone(), src, src_grid, region)
    }

    /// Destination grid.
    pub fn dst_grid(&self) -> GridIndex {
        self.dst_grid
    }

    /// Destination region.
    pub fn dst_region(&self) -> &Region {
        &self.dst_region
    }

    /// Source grid.
    pub fn src_grid(&self) -> GridIndex {
        self.src_grid
    }

    /// Source region.
    pub fn src_region(&self) -> &Region {
        &self.src_region
    }

    pub(crate) fn footprint(&self) -> Footprint<'_> {
        smallvec![
            Access {
                array: self.dst.id(),
                grid: self.dst_grid,
                region: &self.dst_region,
            },
            Access {
                array: self.src.id(),
                grid: self.src_grid,
                region: &self.src_region,
            },
        ]
    }

    pub(crate) fn locality(&self) -> Locality {
        Locality::classify(
            self.dst.is_local(self.dst_grid),
            self.src.is_local(self.src_grid),
        )
    }

    pub(crate) fn startup(&mut self, seq: SeqNo, comm: &mut dyn Transport) -> Result<bool, ExecError> {
        self.state = match self.locality() {
            Locality::Local => Transfer::Local,
            Locality::Receive => {
                let buf = Fab::new(self.src_region.clone(), self.src.n_comp());
                let request = comm
                    .irecv(self.src.owner(self.src_grid), seq.tag(), buf.len())
                    .map_err(ExecError::transport(seq))?;
                Transfer::Receiving { request, buf }
            }
            Locality::Send => {
                let staged = self.src.fab(self.src_grid).extract(&self.src_region);
                let request = comm
                    .isend(self.dst.owner(self.dst_grid), seq.tag(), staged.as_slice())
                    .map_err(ExecError::transport(seq))?;
                Transfer::Sending {
                    request,
                    count: staged.len(),
                }
            }
            Locality::Uninvolved => return Ok(false),
        };
        Ok(true)
    }

    pub(crate) fn ready(&mut self, seq: SeqNo, comm: &mut dyn Transport) -> Result<bool, ExecError> {
        match &mut self.state {
            Transfer::Local => {
                let staged = self.src.fab(self.src_grid).extract(&self.src_region);
                self.dst
                    .fab_mut(self.dst_grid)
                    .copy_from(&staged, &self.src_region, &self.dst_region);
            }
            Transfer::Receiving { request, buf } => {
                let Some(status) = comm
                    .test(*request, buf.as_mut_slice())
                    .map_err(ExecError::transport(seq))?
                else {
                    return Ok(false);
                };
                check_completion(seq, &status, self.src.owner(self.src_grid), buf.len())?;
                self.dst
                    .fab_mut(self.dst_grid)
                    .copy_from(buf, &self.src_region, &self.dst_region);
            }
            Transfer::Sending { request, count } => {
                let Some(status) = comm
                    .test(*request, &mut [])
                    .map_err(ExecError::transport(seq))?
                else {
                    return Ok(false);
                };
                check_completion(seq, &status, self.dst.owner(self.dst_grid), *count)?;
            }
            Transfer::Idle => panic!("copy {seq} polled before startup"),
            Transfer::Done => panic!("copy {seq} polled while done"),
        }
        self.state = Transfer::Done;
        Ok(true)
    }
}

impl fmt::Display for RegionCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "array {} grid {} {} <- array {} grid {} {}",
            self.dst.id(),
            self.dst_grid,
            self.dst_region,
            self.src.id(),
            self.src_grid,
            self.src_region
        )
    }
}

// ── RegionCopyToLocal ───────────────────────────────────────────

/// Copy a region of a source grid into a private buffer on `target_rank`.
///
/// The target rank passes `Some(buffer)`; every other rank passes `None`.
/// The owner of the source grid sends, the target receives, and a target
/// that owns the source grid copies in memory.
pub struct RegionCopyToLocal {
    dst: Option<LocalBuffer>,
    target_rank: Rank,
    region: Region,
    src: ArrayRef,
    src_grid: GridIndex,
    state: Transfer,
}

impl RegionCopyToLocal {
    /// Describe a copy into a private buffer.
    ///
    /// # Panics
    ///
    /// Panics if a buffer is supplied on a rank other than `target_rank`
    /// (or withheld on `target_rank`), if the buffer does not cover
    /// `region` or differs in component count, or if `region` lies outside
    /// the source grid's buffer.
    pub fn new(
        dst: Option<LocalBuffer>,
        target_rank: Rank,
        region: Region,
        src: ArrayRef,
        src_grid: GridIndex,
    ) -> Self {
        assert_eq!(
            dst.is_some(),
            src.rank() == target_rank,
            "the destination buffer must be supplied exactly on the target rank {target_rank}"
        );
        if let Some(buf) = &dst {
            let buf = buf.borrow();
            assert!(
                buf.region().contains_region(&region),
                "copy region {region} outside destination buffer {}",
                buf.region()
            );
            assert_eq!(
                buf.n_comp(),
                src.n_comp(),
                "destination buffer has a different component count"
            );
        }
        check_inside(&src, src_grid, &region);
        Self {
            dst,
            target_rank,
            region,
            src,
            src_grid,
            state: Transfer::Idle,
        }
    }

    /// The rank holding the destination buffer.
    pub fn target_rank(&self) -> Rank {
        self.target_rank
    }

    /// The copied region.
    pub fn region(&self) -> &Region {
        &self.region
    }

    pub(crate) fn footprint(&self) -> Footprint<'_> {
        smallvec![Access {
            array: self.src.id(),
            grid: self.src_grid,
            region: &self.region,
        }]
    }

    pub(crate) fn locality(&self) -> Locality {
        Locality::classify(self.dst.is_some(), self.src.is_local(self.src_grid))
    }

    pub(crate) fn startup(&mut self, seq: SeqNo, comm: &mut dyn Transport) -> Result<bool, ExecError> {
        self.state = match self.locality() {
            Locality::Local => Transfer::Local,
            Locality::Receive => {
                let buf = Fab::new(self.region.clone(), self.src.n_comp());
                let request = comm
                    .irecv(self.src.owner(self.src_grid), seq.tag(), buf.len())
                    .map_err(ExecError::transport(seq))?;
                Transfer::Receiving { request, buf }
            }
            Locality::Send => {
                let staged = self.src.fab(self.src_grid).extract(&self.region);
                let request = comm
                    .isend(self.target_rank, seq.tag(), staged.as_slice())
                    .map_err(ExecError::transport(seq))?;
                Transfer::Sending {
                    request,
                    count: staged.len(),
                }
            }
            Locality::Uninvolved => return Ok(false),
        };
        Ok(true)
    }

    pub(crate) fn ready(&mut self, seq: SeqNo, comm: &mut dyn Transport) -> Result<bool, ExecError> {
        match &mut self.state {
            Transfer::Local => {
                let staged = self.src.fab(self.src_grid).extract(&self.region);
                if let Some(dst) = &self.dst {
                    dst.borrow_mut().copy_from(&staged, &self.region, &self.region);
                }
            }
            Transfer::Receiving { request, buf } => {
                let Some(status) = comm
                    .test(*request, buf.as_mut_slice())
                    .map_err(ExecError::transport(seq))?
                else {
                    return Ok(false);
                };
                check_completion(seq, &status, self.src.owner(self.src_grid), buf.len())?;
                if let Some(dst) = &self.dst {
                    dst.borrow_mut().copy_from(buf, &self.region, &self.region);
                }
            }
            Transfer::Sending { request, count } => {
                let Some(status) = comm
                    .test(*request, &mut [])
                    .map_err(ExecError::transport(seq))?
                else {
                    return Ok(false);
                };
                check_completion(seq, &status, self.target_rank, *count)?;
            }
            Transfer::Idle => panic!("copy {seq} polled before startup"),
            Transfer::Done => panic!("copy {seq} polled while done"),
        }
        self.state = Transfer::Done;
        Ok(true)
    }
}

impl fmt::Display for RegionCopyToLocal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rank {} buffer {} <- array {} grid {}",
            self.target_rank,
            self.region,
            self.src.id(),
            self.src_grid
        )
    }
}

pub(crate) fn check_inside(array: &ArrayRef, grid: GridIndex, region: &Region) {
    let bounds = array.fab_region(grid);
    assert!(
        bounds.contains_region(region),
        "region {region} outside grid {grid} of array {} ({bounds})",
        array.id()
    );
}
