//! Remote fetches and fetch aggregates.
//!
//! A [`RemoteFetch`] materializes a region of one grid on a requesting
//! rank. The requester owns the result through a [`FetchResult`]; the
//! grid's owner only sends. When the requester owns the grid itself the
//! result is filled at construction, so owning-side code reads local and
//! remote fetches the same way.
//!
//! A [`FetchAggregate`] joins every fetch gathered for one target grid.
//! Fetches are added through
//! [`TaskList::push_fetch`](crate::TaskList::push_fetch), which makes the
//! aggregate depend on each of them; the aggregate is therefore ready only
//! after all of them have finished, and its optional reducer sees every
//! result populated.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use ferry_array::ArrayRef;
use ferry_core::{Fab, GridIndex, Ownership, Rank, Region, SeqNo, Transport};

use crate::copy::{check_inside, Transfer};
use crate::error::ExecError;
use crate::handle::TaskHandle;
use crate::task::{check_completion, Locality};

// ── FetchResult ─────────────────────────────────────────────────

/// Shared slot receiving the data of a [`RemoteFetch`].
///
/// Clones refer to the same slot. The slot is empty until the fetch
/// finishes (or, for a local echo, from construction on).
#[derive(Clone, Debug, Default)]
pub struct FetchResult(Rc<RefCell<Option<Fab>>>);

impl FetchResult {
    /// Whether the data has arrived.
    pub fn is_ready(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// Borrow the fetched data.
    ///
    /// # Panics
    ///
    /// Panics if the fetch has not populated the slot yet.
    pub fn fab(&self) -> Ref<'_, Fab> {
        Ref::filter_map(self.0.borrow(), Option::as_ref)
            .unwrap_or_else(|_| panic!("fetch result read before it was populated"))
    }

    /// Move the fetched data out, leaving the slot empty.
    pub fn take(&self) -> Option<Fab> {
        self.0.borrow_mut().take()
    }

    fn publish(&self, fab: Fab) {
        let previous = self.0.borrow_mut().replace(fab);
        assert!(previous.is_none(), "fetch result populated twice");
    }
}

// ── RemoteFetch ─────────────────────────────────────────────────

/// Fetch components `0..n_comp` of `region` of a source grid onto
/// `target_rank`.
pub struct RemoteFetch {
    target_rank: Rank,
    src: ArrayRef,
    src_grid: GridIndex,
    region: Region,
    n_comp: usize,
    result: FetchResult,
    state: Transfer,
}

impl RemoteFetch {
    /// Describe a fetch. On the target rank, if it also owns the source
    /// grid, the result is populated immediately.
    ///
    /// # Panics
    ///
    /// Panics if `n_comp` is zero or exceeds the array's component count,
    /// or if `region` lies outside the source grid's buffer.
    pub fn new(
        target_rank: Rank,
        src: ArrayRef,
        src_grid: GridIndex,
        region: Region,
        n_comp: usize,
    ) -> Self {
        assert!(
            n_comp > 0 && n_comp <= src.n_comp(),
            "fetch of {n_comp} components from an array holding {}",
            src.n_comp()
        );
        check_inside(&src, src_grid, &region);
        let result = FetchResult::default();
        if src.rank() == target_rank && src.is_local(src_grid) {
            result.publish(src.fab(src_grid).extract_components(&region, n_comp));
        }
        Self {
            target_rank,
            src,
            src_grid,
            region,
            n_comp,
            result,
            state: Transfer::Idle,
        }
    }

    /// The rank receiving the data.
    pub fn target_rank(&self) -> Rank {
        self.target_rank
    }

    /// The fetched region.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Number of leading components fetched.
    pub fn n_comp(&self) -> usize {
        self.n_comp
    }

    /// Slot receiving the data; meaningful on the target rank only.
    pub fn result(&self) -> FetchResult {
        self.result.clone()
    }

    pub(crate) fn locality(&self) -> Locality {
        Locality::classify(
            self.src.rank() == self.target_rank,
            self.src.is_local(self.src_grid),
        )
    }

    pub(crate) fn startup(&mut self, seq: SeqNo, comm: &mut dyn Transport) -> Result<bool, ExecError> {
        self.state = match self.locality() {
            // Populated at construction.
            Locality::Local | Locality::Uninvolved => return Ok(false),
            Locality::Receive => {
                let buf = Fab::new(self.region.clone(), self.n_comp);
                let request = comm
                    .irecv(self.src.owner(self.src_grid), seq.tag(), buf.len())
                    .map_err(ExecError::transport(seq))?;
                Transfer::Receiving { request, buf }
            }
            Locality::Send => {
                let staged = self
                    .src
                    .fab(self.src_grid)
                    .extract_components(&self.region, self.n_comp);
                let request = comm
                    .isend(self.target_rank, seq.tag(), staged.as_slice())
                    .map_err(ExecError::transport(seq))?;
                Transfer::Sending {
                    request,
                    count: staged.len(),
                }
            }
        };
        Ok(true)
    }

    pub(crate) fn ready(&mut self, seq: SeqNo, comm: &mut dyn Transport) -> Result<bool, ExecError> {
        match &mut self.state {
            Transfer::Receiving { request, buf } => {
                let Some(status) = comm
                    .test(*request, buf.as_mut_slice())
                    .map_err(ExecError::transport(seq))?
                else {
                    return Ok(false);
                };
                check_completion(seq, &status, self.src.owner(self.src_grid), buf.len())?;
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
            Transfer::Idle | Transfer::Local => panic!("fetch {seq} polled before startup"),
            Transfer::Done => panic!("fetch {seq} polled while done"),
        }
        if let Transfer::Receiving { buf, .. } = std::mem::replace(&mut self.state, Transfer::Done) {
            self.result.publish(buf);
        }
        Ok(true)
    }
}

impl fmt::Display for RemoteFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rank {} <- array {} grid {} {} ({} comp)",
            self.target_rank,
            self.src.id(),
            self.src_grid,
            self.region,
            self.n_comp
        )
    }
}

// ── FetchAggregate ──────────────────────────────────────────────

type Reducer = Box<dyn FnOnce(&mut AggregateView<'_>)>;

/// Join over the fetches gathered for one grid of a target array.
///
/// The target grid's owner is the requesting rank for every fetch added
/// to the aggregate.
pub struct FetchAggregate {
    target: ArrayRef,
    grid: GridIndex,
    fetches: Vec<TaskHandle>,
    results: Vec<FetchResult>,
    reducer: Option<Reducer>,
}

impl FetchAggregate {
    /// An empty aggregate for `grid` of `target`.
    pub fn new(target: ArrayRef, grid: GridIndex) -> Self {
        Self {
            target,
            grid,
            fetches: Vec::new(),
            results: Vec::new(),
            reducer: None,
        }
    }

    /// Run `reduce` once when the aggregate becomes ready, on the rank
    /// owning the target grid only.
    pub fn with_reducer(mut self, reduce: impl FnOnce(&mut AggregateView<'_>) + 'static) -> Self {
        self.reducer = Some(Box::new(reduce));
        self
    }

    /// The target grid.
    pub fn grid_number(&self) -> GridIndex {
        self.grid
    }

    /// Whether the calling rank owns the target grid.
    pub fn is_local_target(&self) -> bool {
        self.target.is_local(self.grid)
    }

    /// The rank owning the target grid; every fetch delivers there.
    pub fn target_rank(&self) -> Rank {
        self.target.owner(self.grid)
    }

    /// Mutably borrow the target grid's buffer.
    ///
    /// # Panics
    ///
    /// Panics if the target grid is not owned by the calling rank.
    pub fn target_fab(&self) -> RefMut<'_, Fab> {
        assert!(
            self.is_local_target(),
            "aggregate target grid {} is not local",
            self.grid
        );
        self.target.fab_mut(self.grid)
    }

    /// Number of fetches added so far.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no fetch has been added.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Handles of the fetches, in the order they were added.
    pub fn fetches(&self) -> &[TaskHandle] {
        &self.fetches
    }

    /// Result slots of the fetches, in the order they were added.
    pub fn results(&self) -> &[FetchResult] {
        &self.results
    }

    pub(crate) fn record(&mut self, fetch: TaskHandle, result: FetchResult) {
        self.fetches.push(fetch);
        self.results.push(result);
    }

    pub(crate) fn ready(&mut self) -> Result<bool, ExecError> {
        if let Some(reduce) = self.reducer.take() {
            if self.is_local_target() {
                let mut view = AggregateView {
                    target: &self.target,
                    grid: self.grid,
                    results: &self.results,
                };
                reduce(&mut view);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for FetchAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "array {} grid {} <- {} fetches",
            self.target.id(),
            self.grid,
            self.results.len()
        )
    }
}

/// What an aggregate's reducer sees: every fetched buffer plus the target
/// grid.
pub struct AggregateView<'a> {
    target: &'a ArrayRef,
    grid: GridIndex,
    results: &'a [FetchResult],
}

impl AggregateView<'_> {
    /// Number of fetched buffers.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the aggregate gathered no fetch.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The target grid.
    pub fn grid_number(&self) -> GridIndex {
        self.grid
    }

    /// The `n`-th fetched buffer, in the order fetches were added.
    ///
    /// # Panics
    ///
    /// Panics if `n` is out of range.
    pub fn result(&self, n: usize) -> Ref<'_, Fab> {
        self.results[n].fab()
    }

    /// Mutably borrow the target grid's buffer.
    pub fn target_fab(&self) -> RefMut<'_, Fab> {
        self.target.fab_mut(self.grid)
    }
}
