//! Copies, private-buffer copies and fetch aggregates across ranks.
//!
//! Every test runs one thread per rank. Each rank builds the same task list
//! in the same order against its own view of the arrays, then drains it.

use std::cell::RefCell;
use std::rc::Rc;

use ferry_core::{Fab, GridIndex, Rank, Transport};
use ferry_engine::{FetchAggregate, RegionCopy, RegionCopyToLocal, SchedulerConfig, TaskKind, TaskList};
use ferry_test_utils::fixtures::{array, coord_value, fill_coords, layout, region, strip};
use ferry_test_utils::{run_ranks, LaggyTransport};

const G0: GridIndex = GridIndex(0);
const G1: GridIndex = GridIndex(1);

#[test]
fn copy_between_grids_on_different_ranks() {
    // grid 0 on rank 0, grid 1 on rank 1; shift grid 0's data into grid 1.
    let results = run_ranks(2, |comm| {
        let rank = comm.rank();
        let layout = layout(strip(2, 4, 4), 2);
        let a = array(&layout, rank, 2, 0);
        let b = array(&layout, rank, 2, 0);
        fill_coords(&a, 1);

        let mut list = TaskList::with_transport(comm);
        list.add_copy(
            b.clone(),
            G1,
            region(&[4, 0], &[7, 3]),
            a.clone(),
            G0,
            region(&[0, 0], &[3, 3]),
        );
        let report = list.execute().unwrap();
        let received = (rank == Rank(1)).then(|| b.fab(G1).as_slice().to_vec());
        (report.metrics, received, list.transport().outstanding())
    });

    let (m0, none, out0) = &results[0];
    let (m1, received, out1) = &results[1];
    assert!(none.is_none());
    assert_eq!((m0.started, m1.started), (1, 1));
    assert_eq!((*out0, *out1), (0, 0));

    let received = received.as_ref().unwrap();
    let grid1 = region(&[4, 0], &[7, 3]);
    let expected = Fab::from_fn(grid1, 2, |p, c| coord_value(1, &[p[0] - 4, p[1]], c));
    assert_eq!(received.as_slice(), expected.as_slice());
}

#[test]
fn uninvolved_rank_declines_copy() {
    let results = run_ranks(3, |comm| {
        let rank = comm.rank();
        let layout = layout(strip(2, 4, 4), 2);
        let a = array(&layout, rank, 1, 0);
        fill_coords(&a, 1);
        let mut list = TaskList::with_transport(comm);
        let r = region(&[0, 0], &[3, 3]);
        list.add_task(TaskKind::Copy(RegionCopy::new(
            a.clone(),
            G1,
            region(&[4, 0], &[7, 3]),
            a.clone(),
            G0,
            r,
        )));
        list.execute().unwrap().metrics
    });
    assert_eq!(results[0].started, 1);
    assert_eq!(results[1].started, 1);
    assert_eq!(results[2].declined, 1);
    assert_eq!(results[2].started, 0);
}

#[test]
fn copy_to_local_buffer_on_another_rank() {
    let results = run_ranks(2, |comm| {
        let rank = comm.rank();
        let layout = layout(strip(2, 4, 4), 2);
        let a = array(&layout, rank, 1, 0);
        fill_coords(&a, 3);

        let r = region(&[1, 1], &[2, 3]);
        let buf = (rank == Rank(1)).then(|| Rc::new(RefCell::new(Fab::new(r.clone(), 1))));
        let mut list = TaskList::with_transport(comm);
        list.add_copy_to_local(RegionCopyToLocal::new(buf.clone(), Rank(1), r, a, G0));
        list.execute().unwrap();
        buf.map(|b| {
            let fab = b.borrow();
            fab.as_slice().to_vec()
        })
    });
    assert!(results[0].is_none());
    let expected = Fab::from_fn(region(&[1, 1], &[2, 3]), 1, |p, c| coord_value(3, p, c));
    assert_eq!(results[1].as_deref(), Some(expected.as_slice()));
}

#[test]
fn halo_exchange_fills_both_ghost_columns() {
    let results = run_ranks(2, |comm| {
        let rank = comm.rank();
        let layout = layout(strip(2, 4, 4), 2);
        let a = array(&layout, rank, 1, 1);
        a.fill_with(|g, p, c| {
            if layout.grid(g).contains(p) {
                coord_value(7, p, c)
            } else {
                f64::NAN
            }
        });
        let east = region(&[4, 0], &[4, 3]);
        let west = region(&[3, 0], &[3, 3]);
        let mut list = TaskList::with_transport(comm);
        list.add_copy(a.clone(), G0, east.clone(), a.clone(), G1, east.clone());
        list.add_copy(a.clone(), G1, west.clone(), a.clone(), G0, west.clone());
        list.execute().unwrap();

        let (grid, ghost) = if rank == Rank(0) { (G0, east) } else { (G1, west) };
        let fab = a.fab(grid);
        let filled = ghost.points().all(|p| fab.get(&p, 0) == coord_value(7, &p, 0));
        filled
    });
    assert_eq!(results, vec![true, true]);
}

#[test]
fn fetch_aggregate_gathers_local_and_remote_pieces() {
    // The target is grid 1 on rank 1. One piece comes from grid 0 on
    // rank 0, the other is a local echo of grid 1 itself.
    let results = run_ranks(2, |comm| {
        let rank = comm.rank();
        let layout = layout(strip(2, 4, 4), 2);
        let src = array(&layout, rank, 2, 0);
        let dst = array(&layout, rank, 1, 0);
        fill_coords(&src, 5);

        let mut list = TaskList::with_transport(comm);
        let agg = list.add_aggregate(FetchAggregate::new(dst.clone(), G1).with_reducer(|view| {
            let mut target = view.target_fab();
            for n in 0..view.len() {
                let piece = view.result(n);
                let total: f64 = piece.as_slice().iter().sum();
                target.set(&[4 + n as i32, 0], 0, total);
            }
        }));
        list.push_fetch(agg, src.clone(), G0, region(&[0, 0], &[1, 0]), 1);
        list.push_fetch(agg, src.clone(), G1, region(&[6, 2], &[6, 2]), 2);
        let results = list.aggregate_results(agg);
        let report = list.execute().unwrap();

        let pieces: Vec<Option<Vec<f64>>> = results
            .iter()
            .map(|r| r.is_ready().then(|| r.fab().as_slice().to_vec()))
            .collect();
        let sums = (rank == Rank(1)).then(|| {
            let fab = dst.fab(G1);
            vec![fab.get(&[4, 0], 0), fab.get(&[5, 0], 0)]
        });
        (pieces, sums, report.metrics.started, report.metrics.declined)
    });

    let (pieces0, sums0, started0, declined0) = &results[0];
    assert_eq!(pieces0, &vec![None, None]);
    assert!(sums0.is_none());
    // Rank 0 sends the first piece and runs the aggregate without a reducer.
    assert_eq!((*started0, *declined0), (2, 1));

    let (pieces1, sums1, started1, declined1) = &results[1];
    let first = vec![coord_value(5, &[0, 0], 0), coord_value(5, &[1, 0], 0)];
    let second = vec![coord_value(5, &[6, 2], 0), coord_value(5, &[6, 2], 1)];
    assert_eq!(pieces1, &vec![Some(first.clone()), Some(second.clone())]);
    assert_eq!(
        sums1.as_ref().unwrap(),
        &vec![first.iter().sum::<f64>(), second.iter().sum::<f64>()]
    );
    assert_eq!((*started1, *declined1), (2, 1));
}

#[test]
fn laggy_transport_never_exceeds_the_live_limit() {
    const LIMIT: usize = 4;
    for extra in [1, 5, 50] {
        let results = run_ranks(2, move |comm| {
            let rank = comm.rank();
            // 8x8 grids: 64 single-point copies, none overlapping another.
            let layout = layout(strip(2, 8, 8), 2);
            let a = array(&layout, rank, 1, 0);
            fill_coords(&a, 9);
            let config = SchedulerConfig::default().with_max_live_tasks(LIMIT);
            let mut list = TaskList::new(config, LaggyTransport::new(comm, 3)).unwrap();
            for k in 0..(LIMIT + extra) as i32 {
                let (x, y) = (k % 8, k / 8);
                list.add_copy(
                    a.clone(),
                    G1,
                    region(&[8 + x, y], &[8 + x, y]),
                    a.clone(),
                    G0,
                    region(&[x, y], &[x, y]),
                );
            }
            let report = list.execute().unwrap();
            let correct = rank != Rank(1) || {
                let fab = a.fab(G1);
                (0..(LIMIT + extra) as i32)
                    .all(|k| fab.get(&[8 + k % 8, k / 8], 0) == coord_value(9, &[k % 8, k / 8], 0))
            };
            let comm = list.into_transport();
            (report.metrics.peak_live, comm.max_outstanding(), comm.posted(), correct)
        });
        for (peak, max_outstanding, posted, correct) in results {
            assert_eq!(peak, LIMIT, "extra = {extra}");
            assert!(max_outstanding <= LIMIT, "extra = {extra}");
            assert_eq!(posted, LIMIT + extra);
            assert!(correct);
        }
    }
}
