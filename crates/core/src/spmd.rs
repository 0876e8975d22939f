//! Thread-per-partition SPMD harness.
//!
//! Stands in for an MPI-style launch environment: every partition runs
//! the same body on its own thread, in lockstep through the collective
//! calls of its [`ChannelRing`] endpoint. Used by the scenario tests
//! and the headless demo; a production embedding would instead wire a
//! [`crate::exchange::RingTransport`] over its own fabric.
//!
//! A partition that fails mid-step surfaces its error after all
//! threads finish; peers stuck waiting on it are released by their
//! receive timeouts. A peer parked on a barrier has no timeout and
//! blocks the run — the known limitation of the base design.

use std::thread;
use std::time::Duration;

use crate::error::ConvResult;
use crate::exchange::ChannelRing;

/// Run `size` partitions in lockstep, one thread each.
///
/// `init` builds the partition-local state for each rank on the
/// spawning thread; `body` runs on the partition thread with the
/// rank's ring endpoint and returns its result. Results come back
/// ordered by rank; the lowest-ranked error wins if any partition
/// fails.
///
/// # Errors
///
/// Propagates the first error returned by any partition body.
///
/// # Panics
///
/// Re-raises panics from partition threads.
pub fn run_partitions<S, R, I, B>(
    size: usize,
    timeout: Duration,
    init: I,
    body: B,
) -> ConvResult<Vec<R>>
where
    S: Send,
    R: Send,
    I: Fn(usize) -> S,
    B: Fn(usize, S, &ChannelRing) -> ConvResult<R> + Send + Sync,
{
    let endpoints = ChannelRing::ring(size, timeout);
    let mut results: Vec<ConvResult<R>> = Vec::with_capacity(size);

    thread::scope(|scope| {
        let body = &body;
        let handles: Vec<_> = endpoints
            .into_iter()
            .enumerate()
            .map(|(rank, endpoint)| {
                let state = init(rank);
                scope.spawn(move || body(rank, state, &endpoint))
            })
            .collect();
        results = handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect();
    });

    results.into_iter().collect()
}
