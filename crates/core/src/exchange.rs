//! Neighbor exchange protocol over the partition ring.
//!
//! Partitions are enumerated `0..size` and wired into a ring: the left
//! neighbor of rank `r` is `(r - 1) mod size`, the right neighbor is
//! `(r + 1) mod size`. Each timestep every partition ships its local
//! active event records one hop in each direction, so that heating can
//! be evaluated near partition boundaries where a neighbor's event
//! reaches into local cells. The protocol assumes the influence radius
//! never spans more than one hop; the startup configuration check in
//! [`crate::params::ConvectionParams`] enforces that.
//!
//! The exchange runs in two phases, each bounded by a barrier:
//! send-right (receive from the left) and send-left (receive from the
//! right). A receive that does not complete within the transport's
//! timeout is a fatal [`ConvError::Transport`] naming the neighbor
//! rank and phase — the run must abort rather than synthesize heating
//! from an incomplete event set.

use std::fmt;
use std::sync::{Arc, Barrier, Condvar, Mutex};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::error::{ConvError, ConvResult};
use crate::events::EventBatch;

/// Direction to a ring neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbor {
    /// The partition at `(rank - 1) mod size`.
    Left,
    /// The partition at `(rank + 1) mod size`.
    Right,
}

/// Protocol phase, carried in transport diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    /// Sending to the right neighbor, receiving from the left.
    SendRight,
    /// Sending to the left neighbor, receiving from the right.
    SendLeft,
}

impl fmt::Display for ExchangePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendRight => write!(f, "send-right phase"),
            Self::SendLeft => write!(f, "send-left phase"),
        }
    }
}

/// Ring neighbor topology for one partition. Fixed for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingTopology {
    rank: usize,
    size: usize,
}

impl RingTopology {
    /// Topology for `rank` of `size` partitions.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or `rank` is out of range.
    #[must_use]
    pub fn new(rank: usize, size: usize) -> Self {
        assert!(size > 0, "partition count must be positive");
        assert!(rank < size, "rank {rank} out of range for size {size}");
        Self { rank, size }
    }

    /// This partition's rank.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Total partition count.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Rank of the left neighbor, `(rank - 1) mod size`.
    #[must_use]
    pub fn left(&self) -> usize {
        (self.rank + self.size - 1) % self.size
    }

    /// Rank of the right neighbor, `(rank + 1) mod size`.
    #[must_use]
    pub fn right(&self) -> usize {
        (self.rank + 1) % self.size
    }

    /// Rank in the given direction.
    #[must_use]
    pub fn neighbor(&self, which: Neighbor) -> usize {
        match which {
            Neighbor::Left => self.left(),
            Neighbor::Right => self.right(),
        }
    }
}

/// Point-to-point transport over the partition ring.
///
/// One instance per partition. All operations are blocking; `recv` and
/// the collective calls are the only suspension points in the core.
pub trait RingTransport {
    /// Ship the local records one hop in the given direction.
    ///
    /// # Errors
    ///
    /// Returns [`ConvError::Transport`] if the link is down.
    fn send(&self, to: Neighbor, batch: &EventBatch, phase: ExchangePhase) -> ConvResult<()>;

    /// Receive the records sent by the neighbor in the given direction
    /// during `phase`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvError::Transport`] on timeout, a dropped link, or
    /// a malformed payload.
    fn recv(&self, from: Neighbor, phase: ExchangePhase) -> ConvResult<EventBatch>;

    /// Sum of `local_count` across every partition. Collective: all
    /// partitions must call it once per timestep, and all observe the
    /// same total.
    ///
    /// # Errors
    ///
    /// Returns [`ConvError::Transport`] if the reduction cannot
    /// complete.
    fn total_events(&self, local_count: usize) -> ConvResult<usize>;

    /// Block until every partition reaches this point.
    fn barrier(&self);
}

/// Assemble this partition's working event set for the timestep.
///
/// Runs the two-phase ring exchange and returns
/// `left-received ∪ local ∪ right-received` (concatenated; the
/// synthesizer treats the set as unordered). If no events exist
/// process-wide the exchange is skipped and the (empty) local batch is
/// returned. A single partition owns the whole domain, so its local
/// set is already complete; echoing it through the self-loop would
/// duplicate every event and is skipped too.
///
/// # Errors
///
/// Propagates [`ConvError::Transport`] from any send, receive, or
/// count reduction.
pub fn exchange_events<T: RingTransport>(
    transport: &T,
    topology: RingTopology,
    local: EventBatch,
) -> ConvResult<EventBatch> {
    let total = transport.total_events(local.len())?;
    if total == 0 {
        trace!(rank = topology.rank(), "no events process-wide, exchange skipped");
        return Ok(local);
    }
    if topology.size() == 1 {
        return Ok(local);
    }

    transport.send(Neighbor::Right, &local, ExchangePhase::SendRight)?;
    let from_left = transport.recv(Neighbor::Left, ExchangePhase::SendRight)?;
    transport.barrier();

    transport.send(Neighbor::Left, &local, ExchangePhase::SendLeft)?;
    let from_right = transport.recv(Neighbor::Right, ExchangePhase::SendLeft)?;
    transport.barrier();

    debug!(
        rank = topology.rank(),
        local = local.len(),
        from_left = from_left.len(),
        from_right = from_right.len(),
        "ring exchange complete"
    );

    let mut assembled = from_left;
    assembled.extend(&local);
    assembled.extend(&from_right);
    Ok(assembled)
}

/// Event records on the wire: the three parallel arrays, shipped as
/// owned copies (no shared state crosses the partition boundary).
type WirePayload = (Vec<f64>, Vec<f64>, Vec<f64>);

/// Sum-reduction shared by all ring endpoints, generation-counted so
/// consecutive timesteps cannot interleave.
#[derive(Debug)]
struct CountReduce {
    size: usize,
    state: Mutex<ReduceState>,
    ready: Condvar,
}

#[derive(Debug, Default)]
struct ReduceState {
    contributed: usize,
    sum: usize,
    generation: u64,
    published: usize,
}

impl CountReduce {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(ReduceState::default()),
            ready: Condvar::new(),
        }
    }

    /// Contribute `value` and block until every endpoint has done so;
    /// all callers observe the same sum.
    fn reduce(&self, value: usize) -> usize {
        let mut state = self.state.lock().expect("count reduction lock poisoned");
        let generation = state.generation;
        state.sum += value;
        state.contributed += 1;
        if state.contributed == self.size {
            state.published = state.sum;
            state.sum = 0;
            state.contributed = 0;
            state.generation = state.generation.wrapping_add(1);
            self.ready.notify_all();
            return state.published;
        }
        while state.generation == generation {
            state = self
                .ready
                .wait(state)
                .expect("count reduction lock poisoned");
        }
        state.published
    }
}

/// In-process ring transport over crossbeam channels, one endpoint per
/// partition thread.
///
/// Each ordered (sender, phase) pair gets its own channel, so the two
/// protocol phases never share a queue even when `size == 2` and both
/// neighbors are the same rank. Receives carry a timeout; expiry is a
/// fatal transport error identifying the silent neighbor.
#[derive(Debug)]
pub struct ChannelRing {
    topology: RingTopology,
    timeout: Duration,
    send_right: Sender<WirePayload>,
    send_left: Sender<WirePayload>,
    recv_from_left: Receiver<WirePayload>,
    recv_from_right: Receiver<WirePayload>,
    count_reduce: Arc<CountReduce>,
    barrier: Arc<Barrier>,
}

impl ChannelRing {
    /// Wire up a full ring of `size` endpoints.
    ///
    /// Endpoint `i` of the returned vector belongs to rank `i`; hand
    /// each one to its partition thread.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    #[must_use]
    pub fn ring(size: usize, timeout: Duration) -> Vec<Self> {
        assert!(size > 0, "partition count must be positive");

        // rightward[i]: rank i -> rank (i+1) % size
        // leftward[i]:  rank i -> rank (i-1) % size
        let rightward: Vec<_> = (0..size).map(|_| unbounded::<WirePayload>()).collect();
        let leftward: Vec<_> = (0..size).map(|_| unbounded::<WirePayload>()).collect();
        let count_reduce = Arc::new(CountReduce::new(size));
        let barrier = Arc::new(Barrier::new(size));

        (0..size)
            .map(|rank| {
                let topology = RingTopology::new(rank, size);
                Self {
                    topology,
                    timeout,
                    send_right: rightward[rank].0.clone(),
                    send_left: leftward[rank].0.clone(),
                    // What the left neighbor sends rightward arrives here
                    recv_from_left: rightward[topology.left()].1.clone(),
                    // What the right neighbor sends leftward arrives here
                    recv_from_right: leftward[topology.right()].1.clone(),
                    count_reduce: Arc::clone(&count_reduce),
                    barrier: Arc::clone(&barrier),
                }
            })
            .collect()
    }

    /// The topology this endpoint was wired for.
    #[must_use]
    pub fn topology(&self) -> RingTopology {
        self.topology
    }

    fn transport_error(&self, which: Neighbor, phase: ExchangePhase, detail: String) -> ConvError {
        ConvError::Transport {
            neighbor_rank: self.topology.neighbor(which),
            phase,
            detail,
        }
    }
}

impl RingTransport for ChannelRing {
    fn send(&self, to: Neighbor, batch: &EventBatch, phase: ExchangePhase) -> ConvResult<()> {
        let payload = (
            batch.xs().to_vec(),
            batch.ys().to_vec(),
            batch.times().to_vec(),
        );
        let sender = match to {
            Neighbor::Left => &self.send_left,
            Neighbor::Right => &self.send_right,
        };
        sender
            .send(payload)
            .map_err(|_| self.transport_error(to, phase, "link closed, peer exited".into()))
    }

    fn recv(&self, from: Neighbor, phase: ExchangePhase) -> ConvResult<EventBatch> {
        let receiver = match from {
            Neighbor::Left => &self.recv_from_left,
            Neighbor::Right => &self.recv_from_right,
        };
        let (xs, ys, times) = receiver.recv_timeout(self.timeout).map_err(|e| {
            let detail = match e {
                RecvTimeoutError::Timeout => {
                    format!("receive timed out after {:?}", self.timeout)
                }
                RecvTimeoutError::Disconnected => "link closed, peer exited".to_string(),
            };
            self.transport_error(from, phase, detail)
        })?;
        EventBatch::from_parts(xs, ys, times)
            .map_err(|e| self.transport_error(from, phase, e.to_string()))
    }

    fn total_events(&self, local_count: usize) -> ConvResult<usize> {
        Ok(self.count_reduce.reduce(local_count))
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}
