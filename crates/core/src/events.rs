//! Per-cell convective event state and the wire-format event batch.
//!
//! Each grid cell is either inactive or hosting one live convective
//! event; an active cell remembers the simulation time at which it
//! triggered. The store is exclusively owned and mutated by its local
//! partition — neighbor partitions only ever see copies of the active
//! records, extracted as an [`EventBatch`].

use crate::error::{ConvError, ConvResult};
use crate::grid::PartitionGrid;

/// Per-cell event state for one partition.
///
/// Invariant: `trigger_time` is meaningful iff the cell is active, and
/// does not change until the cell deactivates. Out-of-range access is
/// a programming error and panics.
#[derive(Debug, Clone)]
pub struct EventStore {
    active: Vec<bool>,
    trigger_times: Vec<f64>,
}

impl EventStore {
    /// Create a store with every cell inactive.
    #[must_use]
    pub fn new(cell_count: usize) -> Self {
        Self {
            active: vec![false; cell_count],
            trigger_times: vec![0.0; cell_count],
        }
    }

    /// Number of cells tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether the store tracks no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Whether the cell currently hosts a live event.
    ///
    /// # Panics
    ///
    /// Panics if `cell` is out of range.
    #[must_use]
    pub fn is_active(&self, cell: usize) -> bool {
        self.active[cell]
    }

    /// Trigger time of the cell's live event.
    ///
    /// # Panics
    ///
    /// Panics if `cell` is out of range or the cell is inactive —
    /// reading a trigger time without a live event is a logic error.
    #[must_use]
    pub fn trigger_time(&self, cell: usize) -> f64 {
        assert!(
            self.active[cell],
            "trigger_time read on inactive cell {cell}"
        );
        self.trigger_times[cell]
    }

    /// Start an event on `cell` at simulation time `time`.
    ///
    /// # Panics
    ///
    /// Panics if `cell` is out of range.
    pub fn activate(&mut self, cell: usize, time: f64) {
        self.active[cell] = true;
        self.trigger_times[cell] = time;
    }

    /// End the event on `cell`.
    ///
    /// # Panics
    ///
    /// Panics if `cell` is out of range.
    pub fn deactivate(&mut self, cell: usize) {
        self.active[cell] = false;
    }

    /// Number of cells with a live event.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    /// Extract the active events as a batch of records ready for the
    /// ring exchange, using the partition's physical coordinates.
    ///
    /// # Panics
    ///
    /// Panics if the grid's cell count differs from the store's.
    #[must_use]
    pub fn collect_active(&self, grid: &PartitionGrid) -> EventBatch {
        assert_eq!(
            grid.len(),
            self.len(),
            "grid and event store cover different cell counts"
        );
        let mut batch = EventBatch::default();
        for cell in 0..self.len() {
            if self.active[cell] {
                batch.push(grid.xs()[cell], grid.ys()[cell], self.trigger_times[cell]);
            }
        }
        batch
    }
}

/// Active event records as three parallel sequences, the shape they
/// travel in over the ring: x-coordinates, y-coordinates, trigger
/// times. Records have no identity beyond their coordinates; duplicate
/// coordinates from different partitions are independent events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBatch {
    xs: Vec<f64>,
    ys: Vec<f64>,
    times: Vec<f64>,
}

impl EventBatch {
    /// Reassemble a batch from its three received arrays, rejecting a
    /// malformed payload whose lengths disagree.
    ///
    /// # Errors
    ///
    /// Returns [`ConvError::MalformedPayload`] if the arrays disagree
    /// in length (a corrupt or truncated payload).
    pub fn from_parts(xs: Vec<f64>, ys: Vec<f64>, times: Vec<f64>) -> ConvResult<Self> {
        if xs.len() != ys.len() || xs.len() != times.len() {
            return Err(ConvError::MalformedPayload(format!(
                "lengths x={}, y={}, t={}",
                xs.len(),
                ys.len(),
                times.len()
            )));
        }
        Ok(Self { xs, ys, times })
    }

    /// Append one record.
    pub fn push(&mut self, x: f64, y: f64, time: f64) {
        self.xs.push(x);
        self.ys.push(y);
        self.times.push(time);
    }

    /// Append every record of `other`.
    pub fn extend(&mut self, other: &Self) {
        self.xs.extend_from_slice(&other.xs);
        self.ys.extend_from_slice(&other.ys);
        self.times.extend_from_slice(&other.times);
    }

    /// Record count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Whether the batch carries no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Iterate records as `(x, y, trigger_time)` triples.
    pub fn records(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.xs
            .iter()
            .zip(&self.ys)
            .zip(&self.times)
            .map(|((&x, &y), &t)| (x, y, t))
    }

    /// Event x-coordinates.
    #[must_use]
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    /// Event y-coordinates.
    #[must_use]
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    /// Event trigger times.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }
}
