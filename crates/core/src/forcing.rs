//! Per-timestep forcing entry point.
//!
//! The PDE engine calls [`ConvectiveForcing::heating_field`] once per
//! forcing evaluation, handing over the current time and its view of
//! the local coordinate and height arrays. The call runs the full
//! pipeline in the required order: trigger sweep, local event
//! extraction, ring exchange, heating synthesis. Nothing else in the
//! core blocks or communicates.

use tracing::debug;

use crate::error::{ConvError, ConvResult};
use crate::events::EventStore;
use crate::exchange::{exchange_events, RingTopology, RingTransport};
use crate::grid::{Field, PartitionGrid};
use crate::heating::synthesize;
use crate::params::ConvectionParams;
use crate::trigger::update_events;

/// One forcing evaluation request from the PDE engine: the simulation
/// time plus the engine's local coordinate and height arrays, all
/// named and typed.
///
/// The coordinate arrays must describe the same cells, in the same
/// row-major order, as the grid the forcing was constructed with: the
/// event store persists across timesteps and is indexed by those
/// cells. Every call verifies them against the stored grid and fails
/// rather than heat the wrong locations.
#[derive(Debug, Clone, Copy)]
pub struct ForcingRequest<'a> {
    /// Current simulation time (s).
    pub time: f64,
    /// Physical x-coordinate per local cell, row-major.
    pub x: &'a [f64],
    /// Physical y-coordinate per local cell, row-major.
    pub y: &'a [f64],
    /// Current height-field value per local cell, row-major.
    pub height: &'a [f64],
}

/// The convective parametrization for one partition.
///
/// Owns the partition's event state across timesteps; single writer,
/// never shared across partitions. The heating field it returns is
/// rebuilt from scratch on every call.
#[derive(Debug)]
pub struct ConvectiveForcing {
    params: ConvectionParams,
    grid: PartitionGrid,
    topology: RingTopology,
    store: EventStore,
}

impl ConvectiveForcing {
    /// Set up the parametrization for one partition.
    ///
    /// # Errors
    ///
    /// Returns [`ConvError::Config`] if the parameters are invalid or
    /// the influence radius does not fit within one neighbor hop of
    /// this partition.
    pub fn new(
        params: ConvectionParams,
        grid: PartitionGrid,
        topology: RingTopology,
    ) -> ConvResult<Self> {
        params.validate()?;
        if topology.size() > 1 {
            params.validate_for_partition(grid.slab_extent())?;
        }
        let store = EventStore::new(grid.len());
        Ok(Self {
            params,
            grid,
            topology,
            store,
        })
    }

    /// The run parameters.
    #[must_use]
    pub fn params(&self) -> &ConvectionParams {
        &self.params
    }

    /// The partition's event state.
    #[must_use]
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// This partition's ring topology.
    #[must_use]
    pub fn topology(&self) -> RingTopology {
        self.topology
    }

    /// Evaluate the heating field at the requested time.
    ///
    /// Updates the event state (trigger sweep), exchanges active
    /// events with both ring neighbors, and synthesizes the dense
    /// forcing term for the local partition.
    ///
    /// # Errors
    ///
    /// Propagates the taxonomy: [`ConvError::ShapeMismatch`] if the
    /// request arrays disagree with the partition in length,
    /// [`ConvError::Config`] if the request coordinates diverge from
    /// the partition grid, [`ConvError::Numeric`] on non-finite inputs
    /// or outputs, and [`ConvError::Transport`] from the exchange.
    pub fn heating_field<T: RingTransport>(
        &mut self,
        request: &ForcingRequest<'_>,
        transport: &T,
    ) -> ConvResult<Field> {
        self.check_request(request)?;

        let sweep = update_events(
            &mut self.store,
            request.height,
            request.time,
            &self.params,
        )?;

        let local = self.store.collect_active(&self.grid);
        let assembled = exchange_events(transport, self.topology, local)?;

        debug!(
            rank = self.topology.rank(),
            time = request.time,
            active_local = sweep.active,
            assembled = assembled.len(),
            "synthesizing heating field"
        );
        synthesize(&self.grid, request.time, &assembled, &self.params)
    }

    fn check_request(&self, request: &ForcingRequest<'_>) -> ConvResult<()> {
        let expected = self.grid.len();
        for (what, len) in [
            ("x coordinates", request.x.len()),
            ("y coordinates", request.y.len()),
            ("height field", request.height.len()),
        ] {
            if len != expected {
                return Err(ConvError::ShapeMismatch {
                    what,
                    expected,
                    got: len,
                });
            }
        }
        // Exact comparison: the engine hands back the coordinates the
        // grid was built from, unmodified
        for (axis, got, want) in [
            ("x", request.x, self.grid.xs()),
            ("y", request.y, self.grid.ys()),
        ] {
            if let Some(cell) = got.iter().zip(want).position(|(g, w)| g != w) {
                return Err(ConvError::Config(format!(
                    "{axis} coordinate {} at cell {cell} diverges from the partition grid ({})",
                    got[cell], want[cell]
                )));
            }
        }
        Ok(())
    }
}
