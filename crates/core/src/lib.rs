//! Convective Parametrization Core
//!
//! Stochastic trigger-and-decay convective heating for a rotating
//! shallow-water model on a doubly-periodic grid, partitioned into an
//! SPMD ring of workers. The spectral transforms, time stepping, and
//! equation assembly live in the host PDE engine; this crate owns the
//! convection subsystem:
//!
//! - per-cell event state with trigger times, persisted across steps
//! - the threshold trigger sweep (activation below critical height,
//!   expiry after one convective timescale)
//! - the two-phase ring exchange of active event records between
//!   neighbor partitions
//! - synthesis of the heating forcing term from the assembled events,
//!   with minimum-image wraparound on the periodic domain

// Run parameters and validation
pub mod params;

// Partition geometry, dense fields, periodic distance
pub mod grid;

// Per-cell event state and wire-format batches
pub mod events;

// Per-step trigger sweep
pub mod trigger;

// Ring topology, transport, and the exchange protocol
pub mod exchange;

// Heating field synthesis
pub mod heating;

// The per-timestep entry point called by the PDE engine
pub mod forcing;

// Thread-per-partition lockstep harness
pub mod spmd;

// Error taxonomy
pub mod error;

// Re-export the core surface
pub use error::{ConvError, ConvResult};
pub use events::{EventBatch, EventStore};
pub use exchange::{exchange_events, ChannelRing, Neighbor, RingTopology, RingTransport};
pub use forcing::{ConvectiveForcing, ForcingRequest};
pub use grid::{min_image_dist2, perturbed_height_field, Field, PartitionGrid};
pub use heating::synthesize;
pub use params::ConvectionParams;
pub use trigger::{update_events, TriggerSweep};
