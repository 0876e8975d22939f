//! Trigger evaluator: per-step activation and expiry of convective
//! events.
//!
//! One sweep per timestep, before the ring exchange. A cell that was
//! inactive at the start of the sweep triggers when its height drops
//! strictly below the critical threshold; a cell that was active
//! expires once its event age reaches the convective timescale
//! (non-strict). Each cell's outcome depends only on its own
//! pre-sweep state, so visitation order cannot change the result, and
//! a cell never deactivates and retriggers within the same sweep.

use tracing::debug;

use crate::error::{ConvError, ConvResult};
use crate::events::EventStore;
use crate::params::ConvectionParams;

/// Counts from one trigger sweep, for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSweep {
    /// Cells that triggered this step.
    pub activated: usize,
    /// Cells whose event expired this step.
    pub deactivated: usize,
    /// Live events after the sweep.
    pub active: usize,
}

/// Run one trigger sweep over the local partition.
///
/// # Errors
///
/// Returns [`ConvError::Numeric`] if `current_time` or any height
/// value is non-finite — the parent run treats floating-point faults
/// as fatal, and a NaN height would silently poison the trigger state.
/// Returns [`ConvError::ShapeMismatch`] if the height array does not
/// cover the store's cells.
pub fn update_events(
    store: &mut EventStore,
    heights: &[f64],
    current_time: f64,
    params: &ConvectionParams,
) -> ConvResult<TriggerSweep> {
    if heights.len() != store.len() {
        return Err(ConvError::ShapeMismatch {
            what: "height field",
            expected: store.len(),
            got: heights.len(),
        });
    }
    if !current_time.is_finite() {
        return Err(ConvError::Numeric(format!(
            "non-finite simulation time {current_time} in trigger sweep"
        )));
    }

    let mut activated = 0usize;
    let mut deactivated = 0usize;

    for (cell, &height) in heights.iter().enumerate() {
        if !height.is_finite() {
            return Err(ConvError::Numeric(format!(
                "non-finite height {height} at cell {cell} in trigger sweep"
            )));
        }
        if store.is_active(cell) {
            // Expiry: event age reached the lifetime (non-strict)
            if current_time - store.trigger_time(cell) >= params.convective_timescale {
                store.deactivate(cell);
                deactivated += 1;
            }
        } else if height < params.critical_height {
            // Strict inequality: a cell exactly at threshold does not fire
            store.activate(cell, current_time);
            activated += 1;
        }
    }

    let sweep = TriggerSweep {
        activated,
        deactivated,
        active: store.active_count(),
    };
    debug!(
        time = current_time,
        activated = sweep.activated,
        deactivated = sweep.deactivated,
        active = sweep.active,
        "trigger sweep"
    );
    Ok(sweep)
}
