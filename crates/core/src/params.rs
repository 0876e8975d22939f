//! Run parameters for the convective parametrization.
//!
//! Values are consumed from configuration once at startup and are
//! immutable for the run. Validation rejects bad input outright; no
//! parameter is ever silently clamped into range.

use serde::Deserialize;

use crate::error::{ConvError, ConvResult};

/// Physical parameters of the convective heating scheme.
///
/// The defaults match the reference parameter set for the rotating
/// shallow-water runs this scheme was built for: events heat with
/// amplitude `q0` inside radius `r` around the triggering cell, decay
/// over timescale `tau_c`, and trigger where the height field drops
/// below `h_crit`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvectionParams {
    /// Heating amplitude `q0` applied at the event center at elapsed
    /// time zero (domain units per second).
    pub heating_amplitude: f64,

    /// Convective timescale `tau_c` (s). Doubles as the event decay
    /// timescale and the event lifetime: a cell deactivates once its
    /// event age reaches `tau_c`.
    pub convective_timescale: f64,

    /// Convective influence radius `R` (m). Contributions are exactly
    /// zero beyond this distance.
    pub convective_radius: f64,

    /// Critical height (geopotential): an inactive cell triggers when
    /// its height is strictly below this threshold.
    pub critical_height: f64,

    /// Periodic domain extent in x (m).
    pub domain_lx: f64,

    /// Periodic domain extent in y (m).
    pub domain_ly: f64,
}

impl Default for ConvectionParams {
    fn default() -> Self {
        Self {
            heating_amplitude: 5.0e12,
            convective_timescale: 28800.0,
            convective_radius: 30000.0,
            critical_height: 40.0,
            domain_lx: 1.0e6,
            domain_ly: 1.0e6,
        }
    }
}

impl ConvectionParams {
    /// Validate the parameter set at startup.
    ///
    /// # Errors
    ///
    /// Returns [`ConvError::Config`] if any value is non-finite, or if
    /// an amplitude/timescale/radius/extent is not strictly positive.
    /// The critical height only needs to be finite (a negative
    /// threshold is physically meaningful for anomaly fields).
    pub fn validate(&self) -> ConvResult<()> {
        let positive = [
            ("heating_amplitude", self.heating_amplitude),
            ("convective_timescale", self.convective_timescale),
            ("convective_radius", self.convective_radius),
            ("domain_lx", self.domain_lx),
            ("domain_ly", self.domain_ly),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConvError::Config(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if !self.critical_height.is_finite() {
            return Err(ConvError::Config(format!(
                "critical_height must be finite, got {}",
                self.critical_height
            )));
        }
        Ok(())
    }

    /// Check that the influence radius fits within one neighbor hop.
    ///
    /// The exchange protocol shares events one ring hop in each
    /// direction only; an event further away is silently invisible.
    /// The partition's interior extent must therefore be at least the
    /// influence radius.
    ///
    /// # Errors
    ///
    /// Returns [`ConvError::Config`] if `min_partition_extent` is
    /// smaller than the convective radius.
    pub fn validate_for_partition(&self, min_partition_extent: f64) -> ConvResult<()> {
        if min_partition_extent < self.convective_radius {
            return Err(ConvError::Config(format!(
                "convective radius {} exceeds partition extent {}; \
                 events two hops away would be omitted from the exchange",
                self.convective_radius, min_partition_extent
            )));
        }
        Ok(())
    }
}
