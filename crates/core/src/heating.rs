//! Heating field synthesizer.
//!
//! Turns the assembled event set into the dense forcing term the PDE
//! engine adds to the height equation. Every local cell accumulates
//! the superposed contribution of every event within the convective
//! radius, measured with the minimum-image metric so events heat
//! across the periodic seams.
//!
//! # Kernel choice
//!
//! The spatial kernel is a raised-cosine bump,
//! `cos²(π d / 2R)`: smooth, non-negative, maximal (1) at the event
//! center and identically zero at the cutoff radius, so the `d ≤ R`
//! gate introduces no discontinuity. The temporal kernel is
//! `exp(-Δt / τ_c)`: full amplitude for a freshly triggered event and
//! e⁻¹ of it at one lifetime, at which point the trigger evaluator
//! retires the event anyway.

use std::f64::consts::FRAC_PI_2;

use rayon::prelude::*;

use crate::error::{ConvError, ConvResult};
use crate::events::EventBatch;
use crate::grid::{min_image_dist2, Field, PartitionGrid};
use crate::params::ConvectionParams;

/// Spatial taper at distance `dist` from an event center.
///
/// Defined on `[0, radius]`; 1 at the center, 0 at the cutoff.
#[must_use]
pub fn spatial_kernel(dist: f64, radius: f64) -> f64 {
    let c = (FRAC_PI_2 * dist / radius).cos();
    c * c
}

/// Temporal decay for an event of age `elapsed`.
///
/// 1 at `elapsed == 0`, monotone non-increasing afterwards.
#[must_use]
pub fn decay_kernel(elapsed: f64, timescale: f64) -> f64 {
    (-elapsed / timescale).exp()
}

/// Synthesize the heating field over the local partition at
/// `current_time` from the assembled event set.
///
/// Contributions from overlapping events are summed, all in double
/// precision. The field is recomputed from scratch on every call; two
/// calls with identical inputs produce identical output.
///
/// # Errors
///
/// Returns [`ConvError::Numeric`] if any synthesized value comes out
/// non-finite — the parent system treats floating-point faults as
/// fatal, never as data.
pub fn synthesize(
    grid: &PartitionGrid,
    current_time: f64,
    events: &EventBatch,
    params: &ConvectionParams,
) -> ConvResult<Field> {
    let radius = params.convective_radius;
    let radius2 = radius * radius;
    let amplitude = params.heating_amplitude;
    let timescale = params.convective_timescale;
    let (lx, ly) = (params.domain_lx, params.domain_ly);

    let mut field = Field::zeros(grid.nx(), grid.ny());
    let xs = grid.xs();
    let ys = grid.ys();

    field
        .data
        .par_iter_mut()
        .enumerate()
        .for_each(|(cell, out)| {
            let mut sum = 0.0;
            for (ex, ey, et) in events.records() {
                let d2 = min_image_dist2(xs[cell], ys[cell], ex, ey, lx, ly);
                if d2 <= radius2 {
                    sum += amplitude
                        * spatial_kernel(d2.sqrt(), radius)
                        * decay_kernel(current_time - et, timescale);
                }
            }
            *out = sum;
        });

    if let Some(cell) = field.data.iter().position(|v| !v.is_finite()) {
        return Err(ConvError::Numeric(format!(
            "non-finite heating value {} at cell {cell}",
            field.data[cell]
        )));
    }
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> ConvectionParams {
        ConvectionParams::default()
    }

    fn single_cell_grid(x: f64, y: f64) -> PartitionGrid {
        PartitionGrid::from_coordinates(vec![x], vec![y], 1, 1)
    }

    #[test]
    fn fresh_event_at_zero_distance_gives_full_amplitude() {
        let grid = single_cell_grid(1000.0, 1000.0);
        let mut events = EventBatch::default();
        events.push(1000.0, 1000.0, 0.0);

        let field = synthesize(&grid, 0.0, &events, &params()).unwrap();
        assert_relative_eq!(field.data[0], 5.0e12, max_relative = 1e-12);
    }

    #[test]
    fn cell_just_outside_radius_gets_exactly_zero() {
        // Event 30001 m away from the only cell, radius 30000
        let grid = single_cell_grid(0.0, 0.0);
        let mut events = EventBatch::default();
        events.push(30001.0, 0.0, 0.0);

        let field = synthesize(&grid, 0.0, &events, &params()).unwrap();
        assert_eq!(field.data[0], 0.0);
    }

    #[test]
    fn kernel_tapers_to_zero_at_radius() {
        assert_relative_eq!(spatial_kernel(0.0, 30000.0), 1.0, max_relative = 1e-15);
        assert!(spatial_kernel(30000.0, 30000.0).abs() < 1e-30);
        // Monotone decrease over [0, R]
        let mut prev = f64::INFINITY;
        for step in 0..=10 {
            let v = spatial_kernel(3000.0 * f64::from(step), 30000.0);
            assert!(v <= prev && v >= 0.0);
            prev = v;
        }
    }

    #[test]
    fn decay_is_full_at_zero_and_negligible_past_lifetime() {
        assert_eq!(decay_kernel(0.0, 28800.0), 1.0);
        assert_relative_eq!(
            decay_kernel(28800.0, 28800.0),
            (-1.0f64).exp(),
            max_relative = 1e-12
        );
        assert!(decay_kernel(10.0 * 28800.0, 28800.0) < 1e-4);
        // Monotone non-increasing
        assert!(decay_kernel(100.0, 28800.0) > decay_kernel(200.0, 28800.0));
    }

    #[test]
    fn heating_wraps_around_periodic_seam() {
        // Cell at x=1, event at x=999999: 2 m apart through the seam
        let grid = single_cell_grid(1.0, 500.0);
        let mut events = EventBatch::default();
        events.push(999_999.0, 500.0, 0.0);

        let field = synthesize(&grid, 0.0, &events, &params()).unwrap();
        let expected = 5.0e12 * spatial_kernel(2.0, 30000.0);
        assert_relative_eq!(field.data[0], expected, max_relative = 1e-12);
    }

    #[test]
    fn overlapping_events_superpose_additively() {
        let grid = single_cell_grid(0.0, 0.0);

        let mut one = EventBatch::default();
        one.push(1000.0, 0.0, 0.0);
        let single = synthesize(&grid, 0.0, &one, &params()).unwrap().data[0];

        let mut two = EventBatch::default();
        two.push(1000.0, 0.0, 0.0);
        two.push(0.0, 1000.0, 0.0);
        let double = synthesize(&grid, 0.0, &two, &params()).unwrap().data[0];

        // Same distance, same age: exactly double, not max or mean
        assert_relative_eq!(double, 2.0 * single, max_relative = 1e-12);
    }

    #[test]
    fn distant_events_do_not_interfere() {
        // Two events far apart; a cell under one only feels that one
        let grid = PartitionGrid::from_coordinates(
            vec![0.0, 500_000.0],
            vec![0.0, 0.0],
            2,
            1,
        );
        let mut events = EventBatch::default();
        events.push(0.0, 0.0, 0.0);
        events.push(500_000.0, 0.0, 0.0);

        let field = synthesize(&grid, 0.0, &events, &params()).unwrap();
        let mut lone = EventBatch::default();
        lone.push(0.0, 0.0, 0.0);
        let lone_field = synthesize(&grid, 0.0, &lone, &params()).unwrap();
        assert_eq!(field.data[0], lone_field.data[0]);
    }

    #[test]
    fn synthesis_is_idempotent() {
        let grid = PartitionGrid::slab(16, 16, 1.0e6, 1.0e6, 0, 1);
        let mut events = EventBatch::default();
        events.push(100_000.0, 200_000.0, 0.0);
        events.push(110_000.0, 210_000.0, 1800.0);

        let first = synthesize(&grid, 3600.0, &events, &params()).unwrap();
        let second = synthesize(&grid, 3600.0, &events, &params()).unwrap();
        assert_eq!(first.data, second.data);
    }

    #[test]
    fn empty_event_set_gives_zero_field() {
        let grid = PartitionGrid::slab(8, 8, 1.0e6, 1.0e6, 0, 1);
        let field = synthesize(&grid, 0.0, &EventBatch::default(), &params()).unwrap();
        assert!(field.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn non_finite_event_time_is_fatal() {
        let grid = single_cell_grid(0.0, 0.0);
        let mut events = EventBatch::default();
        events.push(0.0, 0.0, f64::NEG_INFINITY);

        // exp(+inf) overflows to +inf in the decay kernel
        let err = synthesize(&grid, 0.0, &events, &params()).unwrap_err();
        assert!(matches!(err, ConvError::Numeric(_)));
    }
}
