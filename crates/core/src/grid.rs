//! Partition geometry and dense field storage.
//!
//! The global domain is a doubly-periodic rectangle of extent
//! `(lx, ly)` split into contiguous slabs along x, one slab per
//! partition. Each partition only ever sees its own cells; the
//! physical coordinates are fixed at construction and never change.
//!
//! Distances on the periodic domain use the minimum-image convention:
//! the separation along each axis is the shorter of the direct and the
//! wrapped-around path.

/// Dense field over the local partition's cells.
///
/// Stores 2D field data as a flat `Vec<f64>` in row-major order
/// (`iy * nx + ix`). All heating arithmetic is double precision.
#[derive(Debug, Clone)]
pub struct Field {
    /// Field values in row-major order.
    pub data: Vec<f64>,
    /// Local cell count along x.
    pub nx: usize,
    /// Local cell count along y.
    pub ny: usize,
}

impl Field {
    /// Create a field of the given local shape, initialized to zero.
    #[must_use]
    pub fn zeros(nx: usize, ny: usize) -> Self {
        Self {
            data: vec![0.0; nx * ny],
            nx,
            ny,
        }
    }

    /// Create a field filled with a value.
    #[must_use]
    pub fn with_value(nx: usize, ny: usize, value: f64) -> Self {
        Self {
            data: vec![value; nx * ny],
            nx,
            ny,
        }
    }

    /// Total local cell count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the field has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at a grid position.
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds.
    #[must_use]
    pub fn get(&self, ix: usize, iy: usize) -> f64 {
        assert!(ix < self.nx && iy < self.ny, "Coordinates out of bounds");
        self.data[iy * self.nx + ix]
    }

    /// Set the value at a grid position.
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds.
    pub fn set(&mut self, ix: usize, iy: usize, value: f64) {
        assert!(ix < self.nx && iy < self.ny, "Coordinates out of bounds");
        self.data[iy * self.nx + ix] = value;
    }

    /// Borrow the raw values.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Fill the entire field with a value.
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }
}

/// Immutable geometry of one partition of the periodic domain.
///
/// Holds the physical `(x, y)` coordinate of every local cell, flat in
/// the same row-major order as [`Field`]. Constructed once at startup
/// from the partition's rank and never mutated.
#[derive(Debug, Clone)]
pub struct PartitionGrid {
    xs: Vec<f64>,
    ys: Vec<f64>,
    nx: usize,
    ny: usize,
    /// Physical x-extent of this slab (used for the one-hop radius
    /// configuration check).
    slab_extent: f64,
}

impl PartitionGrid {
    /// Build the grid for one x-slab of the global domain.
    ///
    /// The global grid has `global_nx * ny` cells over `(lx, ly)`;
    /// rank `rank` of `size` owns a contiguous block of x-columns,
    /// with the remainder columns distributed to the lowest ranks.
    /// Cell coordinates are cell-left-edge positions, matching a
    /// Fourier collocation grid on `[0, lx) x [0, ly)`.
    ///
    /// # Panics
    ///
    /// Panics if `size == 0`, `rank >= size`, or the grid has more
    /// ranks than x-columns.
    #[must_use]
    pub fn slab(global_nx: usize, ny: usize, lx: f64, ly: f64, rank: usize, size: usize) -> Self {
        assert!(size > 0, "partition count must be positive");
        assert!(rank < size, "rank {rank} out of range for size {size}");
        assert!(
            size <= global_nx,
            "cannot split {global_nx} columns across {size} partitions"
        );

        let base = global_nx / size;
        let rem = global_nx % size;
        let local_nx = base + usize::from(rank < rem);
        let x_start = rank * base + rank.min(rem);

        let dx = lx / global_nx as f64;
        let dy = ly / ny as f64;

        let mut xs = Vec::with_capacity(local_nx * ny);
        let mut ys = Vec::with_capacity(local_nx * ny);
        for iy in 0..ny {
            for ix in 0..local_nx {
                xs.push((x_start + ix) as f64 * dx);
                ys.push(iy as f64 * dy);
            }
        }

        Self {
            xs,
            ys,
            nx: local_nx,
            ny,
            slab_extent: local_nx as f64 * dx,
        }
    }

    /// Build a grid directly from per-cell coordinate arrays provided
    /// by the PDE engine.
    ///
    /// The slab extent is inferred from the x-coordinates: the span
    /// `max - min` covers `nx - 1` column intervals and is scaled up
    /// to the full `nx` columns, matching what [`PartitionGrid::slab`]
    /// records. A single-column grid infers a zero extent and so fails
    /// the one-hop radius check on multi-partition rings.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate arrays disagree in length or do not
    /// match `nx * ny`.
    #[must_use]
    pub fn from_coordinates(xs: Vec<f64>, ys: Vec<f64>, nx: usize, ny: usize) -> Self {
        assert_eq!(xs.len(), ys.len(), "coordinate arrays must match");
        assert_eq!(xs.len(), nx * ny, "coordinates must cover nx * ny cells");
        let slab_extent = match (
            xs.iter().copied().reduce(f64::min),
            xs.iter().copied().reduce(f64::max),
        ) {
            (Some(lo), Some(hi)) if nx > 1 => (hi - lo) * nx as f64 / (nx - 1) as f64,
            _ => 0.0,
        };
        Self {
            xs,
            ys,
            nx,
            ny,
            slab_extent,
        }
    }

    /// Local cell count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Whether the partition owns no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Local cell count along x.
    #[must_use]
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Local cell count along y.
    #[must_use]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Physical x-coordinates, one per cell, row-major.
    #[must_use]
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    /// Physical y-coordinates, one per cell, row-major.
    #[must_use]
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    /// Physical x-extent covered by this slab.
    #[must_use]
    pub fn slab_extent(&self) -> f64 {
        self.slab_extent
    }
}

/// Seeded random initial height field for one partition: `mean` plus
/// a uniform perturbation in `[0, amplitude)` per cell.
///
/// Each rank seeds with its own rank number so partitions decorrelate;
/// reproducible for a fixed decomposition, with no guarantee of
/// bit-identical fields across different worker counts.
#[must_use]
pub fn perturbed_height_field(cell_count: usize, mean: f64, amplitude: f64, seed: u64) -> Vec<f64> {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    let mut rng = StdRng::seed_from_u64(seed);
    (0..cell_count)
        .map(|_| mean + amplitude * rng.random::<f64>())
        .collect()
}

/// Minimum-image separation along one periodic axis.
///
/// Returns the shorter of the direct separation and the wrapped one,
/// always in `[0, extent / 2]`.
#[must_use]
pub fn min_image_delta(delta: f64, extent: f64) -> f64 {
    let d = delta.abs();
    d.min(extent - d)
}

/// Squared minimum-image distance between two points on the periodic
/// domain `(lx, ly)`.
#[must_use]
pub fn min_image_dist2(x0: f64, y0: f64, x1: f64, y1: f64, lx: f64, ly: f64) -> f64 {
    let dx = min_image_delta(x1 - x0, lx);
    let dy = min_image_delta(y1 - y0, ly);
    dx * dx + dy * dy
}
