// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Convolutional gridding and degridding.
//!
//! Gridding spreads each visibility over the grid pixels around its uv
//! position, weighted by a [`ConvolutionFunction`], and accumulates the kernel
//! sum into a per-plane sum of weights. Degridding reads the same footprint
//! back as a normalised weighted sum.
//!
//! # Examples
//!
//! ```rust
//! use visresample::{
//!     gridding::new_grid, ChanPolMap, ConvolutionFunction, CoordinateMapper,
//!     VisibilityChunk, VisibilityResampler,
//! };
//! use visresample::ndarray::Array2;
//!
//! let mut chunk = VisibilityChunk::allocate(1, 1, 1).unwrap();
//! chunk.freqs_hz[0] = 150e6;
//! let cf = ConvolutionFunction::new(vec![1.0, 0.5], [1, 1], [1, 1]).unwrap();
//! let maps = ChanPolMap::identity(1, 1);
//! let mapper = CoordinateMapper::new([1.0, 1.0], [2.0, 2.0]);
//! let resampler = VisibilityResampler::new(mapper, &cf, &maps);
//!
//! let mut grid = new_grid(4, 4, 1, 1);
//! let mut sum_of_weights = Array2::zeros((1, 1));
//! let stats = resampler
//!     .data_to_grid(grid.view_mut(), sum_of_weights.view_mut(), &chunk, true)
//!     .unwrap();
//! assert_eq!(stats.gridded, 1);
//! assert_eq!(sum_of_weights[(0, 0)], 4.0);
//! ```

mod cf;
mod error;
mod mapper;
mod resampler;
#[cfg(test)]
mod tests;

pub use cf::{
    ConvFuncSource, ConvolutionFunction, ConvolutionFunctionStore, SampleIndex, StoreWithTypes,
};
pub use error::GridError;
pub use mapper::{on_grid, CoordinateMapper, GridPosition};
pub use resampler::VisibilityResampler;

use std::fmt;

use log::warn;
use ndarray::prelude::*;

use crate::c64;

/// A complex grid, indexed `[x][y][pol][chan]`.
pub type Grid = Array4<c64>;

/// The accumulated kernel weight of each grid plane, indexed `[pol][chan]`.
pub type SumOfWeights = Array2<f64>;

/// The direction of resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleMode {
    /// Visibilities onto the grid.
    Grid,
    /// Grid onto the visibilities.
    Degrid,
}

/// Counts of what happened to the samples of a resampling call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResampleStats {
    /// Samples gridded or degridded.
    pub gridded: usize,
    /// Samples whose kernel footprint fell off the grid, or whose position
    /// wasn't finite.
    pub off_grid: usize,
    /// Samples skipped by a row or sample flag.
    pub flagged: usize,
    /// Samples skipped by the channel or polarisation map.
    pub discarded: usize,
    /// Degridded samples with a zero kernel sum, set to zero.
    pub degenerate: usize,
}

impl std::ops::AddAssign for ResampleStats {
    fn add_assign(&mut self, rhs: Self) {
        self.gridded += rhs.gridded;
        self.off_grid += rhs.off_grid;
        self.flagged += rhs.flagged;
        self.discarded += rhs.discarded;
        self.degenerate += rhs.degenerate;
    }
}

impl std::ops::Add for ResampleStats {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl fmt::Display for ResampleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resampled, {} off grid, {} flagged, {} discarded, {} degenerate",
            self.gridded, self.off_grid, self.flagged, self.discarded, self.degenerate
        )
    }
}

/// A zeroed grid of `nx` by `ny` pixels with `num_pols` polarisations and
/// `num_chans` channels.
pub fn new_grid(nx: usize, ny: usize, num_pols: usize, num_chans: usize) -> Grid {
    Grid::zeros((nx, ny, num_pols, num_chans))
}

/// Divide each `(pol, chan)` plane of `grid` by its sum of weights. Planes
/// with zero weight are left untouched; their number is returned.
///
/// # Errors
///
/// Returns `GridError::BadArrayShape` if `sum_of_weights` isn't `[pol][chan]`
/// of the grid.
pub fn normalise_grid(
    mut grid: ArrayViewMut4<c64>,
    sum_of_weights: ArrayView2<f64>,
) -> Result<usize, GridError> {
    let (_, _, num_pols, num_chans) = grid.dim();
    if sum_of_weights.dim() != (num_pols, num_chans) {
        return Err(GridError::BadArrayShape {
            argument: "sum_of_weights".to_string(),
            function: "normalise_grid".to_string(),
            expected: format!("({num_pols}, {num_chans})"),
            received: format!("{:?}", sum_of_weights.dim()),
        });
    }

    let mut num_zero = 0;
    for ((pol, chan), &sumwt) in sum_of_weights.indexed_iter() {
        if sumwt == 0.0 {
            num_zero += 1;
            continue;
        }
        grid.slice_mut(s![.., .., pol, chan])
            .mapv_inplace(|v| v / sumwt);
    }
    if num_zero > 0 {
        warn!("{num_zero} grid plane(s) have zero weight and were not normalised");
    }
    Ok(num_zero)
}
