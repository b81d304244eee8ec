// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Oversampled, separable convolution functions.
//!
//! A [`ConvolutionFunction`] is a 1D real table shared by both grid axes. The
//! weight of grid pixel `loc + i` for a sample with oversampled offset `off` is
//! `values[|sampling * i + off|]`; indices past the end of the table are zero.

use std::{collections::BTreeMap, sync::Arc};

use log::trace;

use super::GridError;
use crate::math::{antenna_pair_index, pair_index_to_types};

#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionFunction {
    values: Vec<f32>,
    support: [usize; 2],
    sampling: [usize; 2],
}

impl ConvolutionFunction {
    /// Create a new convolution function from its tabulated values.
    ///
    /// `support` is the half-width of the kernel in grid pixels and `sampling`
    /// the number of table entries per grid pixel, for the x and y axes.
    ///
    /// # Errors
    ///
    /// Returns `GridError::BadConvFunc` if either sampling is zero or the
    /// table doesn't cover `sampling * support` on each axis.
    pub fn new(
        values: Vec<f32>,
        support: [usize; 2],
        sampling: [usize; 2],
    ) -> Result<Self, GridError> {
        if sampling.contains(&0) {
            return Err(GridError::BadConvFunc(format!(
                "sampling must be at least 1, got {sampling:?}"
            )));
        }
        let needed = (0..2).map(|d| sampling[d] * support[d]).max().unwrap_or(0) + 1;
        if values.len() < needed {
            return Err(GridError::BadConvFunc(format!(
                "support {support:?} with sampling {sampling:?} needs at least {needed} values, got {}",
                values.len()
            )));
        }
        Ok(Self {
            values,
            support,
            sampling,
        })
    }

    /// A flat kernel of unit height covering `support` pixels either side of
    /// the sample.
    pub fn pillbox(support: usize, sampling: usize) -> Result<Self, GridError> {
        let len = sampling * support + 1;
        Self::new(vec![1.0; len], [support; 2], [sampling; 2])
    }

    /// A Gaussian kernel with a full width at half maximum of `fwhm_pixels`
    /// grid pixels, tabulated out to `support` pixels.
    pub fn gaussian(support: usize, sampling: usize, fwhm_pixels: f64) -> Result<Self, GridError> {
        if fwhm_pixels <= 0.0 || !fwhm_pixels.is_finite() {
            return Err(GridError::BadConvFunc(format!(
                "Gaussian FWHM must be positive, got {fwhm_pixels}"
            )));
        }
        let len = sampling * (support + 1) + 1;
        let denom = sampling.max(1) as f64 * fwhm_pixels;
        let values = (0..len)
            .map(|i| {
                let x = i as f64 / denom;
                (-4.0 * std::f64::consts::LN_2 * x * x).exp() as f32
            })
            .collect();
        Self::new(values, [support; 2], [sampling; 2])
    }

    #[inline]
    pub fn support(&self, axis: usize) -> usize {
        self.support[axis]
    }

    #[inline]
    pub fn sampling(&self, axis: usize) -> usize {
        self.sampling[axis]
    }

    pub fn supports(&self) -> [usize; 2] {
        self.support
    }

    pub fn samplings(&self) -> [usize; 2] {
        self.sampling
    }

    /// The tabulated value at `idx`, or zero past the end of the table.
    #[inline]
    pub fn value(&self, idx: usize) -> f32 {
        self.values.get(idx).copied().unwrap_or(0.0)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// The weight of pixel `loc + i` on `axis` for a sample with oversampled
    /// offset `off`.
    #[inline]
    pub fn lookup(&self, axis: usize, i: i64, off: i64) -> f32 {
        self.value((self.sampling[axis] as i64 * i + off).unsigned_abs() as usize)
    }

    /// Fill `out` with the weights for `i` in `[-support, support]` on `axis`.
    /// `out` must hold `2 * support + 1` values.
    #[inline]
    pub(crate) fn fill_lookup(&self, axis: usize, off: i64, out: &mut [f32]) {
        let support = self.support[axis] as i64;
        for (o, i) in out.iter_mut().zip(-support..=support) {
            *o = self.lookup(axis, i, off);
        }
    }
}

/// A store key: the pair index and an optional grid channel and grid
/// polarisation. `None` matches any plane.
type PlaneKey = (usize, Option<usize>, Option<usize>);

/// Convolution functions for each pair of antenna types, optionally
/// specialised to a grid channel and/or grid polarisation.
///
/// Pairs are unordered and include "auto" pairs; see
/// [`antenna_pair_index`](crate::math::antenna_pair_index). A lookup for a
/// plane tries, in order, the exact (channel, polarisation) entry, the
/// channel-only entry, the polarisation-only entry, the pair's entry and
/// finally the default.
#[derive(Debug, Clone)]
pub struct ConvolutionFunctionStore {
    num_types: usize,
    functions: BTreeMap<PlaneKey, Arc<ConvolutionFunction>>,
    default: Option<Arc<ConvolutionFunction>>,
}

impl ConvolutionFunctionStore {
    pub fn new(num_types: usize) -> Self {
        Self {
            num_types,
            functions: BTreeMap::new(),
            default: None,
        }
    }

    /// Use `cf` for any pair without its own function.
    pub fn with_default(mut self, cf: ConvolutionFunction) -> Self {
        self.default = Some(Arc::new(cf));
        self
    }

    pub fn num_types(&self) -> usize {
        self.num_types
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Set the function for the pair of antenna types `(type1, type2)` on
    /// every grid plane.
    ///
    /// # Errors
    ///
    /// Returns `GridError::BadAntennaType` if either type is out of range.
    pub fn insert(
        &mut self,
        type1: usize,
        type2: usize,
        cf: ConvolutionFunction,
    ) -> Result<(), GridError> {
        self.insert_for_plane(type1, type2, None, None, cf)
    }

    /// Set the function for the pair of antenna types `(type1, type2)` on
    /// grid channel `grid_chan` and grid polarisation `grid_pol`. `None`
    /// applies to all channels or polarisations.
    ///
    /// # Errors
    ///
    /// Returns `GridError::BadAntennaType` if either type is out of range.
    pub fn insert_for_plane(
        &mut self,
        type1: usize,
        type2: usize,
        grid_chan: Option<usize>,
        grid_pol: Option<usize>,
        cf: ConvolutionFunction,
    ) -> Result<(), GridError> {
        if let Some(&bad) = [type1, type2].iter().find(|&&t| t >= self.num_types) {
            return Err(GridError::BadAntennaType {
                antenna_type: bad,
                num_types: self.num_types,
            });
        }
        let pair = antenna_pair_index(self.num_types, type1, type2);
        self.functions
            .insert((pair, grid_chan, grid_pol), Arc::new(cf));
        Ok(())
    }

    /// The function for the pair of antenna types `(type1, type2)` on every
    /// plane, falling back to the default.
    pub fn for_pair(&self, type1: usize, type2: usize) -> Option<&ConvolutionFunction> {
        self.pair_index(type1, type2)
            .and_then(|pair| self.functions.get(&(pair, None, None)))
            .or(self.default.as_ref())
            .map(|cf| &**cf)
    }

    /// The function for the pair of antenna types `(type1, type2)` on grid
    /// channel `grid_chan` and grid polarisation `grid_pol`.
    pub fn for_plane(
        &self,
        type1: usize,
        type2: usize,
        grid_chan: usize,
        grid_pol: usize,
    ) -> Option<&ConvolutionFunction> {
        let explicit = self.pair_index(type1, type2).and_then(|pair| {
            [
                (pair, Some(grid_chan), Some(grid_pol)),
                (pair, Some(grid_chan), None),
                (pair, None, Some(grid_pol)),
                (pair, None, None),
            ]
            .iter()
            .find_map(|key| self.functions.get(key))
        });
        explicit.or(self.default.as_ref()).map(|cf| &**cf)
    }

    /// Iterate over the explicit entries as `(type1, type2, grid_chan,
    /// grid_pol, function)`.
    pub fn entries(
        &self,
    ) -> impl Iterator<
        Item = (
            usize,
            usize,
            Option<usize>,
            Option<usize>,
            &ConvolutionFunction,
        ),
    > + '_ {
        self.functions.iter().map(move |(&(pair, chan, pol), cf)| {
            let (t1, t2) = pair_index_to_types(self.num_types, pair);
            (t1, t2, chan, pol, &**cf)
        })
    }

    fn pair_index(&self, type1: usize, type2: usize) -> Option<usize> {
        (type1 < self.num_types && type2 < self.num_types)
            .then(|| antenna_pair_index(self.num_types, type1, type2))
    }
}

/// Identifies one sample of a [`VisibilityChunk`](crate::VisibilityChunk) to a [`ConvFuncSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleIndex {
    pub row: usize,
    /// The row's `(antenna1, antenna2)`, if the chunk has them.
    pub antennas: Option<(usize, usize)>,
    /// The grid channel the sample lands on.
    pub grid_chan: usize,
    /// The grid polarisation the sample lands on.
    pub grid_pol: usize,
}

/// Chooses the convolution function for each sample.
pub trait ConvFuncSource: Sync {
    /// The function used for `sample`.
    fn for_sample(&self, sample: &SampleIndex) -> Result<&ConvolutionFunction, GridError>;

    /// The function used for every sample, if it doesn't depend on the
    /// sample at all.
    fn uniform(&self) -> Option<&ConvolutionFunction> {
        None
    }
}

impl ConvFuncSource for ConvolutionFunction {
    #[inline]
    fn for_sample(&self, _sample: &SampleIndex) -> Result<&ConvolutionFunction, GridError> {
        Ok(self)
    }

    fn uniform(&self) -> Option<&ConvolutionFunction> {
        Some(self)
    }
}

/// A [`ConvolutionFunctionStore`] together with the type of each antenna.
/// Samples are resolved through their row's antennas and grid plane.
#[derive(Debug, Clone, Copy)]
pub struct StoreWithTypes<'a> {
    pub store: &'a ConvolutionFunctionStore,
    /// The antenna-type index of each antenna.
    pub antenna_types: &'a [usize],
}

impl<'a> ConvFuncSource for StoreWithTypes<'a> {
    fn for_sample(&self, sample: &SampleIndex) -> Result<&ConvolutionFunction, GridError> {
        let (antenna1, antenna2) = sample.antennas.ok_or(GridError::NoAntennaIndices)?;
        let row = sample.row;
        let type_of = |antenna: usize| {
            self.antenna_types
                .get(antenna)
                .copied()
                .ok_or(GridError::BadAntennaIndex {
                    row,
                    antenna,
                    num_antennas: self.antenna_types.len(),
                })
        };
        let type1 = type_of(antenna1)?;
        let type2 = type_of(antenna2)?;
        let cf = self
            .store
            .for_plane(type1, type2, sample.grid_chan, sample.grid_pol);
        trace!(
            "row {row}, plane ({}, {}): antenna types ({type1}, {type2}), found = {}",
            sample.grid_chan,
            sample.grid_pol,
            cf.is_some()
        );
        cf.ok_or(GridError::MissingConvFunc {
            row,
            type1,
            type2,
            grid_chan: sample.grid_chan,
            grid_pol: sample.grid_pol,
        })
    }
}
