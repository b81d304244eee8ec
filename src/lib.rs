// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Convolutional resampling of radio-interferometric visibilities.
//!
//! Visibilities (complex samples indexed by polarisation, channel and row) are
//! gridded onto a regular `[x, y, pol, chan]` grid by convolution with an
//! oversampled kernel, and predicted back from a model grid by the transpose
//! operation. Aperture-illumination primary-beam products for pairs of antenna
//! types are provided by [`aperture`].

#[allow(non_camel_case_types)]
pub type c32 = num_complex::Complex<f32>;
#[allow(non_camel_case_types)]
pub type c64 = num_complex::Complex<f64>;

pub mod aperture;
pub mod chunk;
pub mod constants;
pub mod gridding;
pub mod maps;
pub mod math;
pub mod pos;
pub mod residuals;

// Re-exports.
pub use aperture::{
    AnalyticAperture, AntennaType, ApertureCombiner, ApertureConfig, ApertureError,
    ApertureResponse, BeamQuery, EfpCache, PolProduct, ResponseEntry, ResponseTable,
    SkyCoordinates, SkyImage,
};
pub use chunk::{ChunkError, VisibilityChunk};
pub use gridding::{
    ConvFuncSource, ConvolutionFunction, ConvolutionFunctionStore, CoordinateMapper, Grid,
    GridError, GridPosition, ResampleMode, ResampleStats, SampleIndex, StoreWithTypes,
    SumOfWeights, VisibilityResampler,
};
pub use maps::ChanPolMap;
pub use pos::{
    azel::AzEl, hadec::HADec, lmn::LMN, pointing::Pointing, radec::RADec, uvw::UVW,
};
pub use residuals::{compute_residuals, ResidualError};

pub use hifitime;
pub use ndarray;
pub use num_complex;
pub use num_complex::Complex;
pub use num_traits;
pub use rayon;
