// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A batch of visibilities and the metadata needed to resample them.
//!
//! A [`VisibilityChunk`] is owned by the caller. Gridding only reads it;
//! degridding writes the visibility cube and reads everything else.
//!
//! # Examples
//!
//! ```rust
//! use visresample::VisibilityChunk;
//!
//! // 4 polarisations, 2 channels, 10 rows.
//! let mut chunk = VisibilityChunk::allocate(4, 2, 10).unwrap();
//! assert_eq!(chunk.dims(), (4, 2, 10));
//!
//! // Only process the second half of the rows.
//! chunk.row_range = 5..10;
//! assert!(chunk.validate().is_ok());
//! ```

use std::ops::Range;

use ndarray::prelude::*;
use num_traits::Zero;
use thiserror::Error;

use crate::{c32, UVW};

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("bad array shape supplied to argument {argument} of function {function}. expected {expected}, received {received}")]
    /// Error for bad array shape in provided argument
    BadArrayShape {
        /// The argument name within the function
        argument: String,
        /// The function name
        function: String,
        /// The expected shape
        expected: String,
        /// The shape that was received instead
        received: String,
    },

    #[error("bad row range {start}..{end} for a chunk with {num_rows} rows")]
    /// Error for a row range that isn't contained in the chunk
    BadRowRange {
        start: usize,
        end: usize,
        num_rows: usize,
    },

    #[error("Insufficient memory available; need {need_gib} GiB of memory.\nPlease use smaller chunks.")]
    /// Error when we asked for too much memory
    InsufficientMemory {
        /// The amount of memory we think we need
        need_gib: usize,
    },
}

/// A batch of visibility rows with per-row and per-channel metadata.
///
/// Cubes are indexed `[pol][chan][row]`, imaging weights `[chan][row]`.
#[derive(Debug, Clone)]
pub struct VisibilityChunk {
    /// The rows to be processed. Rows outside this range are never touched.
    pub row_range: Range<usize>,
    /// The baseline coordinates of each row \[metres\]
    pub uvw: Vec<UVW>,
    /// The frequency of each channel \[Hz\]
    pub freqs_hz: Vec<f64>,
    /// The delay of each row \[metres\]. Non-zero values rotate the phase of
    /// each visibility by `-2π * delay * freq / c`.
    pub delays_m: Vec<f64>,
    /// Imaging weights. `[chan][row]`
    pub imaging_weights: Array2<f32>,
    /// Whole-row flags.
    pub row_flags: Vec<bool>,
    /// Per-sample flags. `[pol][chan][row]`
    pub flags: Array3<bool>,
    /// The visibilities. `[pol][chan][row]`
    pub vis: Array3<c32>,
    /// Model visibilities, if any. `[pol][chan][row]`
    pub model: Option<Array3<c32>>,
    /// Corrected visibilities, if any. `[pol][chan][row]`
    pub corrected: Option<Array3<c32>>,
    /// The first antenna of each row. May be empty if antenna-dependent
    /// convolution functions are not used.
    pub antenna1: Vec<usize>,
    /// The second antenna of each row. Must be the same length as `antenna1`.
    pub antenna2: Vec<usize>,
}

/// Allocate an array, erroring out rather than aborting if the memory isn't
/// available.
fn try_allocate<T: Clone>(
    shape: (usize, usize, usize),
    elem: T,
    total_bytes: usize,
) -> Result<Array3<T>, ChunkError> {
    let num_elems = shape.0 * shape.1 * shape.2;
    let mut v = Vec::new();

    if v.try_reserve_exact(num_elems) == Ok(()) {
        // Make the vector's length equal to its new capacity.
        v.resize(num_elems, elem);
        Array3::from_shape_vec(shape, v).map_err(|_| ChunkError::BadArrayShape {
            argument: "shape".to_string(),
            function: "VisibilityChunk::allocate".to_string(),
            expected: format!("{num_elems} elements"),
            received: format!("{shape:?}"),
        })
    } else {
        // Instead of erroring out with how many GiB we need for *this*
        // array, error out with how many we need for the whole chunk.
        Err(ChunkError::InsufficientMemory {
            need_gib: total_bytes / 1024_usize.pow(3),
        })
    }
}

impl VisibilityChunk {
    /// Estimate the memory size in bytes required to store a chunk of the
    /// given dimensions without model or corrected cubes.
    pub fn estimate_bytes(num_pols: usize, num_chans: usize, num_rows: usize) -> usize {
        num_pols * num_chans * num_rows * (std::mem::size_of::<c32>() + std::mem::size_of::<bool>())
            + num_chans * num_rows * std::mem::size_of::<f32>()
            + num_rows
                * (std::mem::size_of::<UVW>()
                    + std::mem::size_of::<f64>()
                    + std::mem::size_of::<bool>())
    }

    /// Allocate a chunk with zeroed visibilities, unit imaging weights, no
    /// flags, zero UVWs, zero frequencies and zero delays. All rows are
    /// selected.
    ///
    /// # Errors
    ///
    /// can raise `ChunkError::InsufficientMemory` if not enough memory.
    pub fn allocate(
        num_pols: usize,
        num_chans: usize,
        num_rows: usize,
    ) -> Result<Self, ChunkError> {
        let total_bytes = Self::estimate_bytes(num_pols, num_chans, num_rows);
        let shape = (num_pols, num_chans, num_rows);
        let vis = try_allocate(shape, c32::zero(), total_bytes)?;
        let flags = try_allocate(shape, false, total_bytes)?;
        let imaging_weights = try_allocate((1, num_chans, num_rows), 1.0_f32, total_bytes)?
            .index_axis_move(Axis(0), 0);

        Ok(Self {
            row_range: 0..num_rows,
            uvw: vec![UVW::default(); num_rows],
            freqs_hz: vec![0.0; num_chans],
            delays_m: vec![0.0; num_rows],
            imaging_weights,
            row_flags: vec![false; num_rows],
            flags,
            vis,
            model: None,
            corrected: None,
            antenna1: vec![],
            antenna2: vec![],
        })
    }

    /// Allocate a zeroed model cube with the same shape as the visibilities.
    pub fn allocate_model(&mut self) -> Result<(), ChunkError> {
        let (p, c, r) = self.dims();
        let total_bytes = p * c * r * std::mem::size_of::<c32>();
        self.model = Some(try_allocate(self.vis.dim(), c32::zero(), total_bytes)?);
        Ok(())
    }

    /// Allocate a zeroed corrected cube with the same shape as the
    /// visibilities.
    pub fn allocate_corrected(&mut self) -> Result<(), ChunkError> {
        let (p, c, r) = self.dims();
        let total_bytes = p * c * r * std::mem::size_of::<c32>();
        self.corrected = Some(try_allocate(self.vis.dim(), c32::zero(), total_bytes)?);
        Ok(())
    }

    /// The dimensions of the visibility cube: `(num_pols, num_chans,
    /// num_rows)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        self.vis.dim()
    }

    pub fn num_pols(&self) -> usize {
        self.vis.len_of(Axis(0))
    }

    pub fn num_chans(&self) -> usize {
        self.vis.len_of(Axis(1))
    }

    pub fn num_rows(&self) -> usize {
        self.vis.len_of(Axis(2))
    }

    /// Check that all of the per-row, per-channel and cube arrays agree with
    /// the visibility cube, and that the row range is contained in the
    /// chunk.
    pub fn validate(&self) -> Result<(), ChunkError> {
        let (num_pols, num_chans, num_rows) = self.dims();
        let function = "VisibilityChunk::validate";
        let bad_shape = |argument: &str, expected: String, received: String| {
            Err(ChunkError::BadArrayShape {
                argument: argument.to_string(),
                function: function.to_string(),
                expected,
                received,
            })
        };

        if self.row_range.start > self.row_range.end || self.row_range.end > num_rows {
            return Err(ChunkError::BadRowRange {
                start: self.row_range.start,
                end: self.row_range.end,
                num_rows,
            });
        }

        for (argument, len) in [
            ("uvw", self.uvw.len()),
            ("delays_m", self.delays_m.len()),
            ("row_flags", self.row_flags.len()),
        ] {
            if len != num_rows {
                return bad_shape(argument, format!("({num_rows})"), format!("({len})"));
            }
        }
        if self.freqs_hz.len() != num_chans {
            return bad_shape(
                "freqs_hz",
                format!("({num_chans})"),
                format!("({})", self.freqs_hz.len()),
            );
        }
        if self.imaging_weights.dim() != (num_chans, num_rows) {
            return bad_shape(
                "imaging_weights",
                format!("({num_chans}, {num_rows})"),
                format!("{:?}", self.imaging_weights.dim()),
            );
        }
        if self.flags.dim() != self.vis.dim() {
            return bad_shape(
                "flags",
                format!("({num_pols}, {num_chans}, {num_rows})"),
                format!("{:?}", self.flags.dim()),
            );
        }
        for (argument, cube) in [("model", &self.model), ("corrected", &self.corrected)] {
            if let Some(cube) = cube {
                if cube.dim() != self.vis.dim() {
                    return bad_shape(
                        argument,
                        format!("({num_pols}, {num_chans}, {num_rows})"),
                        format!("{:?}", cube.dim()),
                    );
                }
            }
        }
        if self.antenna1.len() != self.antenna2.len()
            || !(self.antenna1.is_empty() || self.antenna1.len() == num_rows)
        {
            return bad_shape(
                "antenna1/antenna2",
                format!("(0) or ({num_rows})"),
                format!("({}) and ({})", self.antenna1.len(), self.antenna2.len()),
            );
        }

        Ok(())
    }
}
