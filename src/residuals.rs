// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Residual visibilities: the model minus the data.

use std::ops::Range;

use log::debug;
use ndarray::prelude::*;
use rayon::prelude::*;
use thiserror::Error;

use crate::{c32, VisibilityChunk};

#[derive(Error, Debug)]
pub enum ResidualError {
    #[error("bad array shape supplied to argument {argument} of function {function}. expected {expected}, received {received}")]
    BadArrayShape {
        argument: String,
        function: String,
        expected: String,
        received: String,
    },

    #[error("bad row range {start}..{end} for visibilities with {num_rows} rows")]
    BadRowRange {
        start: usize,
        end: usize,
        num_rows: usize,
    },

    #[error("the visibility chunk has no model visibilities")]
    NoModel,

    #[error("the visibility chunk has no corrected visibilities")]
    NoCorrected,
}

/// Subtract `reference` from `model` in place for every polarisation and
/// channel of the rows in `rows`. Flags are not consulted. Rows are processed
/// in parallel.
///
/// `model` and `reference` are indexed `[pol][chan][row]`.
pub fn compute_residuals(
    mut model: ArrayViewMut3<c32>,
    reference: ArrayView3<c32>,
    rows: Range<usize>,
) -> Result<(), ResidualError> {
    if model.dim() != reference.dim() {
        return Err(ResidualError::BadArrayShape {
            argument: "reference".to_string(),
            function: "compute_residuals".to_string(),
            expected: format!("{:?}", model.dim()),
            received: format!("{:?}", reference.dim()),
        });
    }
    let num_rows = model.len_of(Axis(2));
    if rows.start > rows.end || rows.end > num_rows {
        return Err(ResidualError::BadRowRange {
            start: rows.start,
            end: rows.end,
            num_rows,
        });
    }

    debug!("computing residuals for rows {rows:?}");
    model
        .slice_mut(s![.., .., rows.start..rows.end])
        .axis_iter_mut(Axis(2))
        .into_par_iter()
        .zip(reference.slice(s![.., .., rows.start..rows.end]).axis_iter(Axis(2)))
        .for_each(|(mut model, reference)| {
            model -= &reference;
        });
    Ok(())
}

impl VisibilityChunk {
    /// Replace the model visibilities of `rows` with the residual `model -
    /// corrected` if `use_corrected`, otherwise `model - vis`.
    pub fn compute_residuals(
        &mut self,
        rows: Range<usize>,
        use_corrected: bool,
    ) -> Result<(), ResidualError> {
        let model = self.model.as_mut().ok_or(ResidualError::NoModel)?;
        let reference = if use_corrected {
            self.corrected
                .as_ref()
                .ok_or(ResidualError::NoCorrected)?
                .view()
        } else {
            self.vis.view()
        };
        compute_residuals(model.view_mut(), reference, rows)
    }
}
