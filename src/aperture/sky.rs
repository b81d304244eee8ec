// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sky-plane coordinates and images.

use ndarray::prelude::*;

use super::PolProduct;
use crate::{c64, math::bilinear, RADec};

/// A linear (SIN-projected) sky coordinate system for an image.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkyCoordinates {
    /// The direction at `ref_pixel`.
    pub reference: RADec,
    /// The pixel at `reference`.
    pub ref_pixel: [f64; 2],
    /// The change in direction cosine per pixel on each axis \[radians\].
    /// Negative values flip an axis.
    pub cell_rad: [f64; 2],
}

impl SkyCoordinates {
    /// The direction cosines `(l, m)` of pixel `(i, j)`, relative to the
    /// reference direction.
    pub fn lm_of_pixel(&self, i: f64, j: f64) -> (f64, f64) {
        (
            (i - self.ref_pixel[0]) * self.cell_rad[0],
            (j - self.ref_pixel[1]) * self.cell_rad[1],
        )
    }
}

/// A complex image with one plane per polarisation product.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyImage {
    /// `[x][y][pol]`
    pub data: Array3<c64>,
    pub coords: SkyCoordinates,
    /// The product held by each plane of `data`.
    pub pols: Vec<PolProduct>,
}

impl SkyImage {
    /// The plane of `pol`, if the image has it.
    pub fn plane(&self, pol: PolProduct) -> Option<ArrayView2<c64>> {
        self.pols
            .iter()
            .position(|&p| p == pol)
            .map(|i| self.data.index_axis(Axis(2), i))
    }
}

/// Resample a beam, centred on pixel `(n/2, n/2)` with pixels of
/// `beam_cell_rad`, onto `out`. The beam centre is placed at the direction
/// cosines `centre_lm` of `coords`. Pixels beyond the beam are zero.
pub(super) fn regrid_beam(
    beam: ArrayView2<c64>,
    beam_cell_rad: [f64; 2],
    centre_lm: (f64, f64),
    coords: &SkyCoordinates,
    mut out: ArrayViewMut2<c64>,
) {
    let (n0, n1) = beam.dim();
    let c0 = (n0 / 2) as f64;
    let c1 = (n1 / 2) as f64;
    for ((i, j), v) in out.indexed_iter_mut() {
        let (l, m) = coords.lm_of_pixel(i as f64, j as f64);
        let x = (l - centre_lm.0) / beam_cell_rad[0] + c0;
        let y = (m - centre_lm.1) / beam_cell_rad[1] + c1;
        *v = bilinear(beam, x, y);
    }
}
