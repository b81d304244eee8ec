// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Electric-field patterns: tabulated responses and analytic synthesis.

use std::{f64::consts::TAU, ops::RangeInclusive, sync::Arc};

use hifitime::Epoch;
use ndarray::prelude::*;

use super::{AntennaType, ApertureError};
use crate::{
    c64,
    constants::{POLN_X_INDEX, POLN_Y_INDEX, VEL_C},
    RADec,
};

/// The electric-field pattern of one antenna type at one frequency and time.
///
/// The EFP is indexed `[x][y][jones][1]`, where the Jones elements are
/// `(Jxx, Jxy, Jyx, Jyy)`. The X feed factor is plane
/// [`POLN_X_INDEX`](crate::constants::POLN_X_INDEX) and the Y feed factor is
/// plane [`POLN_Y_INDEX`](crate::constants::POLN_Y_INDEX). Pixel `(n/2, n/2)`
/// is the centre of the aperture.
#[derive(Debug, Clone, PartialEq)]
pub struct ApertureResponse {
    efp: Array4<c64>,
    /// Aperture-plane pixel size \[metres\]
    pub cell_m: f64,
    /// \[Hz\]
    pub freq_hz: f64,
}

impl ApertureResponse {
    pub fn new(efp: Array4<c64>, cell_m: f64, freq_hz: f64) -> Result<Self, ApertureError> {
        let (nx, ny, njones, nchan) = efp.dim();
        if nx == 0 || ny == 0 || njones != 4 || nchan != 1 {
            return Err(ApertureError::BadArrayShape {
                argument: "efp".to_string(),
                function: "ApertureResponse::new".to_string(),
                expected: "(nx > 0, ny > 0, 4, 1)".to_string(),
                received: format!("{:?}", efp.dim()),
            });
        }
        Ok(Self {
            efp,
            cell_m,
            freq_hz,
        })
    }

    pub fn efp(&self) -> ArrayView4<c64> {
        self.efp.view()
    }

    /// The `(nx, ny)` size of the aperture plane.
    pub fn dim(&self) -> (usize, usize) {
        let (nx, ny, _, _) = self.efp.dim();
        (nx, ny)
    }

    /// A single Jones-element plane.
    pub fn factor(&self, jones_index: usize) -> ArrayView2<c64> {
        self.efp.slice(s![.., .., jones_index, 0])
    }
}

/// A tabulated response with the conditions it's valid for.
#[derive(Debug, Clone)]
pub struct ResponseEntry {
    pub observatory: String,
    pub antenna_type: AntennaType,
    /// \[Hz\]
    pub freq_range_hz: RangeInclusive<f64>,
    pub valid_from: Epoch,
    pub valid_to: Epoch,
    /// The pointing the response was measured at, if it depends on it.
    pub pointing: Option<RADec>,
    pub response: Arc<ApertureResponse>,
}

impl ResponseEntry {
    fn matches(
        &self,
        observatory: &str,
        antenna_type: AntennaType,
        freq_hz: f64,
        epoch: Epoch,
        pointing: Option<RADec>,
        pointing_tolerance_rad: f64,
    ) -> bool {
        self.observatory.eq_ignore_ascii_case(observatory)
            && self.antenna_type == antenna_type
            && self.freq_range_hz.contains(&freq_hz)
            && self.valid_from <= epoch
            && epoch <= self.valid_to
            && match (self.pointing, pointing) {
                (Some(a), Some(b)) => a.separation(b) <= pointing_tolerance_rad,
                _ => true,
            }
    }

    fn centre_freq_hz(&self) -> f64 {
        (self.freq_range_hz.start() + self.freq_range_hz.end()) / 2.0
    }
}

/// Canned responses keyed by observatory, antenna type, frequency, time and
/// pointing.
#[derive(Debug, Clone, Default)]
pub struct ResponseTable {
    entries: Vec<ResponseEntry>,
}

impl ResponseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ResponseEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry for these conditions. An entry without a pointing
    /// matches any pointing, and a request without a pointing matches any
    /// entry. If several entries match, the one whose frequency range is
    /// centred closest to `freq_hz` wins.
    pub fn lookup(
        &self,
        observatory: &str,
        antenna_type: AntennaType,
        freq_hz: f64,
        epoch: Epoch,
        pointing: Option<RADec>,
        pointing_tolerance_rad: f64,
    ) -> Option<&ResponseEntry> {
        self.entries
            .iter()
            .filter(|e| {
                e.matches(
                    observatory,
                    antenna_type,
                    freq_hz,
                    epoch,
                    pointing,
                    pointing_tolerance_rad,
                )
            })
            .min_by(|a, b| {
                let da = (a.centre_freq_hz() - freq_hz).abs();
                let db = (b.centre_freq_hz() - freq_hz).abs();
                da.total_cmp(&db)
            })
    }
}

/// A parametric dish illumination: a Gaussian taper falling to `edge_taper_db`
/// at the rim, zero inside the subreflector blockage, and a linear phase
/// gradient across the aperture of opposite sign for the X and Y feeds (beam
/// squint).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyticAperture {
    /// \[metres\]
    pub dish_diameter_m: f64,
    /// \[metres\]
    pub blockage_diameter_m: f64,
    /// Illumination at the rim relative to the centre \[dB\]
    pub edge_taper_db: f64,
    /// The angle between the X and Y beams and the pointing direction
    /// \[radians\]
    pub squint_rad: f64,
}

impl AnalyticAperture {
    pub fn for_antenna_type(antenna_type: AntennaType) -> Self {
        Self {
            dish_diameter_m: antenna_type.dish_diameter_m(),
            blockage_diameter_m: antenna_type.blockage_diameter_m(),
            edge_taper_db: 12.0,
            squint_rad: 0.6_f64.to_radians() / 3600.0,
        }
    }

    /// Synthesise an `n` by `n` EFP with `cell_m` pixels at `freq_hz`. The
    /// cross-polar planes are zero.
    pub fn synthesise(&self, freq_hz: f64, n: usize, cell_m: f64) -> ApertureResponse {
        let radius = self.dish_diameter_m / 2.0;
        let blockage = self.blockage_diameter_m / 2.0;
        let taper = self.edge_taper_db / 20.0 * std::f64::consts::LN_10;
        let wavelength = VEL_C / freq_hz;
        // Phase per metre along x for a beam tilted by the squint.
        let gradient = TAU * self.squint_rad.sin() / wavelength;
        let centre = (n / 2) as f64;

        let mut efp = Array4::zeros((n, n, 4, 1));
        for i in 0..n {
            for j in 0..n {
                let x = (i as f64 - centre) * cell_m;
                let y = (j as f64 - centre) * cell_m;
                let r = x.hypot(y);
                if r > radius || r < blockage {
                    continue;
                }
                let rho = r / radius;
                let amp = (-taper * rho * rho).exp();
                efp[(i, j, POLN_X_INDEX, 0)] = c64::from_polar(amp, gradient * x);
                efp[(i, j, POLN_Y_INDEX, 0)] = c64::from_polar(amp, -gradient * x);
            }
        }

        ApertureResponse {
            efp,
            cell_m,
            freq_hz,
        }
    }
}
