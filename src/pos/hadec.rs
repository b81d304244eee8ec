// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Handle (hour angle, declination) coordinates.

use crate::{constants::ALMA_LAT_RAD, RADec};

/// A struct containing an Hour Angle and Declination. All units are in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(clippy::upper_case_acronyms)]
pub struct HADec {
    /// Hour angle \[radians\]
    pub ha: f64,
    /// Declination \[radians\]
    pub dec: f64,
}

impl HADec {
    /// Make a new [`HADec`] struct from values in radians.
    pub fn from_radians(ha: f64, dec: f64) -> HADec {
        Self { ha, dec }
    }

    /// Make a new [`HADec`] struct from values in degrees.
    pub fn from_degrees(ha: f64, dec: f64) -> HADec {
        Self {
            ha: ha.to_radians(),
            dec: dec.to_radians(),
        }
    }

    /// Given a local sidereal time, make a new [`RADec`] struct from a [`HADec`].
    pub fn to_radec(self, lst_rad: f64) -> RADec {
        RADec {
            ra: lst_rad - self.ha,
            dec: self.dec,
        }
    }

    /// Get the [parallactic
    /// angle](https://en.wikipedia.org/wiki/Parallactic_angle) at a latitude.
    ///
    /// This is the same expression as ERFA's `eraHd2pa`; the angle is zero on
    /// the meridian for a source that transits south of the zenith.
    pub fn get_parallactic_angle(self, latitude_rad: f64) -> f64 {
        let (s_phi, c_phi) = latitude_rad.sin_cos();
        let (s_ha, c_ha) = self.ha.sin_cos();
        let (s_dec, c_dec) = self.dec.sin_cos();
        let sqsz = c_phi * s_ha;
        let cqsz = s_phi * c_dec - c_phi * s_dec * c_ha;
        if sqsz != 0.0 || cqsz != 0.0 {
            sqsz.atan2(cqsz)
        } else {
            0.0
        }
    }

    /// Get the [parallactic
    /// angle](https://en.wikipedia.org/wiki/Parallactic_angle) at ALMA's
    /// latitude.
    pub fn get_parallactic_angle_alma(self) -> f64 {
        self.get_parallactic_angle(ALMA_LAT_RAD)
    }
}

#[cfg(any(test, feature = "approx"))]
impl approx::AbsDiffEq for HADec {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        f64::abs_diff_eq(&self.ha, &other.ha, epsilon)
            && f64::abs_diff_eq(&self.dec, &other.dec, epsilon)
    }
}
