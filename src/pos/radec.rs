// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Handle (right ascension, declination) coordinates.

use erfa::aliases::eraSeps;

use super::lmn::LMN;

/// A right ascension and declination. All units are in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(clippy::upper_case_acronyms)]
pub struct RADec {
    /// Right ascension \[radians\]
    pub ra: f64,
    /// Declination \[radians\]
    pub dec: f64,
}

impl RADec {
    pub fn from_radians(ra: f64, dec: f64) -> RADec {
        Self { ra, dec }
    }

    pub fn from_degrees(ra: f64, dec: f64) -> RADec {
        Self::from_radians(ra.to_radians(), dec.to_radians())
    }

    /// The direction cosines of this direction relative to `centre`; `l`
    /// increases with right ascension and `m` with declination.
    pub fn to_lmn(&self, centre: RADec) -> LMN {
        let (sin_dra, cos_dra) = (self.ra - centre.ra).sin_cos();
        let (sin_dec, cos_dec) = self.dec.sin_cos();
        let (sin_dec0, cos_dec0) = centre.dec.sin_cos();
        LMN {
            l: cos_dec * sin_dra,
            m: sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra,
            n: sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra,
        }
    }

    /// The angle between two directions \[radians\].
    pub fn separation(&self, other: Self) -> f64 {
        eraSeps(self.ra, self.dec, other.ra, other.dec)
    }
}

#[cfg(any(test, feature = "approx"))]
impl approx::AbsDiffEq for RADec {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        f64::abs_diff_eq(&self.ra, &other.ra, epsilon)
            && f64::abs_diff_eq(&self.dec, &other.dec, epsilon)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_lmn_of_the_centre() {
        let centre = RADec::from_degrees(210.0, -35.0);
        let lmn = centre.to_lmn(centre);
        assert_abs_diff_eq!(lmn, LMN { l: 0.0, m: 0.0, n: 1.0 }, epsilon = 1e-15);
    }

    #[test]
    fn test_lmn_axes() {
        let centre = RADec::from_degrees(0.0, 0.0);
        // A small step in each coordinate on the equator.
        let east = RADec::from_radians(1e-3, 0.0).to_lmn(centre);
        assert_abs_diff_eq!(east.l, 1e-3_f64.sin(), epsilon = 1e-15);
        assert_abs_diff_eq!(east.m, 0.0, epsilon = 1e-15);
        let north = RADec::from_radians(0.0, 1e-3).to_lmn(centre);
        assert_abs_diff_eq!(north.l, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(north.m, 1e-3_f64.sin(), epsilon = 1e-15);

        // The pole seen from the equator is straight up.
        let pole = RADec::from_radians(1.0, FRAC_PI_2).to_lmn(centre);
        assert_abs_diff_eq!(pole, LMN { l: 0.0, m: 1.0, n: 0.0 }, epsilon = 1e-15);
    }

    #[test]
    fn test_lmn_is_a_unit_vector() {
        let centre = RADec::from_degrees(83.6, -5.4);
        for (ra, dec) in [(80.0, -3.0), (90.0, -10.0), (263.6, 5.4)] {
            let lmn = RADec::from_degrees(ra, dec).to_lmn(centre);
            let norm = lmn.l * lmn.l + lmn.m * lmn.m + lmn.n * lmn.n;
            assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-14);
        }
        // The antipode is behind the centre.
        let lmn = RADec::from_degrees(263.6, 5.4).to_lmn(centre);
        assert_abs_diff_eq!(lmn.n, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_separation() {
        let a = RADec::from_degrees(10.0, 0.0);
        let b = RADec::from_degrees(40.0, 0.0);
        assert_abs_diff_eq!(a.separation(b), 30_f64.to_radians(), epsilon = 1e-12);
        assert_abs_diff_eq!(a.separation(a), 0.0, epsilon = 1e-12);
        // Right ascension doesn't matter at a pole.
        let p1 = RADec::from_degrees(0.0, -90.0);
        let p2 = RADec::from_degrees(123.0, -90.0);
        assert_abs_diff_eq!(p1.separation(p2), 0.0, epsilon = 1e-12);
    }
}
