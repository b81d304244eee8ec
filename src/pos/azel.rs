// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Handle (azimuth, elevation) coordinates (also known as horizontal
//! coordinates).

use erfa::aliases::eraAe2hd;

use super::hadec::HADec;

/// An azimuth (north through east) and elevation. All units are in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AzEl {
    /// Azimuth \[radians\]
    pub az: f64,
    /// Elevation \[radians\]
    pub el: f64,
}

impl AzEl {
    pub fn from_radians(az: f64, el: f64) -> AzEl {
        Self { az, el }
    }

    pub fn from_degrees(az: f64, el: f64) -> AzEl {
        Self::from_radians(az.to_radians(), el.to_radians())
    }

    /// Convert to an hour angle and declination at `latitude_rad`.
    ///
    /// Uses ERFA.
    pub fn to_hadec(self, latitude_rad: f64) -> HADec {
        let (ha, dec) = eraAe2hd(self.az, self.el, latitude_rad);
        HADec::from_radians(ha, dec)
    }
}

#[cfg(any(test, feature = "approx"))]
impl approx::AbsDiffEq for AzEl {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        f64::abs_diff_eq(&self.az, &other.az, epsilon)
            && f64::abs_diff_eq(&self.el, &other.el, epsilon)
    }
}
