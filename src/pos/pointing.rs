// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Directions tagged with their reference frame.

use hifitime::{Duration, Epoch};

use super::{
    azel::AzEl,
    hadec::HADec,
    precession::{get_lmst, precess_to_j2000},
    radec::RADec,
};

/// A pointing direction in one of the frames an observation may record it in.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Pointing {
    /// Mean equator and equinox of J2000.
    J2000(RADec),
    /// Hour angle and declination on the mean equator of date, at the
    /// observatory.
    HADec(HADec),
    /// Horizon coordinates at the observatory.
    AzEl(AzEl),
}

impl Pointing {
    /// This direction in J2000 at `epoch`, for an observatory at
    /// `longitude_rad` and `latitude_rad`. Topocentric frames are converted
    /// through the local mean sidereal time (see
    /// [`get_lmst`](super::precession::get_lmst) for `dut1`) and then
    /// precessed; refraction, nutation and aberration are ignored.
    pub fn to_j2000(
        self,
        epoch: Epoch,
        longitude_rad: f64,
        latitude_rad: f64,
        dut1: Duration,
    ) -> RADec {
        let hadec = match self {
            Self::J2000(radec) => return radec,
            Self::HADec(hadec) => hadec,
            Self::AzEl(azel) => azel.to_hadec(latitude_rad),
        };
        let lmst = get_lmst(longitude_rad, epoch, dut1);
        precess_to_j2000(hadec.to_radec(lmst), epoch)
    }
}

impl From<RADec> for Pointing {
    fn from(radec: RADec) -> Self {
        Self::J2000(radec)
    }
}
