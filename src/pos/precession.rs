// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sidereal time and precession of directions to J2000.

use std::f64::consts::TAU;

use erfa::{
    aliases::{eraAnp, eraC2s, eraGmst06, eraPmat06, eraRxp, eraS2c},
    constants::ERFA_DJM0,
};
use hifitime::{Duration, Epoch};

use super::radec::RADec;

/// Get the local mean sidereal time. `time` should be in the UTC frame, and
/// `dut1` (i.e. UT1 - UTC) provides a better estimate of the LMST. If DUT1
/// isn't known, then a [`Duration`] of 0 seconds can be used; the results are
/// wrong by up to 0.9 seconds.
pub fn get_lmst(longitude_rad: f64, time: Epoch, dut1: Duration) -> f64 {
    let ut1 = (time + dut1).to_mjd_utc_days();
    let gmst = eraGmst06(ERFA_DJM0, ut1, ERFA_DJM0, ut1);
    (gmst + longitude_rad).rem_euclid(TAU)
}

/// Precess a direction referred to the mean equator and equinox of `time` to
/// J2000 (including frame bias).
pub fn precess_to_j2000(radec: RADec, time: Epoch) -> RADec {
    let rbp = eraPmat06(ERFA_DJM0, time.to_mjd_tt_days());
    let mut transposed = [[0.0; 3]; 3];
    for (i, row) in transposed.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = rbp[j][i];
        }
    }
    rotate(transposed, radec)
}

fn rotate(matrix: [[f64; 3]; 3], radec: RADec) -> RADec {
    let (ra, dec) = eraC2s(eraRxp(matrix, eraS2c(radec.ra, radec.dec)));
    RADec::from_radians(eraAnp(ra), dec)
}
