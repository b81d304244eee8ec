// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.

/// Speed of light \[metres/second\]
pub const VEL_C: f64 = 299_792_458.0;

/// The index of the X feed factor in the Jones-element planes of an
/// [`ApertureResponse`](crate::aperture::ApertureResponse) (Jxx).
pub const POLN_X_INDEX: usize = 0;
/// The index of the Y feed factor in the Jones-element planes of an
/// [`ApertureResponse`](crate::aperture::ApertureResponse) (Jyy).
pub const POLN_Y_INDEX: usize = 3;

/// ALMA latitude \[radians\]
pub const ALMA_LAT_RAD: f64 = -0.401_825_164_011_307_2;
/// ALMA longitude \[radians\]
pub const ALMA_LONG_RAD: f64 = -1.182_546_595_504_989_2;

/// Default number of rows given to each rayon task by the parallel resampling
/// functions.
pub const DEFAULT_ROWS_PER_TASK: usize = 256;
