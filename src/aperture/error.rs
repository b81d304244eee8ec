// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with aperture responses.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApertureError {
    #[error("no {observatory} aperture response for antenna type {antenna_type} at {freq_hz} Hz, and synthesis is disabled")]
    NoMatchingResponse {
        observatory: String,
        antenna_type: String,
        freq_hz: f64,
    },

    #[error("unsupported antenna type '{0}'; expected one of DA, DV, CM, PM")]
    UnsupportedAntennaType(String),

    #[error("unsupported polarisation '{0}'; expected one of XX, XY, YX, YY")]
    UnsupportedPolarisation(String),

    #[error("bad array shape supplied to argument {argument} of function {function}. expected {expected}, received {received}")]
    BadArrayShape {
        argument: String,
        function: String,
        expected: String,
        received: String,
    },
}
