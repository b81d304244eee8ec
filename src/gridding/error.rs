// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with gridding and degridding.

use thiserror::Error;

use crate::ChunkError;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("bad array shape supplied to argument {argument} of function {function}. expected {expected}, received {received}")]
    BadArrayShape {
        argument: String,
        function: String,
        expected: String,
        received: String,
    },

    #[error("bad convolution function: {0}")]
    BadConvFunc(String),

    #[error("no convolution function for antenna types ({type1}, {type2}) on grid channel {grid_chan}, polarisation {grid_pol} needed by row {row}")]
    MissingConvFunc {
        row: usize,
        type1: usize,
        type2: usize,
        grid_chan: usize,
        grid_pol: usize,
    },

    #[error("row {row} refers to antenna {antenna}, but only {num_antennas} antenna types were supplied")]
    BadAntennaIndex {
        row: usize,
        antenna: usize,
        num_antennas: usize,
    },

    #[error("antenna type {antenna_type} is out of range for a store of {num_types} types")]
    BadAntennaType {
        antenna_type: usize,
        num_types: usize,
    },

    #[error("antenna-dependent convolution functions need antenna1/antenna2 in the visibility chunk")]
    NoAntennaIndices,

    #[error("the number of {what} must be greater than zero")]
    ZeroPartitioning { what: &'static str },

    #[error(transparent)]
    Chunk(#[from] ChunkError),
}
