// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Polarimetric primary-beam products from antenna aperture illumination.
//!
//! Each antenna type has an electric-field pattern (EFP) in the aperture
//! plane, either taken from a [`ResponseTable`] or synthesised by
//! [`AnalyticAperture`]. The primary-beam response of a baseline in the
//! polarisation product `pq` is the product of antenna 1's `p` factor and the
//! conjugate of antenna 2's `q` factor, rotated onto the sky by the
//! parallactic angle.

mod combine;
mod error;
mod response;
mod sky;

pub use combine::{pol_product, ApertureCombiner, BeamQuery, EfpCache};
pub use error::ApertureError;
pub use response::{AnalyticAperture, ApertureResponse, ResponseEntry, ResponseTable};
pub use sky::{SkyCoordinates, SkyImage};

use std::{fmt, str::FromStr};

use crate::constants::{ALMA_LAT_RAD, ALMA_LONG_RAD, POLN_X_INDEX, POLN_Y_INDEX};

/// ALMA antenna types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AntennaType {
    /// 12 m, European
    DA,
    /// 12 m, North American
    DV,
    /// 7 m, Atacama Compact Array
    CM,
    /// 12 m, total power
    PM,
}

impl AntennaType {
    pub const ALL: [AntennaType; 4] = [Self::DA, Self::DV, Self::CM, Self::PM];

    /// A dense index for per-type tables.
    pub fn index(self) -> usize {
        match self {
            Self::DA => 0,
            Self::DV => 1,
            Self::CM => 2,
            Self::PM => 3,
        }
    }

    /// The type of an antenna from its name, e.g. "DV12" is a [`AntennaType::DV`].
    pub fn from_antenna_name(name: &str) -> Result<Self, ApertureError> {
        name.get(..2)
            .ok_or_else(|| ApertureError::UnsupportedAntennaType(name.to_string()))?
            .parse()
            .map_err(|_| ApertureError::UnsupportedAntennaType(name.to_string()))
    }

    /// Dish diameter \[metres\]
    pub fn dish_diameter_m(self) -> f64 {
        match self {
            Self::DA | Self::DV | Self::PM => 12.0,
            Self::CM => 7.0,
        }
    }

    /// Diameter of the subreflector blockage \[metres\]
    pub fn blockage_diameter_m(self) -> f64 {
        match self {
            Self::DA | Self::DV | Self::PM => 0.75,
            Self::CM => 0.457,
        }
    }
}

impl FromStr for AntennaType {
    type Err = ApertureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DA" => Ok(Self::DA),
            "DV" => Ok(Self::DV),
            "CM" => Ok(Self::CM),
            "PM" => Ok(Self::PM),
            _ => Err(ApertureError::UnsupportedAntennaType(s.to_string())),
        }
    }
}

impl fmt::Display for AntennaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DA => "DA",
            Self::DV => "DV",
            Self::CM => "CM",
            Self::PM => "PM",
        };
        write!(f, "{s}")
    }
}

/// Linear polarisation products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PolProduct {
    XX,
    XY,
    YX,
    YY,
}

impl PolProduct {
    pub const ALL: [PolProduct; 4] = [Self::XX, Self::XY, Self::YX, Self::YY];

    /// The EFP planes of antenna 1 and antenna 2 that form this product.
    pub fn factor_indices(self) -> (usize, usize) {
        match self {
            Self::XX => (POLN_X_INDEX, POLN_X_INDEX),
            Self::XY => (POLN_X_INDEX, POLN_Y_INDEX),
            Self::YX => (POLN_Y_INDEX, POLN_X_INDEX),
            Self::YY => (POLN_Y_INDEX, POLN_Y_INDEX),
        }
    }
}

impl FromStr for PolProduct {
    type Err = ApertureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "XX" => Ok(Self::XX),
            "XY" => Ok(Self::XY),
            "YX" => Ok(Self::YX),
            "YY" => Ok(Self::YY),
            _ => Err(ApertureError::UnsupportedPolarisation(s.to_string())),
        }
    }
}

impl fmt::Display for PolProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::XX => "XX",
            Self::XY => "XY",
            Self::YX => "YX",
            Self::YY => "YY",
        };
        write!(f, "{s}")
    }
}

/// Settings for [`ApertureCombiner`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ApertureConfig {
    /// The observatory whose table entries are used.
    pub observatory: String,
    /// Keep the EFP phases (and so the beam squint) when forming products.
    /// Otherwise only the amplitudes are multiplied.
    pub do_squint: bool,
    /// Synthesise an EFP when the table has no match.
    pub allow_synthesis: bool,
    /// An extra rotation for each antenna type, indexed by
    /// [`AntennaType::index`] \[radians\]
    pub rotation_offsets_rad: [f64; 4],
    /// How far a table entry's pointing may be from the requested pointing
    /// \[radians\]
    pub pointing_tolerance_rad: f64,
    /// The number of pixels on each side of a synthesised EFP.
    pub aperture_size: usize,
    /// The pixel size of a synthesised EFP \[metres\]
    pub cell_m: f64,
    /// The observatory latitude, used for parallactic angles and
    /// topocentric pointings \[radians\]
    pub latitude_rad: f64,
    /// The observatory longitude, used for topocentric pointings \[radians\]
    pub longitude_rad: f64,
    /// UT1 - UTC \[seconds\]
    pub dut1_s: f64,
    /// EFPs for times within the same interval of this many seconds are
    /// shared. Zero keys the cache on the exact time.
    pub efp_time_tolerance_s: f64,
    /// The most EFPs kept in the cache; the least recently used is dropped
    /// first. Zero disables caching.
    pub efp_cache_capacity: usize,
}

impl Default for ApertureConfig {
    fn default() -> Self {
        Self {
            observatory: "ALMA".to_string(),
            do_squint: true,
            allow_synthesis: true,
            rotation_offsets_rad: [0.0; 4],
            pointing_tolerance_rad: 1.0_f64.to_radians() / 60.0,
            aperture_size: 64,
            cell_m: 0.5,
            latitude_rad: ALMA_LAT_RAD,
            longitude_rad: ALMA_LONG_RAD,
            dut1_s: 0.0,
            efp_time_tolerance_s: 600.0,
            efp_cache_capacity: 32,
        }
    }
}
