// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mapping baseline coordinates onto grid pixels.

use std::f64::consts::TAU;

use crate::{c64, constants::VEL_C, math::nint, UVW};

/// Where a (row, channel) sample lands on the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPosition {
    /// The continuous grid position.
    pub pos: [f64; 2],
    /// The nearest grid pixel.
    pub loc: [i64; 2],
    /// The offset of `loc` from `pos` in oversampled kernel units.
    pub off: [i64; 2],
    /// The delay phase rotation.
    pub phasor: c64,
}

/// Converts UVWs into grid positions with a per-axis scale and offset:
/// `pos = scale * uvw * freq / c + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoordinateMapper {
    /// Grid pixels per wavelength for u and v.
    pub scale: [f64; 2],
    /// The grid pixel of the uv origin for u and v.
    pub offset: [f64; 2],
}

impl CoordinateMapper {
    pub fn new(scale: [f64; 2], offset: [f64; 2]) -> Self {
        Self { scale, offset }
    }

    /// The mapper for an `nx` by `ny` image with pixels of `cell_rad`
    /// radians. A uv cell is `1 / (n * cell)` wavelengths and the uv origin
    /// is pixel `n / 2`.
    pub fn for_image(nx: usize, ny: usize, cell_rad: [f64; 2]) -> Self {
        Self {
            scale: [nx as f64 * cell_rad[0], ny as f64 * cell_rad[1]],
            offset: [(nx / 2) as f64, (ny / 2) as f64],
        }
    }

    /// Map a UVW \[metres\] at `freq_hz`. A non-zero `delay_m` gives the
    /// phasor `exp(-2πi * delay * freq / c)`.
    ///
    /// Returns `None` if the position isn't finite; such a sample has no
    /// pixel and is treated as off the grid.
    #[inline]
    pub fn map(
        &self,
        uvw: UVW,
        freq_hz: f64,
        delay_m: f64,
        sampling: [usize; 2],
    ) -> Option<GridPosition> {
        let scaled = freq_hz / VEL_C;
        let mut pos = [0.0; 2];
        let mut loc = [0; 2];
        let mut off = [0; 2];
        for d in 0..2 {
            pos[d] = self.scale[d] * uvw.axis(d) * scaled + self.offset[d];
            if !pos[d].is_finite() {
                return None;
            }
            loc[d] = nint(pos[d]);
            off[d] = nint((loc[d] as f64 - pos[d]) * sampling[d] as f64);
        }
        let phasor = if delay_m != 0.0 {
            c64::from_polar(1.0, -TAU * delay_m * scaled)
        } else {
            c64::new(1.0, 0.0)
        };
        Some(GridPosition {
            pos,
            loc,
            off,
            phasor,
        })
    }
}

/// Is the whole kernel footprint around `loc` inside an `nx` by `ny` grid?
#[inline]
pub fn on_grid(loc: [i64; 2], support: [usize; 2], nx: usize, ny: usize) -> bool {
    let fits = |l: i64, s: usize, n: usize| {
        let (Ok(s), Ok(n)) = (i64::try_from(s), i64::try_from(n)) else {
            return false;
        };
        matches!(l.checked_sub(s), Some(lo) if lo >= 0)
            && matches!(l.checked_add(s), Some(hi) if hi < n)
    };
    fits(loc[0], support[0], nx) && fits(loc[1], support[1], ny)
}
