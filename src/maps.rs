// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mappings from data channels and polarisations to grid planes.

use crate::aperture::PolProduct;

/// Maps each data channel and data polarisation onto a grid channel and grid
/// polarisation. A negative (or too large) entry discards the corresponding
/// data plane.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChanPolMap {
    /// The grid channel of each data channel.
    pub chan_map: Vec<i32>,
    /// The grid polarisation of each data polarisation.
    pub pol_map: Vec<i32>,
}

impl ChanPolMap {
    pub fn new(chan_map: Vec<i32>, pol_map: Vec<i32>) -> Self {
        Self { chan_map, pol_map }
    }

    /// Data channel `i` goes to grid channel `i`, and likewise for
    /// polarisations.
    pub fn identity(num_chans: usize, num_pols: usize) -> Self {
        Self {
            chan_map: (0..num_chans as i32).collect(),
            pol_map: (0..num_pols as i32).collect(),
        }
    }

    /// Build a map from data and grid frequencies and from data
    /// and grid polarisation products. See [`chan_map_from_freqs`] and
    /// [`pol_map_from_products`].
    pub fn from_freqs_and_pols(
        data_freqs_hz: &[f64],
        grid_freqs_hz: &[f64],
        data_pols: &[PolProduct],
        grid_pols: &[PolProduct],
    ) -> Self {
        Self {
            chan_map: chan_map_from_freqs(data_freqs_hz, grid_freqs_hz),
            pol_map: pol_map_from_products(data_pols, grid_pols),
        }
    }

    /// The grid channel for data channel `ichan`, or `None` if the channel is
    /// discarded.
    #[inline]
    pub fn grid_chan(&self, ichan: usize, num_grid_chans: usize) -> Option<usize> {
        in_range(self.chan_map[ichan], num_grid_chans)
    }

    /// The grid polarisation for data polarisation `ipol`, or `None` if the
    /// polarisation is discarded.
    #[inline]
    pub fn grid_pol(&self, ipol: usize, num_grid_pols: usize) -> Option<usize> {
        in_range(self.pol_map[ipol], num_grid_pols)
    }
}

#[inline]
fn in_range(i: i32, n: usize) -> Option<usize> {
    if i >= 0 && (i as usize) < n {
        Some(i as usize)
    } else {
        None
    }
}

/// Map each data frequency onto the nearest grid channel. A data channel
/// further than half a grid-channel width from every grid channel maps to -1.
/// The width of each grid channel is the spacing to its neighbour. A single
/// grid channel collects every data channel (multi-frequency synthesis).
pub fn chan_map_from_freqs(data_freqs_hz: &[f64], grid_freqs_hz: &[f64]) -> Vec<i32> {
    match grid_freqs_hz.len() {
        0 => vec![-1; data_freqs_hz.len()],
        1 => vec![0; data_freqs_hz.len()],
        n => data_freqs_hz
            .iter()
            .map(|&f| {
                let (i_nearest, diff) = grid_freqs_hz
                    .iter()
                    .map(|&g| (f - g).abs())
                    .enumerate()
                    .fold((0, f64::INFINITY), |acc, (i, d)| if d < acc.1 { (i, d) } else { acc });
                let width = if i_nearest + 1 < n {
                    grid_freqs_hz[i_nearest + 1] - grid_freqs_hz[i_nearest]
                } else {
                    grid_freqs_hz[i_nearest] - grid_freqs_hz[i_nearest - 1]
                }
                .abs();
                if diff <= width / 2.0 {
                    i_nearest as i32
                } else {
                    -1
                }
            })
            .collect(),
    }
}

/// Map each data polarisation product onto the grid plane holding the same
/// product, or -1 if the grid doesn't have it.
pub fn pol_map_from_products(data_pols: &[PolProduct], grid_pols: &[PolProduct]) -> Vec<i32> {
    data_pols
        .iter()
        .map(|p| {
            grid_pols
                .iter()
                .position(|g| g == p)
                .map(|i| i as i32)
                .unwrap_or(-1)
        })
        .collect()
}
