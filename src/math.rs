// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.

use ndarray::prelude::*;
use rustfft::{FftDirection, FftPlanner};

use crate::c64;

/// Round to the nearest integer, with ties rounding up (i.e. `floor(x +
/// 0.5)`). This is *not* `f64::round`, which rounds ties away from zero.
#[inline]
pub fn nint(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// Get the index of a pair of antenna types in an upper-triangular table that
/// includes "auto" pairs (i.e. both antennas of the same type). The pair is
/// unordered; `(a, b)` and `(b, a)` map to the same index. Pair 0 is between
/// type 0 and type 0.
#[inline]
pub fn antenna_pair_index(num_types: usize, type1: usize, type2: usize) -> usize {
    let (t1, t2) = if type1 <= type2 {
        (type1, type2)
    } else {
        (type2, type1)
    };
    t1 * num_types - (t1 * t1.saturating_sub(1)) / 2 + (t2 - t1)
}

/// Convert a pair index into its constituent antenna-type indices (where the
/// pair indices include "auto" pairs). Pair 0 is between type 0 and type 0.
/// This is the inverse of [`antenna_pair_index`].
// Courtesy Brian Crosse.
#[inline]
pub fn pair_index_to_types(num_types: usize, pair: usize) -> (usize, usize) {
    let n = num_types as f64;
    let bl = pair as f64;
    let type1 = (-0.5 * (4.0 * n * (n + 1.0) - 8.0 * bl + 1.0).sqrt() + n + 0.5).floor();
    let type2 = bl - type1 * (n - (type1 + 1.0) / 2.0);
    (type1 as usize, type2 as usize)
}

/// Circularly shift a 2D array by `(shift0, shift1)` elements.
fn roll2(a: &mut Array2<c64>, shift0: usize, shift1: usize) {
    let (n0, n1) = a.dim();
    if n0 == 0 || n1 == 0 {
        return;
    }
    let src = a.to_owned();
    for ((i, j), dst) in a.indexed_iter_mut() {
        *dst = src[((i + n0 - shift0 % n0) % n0, (j + n1 - shift1 % n1) % n1)];
    }
}

/// Move the zero-frequency element of a 2D array to the centre pixel `(n0/2,
/// n1/2)`.
pub fn fftshift2(a: &mut Array2<c64>) {
    let (n0, n1) = a.dim();
    roll2(a, n0 / 2, n1 / 2);
}

/// The inverse of [`fftshift2`]; this is not the same as [`fftshift2`] for
/// odd-sized axes.
pub fn ifftshift2(a: &mut Array2<c64>) {
    let (n0, n1) = a.dim();
    roll2(a, (n0 + 1) / 2, (n1 + 1) / 2);
}

/// In-place 2D FFT of an array whose origin is at the centre pixel, i.e. the
/// input is `ifftshift`ed, transformed along both axes and `fftshift`ed back.
/// Inverse transforms are normalised by the number of elements.
pub fn centred_fft2(a: &mut Array2<c64>, direction: FftDirection) {
    let (n0, n1) = a.dim();
    if n0 == 0 || n1 == 0 {
        return;
    }

    ifftshift2(a);
    let mut planner = FftPlanner::new();
    for (axis, len) in [(Axis(0), n0), (Axis(1), n1)] {
        let fft = planner.plan_fft(len, direction);
        let mut buffer = vec![c64::new(0.0, 0.0); len];
        for mut lane in a.lanes_mut(axis) {
            for (b, v) in buffer.iter_mut().zip(lane.iter()) {
                *b = *v;
            }
            fft.process(&mut buffer);
            for (v, b) in lane.iter_mut().zip(buffer.iter()) {
                *v = *b;
            }
        }
    }
    fftshift2(a);

    if direction == FftDirection::Inverse {
        let norm = (n0 * n1) as f64;
        a.mapv_inplace(|v| v / norm);
    }
}

/// Bilinearly interpolate a 2D array at a fractional pixel position. Positions
/// outside the array read as zero.
#[inline]
pub fn bilinear(a: ArrayView2<c64>, x: f64, y: f64) -> c64 {
    let (n0, n1) = a.dim();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let get = |i: f64, j: f64| -> c64 {
        if i < 0.0 || j < 0.0 || i >= n0 as f64 || j >= n1 as f64 {
            c64::new(0.0, 0.0)
        } else {
            a[(i as usize, j as usize)]
        }
    };
    get(x0, y0) * ((1.0 - fx) * (1.0 - fy))
        + get(x0 + 1.0, y0) * (fx * (1.0 - fy))
        + get(x0, y0 + 1.0) * ((1.0 - fx) * fy)
        + get(x0 + 1.0, y0 + 1.0) * (fx * fy)
}

/// Rotate a 2D array anti-clockwise by `angle_rad` about its centre pixel
/// `(n0/2, n1/2)` using bilinear interpolation. A zero angle is an exact copy.
pub fn rotate_plane(a: ArrayView2<c64>, angle_rad: f64) -> Array2<c64> {
    if angle_rad == 0.0 {
        return a.to_owned();
    }
    let (n0, n1) = a.dim();
    let c0 = (n0 / 2) as f64;
    let c1 = (n1 / 2) as f64;
    let (s, c) = angle_rad.sin_cos();
    Array2::from_shape_fn((n0, n1), |(i, j)| {
        let dx = i as f64 - c0;
        let dy = j as f64 - c1;
        // Rotating the output coordinate backwards finds where it came from.
        let sx = c * dx + s * dy + c0;
        let sy = -s * dx + c * dy + c1;
        bilinear(a, sx, sy)
    })
}
