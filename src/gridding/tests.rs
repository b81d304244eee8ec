// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests for gridding and degridding.

use approx::assert_abs_diff_eq;
use ndarray::prelude::*;

use super::*;
use crate::{c32, constants::VEL_C, ChanPolMap, ChunkError, VisibilityChunk, UVW};

/// A mapper where one metre is one grid pixel at frequency `VEL_C`.
fn unit_mapper(offset: f64) -> CoordinateMapper {
    CoordinateMapper::new([1.0, 1.0], [offset, offset])
}

/// A chunk with the given UVWs, all channels at `VEL_C` Hz and unit
/// visibilities.
fn chunk_with_uvws(num_pols: usize, num_chans: usize, uvws: &[UVW]) -> VisibilityChunk {
    let mut chunk = VisibilityChunk::allocate(num_pols, num_chans, uvws.len()).unwrap();
    chunk.uvw = uvws.to_vec();
    chunk.freqs_hz.fill(VEL_C);
    chunk.vis.fill(c32::new(1.0, 0.0));
    chunk
}

/// A deterministic, pseudo-random chunk.
fn busy_chunk(num_pols: usize, num_chans: usize, num_rows: usize) -> VisibilityChunk {
    let mut chunk = VisibilityChunk::allocate(num_pols, num_chans, num_rows).unwrap();
    for (i, uvw) in chunk.uvw.iter_mut().enumerate() {
        let t = i as f64 * 0.37;
        *uvw = UVW {
            u: 9.0 * t.sin(),
            v: 7.0 * (1.3 * t).cos(),
            w: t,
        };
    }
    for (i, f) in chunk.freqs_hz.iter_mut().enumerate() {
        *f = VEL_C * (1.0 + 0.05 * i as f64);
    }
    for (i, d) in chunk.delays_m.iter_mut().enumerate() {
        *d = 0.01 * i as f64;
    }
    for ((p, c, r), v) in chunk.vis.indexed_iter_mut() {
        let x = (p * 31 + c * 17 + r * 7) as f32;
        *v = c32::new((0.1 * x).sin(), (0.07 * x).cos());
    }
    for ((c, r), w) in chunk.imaging_weights.indexed_iter_mut() {
        *w = 0.5 + ((c + r) % 3) as f32;
    }
    chunk.row_flags[3] = true;
    chunk.flags[(0, 1, 5)] = true;
    chunk
}

#[test]
fn test_single_psf_sample_with_delta_kernel() {
    let cf = ConvolutionFunction::new(vec![1.0], [0, 0], [1, 1]).unwrap();
    let maps = ChanPolMap::identity(1, 1);
    let resampler = VisibilityResampler::new(unit_mapper(1.0), &cf, &maps);
    let chunk = chunk_with_uvws(1, 1, &[UVW::default()]);

    let mut grid = new_grid(3, 3, 1, 1);
    let mut sumwt = SumOfWeights::zeros((1, 1));
    let stats = resampler
        .data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true)
        .unwrap();

    assert_eq!(stats.gridded, 1);
    assert_abs_diff_eq!(sumwt[(0, 0)], 1.0);
    for ((x, y, _, _), v) in grid.indexed_iter() {
        let expected = if (x, y) == (1, 1) { 1.0 } else { 0.0 };
        assert_abs_diff_eq!(*v, c64::new(expected, 0.0));
    }
}

#[test]
fn test_psf_4x4_scenario() {
    let cf = ConvolutionFunction::new(vec![1.0, 0.5], [1, 1], [1, 1]).unwrap();
    let maps = ChanPolMap::identity(1, 1);
    let resampler = VisibilityResampler::new(unit_mapper(2.0), &cf, &maps);
    let chunk = chunk_with_uvws(1, 1, &[UVW::default()]);

    let mut grid = new_grid(4, 4, 1, 1);
    let mut sumwt = SumOfWeights::zeros((1, 1));
    resampler
        .data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true)
        .unwrap();

    let k = [0.5, 1.0, 0.5];
    let mut expected = Array2::<f64>::zeros((4, 4));
    for (ix, kx) in k.iter().enumerate() {
        for (iy, ky) in k.iter().enumerate() {
            expected[(1 + ix, 1 + iy)] = kx * ky;
        }
    }
    assert_abs_diff_eq!(grid.slice(s![.., .., 0, 0]).mapv(|v| v.re), expected);
    assert_abs_diff_eq!(grid.slice(s![.., .., 0, 0]).mapv(|v| v.im), Array2::<f64>::zeros((4, 4)));
    assert_abs_diff_eq!(sumwt[(0, 0)], 4.0);
}

#[test]
fn test_gridding_applies_weight_and_delay() {
    let cf = ConvolutionFunction::new(vec![1.0], [0, 0], [1, 1]).unwrap();
    let maps = ChanPolMap::identity(1, 1);
    let resampler = VisibilityResampler::new(unit_mapper(1.0), &cf, &maps);
    let mut chunk = chunk_with_uvws(1, 1, &[UVW::default()]);
    chunk.imaging_weights[(0, 0)] = 2.0;
    chunk.vis[(0, 0, 0)] = c32::new(3.0, 0.0);
    // A quarter of a wavelength.
    chunk.delays_m[0] = 0.25;

    let mut grid = new_grid(3, 3, 1, 1);
    let mut sumwt = SumOfWeights::zeros((1, 1));
    resampler
        .data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, false)
        .unwrap();
    assert_abs_diff_eq!(grid[(1, 1, 0, 0)], c64::new(0.0, -6.0), epsilon = 1e-12);
    assert_abs_diff_eq!(sumwt[(0, 0)], 2.0);

    // The PSF ignores the visibility and the delay.
    let mut psf = new_grid(3, 3, 1, 1);
    resampler
        .data_to_grid(psf.view_mut(), sumwt.view_mut(), &chunk, true)
        .unwrap();
    assert_abs_diff_eq!(psf[(1, 1, 0, 0)], c64::new(2.0, 0.0));
    // The sum of weights accumulates.
    assert_abs_diff_eq!(sumwt[(0, 0)], 4.0);
}

#[test]
fn test_degrid_uniform_grid() {
    let cf = ConvolutionFunction::gaussian(2, 4, 1.5).unwrap();
    let maps = ChanPolMap::identity(2, 1);
    let resampler = VisibilityResampler::new(unit_mapper(8.0), &cf, &maps);
    let mut chunk = chunk_with_uvws(
        1,
        2,
        &[
            UVW {
                u: 0.3,
                v: -1.7,
                w: 0.0,
            },
            UVW {
                u: -2.45,
                v: 3.1,
                w: 5.0,
            },
        ],
    );
    chunk.freqs_hz[1] = 0.8 * VEL_C;
    chunk.delays_m = vec![0.0, 0.1];

    let c = c64::new(2.0, -1.0);
    let grid = Grid::from_elem((16, 16, 1, 2), c);
    let stats = resampler.grid_to_data(grid.view(), &mut chunk).unwrap();
    assert_eq!(stats.gridded, 4);
    assert_eq!(stats.degenerate, 0);

    for ((_, ichan, row), v) in chunk.vis.indexed_iter() {
        let phasor = c64::from_polar(
            1.0,
            -std::f64::consts::TAU * chunk.delays_m[row] * chunk.freqs_hz[ichan] / VEL_C,
        );
        let expected = c * phasor.conj();
        assert_abs_diff_eq!(v.re as f64, expected.re, epsilon = 1e-6);
        assert_abs_diff_eq!(v.im as f64, expected.im, epsilon = 1e-6);
    }
}

#[test]
fn test_on_grid_boundary() {
    let cf = ConvolutionFunction::pillbox(1, 1).unwrap();
    let maps = ChanPolMap::identity(1, 1);
    let resampler = VisibilityResampler::new(unit_mapper(0.0), &cf, &maps);
    // With support 1 on a 4 pixel axis, only pixels 1 and 2 are usable.
    let uvws: Vec<UVW> = (0..4)
        .map(|u| UVW {
            u: u as f64,
            v: 1.0,
            w: 0.0,
        })
        .chain((0..4).map(|v| UVW {
            u: 2.0,
            v: v as f64,
            w: 0.0,
        }))
        .collect();
    let chunk = chunk_with_uvws(1, 1, &uvws);

    let mut grid = new_grid(4, 4, 1, 1);
    let mut sumwt = SumOfWeights::zeros((1, 1));
    let stats = resampler
        .data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true)
        .unwrap();
    assert_eq!(stats.gridded, 4);
    assert_eq!(stats.off_grid, 4);
    // Each kept sample has a kernel sum of 9.
    assert_abs_diff_eq!(sumwt[(0, 0)], 36.0);
    // Only the footprint around (1, 1) reaches x = 0, and it stops at y = 2.
    assert_abs_diff_eq!(grid[(0, 3, 0, 0)], c64::new(0.0, 0.0));
    assert_abs_diff_eq!(grid[(0, 0, 0, 0)], c64::new(1.0, 0.0));
}

#[test]
fn test_non_finite_uvws_are_off_grid() {
    let cf = ConvolutionFunction::pillbox(1, 1).unwrap();
    let maps = ChanPolMap::identity(1, 1);
    let resampler = VisibilityResampler::new(unit_mapper(4.0), &cf, &maps);
    let uvws = [
        UVW {
            u: f64::INFINITY,
            v: 0.0,
            w: 0.0,
        },
        UVW {
            u: 0.0,
            v: f64::NAN,
            w: 0.0,
        },
        UVW {
            u: f64::NEG_INFINITY,
            v: f64::INFINITY,
            w: 0.0,
        },
        UVW::default(),
    ];
    let chunk = chunk_with_uvws(1, 1, &uvws);

    let mut grid = new_grid(8, 8, 1, 1);
    let mut sumwt = SumOfWeights::zeros((1, 1));
    let stats = resampler
        .data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true)
        .unwrap();
    assert_eq!(stats.gridded, 1);
    assert_eq!(stats.off_grid, 3);
    assert_abs_diff_eq!(sumwt[(0, 0)], 9.0);
    // Only the footprint of the finite sample was touched; a NaN position
    // must not land on pixel 0.
    assert_abs_diff_eq!(grid[(0, 0, 0, 0)], c64::new(0.0, 0.0));
    assert_abs_diff_eq!(grid.sum(), c64::new(9.0, 0.0));

    let mut partitioned = new_grid(8, 8, 1, 1);
    let mut partitioned_sumwt = SumOfWeights::zeros((1, 1));
    let stats = resampler
        .data_to_grid_parallel(
            partitioned.view_mut(),
            partitioned_sumwt.view_mut(),
            &chunk,
            true,
            4,
        )
        .unwrap();
    assert_eq!(stats.off_grid, 3);
    assert_abs_diff_eq!(partitioned, grid);

    // Degridding leaves the off-grid samples alone.
    let mut chunk = chunk;
    chunk.vis.fill(c32::new(-5.0, 5.0));
    let stats = resampler.grid_to_data(grid.view(), &mut chunk).unwrap();
    assert_eq!(stats.gridded, 1);
    assert_eq!(stats.off_grid, 3);
    for row in 0..3 {
        assert_eq!(chunk.vis[(0, 0, row)], c32::new(-5.0, 5.0));
    }
    assert_abs_diff_eq!(chunk.vis[(0, 0, 3)].re, 1.0);
}

#[test]
fn test_kernels_vary_by_channel() {
    let mut store = ConvolutionFunctionStore::new(1);
    store
        .insert_for_plane(0, 0, Some(0), None, ConvolutionFunction::pillbox(0, 1).unwrap())
        .unwrap();
    store
        .insert_for_plane(0, 0, Some(1), None, ConvolutionFunction::pillbox(1, 1).unwrap())
        .unwrap();
    let types = [0];
    let source = StoreWithTypes {
        store: &store,
        antenna_types: &types,
    };
    let maps = ChanPolMap::identity(2, 1);
    let resampler = VisibilityResampler::new(unit_mapper(2.0), &source, &maps);

    let mut chunk = chunk_with_uvws(1, 2, &[UVW::default()]);
    chunk.antenna1 = vec![0];
    chunk.antenna2 = vec![0];

    let mut grid = new_grid(5, 5, 1, 2);
    let mut sumwt = SumOfWeights::zeros((1, 2));
    let stats = resampler
        .data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true)
        .unwrap();
    assert_eq!(stats.gridded, 2);
    assert_abs_diff_eq!(sumwt, array![[1.0, 9.0]]);
    // Channel 0 got a delta function, channel 1 a 3x3 box.
    assert_abs_diff_eq!(grid[(1, 1, 0, 0)], c64::new(0.0, 0.0));
    assert_abs_diff_eq!(grid[(2, 2, 0, 0)], c64::new(1.0, 0.0));
    assert_abs_diff_eq!(grid[(1, 1, 0, 1)], c64::new(1.0, 0.0));
    assert_abs_diff_eq!(grid[(3, 3, 0, 1)], c64::new(1.0, 0.0));

    // The same kernels are used to degrid.
    let mut model = new_grid(5, 5, 1, 2);
    model[(1, 1, 0, 0)] = c64::new(9.0, 0.0);
    model[(1, 1, 0, 1)] = c64::new(9.0, 0.0);
    resampler.grid_to_data(model.view(), &mut chunk).unwrap();
    assert_abs_diff_eq!(chunk.vis[(0, 0, 0)].re, 0.0);
    assert_abs_diff_eq!(chunk.vis[(0, 1, 0)].re, 1.0, epsilon = 1e-6);

    // A channel without a kernel is an error before anything is written.
    let mut store = ConvolutionFunctionStore::new(1);
    store
        .insert_for_plane(0, 0, Some(0), None, ConvolutionFunction::pillbox(0, 1).unwrap())
        .unwrap();
    let source = StoreWithTypes {
        store: &store,
        antenna_types: &types,
    };
    let resampler = VisibilityResampler::new(unit_mapper(2.0), &source, &maps);
    let mut grid = new_grid(5, 5, 1, 2);
    let mut sumwt = SumOfWeights::zeros((1, 2));
    assert!(matches!(
        resampler.data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true),
        Err(GridError::MissingConvFunc {
            row: 0,
            grid_chan: 1,
            grid_pol: 0,
            ..
        })
    ));
    assert_abs_diff_eq!(sumwt, array![[0.0, 0.0]]);
}

#[test]
fn test_flagged_nan_rows_dont_touch_the_grid() {
    let cf = ConvolutionFunction::pillbox(1, 1).unwrap();
    let maps = ChanPolMap::identity(2, 2);
    let resampler = VisibilityResampler::new(unit_mapper(4.0), &cf, &maps);
    let mut chunk = chunk_with_uvws(2, 2, &[UVW::default(), UVW::default()]);
    chunk.row_flags[0] = true;
    chunk
        .vis
        .slice_mut(s![.., .., 0])
        .fill(c32::new(f32::NAN, f32::INFINITY));
    chunk.imaging_weights.column_mut(0).fill(f32::NAN);
    // Only a single polarisation of one channel in the second row is bad.
    chunk.flags[(1, 0, 1)] = true;
    chunk.vis[(1, 0, 1)] = c32::new(f32::NAN, f32::NAN);

    let mut grid = new_grid(8, 8, 2, 2);
    let mut sumwt = SumOfWeights::zeros((2, 2));
    let stats = resampler
        .data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, false)
        .unwrap();
    assert_eq!(stats.flagged, 5);
    assert_eq!(stats.gridded, 3);
    assert!(grid.iter().all(|v| v.re.is_finite() && v.im.is_finite()));
    assert_abs_diff_eq!(sumwt, array![[9.0, 9.0], [0.0, 9.0]]);
    assert_abs_diff_eq!(grid[(4, 4, 1, 0)], c64::new(0.0, 0.0));
    assert_abs_diff_eq!(grid[(4, 4, 0, 0)], c64::new(1.0, 0.0));
}

#[test]
fn test_zero_weight_is_skipped() {
    let cf = ConvolutionFunction::pillbox(0, 1).unwrap();
    let maps = ChanPolMap::identity(1, 1);
    let resampler = VisibilityResampler::new(unit_mapper(1.0), &cf, &maps);
    let mut chunk = chunk_with_uvws(1, 1, &[UVW::default()]);
    chunk.imaging_weights.fill(0.0);

    let mut grid = new_grid(3, 3, 1, 1);
    let mut sumwt = SumOfWeights::zeros((1, 1));
    let stats = resampler
        .data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true)
        .unwrap();
    assert_eq!(stats, ResampleStats::default());
    assert_abs_diff_eq!(sumwt[(0, 0)], 0.0);
}

#[test]
fn test_maps_discard() {
    let cf = ConvolutionFunction::pillbox(0, 1).unwrap();
    // Data channel 0 is dropped, 1 goes to grid channel 0, 2 is out of range.
    // Data pol 1 is dropped.
    let maps = ChanPolMap::new(vec![-1, 0, 1], vec![0, -1]);
    let resampler = VisibilityResampler::new(unit_mapper(1.0), &cf, &maps);
    let mut chunk = chunk_with_uvws(2, 3, &[UVW::default()]);
    for ((_, c, _), v) in chunk.vis.indexed_iter_mut() {
        *v = c32::new(c as f32 + 1.0, 0.0);
    }

    let mut grid = new_grid(3, 3, 1, 1);
    let mut sumwt = SumOfWeights::zeros((1, 1));
    let stats = resampler
        .data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, false)
        .unwrap();
    assert_eq!(stats.gridded, 1);
    assert_eq!(stats.discarded, 5);
    assert_abs_diff_eq!(grid[(1, 1, 0, 0)], c64::new(2.0, 0.0));
    assert_abs_diff_eq!(sumwt[(0, 0)], 1.0);

    // Degridding skips the same samples and leaves them untouched.
    let model = Grid::from_elem((3, 3, 1, 1), c64::new(-1.0, 0.0));
    resampler.grid_to_data(model.view(), &mut chunk).unwrap();
    assert_abs_diff_eq!(chunk.vis[(0, 1, 0)], c32::new(-1.0, 0.0));
    assert_abs_diff_eq!(chunk.vis[(1, 1, 0)], c32::new(2.0, 0.0));
    assert_abs_diff_eq!(chunk.vis[(0, 0, 0)], c32::new(1.0, 0.0));
    assert_abs_diff_eq!(chunk.vis[(0, 2, 0)], c32::new(3.0, 0.0));
}

#[test]
fn test_degenerate_degrid_is_zero() {
    let cf = ConvolutionFunction::new(vec![0.0, 0.0], [1, 1], [1, 1]).unwrap();
    let maps = ChanPolMap::identity(1, 1);
    let resampler = VisibilityResampler::new(unit_mapper(2.0), &cf, &maps);
    let mut chunk = chunk_with_uvws(1, 1, &[UVW::default()]);

    let grid = Grid::from_elem((4, 4, 1, 1), c64::new(1.0, 1.0));
    let stats = resampler.grid_to_data(grid.view(), &mut chunk).unwrap();
    assert_eq!(stats.degenerate, 1);
    assert_abs_diff_eq!(chunk.vis[(0, 0, 0)], c32::new(0.0, 0.0));
    assert!(!chunk.flags[(0, 0, 0)]);
}

#[test]
fn test_row_range_is_respected() {
    let cf = ConvolutionFunction::pillbox(0, 1).unwrap();
    let maps = ChanPolMap::identity(1, 1);
    let resampler = VisibilityResampler::new(unit_mapper(1.0), &cf, &maps);
    let mut chunk = chunk_with_uvws(1, 1, &[UVW::default(); 6]);
    chunk.row_range = 2..4;

    let mut grid = new_grid(3, 3, 1, 1);
    let mut sumwt = SumOfWeights::zeros((1, 1));
    resampler
        .data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true)
        .unwrap();
    assert_abs_diff_eq!(sumwt[(0, 0)], 2.0);

    let model = Grid::from_elem((3, 3, 1, 1), c64::new(5.0, 0.0));
    resampler.grid_to_data(model.view(), &mut chunk).unwrap();
    let re: Vec<f32> = chunk.vis.iter().map(|v| v.re).collect();
    assert_eq!(re, vec![1.0, 1.0, 5.0, 5.0, 1.0, 1.0]);
}

#[test]
fn test_accumulate_dispatches() {
    let cf = ConvolutionFunction::pillbox(0, 1).unwrap();
    let maps = ChanPolMap::identity(1, 1);
    let resampler = VisibilityResampler::new(unit_mapper(1.0), &cf, &maps);
    let mut chunk = chunk_with_uvws(1, 1, &[UVW::default()]);
    chunk.vis[(0, 0, 0)] = c32::new(3.0, 4.0);

    let mut grid = new_grid(3, 3, 1, 1);
    let mut sumwt = SumOfWeights::zeros((1, 1));
    resampler
        .accumulate(
            grid.view_mut(),
            &mut chunk,
            false,
            sumwt.view_mut(),
            ResampleMode::Grid,
        )
        .unwrap();
    assert_abs_diff_eq!(grid[(1, 1, 0, 0)], c64::new(3.0, 4.0));

    grid[(1, 1, 0, 0)] = c64::new(-1.0, 0.5);
    resampler
        .accumulate(
            grid.view_mut(),
            &mut chunk,
            false,
            sumwt.view_mut(),
            ResampleMode::Degrid,
        )
        .unwrap();
    assert_abs_diff_eq!(chunk.vis[(0, 0, 0)], c32::new(-1.0, 0.5));
    // Degridding doesn't touch the sum of weights.
    assert_abs_diff_eq!(sumwt[(0, 0)], 1.0);
}

#[test]
fn test_parallel_gridding_matches_serial() {
    let cf = ConvolutionFunction::gaussian(3, 8, 2.0).unwrap();
    let maps = ChanPolMap::new(vec![0, 1, 1], vec![0, 1]);
    let resampler = VisibilityResampler::new(unit_mapper(16.0), &cf, &maps);
    let mut chunk = busy_chunk(2, 3, 101);
    chunk.row_range = 4..97;

    let mut serial = new_grid(32, 32, 2, 2);
    let mut serial_sumwt = SumOfWeights::zeros((2, 2));
    let serial_stats = resampler
        .data_to_grid(serial.view_mut(), serial_sumwt.view_mut(), &chunk, false)
        .unwrap();
    assert!(serial_stats.gridded > 0);

    for num_partitions in [1, 7, 200] {
        let mut parallel = new_grid(32, 32, 2, 2);
        let mut parallel_sumwt = SumOfWeights::zeros((2, 2));
        let parallel_stats = resampler
            .data_to_grid_parallel(
                parallel.view_mut(),
                parallel_sumwt.view_mut(),
                &chunk,
                false,
                num_partitions,
            )
            .unwrap();
        assert_eq!(parallel_stats, serial_stats);
        assert_abs_diff_eq!(parallel, serial, epsilon = 1e-9);
        assert_abs_diff_eq!(parallel_sumwt, serial_sumwt, epsilon = 1e-9);
    }

    // The same partitioning gives bit-identical results.
    let run = || {
        let mut g = new_grid(32, 32, 2, 2);
        let mut w = SumOfWeights::zeros((2, 2));
        resampler
            .data_to_grid_parallel(g.view_mut(), w.view_mut(), &chunk, false, 5)
            .unwrap();
        g
    };
    assert_eq!(run(), run());

    assert!(matches!(
        resampler.data_to_grid_parallel(
            serial.view_mut(),
            serial_sumwt.view_mut(),
            &chunk,
            false,
            0
        ),
        Err(GridError::ZeroPartitioning { .. })
    ));
}

#[test]
fn test_parallel_degridding_matches_serial() {
    let cf = ConvolutionFunction::gaussian(2, 4, 1.5).unwrap();
    let maps = ChanPolMap::identity(3, 2);
    let resampler = VisibilityResampler::new(unit_mapper(16.0), &cf, &maps);
    let mut chunk = busy_chunk(2, 3, 57);
    chunk.row_range = 2..50;
    let grid = Grid::from_shape_fn((32, 32, 2, 3), |(x, y, p, c)| {
        c64::new((x as f64 * 0.3).sin() + p as f64, (y as f64 * 0.2).cos() - c as f64)
    });

    let mut serial = chunk.clone();
    let serial_stats = resampler.grid_to_data(grid.view(), &mut serial).unwrap();
    let mut parallel = chunk.clone();
    let parallel_stats = resampler
        .grid_to_data_parallel(grid.view(), &mut parallel, 10)
        .unwrap();

    assert_eq!(parallel_stats, serial_stats);
    assert_eq!(parallel.vis, serial.vis);
    // Rows outside the range are untouched.
    assert_eq!(
        parallel.vis.slice(s![.., .., 50..]),
        chunk.vis.slice(s![.., .., 50..])
    );
}

#[test]
fn test_shape_errors() {
    let cf = ConvolutionFunction::pillbox(0, 1).unwrap();
    let maps = ChanPolMap::identity(2, 1);
    let resampler = VisibilityResampler::new(unit_mapper(1.0), &cf, &maps);
    let chunk = chunk_with_uvws(1, 1, &[UVW::default()]);
    let mut grid = new_grid(3, 3, 1, 1);
    let mut sumwt = SumOfWeights::zeros((1, 1));
    match resampler.data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true) {
        Err(GridError::BadArrayShape { argument, .. }) => assert_eq!(argument, "chan_map"),
        other => panic!("unexpected {other:?}"),
    }

    let maps = ChanPolMap::identity(1, 1);
    let resampler = VisibilityResampler::new(unit_mapper(1.0), &cf, &maps);
    let mut sumwt = SumOfWeights::zeros((2, 1));
    match resampler.data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true) {
        Err(GridError::BadArrayShape { argument, .. }) => assert_eq!(argument, "sum_of_weights"),
        other => panic!("unexpected {other:?}"),
    }

    let mut chunk = chunk;
    chunk.row_range = 0..2;
    let mut sumwt = SumOfWeights::zeros((1, 1));
    assert!(matches!(
        resampler.data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true),
        Err(GridError::Chunk(ChunkError::BadRowRange { .. }))
    ));
}

#[test]
fn test_missing_conv_func_is_detected_up_front() {
    let mut store = ConvolutionFunctionStore::new(2);
    store
        .insert(0, 0, ConvolutionFunction::pillbox(0, 1).unwrap())
        .unwrap();
    let types = [0, 1];
    let source = StoreWithTypes {
        store: &store,
        antenna_types: &types,
    };
    let maps = ChanPolMap::identity(1, 1);
    let resampler = VisibilityResampler::new(unit_mapper(1.0), &source, &maps);

    let mut chunk = chunk_with_uvws(1, 1, &[UVW::default(), UVW::default()]);
    chunk.antenna1 = vec![0, 0];
    chunk.antenna2 = vec![0, 1];

    let mut grid = new_grid(3, 3, 1, 1);
    let mut sumwt = SumOfWeights::zeros((1, 1));
    assert!(matches!(
        resampler.data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true),
        Err(GridError::MissingConvFunc { row: 1, .. })
    ));
    // The first row wasn't gridded before the error.
    assert_abs_diff_eq!(sumwt[(0, 0)], 0.0);

    // Flagged rows don't need a function.
    chunk.row_flags[1] = true;
    let stats = resampler
        .data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, true)
        .unwrap();
    assert_eq!(stats.gridded, 1);
}

#[test]
fn test_normalise_grid() {
    let mut grid = Grid::from_elem((2, 2, 1, 2), c64::new(4.0, 2.0));
    let sumwt = array![[2.0, 0.0]];
    let num_zero = normalise_grid(grid.view_mut(), sumwt.view()).unwrap();
    assert_eq!(num_zero, 1);
    assert_abs_diff_eq!(grid[(1, 1, 0, 0)], c64::new(2.0, 1.0));
    assert_abs_diff_eq!(grid[(1, 1, 0, 1)], c64::new(4.0, 2.0));

    assert!(normalise_grid(grid.view_mut(), array![[1.0]].view()).is_err());
}
