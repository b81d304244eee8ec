// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Gridding Benchmarks

use criterion::*;
use hifitime::Epoch;
use visresample::{
    c32, c64,
    constants::DEFAULT_ROWS_PER_TASK,
    gridding::new_grid,
    ndarray::Axis,
    AntennaType, ApertureCombiner, ApertureConfig, BeamQuery, ChanPolMap, ConvolutionFunction,
    CoordinateMapper, PolProduct, RADec, ResponseTable, SkyCoordinates, VisibilityChunk,
    VisibilityResampler, UVW,
};

const NX: usize = 512;
const NUM_POLS: usize = 4;
const NUM_CHANS: usize = 16;
const NUM_ROWS: usize = 8128;

/// A chunk with a spiral of baselines. The values are otherwise irrelevant.
fn chunk() -> VisibilityChunk {
    let mut chunk = VisibilityChunk::allocate(NUM_POLS, NUM_CHANS, NUM_ROWS).unwrap();
    for (i, uvw) in chunk.uvw.iter_mut().enumerate() {
        let r = 10.0 + 1000.0 * i as f64 / NUM_ROWS as f64;
        let theta = i as f64 * 0.1;
        *uvw = UVW {
            u: r * theta.cos(),
            v: r * theta.sin(),
            w: 0.0,
        };
    }
    for (i, f) in chunk.freqs_hz.iter_mut().enumerate() {
        *f = 100e9 + i as f64 * 1e6;
    }
    chunk.vis.fill(c32::new(1.0, -1.0));
    chunk
}

fn mapper() -> CoordinateMapper {
    CoordinateMapper::for_image(NX, NX, [2e-6, 2e-6])
}

fn gridding(c: &mut Criterion) {
    let cf = ConvolutionFunction::gaussian(3, 32, 2.0).unwrap();
    let maps = ChanPolMap::identity(NUM_CHANS, NUM_POLS);
    let resampler = VisibilityResampler::new(mapper(), &cf, &maps);

    c.bench_function("data_to_grid", |b| {
        let chunk = chunk();
        let mut grid = new_grid(NX, NX, NUM_POLS, NUM_CHANS);
        let mut sumwt = visresample::ndarray::Array2::zeros((NUM_POLS, NUM_CHANS));
        b.iter(|| {
            resampler
                .data_to_grid(grid.view_mut(), sumwt.view_mut(), &chunk, false)
                .unwrap()
        })
    });

    // Is partitioned gridding worth the extra grids?
    for num_partitions in [4, 16] {
        c.bench_function(&format!("data_to_grid_parallel ({num_partitions})"), |b| {
            let chunk = chunk();
            let mut grid = new_grid(NX, NX, NUM_POLS, NUM_CHANS);
            let mut sumwt = visresample::ndarray::Array2::zeros((NUM_POLS, NUM_CHANS));
            b.iter(|| {
                resampler
                    .data_to_grid_parallel(
                        grid.view_mut(),
                        sumwt.view_mut(),
                        &chunk,
                        false,
                        num_partitions,
                    )
                    .unwrap()
            })
        });
    }

    c.bench_function("grid_to_data", |b| {
        let mut chunk = chunk();
        let mut grid = new_grid(NX, NX, NUM_POLS, NUM_CHANS);
        grid.index_axis_mut(Axis(0), NX / 2).fill(c64::new(1.0, 0.0));
        b.iter(|| resampler.grid_to_data(grid.view(), &mut chunk).unwrap())
    });

    c.bench_function("grid_to_data_parallel", |b| {
        let mut chunk = chunk();
        let mut grid = new_grid(NX, NX, NUM_POLS, NUM_CHANS);
        grid.index_axis_mut(Axis(0), NX / 2).fill(c64::new(1.0, 0.0));
        b.iter(|| {
            resampler
                .grid_to_data_parallel(grid.view(), &mut chunk, DEFAULT_ROWS_PER_TASK)
                .unwrap()
        })
    });
}

fn aperture(c: &mut Criterion) {
    let query = BeamQuery {
        antenna_types: (AntennaType::DA, AntennaType::CM),
        freq_hz: 100e9,
        epoch: Epoch::from_gregorian_utc_at_midnight(2020, 6, 1),
        pointing: None,
        parallactic_angle_rad: 0.3,
    };
    let coords = SkyCoordinates {
        reference: RADec::from_degrees(0.0, -30.0),
        ref_pixel: [128.0, 128.0],
        cell_rad: [2e-5, 2e-5],
    };

    c.bench_function("apply_sky", |b| {
        // The cache is warm after the first iteration; this times the FFTs and
        // rotations.
        let combiner = ApertureCombiner::new(ApertureConfig::default(), ResponseTable::new());
        b.iter(|| {
            combiner
                .apply_sky(&query, &PolProduct::ALL, &coords, (256, 256))
                .unwrap()
        })
    });
}

criterion_group!(benches, gridding, aperture);
criterion_main!(benches);
