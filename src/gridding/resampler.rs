// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The gridding and degridding loops.

use std::ops::Range;

use log::{debug, warn};
use ndarray::prelude::*;
use rayon::prelude::*;

use super::{
    cf::{ConvFuncSource, ConvolutionFunction, SampleIndex},
    mapper::{on_grid, CoordinateMapper},
    GridError, ResampleMode, ResampleStats,
};
use crate::{c32, c64, ChanPolMap, VisibilityChunk, UVW};

/// The read-only parts of a [`VisibilityChunk`] used by the loops. Kept apart
/// from the visibility cube so that degridding can write the cube while these
/// are shared.
struct RowInputs<'c> {
    uvw: &'c [UVW],
    freqs_hz: &'c [f64],
    delays_m: &'c [f64],
    imaging_weights: ArrayView2<'c, f32>,
    row_flags: &'c [bool],
    flags: ArrayView3<'c, bool>,
    antenna1: &'c [usize],
    antenna2: &'c [usize],
}

impl<'c> RowInputs<'c> {
    #[inline]
    fn antennas(&self, row: usize) -> Option<(usize, usize)> {
        Some((*self.antenna1.get(row)?, *self.antenna2.get(row)?))
    }
}

/// Kernel lookup buffers, sized for the largest support of a call. Holds the
/// weights of the last sample placed.
struct Lookups {
    x: Vec<f32>,
    y: Vec<f32>,
    len: [usize; 2],
}

impl Lookups {
    fn new(max_support: [usize; 2]) -> Self {
        Self {
            x: vec![0.0; 2 * max_support[0] + 1],
            y: vec![0.0; 2 * max_support[1] + 1],
            len: [0; 2],
        }
    }

    #[inline]
    fn fill(&mut self, cf: &ConvolutionFunction, off: [i64; 2]) {
        self.len = [2 * cf.support(0) + 1, 2 * cf.support(1) + 1];
        cf.fill_lookup(0, off[0], &mut self.x[..self.len[0]]);
        cf.fill_lookup(1, off[1], &mut self.y[..self.len[1]]);
    }

    /// The x and y weights of the last [`Lookups::fill`].
    #[inline]
    fn weights(&self) -> (&[f32], &[f32]) {
        (&self.x[..self.len[0]], &self.y[..self.len[1]])
    }
}

/// The corner of a sample's kernel footprint on the grid.
#[derive(Clone, Copy)]
struct Placement {
    x0: usize,
    y0: usize,
    phasor: c64,
}

/// Resamples between visibilities and a grid.
///
/// The mapper, convolution functions and channel/polarisation maps are fixed
/// for the lifetime of the resampler; grids and chunks are supplied per call.
/// Nothing is modified by a call except the grid and sum of weights
/// (gridding) or the visibility cube (degridding).
pub struct VisibilityResampler<'a, C: ConvFuncSource + ?Sized> {
    pub mapper: CoordinateMapper,
    pub cf: &'a C,
    pub maps: &'a ChanPolMap,
}

impl<'a, C: ConvFuncSource + ?Sized> VisibilityResampler<'a, C> {
    pub fn new(mapper: CoordinateMapper, cf: &'a C, maps: &'a ChanPolMap) -> Self {
        Self { mapper, cf, maps }
    }

    /// Grid or degrid `chunk`, depending on `mode`. `do_psf` and
    /// `sum_of_weights` are only used when gridding.
    pub fn accumulate(
        &self,
        grid: ArrayViewMut4<c64>,
        chunk: &mut VisibilityChunk,
        do_psf: bool,
        sum_of_weights: ArrayViewMut2<f64>,
        mode: ResampleMode,
    ) -> Result<ResampleStats, GridError> {
        match mode {
            ResampleMode::Grid => self.data_to_grid(grid, sum_of_weights, chunk, do_psf),
            ResampleMode::Degrid => self.grid_to_data(grid.view(), chunk),
        }
    }

    /// Convolve the unflagged visibilities in the chunk's row range onto
    /// `grid`, adding each sample's weight times its kernel sum to
    /// `sum_of_weights`. With `do_psf`, the imaging weight is gridded in
    /// place of each visibility.
    ///
    /// `grid` and `sum_of_weights` are added to, not overwritten.
    pub fn data_to_grid(
        &self,
        mut grid: ArrayViewMut4<c64>,
        mut sum_of_weights: ArrayViewMut2<f64>,
        chunk: &VisibilityChunk,
        do_psf: bool,
    ) -> Result<ResampleStats, GridError> {
        let function = "VisibilityResampler::data_to_grid";
        self.check_shapes(grid.dim(), Some(sum_of_weights.dim()), chunk, function)?;
        let inputs = row_inputs(chunk);
        let max_support = self.check_kernels(&inputs, chunk, grid.dim())?;

        let mut lookups = Lookups::new(max_support);
        let stats = self.grid_rows(
            &inputs,
            chunk.vis.view(),
            chunk.row_range.clone(),
            do_psf,
            &mut grid,
            &mut sum_of_weights,
            &mut lookups,
        )?;
        log_stats(function, &stats);
        Ok(stats)
    }

    /// The same as [`VisibilityResampler::data_to_grid`], but the chunk's
    /// rows are split into `num_partitions` contiguous ranges which are
    /// gridded in parallel into their own grids. The partial grids are then
    /// added to `grid` in ascending row order, so the result doesn't depend
    /// on the number of threads.
    pub fn data_to_grid_parallel(
        &self,
        mut grid: ArrayViewMut4<c64>,
        mut sum_of_weights: ArrayViewMut2<f64>,
        chunk: &VisibilityChunk,
        do_psf: bool,
        num_partitions: usize,
    ) -> Result<ResampleStats, GridError> {
        let function = "VisibilityResampler::data_to_grid_parallel";
        if num_partitions == 0 {
            return Err(GridError::ZeroPartitioning {
                what: "partitions",
            });
        }
        self.check_shapes(grid.dim(), Some(sum_of_weights.dim()), chunk, function)?;
        let inputs = row_inputs(chunk);
        let max_support = self.check_kernels(&inputs, chunk, grid.dim())?;

        let rows = chunk.row_range.clone();
        let rows_per_partition = ((rows.len() + num_partitions - 1) / num_partitions).max(1);
        let ranges: Vec<Range<usize>> = rows
            .clone()
            .step_by(rows_per_partition)
            .map(|start| start..(start + rows_per_partition).min(rows.end))
            .collect();

        let grid_dim = grid.dim();
        let sumwt_dim = sum_of_weights.dim();
        let partials: Vec<(Array4<c64>, Array2<f64>, ResampleStats)> = ranges
            .into_par_iter()
            .map(|range| {
                let mut partial_grid = Array4::zeros(grid_dim);
                let mut partial_sumwt = Array2::zeros(sumwt_dim);
                let mut lookups = Lookups::new(max_support);
                let stats = self.grid_rows(
                    &inputs,
                    chunk.vis.view(),
                    range,
                    do_psf,
                    &mut partial_grid.view_mut(),
                    &mut partial_sumwt.view_mut(),
                    &mut lookups,
                )?;
                Ok::<_, GridError>((partial_grid, partial_sumwt, stats))
            })
            .collect::<Result<_, _>>()?;

        let mut stats = ResampleStats::default();
        for (partial_grid, partial_sumwt, partial_stats) in partials {
            grid += &partial_grid;
            sum_of_weights += &partial_sumwt;
            stats += partial_stats;
        }
        log_stats(function, &stats);
        Ok(stats)
    }

    /// Predict the visibilities in the chunk's row range from `grid`. Each
    /// unflagged sample is overwritten with the kernel-weighted mean of the
    /// grid around it. Samples whose kernel weights sum to zero are set to
    /// zero and counted as degenerate.
    pub fn grid_to_data(
        &self,
        grid: ArrayView4<c64>,
        chunk: &mut VisibilityChunk,
    ) -> Result<ResampleStats, GridError> {
        let function = "VisibilityResampler::grid_to_data";
        self.check_shapes(grid.dim(), None, chunk, function)?;
        let max_support = self.check_kernels(&row_inputs(chunk), chunk, grid.dim())?;

        let rows = chunk.row_range.clone();
        // Borrow the fields separately so the visibilities can be written.
        let inputs = RowInputs {
            uvw: &chunk.uvw,
            freqs_hz: &chunk.freqs_hz,
            delays_m: &chunk.delays_m,
            imaging_weights: chunk.imaging_weights.view(),
            row_flags: &chunk.row_flags,
            flags: chunk.flags.view(),
            antenna1: &chunk.antenna1,
            antenna2: &chunk.antenna2,
        };
        let mut lookups = Lookups::new(max_support);
        let stats = self.degrid_rows(
            &inputs,
            grid,
            rows,
            chunk.vis.view_mut(),
            0,
            &mut lookups,
        )?;
        log_stats(function, &stats);
        Ok(stats)
    }

    /// The same as [`VisibilityResampler::grid_to_data`], with the rows split
    /// into tasks of `rows_per_task` rows. Each task writes its own rows of
    /// the visibility cube.
    pub fn grid_to_data_parallel(
        &self,
        grid: ArrayView4<c64>,
        chunk: &mut VisibilityChunk,
        rows_per_task: usize,
    ) -> Result<ResampleStats, GridError> {
        let function = "VisibilityResampler::grid_to_data_parallel";
        if rows_per_task == 0 {
            return Err(GridError::ZeroPartitioning {
                what: "rows per task",
            });
        }
        self.check_shapes(grid.dim(), None, chunk, function)?;
        let max_support = self.check_kernels(&row_inputs(chunk), chunk, grid.dim())?;

        let rows = chunk.row_range.clone();
        // Borrow the fields separately so the visibilities can be written.
        let inputs = RowInputs {
            uvw: &chunk.uvw,
            freqs_hz: &chunk.freqs_hz,
            delays_m: &chunk.delays_m,
            imaging_weights: chunk.imaging_weights.view(),
            row_flags: &chunk.row_flags,
            flags: chunk.flags.view(),
            antenna1: &chunk.antenna1,
            antenna2: &chunk.antenna2,
        };
        let stats = chunk
            .vis
            .slice_mut(s![.., .., rows.start..rows.end])
            .axis_chunks_iter_mut(Axis(2), rows_per_task)
            .into_par_iter()
            .enumerate()
            .map(|(i_task, vis)| {
                let start = rows.start + i_task * rows_per_task;
                let task_rows = start..start + vis.len_of(Axis(2));
                let mut lookups = Lookups::new(max_support);
                self.degrid_rows(&inputs, grid, task_rows, vis, start, &mut lookups)
            })
            .collect::<Result<Vec<_>, GridError>>()?
            .into_iter()
            .fold(ResampleStats::default(), |a, b| a + b);
        log_stats(function, &stats);
        Ok(stats)
    }

    /// Check everything that could make the loops index out of bounds.
    fn check_shapes(
        &self,
        grid_dim: (usize, usize, usize, usize),
        sumwt_dim: Option<(usize, usize)>,
        chunk: &VisibilityChunk,
        function: &str,
    ) -> Result<(), GridError> {
        chunk.validate()?;
        let (num_pols, num_chans, _) = chunk.dims();
        let bad_shape = |argument: &str, expected: String, received: String| {
            Err(GridError::BadArrayShape {
                argument: argument.to_string(),
                function: function.to_string(),
                expected,
                received,
            })
        };

        if self.maps.chan_map.len() != num_chans {
            return bad_shape(
                "chan_map",
                format!("({num_chans})"),
                format!("({})", self.maps.chan_map.len()),
            );
        }
        if self.maps.pol_map.len() != num_pols {
            return bad_shape(
                "pol_map",
                format!("({num_pols})"),
                format!("({})", self.maps.pol_map.len()),
            );
        }
        let (_, _, grid_pols, grid_chans) = grid_dim;
        if let Some(sumwt_dim) = sumwt_dim {
            if sumwt_dim != (grid_pols, grid_chans) {
                return bad_shape(
                    "sum_of_weights",
                    format!("({grid_pols}, {grid_chans})"),
                    format!("{sumwt_dim:?}"),
                );
            }
        }
        Ok(())
    }

    /// Find the convolution function of every sample that will be resampled,
    /// so that a missing function is reported before anything is written.
    /// Returns the largest support among them.
    fn check_kernels(
        &self,
        inputs: &RowInputs,
        chunk: &VisibilityChunk,
        grid_dim: (usize, usize, usize, usize),
    ) -> Result<[usize; 2], GridError> {
        if let Some(cf) = self.cf.uniform() {
            return Ok(cf.supports());
        }
        let (_, _, grid_pols, grid_chans) = grid_dim;
        let (num_pols, num_chans, _) = chunk.dims();
        let mut max_support = [0; 2];
        for row in chunk.row_range.clone() {
            if inputs.row_flags[row] {
                continue;
            }
            let antennas = inputs.antennas(row);
            for ichan in 0..num_chans {
                if inputs.imaging_weights[(ichan, row)] == 0.0 {
                    continue;
                }
                let Some(grid_chan) = self.maps.grid_chan(ichan, grid_chans) else {
                    continue;
                };
                for ipol in 0..num_pols {
                    if inputs.flags[(ipol, ichan, row)] {
                        continue;
                    }
                    let Some(grid_pol) = self.maps.grid_pol(ipol, grid_pols) else {
                        continue;
                    };
                    let cf = self.cf.for_sample(&SampleIndex {
                        row,
                        antennas,
                        grid_chan,
                        grid_pol,
                    })?;
                    for (m, s) in max_support.iter_mut().zip(cf.supports()) {
                        *m = (*m).max(s);
                    }
                }
            }
        }
        Ok(max_support)
    }

    /// Map the sample of `row` and `ichan` with `cf` and fill `lookups` with
    /// its weights. `None` if the footprint isn't entirely on the grid.
    #[inline]
    fn place(
        &self,
        inputs: &RowInputs,
        row: usize,
        ichan: usize,
        cf: &ConvolutionFunction,
        (nx, ny): (usize, usize),
        lookups: &mut Lookups,
    ) -> Option<Placement> {
        let p = self.mapper.map(
            inputs.uvw[row],
            inputs.freqs_hz[ichan],
            inputs.delays_m[row],
            cf.samplings(),
        )?;
        let support = cf.supports();
        if !on_grid(p.loc, support, nx, ny) {
            return None;
        }
        lookups.fill(cf, p.off);
        Some(Placement {
            x0: (p.loc[0] - support[0] as i64) as usize,
            y0: (p.loc[1] - support[1] as i64) as usize,
            phasor: p.phasor,
        })
    }

    /// The gridding loop over `rows`.
    #[allow(clippy::too_many_arguments)]
    fn grid_rows(
        &self,
        inputs: &RowInputs,
        vis: ArrayView3<c32>,
        rows: Range<usize>,
        do_psf: bool,
        grid: &mut ArrayViewMut4<c64>,
        sum_of_weights: &mut ArrayViewMut2<f64>,
        lookups: &mut Lookups,
    ) -> Result<ResampleStats, GridError> {
        let (nx, ny, grid_pols, grid_chans) = grid.dim();
        let (num_pols, num_chans, _) = vis.dim();
        let mut stats = ResampleStats::default();

        for row in rows {
            if inputs.row_flags[row] {
                stats.flagged += num_pols * num_chans;
                continue;
            }
            let antennas = inputs.antennas(row);

            for ichan in 0..num_chans {
                let weight = inputs.imaging_weights[(ichan, row)];
                if weight == 0.0 {
                    continue;
                }
                let achan = match self.maps.grid_chan(ichan, grid_chans) {
                    Some(c) => c,
                    None => {
                        stats.discarded += num_pols;
                        continue;
                    }
                };
                let weight = weight as f64;
                // The placement is reused while consecutive polarisations
                // share a kernel.
                let mut current: Option<(&ConvolutionFunction, Option<Placement>)> = None;

                for ipol in 0..num_pols {
                    if inputs.flags[(ipol, ichan, row)] {
                        stats.flagged += 1;
                        continue;
                    }
                    let apol = match self.maps.grid_pol(ipol, grid_pols) {
                        Some(a) => a,
                        None => {
                            stats.discarded += 1;
                            continue;
                        }
                    };
                    let cf = self.cf.for_sample(&SampleIndex {
                        row,
                        antennas,
                        grid_chan: achan,
                        grid_pol: apol,
                    })?;
                    let placement = match current {
                        Some((last, placement)) if std::ptr::eq(last, cf) => placement,
                        _ => {
                            let placement = self.place(inputs, row, ichan, cf, (nx, ny), lookups);
                            current = Some((cf, placement));
                            placement
                        }
                    };
                    let Some(Placement { x0, y0, phasor }) = placement else {
                        stats.off_grid += 1;
                        continue;
                    };
                    let (lx, ly) = lookups.weights();

                    let nvalue = if do_psf {
                        c64::new(weight, 0.0)
                    } else {
                        let v = vis[(ipol, ichan, row)];
                        c64::new(v.re as f64, v.im as f64) * weight * phasor
                    };

                    let mut plane = grid.slice_mut(s![.., .., apol, achan]);
                    let mut norm = 0.0;
                    for (iy, &wy) in ly.iter().enumerate() {
                        for (ix, &wx) in lx.iter().enumerate() {
                            let wt = wx as f64 * wy as f64;
                            plane[(x0 + ix, y0 + iy)] += nvalue * wt;
                            norm += wt;
                        }
                    }
                    sum_of_weights[(apol, achan)] += weight * norm;
                    stats.gridded += 1;
                }
            }
        }
        Ok(stats)
    }

    /// The degridding loop over `rows`. Row `r` of the chunk is row
    /// `r - vis_row0` of `vis`.
    fn degrid_rows(
        &self,
        inputs: &RowInputs,
        grid: ArrayView4<c64>,
        rows: Range<usize>,
        mut vis: ArrayViewMut3<c32>,
        vis_row0: usize,
        lookups: &mut Lookups,
    ) -> Result<ResampleStats, GridError> {
        let (nx, ny, grid_pols, grid_chans) = grid.dim();
        let (num_pols, num_chans, _) = vis.dim();
        let mut stats = ResampleStats::default();

        for row in rows {
            if inputs.row_flags[row] {
                stats.flagged += num_pols * num_chans;
                continue;
            }
            let antennas = inputs.antennas(row);

            for ichan in 0..num_chans {
                if inputs.imaging_weights[(ichan, row)] == 0.0 {
                    continue;
                }
                let achan = match self.maps.grid_chan(ichan, grid_chans) {
                    Some(c) => c,
                    None => {
                        stats.discarded += num_pols;
                        continue;
                    }
                };
                let mut current: Option<(&ConvolutionFunction, Option<Placement>)> = None;

                for ipol in 0..num_pols {
                    if inputs.flags[(ipol, ichan, row)] {
                        stats.flagged += 1;
                        continue;
                    }
                    let apol = match self.maps.grid_pol(ipol, grid_pols) {
                        Some(a) => a,
                        None => {
                            stats.discarded += 1;
                            continue;
                        }
                    };
                    let cf = self.cf.for_sample(&SampleIndex {
                        row,
                        antennas,
                        grid_chan: achan,
                        grid_pol: apol,
                    })?;
                    let placement = match current {
                        Some((last, placement)) if std::ptr::eq(last, cf) => placement,
                        _ => {
                            let placement = self.place(inputs, row, ichan, cf, (nx, ny), lookups);
                            current = Some((cf, placement));
                            placement
                        }
                    };
                    let Some(Placement { x0, y0, phasor }) = placement else {
                        stats.off_grid += 1;
                        continue;
                    };
                    let (lx, ly) = lookups.weights();

                    let plane = grid.slice(s![.., .., apol, achan]);
                    let mut nvalue = c64::new(0.0, 0.0);
                    let mut norm = 0.0;
                    for (iy, &wy) in ly.iter().enumerate() {
                        for (ix, &wx) in lx.iter().enumerate() {
                            let wt = wx as f64 * wy as f64;
                            nvalue += plane[(x0 + ix, y0 + iy)] * wt;
                            norm += wt;
                        }
                    }

                    let out = &mut vis[(ipol, ichan, row - vis_row0)];
                    if norm != 0.0 {
                        let v = nvalue * phasor.conj() / norm;
                        *out = c32::new(v.re as f32, v.im as f32);
                    } else {
                        *out = c32::new(0.0, 0.0);
                        stats.degenerate += 1;
                    }
                    stats.gridded += 1;
                }
            }
        }
        Ok(stats)
    }
}

fn row_inputs(chunk: &VisibilityChunk) -> RowInputs {
    RowInputs {
        uvw: &chunk.uvw,
        freqs_hz: &chunk.freqs_hz,
        delays_m: &chunk.delays_m,
        imaging_weights: chunk.imaging_weights.view(),
        row_flags: &chunk.row_flags,
        flags: chunk.flags.view(),
        antenna1: &chunk.antenna1,
        antenna2: &chunk.antenna2,
    }
}

fn log_stats(function: &str, stats: &ResampleStats) {
    debug!("{function}: {stats}");
    if stats.degenerate > 0 {
        warn!(
            "{function}: {} degridded sample(s) had a zero kernel sum and were set to zero",
            stats.degenerate
        );
    }
}
