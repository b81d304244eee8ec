// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Combining the EFPs of two antennas into polarisation products.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use hifitime::{Duration, Epoch};
use log::{debug, trace};
use ndarray::{prelude::*, Zip};
use rayon::prelude::*;
use rustfft::FftDirection;

use super::{
    sky::regrid_beam, AnalyticAperture, AntennaType, ApertureConfig, ApertureError,
    ApertureResponse, PolProduct, ResponseTable, SkyCoordinates, SkyImage,
};
use crate::{
    c64,
    constants::{POLN_X_INDEX, POLN_Y_INDEX, VEL_C},
    math::{centred_fft2, rotate_plane},
    HADec, Pointing, RADec,
};

type EfpKey = (AntennaType, u64, u64, Option<(u64, u64)>);

#[derive(Debug, Default)]
struct CacheEntries {
    map: HashMap<EfpKey, (Arc<ApertureResponse>, u64)>,
    /// Incremented on every access; an entry's stamp is the tick of its last
    /// use.
    tick: u64,
}

/// EFPs that have already been looked up or synthesised, keyed by antenna
/// type, frequency, time interval and pointing.
///
/// Times are grouped into intervals of `time_tolerance_s` seconds, and at
/// most `capacity` EFPs are kept; the least recently used is evicted to make
/// room.
#[derive(Debug)]
pub struct EfpCache {
    capacity: usize,
    time_tolerance_s: f64,
    entries: Mutex<CacheEntries>,
}

impl EfpCache {
    pub fn new(capacity: usize, time_tolerance_s: f64) -> Self {
        Self {
            capacity,
            time_tolerance_s,
            entries: Mutex::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn key(
        &self,
        antenna_type: AntennaType,
        freq_hz: f64,
        epoch: Epoch,
        pointing: Option<RADec>,
    ) -> EfpKey {
        let gpst_s = epoch.to_gpst_seconds();
        let time = if self.time_tolerance_s > 0.0 {
            (gpst_s / self.time_tolerance_s).floor() as i64 as u64
        } else {
            gpst_s.to_bits()
        };
        (
            antenna_type,
            freq_hz.to_bits(),
            time,
            pointing.map(|p| (p.ra.to_bits(), p.dec.to_bits())),
        )
    }

    // The entries are always left consistent, so a poisoned lock is still
    // usable.
    fn lock(&self) -> MutexGuard<CacheEntries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(
        &self,
        antenna_type: AntennaType,
        freq_hz: f64,
        epoch: Epoch,
        pointing: Option<RADec>,
    ) -> Option<Arc<ApertureResponse>> {
        let key = self.key(antenna_type, freq_hz, epoch, pointing);
        let mut guard = self.lock();
        let entries = &mut *guard;
        let (response, stamp) = entries.map.get_mut(&key)?;
        entries.tick += 1;
        *stamp = entries.tick;
        Some(Arc::clone(response))
    }

    pub fn insert(
        &self,
        antenna_type: AntennaType,
        freq_hz: f64,
        epoch: Epoch,
        pointing: Option<RADec>,
        response: Arc<ApertureResponse>,
    ) {
        if self.capacity == 0 {
            return;
        }
        let key = self.key(antenna_type, freq_hz, epoch, pointing);
        let mut guard = self.lock();
        let entries = &mut *guard;
        if !entries.map.contains_key(&key) && entries.map.len() >= self.capacity {
            let oldest = entries
                .map
                .iter()
                .min_by_key(|(_, (_, stamp))| *stamp)
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                trace!("Evicting the EFP for {} from the cache", oldest.0);
                entries.map.remove(&oldest);
            }
        }
        entries.tick += 1;
        let tick = entries.tick;
        entries.map.insert(key, (response, tick));
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }

    pub fn clear(&self) {
        self.lock().map.clear();
    }
}

/// The baseline, frequency, time and orientation of a beam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamQuery {
    pub antenna_types: (AntennaType, AntennaType),
    /// \[Hz\]
    pub freq_hz: f64,
    pub epoch: Epoch,
    /// The pointing centre, if the response depends on it or the beam should
    /// be shifted away from the sky reference direction. Topocentric
    /// pointings are converted to J2000 at `epoch`.
    pub pointing: Option<Pointing>,
    /// \[radians\]
    pub parallactic_angle_rad: f64,
}

/// The index of a Jones plane among the two feed factors of an antenna.
#[inline]
fn feed_slot(jones_index: usize) -> usize {
    if jones_index == POLN_X_INDEX {
        0
    } else {
        1
    }
}

/// The beam of polarisation product `pq` from antenna 1's `p` factor and
/// antenna 2's `q` factor. Without squint, only the amplitudes are kept.
pub fn pol_product(f1: ArrayView2<c64>, f2: ArrayView2<c64>, do_squint: bool) -> Array2<c64> {
    Zip::from(f1).and(f2).map_collect(|&a, &b| {
        if do_squint {
            a * b.conj()
        } else {
            c64::new(a.norm() * b.norm(), 0.0)
        }
    })
}

fn peak_normalise(plane: &mut Array2<c64>) {
    let peak = plane.iter().map(|v| v.norm()).fold(0.0, f64::max);
    if peak > 0.0 {
        plane.mapv_inplace(|v| v / peak);
    }
}

/// Forms primary-beam products for pairs of antenna types.
#[derive(Debug)]
pub struct ApertureCombiner {
    pub config: ApertureConfig,
    table: ResponseTable,
    cache: EfpCache,
}

impl ApertureCombiner {
    pub fn new(config: ApertureConfig, table: ResponseTable) -> Self {
        Self {
            cache: EfpCache::new(config.efp_cache_capacity, config.efp_time_tolerance_s),
            config,
            table,
        }
    }

    pub fn table(&self) -> &ResponseTable {
        &self.table
    }

    pub fn cache(&self) -> &EfpCache {
        &self.cache
    }

    /// The parallactic angle of a direction at the configured latitude.
    pub fn parallactic_angle(&self, hadec: HADec) -> f64 {
        hadec.get_parallactic_angle(self.config.latitude_rad)
    }

    /// The pointing of a query in J2000, which is the frame of response
    /// tables and sky coordinates.
    pub fn pointing_j2000(&self, query: &BeamQuery) -> Option<RADec> {
        let config = &self.config;
        query.pointing.map(|pointing| {
            pointing.to_j2000(
                query.epoch,
                config.longitude_rad,
                config.latitude_rad,
                Duration::from_seconds(config.dut1_s),
            )
        })
    }

    /// The EFP of `antenna_type` from the cache, the response table or, if
    /// allowed, synthesis. `pointing` is in J2000.
    ///
    /// # Errors
    ///
    /// Returns `ApertureError::NoMatchingResponse` if the table has no match
    /// and synthesis is disabled.
    pub fn efp(
        &self,
        antenna_type: AntennaType,
        freq_hz: f64,
        epoch: Epoch,
        pointing: Option<RADec>,
    ) -> Result<Arc<ApertureResponse>, ApertureError> {
        if let Some(response) = self.cache.get(antenna_type, freq_hz, epoch, pointing) {
            trace!("EFP cache hit for {antenna_type} at {freq_hz} Hz");
            return Ok(response);
        }
        trace!("EFP cache miss for {antenna_type} at {freq_hz} Hz");

        let config = &self.config;
        let response = match self.table.lookup(
            &config.observatory,
            antenna_type,
            freq_hz,
            epoch,
            pointing,
            config.pointing_tolerance_rad,
        ) {
            Some(entry) => Arc::clone(&entry.response),
            None if config.allow_synthesis => {
                debug!("Synthesising an EFP for {antenna_type} at {freq_hz} Hz");
                Arc::new(
                    AnalyticAperture::for_antenna_type(antenna_type).synthesise(
                        freq_hz,
                        config.aperture_size,
                        config.cell_m,
                    ),
                )
            }
            None => {
                return Err(ApertureError::NoMatchingResponse {
                    observatory: config.observatory.clone(),
                    antenna_type: antenna_type.to_string(),
                    freq_hz,
                })
            }
        };
        self.cache
            .insert(antenna_type, freq_hz, epoch, pointing, Arc::clone(&response));
        Ok(response)
    }

    /// The EFPs of both antennas of a query. They must have the same size and
    /// pixel scale.
    fn efp_pair(
        &self,
        query: &BeamQuery,
    ) -> Result<(Arc<ApertureResponse>, Arc<ApertureResponse>), ApertureError> {
        let (type1, type2) = query.antenna_types;
        let pointing = self.pointing_j2000(query);
        let efp1 = self.efp(type1, query.freq_hz, query.epoch, pointing)?;
        let efp2 = if type2 == type1 {
            Arc::clone(&efp1)
        } else {
            self.efp(type2, query.freq_hz, query.epoch, pointing)?
        };
        if efp1.dim() != efp2.dim() || efp1.cell_m != efp2.cell_m {
            return Err(ApertureError::BadArrayShape {
                argument: format!("{type2} EFP"),
                function: "ApertureCombiner::efp_pair".to_string(),
                expected: format!("{:?} with {} m cells", efp1.dim(), efp1.cell_m),
                received: format!("{:?} with {} m cells", efp2.dim(), efp2.cell_m),
            });
        }
        Ok((efp1, efp2))
    }

    /// The total rotation of each antenna of a query \[radians\].
    fn rotation_angles(&self, query: &BeamQuery) -> (f64, f64) {
        let (type1, type2) = query.antenna_types;
        let offsets = &self.config.rotation_offsets_rad;
        (
            query.parallactic_angle_rad + offsets[type1.index()],
            query.parallactic_angle_rad + offsets[type2.index()],
        )
    }

    /// Form `pols` from the X and Y factors of both antennas. If
    /// `rotate_each`, each factor is rotated by its antenna's angle before
    /// multiplying; otherwise the product is rotated by antenna 1's angle.
    fn form_products(
        &self,
        mut factors1: [Array2<c64>; 2],
        mut factors2: [Array2<c64>; 2],
        angles: (f64, f64),
        rotate_each: bool,
        pols: &[PolProduct],
    ) -> Array3<c64> {
        if rotate_each {
            for f in factors1.iter_mut() {
                *f = rotate_plane(f.view(), angles.0);
            }
            for f in factors2.iter_mut() {
                *f = rotate_plane(f.view(), angles.1);
            }
        }

        let (nx, ny) = factors1[0].dim();
        let mut out = Array3::zeros((nx, ny, pols.len()));
        out.axis_iter_mut(Axis(2))
            .into_par_iter()
            .zip(pols.par_iter())
            .for_each(|(mut plane, pol)| {
                let (i1, i2) = pol.factor_indices();
                let product = pol_product(
                    factors1[feed_slot(i1)].view(),
                    factors2[feed_slot(i2)].view(),
                    self.config.do_squint,
                );
                if rotate_each {
                    plane.assign(&product);
                } else {
                    plane.assign(&rotate_plane(product.view(), angles.0));
                }
            });
        out
    }

    /// The aperture-plane products `pols` of a baseline, indexed
    /// `[x][y][pol]`.
    ///
    /// When both antenna types have the same rotation offset, each product is
    /// rotated once; otherwise each factor is rotated by its own angle first.
    pub fn aperture_products(
        &self,
        query: &BeamQuery,
        pols: &[PolProduct],
    ) -> Result<Array3<c64>, ApertureError> {
        let angles = self.rotation_angles(query);
        self.aperture_products_inner(query, pols, angles.0 != angles.1)
    }

    fn aperture_products_inner(
        &self,
        query: &BeamQuery,
        pols: &[PolProduct],
        rotate_each: bool,
    ) -> Result<Array3<c64>, ApertureError> {
        let (efp1, efp2) = self.efp_pair(query)?;
        let factors = |efp: &ApertureResponse| {
            [
                efp.factor(POLN_X_INDEX).to_owned(),
                efp.factor(POLN_Y_INDEX).to_owned(),
            ]
        };
        Ok(self.form_products(
            factors(&*efp1),
            factors(&*efp2),
            self.rotation_angles(query),
            rotate_each,
            pols,
        ))
    }

    /// The sky-plane products `pols` of a baseline on an image of `shape`
    /// pixels with coordinates `coords`.
    ///
    /// Each EFP factor is Fourier transformed to the sky and normalised to a
    /// peak of one before products are formed and rotated. An EFP of `n`
    /// pixels of `cell_m` metres gives sky pixels of `c / (freq * n * cell_m)`
    /// radians. The beam is centred on the query's pointing, or on the
    /// reference direction of `coords` if there isn't one.
    pub fn apply_sky(
        &self,
        query: &BeamQuery,
        pols: &[PolProduct],
        coords: &SkyCoordinates,
        shape: (usize, usize),
    ) -> Result<SkyImage, ApertureError> {
        let angles = self.rotation_angles(query);
        self.apply_sky_inner(query, pols, coords, shape, angles.0 != angles.1)
    }

    fn apply_sky_inner(
        &self,
        query: &BeamQuery,
        pols: &[PolProduct],
        coords: &SkyCoordinates,
        shape: (usize, usize),
        rotate_each: bool,
    ) -> Result<SkyImage, ApertureError> {
        let (efp1, efp2) = self.efp_pair(query)?;
        let to_sky = |efp: &ApertureResponse, jones_index: usize| {
            let mut plane = efp.factor(jones_index).to_owned();
            centred_fft2(&mut plane, FftDirection::Forward);
            peak_normalise(&mut plane);
            plane
        };
        let factors1 = [to_sky(&*efp1, POLN_X_INDEX), to_sky(&*efp1, POLN_Y_INDEX)];
        let factors2 = if Arc::ptr_eq(&efp1, &efp2) {
            factors1.clone()
        } else {
            [to_sky(&*efp2, POLN_X_INDEX), to_sky(&*efp2, POLN_Y_INDEX)]
        };
        let products = self.form_products(
            factors1,
            factors2,
            self.rotation_angles(query),
            rotate_each,
            pols,
        );

        let (n0, n1) = efp1.dim();
        let beam_cell_rad = [
            VEL_C / (query.freq_hz * n0 as f64 * efp1.cell_m),
            VEL_C / (query.freq_hz * n1 as f64 * efp1.cell_m),
        ];
        let centre_lm = match self.pointing_j2000(query) {
            Some(pointing) => {
                let lmn = pointing.to_lmn(coords.reference);
                (lmn.l, lmn.m)
            }
            None => (0.0, 0.0),
        };
        debug!(
            "Regridding {} beam product(s) with {:.3e} rad pixels onto a {shape:?} image",
            pols.len(),
            beam_cell_rad[0]
        );

        let mut data = Array3::zeros((shape.0, shape.1, pols.len()));
        for (out, product) in data.axis_iter_mut(Axis(2)).zip(products.axis_iter(Axis(2))) {
            regrid_beam(product, beam_cell_rad, centre_lm, coords, out);
        }
        Ok(SkyImage {
            data,
            coords: *coords,
            pols: pols.to_vec(),
        })
    }
}
