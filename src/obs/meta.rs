// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-tile and astrometric metadata for an observation.
//!
//! [`ObsMeta`] prefers the metafits file next to the uvfits input; when it
//! is absent, everything is inferred from the uvfits header and the
//! baselines actually present in the data.

use std::f64::consts::FRAC_PI_2;

use log::{info, warn};
use marlu::{
    hifitime::{Epoch, Unit},
    AzEl, RADec,
};
use thiserror::Error;

use super::Obs;
use crate::{
    astrom::SinProjection,
    config::RunConfig,
    io::{
        error::IOError,
        metafits::read_metafits,
        uvfits::{GroupParams, UvfitsHeader},
    },
    pos::{altaz_to_radec, lst_rad, radec_to_altaz},
    util::{argunique, histogram},
};

/// Errors that can occur when building an [`ObsMeta`].
#[derive(Error, Debug)]
pub enum MetaError {
    /// The metafits metadata flags every tile but one.
    #[error("All tiles but one are flagged in the metafits metadata")]
    AllTilesFlagged,

    /// An error when reading the metafits file.
    #[error(transparent)]
    IO(#[from] IOError),
}

/// Observation metadata derived from the uvfits and metafits files.
#[derive(Debug, Clone)]
pub struct ObsMeta {
    /// Julian date of each timestep.
    pub jdate: Vec<f64>,
    /// The reference Julian date (the first timestep).
    pub jd0: f64,
    /// The reference date as a decimal year.
    pub epoch: f64,
    /// Image centre pixel on the first axis, 0-based.
    pub obsx: f64,
    /// Image centre pixel on the second axis, 0-based.
    pub obsy: f64,
    /// Tile numbers, per tile.
    pub tile_names: Vec<u32>,
    /// Tile heights relative to the array centre \[metres\].
    pub tile_heights: Vec<f64>,
    /// Tile flags.
    pub tile_flags: Vec<bool>,
    /// The pointed observation centre.
    pub obs_radec: RADec,
    /// The phase-tracking centre.
    pub phase_radec: RADec,
    /// Time resolution \[seconds\].
    pub time_res: f64,
    /// Beamformer delays; only available with a metafits file.
    pub delays: Option<Vec<u32>>,
    /// The local zenith at the reference date.
    pub zenith: RADec,
    /// Pixel position of the zenith on the first axis.
    pub zenx: f64,
    /// Pixel position of the zenith on the second axis.
    pub zeny: f64,
    /// The observation centre in horizontal coordinates at the reference
    /// date.
    pub obs_azel: AzEl,
    /// The slant-orthographic astrometry record.
    pub astr: SinProjection,
}

impl ObsMeta {
    /// Assemble the observation metadata.
    ///
    /// # Errors
    ///
    /// Can raise [`MetaError`] if the metafits file exists but can't be
    /// read, or if it flags all tiles but one outside a simulation run.
    pub fn new(
        obs: &Obs,
        header: &UvfitsHeader,
        params: &GroupParams,
        config: &RunConfig,
    ) -> Result<ObsMeta, MetaError> {
        let b0i = argunique(&params.time);
        let jdate: Vec<f64> = b0i.iter().map(|&i| params.time[i]).collect();
        let jd0 = jdate.iter().copied().fold(f64::INFINITY, f64::min);
        let obsx = obs.dimension as f64 / 2.0;
        let obsy = obs.elements as f64 / 2.0;

        let meta_path = config.metafits_path();
        let (obs_radec, phase_radec, time_res, delays, tile_names, tile_heights, tile_flags) =
            if meta_path.is_file() {
                let m = read_metafits(&meta_path, header.array_pos.height_metres)?;
                check_tile_flags(&m.tile_flags, config.run_simulation)?;
                (
                    m.obs_radec,
                    m.phase_radec,
                    m.time_res,
                    Some(m.delays),
                    m.tile_names,
                    m.tile_heights,
                    m.tile_flags,
                )
            } else {
                warn!(
                    "METAFITS file has not been found, calculating obs meta settings from the uvfits header instead"
                );
                // Tiles that appear in no baseline are treated as flagged.
                let tile_a: Vec<f64> =
                    obs.baseline_info.tile_a.iter().map(|&t| t as f64).collect();
                let tile_b: Vec<f64> =
                    obs.baseline_info.tile_b.iter().map(|&t| t as f64).collect();
                let hist_a = histogram(&tile_a, 1.0, Some(1.0), Some(obs.n_tile as f64));
                let hist_b = histogram(&tile_b, 1.0, Some(1.0), Some(obs.n_tile as f64));
                let tile_flags: Vec<bool> = hist_a
                    .counts
                    .iter()
                    .zip(hist_b.counts.iter())
                    .map(|(&a, &b)| a + b == 0)
                    .collect();

                let time_res = if b0i.len() > 1 {
                    (params.time[b0i[1]] - params.time[b0i[0]]) * 24.0 * 3600.0
                } else {
                    1.0
                };
                (
                    header.pointing,
                    header.pointing,
                    time_res,
                    None,
                    (1..=obs.n_tile as u32).collect(),
                    vec![0.0; obs.n_tile],
                    tile_flags,
                )
            };

        let lst = lst_rad(jd0, header.array_pos.longitude_rad);
        let zenith = altaz_to_radec(FRAC_PI_2, 0.0, header.array_pos.latitude_rad, lst);
        info!(
            "Zenith at JD {:.5}: RA {:.4} deg, Dec {:.4} deg",
            jd0,
            zenith.ra.to_degrees(),
            zenith.dec.to_degrees()
        );

        let astr = SinProjection::project(
            phase_radec,
            zenith,
            obs.dimension,
            obs.elements,
            obs.degpix,
            obsx,
            obsy,
            jd0,
        );
        let (zenx, zeny) = astr.world_to_pixel(zenith);
        let obs_azel = radec_to_altaz(obs_radec, header.array_pos.latitude_rad, lst);

        Ok(ObsMeta {
            jdate,
            jd0,
            epoch: decimal_year(jd0),
            obsx,
            obsy,
            tile_names,
            tile_heights,
            tile_flags,
            obs_radec,
            phase_radec,
            time_res,
            delays,
            zenith,
            zenx,
            zeny,
            obs_azel,
            astr,
        })
    }
}

/// Refuse metadata that flags every tile but one; a simulation run degrades
/// this to a warning.
fn check_tile_flags(tile_flags: &[bool], run_simulation: bool) -> Result<(), MetaError> {
    let flagged = tile_flags.iter().filter(|&&f| f).count();
    if !tile_flags.is_empty() && flagged == tile_flags.len() - 1 {
        if run_simulation {
            warn!("All tiles flagged in metadata");
        } else {
            return Err(MetaError::AllTilesFlagged);
        }
    }
    Ok(())
}

/// A Julian date as a decimal year, with calendar-exact year boundaries.
fn decimal_year(jd: f64) -> f64 {
    let epoch = Epoch::from_jde_utc(jd);
    let (y, ..) = epoch.as_gregorian_utc();
    let start = Epoch::from_gregorian_utc(y, 1, 1, 0, 0, 0, 0);
    let end = Epoch::from_gregorian_utc(y + 1, 1, 1, 0, 0, 0, 0);
    y as f64 + (epoch - start).in_unit(Unit::Day) / (end - start).in_unit(Unit::Day)
}
