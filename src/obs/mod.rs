// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The observation structure.
//!
//! [`Obs`] collects everything the imaging stages need to know about an
//! observation: counts, frequency binning, per-visibility tile pairing and
//! the UV-plane geometry. It is derived from the uvfits header and group
//! parameters plus the run configuration; the per-tile metadata lives in
//! [`ObsMeta`].

pub mod meta;

pub use meta::{MetaError, ObsMeta};

use log::warn;
use marlu::ndarray::Array2;
use thiserror::Error;

use crate::{
    config::RunConfig,
    constants::DEFAULT_KBINSIZE,
    io::uvfits::{GroupParams, UvfitsHeader},
    util::{argunique, histogram, median},
};

/// Errors that can occur when building an [`Obs`].
#[derive(Error, Debug)]
pub enum ObsError {
    /// The group parameters contain no visibility rows.
    #[error("The uvfits group parameters contain no visibility rows")]
    NoVisibilities,

    /// The frequency array doesn't match the declared channel count.
    #[error("Frequency array has {found} entries, expected n_freq={expected}")]
    BadFreqArray {
        /// The declared channel count
        expected: usize,
        /// The frequency array length
        found: usize,
    },

    /// Every uv coordinate is zero.
    #[error("All uv coordinates are zero; can't derive the UV-plane extent")]
    DegenerateUv,

    /// No baseline lands within the image's Fourier support.
    #[error(
        "No baseline lies within the UV-plane support of a {dimension}x{elements} image at {kbinsize} wavelengths per pixel"
    )]
    EmptyFourierSupport {
        /// UV-plane pixels along the first axis
        dimension: usize,
        /// UV-plane pixels along the second axis
        elements: usize,
        /// UV-plane pixel size \[wavelengths\]
        kbinsize: f64,
    },
}

/// Per-baseline and per-channel bookkeeping for an observation.
#[derive(Debug, Clone)]
pub struct BaselineInfo {
    /// Index of the first visibility row of each timestep.
    pub bin_offset: Vec<usize>,
    /// Centre frequency of every fine channel \[Hz\].
    pub freq: Vec<f64>,
    /// The beam frequency bin of every fine channel.
    pub fbin_i: Vec<usize>,
    /// First tile of each visibility row, 1-based.
    pub tile_a: Vec<usize>,
    /// Second tile of each visibility row, 1-based.
    pub tile_b: Vec<usize>,
    /// Per-channel usage; all channels start unflagged.
    pub freq_use: Vec<bool>,
    /// Per-tile usage; all tiles start unflagged.
    pub tile_use: Vec<bool>,
}

/// Observation data and metadata for a run.
#[derive(Debug, Clone)]
pub struct Obs {
    /// Instrument name from the configuration.
    pub instrument: String,
    /// Number of polarisations.
    pub n_pol: usize,
    /// Number of tiles. Header-declared, unless the data disagree.
    pub n_tile: usize,
    /// Number of fine frequency channels.
    pub n_freq: usize,
    /// Number of timesteps.
    pub n_time: usize,
    /// Number of baselines per timestep.
    pub n_baselines: usize,
    /// Number of visibilities (rows × channels).
    pub n_vis: usize,
    /// As `n_vis`, before any flagging.
    pub n_vis_raw: usize,
    /// As `n_vis`, as read in.
    pub n_vis_in: usize,
    /// Per-channel gridded-visibility counters, zeroed here.
    pub n_vis_arr: Vec<usize>,
    /// Fine channel width \[Hz\].
    pub freq_res: f64,
    /// Median channel frequency \[Hz\].
    pub freq_center: f64,
    /// Fine channels averaged per beam calculation.
    pub beam_nfreq_avg: usize,
    /// UV-plane pixel size \[wavelengths\].
    pub kbinsize: f64,
    /// UV-plane pixels along the first axis.
    pub dimension: usize,
    /// UV-plane pixels along the second axis.
    pub elements: usize,
    /// Image-plane pixel size at the phase centre \[degrees\].
    pub degpix: f64,
    /// Longest baseline within the image's Fourier support \[wavelengths\].
    pub max_baseline: f64,
    /// Shortest nonzero baseline \[wavelengths\], floored by the configured
    /// minimum.
    pub min_baseline: f64,
    /// Per-baseline and per-channel bookkeeping.
    pub baseline_info: BaselineInfo,
}

impl Obs {
    /// Build the observation structure from a uvfits header/parameter pair
    /// and the run configuration.
    ///
    /// # Errors
    ///
    /// Can raise [`ObsError`] when the group parameters are empty or
    /// inconsistent with the header, or when the uv coverage can't support
    /// the requested image.
    pub fn from_uvfits(
        header: &UvfitsHeader,
        params: &GroupParams,
        config: &RunConfig,
    ) -> Result<Obs, ObsError> {
        if params.time.is_empty() {
            return Err(ObsError::NoVisibilities);
        }
        if header.freq_array.len() != header.n_freq {
            return Err(ObsError::BadFreqArray {
                expected: header.n_freq,
                found: header.freq_array.len(),
            });
        }

        let num_rows = params.time.len();
        let n_freq = header.n_freq;

        // Timestep binning: the time column is ordered, so the index of the
        // last row of each timestep gives the bin widths.
        let b0i = argunique(&params.time);
        let n_time = b0i.len();
        let mut bin_width = vec![0_usize; n_time];
        bin_width[0] = b0i[0] + 1;
        for i in 1..n_time {
            bin_width[i] = b0i[i] - b0i[i - 1];
        }
        let mut bin_offset = vec![0_usize; n_time];
        for i in 1..n_time {
            bin_offset[i] = bin_offset[i - 1] + bin_width[i - 1];
        }
        let n_baselines = bin_width[0];
        let n_vis = num_rows * n_freq;

        // Beam frequency binning.
        let beam_nfreq_avg = config.beam_nfreq_avg.unwrap_or(1);
        let freq_bin = beam_nfreq_avg as f64 * header.freq_res;
        let freq_hist = histogram(&header.freq_array, freq_bin, None, None);
        let mut fbin_i = vec![0_usize; n_freq];
        for bin in 0..freq_hist.counts.len() {
            for &chan in freq_hist.bin_members(bin) {
                fbin_i[chan] = bin;
            }
        }
        let freq_center = median(&header.freq_array);

        // Tile pairing: explicit antenna columns when present, otherwise
        // decode the packed baseline index.
        let (tile_a, tile_b, n_tile) = resolve_tile_pairs(header, params);

        // Baseline lengths in wavelengths for every channel/row pair.
        let kx_arr = Array2::from_shape_fn((n_freq, num_rows), |(i, j)| {
            header.freq_array[i] * params.uu[j]
        });
        let ky_arr = Array2::from_shape_fn((n_freq, num_rows), |(i, j)| {
            header.freq_array[i] * params.vv[j]
        });
        let max_abs = |arr: &Array2<f64>| arr.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
        let max_baseline_full = max_abs(&kx_arr).max(max_abs(&ky_arr));
        if max_baseline_full == 0.0 {
            return Err(ObsError::DegenerateUv);
        }

        // Imaging parameters: a configured field of view beats a configured
        // k-bin size.
        let kbinsize = match (config.fov, config.kbinsize) {
            (Some(fov), _) => (180.0 / std::f64::consts::PI) / fov,
            (None, Some(kbinsize)) => kbinsize,
            (None, None) => DEFAULT_KBINSIZE,
        };
        let (dimension, elements) = match (config.dimension, config.elements) {
            (Some(dimension), Some(elements)) => (dimension, elements),
            (Some(dimension), None) => (dimension, dimension),
            (None, Some(elements)) => (elements, elements),
            (None, None) => {
                // The nearest power of two covering twice the longest
                // baseline at this resolution.
                let target = 2.0 * max_baseline_full / kbinsize;
                let dimension = 2_usize.pow(target.log2().trunc() as u32);
                (dimension, dimension)
            }
        };
        let degpix = (180.0 / std::f64::consts::PI) / (kbinsize * dimension as f64);

        // The longest baseline actually usable is restricted to the image's
        // Fourier support.
        let max_baseline = kx_arr
            .iter()
            .zip(ky_arr.iter())
            .filter(|(&kx, &ky)| {
                kx.abs() / kbinsize < dimension as f64 / 2.0
                    && ky.abs() / kbinsize < elements as f64 / 2.0
            })
            .fold(0.0_f64, |acc, (&kx, _)| acc.max(kx.abs()));
        if max_baseline == 0.0 {
            return Err(ObsError::EmptyFourierSupport {
                dimension,
                elements,
                kbinsize,
            });
        }

        let min_baseline_data = kx_arr
            .iter()
            .zip(ky_arr.iter())
            .map(|(&kx, &ky)| (kx * kx + ky * ky).sqrt())
            .filter(|&kr| kr > 0.0)
            .fold(f64::INFINITY, f64::min);
        let min_baseline = match config.min_baseline {
            Some(floor) => floor.max(min_baseline_data),
            None => min_baseline_data,
        };

        Ok(Obs {
            instrument: config.instrument.clone(),
            n_pol: header.n_pol,
            n_tile,
            n_freq,
            n_time,
            n_baselines,
            n_vis,
            n_vis_raw: n_vis,
            n_vis_in: n_vis,
            n_vis_arr: vec![0; n_freq],
            freq_res: header.freq_res,
            freq_center,
            beam_nfreq_avg,
            kbinsize,
            dimension,
            elements,
            degpix,
            max_baseline,
            min_baseline,
            baseline_info: BaselineInfo {
                bin_offset,
                freq: header.freq_array.clone(),
                fbin_i,
                tile_a,
                tile_b,
                freq_use: vec![true; n_freq],
                tile_use: vec![true; n_tile],
            },
        })
    }
}

/// Resolve the tile pair of every visibility row, returning the pairs and
/// the tile count (header-declared unless the data disagree).
fn resolve_tile_pairs(
    header: &UvfitsHeader,
    params: &GroupParams,
) -> (Vec<usize>, Vec<usize>, usize) {
    let max_a1 = params.antenna1.iter().copied().max().unwrap_or(0);
    let max_a2 = params.antenna2.iter().copied().max().unwrap_or(0);
    if max_a1 > 0 && max_a2 > 0 {
        // Explicit antenna columns are authoritative.
        return (
            params.antenna1.clone(),
            params.antenna2.clone(),
            max_a1.max(max_a2),
        );
    }

    // 256 tile upper limit is hard-coded in CASA format.
    // These tile numbers have been verified to be correct.
    let baseline_min = params
        .baseline
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let exponent = baseline_min.ln() / 2.0_f64.ln();
    let mut antenna_mod_index = 2.0_f64.powf(exponent.floor());
    let tile_b_test = baseline_min % antenna_mod_index;
    // A bad fit happens when autocorrelations or the first tile are missing.
    if tile_b_test > 1.0 && baseline_min % 2.0 == 1.0 {
        antenna_mod_index /= 2.0_f64.powf((tile_b_test.ln() / 2.0_f64.ln()).floor());
    }
    let tile_a: Vec<usize> = params
        .baseline
        .iter()
        .map(|&b| (b / antenna_mod_index).floor() as usize)
        .collect();
    let tile_b: Vec<usize> = params
        .baseline
        .iter()
        .map(|&b| (b % antenna_mod_index) as usize)
        .collect();

    let data_n_tile = tile_a
        .iter()
        .chain(tile_b.iter())
        .copied()
        .max()
        .unwrap_or(0);
    let mut n_tile = header.n_tile;
    if data_n_tile != n_tile {
        warn!(
            "Mis-matched n_tile. Header: {}, Data: {}, adjusting n_tile to be the same as the data",
            n_tile, data_n_tile
        );
        n_tile = data_n_tile;
    }
    (tile_a, tile_b, n_tile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use marlu::{LatLngHeight, RADec};

    use crate::config::RunConfigBuilder;

    /// Two timesteps of a three-tile array with autocorrelations excluded.
    pub(crate) fn synthetic_inputs() -> (UvfitsHeader, GroupParams) {
        let n_freq = 4;
        let freq_res = 40_000.0;
        let freq_array: Vec<f64> = (0..n_freq)
            .map(|i| 180.0e6 + i as f64 * freq_res)
            .collect();
        let header = UvfitsHeader {
            n_pol: 2,
            n_tile: 3,
            n_freq,
            freq_res,
            freq_array,
            pointing: RADec::new(0.0, -0.466),
            array_pos: LatLngHeight::new_mwa(),
        };
        let pairs = [(1_usize, 2_usize), (1, 3), (2, 3)];
        let t0 = 2_456_528.25;
        let t1 = t0 + 2.0 / 86_400.0;
        let mut params = GroupParams::default();
        for &t in &[t0, t1] {
            for (i, &(a1, a2)) in pairs.iter().enumerate() {
                params.time.push(t);
                params.baseline.push((a1 * 256 + a2) as f64);
                params.antenna1.push(a1);
                params.antenna2.push(a2);
                params.uu.push(1e-6 * (i + 1) as f64);
                params.vv.push(-0.5e-6 * (i + 1) as f64);
            }
        }
        (header, params)
    }

    fn config() -> RunConfig {
        RunConfigBuilder::default()
            .obs_id("1061316296".to_string())
            .build()
            .unwrap()
    }

    #[test]
    fn test_explicit_antenna_columns_used_unmodified() {
        let (header, params) = synthetic_inputs();
        let obs = Obs::from_uvfits(&header, &params, &config()).unwrap();
        assert_eq!(obs.baseline_info.tile_a, params.antenna1);
        assert_eq!(obs.baseline_info.tile_b, params.antenna2);
        assert_eq!(obs.n_tile, 3);
    }

    #[test]
    fn test_packed_baseline_decode_matches_ground_truth() {
        let (header, mut params) = synthetic_inputs();
        let truth_a = params.antenna1.clone();
        let truth_b = params.antenna2.clone();
        // baseline_min = 258 is even, so the encoding is unambiguous
        params.antenna1 = vec![0; params.time.len()];
        params.antenna2 = vec![0; params.time.len()];
        let obs = Obs::from_uvfits(&header, &params, &config()).unwrap();
        assert_eq!(obs.baseline_info.tile_a, truth_a);
        assert_eq!(obs.baseline_info.tile_b, truth_b);
    }

    #[test]
    fn test_decoded_tile_count_overrides_header() {
        let (mut header, mut params) = synthetic_inputs();
        header.n_tile = 5;
        params.antenna1 = vec![0; params.time.len()];
        params.antenna2 = vec![0; params.time.len()];
        let obs = Obs::from_uvfits(&header, &params, &config()).unwrap();
        assert_eq!(obs.n_tile, 3);
        assert_eq!(obs.baseline_info.tile_use.len(), 3);
    }

    #[test]
    fn test_timestep_binning() {
        let (header, params) = synthetic_inputs();
        let obs = Obs::from_uvfits(&header, &params, &config()).unwrap();
        assert_eq!(obs.n_time, 2);
        assert_eq!(obs.n_baselines, 3);
        assert_eq!(obs.baseline_info.bin_offset, vec![0, 3]);
        assert_eq!(obs.n_vis, 6 * 4);
    }

    #[test]
    fn test_beam_frequency_bins() {
        let (header, params) = synthetic_inputs();
        let config = RunConfigBuilder::default()
            .beam_nfreq_avg(Some(2))
            .build()
            .unwrap();
        let obs = Obs::from_uvfits(&header, &params, &config).unwrap();
        assert_eq!(obs.baseline_info.fbin_i, vec![0, 0, 1, 1]);
        assert_eq!(obs.beam_nfreq_avg, 2);
        assert_abs_diff_eq!(obs.freq_center, 180.0e6 + 60_000.0);
    }

    #[test]
    fn test_dimension_precedence_both_configured() {
        let (header, params) = synthetic_inputs();
        let config = RunConfigBuilder::default()
            .dimension(Some(1024))
            .elements(Some(512))
            .build()
            .unwrap();
        let obs = Obs::from_uvfits(&header, &params, &config).unwrap();
        assert_eq!((obs.dimension, obs.elements), (1024, 512));
    }

    #[test]
    fn test_dimension_precedence_single_value() {
        let (header, params) = synthetic_inputs();
        let config = RunConfigBuilder::default()
            .elements(Some(512))
            .build()
            .unwrap();
        let obs = Obs::from_uvfits(&header, &params, &config).unwrap();
        assert_eq!((obs.dimension, obs.elements), (512, 512));
    }

    #[test]
    fn test_dimension_derived_power_of_two() {
        let (header, params) = synthetic_inputs();
        let obs = Obs::from_uvfits(&header, &params, &config()).unwrap();
        // longest |k| is ~540.4 wavelengths; 2 * 540.4 / 0.5 = 2161.4, whose
        // log2 truncates to 11
        assert_eq!(obs.dimension, 2048);
        assert_eq!(obs.elements, 2048);
        assert_abs_diff_eq!(
            obs.degpix,
            (180.0 / std::f64::consts::PI) / (0.5 * 2048.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_fov_beats_kbinsize() {
        let (header, params) = synthetic_inputs();
        let config = RunConfigBuilder::default()
            .fov(Some(90.0))
            .kbinsize(Some(0.25))
            .dimension(Some(1024))
            .build()
            .unwrap();
        let obs = Obs::from_uvfits(&header, &params, &config).unwrap();
        assert_abs_diff_eq!(obs.kbinsize, (180.0 / std::f64::consts::PI) / 90.0);
    }

    #[test]
    fn test_min_baseline_floor() {
        let (header, params) = synthetic_inputs();
        let obs = Obs::from_uvfits(&header, &params, &config()).unwrap();
        let data_min = obs.min_baseline;

        let config = RunConfigBuilder::default()
            .min_baseline(Some(data_min + 10.0))
            .build()
            .unwrap();
        let obs = Obs::from_uvfits(&header, &params, &config).unwrap();
        assert_abs_diff_eq!(obs.min_baseline, data_min + 10.0);
    }

    #[test]
    fn test_max_baseline_respects_fourier_support() {
        let (header, params) = synthetic_inputs();
        let obs = Obs::from_uvfits(&header, &params, &config()).unwrap();
        assert!(obs.max_baseline <= obs.kbinsize * obs.dimension as f64 / 2.0);
        assert!(obs.max_baseline > 0.0);
    }

    #[test]
    fn test_empty_params_is_an_error() {
        let (header, _) = synthetic_inputs();
        let result = Obs::from_uvfits(&header, &GroupParams::default(), &config());
        assert!(matches!(result, Err(ObsError::NoVisibilities)));
    }

    #[test]
    fn test_zero_uv_is_an_error() {
        let (header, mut params) = synthetic_inputs();
        params.uu.iter_mut().for_each(|u| *u = 0.0);
        params.vv.iter_mut().for_each(|v| *v = 0.0);
        let result = Obs::from_uvfits(&header, &params, &config());
        assert!(matches!(result, Err(ObsError::DegenerateUv)));
    }
}
