// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading per-tile instrument metadata out of MWA metafits files.
//!
//! The tile table (HDU 2) carries one row per rf input, i.e. two rows per
//! tile. Rows are sorted stably by antenna number and then reduced to a
//! single polarisation so that the output vectors are per-tile.

use std::path::Path;

use log::debug;
use marlu::{mwalib::*, RADec};

use super::error::IOError;
use crate::util::stable_argsort;

/// Observation metadata from a metafits file.
#[derive(Debug, Clone)]
pub struct MetafitsMeta {
    /// The pointed observation centre.
    pub obs_radec: RADec,
    /// The phase-tracking centre.
    pub phase_radec: RADec,
    /// Time resolution (integration time) \[seconds\].
    pub time_res: f64,
    /// Beamformer delays.
    pub delays: Vec<u32>,
    /// Tile numbers, per tile, ordered by antenna number.
    pub tile_names: Vec<u32>,
    /// Tile heights relative to the array centre \[metres\].
    pub tile_heights: Vec<f64>,
    /// Tile flags.
    pub tile_flags: Vec<bool>,
}

/// Sort the rf-input rows stably by antenna number, then keep one row per
/// tile by selecting the polarisation of the first sorted row.
fn tiles_from_rows(
    antenna: &[i32],
    pol: &[String],
    tile: &[u32],
    height: &[f64],
    flag: &[i32],
    array_height: f64,
) -> (Vec<u32>, Vec<f64>, Vec<bool>) {
    let order = stable_argsort(antenna);
    let single_pol = &pol[order[0]];
    let single: Vec<usize> = order
        .iter()
        .copied()
        .filter(|&i| &pol[i] == single_pol)
        .collect();
    (
        single.iter().map(|&i| tile[i]).collect(),
        single.iter().map(|&i| height[i] - array_height).collect(),
        single.iter().map(|&i| flag[i] != 0).collect(),
    )
}

/// Read a metafits file.
///
/// `array_height` is the array-centre altitude \[metres\] that tile heights
/// are referenced to.
///
/// # Errors
///
/// Can raise [`IOError`] if the file can't be opened, a keyword or column is
/// missing, or the tile table is inconsistent.
pub fn read_metafits<P: AsRef<Path>>(
    path: P,
    array_height: f64,
) -> Result<MetafitsMeta, IOError> {
    let path = path.as_ref();
    debug!("Using metafits file: {}", path.display());
    let mut fptr = fits_open!(&path)?;
    let hdu = fits_open_hdu!(&mut fptr, 0)?;
    let filename = fptr.file_path().display().to_string();

    let obs_ra: f64 = get_required_fits_key!(&mut fptr, &hdu, "RA")?;
    let obs_dec: f64 = get_required_fits_key!(&mut fptr, &hdu, "DEC")?;
    let phase_ra: f64 = get_required_fits_key!(&mut fptr, &hdu, "RAPHASE")?;
    let phase_dec: f64 = get_required_fits_key!(&mut fptr, &hdu, "DECPHASE")?;
    let time_res: f64 = get_required_fits_key!(&mut fptr, &hdu, "INTTIME")?;
    let delays_str: String = get_required_fits_key!(&mut fptr, &hdu, "DELAYS")?;
    let delays = delays_str
        .split(',')
        .map(|d| d.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| IOError::ParseKey {
            key: "DELAYS".to_string(),
            value: delays_str.clone(),
            fits_filename: filename.clone(),
        })?;

    let tile_hdu = fits_open_hdu!(&mut fptr, 1)?;
    let antenna: Vec<i32> = get_fits_col!(&mut fptr, &tile_hdu, "Antenna")?;
    let pol: Vec<String> = get_fits_col!(&mut fptr, &tile_hdu, "Pol")?;
    let tile: Vec<u32> = get_fits_col!(&mut fptr, &tile_hdu, "Tile")?;
    let height: Vec<f64> = get_fits_col!(&mut fptr, &tile_hdu, "Height")?;
    let flag: Vec<i32> = get_fits_col!(&mut fptr, &tile_hdu, "Flag")?;

    if antenna.len() != pol.len()
        || antenna.len() != tile.len()
        || antenna.len() != height.len()
        || antenna.len() != flag.len()
    {
        return Err(IOError::MetafitsInconsistent {
            file: filename,
            expected: format!("{} rows in every tile-table column", antenna.len()),
            found: format!(
                "pol: {}, tile: {}, height: {}, flag: {}",
                pol.len(),
                tile.len(),
                height.len(),
                flag.len()
            ),
        });
    }

    let (tile_names, tile_heights, tile_flags) =
        tiles_from_rows(&antenna, &pol, &tile, &height, &flag, array_height);

    Ok(MetafitsMeta {
        obs_radec: RADec::new(obs_ra.to_radians(), obs_dec.to_radians()),
        phase_radec: RADec::new(phase_ra.to_radians(), phase_dec.to_radians()),
        time_res,
        delays,
        tile_names,
        tile_heights,
        tile_flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_tiles_from_rows_sorts_and_selects_one_pol() {
        // rows deliberately out of antenna order, two pols per tile
        let antenna = [1_i32, 1, 0, 0];
        let pol = ["X", "Y", "X", "Y"].map(String::from);
        let tile = [12_u32, 12, 11, 11];
        let height = [375.0, 375.0, 380.0, 380.0];
        let flag = [1_i32, 1, 0, 0];

        let (names, heights, flags) = tiles_from_rows(&antenna, &pol, &tile, &height, &flag, 377.0);
        assert_eq!(names, vec![11, 12]);
        assert_abs_diff_eq!(heights[0], 3.0);
        assert_abs_diff_eq!(heights[1], -2.0);
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_tiles_from_rows_is_stable_within_antenna() {
        // the first row of each antenna pair must win the pol selection
        let antenna = [0_i32, 0, 1, 1];
        let pol = ["Y", "X", "Y", "X"].map(String::from);
        let tile = [21_u32, 21, 22, 22];
        let height = [377.0, 0.0, 377.0, 0.0];
        let flag = [0_i32, 1, 0, 1];

        let (names, heights, flags) = tiles_from_rows(&antenna, &pol, &tile, &height, &flag, 377.0);
        assert_eq!(names, vec![21, 22]);
        // the "Y" rows came first, so their heights/flags are selected
        assert_abs_diff_eq!(heights[0], 0.0);
        assert_eq!(flags, vec![false, false]);
    }
}
