// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading observation metadata out of uvfits files.
//!
//! Only the primary-header keywords and the per-row group parameters are
//! read; the visibility payload itself never leaves the file. Group
//! parameters are located by their PTYPE declarations rather than assumed
//! positions, since different writers order them differently.

use std::path::Path;

use log::{debug, warn};
use marlu::{mwalib::*, LatLngHeight, RADec, XyzGeocentric};

use super::error::IOError;

/// Fixed metadata from a uvfits primary header and antenna table.
#[derive(Debug, Clone)]
pub struct UvfitsHeader {
    /// Number of polarisations in the data.
    pub n_pol: usize,
    /// Number of tiles in the antenna table.
    pub n_tile: usize,
    /// Number of fine frequency channels.
    pub n_freq: usize,
    /// Fine channel width \[Hz\].
    pub freq_res: f64,
    /// Centre frequency of every fine channel \[Hz\].
    pub freq_array: Vec<f64>,
    /// The pointed observation centre.
    pub pointing: RADec,
    /// The array position on Earth.
    pub array_pos: LatLngHeight,
}

/// Per-visibility-row group parameters.
#[derive(Debug, Clone, Default)]
pub struct GroupParams {
    /// Julian date of each row.
    pub time: Vec<f64>,
    /// Packed baseline index of each row (raw, undecoded).
    pub baseline: Vec<f64>,
    /// First antenna of each row; all zero when the writer didn't include
    /// antenna columns.
    pub antenna1: Vec<usize>,
    /// Second antenna of each row; all zero when the writer didn't include
    /// antenna columns.
    pub antenna2: Vec<usize>,
    /// u coordinate of each row \[seconds\].
    pub uu: Vec<f64>,
    /// v coordinate of each row \[seconds\].
    pub vv: Vec<f64>,
}

/// Positions of the group parameters we care about, 1-based as in the PTYPE
/// keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Indices {
    u: usize,
    v: usize,
    baseline: usize,
    date1: usize,
    date2: Option<usize>,
    antenna1: Option<usize>,
    antenna2: Option<usize>,
}

impl Indices {
    /// Locate group parameters from the PTYPE declarations, `ptypes[i]`
    /// holding the value of `PTYPE{i+1}`.
    fn from_ptypes(ptypes: &[Option<String>], filename: &str) -> Result<Indices, IOError> {
        let (mut u, mut v, mut baseline, mut date1, mut date2, mut antenna1, mut antenna2) =
            (None, None, None, None, None, None, None);
        for (i, ptype) in ptypes.iter().enumerate() {
            let ptype = match ptype {
                Some(p) => p.trim().to_uppercase(),
                None => continue,
            };
            let index = i + 1;
            match ptype.as_str() {
                s if s.starts_with("UU") => u.get_or_insert(index),
                s if s.starts_with("VV") => v.get_or_insert(index),
                "BASELINE" => baseline.get_or_insert(index),
                "DATE" => {
                    if date1.is_none() {
                        date1.get_or_insert(index)
                    } else {
                        date2.get_or_insert(index)
                    }
                }
                "ANTENNA1" => antenna1.get_or_insert(index),
                "ANTENNA2" => antenna2.get_or_insert(index),
                _ => continue,
            };
        }
        let missing = |ptype| IOError::MissingPtype {
            ptype,
            fits_filename: filename.to_string(),
        };
        Ok(Indices {
            u: u.ok_or_else(|| missing("UU"))?,
            v: v.ok_or_else(|| missing("VV"))?,
            baseline: baseline.ok_or_else(|| missing("BASELINE"))?,
            date1: date1.ok_or_else(|| missing("DATE"))?,
            date2,
            antenna1,
            antenna2,
        })
    }
}

/// Parse a required string-valued header key into a number.
fn parse_key<T: std::str::FromStr>(
    fptr: &mut fitsio::FitsFile,
    hdu: &fitsio::hdu::FitsHdu,
    key: &str,
) -> Result<T, IOError> {
    let value: String = get_required_fits_key!(fptr, hdu, key)?;
    value.trim().parse().map_err(|_| IOError::ParseKey {
        key: key.to_string(),
        value,
        fits_filename: fptr.file_path().display().to_string(),
    })
}

/// Read the header record and the group parameters of a uvfits file.
///
/// # Errors
///
/// Can raise [`IOError`] if the file can't be opened, a required keyword or
/// group parameter is missing or malformed, or the file has no visibility
/// rows.
pub fn read_uvfits<P: AsRef<Path>>(path: P) -> Result<(UvfitsHeader, GroupParams), IOError> {
    let path = path.as_ref();
    debug!("Using uvfits file: {}", path.display());
    let mut fptr = fits_open!(&path)?;
    let hdu = fits_open_hdu!(&mut fptr, 0)?;
    let filename = fptr.file_path().display().to_string();

    let num_rows: usize = parse_key(&mut fptr, &hdu, "GCOUNT")?;
    let pcount: usize = parse_key(&mut fptr, &hdu, "PCOUNT")?;
    if num_rows == 0 {
        return Err(IOError::EmptyUvfits(path.to_path_buf()));
    }

    // Find the group parameters from the PTYPE declarations.
    let mut ptypes = Vec::with_capacity(pcount);
    for i in 1..=pcount {
        let ptype: Option<String> = get_optional_fits_key!(&mut fptr, &hdu, &format!("PTYPE{}", i))?;
        ptypes.push(ptype);
    }
    let indices = Indices::from_ptypes(&ptypes, &filename)?;
    debug!("uvfits group parameter indices: {:?}", indices);

    // The date offset lives in PZERO so that the per-row values keep their
    // precision.
    let mut jd_zero = 0.0;
    for date_index in std::iter::once(indices.date1).chain(indices.date2) {
        let pzero: Option<f64> =
            get_optional_fits_key!(&mut fptr, &hdu, &format!("PZERO{}", date_index))?;
        jd_zero += pzero.unwrap_or_default();
    }

    // Find the regular axes from the CTYPE declarations.
    let naxis: usize = parse_key(&mut fptr, &hdu, "NAXIS")?;
    let (mut stokes_axis, mut freq_axis, mut ra_axis, mut dec_axis) = (None, None, None, None);
    for i in 2..=naxis {
        let ctype: Option<String> = get_optional_fits_key!(&mut fptr, &hdu, &format!("CTYPE{}", i))?;
        match ctype.as_deref().map(str::trim) {
            Some("STOKES") => stokes_axis = Some(i),
            Some("FREQ") => freq_axis = Some(i),
            Some("RA") => ra_axis = Some(i),
            Some("DEC") => dec_axis = Some(i),
            _ => (),
        }
    }
    let axis_err = |key: &str| IOError::ParseKey {
        key: key.to_string(),
        value: "<absent>".to_string(),
        fits_filename: filename.clone(),
    };
    let stokes_axis = stokes_axis.ok_or_else(|| axis_err("CTYPE STOKES"))?;
    let freq_axis = freq_axis.ok_or_else(|| axis_err("CTYPE FREQ"))?;
    let ra_axis = ra_axis.ok_or_else(|| axis_err("CTYPE RA"))?;
    let dec_axis = dec_axis.ok_or_else(|| axis_err("CTYPE DEC"))?;

    let n_pol: usize = parse_key(&mut fptr, &hdu, &format!("NAXIS{}", stokes_axis))?;
    let n_freq: usize = parse_key(&mut fptr, &hdu, &format!("NAXIS{}", freq_axis))?;
    let base_freq: f64 = parse_key(&mut fptr, &hdu, &format!("CRVAL{}", freq_axis))?;
    let freq_res: f64 = parse_key(&mut fptr, &hdu, &format!("CDELT{}", freq_axis))?;
    let base_index: isize = {
        // CRPIX might be a float.
        let crpix: f64 = parse_key(&mut fptr, &hdu, &format!("CRPIX{}", freq_axis))?;
        crpix.round() as _
    };
    let freq_array: Vec<f64> = (0..n_freq)
        .map(|i| base_freq + (i as isize - base_index + 1) as f64 * freq_res)
        .collect();

    let pointing = {
        let ra: f64 = parse_key(&mut fptr, &hdu, &format!("CRVAL{}", ra_axis))?;
        let dec: f64 = parse_key(&mut fptr, &hdu, &format!("CRVAL{}", dec_axis))?;
        RADec::new(ra.to_radians(), dec.to_radians())
    };

    // The antenna table gives the tile count, and usually the array position.
    let ant_hdu = fits_open_hdu!(&mut fptr, 1)?;
    let tile_nums: Vec<u32> = get_fits_col!(&mut fptr, &ant_hdu, "NOSTA")?;
    let n_tile = tile_nums.len();
    let array_pos = {
        let array_x: Option<f64> = get_optional_fits_key!(&mut fptr, &ant_hdu, "ARRAYX")?;
        let array_y: Option<f64> = get_optional_fits_key!(&mut fptr, &ant_hdu, "ARRAYY")?;
        let array_z: Option<f64> = get_optional_fits_key!(&mut fptr, &ant_hdu, "ARRAYZ")?;
        match (array_x, array_y, array_z) {
            (Some(x), Some(y), Some(z)) => XyzGeocentric { x, y, z }.to_earth_wgs84(),
            _ => {
                warn!("uvfits has no ARRAYX/ARRAYY/ARRAYZ; assuming the MWA site");
                LatLngHeight::new_mwa()
            }
        }
    };

    // Re-open the primary HDU for the group-parameter reads.
    fits_open_hdu!(&mut fptr, 0)?;
    let mut row_params = vec![0.0_f64; pcount];
    let mut params = GroupParams {
        time: Vec::with_capacity(num_rows),
        baseline: Vec::with_capacity(num_rows),
        antenna1: Vec::with_capacity(num_rows),
        antenna2: Vec::with_capacity(num_rows),
        uu: Vec::with_capacity(num_rows),
        vv: Vec::with_capacity(num_rows),
    };
    for row in 0..num_rows {
        let mut status = 0;
        unsafe {
            // ffggpd = fits_read_grppar_dbl
            fitsio_sys::ffggpd(
                fptr.as_raw(),             /* I - FITS file pointer                       */
                1 + row as i64,            /* I - group to read (1 = 1st group)           */
                1,                         /* I - first vector element to read (1 = 1st)  */
                row_params.len() as i64,   /* I - number of values to read                */
                row_params.as_mut_ptr(),   /* O - array of values that are returned       */
                &mut status,               /* IO - error status                           */
            );
        }
        fitsio::errors::check_status(status).map_err(|fits_error| IOError::FitsIO {
            fits_error,
            fits_filename: filename.clone(),
            hdu_num: 0,
            source_file: file!(),
            source_line: line!(),
        })?;

        let mut jd = jd_zero + row_params[indices.date1 - 1];
        if let Some(date2) = indices.date2 {
            jd += row_params[date2 - 1];
        }
        params.time.push(jd);
        params.baseline.push(row_params[indices.baseline - 1]);
        params.uu.push(row_params[indices.u - 1]);
        params.vv.push(row_params[indices.v - 1]);
        params.antenna1.push(
            indices
                .antenna1
                .map_or(0, |a1| row_params[a1 - 1].round() as usize),
        );
        params.antenna2.push(
            indices
                .antenna2
                .map_or(0, |a2| row_params[a2 - 1].round() as usize),
        );
    }

    Ok((
        UvfitsHeader {
            n_pol,
            n_tile,
            n_freq,
            freq_res,
            freq_array,
            pointing,
            array_pos,
        },
        params,
    ))
}
