// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors that can occur in the io module.

use std::path::PathBuf;

use marlu::mwalib;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(clippy::upper_case_acronyms)]
/// All the errors that can occur in file io operations.
pub enum IOError {
    /// Error when opening a fits file.
    #[error("{source_file}:{source_line}\nCouldn't open {fits_filename}: {fits_error}")]
    FitsOpen {
        /// The [`fitsio::errors::Error`]
        fits_error: fitsio::errors::Error,
        /// The filename of the fits file
        fits_filename: String,
        /// The file where the error originated (usually `file!()`)
        source_file: &'static str,
        /// The line number where the error originated (usually `line!()`)
        source_line: u32,
    },

    /// A generic error associated with the fitsio crate.
    #[error("{source_file}:{source_line}\n{fits_filename} HDU {hdu_num}: {fits_error}")]
    FitsIO {
        /// The [`fitsio::errors::Error`]
        fits_error: fitsio::errors::Error,
        /// The filename of the fits file where the error occurred
        fits_filename: String,
        /// The hdu number in the fits file where the error occurred
        hdu_num: usize,
        /// The file where the error originated (usually `file!()`)
        source_file: &'static str,
        /// The line number where the error originated (usually `line!()`)
        source_line: u32,
    },

    #[error("{0}")]
    /// Error derived from [`marlu::mwalib::FitsError`]
    FitsError(#[from] mwalib::FitsError),

    #[error("{0}")]
    /// Error derived from [`fitsio::errors::Error`]
    FitsioError(#[from] fitsio::errors::Error),

    /// A uvfits file with no visibility rows.
    #[error("No visibility rows in {0}")]
    EmptyUvfits(PathBuf),

    /// A required group parameter is not declared in the uvfits PTYPE
    /// keywords.
    #[error("uvfits {fits_filename} does not declare a {ptype} group parameter")]
    MissingPtype {
        /// The PTYPE value searched for
        ptype: &'static str,
        /// The filename of the fits file
        fits_filename: String,
    },

    /// A header keyword that could not be parsed.
    #[error("Couldn't parse {key}={value} in {fits_filename}")]
    ParseKey {
        /// The keyword name
        key: String,
        /// The unparsable value
        value: String,
        /// The filename of the fits file
        fits_filename: String,
    },

    /// Error to describe some kind of inconsistent state within a metafits
    /// file.
    #[error("Inconsistent metafits file (file: {file}, expected: {expected}, found: {found})")]
    MetafitsInconsistent {
        /// The filename of the fits file where the error occurred
        file: String,
        /// The value that was expected
        expected: String,
        /// The unexpected value that was found
        found: String,
    },
}
