// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.
//!
//! All constants *must* be double precision.

/// The default UV-plane resolution in wavelengths, used when neither a field
/// of view nor a k-bin size is configured.
pub const DEFAULT_KBINSIZE: f64 = 0.5;

/// The offset between Julian date and modified Julian date.
pub const JD_TO_MJD: f64 = 2_400_000.5;

/// The Julian date of the J2000.0 epoch (2000 January 1, 12h TT).
pub const J2000_JD: f64 = 2_451_545.0;

/// Days per Julian century.
pub const DAYS_PER_CENTURY: f64 = 36_525.0;

/// The external interpreter binary used to run legacy FHD stages.
pub const DEFAULT_IDL_COMMAND: &str = "idl";

/// Arguments passed to the interpreter ahead of the `-e <driver>` pair.
pub const IDL_DEVICE_ARGS: [&str; 2] = ["-IDL_DEVICE", "ps"];
