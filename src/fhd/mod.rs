// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The legacy FHD bridge.
//!
//! The calibration and imaging stages still run inside the legacy IDL FHD
//! code base. This module is the boundary around that: it converts the run
//! configuration into IDL variable declarations, writes the top-level driver
//! scripts and bundled templates into the run directory, and shells out to
//! the interpreter, relaying whatever it prints. The interpreter is assumed
//! to be installed with all the necessary paths and environment variables
//! defined.

pub mod run;
pub mod script;

pub use run::{run_calibration_only, run_healpix_imaging, FhdError, FhdRunInfo};
pub use script::{CalibrationOnlyDriver, HealpixImagingDriver, ProValue};
