// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![warn(missing_docs)]
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::missing_errors_doc)]

//! Dunnart derives the observation metadata a Fast Holographic Deconvolution
//! run needs from Murchison Widefield Array (MWA) uvfits and metafits files,
//! and drives the legacy IDL FHD calibration/imaging stages as an external
//! tool.
//!
//! # Examples
//!
//! Here's how to build an observation structure from uvfits-derived records:
//!
//! ```rust
//! use dunnart::{
//!     io::uvfits::{GroupParams, UvfitsHeader},
//!     marlu::{LatLngHeight, RADec},
//!     Obs, RunConfigBuilder,
//! };
//!
//! // a two-baseline, single-timestep toy observation
//! let header = UvfitsHeader {
//!     n_pol: 2,
//!     n_tile: 3,
//!     n_freq: 2,
//!     freq_res: 80e3,
//!     freq_array: vec![180.00e6, 180.08e6],
//!     pointing: RADec::new(0.0, -0.466),
//!     array_pos: LatLngHeight::new_mwa(),
//! };
//! let params = GroupParams {
//!     time: vec![2_456_528.25, 2_456_528.25],
//!     baseline: vec![258.0, 259.0],
//!     antenna1: vec![1, 1],
//!     antenna2: vec![2, 3],
//!     uu: vec![1e-6, 2e-6],
//!     vv: vec![1e-6, -1e-6],
//! };
//! let config = RunConfigBuilder::default()
//!     .obs_id("1061316296".to_string())
//!     .kbinsize(Some(0.5))
//!     .build()
//!     .unwrap();
//!
//! let obs = Obs::from_uvfits(&header, &params, &config).unwrap();
//! assert_eq!(obs.n_baselines, 2);
//! assert_eq!(obs.dimension, obs.elements);
//! ```
//!
//! # Details
//!
//! The observation structure follows FHD's `obs`/`meta` records: uv-plane
//! geometry and frequency binning live in [`Obs`], per-tile and astrometric
//! metadata in [`obs::ObsMeta`], and the slant-orthographic projection in
//! [`SinProjection`]. The [`fhd`] module generates the IDL driver scripts
//! and shells out to the interpreter.

pub mod astrom;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod fhd;
pub mod io;
pub mod obs;
pub mod pos;
pub mod util;

// Re-exports.
pub use astrom::SinProjection;
pub use config::{RunConfig, RunConfigBuilder};
pub use error::{CLIError, DunnartError};
pub use fhd::{run_calibration_only, run_healpix_imaging, FhdRunInfo, ProValue};
pub use io::{read_metafits, read_uvfits};
pub use obs::{Obs, ObsMeta};

// Dependency re-exports, so that callers can match versions.
pub use marlu;
pub use marlu::{hifitime, mwalib, AzEl, LatLngHeight, RADec};
