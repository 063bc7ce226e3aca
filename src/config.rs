// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Run configuration.
//!
//! Options that the observation builder and the legacy bridge consume, as an
//! explicit typed struct with named optional fields. Anything the legacy
//! stages understand but this crate does not interpret travels in `extra` and
//! is rendered verbatim into the generated configuration script.

use std::path::PathBuf;

use derive_builder::Builder;

use crate::{constants::DEFAULT_IDL_COMMAND, fhd::script::ProValue};

/// Options for a single observation run.
#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct RunConfig {
    /// The observation ID, per the MWA file naming standards. The uvfits and
    /// metafits inputs are expected at `<input_path>/<obs_id>.{uvfits,metafits}`.
    pub obs_id: String,
    /// Instrument name recorded in the observation structure.
    pub instrument: String,
    /// Directory containing the uvfits/metafits inputs.
    pub input_path: PathBuf,
    /// Directory under which the run directory `<output_path>/<version>` is
    /// created.
    pub output_path: PathBuf,
    /// Label for this run; selects the run directory and the legacy output
    /// subdirectory.
    pub version: String,
    /// Number of fine frequency channels averaged per beam calculation.
    pub beam_nfreq_avg: Option<usize>,
    /// Proxy for the field of view \[degrees\]; when set, it determines the
    /// UV-plane resolution.
    pub fov: Option<f64>,
    /// UV-plane pixel size \[wavelengths\].
    pub kbinsize: Option<f64>,
    /// Number of UV-plane pixels along the first axis.
    pub dimension: Option<usize>,
    /// Number of UV-plane pixels along the second axis.
    pub elements: Option<usize>,
    /// Minimum baseline length to analyse \[wavelengths\].
    pub min_baseline: Option<f64>,
    /// Treat this as an in-situ simulation run; degrades the all-tiles-flagged
    /// error to a warning.
    pub run_simulation: bool,
    /// Gridding PSF save file handed to the HEALPix imaging stage.
    pub grid_psf_file: Option<PathBuf>,
    /// External interpreter binary for the legacy stages.
    pub idl_command: String,
    /// Uninterpreted options passed through to the generated configuration
    /// script.
    pub extra: Vec<(String, ProValue)>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            obs_id: String::new(),
            instrument: "mwa".to_string(),
            input_path: PathBuf::from("./uvfits"),
            output_path: PathBuf::from("./output"),
            version: "run".to_string(),
            beam_nfreq_avg: None,
            fov: None,
            kbinsize: None,
            dimension: None,
            elements: None,
            min_baseline: None,
            run_simulation: false,
            grid_psf_file: None,
            idl_command: DEFAULT_IDL_COMMAND.to_string(),
            extra: Vec::new(),
        }
    }
}

impl RunConfig {
    /// The expected uvfits input path.
    pub fn uvfits_path(&self) -> PathBuf {
        self.input_path.join(format!("{}.uvfits", self.obs_id))
    }

    /// The expected metafits input path.
    pub fn metafits_path(&self) -> PathBuf {
        self.input_path.join(format!("{}.metafits", self.obs_id))
    }

    /// The run directory, where scripts are generated and the external
    /// interpreter is launched.
    pub fn run_dir(&self) -> PathBuf {
        self.output_path.join(&self.version)
    }

    /// Where the legacy stages leave their outputs. The legacy code prepends
    /// `fhd_` to the version label.
    pub fn fhd_output_dir(&self) -> PathBuf {
        self.run_dir().join(format!("fhd_{}", self.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = RunConfigBuilder::default()
            .obs_id("1061316296".to_string())
            .build()
            .unwrap();
        assert_eq!(config.instrument, "mwa");
        assert_eq!(config.idl_command, "idl");
        assert!(config.kbinsize.is_none());
        assert!(!config.run_simulation);
    }

    #[test]
    fn test_derived_paths() {
        let config = RunConfigBuilder::default()
            .obs_id("1061316296".to_string())
            .input_path(PathBuf::from("/data/in"))
            .output_path(PathBuf::from("/data/out"))
            .version("cal0".to_string())
            .build()
            .unwrap();
        assert_eq!(
            config.uvfits_path(),
            PathBuf::from("/data/in/1061316296.uvfits")
        );
        assert_eq!(
            config.metafits_path(),
            PathBuf::from("/data/in/1061316296.metafits")
        );
        assert_eq!(config.run_dir(), PathBuf::from("/data/out/cal0"));
        assert_eq!(
            config.fhd_output_dir(),
            PathBuf::from("/data/out/cal0/fhd_cal0")
        );
    }
}
