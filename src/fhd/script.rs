// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Generating the IDL scripts that drive the legacy FHD stages.
//!
//! Three kinds of `.pro` files land in the run directory: the configuration
//! script (`dunnart_config.pro`, every run option as an IDL variable), a
//! top-level driver per stage, and the bundled template scripts the drivers
//! call into.

use std::fmt;
use std::path::PathBuf;

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::config::RunConfig;

lazy_static! {
    /// What IDL accepts as a variable name.
    static ref RE_PRO_IDENT: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_$]*$").unwrap();
}

/// A value rendered as an IDL literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ProValue {
    /// A single-quoted string.
    Str(String),
    /// Booleans become 0/1.
    Bool(bool),
    /// An integer literal.
    Int(i64),
    /// A floating-point literal.
    Float(f64),
    /// A path, rendered as a single-quoted string.
    Path(PathBuf),
    /// An unset value, rendered as `!NULL`.
    Null,
}

impl fmt::Display for ProValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // IDL has no escape for a quote inside a string other than
            // doubling it.
            ProValue::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            ProValue::Bool(b) => write!(f, "{}", i32::from(*b)),
            ProValue::Int(i) => write!(f, "{}", i),
            ProValue::Float(v) => write!(f, "{:?}", v),
            ProValue::Path(p) => write!(f, "'{}'", p.display().to_string().replace('\'', "''")),
            ProValue::Null => write!(f, "!NULL"),
        }
    }
}

impl From<Option<usize>> for ProValue {
    fn from(v: Option<usize>) -> ProValue {
        v.map_or(ProValue::Null, |v| ProValue::Int(v as i64))
    }
}

impl From<Option<f64>> for ProValue {
    fn from(v: Option<f64>) -> ProValue {
        v.map_or(ProValue::Null, ProValue::Float)
    }
}

/// IDL will not allow '-' in variable names, so replace them all with
/// underscores.
pub fn pro_key(key: &str) -> String {
    key.replace('-', "_")
}

/// The configuration as ordered `(variable, literal)` pairs.
///
/// `output_path` is folded into `output_directory` so the legacy code sees
/// the run directory directly. Pass-through options with names IDL would
/// reject are dropped with a warning.
pub fn config_pro_pairs(config: &RunConfig) -> Vec<(String, ProValue)> {
    let mut pairs: Vec<(String, ProValue)> = vec![
        ("obs_id".into(), ProValue::Str(config.obs_id.clone())),
        (
            "instrument".into(),
            ProValue::Str(config.instrument.clone()),
        ),
        (
            "input_path".into(),
            ProValue::Path(config.input_path.clone()),
        ),
        (
            "output_directory".into(),
            ProValue::Path(config.run_dir()),
        ),
        ("version".into(), ProValue::Str(config.version.clone())),
        ("beam_nfreq_avg".into(), config.beam_nfreq_avg.into()),
        ("FoV".into(), config.fov.into()),
        ("kbinsize".into(), config.kbinsize.into()),
        ("dimension".into(), config.dimension.into()),
        ("elements".into(), config.elements.into()),
        ("min_baseline".into(), config.min_baseline.into()),
        (
            "run_simulation".into(),
            ProValue::Bool(config.run_simulation),
        ),
    ];
    if let Some(ref grid_psf_file) = config.grid_psf_file {
        pairs.push((
            "grid_psf_file_sav".into(),
            ProValue::Path(grid_psf_file.clone()),
        ));
    }
    for (key, value) in &config.extra {
        let key = pro_key(key);
        if RE_PRO_IDENT.is_match(&key) {
            pairs.push((key, value.clone()));
        } else {
            warn!("Dropping pass-through option with a name IDL would reject: {key}");
        }
    }
    pairs
}

/// The contents of `dunnart_config.pro`.
pub fn config_pro(config: &RunConfig) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    writeln!(out, "PRO dunnart_config,extra").unwrap();
    writeln!(out).unwrap();
    for (key, value) in config_pro_pairs(config) {
        writeln!(out, "  {}={}", key, value).unwrap();
    }
    writeln!(out).unwrap();
    // This is some native FHD talk to ensure there are no duplicate keywords.
    writeln!(
        out,
        "  extra=var_bundle(level=0) ; first gather all variables set in the top-level wrapper"
    )
    .unwrap();
    writeln!(
        out,
        "  extra=var_bundle(level=1) ; next gather all variables set in this file, removing any duplicates."
    )
    .unwrap();
    writeln!(out, "END").unwrap();
    out
}

/// The keyword preamble shared by both drivers.
fn driver_preamble(f: &mut fmt::Formatter<'_>, config: &RunConfig) -> fmt::Result {
    writeln!(f, "    ; Keywords")?;
    writeln!(
        f,
        "    vis_file_list=\"{}\"",
        config.uvfits_path().display()
    )?;
    writeln!(
        f,
        "    output_directory='{}'",
        config.run_dir().display()
    )?;
    writeln!(f, "    version='{}'", config.version)?;
    writeln!(f)?;
    writeln!(f, "    ; Directory setup")?;
    writeln!(
        f,
        "    fhd_file_list=fhd_path_setup(vis_file_list,version=version,output_directory=output_directory)"
    )?;
    writeln!(
        f,
        "    healpix_path=fhd_path_setup(output_dir=output_directory,subdir='Healpix',output_filename='Combined_obs',version=version)"
    )?;
    writeln!(f)
}

/// The config-bundling and keyword-echo epilogue shared by both drivers, plus
/// the stage call.
fn driver_epilogue(f: &mut fmt::Formatter<'_>, stage_call: &str) -> fmt::Result {
    writeln!(
        f,
        "    ; Set global defaults and bundle all the variables into a structure."
    )?;
    writeln!(
        f,
        "    ; Any keywords set on the command line or in the top-level wrapper will supercede these defaults"
    )?;
    writeln!(f, "    dunnart_config,extra")?;
    writeln!(f)?;
    writeln!(f, "    ; print all the keywords that are now set")?;
    writeln!(f, "    print,\"\"")?;
    writeln!(f, "    print,\"Keywords set in wrapper:\"")?;
    writeln!(f, "    print,structure_to_text(extra)")?;
    writeln!(f)?;
    writeln!(f, "    print,\"\"")?;
    writeln!(f, "    ; this runs FHD proper")?;
    writeln!(f, "    {},_Extra=extra", stage_call)?;
    writeln!(f, "end")
}

/// Renders `run_fhd_calibration_only.pro`.
pub struct CalibrationOnlyDriver<'a> {
    /// The run configuration being rendered.
    pub config: &'a RunConfig,
}

impl CalibrationOnlyDriver<'_> {
    /// The driver's procedure (and file) name.
    pub const NAME: &'static str = "run_fhd_calibration_only";
}

impl fmt::Display for CalibrationOnlyDriver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pro {}", Self::NAME)?;
        writeln!(f)?;
        driver_preamble(f, self.config)?;
        driver_epilogue(f, "general_calibration_only")
    }
}

/// Renders `run_fhd_healpix_imaging.pro`.
pub struct HealpixImagingDriver<'a> {
    /// The run configuration being rendered.
    pub config: &'a RunConfig,
}

impl HealpixImagingDriver<'_> {
    /// The driver's procedure (and file) name.
    pub const NAME: &'static str = "run_fhd_healpix_imaging";
}

impl fmt::Display for HealpixImagingDriver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pro {}", Self::NAME)?;
        writeln!(f)?;
        driver_preamble(f, self.config)?;
        writeln!(
            f,
            "    ; Path to where the python-gridded hdf5 files live"
        )?;
        writeln!(
            f,
            "    python_grid_path='{}/gridding_outputs/'",
            self.config.run_dir().display()
        )?;
        writeln!(f)?;
        writeln!(f, "    ; Add in some extra healpix-ps related keywords")?;
        writeln!(f, "    model_flag=1")?;
        writeln!(
            f,
            "    restrict_hpx_inds='EoR0_high_healpix_inds_3x.idlsave'"
        )?;
        if let Some(ref grid_psf_file) = self.config.grid_psf_file {
            writeln!(f, "    grid_psf_file='{}'", grid_psf_file.display())?;
        }
        writeln!(f)?;
        driver_epilogue(f, "general_healpix_imaging")
    }
}

/// The template scripts the calibration driver calls into.
pub const CALIBRATION_TEMPLATES: [(&str, &str); 2] = [
    (
        "fhd_calibration_only.pro",
        include_str!("../../templates/fhd_calibration_only.pro"),
    ),
    (
        "general_calibration_only.pro",
        include_str!("../../templates/general_calibration_only.pro"),
    ),
];

/// The template scripts the HEALPix imaging driver calls into.
pub const HEALPIX_TEMPLATES: [(&str, &str); 4] = [
    (
        "fhd_healpix_imaging.pro",
        include_str!("../../templates/fhd_healpix_imaging.pro"),
    ),
    (
        "general_healpix_imaging.pro",
        include_str!("../../templates/general_healpix_imaging.pro"),
    ),
    (
        "healpix_snapshot_cube_generate_read_python.pro",
        include_str!("../../templates/healpix_snapshot_cube_generate_read_python.pro"),
    ),
    (
        "vis_model_freq_split_read_python.pro",
        include_str!("../../templates/vis_model_freq_split_read_python.pro"),
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfigBuilder;

    fn config() -> RunConfig {
        RunConfigBuilder::default()
            .obs_id("1061316296".to_string())
            .input_path(PathBuf::from("/data/in"))
            .output_path(PathBuf::from("/data/out"))
            .version("cal0".to_string())
            .kbinsize(Some(0.5))
            .build()
            .unwrap()
    }

    #[test]
    fn test_pro_value_literals() {
        assert_eq!(ProValue::Str("mwa".into()).to_string(), "'mwa'");
        assert_eq!(ProValue::Str("it's".into()).to_string(), "'it''s'");
        assert_eq!(ProValue::Bool(true).to_string(), "1");
        assert_eq!(ProValue::Bool(false).to_string(), "0");
        assert_eq!(ProValue::Int(42).to_string(), "42");
        assert_eq!(ProValue::Float(1.0).to_string(), "1.0");
        assert_eq!(ProValue::Float(0.25).to_string(), "0.25");
        assert_eq!(
            ProValue::Path(PathBuf::from("/tmp/x")).to_string(),
            "'/tmp/x'"
        );
        assert_eq!(ProValue::Null.to_string(), "!NULL");
    }

    #[test]
    fn test_pro_key_replaces_dashes() {
        assert_eq!(pro_key("beam-nfreq-avg"), "beam_nfreq_avg");
        assert_eq!(pro_key("kbinsize"), "kbinsize");
    }

    #[test]
    fn test_config_pro_output_directory() {
        let pro = config_pro(&config());
        assert!(pro.starts_with("PRO dunnart_config,extra\n"));
        assert!(pro.contains("  output_directory='/data/out/cal0'\n"));
        assert!(!pro.contains("output_path"));
        assert!(pro.contains("  kbinsize=0.5\n"));
        assert!(pro.contains("  dimension=!NULL\n"));
        assert!(pro.contains("  run_simulation=0\n"));
        assert!(pro.contains("extra=var_bundle(level=0)"));
        assert!(pro.trim_end().ends_with("END"));
    }

    #[test]
    fn test_config_pro_passthrough_keys() {
        let mut config = config();
        config.extra = vec![
            ("n-avg".into(), ProValue::Int(2)),
            ("not a name".into(), ProValue::Int(1)),
        ];
        let pro = config_pro(&config);
        assert!(pro.contains("  n_avg=2\n"));
        assert!(!pro.contains("not a name"));
    }

    #[test]
    fn test_calibration_driver_contents() {
        let config = config();
        let driver = CalibrationOnlyDriver { config: &config }.to_string();
        assert!(driver.starts_with("pro run_fhd_calibration_only\n"));
        assert!(driver.contains("vis_file_list=\"/data/in/1061316296.uvfits\"\n"));
        assert!(driver.contains("fhd_file_list=fhd_path_setup(vis_file_list,"));
        assert!(driver.contains("dunnart_config,extra"));
        assert!(driver.contains("general_calibration_only,_Extra=extra"));
        assert!(driver.trim_end().ends_with("end"));
    }

    #[test]
    fn test_healpix_driver_contents() {
        let mut config = config();
        config.grid_psf_file = Some(PathBuf::from("/data/psf.sav"));
        let driver = HealpixImagingDriver { config: &config }.to_string();
        assert!(driver.contains("python_grid_path='/data/out/cal0/gridding_outputs/'"));
        assert!(driver.contains("model_flag=1"));
        assert!(driver.contains("grid_psf_file='/data/psf.sav'"));
        assert!(driver.contains("general_healpix_imaging,_Extra=extra"));
    }

    #[test]
    fn test_templates_are_procedures() {
        for (name, contents) in CALIBRATION_TEMPLATES.iter().chain(HEALPIX_TEMPLATES.iter()) {
            let stem = name.trim_end_matches(".pro");
            assert!(
                contents.to_lowercase().contains(stem),
                "template {} doesn't define {}",
                name,
                stem
            );
        }
    }
}
