// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command Line Interface helpers for dunnart.

use std::{
    ffi::OsString,
    fmt::{Debug, Display},
    path::PathBuf,
};

use clap::{arg, command, ErrorKind::ArgumentNotFound, ValueHint::DirPath, ValueHint::FilePath};
use itertools::izip;
use log::{debug, info, trace};
use prettytable::{cell, format as prettyformat, row, table};

use crate::{
    config::RunConfig,
    error::{CLIError::InvalidCommandLineArgument, DunnartError, DunnartError::DryRun},
    fhd::{run_calibration_only, run_healpix_imaging, ProValue},
    io::uvfits::{read_uvfits, GroupParams, UvfitsHeader},
    obs::{Obs, ObsMeta},
};

/// Everything needed for a run: the configuration, the input records and the
/// derived observation structures.
pub struct DunnartContext {
    /// Run options.
    pub config: RunConfig,
    /// The uvfits header record.
    pub header: UvfitsHeader,
    /// The uvfits group parameters.
    pub params: GroupParams,
    /// The derived observation structure.
    pub obs: Obs,
    /// The derived observation metadata.
    pub meta: ObsMeta,
    /// Run the legacy calibration stage.
    pub run_calibration: bool,
    /// Run the legacy HEALPix imaging stage.
    pub run_imaging: bool,
}

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

/// Write many info-level log lines of how this executable was compiled.
///
/// # Errors
///
/// propagates writeln! fails
pub fn fmt_build_info(f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match GIT_HEAD_REF {
        Some(hr) => {
            let dirty = GIT_DIRTY.unwrap_or(false);
            writeln!(
                f,
                "Compiled on git commit hash: {}{}",
                GIT_COMMIT_HASH.unwrap(),
                if dirty { " (dirty)" } else { "" }
            )?;
            writeln!(f, "            git head ref: {}", hr)?;
        }
        None => writeln!(f, "Compiled on git commit hash: <no git info>")?,
    }
    writeln!(f, "            {}", BUILT_TIME_UTC)?;
    writeln!(f, "         with compiler {}", RUSTC_VERSION)?;
    writeln!(f)?;
    Ok(())
}

impl Display for DunnartContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} version {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        )?;

        fmt_build_info(f)?;

        writeln!(f, "observation id:       {}", self.config.obs_id)?;
        writeln!(f, "uvfits input:         {}", self.config.uvfits_path().display())?;
        writeln!(
            f,
            "metafits input:       {}{}",
            self.config.metafits_path().display(),
            if self.config.metafits_path().is_file() {
                ""
            } else {
                " (absent, using uvfits header)"
            }
        )?;
        writeln!(f, "run directory:        {}", self.config.run_dir().display())?;

        writeln!(
            f,
            "Counts:               {} pols, {} tiles, {} chans, {} times, {} baselines, {} vis",
            self.obs.n_pol,
            self.obs.n_tile,
            self.obs.n_freq,
            self.obs.n_time,
            self.obs.n_baselines,
            self.obs.n_vis,
        )?;
        writeln!(
            f,
            "Frequency:            centre {:.6} MHz, res {:.1} kHz, beam bins of {} chans",
            self.obs.freq_center / 1e6,
            self.obs.freq_res / 1e3,
            self.obs.beam_nfreq_avg,
        )?;
        writeln!(
            f,
            "UV plane:             {} x {} px * {:.3} wavelengths, {:.5} deg/px",
            self.obs.dimension, self.obs.elements, self.obs.kbinsize, self.obs.degpix,
        )?;
        writeln!(
            f,
            "Baselines:            min {:.3}, max {:.3} wavelengths",
            self.obs.min_baseline, self.obs.max_baseline,
        )?;
        writeln!(
            f,
            "Phase centre:         RA {:8.4} deg, Dec {:8.4} deg",
            self.meta.phase_radec.ra.to_degrees(),
            self.meta.phase_radec.dec.to_degrees(),
        )?;
        writeln!(
            f,
            "Zenith:               RA {:8.4} deg, Dec {:8.4} deg -> pixel ({:.1}, {:.1})",
            self.meta.zenith.ra.to_degrees(),
            self.meta.zenith.dec.to_degrees(),
            self.meta.zenx,
            self.meta.zeny,
        )?;
        writeln!(
            f,
            "Pointing:             az {:8.4} deg, el {:8.4} deg at JD {:.5} ({:.4})",
            self.meta.obs_azel.az.to_degrees(),
            self.meta.obs_azel.el.to_degrees(),
            self.meta.jd0,
            self.meta.epoch,
        )?;

        let mut tile_table = table!(["", "tile", "height [m]", "f"]);
        tile_table.set_format(*prettyformat::consts::FORMAT_CLEAN);
        for (idx, (name, height, flag)) in izip!(
            self.meta.tile_names.iter(),
            self.meta.tile_heights.iter(),
            self.meta.tile_flags.iter()
        )
        .enumerate()
        {
            let row = row![r =>
                format!("ant{}:", idx),
                name,
                format!("{:.2}", height),
                if *flag {"f"} else {""}
            ];
            tile_table.add_row(row);
        }
        writeln!(
            f,
            "Tile details (all={}, flag={}):\n{}",
            self.meta.tile_flags.len(),
            self.meta.tile_flags.iter().filter(|&&flag| flag).count(),
            tile_table
        )?;

        writeln!(
            f,
            "IDL stages:           calibration={}, healpix imaging={} (interpreter: {})",
            self.run_calibration, self.run_imaging, self.config.idl_command,
        )?;

        Ok(())
    }
}

impl DunnartContext {
    fn get_matches<I, T>(args: I) -> Result<clap::ArgMatches, DunnartError>
    where
        I: IntoIterator<Item = T> + Debug,
        T: Into<OsString> + Clone,
    {
        let mut app = command!()
            .arg_required_else_help(true)
            .next_line_help(false)
            .about("Derive FHD observation metadata from MWA uvfits/metafits \
                    files and drive the legacy IDL FHD stages.")
            .args(&[
                // input options
                arg!(obs_id: <OBS_ID> "The observation ID, per the MWA file naming standards")
                    .help_heading("INPUT"),
                arg!(-u --"uvfits-path" <DIR> "Directory for the uvfits and metafits files")
                    .required(false)
                    .value_hint(DirPath)
                    .help_heading("INPUT"),

                // imaging options
                arg!(--fov <DEGREES> "Proxy for the field of view; sets the UV resolution to (180/pi)/FoV")
                    .required(false)
                    .help_heading("IMAGING"),
                arg!(--kbinsize <WAVELENGTHS> "UV-plane pixel size")
                    .required(false)
                    .help_heading("IMAGING"),
                arg!(--dimension <PIXELS> "Number of UV-plane pixels along the first axis")
                    .required(false)
                    .help_heading("IMAGING"),
                arg!(--elements <PIXELS> "Number of UV-plane pixels along the second axis")
                    .required(false)
                    .help_heading("IMAGING"),
                arg!(--"min-baseline" <WAVELENGTHS> "Minimum baseline length to analyse")
                    .required(false)
                    .help_heading("IMAGING"),
                arg!(--"beam-nfreq-avg" <COUNT> "Fine channels to average per beam calculation")
                    .required(false)
                    .help_heading("IMAGING"),
                arg!(--instrument <NAME> "Instrument name recorded in the observation structure")
                    .required(false)
                    .help_heading("IMAGING"),

                // simulation options
                arg!(--"run-simulation" "Treat this as an in-situ simulation run")
                    .help_heading("SIMULATION"),

                // output options
                arg!(-o --"output-path" <DIR> "Directory for the run outputs")
                    .required(false)
                    .value_hint(DirPath)
                    .help_heading("OUTPUT"),
                arg!(--"run-version" <LABEL> "Label for this run; selects the run directory")
                    .required(false)
                    .help_heading("OUTPUT"),
                arg!(--"dry-run" "Just print the summary and exit"),

                // legacy IDL options
                arg!(--"run-calibration-only" "Run the legacy FHD calibration stage")
                    .help_heading("IDL"),
                arg!(--"run-healpix-imaging" "Run the legacy FHD healpix imaging stage")
                    .help_heading("IDL"),
                arg!(--"idl-command" <CMD> "External interpreter binary for the legacy stages")
                    .required(false)
                    .help_heading("IDL"),
                arg!(--"grid-psf-file" <PATH> "Gridding PSF save file for the healpix imaging stage")
                    .required(false)
                    .value_hint(FilePath)
                    .help_heading("IDL"),
                arg!(-x --extra <KEYVAL>... "Pass KEY=VALUE through to the generated IDL configuration")
                    .required(false)
                    .multiple_values(true)
                    .multiple_occurrences(true)
                    .help_heading("IDL"),
            ]);
        let matches = app.try_get_matches_from_mut(args)?;
        Ok(matches)
    }

    fn parse_config_matches(matches: &clap::ArgMatches) -> Result<RunConfig, DunnartError> {
        let mut config = RunConfig {
            obs_id: match matches.value_of_t("obs_id") {
                Ok(obs_id) => obs_id,
                _ => unreachable!("<OBS_ID> is required, enforced by clap"),
            },
            ..RunConfig::default()
        };
        if let Some(dir) = matches.value_of("uvfits-path") {
            config.input_path = PathBuf::from(dir);
        }
        if let Some(dir) = matches.value_of("output-path") {
            config.output_path = PathBuf::from(dir);
        }
        if let Some(label) = matches.value_of("run-version") {
            config.version = label.to_string();
        }
        if let Some(instrument) = matches.value_of("instrument") {
            config.instrument = instrument.to_string();
        }
        if let Some(cmd) = matches.value_of("idl-command") {
            config.idl_command = cmd.to_string();
        }
        config.grid_psf_file = matches.value_of("grid-psf-file").map(Into::into);
        config.run_simulation = matches.is_present("run-simulation");

        config.fov = parse_positive_f64(matches, "fov", "--fov <DEGREES>")?;
        config.kbinsize = parse_positive_f64(matches, "kbinsize", "--kbinsize <WAVELENGTHS>")?;
        config.min_baseline =
            parse_positive_f64(matches, "min-baseline", "--min-baseline <WAVELENGTHS>")?;
        config.dimension = parse_positive_usize(matches, "dimension", "--dimension <PIXELS>")?;
        config.elements = parse_positive_usize(matches, "elements", "--elements <PIXELS>")?;
        config.beam_nfreq_avg =
            parse_positive_usize(matches, "beam-nfreq-avg", "--beam-nfreq-avg <COUNT>")?;

        match matches.values_of("extra") {
            Some(pairs) => {
                for pair in pairs {
                    let (key, value) = pair.split_once('=').ok_or_else(|| {
                        DunnartError::CLIError(InvalidCommandLineArgument {
                            option: "--extra <KEYVAL>...".into(),
                            expected: "KEY=VALUE".into(),
                            received: pair.into(),
                        })
                    })?;
                    config.extra.push((key.to_string(), parse_pro_value(value)));
                }
            }
            None => {}
        }

        Ok(config)
    }

    /// Parse an iterator of arguments, `args` into a `DunnartContext`,
    /// reading the input files and building the observation structures.
    ///
    /// # Errors
    ///
    /// Can raise:
    /// - `clap::Error` if clap cannot parse `args`
    /// - `DunnartError::CLIError` if the arguments are invalid.
    /// - io/obs/meta errors if the input files are unreadable or
    ///   inconsistent.
    pub fn from_args<I, T>(args: I) -> Result<Self, DunnartError>
    where
        I: IntoIterator<Item = T> + Debug,
        T: Into<OsString> + Clone,
    {
        debug!("args:\n{:?}", &args);

        let matches = Self::get_matches(args)?;
        trace!("arg matches:\n{:?}", &matches);

        let config = Self::parse_config_matches(&matches)?;
        let (header, params) = read_uvfits(config.uvfits_path())?;
        let obs = Obs::from_uvfits(&header, &params, &config)?;
        let meta = ObsMeta::new(&obs, &header, &params, &config)?;

        let result = Self {
            config,
            header,
            params,
            obs,
            meta,
            run_calibration: matches.is_present("run-calibration-only"),
            run_imaging: matches.is_present("run-healpix-imaging"),
        };

        info!("{}", &result);

        if matches.is_present("dry-run") {
            return Err(DryRun {});
        }

        Ok(result)
    }

    /// Run the selected legacy stages.
    ///
    /// # Errors
    ///
    /// Can raise `DunnartError::FhdError` if scripts can't be written or the
    /// interpreter can't be launched.
    pub fn run(self) -> Result<(), DunnartError> {
        if !self.run_calibration && !self.run_imaging {
            info!("No IDL stage selected; the observation summary above is the whole run.");
            return Ok(());
        }
        if self.run_calibration {
            let run_info = run_calibration_only(&self.config)?;
            info!(
                "IDL calibration outputs will be under {}",
                run_info.output_dir.display()
            );
        }
        if self.run_imaging {
            let run_info = run_healpix_imaging(&self.config)?;
            info!(
                "IDL healpix imaging outputs will be under {}",
                run_info.output_dir.display()
            );
        }
        Ok(())
    }
}

/// A pass-through value: an integer or float if it looks like one, otherwise
/// a string.
fn parse_pro_value(value: &str) -> ProValue {
    if let Ok(i) = value.parse::<i64>() {
        ProValue::Int(i)
    } else if let Ok(v) = value.parse::<f64>() {
        ProValue::Float(v)
    } else {
        ProValue::Str(value.to_string())
    }
}

fn parse_positive_f64(
    matches: &clap::ArgMatches,
    name: &str,
    option: &str,
) -> Result<Option<f64>, DunnartError> {
    match matches.value_of_t::<f64>(name) {
        Ok(value) => {
            if value <= 0.0 {
                return Err(DunnartError::CLIError(InvalidCommandLineArgument {
                    option: option.into(),
                    expected: "a positive number".into(),
                    received: format!("{}", value),
                }));
            }
            Ok(Some(value))
        }
        Err(err) if err.kind() == ArgumentNotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_positive_usize(
    matches: &clap::ArgMatches,
    name: &str,
    option: &str,
) -> Result<Option<usize>, DunnartError> {
    match matches.value_of_t::<usize>(name) {
        Ok(value) => {
            if value == 0 {
                return Err(DunnartError::CLIError(InvalidCommandLineArgument {
                    option: option.into(),
                    expected: "a positive, non-zero integer".into(),
                    received: format!("{}", value),
                }));
            }
            Ok(Some(value))
        }
        Err(err) if err.kind() == ArgumentNotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
