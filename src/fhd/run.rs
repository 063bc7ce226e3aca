// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Driving the external IDL interpreter.
//!
//! Each stage writes its scripts into the run directory, launches the
//! interpreter there and blocks until it exits. Everything the interpreter
//! prints is relayed through the logger; a nonzero exit status is reported
//! but is not an error, since the legacy code signals most failures through
//! its output only.

use std::{
    fs,
    path::PathBuf,
    process::Command,
    time::{Duration, Instant},
};

use log::{info, warn};
use thiserror::Error;

use super::script::{
    config_pro, CalibrationOnlyDriver, HealpixImagingDriver, CALIBRATION_TEMPLATES,
    HEALPIX_TEMPLATES,
};
use crate::{config::RunConfig, constants::IDL_DEVICE_ARGS};

/// Errors that can occur when setting up or launching a legacy stage.
#[derive(Error, Debug)]
pub enum FhdError {
    /// The run directory couldn't be created.
    #[error("Couldn't create the run directory {dir}: {source}")]
    CreateDir {
        /// The directory that was being created
        dir: PathBuf,
        /// The underlying io error
        source: std::io::Error,
    },

    /// A script or template couldn't be written.
    #[error("Couldn't write {path}: {source}")]
    WriteScript {
        /// The path that was being written
        path: PathBuf,
        /// The underlying io error
        source: std::io::Error,
    },

    /// The interpreter couldn't be launched at all.
    #[error("Couldn't launch `{command}`: {source}")]
    Launch {
        /// The command line that failed to launch
        command: String,
        /// The underlying io error
        source: std::io::Error,
    },
}

/// What happened when a legacy stage ran.
#[derive(Debug)]
pub struct FhdRunInfo {
    /// Where the legacy outputs will be found. The legacy code prepends
    /// `fhd_` onto the front of the subdirectory.
    pub output_dir: PathBuf,
    /// The interpreter's exit status code, if there was one.
    pub exit_status: Option<i32>,
    /// How long the interpreter ran for.
    pub elapsed: Duration,
}

/// Run the legacy calibration stage: write the scripts, install the
/// templates and invoke the interpreter in the run directory.
///
/// # Errors
///
/// Can raise [`FhdError`] if the run directory or any script can't be
/// written, or the interpreter can't be launched.
pub fn run_calibration_only(config: &RunConfig) -> Result<FhdRunInfo, FhdError> {
    info!("Writing IDL .pro files to run IDL FHD calibration only");
    write_stage_scripts(
        config,
        CalibrationOnlyDriver::NAME,
        &CalibrationOnlyDriver { config }.to_string(),
        &CALIBRATION_TEMPLATES,
    )?;
    let (exit_status, elapsed) = run_interpreter(config, CalibrationOnlyDriver::NAME)?;
    info!(
        "Running IDL FHD calibration took {:.1} minutes",
        elapsed.as_secs_f64() / 60.0
    );
    Ok(FhdRunInfo {
        output_dir: config.fhd_output_dir(),
        exit_status,
        elapsed,
    })
}

/// Run the legacy HEALPix imaging stage over externally gridded uv planes.
///
/// # Errors
///
/// Can raise [`FhdError`] if the run directory or any script can't be
/// written, or the interpreter can't be launched.
pub fn run_healpix_imaging(config: &RunConfig) -> Result<FhdRunInfo, FhdError> {
    info!("Writing IDL .pro files to run IDL FHD imaging/healpix projection");
    write_stage_scripts(
        config,
        HealpixImagingDriver::NAME,
        &HealpixImagingDriver { config }.to_string(),
        &HEALPIX_TEMPLATES,
    )?;
    let (exit_status, elapsed) = run_interpreter(config, HealpixImagingDriver::NAME)?;
    info!(
        "Running IDL FHD imaging/healpix projection took {:.1} minutes",
        elapsed.as_secs_f64() / 60.0
    );
    Ok(FhdRunInfo {
        output_dir: config.fhd_output_dir(),
        exit_status,
        elapsed,
    })
}

/// Write the configuration script, the driver and the bundled templates into
/// the run directory.
fn write_stage_scripts(
    config: &RunConfig,
    driver_name: &str,
    driver_contents: &str,
    templates: &[(&str, &str)],
) -> Result<(), FhdError> {
    let run_dir = config.run_dir();
    fs::create_dir_all(&run_dir).map_err(|source| FhdError::CreateDir {
        dir: run_dir.clone(),
        source,
    })?;

    let write = |name: String, contents: &str| {
        let path = run_dir.join(name);
        fs::write(&path, contents).map_err(|source| FhdError::WriteScript {
            path: path.clone(),
            source,
        })
    };
    write("dunnart_config.pro".to_string(), &config_pro(config))?;
    write(format!("{}.pro", driver_name), driver_contents)?;
    for (name, contents) in templates {
        write((*name).to_string(), contents)?;
    }
    Ok(())
}

/// Launch the interpreter in the run directory and relay its output.
fn run_interpreter(
    config: &RunConfig,
    driver_name: &str,
) -> Result<(Option<i32>, Duration), FhdError> {
    let args: Vec<&str> = IDL_DEVICE_ARGS
        .iter()
        .copied()
        .chain(["-e", driver_name])
        .collect();
    let command_line = shlex::join(
        std::iter::once(config.idl_command.as_str()).chain(args.iter().copied()),
    );
    info!(
        "Launching IDL on the command line via the command:\n\t$ {}",
        command_line
    );

    let before = Instant::now();
    let output = Command::new(&config.idl_command)
        .args(&args)
        .current_dir(config.run_dir())
        .output()
        .map_err(|source| FhdError::Launch {
            command: command_line,
            source,
        })?;
    let elapsed = before.elapsed();

    // Stick some tabs on the front of the lines so they sit nicely in the log.
    let stdout = String::from_utf8_lossy(&output.stdout);
    let indented = format!("\t{}", stdout.trim_end().replace('\n', "\n\t"));
    info!("Here is everything IDL FHD printed:\n{}", indented);
    if !output.stderr.is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("IDL stderr:\n\t{}", stderr.trim_end().replace('\n', "\n\t"));
    }
    if !output.status.success() {
        warn!("IDL exited with status {:?}", output.status.code());
    }

    Ok((output.status.code(), elapsed))
}
