// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error types visible at the crate boundary.

use thiserror::Error;

use crate::{
    fhd::FhdError,
    io::IOError,
    obs::{MetaError, ObsError},
};

/// Any error that can surface from a run.
#[derive(Error, Debug)]
pub enum DunnartError {
    /// A dry run stopped before doing anything.
    #[error("You selected dry run, so this run did not complete!")]
    DryRun {},

    /// An invalid command line argument.
    #[error(transparent)]
    CLIError(#[from] CLIError),

    /// An error parsing the command line.
    #[cfg(feature = "cli")]
    #[error(transparent)]
    ClapError(#[from] clap::Error),

    /// An error reading the input files.
    #[error(transparent)]
    IOError(#[from] IOError),

    /// An error building the observation structure.
    #[error(transparent)]
    ObsError(#[from] ObsError),

    /// An error building the observation metadata.
    #[error(transparent)]
    MetaError(#[from] MetaError),

    /// An error from the legacy bridge.
    #[error(transparent)]
    FhdError(#[from] FhdError),
}

/// Errors for invalid command line arguments.
#[derive(Error, Debug)]
pub enum CLIError {
    /// An argument parsed, but its value is out of range.
    #[error("Invalid command line argument {option}: expected {expected}, received {received}")]
    InvalidCommandLineArgument {
        /// The option that was invalid
        option: String,
        /// What the option expects
        expected: String,
        /// What was received instead
        received: String,
    },
}
