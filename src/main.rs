// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::ErrorKind::{DisplayHelp, DisplayVersion};
use dunnart::{
    cli::DunnartContext,
    DunnartError::{ClapError, DryRun},
};
use log::{info, trace};
use std::{env, ffi::OsString, fmt::Debug};

fn main_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    I: Debug,
{
    let ctx = match DunnartContext::from_args(args) {
        Ok(ctx) => ctx,
        Err(DryRun {}) => {
            info!("Dry run. No files will be written.");
            return 0;
        }
        Err(ClapError(inner)) => {
            // Swallow broken pipe errors
            trace!("clap error: {:?}", inner.kind());
            let _ = inner.print();
            match inner.kind() {
                DisplayHelp | DisplayVersion => return 0,
                _ => return 1,
            }
        }
        Err(e) => {
            eprintln!("error parsing args: {e}");
            return 1;
        }
    };

    match ctx.run() {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("run error: {e}");
            1
        }
    }
}

fn main() {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    trace!("start main");
    let retcode = main_with_args(env::args());
    trace!("end main");
    std::process::exit(retcode);
}
