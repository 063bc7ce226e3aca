// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Input data file format modules.

pub mod error;
pub mod metafits;
pub mod uvfits;

pub use error::IOError;
pub use metafits::{read_metafits, MetafitsMeta};
pub use uvfits::{read_uvfits, GroupParams, UvfitsHeader};
