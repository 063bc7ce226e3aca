// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Utility functions.
//!
//! The binning helpers here reproduce the semantics of IDL's `histogram` and
//! `uniq`, which the FHD observation setup is built around. Reverse indices
//! are the load-bearing part: they map each histogram bin back to the indices
//! of the values that landed in it.

/// An IDL-style histogram: bin counts plus the reverse-index vector.
///
/// `reverse_indices` has length `counts.len() + 1 + n`, where `n` is the
/// number of binned values. The first `counts.len() + 1` entries are offsets
/// into the vector itself: the values that fell into bin `i` have their
/// original indices stored at
/// `reverse_indices[reverse_indices[i]..reverse_indices[i + 1]]`.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// The number of values in each bin.
    pub counts: Vec<usize>,
    /// The lower edge of the first bin.
    pub min: f64,
    /// The width of each bin.
    pub bin_size: f64,
    /// IDL-style reverse indices (offsets, then original indices).
    pub reverse_indices: Vec<usize>,
}

impl Histogram {
    /// The original indices of the values that fell into bin `bin`.
    pub fn bin_members(&self, bin: usize) -> &[usize] {
        let start = self.reverse_indices[bin];
        let end = self.reverse_indices[bin + 1];
        &self.reverse_indices[start..end]
    }
}

/// Bin `data` into bins of width `bin_size`, starting at `min` (the data
/// minimum when `None`) and ending at `max` (the data maximum when `None`).
///
/// Values outside `[min, max]` are not binned. A value exactly equal to `max`
/// lands in the last bin, as in IDL.
pub fn histogram(data: &[f64], bin_size: f64, min: Option<f64>, max: Option<f64>) -> Histogram {
    assert!(bin_size > 0.0, "histogram bin_size must be positive");
    let data_min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let data_max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = min.unwrap_or(data_min);
    let max = max.unwrap_or(data_max);
    let num_bins = (((max - min) / bin_size).floor() as usize) + 1;

    let mut counts = vec![0_usize; num_bins];
    let mut bin_idxs = Vec::with_capacity(data.len());
    for &value in data {
        if value < min || value > max {
            bin_idxs.push(None);
            continue;
        }
        let bin = (((value - min) / bin_size).floor() as usize).min(num_bins - 1);
        counts[bin] += 1;
        bin_idxs.push(Some(bin));
    }

    // offsets first, then the member indices bin by bin
    let mut reverse_indices = vec![0_usize; num_bins + 1];
    reverse_indices[0] = num_bins + 1;
    for bin in 0..num_bins {
        reverse_indices[bin + 1] = reverse_indices[bin] + counts[bin];
    }
    let mut cursors = reverse_indices[..num_bins].to_vec();
    reverse_indices.resize(num_bins + 1 + bin_idxs.iter().flatten().count(), 0);
    for (idx, bin) in bin_idxs.iter().enumerate() {
        if let Some(bin) = bin {
            reverse_indices[cursors[*bin]] = idx;
            cursors[*bin] += 1;
        }
    }

    Histogram {
        counts,
        min,
        bin_size,
        reverse_indices,
    }
}

/// The index of the last element of each run of equal values, as IDL's `uniq`
/// reports them for sorted input.
///
/// For the time column of a uvfits file (sorted by timestep), the first
/// returned index plus one is the number of baselines per timestep.
pub fn argunique(data: &[f64]) -> Vec<usize> {
    let mut out = Vec::new();
    for i in 0..data.len() {
        if i + 1 == data.len() || data[i] != data[i + 1] {
            out.push(i);
        }
    }
    out
}

/// Indices that stably sort `keys` in ascending order.
pub fn stable_argsort<T: Ord>(keys: &[T]) -> Vec<usize> {
    let mut idxs: Vec<usize> = (0..keys.len()).collect();
    idxs.sort_by_key(|&i| &keys[i]);
    idxs
}

/// The median of a slice, averaging the two central values for even lengths.
pub fn median(values: &[f64]) -> f64 {
    assert!(!values.is_empty(), "median of an empty slice");
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
