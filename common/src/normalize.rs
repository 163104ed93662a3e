use std::{collections::BTreeMap, ops::RangeInclusive};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    observation::{Implementation, Observation, ObservationTable},
    util::moving_average,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Kernel under test, rows without its result are dropped.
    pub reference: Implementation,
    #[serde(default)]
    pub nnz_range: Option<(u64, u64)>,
    #[serde(default)]
    pub window: Option<usize>,
}

impl NormalizeOptions {
    pub fn new(reference: Implementation) -> Self {
        Self {
            reference,
            nnz_range: None,
            window: None,
        }
    }

    pub fn with_nnz_range(mut self, range: RangeInclusive<u64>) -> Self {
        self.nnz_range = Some((*range.start(), *range.end()));
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = Some(window);
        self
    }
}

/// One subplot worth of data, stored column-wise and ordered by NNZ.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartGroup {
    pub k: u32,
    /// Matrices behind each point. Empty once the group has been smoothed.
    pub sources: Vec<String>,
    pub nnz: Vec<f64>,
    pub series: BTreeMap<Implementation, Vec<Option<f64>>>,
}

impl ChartGroup {
    fn from_rows(k: u32, implementations: &[Implementation], rows: &[&Observation]) -> Self {
        Self {
            k,
            sources: rows.iter().map(|row| row.source_id.clone()).collect(),
            nnz: rows.iter().map(|row| row.nnz as f64).collect(),
            series: implementations
                .iter()
                .map(|imp| (*imp, rows.iter().map(|row| row.gflops(*imp)).collect()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nnz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nnz.is_empty()
    }

    /// `(nnz, gflops)` pairs for one kernel, skipping unmeasured points.
    pub fn points(&self, implementation: Implementation) -> Vec<(f64, f64)> {
        self.series
            .get(&implementation)
            .map(|values| {
                self.nnz
                    .iter()
                    .zip(values)
                    .filter_map(|(x, y)| y.map(|y| (*x, y)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn smoothed(&self, window: usize) -> Self {
        let nnz = self.nnz.iter().map(|x| Some(*x)).collect::<Vec<_>>();
        Self {
            k: self.k,
            sources: Vec::new(),
            nnz: moving_average(&nnz, window).into_iter().flatten().collect(),
            series: self
                .series
                .iter()
                .map(|(imp, values)| (*imp, moving_average(values, window)))
                .collect(),
        }
    }
}

/// A K group left out of the output because too few rows survived cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedGroup {
    pub k: u32,
    pub rows: usize,
    pub window: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub groups: Vec<ChartGroup>,
    pub skipped: Vec<SkippedGroup>,
}

/// Sorts by NNZ, drops rows without K or without the reference kernel,
/// keeps the first row per `(source_id, k)` and applies the NNZ bounds.
///
/// The input is left untouched and running this on its own output removes
/// nothing further.
pub fn clean(table: &ObservationTable, options: &NormalizeOptions) -> ObservationTable {
    let rows = table
        .rows()
        .iter()
        .sorted_by_key(|row| row.nnz)
        .filter(|row| row.k.is_some() && row.gflops(options.reference).is_some())
        .unique_by(|row| (*row).key())
        .filter(|row| match options.nnz_range {
            Some((lo, hi)) => (lo..=hi).contains(&row.nnz),
            None => true,
        })
        .cloned()
        .collect::<Vec<_>>();

    debug!(
        "Kept {} of {} rows for reference {}",
        rows.len(),
        table.len(),
        options.reference
    );
    table.derive(rows)
}

/// Cleans `table` and partitions it into one [`ChartGroup`] per K, ascending.
///
/// With a window set, each group is smoothed independently; groups with fewer
/// rows than the window are reported in [`Normalized::skipped`]. A zero window
/// leaves the rows raw.
pub fn normalize(table: &ObservationTable, options: &NormalizeOptions) -> Normalized {
    let cleaned = clean(table, options);
    let by_k = cleaned
        .rows()
        .iter()
        .filter_map(|row| row.k.map(|k| (k, row)))
        .into_group_map();

    let mut normalized = Normalized::default();
    for k in by_k.keys().copied().sorted() {
        let rows = &by_k[&k];
        let group = ChartGroup::from_rows(k, cleaned.implementations(), rows);
        match options.window.filter(|window| *window > 0) {
            Some(window) if rows.len() < window => {
                warn!("Skipping K={k} due to insufficient data points (<{window})");
                normalized.skipped.push(SkippedGroup {
                    k,
                    rows: rows.len(),
                    window,
                });
            }
            Some(window) => normalized.groups.push(group.smoothed(window)),
            None => normalized.groups.push(group),
        }
    }
    normalized
}
