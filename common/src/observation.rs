use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of SDDMM kernels that show up in result reports.
///
/// Variant order is the draw order of every chart, and therefore the order in
/// which legend entries are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Implementation {
    Zcx,
    Bsmr,
    FlashSparse,
    RoDe,
    Aspt,
    CuSddmm,
    CuSparse,
    Tcgnn,
    Sputnik,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown implementation: {0}")]
pub struct UnknownImplementation(pub String);

impl Implementation {
    pub const ALL: [Implementation; 9] = [
        Implementation::Zcx,
        Implementation::Bsmr,
        Implementation::FlashSparse,
        Implementation::RoDe,
        Implementation::Aspt,
        Implementation::CuSddmm,
        Implementation::CuSparse,
        Implementation::Tcgnn,
        Implementation::Sputnik,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Implementation::Zcx => "zcx",
            Implementation::Bsmr => "BSMR",
            Implementation::FlashSparse => "FlashSparse",
            Implementation::RoDe => "RoDe",
            Implementation::Aspt => "ASpT",
            Implementation::CuSddmm => "cuSDDMM",
            Implementation::CuSparse => "cuSPARSE",
            Implementation::Tcgnn => "TCGNN",
            Implementation::Sputnik => "Sputnik",
        }
    }

    /// Resolves a column or CLI name. Matching ignores case and a trailing
    /// `_gflops`, so `cuSparse`, `cuSPARSE` and `cusparse_gflops` are one kernel.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let lower = name.to_ascii_lowercase();
        let base = lower.strip_suffix("_gflops").unwrap_or(&lower);
        Self::ALL
            .into_iter()
            .find(|imp| imp.name().eq_ignore_ascii_case(base))
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Implementation {
    type Err = UnknownImplementation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownImplementation(s.to_owned()))
    }
}

impl TryFrom<String> for Implementation {
    type Error = UnknownImplementation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Implementation> for String {
    fn from(value: Implementation) -> Self {
        value.name().to_owned()
    }
}

/// One benchmark row: a matrix at one embedding width.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub source_id: String,
    pub nnz: u64,
    pub k: Option<u32>,
    /// GFLOPS per kernel. `None` means the kernel was not measured.
    pub throughput: BTreeMap<Implementation, Option<f64>>,
}

impl Observation {
    pub fn new(source_id: impl Into<String>, nnz: u64, k: Option<u32>) -> Self {
        Self {
            source_id: source_id.into(),
            nnz,
            k,
            throughput: BTreeMap::new(),
        }
    }

    pub fn with(mut self, implementation: Implementation, gflops: Option<f64>) -> Self {
        self.throughput.insert(implementation, gflops);
        self
    }

    pub fn gflops(&self, implementation: Implementation) -> Option<f64> {
        self.throughput.get(&implementation).copied().flatten()
    }

    /// Dedup key, a matrix should appear once per K.
    pub fn key(&self) -> (&str, Option<u32>) {
        (&self.source_id, self.k)
    }
}

/// Rows sharing one set of kernels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationTable {
    implementations: Vec<Implementation>,
    rows: Vec<Observation>,
}

impl ObservationTable {
    pub fn new(implementations: impl IntoIterator<Item = Implementation>) -> Self {
        let mut implementations = implementations.into_iter().collect::<Vec<_>>();
        implementations.sort();
        implementations.dedup();
        Self {
            implementations,
            rows: Vec::new(),
        }
    }

    /// Builds a table whose schema is the union of the kernels seen in `rows`.
    /// Rows lacking one of those kernels get an explicit `None`.
    pub fn from_rows(rows: Vec<Observation>) -> Self {
        let mut table = Self::new(rows.iter().flat_map(|row| row.throughput.keys().copied()));
        for row in rows {
            table.push(row);
        }
        table
    }

    /// Appends a row, conforming its kernel map to the table schema.
    pub fn push(&mut self, mut row: Observation) {
        row.throughput
            .retain(|imp, _| self.implementations.contains(imp));
        for imp in &self.implementations {
            row.throughput.entry(*imp).or_insert(None);
        }
        self.rows.push(row);
    }

    /// Same schema, different rows.
    pub fn derive(&self, rows: Vec<Observation>) -> Self {
        let mut table = Self::new(self.implementations.iter().copied());
        for row in rows {
            table.push(row);
        }
        table
    }

    pub fn implementations(&self) -> &[Implementation] {
        &self.implementations
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Concatenates tables, widening the schema to the union of both.
    pub fn merge(self, other: ObservationTable) -> Self {
        let implementations = self
            .implementations
            .iter()
            .chain(other.implementations.iter())
            .copied()
            .collect::<Vec<_>>();
        let mut table = Self::new(implementations);
        for row in self.rows.into_iter().chain(other.rows) {
            table.push(row);
        }
        table
    }
}
