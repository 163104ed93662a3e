use std::io::BufRead;

use common::observation::{Implementation, Observation, ObservationTable};
use regex::Regex;
use tracing::debug;

use crate::{ExtractError, ExtractStats, Extraction, Extractor, RowError, parse_count, parse_gflops};

/// Context lines look like `## M : 1, N: 2, sparsity: 0.1%, file: /data/a.mtx`.
const FILE_PATTERN: &str = r"\bfile\s*:\s*(?:\S*/)?([^/\s,|]+\.[A-Za-z0-9]+)";

/// First cell of a table header row.
const HEADER_SENTINEL: &str = "M";

/// Markdown report with `file:` context lines followed by pipe tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownReport;

/// Where each field sits within a table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub nnz: usize,
    pub k: usize,
    pub throughput: Vec<(Implementation, usize)>,
    pub min_cells: usize,
}

impl ColumnSchema {
    /// `| M | N | NNZ | sparsity | K | zcx | cuSDDMM | cuSparse | RoDe | ASpT |`
    pub fn legacy() -> Self {
        Self {
            nnz: 2,
            k: 4,
            throughput: vec![
                (Implementation::Zcx, 5),
                (Implementation::CuSddmm, 6),
                (Implementation::CuSparse, 7),
                (Implementation::RoDe, 8),
                (Implementation::Aspt, 9),
            ],
            min_cells: 10,
        }
    }

    /// Derives positions from header names. Needs NNZ, K and at least one
    /// known kernel column.
    pub fn from_header(cells: &[String]) -> Option<Self> {
        let position = |name: &str| cells.iter().position(|c| c.eq_ignore_ascii_case(name));
        let nnz = position("NNZ")?;
        let k = position("K")?;

        let mut throughput: Vec<(Implementation, usize)> = Vec::new();
        for (idx, cell) in cells.iter().enumerate() {
            if let Some(imp) = Implementation::from_name(cell)
                && !throughput.iter().any(|(seen, _)| *seen == imp)
            {
                throughput.push((imp, idx));
            }
        }
        if throughput.is_empty() {
            return None;
        }

        let min_cells = throughput
            .iter()
            .map(|(_, idx)| *idx)
            .chain([nnz, k])
            .max()
            .unwrap_or_default()
            + 1;
        Some(Self {
            nnz,
            k,
            throughput,
            min_cells,
        })
    }

    pub fn implementations(&self) -> impl Iterator<Item = Implementation> + '_ {
        self.throughput.iter().map(|(imp, _)| *imp)
    }

    fn parse_row(&self, source_id: &str, cells: &[String]) -> Result<Observation, RowError> {
        if cells.len() < self.min_cells {
            return Err(RowError::TooShort {
                found: cells.len(),
                expected: self.min_cells,
            });
        }

        let nnz = parse_count("NNZ", &cells[self.nnz])?;
        let k = parse_count("K", &cells[self.k])?;
        let mut observation = Observation::new(source_id, nnz, Some(k));
        for (imp, idx) in &self.throughput {
            observation = observation.with(*imp, parse_gflops(imp.name(), &cells[*idx])?);
        }
        Ok(observation)
    }
}

/// Splits a pipe row into cleaned cells, without the outer delimiters.
fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner
        .split('|')
        .map(|cell| cell.replace('%', "").trim().to_owned())
        .collect()
}

impl Extractor for MarkdownReport {
    fn extract(&self, reader: &mut dyn BufRead) -> Result<Extraction, ExtractError> {
        let file_re = Regex::new(FILE_PATTERN)?;

        let mut schema = ColumnSchema::legacy();
        let mut current_file: Option<String> = None;
        let mut rows = Vec::new();
        let mut stats = ExtractStats::default();

        for (line_no, line) in BufRead::lines(reader).enumerate() {
            let line = line?;
            if let Some(cap) = file_re.captures(&line) {
                current_file = Some(cap[1].trim().to_owned());
                continue;
            }
            if !line.trim_start().starts_with('|') {
                continue;
            }

            let cells = split_row(&line);
            if cells.first().is_some_and(|c| c == HEADER_SENTINEL) {
                schema = ColumnSchema::from_header(&cells).unwrap_or_else(|| {
                    debug!("Header on line {} not recognised, using legacy columns", line_no + 1);
                    ColumnSchema::legacy()
                });
                continue;
            }

            let Some(source_id) = &current_file else {
                debug!("Dropping line {}: no file context yet", line_no + 1);
                stats.orphaned += 1;
                continue;
            };

            match schema.parse_row(source_id, &cells) {
                Ok(observation) => {
                    stats.accepted += 1;
                    rows.push(observation);
                }
                Err(err) => {
                    debug!("Dropping line {}: {err}", line_no + 1);
                    stats.malformed += 1;
                }
            }
        }

        let table = ObservationTable::new(schema.implementations())
            .merge(ObservationTable::from_rows(rows));
        Ok(Extraction { table, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(input: &str) -> Extraction {
        MarkdownReport.extract(&mut input.as_bytes()).unwrap()
    }

    const LEGACY: &str = "\
# SDDMM results

## M : 100, N: 100, sparsity: 99.5%, file: /data/suite/a.mtx

| M | N | NNZ | sparsity | K | zcx_gflops | cuSDDMM_gflops | cuSparse_gflops | RoDe_gflops | ASpT_gflops | check |
|-|-|-|-|-|-|-|-|-|-|-|
| 100 | 100 | 50000 | 99.5% | 32 | 10.0 | 8.0 | 9.0 | 7.0 | 6.0 | pass |
| 100 | 100 | 50000 | 99.5% | 64 | 12.5 | 9.5 | | 7.5 | 6.5 | pass |
";

    #[test]
    fn parses_positional_report_layout() {
        let extraction = extract(LEGACY);
        let rows = extraction.table.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(extraction.stats.accepted, 2);
        // the `|-|-|` separator
        assert_eq!(extraction.stats.malformed, 1);

        assert_eq!(rows[0].source_id, "a.mtx");
        assert_eq!(rows[0].nnz, 50000);
        assert_eq!(rows[0].k, Some(32));
        assert_eq!(rows[0].gflops(Implementation::Zcx), Some(10.0));
        assert_eq!(rows[0].gflops(Implementation::Aspt), Some(6.0));
        assert_eq!(rows[1].gflops(Implementation::CuSparse), None);
        assert_eq!(
            rows[1].throughput.get(&Implementation::CuSparse),
            Some(&None)
        );
    }

    #[test]
    fn header_declares_columns_by_name() {
        let input = "\
file: /data/a.mtx
| M | N | sparsity | NNZ | K | zcx | cuSDDMM | cuSPARSE | RoDe | ASpT |
| | 100 | | 50000 | 64 | 10.0 | 8.0 | 9.0 | 7.0 | 6.0 |
";
        let extraction = extract(input);
        let rows = extraction.table.rows();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.source_id, "a.mtx");
        assert_eq!(row.nnz, 50000);
        assert_eq!(row.k, Some(64));
        assert_eq!(
            [
                Implementation::Zcx,
                Implementation::CuSddmm,
                Implementation::CuSparse,
                Implementation::RoDe,
                Implementation::Aspt,
            ]
            .map(|imp| row.gflops(imp)),
            [Some(10.0), Some(8.0), Some(9.0), Some(7.0), Some(6.0)]
        );
    }

    #[test]
    fn rows_before_any_file_are_dropped() {
        let input = "\
| M | N | NNZ | sparsity | K | zcx | cuSDDMM | cuSparse | RoDe | ASpT |
| 1 | 1 | 10 | 1% | 32 | 1.0 | 1.0 | 1.0 | 1.0 | 1.0 |
file: /x/b.mtx
| 1 | 1 | 20 | 1% | 32 | 2.0 | 2.0 | 2.0 | 2.0 | 2.0 |
";
        let extraction = extract(input);
        assert_eq!(extraction.stats.orphaned, 1);
        assert_eq!(extraction.table.len(), 1);
        assert_eq!(extraction.table.rows()[0].source_id, "b.mtx");
        assert_eq!(extraction.table.rows()[0].nnz, 20);
    }

    #[test]
    fn context_switches_between_files() {
        let input = "\
file: /x/a.mtx
| 1 | 1 | 10 | 1% | 32 | 1.0 | 1.0 | 1.0 | 1.0 | 1.0 |
file: /y/z/b.mtx
| 1 | 1 | 20 | 1% | 32 | 2.0 | 2.0 | 2.0 | 2.0 | 2.0 |
";
        let sources = extract(input)
            .table
            .rows()
            .iter()
            .map(|r| r.source_id.clone())
            .collect::<Vec<_>>();
        assert_eq!(sources, vec!["a.mtx", "b.mtx"]);
    }

    #[test]
    fn bad_rows_do_not_stop_the_scan() {
        let input = "\
file: /x/a.mtx
| 1 | 1 | ten | 1% | 32 | 1.0 | 1.0 | 1.0 | 1.0 | 1.0 |
| 1 | 1 | 10 | 1% | 32 |
| 1 | 1 | 10 | 1% | 32 | 1.0 | oops | 1.0 | 1.0 | 1.0 |
| 1 | 1 | 0 | 1% | 32 | 1.0 | 1.0 | 1.0 | 1.0 | 1.0 |
| 1 | 1 | 30 | 1% | 128 | 3.0 | 3.0 | 3.0 | 3.0 | 3.0 |
";
        let extraction = extract(input);
        assert_eq!(extraction.stats.malformed, 4);
        assert_eq!(extraction.table.len(), 1);
        assert_eq!(extraction.table.rows()[0].k, Some(128));
    }

    #[test]
    fn every_row_is_attributed_and_positive() {
        let extraction = extract(LEGACY);
        assert!(extraction.table.rows().iter().all(|r| {
            !r.source_id.is_empty() && r.nnz > 0 && r.k.is_some_and(|k| k > 0)
        }));
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let extraction = extract("");
        assert!(extraction.table.is_empty());
        assert_eq!(extraction.stats, ExtractStats::default());
    }

    #[test]
    fn unknown_header_falls_back_to_legacy() {
        let cells = split_row("| M | N | rows | cols |");
        assert_eq!(ColumnSchema::from_header(&cells), None);
        let cells = split_row("| M | N | NNZ | sparsity | K | zcx_gflops | cuSDDMM_gflops |");
        let schema = ColumnSchema::from_header(&cells).unwrap();
        assert_eq!(schema.nnz, 2);
        assert_eq!(schema.min_cells, 7);
    }

    #[test]
    fn cells_are_stripped_of_percent_signs() {
        assert_eq!(split_row("| 1 | 99.5% |  x |"), vec!["1", "99.5", "x"]);
    }
}
