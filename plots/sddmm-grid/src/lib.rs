use std::path::{Path, PathBuf};

use common::{
    axis::TickedAxis,
    config::Settings,
    layout::{GridCell, GridLayout, SharedLegend},
    normalize::{ChartGroup, NormalizeOptions, normalize},
    observation::{Implementation, ObservationTable},
    plot::{Canvas, Figure, OutputFormat, Plot, PlotReport, save_figure},
    style::{LegendEntry, SeriesStyle, marker_element},
    util::nice_ticks,
};
use eyre::{Context, Result};
use itertools::Itertools;
use plotters::{
    coord::Shift,
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use sddmm::{CsvTable, Extractor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const ALPHA: f64 = 0.7;
const X_TICKS: usize = 10;
/// Inches per subplot
const CELL_SIZE: (f64, f64) = (8.0, 4.0);
const LEGEND_COLUMNS: usize = 8;
/// Inches per row of legend entries
const LEGEND_ROW: f64 = 0.35;

/// A results CSV measured at one embedding width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridInput {
    pub k: u32,
    pub path: PathBuf,
}

/// All K groups in one figure, two subplots per row, smoothed over NNZ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridPlot {
    pub inputs: Vec<GridInput>,
    #[serde(default = "default_reference")]
    pub reference: Implementation,
    /// Moving average width, `None` plots the raw rows
    #[serde(default = "default_window")]
    pub window: Option<usize>,
    #[serde(default = "default_nnz_range")]
    pub nnz_range: Option<(u64, u64)>,
}

fn default_reference() -> Implementation {
    Implementation::Bsmr
}

fn default_window() -> Option<usize> {
    Some(5)
}

fn default_nnz_range() -> Option<(u64, u64)> {
    Some((100_000, 2_000_000))
}

impl GridPlot {
    pub fn new(inputs: Vec<GridInput>) -> Self {
        Self {
            inputs,
            reference: default_reference(),
            window: default_window(),
            nnz_range: default_nnz_range(),
        }
    }

    /// `k32_k64` for inputs labelled 32 and 64.
    pub fn suffix(&self) -> String {
        self.inputs
            .iter()
            .map(|input| input.k)
            .sorted()
            .dedup()
            .map(|k| format!("k{k}"))
            .join("_")
    }

    fn options(&self) -> NormalizeOptions {
        NormalizeOptions {
            reference: self.reference,
            nnz_range: self.nnz_range,
            window: self.window,
        }
    }

    fn load(&self) -> Result<ObservationTable> {
        let mut table = ObservationTable::default();
        for input in &self.inputs {
            match CsvTable::with_k(input.k).extract_file(&input.path) {
                Ok(extraction) => table = table.merge(extraction.table),
                Err(err) if !err.is_fatal() => {
                    warn!("Ignoring {}: {err}", input.path.display())
                }
                Err(err) => return Err(err).context(format!("Read results {:?}", input.path)),
            }
        }
        Ok(table)
    }
}

#[typetag::serde]
impl Plot for GridPlot {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn plot(&self, plot_path: &Path, settings: &Settings) -> Result<PlotReport> {
        let table = self.load()?;
        let normalized = normalize(&table, &self.options());
        let mut report = PlotReport {
            skipped: normalized.skipped,
            ..Default::default()
        };

        let Some(layout) = GridLayout::for_groups(normalized.groups.len()) else {
            warn!("No valid data to plot");
            return Ok(report);
        };
        debug!(
            "Laying out {} groups in {}x{}, {} slots left out",
            layout.panels,
            layout.rows,
            layout.cols,
            layout.unused().len()
        );

        let figure = GridFigure {
            legend: legend_for(&normalized.groups),
            groups: &normalized.groups,
            layout,
        };
        report.figures = save_figure(
            &figure,
            plot_path,
            &format!("sddmm_{}", self.suffix()),
            &[OutputFormat::Png, OutputFormat::Pdf],
            settings.raster_dpi(),
        )?;
        info!("Wrote grid of {} groups", layout.panels);
        Ok(report)
    }
}

/// Points of one kernel that get drawn. Unmeasured and zero values are left
/// out, a zero throughput stands for a run that did not happen.
pub fn plotted_points(group: &ChartGroup, implementation: Implementation) -> Vec<(f64, f64)> {
    group
        .points(implementation)
        .into_iter()
        .filter(|(_, y)| *y != 0.0)
        .collect()
}

/// One entry per kernel drawn in any subplot, in first-drawn order.
pub fn legend_for(groups: &[ChartGroup]) -> SharedLegend {
    let mut legend = SharedLegend::default();
    for group in groups {
        for implementation in group.series.keys() {
            if !plotted_points(group, *implementation).is_empty() {
                legend.register(*implementation);
            }
        }
    }
    legend
}

fn legend_rows(legend: &SharedLegend) -> usize {
    legend.entries().len().div_ceil(LEGEND_COLUMNS).max(1)
}

struct GridFigure<'a> {
    groups: &'a [ChartGroup],
    layout: GridLayout,
    legend: SharedLegend,
}

impl Figure for GridFigure<'_> {
    fn size(&self) -> (f64, f64) {
        (
            CELL_SIZE.0 * self.layout.cols as f64,
            CELL_SIZE.1 * self.layout.rows as f64 + LEGEND_ROW * legend_rows(&self.legend) as f64,
        )
    }

    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>, canvas: &Canvas) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;

        let band = canvas.inches((0.0, LEGEND_ROW * legend_rows(&self.legend) as f64)).1;
        let (legend_area, body) = root.split_vertically(band);
        draw_legend(&legend_area, &self.legend, canvas)?;

        let panels = body.split_evenly((self.layout.rows, self.layout.cols));
        for cell in self.layout.cells() {
            draw_panel(&panels[cell.index], &self.groups[cell.index], cell, canvas)?;
        }
        Ok(())
    }
}

fn draw_panel<DB>(
    area: &DrawingArea<DB, Shift>,
    group: &ChartGroup,
    cell: GridCell,
    canvas: &Canvas,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let series = group
        .series
        .keys()
        .map(|imp| (*imp, plotted_points(group, *imp)))
        .filter(|(_, points)| !points.is_empty())
        .collect::<Vec<_>>();

    let (lo, hi) = group
        .nnz
        .iter()
        .copied()
        .minmax()
        .into_option()
        .unwrap_or((0.0, 1.0));
    let pad = if hi > lo { (hi - lo) * 0.02 } else { 1.0 };
    let y_max = series
        .iter()
        .flat_map(|(_, points)| points.iter().map(|(_, y)| *y))
        .fold(0.0f64, f64::max);
    let y_max = if y_max > 0.0 { y_max * 1.05 } else { 1.0 };
    let x_axis = TickedAxis::new(lo - pad..hi + pad, nice_ticks(lo, hi, X_TICKS, false));
    let x_ticks = x_axis.ticks().len();

    let mut chart = ChartBuilder::on(area)
        .caption(format!("K = {}", group.k), canvas.font(12.0))
        .margin(canvas.pt(6.0))
        .x_label_area_size(canvas.pt(if cell.x_label { 34.0 } else { 20.0 }))
        .y_label_area_size(canvas.pt(if cell.y_label { 50.0 } else { 38.0 }))
        .build_cartesian_2d(x_axis, 0f64..y_max)?;

    let x_fmt = |x: &f64| format!("{x:.0}");
    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh()
        .x_labels(x_ticks)
        .x_label_formatter(&x_fmt)
        .label_style(canvas.font(9.0))
        .axis_desc_style(canvas.font(10.0));
    if cell.x_label {
        mesh.x_desc("NNZ");
    }
    if cell.y_label {
        mesh.y_desc("GFLOPS");
    }
    mesh.draw()?;

    let marker_size = canvas.pt(1.5) as i32;
    for (imp, points) in &series {
        let style = SeriesStyle::of(*imp);
        chart.draw_series(LineSeries::new(
            points.iter().copied(),
            style.line(ALPHA, canvas.pt(1.0)),
        ))?;
        for point in points {
            chart.plotting_area().draw(&marker_element(
                style.marker,
                *point,
                marker_size,
                style.fill(ALPHA),
            ))?;
        }
    }
    Ok(())
}

/// Legend entries centred in rows of [`LEGEND_COLUMNS`].
fn draw_legend<DB>(area: &DrawingArea<DB, Shift>, legend: &SharedLegend, canvas: &Canvas) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if legend.is_empty() {
        return Ok(());
    }

    let entry = LegendEntry::new(
        canvas,
        ALPHA,
        TextStyle::from(canvas.font(11.0)).pos(Pos::new(HPos::Left, VPos::Center)),
    );
    let spacing = canvas.pt(16.0) as i32;
    let row_height = canvas.pt(LEGEND_ROW * 72.0) as i32;
    let (width, _) = area.dim_in_pixel();

    for (row, entries) in legend.entries().chunks(LEGEND_COLUMNS).enumerate() {
        let widths = entries
            .iter()
            .map(|imp| entry.width(area, *imp))
            .collect::<Result<Vec<_>>>()?;
        let total = widths.iter().sum::<i32>() + spacing * (widths.len() as i32 - 1);

        let y = row as i32 * row_height + row_height / 2;
        let mut x = (width as i32 - total).max(0) / 2;
        for (imp, entry_width) in entries.iter().zip(&widths) {
            entry.draw(area, *imp, (x, y))?;
            x += entry_width + spacing;
        }
    }
    Ok(())
}
