use std::path::{Path, PathBuf};

use common::{
    axis::TickedAxis,
    config::Settings,
    normalize::{ChartGroup, NormalizeOptions, normalize},
    observation::Implementation,
    plot::{Canvas, Figure, OutputFormat, Plot, PlotReport, save_figure},
    style::{LegendEntry, SeriesStyle, marker_element},
    util::nice_ticks,
};
use eyre::{Context, Result};
use plotters::{
    coord::Shift,
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use sddmm::{Extractor, MarkdownReport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// At most this many NNZ categories get a tick label.
const MAX_TICKS: usize = 40;
const ALPHA: f64 = 0.6;

/// One figure per K from a markdown report, NNZ as categorical x-axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinePlot {
    pub file: PathBuf,
    #[serde(default = "default_reference")]
    pub reference: Implementation,
}

fn default_reference() -> Implementation {
    Implementation::Zcx
}

impl LinePlot {
    pub fn new(file: PathBuf) -> Self {
        Self {
            file,
            reference: default_reference(),
        }
    }
}

#[typetag::serde]
impl Plot for LinePlot {
    fn name(&self) -> &'static str {
        "line"
    }

    fn plot(&self, plot_path: &Path, settings: &Settings) -> Result<PlotReport> {
        let extraction = MarkdownReport
            .extract_file(&self.file)
            .context(format!("Read report {:?}", self.file))?;

        let normalized = normalize(&extraction.table, &NormalizeOptions::new(self.reference));
        let mut report = PlotReport {
            skipped: normalized.skipped,
            ..Default::default()
        };
        if normalized.groups.is_empty() {
            warn!("No valid data to plot in {}", self.file.display());
            return Ok(report);
        }

        for group in &normalized.groups {
            debug!("K={} has {} matrices", group.k, group.len());
            let figure = LineFigure { group };
            report.figures.extend(save_figure(
                &figure,
                plot_path,
                &format!("gflops_line_k{}", group.k),
                &[OutputFormat::Png],
                settings.raster_dpi(),
            )?);
        }
        info!("Wrote {} line plots", report.figures.len());
        Ok(report)
    }
}

/// Contiguous runs of measured values, keyed by category index. An
/// unmeasured point breaks the line.
pub fn segments(values: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (idx, value) in values.iter().enumerate() {
        match value {
            Some(y) => current.push((idx as f64, *y)),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

struct LineFigure<'a> {
    group: &'a ChartGroup,
}

impl Figure for LineFigure<'_> {
    fn size(&self) -> (f64, f64) {
        (14.0, 7.0)
    }

    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>, canvas: &Canvas) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;

        let group = self.group;
        let labels = group
            .nnz
            .iter()
            .map(|x| format!("{x:.0}"))
            .collect::<Vec<_>>();
        let last = group.len().saturating_sub(1) as f64;
        let ticks = nice_ticks(0.0, last, MAX_TICKS, true);
        let y_max = group
            .series
            .values()
            .flatten()
            .flatten()
            .fold(0.0f64, |acc, y| acc.max(*y));
        let y_max = if y_max > 0.0 { y_max * 1.05 } else { 1.0 };

        let longest = labels.iter().map(|l| l.len()).max().unwrap_or(1) as f64;
        let mut chart = ChartBuilder::on(root)
            .caption(
                format!("GFLOPS Line Plot at K={}", group.k),
                canvas.font(14.0),
            )
            .margin(canvas.pt(10.0))
            .x_label_area_size(canvas.pt(longest * 6.5 + 24.0))
            .y_label_area_size(canvas.pt(48.0))
            .build_cartesian_2d(TickedAxis::new(-0.5..last + 0.5, ticks), 0f64..y_max)?;

        let x_fmt = |x: &f64| {
            labels
                .get(x.round().max(0.0) as usize)
                .cloned()
                .unwrap_or_default()
        };
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("NNZ")
            .y_desc("GFLOPS")
            .x_label_formatter(&x_fmt)
            .x_label_style(canvas.font(10.0).transform(FontTransform::Rotate270))
            .y_label_style(canvas.font(10.0))
            .axis_desc_style(canvas.font(12.0))
            .draw()?;

        let marker_size = canvas.pt(3.0) as i32;
        let mut drawn = Vec::new();
        for (imp, values) in &group.series {
            let runs = segments(values);
            if runs.is_empty() {
                continue;
            }
            let style = SeriesStyle::of(*imp);
            for run in &runs {
                chart.draw_series(LineSeries::new(
                    run.iter().copied(),
                    style.line(ALPHA, canvas.pt(1.5)),
                ))?;
            }
            for point in runs.iter().flatten() {
                chart.plotting_area().draw(&marker_element(
                    style.marker,
                    *point,
                    marker_size,
                    style.fill(ALPHA),
                ))?;
            }
            drawn.push(*imp);
        }

        draw_legend(&chart.plotting_area().strip_coord_spec(), &drawn, canvas)
    }
}

/// Boxed column of entries in the upper left corner of the plotting area.
fn draw_legend<DB>(area: &DrawingArea<DB, Shift>, entries: &[Implementation], canvas: &Canvas) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if entries.is_empty() {
        return Ok(());
    }

    let entry = LegendEntry::new(
        canvas,
        ALPHA,
        TextStyle::from(canvas.font(10.0)).pos(Pos::new(HPos::Left, VPos::Center)),
    );
    let pad = canvas.pt(6.0) as i32;
    let row = canvas.pt(14.0) as i32;
    let width = entries
        .iter()
        .map(|imp| entry.width(area, *imp))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .max()
        .unwrap_or_default();

    let (x0, y0) = (pad, pad);
    let corner = (x0 + width + 2 * pad, y0 + row * entries.len() as i32 + 2 * pad);
    area.draw(&Rectangle::new([(x0, y0), corner], WHITE.mix(0.8).filled()))?;
    area.draw(&Rectangle::new([(x0, y0), corner], BLACK.stroke_width(1)))?;
    for (idx, imp) in entries.iter().enumerate() {
        entry.draw(area, *imp, (x0 + pad, y0 + pad + row * idx as i32 + row / 2))?;
    }
    Ok(())
}
