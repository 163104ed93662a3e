use std::path::Path;

use common::{
    config::Settings,
    plot::{Plot, PlotReport, ensure_plot_dirs},
};
use console::style;
use eyre::{Context, Result};
use tracing::debug;

/// Runs the plots in order and stops at the first one that fails.
pub fn run_plots(
    plots: &[Box<dyn Plot>],
    outdir: &Path,
    settings: &Settings,
) -> Result<Vec<(&'static str, PlotReport)>> {
    ensure_plot_dirs(&[outdir.to_path_buf()])?;

    let mut reports = Vec::new();
    for plot in plots {
        debug!("Running {plot:?}");
        let report = plot
            .plot(outdir, settings)
            .context(format!("{} plot failed", plot.name()))?;
        reports.push((plot.name(), report));
    }
    Ok(reports)
}

pub fn summary(name: &str, report: &PlotReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} figure(s) written",
        style(format!("[{name}]")).bold(),
        report.figures.len()
    )];
    lines.extend(
        report
            .figures
            .iter()
            .map(|path| format!("  {}", path.display())),
    );
    lines.extend(report.skipped.iter().map(|skipped| {
        format!(
            "  {} K={}: {} rows, window {}",
            style("skipped").yellow(),
            skipped.k,
            skipped.rows,
            skipped.window
        )
    }));
    if report.figures.is_empty() {
        lines.push("  No valid data to plot".to_owned());
    }
    lines
}
