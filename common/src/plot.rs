use core::fmt::Debug;
use std::{
    fs,
    path::{Path, PathBuf},
};

use dyn_clone::{DynClone, clone_trait_object};
use eyre::{Context, Result, bail, eyre};
use plotters::{
    coord::Shift,
    prelude::*,
    style::{FontDesc, FontFamily, FontStyle},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{config::Settings, normalize::SkippedGroup};

#[typetag::serde(tag = "type")]
pub trait Plot: Debug + DynClone + Send + Sync {
    /// Short name used in logs and the run summary
    fn name(&self) -> &'static str;
    /// Renders every figure of this plot
    ///
    /// Arguments:
    /// * `plot_path` - Directory receiving the images, created if missing
    /// * `settings` - Rendering settings shared by all plots of a run
    fn plot(&self, plot_path: &Path, settings: &Settings) -> Result<PlotReport>;
}
clone_trait_object!(Plot);

/// What a plot produced and what it had to leave out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotReport {
    pub figures: Vec<PathBuf>,
    pub skipped: Vec<SkippedGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    /// Vector twin, drawn as SVG in memory and converted
    Pdf,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Pdf => "pdf",
        }
    }
}

/// Pixel density of the surface a figure is drawn on. Sizes in figures are
/// given in inches and points and converted here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub dpi: u32,
}

impl Canvas {
    /// Vector output is laid out at one pixel per point.
    pub const VECTOR_DPI: u32 = 72;

    pub fn for_format(format: OutputFormat, dpi: u32) -> Self {
        match format {
            OutputFormat::Png => Canvas { dpi },
            OutputFormat::Pdf => Canvas {
                dpi: Self::VECTOR_DPI,
            },
        }
    }

    pub fn pt(&self, points: f64) -> u32 {
        (points * self.dpi as f64 / 72.0).round().max(1.0) as u32
    }

    pub fn font(&self, points: f64) -> FontDesc<'static> {
        FontDesc::new(FontFamily::SansSerif, self.pt(points) as f64, FontStyle::Normal)
    }

    pub fn inches(&self, (width, height): (f64, f64)) -> (u32, u32) {
        (
            (width * self.dpi as f64).round() as u32,
            (height * self.dpi as f64).round() as u32,
        )
    }
}

/// Something that can draw itself on any plotters backend.
pub trait Figure {
    /// Width and height in inches
    fn size(&self) -> (f64, f64);

    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>, canvas: &Canvas) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static;
}

pub fn ensure_plot_dirs(dirs: &[PathBuf]) -> Result<()> {
    for dir in dirs {
        fs::create_dir_all(dir).context(format!("Create plot directory {dir:?}"))?;
    }
    Ok(())
}

/// Writes `figure` once per format as `<plot_dir>/<stem>.<ext>`.
///
/// Every format is attempted even if an earlier one fails; the call errors if
/// any of them could not be written.
pub fn save_figure<F: Figure>(
    figure: &F,
    plot_dir: &Path,
    stem: &str,
    formats: &[OutputFormat],
    dpi: u32,
) -> Result<Vec<PathBuf>> {
    ensure_plot_dirs(&[plot_dir.to_path_buf()])?;

    let mut written = Vec::new();
    let mut failed = Vec::new();
    for format in formats {
        let path = plot_dir.join(format!("{stem}.{}", format.extension()));
        match render(figure, &path, *format, dpi) {
            Ok(()) => {
                info!("Saved {} to {}", format.extension().to_uppercase(), path.display());
                written.push(path);
            }
            Err(err) => {
                error!("Failed to save {}: {err:#}", path.display());
                failed.push(path);
            }
        }
    }

    if !failed.is_empty() {
        bail!(
            "Could not write {failed:?} (written: {written:?})"
        );
    }
    Ok(written)
}

fn render<F: Figure>(figure: &F, path: &Path, format: OutputFormat, dpi: u32) -> Result<()> {
    let canvas = Canvas::for_format(format, dpi);
    let size = canvas.inches(figure.size());
    debug!("Rendering {} at {}x{} px", path.display(), size.0, size.1);
    match format {
        OutputFormat::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            figure.draw(&root, &canvas)?;
            root.present()?;
        }
        OutputFormat::Pdf => {
            let mut svg = String::new();
            {
                let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
                figure.draw(&root, &canvas)?;
                root.present()?;
            }
            fs::write(path, svg_to_pdf(&svg)?)?;
        }
    }
    Ok(())
}

/// One PDF page the size of the SVG, text converted with the system fonts.
fn svg_to_pdf(svg: &str) -> Result<Vec<u8>> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_data(svg.as_bytes(), &options)
        .map_err(|err| eyre!("SVG parse failed: {err:?}"))?;
    svg2pdf::to_pdf(
        &tree,
        svg2pdf::ConversionOptions::default(),
        svg2pdf::PageOptions::default(),
    )
    .map_err(|err| eyre!("PDF conversion failed: {err:?}"))
}
