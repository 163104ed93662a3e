use std::{fs::read_to_string, path::Path};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::plot::Plot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
    pub plots: Vec<Box<dyn Plot>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Raster resolution, never below [`Settings::MIN_DPI`]
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_dpi() -> u32 {
    Settings::MIN_DPI
}

impl Default for Settings {
    fn default() -> Self {
        Self { dpi: default_dpi() }
    }
}

impl Settings {
    pub const MIN_DPI: u32 = 300;

    pub fn with_dpi(dpi: Option<u32>) -> Self {
        Self {
            dpi: dpi.unwrap_or(Self::MIN_DPI).max(Self::MIN_DPI),
        }
    }

    pub fn raster_dpi(&self) -> u32 {
        self.dpi.max(Self::MIN_DPI)
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = read_to_string(path).context(format!("Read config {path:?}"))?;
        serde_yml::from_str(&raw).context(format!("Parse config {path:?}"))
    }
}
