use std::path::{Path, PathBuf};

use crate::crs::Crs;

/// Inputs, outputs and analysis constants for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub roads: String,
    pub counties: String,
    pub wards: String,
    pub transport: String,
    pub output: PathBuf,
    /// Metric CRS used for areas and the map.
    pub target_crs: Crs,
    pub style: MapStyle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data_files"),
            roads: "NI_roads.shp".into(),
            counties: "Counties.shp".into(),
            wards: "NI_Wards.shp".into(),
            transport: "transport_data.csv".into(),
            output: PathBuf::from("sample_map.png"),
            target_crs: Crs::ITM,
            style: MapStyle::default(),
        }
    }
}

impl Config {
    pub fn roads_path(&self) -> PathBuf { self.data_dir.join(&self.roads) }

    pub fn counties_path(&self) -> PathBuf { self.data_dir.join(&self.counties) }

    pub fn wards_path(&self) -> PathBuf { self.data_dir.join(&self.wards) }

    pub fn transport_path(&self) -> PathBuf { self.data_dir.join(&self.transport) }

    pub fn output_path(&self) -> &Path { &self.output }
}

/// Fixed appearance of the choropleth map.
#[derive(Debug, Clone)]
pub struct MapStyle {
    /// Column used to colour wards.
    pub value_column: String,
    /// Colour scale bounds; values outside are clamped.
    pub vmin: f64,
    pub vmax: f64,
    /// Graticule positions in degrees.
    pub lon_ticks: Vec<f64>,
    pub lat_ticks: Vec<f64>,
    pub width_inches: f64,
    pub dpi: u32,
    pub outline_rgb: (u8, u8, u8),
    pub legend_label: String,
    pub colorbar_label: String,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            value_column: "Population".into(),
            vmin: 1000.0,
            vmax: 8000.0,
            lon_ticks: vec![-8.0, -7.5, -7.0, -6.5, -6.0, -5.5],
            lat_ticks: vec![54.0, 54.5, 55.0, 55.5],
            width_inches: 10.0,
            dpi: 300,
            outline_rgb: (255, 0, 0),
            legend_label: "County Boundaries".into(),
            colorbar_label: "Resident Population".into(),
        }
    }
}

impl MapStyle {
    /// Pixels per typographic point at this DPI.
    #[inline] pub fn px_per_pt(&self) -> f64 { self.dpi as f64 / 72.0 }

    /// Canvas width in pixels.
    #[inline] pub fn width_px(&self) -> u32 { (self.width_inches * self.dpi as f64).round() as u32 }
}
