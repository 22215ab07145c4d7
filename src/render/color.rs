//! Color mapping for the choropleth.

use plotters::{prelude::{ColorMap, ViridisRGB}, style::RGBColor};

/// Neutral gray for missing values.
pub(crate) const MISSING: RGBColor = RGBColor(150, 150, 150);

/// Fixed-bounds viridis scale: `vmin` maps to the low end, `vmax` to the high end, and values
/// outside are clamped.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ColorScale {
    pub(crate) vmin: f64,
    pub(crate) vmax: f64,
}

impl ColorScale {
    pub(crate) fn color(&self, value: Option<f64>) -> RGBColor {
        let Some(value) = value.filter(|v| v.is_finite()) else { return MISSING };
        let range = if self.vmax > self.vmin { self.vmax - self.vmin } else { 1.0 };
        let t = ((value - self.vmin) / range).clamp(0.0, 1.0);
        ViridisRGB.get_color(t as f32)
    }
}
