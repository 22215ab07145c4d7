//! Choropleth rendering to PNG.

use std::{fmt::Display, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, Geometry, LineString, Polygon, Rect};
use plotters::{
    coord::Shift,
    prelude::*,
    style::{text_anchor::{HPos, Pos, VPos}, FontTransform},
};

use crate::{analysis::float_values, config::MapStyle, crs::Crs, layer::Layer};
use super::{color::ColorScale, graticule::{graticule, Kind}};

/// Font family for all annotations.
const FONT: &str = "sans-serif";

fn render_err(e: impl Display) -> anyhow::Error {
    anyhow!("[render] {e}")
}

/// Pixel layout of the figure: map frame on the left, colorbar on the right.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Layout {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// Map frame in pixels: (left, top, width, height).
    pub(crate) frame: (f64, f64, f64, f64),
    /// Colorbar rectangle in pixels: (left, top, width, height).
    pub(crate) colorbar: (f64, f64, f64, f64),
    /// Map units to pixels.
    pub(crate) scale: f64,
    bounds: Rect<f64>,
}

impl Layout {
    pub(crate) fn new(bounds: Rect<f64>, style: &MapStyle) -> Result<Self> {
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            bail!("[render] degenerate map extent {:?}", bounds);
        }

        let pt = style.px_per_pt();
        let width = style.width_px() as f64;

        let (left, top, bottom, right) = (48.0 * pt, 28.0 * pt, 12.0 * pt, 12.0 * pt);
        // Gap between map and bar, then room for tick labels and the rotated title.
        let (pad, labels) = (0.1 * style.dpi as f64, 64.0 * pt);

        // The bar is 5% of the map width.
        let map_w = (width - left - pad - labels - right) / 1.05;
        if map_w <= 0.0 {
            bail!("[render] canvas of {width}px is too narrow");
        }

        let scale = map_w / bounds.width();
        let map_h = bounds.height() * scale;

        Ok(Self {
            width: width as u32,
            height: (top + map_h + bottom).ceil() as u32,
            frame: (left, top, map_w, map_h),
            colorbar: (left + map_w + pad, top, 0.05 * map_w, map_h),
            scale,
            bounds,
        })
    }

    /// Map coordinates to pixel coordinates (y grows downward).
    pub(crate) fn project(&self, c: Coord<f64>) -> (i32, i32) {
        let (left, top, _, _) = self.frame;
        (
            (left + (c.x - self.bounds.min().x) * self.scale).round() as i32,
            (top + (self.bounds.max().y - c.y) * self.scale).round() as i32,
        )
    }

    fn frame_px(&self) -> [(i32, i32); 2] {
        let (left, top, w, h) = self.frame;
        [(left.round() as i32, top.round() as i32), ((left + w).round() as i32, (top + h).round() as i32)]
    }
}

/// Draw wards coloured by `style.value_column` with county outlines, a graticule, a legend
/// and a colorbar, and save as PNG at `path`.
pub fn render_map(wards: &Layer, counties: &Layer, style: &MapStyle, path: &Path) -> Result<()> {
    let crs = match (wards.crs(), counties.crs()) {
        (Some(a), Some(b)) if a == b => a,
        (a, b) => {
            let show = |crs: Option<&Crs>| crs.map_or("unknown".to_string(), |crs| crs.to_string());
            bail!("[render] wards ({}) and counties ({}) must share a known CRS", show(a), show(b))
        }
    };

    let bounds = wards.bounds()
        .with_context(|| format!("[render] {:?} has no geometry to draw", wards.name()))?;
    let layout = Layout::new(bounds, style)?;
    let values = float_values(wards.data(), &style.value_column)
        .with_context(|| format!("[render] cannot colour by {:?}", style.value_column))?;
    let scale = ColorScale { vmin: style.vmin, vmax: style.vmax };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("[render] failed to create {}", parent.display()))?;
    }

    let root = BitMapBackend::new(path, (layout.width, layout.height)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    for (geom, value) in wards.geoms().iter().zip(values) {
        let fill = scale.color(value).filled();
        for poly in polygons(geom) {
            let points = ring_px(poly.exterior(), &layout);
            if points.len() < 3 { continue }
            root.draw(&plotters::element::Polygon::new(points, fill)).map_err(render_err)?;
        }
    }

    let (r, g, b) = style.outline_rgb;
    let outline = RGBColor(r, g, b).stroke_width(stroke(style, 1.0));
    for geom in counties.geoms() {
        for poly in polygons(geom) {
            for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
                root.draw(&PathElement::new(ring_px(ring, &layout), outline)).map_err(render_err)?;
            }
        }
    }

    draw_graticule(&root, &layout, crs, style)?;

    let [top_left, bottom_right] = layout.frame_px();
    root.draw(&Rectangle::new([top_left, bottom_right], BLACK.stroke_width(stroke(style, 0.8))))
        .map_err(render_err)?;

    draw_legend(&root, &layout, style)?;
    draw_colorbar(&root, &layout, style, scale)?;

    root.present()
        .map_err(render_err)
        .with_context(|| format!("[render] failed to write {}", path.display()))?;

    log::info!("wrote {}x{} map to {}", layout.width, layout.height, path.display());
    Ok(())
}

fn polygons(geom: &Geometry<f64>) -> Vec<&Polygon<f64>> {
    match geom {
        Geometry::Polygon(poly) => vec![poly],
        Geometry::MultiPolygon(mp) => mp.0.iter().collect(),
        _ => vec![],
    }
}

fn ring_px(ring: &LineString<f64>, layout: &Layout) -> Vec<(i32, i32)> {
    let mut points = ring.0.iter().map(|&c| layout.project(c)).collect::<Vec<_>>();
    points.dedup();
    points
}

/// Line width in pixels for a width in points, at least one pixel.
fn stroke(style: &MapStyle, points: f64) -> u32 {
    (points * style.px_per_pt()).round().max(1.0) as u32
}

fn font_px(style: &MapStyle, points: f64) -> f64 {
    points * style.px_per_pt()
}

fn draw_graticule(root: &DrawingArea<BitMapBackend<'_>, Shift>, layout: &Layout, crs: &Crs, style: &MapStyle) -> Result<()> {
    let lines = graticule(layout.bounds, crs, &style.lon_ticks, &style.lat_ticks)?;

    let line_style = RGBColor(128, 128, 128).mix(0.5).stroke_width(stroke(style, 0.5));
    let gap = font_px(style, 4.0) as i32;
    let text = (FONT, font_px(style, 9.0)).into_font().color(&BLACK);
    let [top_left, _] = layout.frame_px();

    for line in &lines {
        for run in &line.runs {
            let points = run.iter().map(|&c| layout.project(c)).collect::<Vec<_>>();
            root.draw(&PathElement::new(points, line_style)).map_err(render_err)?;
        }

        let Some(anchor) = line.anchor() else { continue };
        let (x, y) = layout.project(anchor);
        let (position, at) = match line.kind {
            Kind::Meridian => (Pos::new(HPos::Center, VPos::Bottom), (x, top_left.1 - gap)),
            Kind::Parallel => (Pos::new(HPos::Right, VPos::Center), (top_left.0 - gap, y)),
        };
        root.draw(&Text::new(line.label(), at, text.pos(position))).map_err(render_err)?;
    }

    Ok(())
}

fn draw_legend(root: &DrawingArea<BitMapBackend<'_>, Shift>, layout: &Layout, style: &MapStyle) -> Result<()> {
    let [(left, top), _] = layout.frame_px();
    let pt = |v: f64| font_px(style, v).round() as i32;

    let size = font_px(style, 10.0);
    let (text_w, _) = root.estimate_text_size(&style.legend_label, &(FONT, size).into_font().color(&BLACK))
        .map_err(render_err)?;

    let (x0, y0) = (left + pt(8.0), top + pt(8.0));
    let (swatch_w, swatch_h) = (pt(20.0), pt(10.0));
    let box_w = pt(6.0) + swatch_w + pt(6.0) + text_w as i32 + pt(6.0);
    let box_h = pt(22.0);

    root.draw(&Rectangle::new([(x0, y0), (x0 + box_w, y0 + box_h)], WHITE.mix(0.8).filled()))
        .map_err(render_err)?;
    root.draw(&Rectangle::new([(x0, y0), (x0 + box_w, y0 + box_h)], RGBColor(204, 204, 204).stroke_width(stroke(style, 0.8))))
        .map_err(render_err)?;

    let (r, g, b) = style.outline_rgb;
    let sx = x0 + pt(6.0);
    let sy = y0 + (box_h - swatch_h) / 2;
    root.draw(&Rectangle::new([(sx, sy), (sx + swatch_w, sy + swatch_h)], RGBColor(r, g, b).stroke_width(stroke(style, 1.0))))
        .map_err(render_err)?;

    let label = (FONT, size).into_font().color(&BLACK).pos(Pos::new(HPos::Left, VPos::Center));
    root.draw(&Text::new(style.legend_label.clone(), (sx + swatch_w + pt(6.0), y0 + box_h / 2), label))
        .map_err(render_err)?;

    Ok(())
}

fn draw_colorbar(root: &DrawingArea<BitMapBackend<'_>, Shift>, layout: &Layout, style: &MapStyle, scale: ColorScale) -> Result<()> {
    let (left, top, w, h) = layout.colorbar;
    let (x0, x1) = (left.round() as i32, (left + w).round() as i32);
    let (y0, y1) = (top.round() as i32, (top + h).round() as i32);

    // One band per pixel row, high values at the top.
    for y in y0..y1 {
        let t = (y1 - y) as f64 / (y1 - y0).max(1) as f64;
        let value = scale.vmin + t * (scale.vmax - scale.vmin);
        let color = scale.color(Some(value));
        root.draw(&Rectangle::new([(x0, y), (x1, y + 1)], color.filled())).map_err(render_err)?;
    }
    root.draw(&Rectangle::new([(x0, y0), (x1, y1)], BLACK.stroke_width(stroke(style, 0.8))))
        .map_err(render_err)?;

    let tick_len = font_px(style, 3.5).round() as i32;
    let text = (FONT, font_px(style, 9.0)).into_font().color(&BLACK).pos(Pos::new(HPos::Left, VPos::Center));
    let mut widest = 0;
    for value in ticks(scale.vmin, scale.vmax) {
        let t = (value - scale.vmin) / (scale.vmax - scale.vmin);
        let y = y1 - (t * (y1 - y0) as f64).round() as i32;
        root.draw(&PathElement::new(vec![(x1, y), (x1 + tick_len, y)], BLACK.stroke_width(stroke(style, 0.8))))
            .map_err(render_err)?;

        let label = format!("{value:.0}");
        let (label_w, _) = root.estimate_text_size(&label, &(FONT, font_px(style, 9.0)).into_font().color(&BLACK))
            .map_err(render_err)?;
        widest = widest.max(label_w as i32);
        root.draw(&Text::new(label, (x1 + 2 * tick_len, y), text.clone())).map_err(render_err)?;
    }

    let title = (FONT, font_px(style, 10.0))
        .into_font()
        .transform(FontTransform::Rotate270)
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Top));
    let title_x = x1 + 3 * tick_len + widest;
    root.draw(&Text::new(style.colorbar_label.clone(), (title_x, (y0 + y1) / 2), title))
        .map_err(render_err)?;

    Ok(())
}

/// Round tick values covering [lo, hi], stepping by 1, 2 or 5 times a power of ten.
pub(crate) fn ticks(lo: f64, hi: f64) -> Vec<f64> {
    if !(hi > lo) || !lo.is_finite() || !hi.is_finite() { return vec![] }

    let raw = (hi - lo) / 7.0;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0].into_iter()
        .map(|m| m * magnitude)
        .find(|&step| step >= raw)
        .unwrap_or(10.0 * magnitude);

    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(|i| i as f64 * step).collect()
}
