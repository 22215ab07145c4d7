//! Longitude/latitude grid lines projected into the map CRS.

use anyhow::Result;
use geo::{coord, Coord, Rect};

use crate::crs::{Crs, Transformer};

/// Samples per grid line; projected parallels are curved, so lines are densified.
const SAMPLES: usize = 128;

/// Extra margin (degrees) around the map extent when sampling grid lines.
const PAD_DEG: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Meridian,
    Parallel,
}

/// One grid line clipped to the map bounds.
#[derive(Clone, Debug)]
pub(crate) struct GridLine {
    pub(crate) kind: Kind,
    pub(crate) degrees: f64,
    /// Visible pieces, in map coordinates.
    pub(crate) runs: Vec<Vec<Coord<f64>>>,
}

impl GridLine {
    /// Point where the label goes: the northernmost visible point of a meridian (top edge),
    /// the westernmost visible point of a parallel (left edge).
    pub(crate) fn anchor(&self) -> Option<Coord<f64>> {
        let points = self.runs.iter().flatten().copied();
        match self.kind {
            Kind::Meridian => points.max_by(|a, b| a.y.total_cmp(&b.y)),
            Kind::Parallel => points.min_by(|a, b| a.x.total_cmp(&b.x)),
        }
    }

    pub(crate) fn label(&self) -> String {
        let hemisphere = match (self.kind, self.degrees < 0.0) {
            (Kind::Meridian, true) => "W",
            (Kind::Meridian, false) => "E",
            (Kind::Parallel, true) => "S",
            (Kind::Parallel, false) => "N",
        };
        format!("{}°{hemisphere}", self.degrees.abs())
    }
}

/// Build grid lines at the given longitudes and latitudes, clipped to `bounds` (in `crs`).
pub(crate) fn graticule(bounds: Rect<f64>, crs: &Crs, lon_ticks: &[f64], lat_ticks: &[f64]) -> Result<Vec<GridLine>> {
    let to_map = Transformer::new(&Crs::WGS84, crs)?;
    let (lon_range, lat_range) = if crs.is_geographic() {
        ((bounds.min().x, bounds.max().x), (bounds.min().y, bounds.max().y))
    } else {
        geographic_extent(bounds, crs)?
    };

    let lon_span = (lon_range.0 - PAD_DEG, lon_range.1 + PAD_DEG);
    let lat_span = (lat_range.0 - PAD_DEG, lat_range.1 + PAD_DEG);

    let mut lines = Vec::with_capacity(lon_ticks.len() + lat_ticks.len());
    for &lon in lon_ticks {
        let points = sample(lat_span)
            .map(|lat| to_map.apply(coord! { x: lon, y: lat }))
            .collect::<Result<Vec<_>>>()?;
        lines.push(GridLine { kind: Kind::Meridian, degrees: lon, runs: clip(&points, bounds) });
    }
    for &lat in lat_ticks {
        let points = sample(lon_span)
            .map(|lon| to_map.apply(coord! { x: lon, y: lat }))
            .collect::<Result<Vec<_>>>()?;
        lines.push(GridLine { kind: Kind::Parallel, degrees: lat, runs: clip(&points, bounds) });
    }

    Ok(lines)
}

/// Longitude and latitude ranges covered by a projected rectangle, from its corners and edge midpoints.
fn geographic_extent(bounds: Rect<f64>, crs: &Crs) -> Result<((f64, f64), (f64, f64))> {
    let to_lonlat = Transformer::new(crs, &Crs::WGS84)?;
    let (min, max, center) = (bounds.min(), bounds.max(), bounds.center());

    let probes = [
        min, max,
        coord! { x: min.x, y: max.y },
        coord! { x: max.x, y: min.y },
        coord! { x: center.x, y: min.y },
        coord! { x: center.x, y: max.y },
        coord! { x: min.x, y: center.y },
        coord! { x: max.x, y: center.y },
    ];

    let mut lon = (f64::INFINITY, f64::NEG_INFINITY);
    let mut lat = (f64::INFINITY, f64::NEG_INFINITY);
    for probe in probes {
        let c = to_lonlat.apply(probe)?;
        lon = (lon.0.min(c.x), lon.1.max(c.x));
        lat = (lat.0.min(c.y), lat.1.max(c.y));
    }

    Ok((lon, lat))
}

fn sample((lo, hi): (f64, f64)) -> impl Iterator<Item = f64> {
    (0..=SAMPLES).map(move |i| lo + (hi - lo) * i as f64 / SAMPLES as f64)
}

/// Split a densified polyline into the runs that lie inside `bounds`.
fn clip(points: &[Coord<f64>], bounds: Rect<f64>) -> Vec<Vec<Coord<f64>>> {
    let inside = |c: &Coord<f64>| {
        c.x >= bounds.min().x && c.x <= bounds.max().x && c.y >= bounds.min().y && c.y <= bounds.max().y
    };

    let mut runs = Vec::new();
    let mut current = Vec::new();
    for point in points {
        if inside(point) {
            current.push(*point);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() { runs.push(current) }

    runs.retain(|run| run.len() > 1);
    runs
}
