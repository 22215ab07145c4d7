use std::{collections::BTreeMap, fs::File, path::Path};

use anyhow::{bail, Context, Result};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use polars::{frame::DataFrame, io::SerReader, prelude::{Column, CsvReadOptions, NamedFrom}};
use shapefile::{dbase::{FieldValue, Record}, Reader, Shape};

use crate::crs::Crs;
use super::Layer;

/// Reads all shapes + attribute records from a `.shp` file (with its `.shx`/`.dbf`/`.prj` sidecars).
pub fn read_layer(path: &Path) -> Result<Layer> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[read_layer] Failed to open shapefile: {}", path.display()))?;

    let mut geoms = Vec::new();
    let mut records = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result
            .with_context(|| format!("[read_layer] Error reading shape+record in {}", path.display()))?;
        let index = geoms.len();
        geoms.push(shape_to_geometry(shape)
            .with_context(|| format!("[read_layer] Record {index} of {}", path.display()))?);
        records.push(record);
    }

    let name = path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let crs = Crs::from_prj_sidecar(path)?;
    if crs.is_none() {
        log::warn!("{name}: no .prj sidecar, CRS unknown");
    }

    let layer = Layer::new(name, crs, geoms, records_to_dataframe(records)?)?;
    log::info!("loaded {} ({} features, crs {})",
        path.display(),
        layer.len(),
        layer.crs().map(|crs| crs.to_string()).unwrap_or_else(|| "unknown".into()),
    );

    Ok(layer)
}

/// Reads a comma-delimited file with a header row; every column is read as text.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[read_table] Failed to read CSV file: {}", path.display()))?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("[read_table] Failed to parse CSV file: {}", path.display()))?;

    log::info!("loaded {} ({} rows, {} columns)", path.display(), df.height(), df.width());
    Ok(df)
}

/// Coerce a shapefile shape into an owned geo geometry.
fn shape_to_geometry(shape: Shape) -> Result<Geometry<f64>> {
    let coord = |x: f64, y: f64| Coord { x, y };

    Ok(match shape {
        Shape::Point(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointM(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointZ(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::Multipoint(mp) => Geometry::MultiPoint(MultiPoint(
            mp.points().iter().map(|p| Point::new(p.x, p.y)).collect())),
        Shape::Polyline(line) => Geometry::MultiLineString(MultiLineString(line.parts().iter()
            .map(|part| LineString(part.iter().map(|p| coord(p.x, p.y)).collect()))
            .collect())),
        Shape::PolylineZ(line) => Geometry::MultiLineString(MultiLineString(line.parts().iter()
            .map(|part| LineString(part.iter().map(|p| coord(p.x, p.y)).collect()))
            .collect())),
        Shape::Polygon(polygon) => Geometry::MultiPolygon(rings_to_multipolygon(
            polygon.rings().iter().map(|ring| ring.points().iter().map(|p| coord(p.x, p.y)).collect()))),
        Shape::PolygonZ(polygon) => Geometry::MultiPolygon(rings_to_multipolygon(
            polygon.rings().iter().map(|ring| ring.points().iter().map(|p| coord(p.x, p.y)).collect()))),
        other => bail!("unsupported shape type: {:?}", other.shapetype()),
    })
}

/// Group shapefile rings into polygons: each exterior (clockwise) takes the holes that follow it.
fn rings_to_multipolygon(rings: impl Iterator<Item = Vec<Coord<f64>>>) -> MultiPolygon<f64> {
    /// Signed area of a closed coord list (negative for clockwise)
    fn signed_area(pts: &[Coord<f64>]) -> f64 {
        pts.windows(2)
            .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
            .sum::<f64>() / 2.0
    }

    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for mut coords in rings {
        let first = coords.first().copied();
        if coords.last().copied() != first {
            coords.extend(first);
        }
        let is_exterior = signed_area(&coords) < 0.0;
        let ring = LineString(coords);

        if is_exterior {
            if let Some(ext) = exterior.replace(ring) {
                polys.push(Polygon::new(ext, std::mem::take(&mut holes)));
            }
        } else if exterior.is_some() {
            holes.push(ring);
        } else {
            log::warn!("dropping hole ring with {} points that precedes any exterior ring", ring.0.len());
        }
    }
    if let Some(ext) = exterior {
        polys.push(Polygon::new(ext, holes));
    }

    MultiPolygon(polys)
}

/// A dBase column being assembled, typed by the first value seen for its field.
enum FieldColumn {
    Text(Vec<Option<String>>),
    Number(Vec<Option<f64>>),
    Flag(Vec<Option<bool>>),
}

/// Convert dBase records to a DataFrame with one column per field, ordered by field name.
fn records_to_dataframe(records: Vec<Record>) -> Result<DataFrame> {
    /// Classify a field value: (number, text, flag); at most one is Some.
    fn classify(value: FieldValue) -> (Option<f64>, Option<String>, Option<bool>) {
        match value {
            FieldValue::Numeric(n) => (n, None, None),
            FieldValue::Float(n) => (n.map(f64::from), None, None),
            FieldValue::Integer(n) => (Some(n as f64), None, None),
            FieldValue::Double(n) => (Some(n), None, None),
            FieldValue::Currency(n) => (Some(n), None, None),
            FieldValue::Character(s) => (None, s.map(|s| s.trim_end().to_string()), None),
            FieldValue::Memo(s) => (None, Some(s), None),
            FieldValue::Logical(b) => (None, None, b),
            other => (None, Some(format!("{other:?}")), None),
        }
    }

    let height = records.len();
    let mut columns: BTreeMap<String, FieldColumn> = BTreeMap::new();

    for (row, record) in records.into_iter().enumerate() {
        for (field, value) in record {
            let is_numeric = matches!(value,
                FieldValue::Numeric(_) | FieldValue::Float(_) | FieldValue::Integer(_)
                | FieldValue::Double(_) | FieldValue::Currency(_));
            let is_flag = matches!(value, FieldValue::Logical(_));

            let column = columns.entry(field).or_insert_with(|| match (is_numeric, is_flag) {
                (true, _) => FieldColumn::Number(vec![None; height]),
                (_, true) => FieldColumn::Flag(vec![None; height]),
                _ => FieldColumn::Text(vec![None; height]),
            });

            let (number, text, flag) = classify(value);
            match column {
                FieldColumn::Number(values) => values[row] = number,
                FieldColumn::Flag(values) => values[row] = flag,
                FieldColumn::Text(values) => values[row] = text
                    .or_else(|| number.map(|n| n.to_string()))
                    .or_else(|| flag.map(|b| b.to_string())),
            }
        }
    }

    let columns = columns.into_iter()
        .map(|(name, column)| match column {
            FieldColumn::Text(values) => Column::new(name.into(), values),
            FieldColumn::Number(values) => Column::new(name.into(), values),
            FieldColumn::Flag(values) => Column::new(name.into(), values),
        })
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}
